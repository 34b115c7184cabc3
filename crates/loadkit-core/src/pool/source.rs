//! Loading delimited source data files into memory

use loadkit_common::{LoadkitError, Result};
use std::path::{Path, PathBuf};
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Rows of one source data file, immutable once loaded.
///
/// Headers are not special-cased: if the file has one, it is row 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPool {
    source: PathBuf,
    rows: Vec<Vec<String>>,
}

impl DataPool {
    /// Read and parse `path`
    pub fn load(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| LoadkitError::pool_load(path.display().to_string(), e.to_string()))?;

        let pool = Self::parse(path, &bytes, delimiter)?;
        info!(source = %path.display(), rows = pool.len(), "Loaded data pool");
        Ok(pool)
    }

    /// Parse raw file contents. Fields are split on `delimiter` without any
    /// quoting rules; a leading BOM and blank lines are dropped. A line made
    /// only of delimiters is a row of empty fields, not a blank line.
    pub fn parse(source: impl Into<PathBuf>, bytes: &[u8], delimiter: u8) -> Result<Self> {
        let source = source.into();
        let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .delimiter(delimiter)
            .from_reader(content);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| {
                LoadkitError::pool_load(source.display().to_string(), e.to_string())
            })?;

            if record.len() == 1 && record[0].trim().is_empty() {
                continue;
            }

            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { source, rows })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(Vec::as_slice)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(content: &[u8]) -> DataPool {
        DataPool::parse("users.csv", content, b',').unwrap()
    }

    #[test]
    fn test_rows_split_on_delimiter() {
        let pool = parse(b"alice,pw1\nbob,pw2\n");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.row(0).unwrap(), ["alice", "pw1"]);
        assert_eq!(pool.row(1).unwrap(), ["bob", "pw2"]);
        assert!(pool.row(2).is_none());
    }

    #[test]
    fn test_bom_crlf_and_blank_lines() {
        let pool = parse(b"\xEF\xBB\xBFalice,pw1\r\n\r\n   \nbob,pw2\r\n\n");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.row(0).unwrap(), ["alice", "pw1"]);
        assert_eq!(pool.row(1).unwrap(), ["bob", "pw2"]);
    }

    #[test]
    fn test_delimiter_only_line_is_a_row() {
        let pool = DataPool::parse("users.csv", b"a,b\n,\nc,d\n", b',').unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.row(1).unwrap(), &["".to_string(), "".to_string()][..]);
        assert_eq!(pool.row(2).unwrap()[0], "c");
    }

    #[test]
    fn test_quotes_are_plain_characters() {
        let pool = parse(b"\"a,b\",c\n");
        assert_eq!(pool.row(0).unwrap(), ["\"a", "b\"", "c"]);
    }

    #[test]
    fn test_ragged_rows_and_custom_delimiter() {
        let pool = DataPool::parse("ids.tsv", b"1\tx\n2\n3\ty\tz\n", b'\t').unwrap();
        assert_eq!(pool.len(), 3);
        assert_eq!(pool.row(1).unwrap(), ["2"]);
        assert_eq!(pool.row(2).unwrap().len(), 3);
    }

    #[test]
    fn test_header_row_is_data() {
        let pool = parse(b"username,password\nalice,pw1\n");
        assert_eq!(pool.row(0).unwrap(), ["username", "password"]);
    }

    #[test]
    fn test_missing_file_is_pool_load_error() {
        let err = DataPool::load("/definitely/not/here.csv", b',').unwrap_err();
        assert_eq!(err.kind(), "pool_load");
        assert!(err.to_string().contains("/definitely/not/here.csv"));
    }

    #[test]
    fn test_invalid_utf8_is_pool_load_error() {
        let err = DataPool::parse("bad.csv", b"ok,\xFF\xFE\n", b',').unwrap_err();
        assert_eq!(err.kind(), "pool_load");
    }
}
