//! Field paths over captured JSON
//!
//! `data[0].items` walks key `data`, element 0, then key `items`. A numeric
//! dot segment on an array (`data.0`) is an index too. The empty path is the
//! value itself.

use serde_json::Value as Json;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

/// Resolve `path` against `root`. Any missing or malformed segment makes the
/// whole path resolve to nothing.
pub fn resolve<'a>(root: &'a Json, path: &str) -> Option<&'a Json> {
    let segments = parse(path)?;
    segments
        .iter()
        .try_fold(root, |current, segment| step(current, segment))
}

fn step<'a>(current: &'a Json, segment: &Segment<'_>) -> Option<&'a Json> {
    match (current, segment) {
        (Json::Object(map), Segment::Key(key)) => map.get(*key),
        (Json::Array(items), Segment::Index(index)) => items.get(*index),
        (Json::Array(items), Segment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        },
        _ => None,
    }
}

fn parse(path: &str) -> Option<Vec<Segment<'_>>> {
    let path = path.trim();
    let mut segments = Vec::new();
    if path.is_empty() {
        return Some(segments);
    }

    for part in path.split('.') {
        let (key, mut rest) = match part.find('[') {
            Some(open) => part.split_at(open),
            None => (part, ""),
        };

        if !key.is_empty() {
            segments.push(Segment::Key(key));
        } else if rest.is_empty() {
            // `a..b` or a trailing dot
            return None;
        }

        while !rest.is_empty() {
            let inner = rest.strip_prefix('[')?;
            let close = inner.find(']')?;
            let index = inner[..close].trim().parse::<usize>().ok()?;
            segments.push(Segment::Index(index));
            rest = &inner[close + 1..];
        }
    }

    Some(segments)
}
