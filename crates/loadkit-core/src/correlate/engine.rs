//! Correlation rules: pick an element of a captured array and copy a field
//! of it into an iteration variable.
//!
//! Rules run in the order given. A rule can reuse the index an earlier rule
//! picked (`index_from`), which keeps values from the same element together,
//! for example a post id and its author. Nothing here fails: problems come
//! back as [`CorrelationWarning`]s and the affected targets read as absent.

use super::path::resolve;
use loadkit_common::{CorrelationWarning, Value, VariableStore};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Number, Value as Json};
use std::fmt;
use tracing::{debug, warn};

/// How a rule picks its element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SelectMode {
    First,
    Last,
    Random,
    Index,
}

impl std::str::FromStr for SelectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FIRST" => Ok(SelectMode::First),
            "LAST" => Ok(SelectMode::Last),
            "RANDOM" => Ok(SelectMode::Random),
            "INDEX" => Ok(SelectMode::Index),
            other => Err(format!(
                "unknown selection mode '{}' (expected FIRST, LAST, RANDOM or INDEX)",
                other
            )),
        }
    }
}

impl TryFrom<String> for SelectMode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SelectMode> for String {
    fn from(mode: SelectMode) -> Self {
        mode.to_string()
    }
}

impl fmt::Display for SelectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectMode::First => "FIRST",
            SelectMode::Last => "LAST",
            SelectMode::Random => "RANDOM",
            SelectMode::Index => "INDEX",
        };
        f.write_str(name)
    }
}

/// One correlation rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationRule {
    /// Variable receiving the value
    pub target: String,

    /// Field (or path) of the selected element; the whole element when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    pub mode: SelectMode,

    /// Literal index for `INDEX`; `None` when missing or not numeric
    #[serde(default, deserialize_with = "lenient_index", skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,

    /// Variable the selected index is published under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_var: Option<String>,

    /// Variable holding an index published by an earlier rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_from: Option<String>,
}

impl CorrelationRule {
    pub fn new(target: impl Into<String>, mode: SelectMode) -> Self {
        Self {
            target: target.into(),
            field: None,
            mode,
            index: None,
            index_var: None,
            index_from: None,
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn index_var(mut self, name: impl Into<String>) -> Self {
        self.index_var = Some(name.into());
        self
    }

    pub fn index_from(mut self, name: impl Into<String>) -> Self {
        self.index_from = Some(name.into());
        self
    }

    /// Name the selected index is published under
    pub fn published_index_name(&self) -> String {
        self.index_var
            .clone()
            .unwrap_or_else(|| format!("{}_index", self.target))
    }
}

/// Numbers and numeric strings are indices; anything else is "not numeric"
fn lenient_index<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Json::deserialize(deserializer)?;
    Ok(match raw {
        Json::Number(n) => n.as_i64(),
        Json::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// What one `correlate` call did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationOutcome {
    /// Selected index per target, in rule order; `None` when nothing was selected
    pub selections: Vec<(String, Option<i64>)>,
    pub warnings: Vec<CorrelationWarning>,
}

impl CorrelationOutcome {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, warning: CorrelationWarning) {
        warn!(warning = %warning, "Correlation warning");
        self.warnings.push(warning);
    }
}

/// Evaluates correlation rules. Owns the random source used by `RANDOM`.
pub struct CorrelationEngine {
    rng: Mutex<StdRng>,
}

impl Default for CorrelationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationEngine {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic `RANDOM` selection
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Apply `rules` to the array found at `array_path` in `captured`,
    /// writing targets and published indices into `vars`.
    pub fn correlate(
        &self,
        captured: &Json,
        array_path: &str,
        rules: &[CorrelationRule],
        vars: &mut VariableStore,
    ) -> CorrelationOutcome {
        let mut outcome = CorrelationOutcome::default();

        let items = match resolve(captured, array_path) {
            Some(Json::Array(items)) if !items.is_empty() => items,
            resolved => {
                let path = array_path.to_string();
                outcome.warn(match resolved {
                    Some(Json::Array(_)) => CorrelationWarning::EmptyArray { path },
                    _ => CorrelationWarning::MissingArray { path },
                });
                for rule in rules {
                    vars.set_absent(rule.target.clone());
                    outcome.selections.push((rule.target.clone(), None));
                }
                return outcome;
            },
        };

        for rule in rules {
            let index = self.select(rule, items.len(), vars);
            vars.set(rule.published_index_name(), Value::Number(Number::from(index)));
            outcome.selections.push((rule.target.clone(), Some(index)));

            let element = usize::try_from(index).ok().and_then(|i| items.get(i));
            let Some(element) = element else {
                vars.set_absent(rule.target.clone());
                outcome.warn(CorrelationWarning::IndexOutOfBounds {
                    target: rule.target.clone(),
                    index,
                    len: items.len(),
                });
                continue;
            };

            let value = match &rule.field {
                None => Value::from(element),
                Some(field) => match resolve(element, field) {
                    Some(found) => Value::from(found),
                    None => {
                        outcome.warn(CorrelationWarning::MissingField {
                            target: rule.target.clone(),
                            field: field.clone(),
                            index: usize::try_from(index).unwrap_or_default(),
                        });
                        Value::Absent
                    },
                },
            };

            debug!(target_var = %rule.target, mode = %rule.mode, index = index, "Correlated value");
            vars.set(rule.target.clone(), value);
        }

        outcome
    }

    /// Index a rule selects in an array of `len > 0` elements. Only a literal
    /// `INDEX` can fall outside the array.
    fn select(&self, rule: &CorrelationRule, len: usize, vars: &VariableStore) -> i64 {
        let last = len - 1;
        let index = match rule.mode {
            SelectMode::Index => match &rule.index_from {
                Some(name) => vars
                    .get(name)
                    .as_index()
                    .filter(|published| *published < len)
                    .unwrap_or(0),
                None => return rule.index.unwrap_or(0),
            },
            SelectMode::First => 0,
            SelectMode::Last => last,
            SelectMode::Random => self.rng.lock().gen_range(0..len),
        };
        i64::try_from(index).unwrap_or(i64::MAX)
    }
}
