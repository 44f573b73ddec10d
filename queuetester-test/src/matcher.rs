//! Property patterns

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

/// A pattern that a template value is tested against.
///
/// Plain JSON converts into a literal pattern whose objects match partially
/// (extra keys in the template are fine) and whose arrays match exactly.
#[derive(Debug, Clone)]
pub enum Match {
    Literal { pattern: Value, partial_objects: bool },
    Object { pattern: BTreeMap<String, Match>, partial: bool },
    Array { pattern: Vec<Match>, subsequence: bool },
    AnyValue,
    Absent,
    Not(Box<Match>),
    StringLikeRegexp(Regex),
}

impl Match {
    /// Any value that is present and not null
    pub fn any_value() -> Self {
        Match::AnyValue
    }

    /// The key must not be present
    pub fn absent() -> Self {
        Match::Absent
    }

    /// Deep equality, no partial objects anywhere
    pub fn exact(pattern: impl Into<Value>) -> Self {
        Match::Literal {
            pattern: pattern.into(),
            partial_objects: false,
        }
    }

    /// An object with at least these keys
    pub fn object_like<I, K, M>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, M)>,
        K: Into<String>,
        M: Into<Match>,
    {
        Match::Object {
            pattern: collect_entries(entries),
            partial: true,
        }
    }

    /// An object with exactly these keys
    pub fn object_equals<I, K, M>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, M)>,
        K: Into<String>,
        M: Into<Match>,
    {
        Match::Object {
            pattern: collect_entries(entries),
            partial: false,
        }
    }

    /// An array containing these elements in this order, not necessarily adjacent
    pub fn array_with<I, M>(elements: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Match>,
    {
        Match::Array {
            pattern: elements.into_iter().map(Into::into).collect(),
            subsequence: true,
        }
    }

    /// An array of exactly these elements
    pub fn array_equals<I, M>(elements: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<Match>,
    {
        Match::Array {
            pattern: elements.into_iter().map(Into::into).collect(),
            subsequence: false,
        }
    }

    pub fn not(pattern: impl Into<Match>) -> Self {
        Match::Not(Box::new(pattern.into()))
    }

    /// A string matching `pattern`.
    ///
    /// # Panics
    ///
    /// If `pattern` is not a valid regular expression.
    pub fn string_like_regexp(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(regex) => Match::StringLikeRegexp(regex),
            Err(e) => panic!("Invalid regular expression {:?}: {}", pattern, e),
        }
    }

    /// Test `actual` (`None` when the key is missing) against this pattern.
    ///
    /// Returns the first mismatch, prefixed with its JSON path.
    pub fn test(&self, actual: Option<&Value>) -> Result<(), String> {
        self.test_at("", actual)
    }

    pub(crate) fn test_at(&self, path: &str, actual: Option<&Value>) -> Result<(), String> {
        match self {
            Match::Absent => match actual {
                None => Ok(()),
                Some(value) => Err(format!("{}: expected absent, found {}", at(path), value)),
            },
            Match::AnyValue => match actual {
                None | Some(Value::Null) => {
                    Err(format!("{}: expected a value, found nothing", at(path)))
                }
                Some(_) => Ok(()),
            },
            Match::Not(inner) => match inner.test_at(path, actual) {
                Ok(()) => Err(format!(
                    "{}: found {} which matches a pattern it should not",
                    at(path),
                    show(actual)
                )),
                Err(_) => Ok(()),
            },
            Match::StringLikeRegexp(regex) => match actual {
                Some(Value::String(s)) if regex.is_match(s) => Ok(()),
                other => Err(format!(
                    "{}: expected a string matching /{}/, found {}",
                    at(path),
                    regex.as_str(),
                    show(other)
                )),
            },
            Match::Literal {
                pattern,
                partial_objects,
            } => {
                let actual = present(path, actual)?;
                test_literal(path, pattern, actual, *partial_objects)
            }
            Match::Object { pattern, partial } => {
                let actual = present(path, actual)?;
                test_object(path, pattern, actual, *partial)
            }
            Match::Array {
                pattern,
                subsequence,
            } => {
                let actual = present(path, actual)?;
                test_array(path, pattern, actual, *subsequence)
            }
        }
    }
}

impl From<Value> for Match {
    fn from(pattern: Value) -> Self {
        Match::Literal {
            pattern,
            partial_objects: true,
        }
    }
}

impl From<&str> for Match {
    fn from(pattern: &str) -> Self {
        Value::from(pattern).into()
    }
}

impl From<String> for Match {
    fn from(pattern: String) -> Self {
        Value::from(pattern).into()
    }
}

impl From<bool> for Match {
    fn from(pattern: bool) -> Self {
        Value::from(pattern).into()
    }
}

impl From<i32> for Match {
    fn from(pattern: i32) -> Self {
        Value::from(pattern).into()
    }
}

impl From<i64> for Match {
    fn from(pattern: i64) -> Self {
        Value::from(pattern).into()
    }
}

impl From<u32> for Match {
    fn from(pattern: u32) -> Self {
        Value::from(pattern).into()
    }
}

fn collect_entries<I, K, M>(entries: I) -> BTreeMap<String, Match>
where
    I: IntoIterator<Item = (K, M)>,
    K: Into<String>,
    M: Into<Match>,
{
    entries
        .into_iter()
        .map(|(k, m)| (k.into(), m.into()))
        .collect()
}

fn at(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn show(actual: Option<&Value>) -> String {
    actual.map_or_else(|| "nothing".to_string(), Value::to_string)
}

fn present<'a>(path: &str, actual: Option<&'a Value>) -> Result<&'a Value, String> {
    actual.ok_or_else(|| format!("{}: missing", at(path)))
}

fn test_literal(path: &str, pattern: &Value, actual: &Value, partial: bool) -> Result<(), String> {
    match pattern {
        Value::Object(expected) => {
            let entries = expected
                .iter()
                .map(|(k, v)| {
                    (
                        k.clone(),
                        Match::Literal {
                            pattern: v.clone(),
                            partial_objects: partial,
                        },
                    )
                })
                .collect();
            test_object(path, &entries, actual, partial)
        }
        Value::Array(expected) => {
            let elements: Vec<Match> = expected
                .iter()
                .map(|v| Match::Literal {
                    pattern: v.clone(),
                    partial_objects: partial,
                })
                .collect();
            test_array(path, &elements, actual, false)
        }
        scalar if scalar == actual => Ok(()),
        scalar => Err(format!("{}: expected {}, found {}", at(path), scalar, actual)),
    }
}

fn test_object(
    path: &str,
    pattern: &BTreeMap<String, Match>,
    actual: &Value,
    partial: bool,
) -> Result<(), String> {
    let Value::Object(actual) = actual else {
        return Err(format!("{}: expected an object, found {}", at(path), actual));
    };

    if !partial {
        if let Some(extra) = actual.keys().find(|k| !pattern.contains_key(k.as_str())) {
            return Err(format!("{}/{}: unexpected key", path, extra));
        }
    }

    for (key, matcher) in pattern {
        matcher.test_at(&format!("{}/{}", path, key), actual.get(key))?;
    }
    Ok(())
}

fn test_array(
    path: &str,
    pattern: &[Match],
    actual: &Value,
    subsequence: bool,
) -> Result<(), String> {
    let Value::Array(actual) = actual else {
        return Err(format!("{}: expected an array, found {}", at(path), actual));
    };

    if !subsequence {
        if pattern.len() != actual.len() {
            return Err(format!(
                "{}: expected an array of length {}, found length {}",
                at(path),
                pattern.len(),
                actual.len()
            ));
        }
        for (i, (matcher, element)) in pattern.iter().zip(actual).enumerate() {
            matcher.test_at(&format!("{}/{}", path, i), Some(element))?;
        }
        return Ok(());
    }

    // Greedy ordered search: each pattern element takes the first match after
    // the previous one
    let mut next = 0;
    for (i, matcher) in pattern.iter().enumerate() {
        let found = actual[next..]
            .iter()
            .position(|element| matcher.test_at(path, Some(element)).is_ok());
        match found {
            Some(offset) => next += offset + 1,
            None => {
                return Err(format!(
                    "{}: could not match pattern element {} in order against {}",
                    at(path),
                    i,
                    Value::Array(actual.clone())
                ))
            }
        }
    }
    Ok(())
}
