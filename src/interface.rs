use std::{
    borrow::Cow,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::error::{ParameterTypeError, PromptsubResult};

/// A parameter value. Only text, integers and reals are accepted.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Real(f64),
}

impl Value {
    /// The text this value substitutes as, and compares against.
    ///
    /// Integral reals keep a trailing `.0` so they never compare equal to the
    /// integer of the same magnitude.
    ///
    /// ```
    /// use promptsub::Value;
    ///
    /// assert_eq!(Value::from(26).to_text(), "26");
    /// assert_eq!(Value::from(1.0).to_text(), "1.0");
    /// assert_eq!(Value::from(2.5).to_text(), "2.5");
    /// ```
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Integer(value) => Cow::Owned(value.to_string()),
            Self::Real(value) if value.is_finite() && value.fract() == 0.0 => {
                Cow::Owned(format!("{value:.1}"))
            }
            Self::Real(value) => Cow::Owned(value.to_string()),
        }
    }

    /// Empty text counts as no value at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Integer(_) | Self::Real(_) => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

// Accepts exactly the kinds `TryFrom<serde_json::Value>` accepts, so both
// paths agree on which parameters are valid.
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ValueVisitor;

        impl serde::de::Visitor<'_> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string, an integer or a real number")
            }

            fn visit_str<E: serde::de::Error>(self, value: &str) -> Result<Value, E> {
                Ok(Value::Text(value.to_owned()))
            }

            fn visit_string<E: serde::de::Error>(self, value: String) -> Result<Value, E> {
                Ok(Value::Text(value))
            }

            fn visit_i64<E: serde::de::Error>(self, value: i64) -> Result<Value, E> {
                Ok(Value::Integer(value))
            }

            fn visit_u64<E: serde::de::Error>(self, value: u64) -> Result<Value, E> {
                i64::try_from(value).map(Value::Integer).map_err(|_| {
                    E::custom(format_args!("integer {value} does not fit in 64 signed bits"))
                })
            }

            fn visit_f64<E: serde::de::Error>(self, value: f64) -> Result<Value, E> {
                Ok(Value::Real(value))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Real(f64::from(value))
    }
}

/// A flat mapping of parameter names to values.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Parameters {
    data: BTreeMap<String, Value>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<K: Into<String>, V: Into<Value>>(&mut self, name: K, value: V) -> &mut Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn get<T: AsRef<str>>(&self, name: T) -> Option<&Value> {
        self.data.get(name.as_ref())
    }

    pub fn contains<T: AsRef<str>>(&self, name: T) -> bool {
        self.data.contains_key(name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

impl TryFrom<&serde_json::Value> for Parameters {
    type Error = ParameterTypeError;

    /// Validates dynamic input. The whole mapping is checked before anything
    /// is returned.
    fn try_from(json: &serde_json::Value) -> Result<Self, Self::Error> {
        let serde_json::Value::Object(map) = json else {
            tracing::debug!(found = json_kind(json), "rejected parameters");
            return Err(ParameterTypeError::NotAMapping {
                found: json_kind(json).to_owned(),
            });
        };

        let mut parameters = Self::new();
        for (key, value) in map {
            let value = match value {
                serde_json::Value::String(text) => Value::Text(text.clone()),
                serde_json::Value::Number(number) => {
                    if let Some(integer) = number.as_i64() {
                        Value::Integer(integer)
                    } else if number.is_u64() {
                        tracing::debug!(key = key.as_str(), "rejected parameters");
                        return Err(ParameterTypeError::IntegerOutOfRange { key: key.clone() });
                    } else if let Some(real) = number.as_f64() {
                        Value::Real(real)
                    } else {
                        return Err(ParameterTypeError::InvalidValue {
                            key: key.clone(),
                            found: json_kind(value).to_owned(),
                        });
                    }
                }
                serde_json::Value::Null
                | serde_json::Value::Bool(_)
                | serde_json::Value::Array(_)
                | serde_json::Value::Object(_) => {
                    tracing::debug!(
                        key = key.as_str(),
                        found = json_kind(value),
                        "rejected parameters"
                    );
                    return Err(ParameterTypeError::InvalidValue {
                        key: key.clone(),
                        found: json_kind(value).to_owned(),
                    });
                }
            };
            parameters.insert(key.clone(), value);
        }
        Ok(parameters)
    }
}

impl TryFrom<serde_json::Value> for Parameters {
    type Error = ParameterTypeError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        Self::try_from(&json)
    }
}

/// Controls how a rendered prompt is post-processed.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EvaluateOptions {
    /// Collapse every whitespace run in the final output to a single space
    /// and trim both ends.
    pub normalize_whitespace: bool,
}

impl Default for EvaluateOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl EvaluateOptions {
    pub const fn new() -> Self {
        Self {
            normalize_whitespace: true,
        }
    }

    #[must_use]
    pub const fn with_normalize_whitespace(mut self, enabled: bool) -> Self {
        self.normalize_whitespace = enabled;
        self
    }
}

/// Variable names used by one top-level alternative.
///
/// `required` holds names referenced directly in the alternative, `optional`
/// holds names referenced anywhere inside its bracketed blocks. A name may
/// appear in both.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Variables {
    pub required: BTreeSet<String>,
    pub optional: BTreeSet<String>,
}

/// `PromptInterface` is a registry of named prompts that can be rendered by
/// name.
pub trait PromptInterface {
    /// `add_template` compiles `content` and makes it available as `name`.
    ///
    /// # Errors
    /// - If the template name is a duplicate.
    /// - If the template has a syntax error.
    fn add_template<N: Into<String>, C: AsRef<str>>(
        &mut self,
        name: N,
        content: C,
    ) -> PromptsubResult<()>;

    /// `render` substitutes `parameters` into the named template.
    ///
    /// # Errors
    /// - If the template name is not found.
    fn render<N: AsRef<str>>(
        &self,
        template_name: N,
        parameters: &Parameters,
        options: EvaluateOptions,
    ) -> PromptsubResult<String>;

    /// `variables` returns the required and optional variable names of every
    /// top-level alternative of the named template.
    ///
    /// # Errors
    /// - If the template name is not found.
    fn variables<N: AsRef<str>>(&self, template_name: N) -> PromptsubResult<&[Variables]>;
}
