use serde_json::Value;

/// Shape of a single key in a partial-update body.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Omitted,
    Null,
    Bool(bool),
    Number(&'a serde_json::Number),
    String(&'a str),
    Other(&'a Value),
}

impl<'a> FieldValue<'a> {
    /// JavaScript truthiness: `null`, `false`, `0` and `""` count as absent.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Omitted | Self::Null => true,
            Self::Bool(value) => !value,
            Self::Number(number) => number.as_f64().map_or(false, |n| n == 0.0),
            Self::String(text) => text.is_empty(),
            Self::Other(_) => false,
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Omitted)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Omitted => "nothing",
            Self::Null => "null",
            Self::Bool(_) => "a boolean",
            Self::Number(_) => "a number",
            Self::String(_) => "a string",
            Self::Other(Value::Array(_)) => "an array",
            Self::Other(_) => "an object",
        }
    }
}

pub fn classify(optional_value: Option<&Value>) -> FieldValue<'_> {
    match optional_value {
        None => FieldValue::Omitted,
        Some(Value::Null) => FieldValue::Null,
        Some(Value::Bool(b)) => FieldValue::Bool(*b),
        Some(Value::Number(n)) => FieldValue::Number(n),
        Some(Value::String(s)) => FieldValue::String(s),
        Some(other) => FieldValue::Other(other),
    }
}
