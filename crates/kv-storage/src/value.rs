//! Attribute values stored in items

use std::collections::HashMap;
use std::fmt;

/// A number kept as its decimal text, so no precision is lost in storage
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Number(String);

impl Number {
    /// Parse decimal text: optional sign, digits with an optional fraction,
    /// and an optional exponent (`12`, `-0.5`, `.5`, `1e10`).
    pub fn parse(text: &str) -> Option<Self> {
        if is_decimal_literal(text) {
            Some(Number(text.to_string()))
        } else {
            None
        }
    }

    /// Finite floats only; the text is the shortest form that reads back exactly
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_finite() {
            Some(Number(value.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_integral(&self) -> bool {
        !self.0.contains(['.', 'e', 'E'])
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.0.parse().ok()
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number(value.to_string())
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_decimal_literal(text: &str) -> bool {
    let body = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };

    let (whole, fraction) = match mantissa.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (mantissa, None),
    };
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let mantissa_ok = all_digits(whole)
        && fraction.map_or(true, all_digits)
        && (!whole.is_empty() || fraction.is_some_and(|f| !f.is_empty()));

    let exponent_ok = exponent.map_or(true, |exp| {
        let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
        !digits.is_empty() && all_digits(digits)
    });

    mantissa_ok && exponent_ok
}

/// An item: attribute name to value
pub type Item = HashMap<String, AttributeValue>;

/// The ten attribute value kinds
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Binary(Vec<u8>),
    BinarySet(Vec<Vec<u8>>),
    Bool(bool),
    List(Vec<AttributeValue>),
    Map(HashMap<String, AttributeValue>),
    Number(Number),
    NumberSet(Vec<Number>),
    Null,
    String(String),
    StringSet(Vec<String>),
}

impl AttributeValue {
    /// Short type descriptor (`S`, `N`, `BOOL`, ...)
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeValue::Binary(_) => "B",
            AttributeValue::BinarySet(_) => "BS",
            AttributeValue::Bool(_) => "BOOL",
            AttributeValue::List(_) => "L",
            AttributeValue::Map(_) => "M",
            AttributeValue::Number(_) => "N",
            AttributeValue::NumberSet(_) => "NS",
            AttributeValue::Null => "NULL",
            AttributeValue::String(_) => "S",
            AttributeValue::StringSet(_) => "SS",
        }
    }

    /// Values usable as key attributes
    pub fn is_scalar_key(&self) -> bool {
        matches!(
            self,
            AttributeValue::String(_) | AttributeValue::Number(_) | AttributeValue::Binary(_)
        )
    }
}
