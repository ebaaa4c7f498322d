use serde_json::Value;
use std::fmt;

/// The kind of JSON value a declared parameter or return value must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    /// A whole number that fits `i64` or `u64`.
    Integral,
    /// Any JSON number, whole or fractional.
    Numeric,
    String,
    Array,
    Object,
}

impl ValueKind {
    pub fn matches(self, value: &Value) -> bool {
        match self {
            ValueKind::Bool => value.is_boolean(),
            ValueKind::Integral => value.is_i64() || value.is_u64(),
            ValueKind::Numeric => value.is_number(),
            ValueKind::String => value.is_string(),
            ValueKind::Array => value.is_array(),
            ValueKind::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Integral => "integral",
            ValueKind::Numeric => "numeric",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integral_rejects_fractions() {
        assert!(ValueKind::Integral.matches(&json!(3)));
        assert!(ValueKind::Integral.matches(&json!(u64::MAX)));
        assert!(!ValueKind::Integral.matches(&json!(3.5)));
        assert!(!ValueKind::Integral.matches(&json!("3")));
    }

    #[test]
    fn numeric_accepts_any_number() {
        assert!(ValueKind::Numeric.matches(&json!(3)));
        assert!(ValueKind::Numeric.matches(&json!(-0.25)));
        assert!(!ValueKind::Numeric.matches(&json!(null)));
    }

    #[test]
    fn container_kinds() {
        assert!(ValueKind::Array.matches(&json!([1, 2])));
        assert!(ValueKind::Object.matches(&json!({ "a": 1 })));
        assert!(!ValueKind::Object.matches(&json!([])));
        assert!(ValueKind::Bool.matches(&json!(false)));
        assert!(ValueKind::String.matches(&json!("")));
    }
}
