//! Unit tests for Value

use core_types::Value;

#[cfg(test)]
mod value_tests {
    use super::*;

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(3), Value::Int(3));
        assert_eq!(Value::from(1.5), Value::Float(1.5));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from("x"), Value::Str("x".to_string()));
        assert_eq!(
            Value::from(vec![Value::Int(1)]),
            Value::List(vec![Value::Int(1)])
        );
    }

    #[test]
    fn test_default_is_none() {
        assert_eq!(Value::default(), Value::None);
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Int(2).as_f64(), Some(2.0));
        assert_eq!(Value::Float(2.5).as_int(), None);
        assert!(!Value::from("2").is_number());
    }

    #[test]
    fn test_serde_roundtrip_list() {
        let value = Value::List(vec![Value::Int(1), Value::from("a"), Value::None]);
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
