//! Property tests for operator semantics

use core_types::{ops, BinaryOp, CompareOp, RuntimeFault, Value};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_int_add_matches_checked_add(a in any::<i64>(), b in any::<i64>()) {
        let result = ops::binary(BinaryOp::Add, &Value::Int(a), &Value::Int(b));
        match a.checked_add(b) {
            Some(sum) => prop_assert_eq!(result.unwrap(), Value::Int(sum)),
            None => prop_assert!(matches!(result, Err(RuntimeFault::ArithmeticOverflow(_)))),
        }
    }

    #[test]
    fn prop_compare_lt_is_antisymmetric(a in -1000i64..1000, b in -1000i64..1000) {
        let lt = ops::compare(CompareOp::Lt, &Value::Int(a), &Value::Int(b)).unwrap();
        let gt = ops::compare(CompareOp::Gt, &Value::Int(b), &Value::Int(a)).unwrap();
        prop_assert_eq!(lt, gt);
    }

    #[test]
    fn prop_elementwise_matches_scalar(xs in proptest::collection::vec(-100i64..100, 0..16), k in -100i64..100) {
        let list = Value::List(xs.iter().copied().map(Value::Int).collect());
        let result = ops::binary(BinaryOp::Mul, &list, &Value::Int(k)).unwrap();
        let expected = Value::List(xs.iter().map(|x| Value::Int(x * k)).collect());
        prop_assert_eq!(result, expected);
    }
}

#[test]
fn test_not_never_faults() {
    assert_eq!(ops::not(&Value::None), Value::Bool(true));
    assert_eq!(ops::not(&Value::from("x")), Value::Bool(false));
}
