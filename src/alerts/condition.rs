//! Threshold evaluation

use super::Operator;
use crate::probe::Scalar;

/// Compare a probe value against a rule threshold.
///
/// When both sides coerce to a number the comparison is numeric. Otherwise
/// only `eq` and `ne` are meaningful and compare the string renderings;
/// ordering operators on non-numeric values never trigger.
pub fn evaluate(actual: &Scalar, op: Operator, expected: &Scalar) -> bool {
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return match op {
            Operator::Gt => a > b,
            Operator::Lt => a < b,
            Operator::Gte => a >= b,
            Operator::Lte => a <= b,
            Operator::Eq => a == b,
            Operator::Ne => a != b,
        };
    }

    match op {
        Operator::Eq => actual.to_string() == expected.to_string(),
        Operator::Ne => actual.to_string() != expected.to_string(),
        _ => false,
    }
}
