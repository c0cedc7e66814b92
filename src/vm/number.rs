use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};
use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

/// An arbitrary-precision "big float". The dialect has no numeric tower:
/// every literal, whatever its radix or exactness prefix, lands here, and
/// two numbers are the same number exactly when their values compare equal.
#[derive(Debug, Clone)]
pub struct Number(Rc<BigDecimal>);

impl Number {
    pub fn from_i64(x: i64) -> Number {
        Number(Rc::new(BigDecimal::from(x)))
    }

    pub fn from_usize(x: usize) -> Number {
        Number(Rc::new(BigDecimal::from(x as u64)))
    }

    pub fn from_bigint(x: BigInt) -> Number {
        Number(Rc::new(BigDecimal::from(x)))
    }

    /// Builds numerator/denominator, as parsed from a `n/d` literal.
    /// Returns `None` for a zero denominator.
    pub fn from_ratio(numerator: BigInt, denominator: BigInt) -> Option<Number> {
        if denominator.is_zero() {
            return None;
        }
        let n = BigDecimal::from(numerator);
        let d = BigDecimal::from(denominator);
        Some(Number(Rc::new(n / d)))
    }

    /// Parses a decimal literal, including exponent notation. Leading `+`
    /// and a bare leading `.` are accepted; an empty or sign-only string
    /// is not a number.
    pub fn parse_decimal(text: &str) -> Option<Number> {
        let unsigned = match text.strip_prefix('+') {
            Some(rest) => rest,
            None => text,
        };
        if unsigned.is_empty() || unsigned == "-" || unsigned == "." || unsigned == "-." {
            return None;
        }
        let owned;
        let normalized = if let Some(frac) = unsigned.strip_prefix('.') {
            owned = format!("0.{}", frac);
            &owned[..]
        } else if let Some(frac) = unsigned.strip_prefix("-.") {
            owned = format!("-0.{}", frac);
            &owned[..]
        } else {
            unsigned
        };
        BigDecimal::from_str(normalized)
            .ok()
            .map(|d| Number(Rc::new(d)))
    }

    /// The value as an `i64`, when it is exactly an integer in range.
    pub fn to_i64(&self) -> Option<i64> {
        if !self.0.is_integer() {
            return None;
        }
        self.0.to_i64()
    }

    /// The value as a non-negative index.
    pub fn to_index(&self) -> Option<usize> {
        if !self.0.is_integer() || self.0.is_negative() {
            return None;
        }
        self.0.to_u64().map(|x| x as usize)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn add(&self, other: &Number) -> Number {
        Number(Rc::new(&*self.0 + &*other.0))
    }

    pub fn sub(&self, other: &Number) -> Number {
        Number(Rc::new(&*self.0 - &*other.0))
    }

    pub fn mul(&self, other: &Number) -> Number {
        Number(Rc::new(&*self.0 * &*other.0))
    }

    /// Division; `None` for a zero divisor (there is no infinity here).
    pub fn div(&self, other: &Number) -> Option<Number> {
        if other.is_zero() {
            return None;
        }
        Some(Number(Rc::new(&*self.0 / &*other.0)))
    }

    pub fn neg(&self) -> Number {
        Number(Rc::new(-&*self.0))
    }

    pub fn recip(&self) -> Option<Number> {
        if self.is_zero() {
            return None;
        }
        Some(Number(Rc::new(BigDecimal::from(1) / &*self.0)))
    }

    /// `quotient`: divide and truncate toward zero.
    pub fn truncate_quotient(&self, other: &Number) -> Option<Number> {
        if other.is_zero() {
            return None;
        }
        let quo = (&*self.0 / &*other.0).with_scale_round(0, RoundingMode::Down);
        Some(Number(Rc::new(quo)))
    }

    pub fn cmp(&self, other: &Number) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        self.0 == other.0
    }
}

impl fmt::Display for Number {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.0.normalized())
    }
}

#[cfg(test)]
mod test {
    use super::Number;
    use num_bigint::BigInt;

    #[test]
    fn parse_and_print() {
        assert_eq!(Number::parse_decimal("42").unwrap().to_string(), "42");
        assert_eq!(Number::parse_decimal("+42").unwrap().to_string(), "42");
        assert_eq!(Number::parse_decimal("-0.50").unwrap().to_string(), "-0.5");
        assert_eq!(Number::parse_decimal(".5").unwrap().to_string(), "0.5");
        assert_eq!(Number::parse_decimal("1e3").unwrap().to_string(), "1000");
        assert!(Number::parse_decimal("").is_none());
        assert!(Number::parse_decimal(".").is_none());
        assert!(Number::parse_decimal("-").is_none());
        assert!(Number::parse_decimal("1.2.3").is_none());
    }

    #[test]
    fn value_equality_ignores_literal_form() {
        let a = Number::parse_decimal("2").unwrap();
        let b = Number::parse_decimal("2.000").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn ratio() {
        let half = Number::from_ratio(BigInt::from(1), BigInt::from(2)).unwrap();
        assert_eq!(half.to_string(), "0.5");
        assert!(Number::from_ratio(BigInt::from(1), BigInt::from(0)).is_none());
    }

    #[test]
    fn quotient_truncates_toward_zero() {
        let a = Number::from_i64(7);
        let b = Number::from_i64(2);
        assert_eq!(a.truncate_quotient(&b).unwrap().to_string(), "3");
        let a = Number::from_i64(-7);
        assert_eq!(a.truncate_quotient(&b).unwrap().to_string(), "-3");
        assert!(b.truncate_quotient(&Number::from_i64(0)).is_none());
    }

    #[test]
    fn index_extraction() {
        assert_eq!(Number::from_i64(3).to_index(), Some(3));
        assert_eq!(Number::from_i64(-1).to_index(), None);
        assert_eq!(Number::parse_decimal("2.5").unwrap().to_index(), None);
    }
}
