// Grok: an interpreter for the Grok programming language.
//
// Copyright (C) 2026  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

use std::fmt;

use crate::vm::{Error, Result};

// Stack cells and the register hold one of these. Integers and floats
// coexist; any float holding an exact integer collapses back to an
// integer whenever it leaves the stack, so integer arithmetic keeps
// full fidelity for large code points.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
}

// Factors out the shared shape of the promoting arithmetic operators:
// integer math while both sides are integers, float math otherwise.
// Integer overflow is a fault rather than a wrap.
macro_rules! arith {
    ($name:ident, $checked:ident, $op:tt) => {
        pub fn $name(self, other: Value) -> Result<Value> {
            use Value::*;
            match (self, other) {
                (Int(a), Int(b)) => a.$checked(b).map(Int).ok_or(Error::Overflow),
                (a, b) => Ok(Float(a.as_f64() $op b.as_f64())),
            }
        }
    };
}

impl Value {
    arith! { add, checked_add, + }
    arith! { sub, checked_sub, - }
    arith! { mul, checked_mul, * }

    // Division always happens in floating point, whatever came in.
    pub fn div(self, other: Value) -> Result<Value> {
        let divisor = other.as_f64();
        if divisor == 0.0 {
            return Err(Error::DivideByZero);
        }
        Ok(Value::Float(self.as_f64() / divisor))
    }

    // Floored modulo: the result takes the divisor's sign.
    pub fn rem(self, other: Value) -> Result<Value> {
        use Value::*;
        match (self, other) {
            (_, Int(0)) => Err(Error::DivideByZero),
            (Int(a), Int(b)) => {
                let r = a.checked_rem(b).ok_or(Error::Overflow)?;
                Ok(Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
            }
            (a, b) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                if b == 0.0 {
                    return Err(Error::DivideByZero);
                }
                let r = a % b;
                Ok(Float(if r != 0.0 && (r < 0.0) != (b < 0.0) {
                    r + b
                } else {
                    r
                }))
            }
        }
    }

    pub fn eq(self, other: Value) -> bool {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }

    pub fn gt(self, other: Value) -> bool {
        use Value::*;
        match (self, other) {
            (Int(a), Int(b)) => a > b,
            (a, b) => a.as_f64() > b.as_f64(),
        }
    }

    pub fn is_zero(self) -> bool {
        match self {
            Value::Int(n) => n == 0,
            Value::Float(f) => f == 0.0,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Value::Int(n) => n as f64,
            Value::Float(f) => f,
        }
    }

    // Truncation toward zero, the way the character instructions read
    // their operand.
    pub fn truncate(self) -> i64 {
        match self {
            Value::Int(n) => n,
            Value::Float(f) => f as i64,
        }
    }

    // Collapse a float holding an exact in-range integer back into an
    // integer. Applied to every value leaving the stack.
    pub fn normalize(self) -> Value {
        match self {
            Value::Float(f)
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 =>
            {
                Value::Int(f as i64)
            }
            v => v,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value::*;
    use super::*;

    #[test]
    fn integer_arithmetic_stays_integer() {
        assert_eq!(Int(3).add(Int(4)), Ok(Int(7)));
        assert_eq!(Int(3).sub(Int(5)), Ok(Int(-2)));
        assert_eq!(Int(3).mul(Int(4)), Ok(Int(12)));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        assert_eq!(Int(3).add(Float(0.5)), Ok(Float(3.5)));
        assert_eq!(Float(1.5).mul(Int(2)), Ok(Float(3.0)));
    }

    #[test]
    fn integer_overflow_is_a_fault() {
        assert_eq!(Int(i64::MAX).add(Int(1)), Err(Error::Overflow));
        assert_eq!(Int(i64::MIN).sub(Int(1)), Err(Error::Overflow));
        assert_eq!(Int(i64::MIN).rem(Int(-1)), Err(Error::Overflow));
    }

    #[test]
    fn division_is_always_floating_point() {
        assert_eq!(Int(8).div(Int(2)), Ok(Float(4.0)));
        assert_eq!(Int(8).div(Int(5)), Ok(Float(1.6)));
        assert_eq!(Int(1).div(Int(0)), Err(Error::DivideByZero));
        assert_eq!(Float(1.0).div(Float(0.0)), Err(Error::DivideByZero));
    }

    #[test]
    fn modulo_follows_the_divisor_sign() {
        assert_eq!(Int(7).rem(Int(3)), Ok(Int(1)));
        assert_eq!(Int(-5).rem(Int(3)), Ok(Int(1)));
        assert_eq!(Int(5).rem(Int(-3)), Ok(Int(-1)));
        assert_eq!(Float(-5.5).rem(Int(2)), Ok(Float(0.5)));
        assert_eq!(Int(5).rem(Int(0)), Err(Error::DivideByZero));
    }

    #[test]
    fn comparison_crosses_the_type_split() {
        assert!(Int(2).eq(Float(2.0)));
        assert!(Float(2.5).gt(Int(2)));
        assert!(!Int(2).gt(Int(3)));
    }

    #[test]
    fn normalization_collapses_exact_floats() {
        assert_eq!(Float(4.0).normalize(), Int(4));
        assert_eq!(Float(-0.0).normalize(), Int(0));
        assert_eq!(Float(4.5).normalize(), Float(4.5));
        assert_eq!(Int(4).normalize(), Int(4));
        assert_eq!(Float(1e300).normalize(), Float(1e300));
        assert!(matches!(Float(f64::NAN).normalize(), Float(_)));
    }

    #[test]
    fn display_drops_the_point_for_integers() {
        assert_eq!(Int(42).to_string(), "42");
        assert_eq!(Float(1.6).to_string(), "1.6");
        assert_eq!(Int(-7).to_string(), "-7");
    }
}
