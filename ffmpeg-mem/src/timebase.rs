//! Rational timebases and timestamp arithmetic.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Seconds per tick, as `num / den`. The denominator is kept positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    num: i32,
    den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        if den < 0 {
            Self {
                num: -num,
                den: -den,
            }
        } else {
            Self { num, den }
        }
    }

    pub fn numerator(&self) -> i32 {
        self.num
    }

    pub fn denominator(&self) -> i32 {
        self.den
    }

    pub fn is_valid(&self) -> bool {
        self.num != 0 && self.den != 0
    }

    pub fn invert(&self) -> Self {
        Self::new(self.den, self.num)
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Converts `value` from ticks of `from` to ticks of `to`.
///
/// Rounds to nearest with halves away from zero and saturates at the `i64` range. The two
/// extreme values pass through untouched so sentinel timestamps survive rescaling.
pub fn rescale(value: i64, from: Rational, to: Rational) -> i64 {
    if value == i64::MIN || value == i64::MAX {
        return value;
    }
    let num = value as i128 * from.num as i128 * to.den as i128;
    let den = from.den as i128 * to.num as i128;
    if den == 0 {
        return if num < 0 { i64::MIN } else { i64::MAX };
    }
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let magnitude = (2 * num.abs() + den) / (2 * den);
    let rounded = if num < 0 { -magnitude } else { magnitude };
    rounded.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Compares two timestamps expressed in different timebases, exactly.
pub fn compare_ts(a: i64, tb_a: Rational, b: i64, tb_b: Rational) -> Ordering {
    let lhs = a as i128 * tb_a.num as i128 * tb_b.den as i128;
    let rhs = b as i128 * tb_b.num as i128 * tb_a.den as i128;
    lhs.cmp(&rhs)
}
