//! Decimal values backed by Arrow's `Decimal128` layout.
//!
//! The planner only needs decimals to express rounding, but the evaluator in the test utilities
//! also compares and rounds concrete values, so the arithmetic lives here.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use arrow::datatypes::DECIMAL128_MAX_PRECISION;
use arrow_buffer::i256;

/// Maximum precision supported by `DecimalValue` (aligns with Arrow's Decimal128).
pub const MAX_DECIMAL_PRECISION: u8 = DECIMAL128_MAX_PRECISION;
const POW10_BASE: i256 = i256::from_i128(10);

/// Errors that can occur while manipulating decimal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecimalError {
    /// Requested scale falls outside the supported range.
    ScaleOutOfRange { scale: i8 },
    /// Result exceeded the maximum representable precision.
    PrecisionOverflow { value: i128, scale: i8 },
    /// Arithmetic overflowed the Decimal128 range.
    Overflow,
    /// The text is not a decimal number.
    Malformed(String),
}

impl fmt::Display for DecimalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalError::ScaleOutOfRange { scale } => {
                write!(f, "decimal scale {scale} outside supported range")
            }
            DecimalError::PrecisionOverflow { value, scale } => {
                write!(
                    f,
                    "decimal value {value} with scale {scale} exceeds maximum precision"
                )
            }
            DecimalError::Overflow => write!(f, "decimal arithmetic overflow"),
            DecimalError::Malformed(text) => write!(f, "could not parse \"{text}\" as decimal"),
        }
    }
}

impl std::error::Error for DecimalError {}

/// Runtime representation of a Decimal128 value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DecimalValue {
    value: i128,
    scale: i8,
}

impl DecimalValue {
    /// Create a decimal from its raw parts, validating precision bounds.
    pub fn new(value: i128, scale: i8) -> Result<Self, DecimalError> {
        if !scale_within_bounds(scale as i16) {
            return Err(DecimalError::ScaleOutOfRange { scale });
        }
        if digit_count(value) > MAX_DECIMAL_PRECISION {
            return Err(DecimalError::PrecisionOverflow { value, scale });
        }
        Ok(Self { value, scale })
    }

    /// Construct a decimal from an integer with zero scale.
    pub fn from_i64(value: i64) -> Self {
        Self {
            value: value as i128,
            scale: 0,
        }
    }

    #[inline]
    pub fn raw_value(self) -> i128 {
        self.value
    }

    /// Number of fractional digits.
    #[inline]
    pub fn scale(self) -> i8 {
        self.scale
    }

    /// Total digit count.
    #[inline]
    pub fn precision(self) -> u8 {
        digit_count(self.value)
    }

    /// Convert the decimal into an `f64` (lossy for high precision inputs).
    pub fn to_f64(self) -> f64 {
        if self.value == 0 {
            return 0.0;
        }
        let denominator = 10_f64.powi(self.scale as i32);
        (self.value as f64) / denominator
    }

    /// Round to `scale` fractional digits, half away from zero.
    ///
    /// Raising the scale pads with zeros. Rounding never checks the precision of the column the
    /// value is headed for; overflow of the declared precision is detected when the value is
    /// written.
    pub fn round_to_scale(self, scale: i8) -> Result<Self, DecimalError> {
        if !scale_within_bounds(scale as i16) {
            return Err(DecimalError::ScaleOutOfRange { scale });
        }
        match scale.cmp(&self.scale) {
            Ordering::Equal => Ok(self),
            Ordering::Greater => {
                let factor = pow10((scale - self.scale) as u32)?;
                let value = self
                    .value
                    .checked_mul(factor)
                    .ok_or(DecimalError::Overflow)?;
                Self::new(value, scale)
            }
            Ordering::Less => {
                let divisor = pow10((self.scale - scale) as u32)?;
                let quotient = self.value / divisor;
                let remainder = self.value % divisor;
                let adjust = if remainder.unsigned_abs() * 2 >= divisor.unsigned_abs() {
                    self.value.signum()
                } else {
                    0
                };
                Self::new(quotient + adjust, scale)
            }
        }
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale <= 0 {
            return write!(f, "{}", self.value);
        }
        let negative = self.value < 0;
        let digits = self.value.unsigned_abs().to_string();
        let scale = self.scale as usize;
        if negative {
            f.write_str("-")?;
        }
        if digits.len() <= scale {
            f.write_str("0.")?;
            for _ in digits.len()..scale {
                f.write_str("0")?;
            }
            return f.write_str(&digits);
        }
        let split = digits.len() - scale;
        f.write_str(&digits[..split])?;
        f.write_str(".")?;
        f.write_str(&digits[split..])
    }
}

impl FromStr for DecimalValue {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        let digits_ok = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        let unsigned = int_part.strip_prefix(['-', '+']).unwrap_or(int_part);
        if (unsigned.is_empty() && frac_part.is_empty())
            || !digits_ok(unsigned)
            || !digits_ok(frac_part)
        {
            return Err(DecimalError::Malformed(s.to_string()));
        }

        let scale = frac_part.len();
        if scale > MAX_DECIMAL_PRECISION as usize {
            return Err(DecimalError::ScaleOutOfRange { scale: scale as i8 });
        }

        let combined = format!("{int_part}{frac_part}");
        let value = combined
            .parse::<i128>()
            .map_err(|_| DecimalError::Overflow)?;

        Self::new(value, scale as i8)
    }
}

impl PartialOrd for DecimalValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DecimalValue {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.scale == other.scale {
            return self.value.cmp(&other.value);
        }

        let max_scale = std::cmp::max(self.scale, other.scale);
        let scale_diff_self = (max_scale - self.scale) as u32;
        let scale_diff_other = (max_scale - other.scale) as u32;

        // i256 leaves headroom above the i128 range, so the rescaled values cannot wrap.
        let l_scaled =
            i256::from_i128(self.value).wrapping_mul(POW10_BASE.wrapping_pow(scale_diff_self));
        let r_scaled =
            i256::from_i128(other.value).wrapping_mul(POW10_BASE.wrapping_pow(scale_diff_other));

        l_scaled.cmp(&r_scaled)
    }
}

fn pow10(exp: u32) -> Result<i128, DecimalError> {
    10_i128.checked_pow(exp).ok_or(DecimalError::Overflow)
}

fn digit_count(value: i128) -> u8 {
    let mut magnitude = value.unsigned_abs();
    let mut count: u8 = 1;
    while magnitude >= 10 {
        magnitude /= 10;
        count += 1;
    }
    count
}

fn scale_within_bounds(scale: i16) -> bool {
    let max = MAX_DECIMAL_PRECISION as i16;
    (-max..=max).contains(&scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(text: &str) -> DecimalValue {
        text.parse().expect("valid decimal")
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(dec("1.235").round_to_scale(2).unwrap().to_string(), "1.24");
        assert_eq!(dec("-1.235").round_to_scale(2).unwrap().to_string(), "-1.24");
        assert_eq!(dec("1.234").round_to_scale(2).unwrap().to_string(), "1.23");
        assert_eq!(dec("0.5").round_to_scale(0).unwrap().to_string(), "1");
    }

    #[test]
    fn raising_scale_pads_zeros() {
        let rounded = dec("3.1").round_to_scale(3).unwrap();
        assert_eq!(rounded.raw_value(), 3100);
        assert_eq!(rounded.to_string(), "3.100");
    }

    #[test]
    fn rounding_is_idempotent() {
        let once = dec("12.34567").round_to_scale(3).unwrap();
        let twice = once.round_to_scale(3).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn compares_across_scales() {
        assert_eq!(dec("5").cmp(&dec("5.00")), Ordering::Equal);
        assert!(dec("1.5") < dec("1.51"));
        assert!(dec("-2") < dec("-1.99"));
    }

    #[test]
    fn display_pads_small_fractions() {
        assert_eq!(dec("0.05").to_string(), "0.05");
        assert_eq!(dec("-0.05").to_string(), "-0.05");
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!("1.2.3".parse::<DecimalValue>(), Err(DecimalError::Malformed(_))));
        assert!(matches!("abc".parse::<DecimalValue>(), Err(DecimalError::Malformed(_))));
    }
}
