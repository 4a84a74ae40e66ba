//   Copyright 2025 affregion developers
//
//   Licensed under the Apache License, Version 2.0 (the "License");
//   you may not use this file except in compliance with the License.
//   You may obtain a copy of the License at
//
//       http://www.apache.org/licenses/LICENSE-2.0
//
//   Unless required by applicable law or agreed to in writing, software
//   distributed under the License is distributed on an "AS IS" BASIS,
//   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//   See the License for the specific language governing permissions and
//   limitations under the License.

//! Decimal-exact scalar arithmetic
//!
//! Coefficients of affine expressions are combined many times over the course of an
//! enumeration: every layer multiplies them with weights and sums up one term per node.
//! Doing this in binary floating point accumulates visible drift. Instead, each `f64`
//! operand is read through its shortest decimal literal (the same digits `{}` would print)
//! into a [`Decimal`], all combinations happen in decimal, and the result is converted
//! back to `f64` only when requested.
//!
//! ```rust
//! use affregion::linalg::exact;
//!
//! assert_eq!(exact::add(0.1, 0.2).unwrap(), 0.3);
//! assert_eq!(exact::multiply(0.1, 3.0).unwrap(), 0.3);
//! ```
//!
//! [`Decimal`] keeps at most 28 fractional digits. Products that need more digits are rounded
//! to that scale; values that do not fit at all are reported as [`PrecisionError`] rather
//! than silently approximated.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum PrecisionError {
    #[error("Operand {0} is not a finite number")]
    NonFinite(f64),
    #[error("Operand {0} cannot be represented as an exact decimal")]
    Unrepresentable(f64),
    #[error("Exact decimal arithmetic overflowed")]
    Overflow,
    #[error("Decimal {0} cannot be converted to a float")]
    Conversion(Decimal),
}

/// Reads ``value`` through its shortest decimal literal.
///
/// For example, `0.1` becomes exactly one tenth, not the binary fraction closest to it.
pub fn to_decimal(value: f64) -> Result<Decimal, PrecisionError> {
    if !value.is_finite() {
        return Err(PrecisionError::NonFinite(value));
    }
    if value == 0.0 {
        return Ok(Decimal::ZERO);
    }

    // LowerExp prints the shortest round-trip digits, e.g. 1234.5 -> "1.2345e3"
    let literal = format!("{:e}", value);
    Decimal::from_scientific(&literal).map_err(|_| PrecisionError::Unrepresentable(value))
}

/// Converts an exact value back to the nearest `f64`.
///
/// Zero is always returned as positive zero, regardless of the sign flag of ``value``.
pub fn to_float(value: Decimal) -> Result<f64, PrecisionError> {
    if value.is_zero() {
        return Ok(0.0);
    }
    value.to_f64().ok_or(PrecisionError::Conversion(value))
}

#[inline]
pub fn checked_add(lhs: Decimal, rhs: Decimal) -> Result<Decimal, PrecisionError> {
    lhs.checked_add(rhs).ok_or(PrecisionError::Overflow)
}

#[inline]
pub fn checked_mul(lhs: Decimal, rhs: Decimal) -> Result<Decimal, PrecisionError> {
    lhs.checked_mul(rhs).ok_or(PrecisionError::Overflow)
}

/// Adds two floats exactly in decimal and rounds the sum back to `f64`.
pub fn add(lhs: f64, rhs: f64) -> Result<f64, PrecisionError> {
    to_float(checked_add(to_decimal(lhs)?, to_decimal(rhs)?)?)
}

/// Multiplies two floats exactly in decimal and rounds the product back to `f64`.
pub fn multiply(lhs: f64, rhs: f64) -> Result<f64, PrecisionError> {
    to_float(checked_mul(to_decimal(lhs)?, to_decimal(rhs)?)?)
}
