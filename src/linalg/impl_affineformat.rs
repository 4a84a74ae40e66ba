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

//! Format affine functions and polytopes
//!
//! Inputs are rendered as `x0, x1, ...`. Large instances are elided with ellipses according
//! to the row and axis ranges of [`FormatOptions`].

use core::fmt;
use core::iter::zip;
use std::fmt::{Debug, Display};
use std::ops::{Bound, RangeBounds};

use itertools::Itertools;
use itertools::Position::{First, Last, Middle, Only};
use ndarray::{ArrayView1, Data};

use super::affine::{AffFuncBase, AffFuncView, FunctionT, PolytopeT, PolytopeView};

#[derive(Debug, PartialEq, Clone)]
pub struct FormatOptions {
    /// Sort coefficients by descending magnitude once a row has at least this many of them (0 disables sorting)
    pub sort_coefficients: usize,
    /// Omit the linear part of an affine combination whose coefficients are all zero
    pub simplify_zero: bool,
    /// Print constraints without coefficients as ⊤ or ⊥
    pub simplify_tautologies: bool,
    /// Scale each constraint so that its largest coefficient has magnitude one
    pub normalize: bool,
    /// Coefficient positions replaced by an ellipsis
    pub skip_axes: (Bound<i32>, Bound<i32>),
    /// Row positions replaced by a vertical ellipsis
    pub skip_rows: (Bound<i32>, Bound<i32>),
}

const SHOW_ALL: (Bound<i32>, Bound<i32>) = (Bound::Included(1), Bound::Excluded(0));

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            sort_coefficients: 0,
            simplify_zero: false,
            simplify_tautologies: false,
            normalize: false,
            skip_axes: SHOW_ALL,
            skip_rows: SHOW_ALL,
        }
    }
}

impl FormatOptions {
    pub fn default_func() -> FormatOptions {
        FormatOptions {
            simplify_zero: true,
            skip_axes: (Bound::Included(16), Bound::Unbounded),
            skip_rows: (Bound::Included(8), Bound::Unbounded),
            ..Default::default()
        }
    }

    pub fn default_poly() -> FormatOptions {
        FormatOptions {
            sort_coefficients: 6,
            simplify_tautologies: true,
            normalize: true,
            skip_axes: (Bound::Included(16), Bound::Unbounded),
            skip_rows: (Bound::Included(8), Bound::Unbounded),
            ..Default::default()
        }
    }

    pub fn show_all_rows(mut self) -> Self {
        self.skip_rows = SHOW_ALL;
        self
    }

    pub fn show_all_axes(mut self) -> Self {
        self.skip_axes = SHOW_ALL;
        self
    }
}

const TRUE: &str = "⊤";
const FALSE: &str = "⊥";
const PLUS: &str = "+";
const MINUS: &str = "−";
const LEQ: &str = "≤";
const ELLIPSIS: &str = "⋯";
const VERT_ELLIPSIS: &str = "⋮";

impl<S: Data<Elem = f64>> Display for AffFuncBase<FunctionT, S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.display_with(FormatOptions::default_func()), f)
    }
}

impl<S: Data<Elem = f64>> Display for AffFuncBase<PolytopeT, S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(&self.display_with(FormatOptions::default_poly()), f)
    }
}

impl<'a, T, S: Data<Elem = f64>> AffFuncBase<T, S> {
    pub fn display_with(&'a self, options: FormatOptions) -> AffFuncBasePrinter<'a, T> {
        AffFuncBasePrinter::new(self.view(), options)
    }
}

#[derive(Clone)]
pub struct AffFuncBasePrinter<'a, T> {
    pub instance: AffFuncBase<T, ndarray::ViewRepr<&'a f64>>,
    pub options: FormatOptions,
}

impl<'a, T> AffFuncBasePrinter<'a, T> {
    pub fn new(
        instance: AffFuncBase<T, ndarray::ViewRepr<&'a f64>>,
        options: FormatOptions,
    ) -> Self {
        AffFuncBasePrinter::<'a, T> { instance, options }
    }
}

impl Display for AffFuncBasePrinter<'_, FunctionT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_func(f, self.instance.clone(), &self.options)
    }
}

impl Display for AffFuncBasePrinter<'_, PolytopeT> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_poly(f, self.instance.clone(), &self.options)
    }
}

impl<T> Debug for AffFuncBasePrinter<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(&self.instance, f)
    }
}

/// Writes one inequality `mat[i] @ x ≤ bias[i]` per line.
///
/// A polytope without constraints is written as ⊤.
pub fn write_poly(
    f: &mut fmt::Formatter,
    poly: PolytopeView,
    options: &FormatOptions,
) -> fmt::Result {
    if poly.n_constraints() == 0 {
        return write!(f, "{}", TRUE);
    }

    write_rows(f, poly.matrix_view(), poly.bias_view(), options, |f, row, bias| {
        write_inequality(f, row, bias, options)
    })
}

/// Writes one output `bias[i] + mat[i] @ x` per line.
pub fn write_func(f: &mut fmt::Formatter, func: AffFuncView, options: &FormatOptions) -> fmt::Result {
    write_rows(f, func.matrix_view(), func.bias_view(), options, |f, row, bias| {
        write_affcomb(f, row, bias, options)
    })
}

fn write_rows<F>(
    f: &mut fmt::Formatter,
    mat: ndarray::ArrayView2<f64>,
    bias: ArrayView1<f64>,
    options: &FormatOptions,
    mut write_row: F,
) -> fmt::Result
where
    F: FnMut(&mut fmt::Formatter, ArrayView1<f64>, f64) -> fmt::Result,
{
    let mut first_skip = true;
    for (no, (row, (pos, val))) in zip(mat.outer_iter(), bias.iter().with_position()).enumerate() {
        if options.skip_rows.contains(&(no as i32)) {
            if first_skip {
                writeln!(f, " {}", VERT_ELLIPSIS)?;
                first_skip = false;
            }
            continue;
        }

        write_row(f, row, *val)?;

        match pos {
            First | Middle => writeln!(f)?,
            Last | Only => {}
        }
    }
    Ok(())
}

pub fn write_inequality(
    f: &mut fmt::Formatter,
    row: ArrayView1<f64>,
    bias: f64,
    options: &FormatOptions,
) -> fmt::Result {
    let all_zero = row.iter().all(|x| *x == 0.0);
    if options.simplify_tautologies && all_zero {
        return write!(f, "{}", if bias >= 0.0 { TRUE } else { FALSE });
    }

    if options.normalize && !all_zero {
        let scale = row.iter().fold(0f64, |a, &b| a.max(b.abs()));
        let row = row.map(|x| *x / scale);

        write_lincomb(f, row.view(), options)?;
        write!(f, " {} ", LEQ)?;
        write_float(f, bias / scale)
    } else {
        write_lincomb(f, row, options)?;
        write!(f, " {} ", LEQ)?;
        write_float(f, bias)
    }
}

pub fn write_affcomb(
    f: &mut fmt::Formatter,
    row: ArrayView1<f64>,
    bias: f64,
    options: &FormatOptions,
) -> fmt::Result {
    write_float(f, bias)?;

    if !(options.simplify_zero && row.iter().all(|x| *x == 0.0)) {
        write!(f, " ")?;
        write_lincomb(f, row, options)?;
    }

    Ok(())
}

pub fn write_lincomb(
    f: &mut fmt::Formatter,
    coefficients: ArrayView1<f64>,
    options: &FormatOptions,
) -> fmt::Result {
    let num = coefficients.len();
    let mut elements = coefficients.iter().copied().enumerate().collect_vec();

    if options.sort_coefficients != 0 && options.sort_coefficients <= num {
        elements.sort_by_key(|(_, value)| float_ord::FloatOrd(-value.abs()));
    }

    let mut first_skip = true;

    for (no, (pos, (idx, coeff))) in elements.into_iter().with_position().enumerate() {
        if options.skip_axes.contains(&(no as i32)) {
            if first_skip {
                write!(f, " {}", ELLIPSIS)?;
                first_skip = false;
            }
            continue;
        }

        if matches!(pos, Middle | Last) {
            write!(f, " ")?;
        }
        write_float(f, coeff)?;
        write!(f, " x{}", idx)?;
    }
    Ok(())
}

/// Writes ``value`` with an explicit sign, using the precision of ``f`` (two digits by default).
#[inline]
pub fn write_float(f: &mut fmt::Formatter, value: f64) -> fmt::Result {
    write!(f, "{}", if value.is_sign_negative() { MINUS } else { PLUS })?;
    let precision = f.precision().unwrap_or(2);
    write!(f, "{:.*}", precision, value.abs())
}
