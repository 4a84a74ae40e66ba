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

//! Node values as affine functions of the network inputs
//!
//! An [`ExprMatrix`] over ``n`` nodes and ``d`` inputs is an (n+1) x (d+1) table of exact
//! decimals. Row ``i < n`` holds the coefficients of node ``i`` over the inputs followed by its
//! constant term. The last row is the constant generator `[0, ..., 0, 1]`, which lets a layer
//! bias be treated like any other node contribution.

use std::fmt;

use ndarray::{concatenate, s, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rust_decimal::Decimal;

use super::affine::AffFunc;
use super::exact::{self, PrecisionError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExprMatrix {
    data: Array2<Decimal>,
}

impl ExprMatrix {
    /// Expression matrix of the network inputs themselves.
    ///
    /// This is the (d+1) x (d+1) identity: node ``i`` is input ``i`` and the last row is the
    /// constant generator.
    pub fn identity(in_dim: usize) -> ExprMatrix {
        let mut data = Array2::from_elem((in_dim + 1, in_dim + 1), Decimal::ZERO);
        data.diag_mut().fill(Decimal::ONE);
        ExprMatrix { data }
    }

    /// Creates a new expression matrix from the rows of its nodes, appending the constant
    /// generator.
    pub fn from_nodes(nodes: Array2<Decimal>) -> ExprMatrix {
        let width = nodes.len_of(Axis(1));
        assert!(width > 0, "Node rows require a constant column");

        let mut generator = Array1::from_elem(width, Decimal::ZERO);
        generator[width - 1] = Decimal::ONE;

        let data = concatenate![Axis(0), nodes, generator.insert_axis(Axis(0))];
        ExprMatrix { data }
    }

    /// Number of nodes, excluding the constant generator.
    #[inline(always)]
    pub fn n_nodes(&self) -> usize {
        self.data.len_of(Axis(0)) - 1
    }

    /// Number of network inputs ``d``.
    #[inline(always)]
    pub fn in_dim(&self) -> usize {
        self.data.len_of(Axis(1)) - 1
    }

    #[inline]
    pub fn node(&self, idx: usize) -> ArrayView1<Decimal> {
        assert!(
            idx < self.n_nodes(),
            "Node outside range: got {} but only {} nodes exist",
            idx,
            self.n_nodes()
        );
        self.data.row(idx)
    }

    /// Rows of all nodes, without the constant generator.
    #[inline]
    pub fn nodes(&self) -> ArrayView2<Decimal> {
        self.data.slice(s![..-1, ..])
    }

    #[inline]
    pub fn constant_row(&self) -> ArrayView1<Decimal> {
        self.data.row(self.n_nodes())
    }

    #[inline]
    pub fn as_array(&self) -> ArrayView2<Decimal> {
        self.data.view()
    }

    /// Rounds the node rows to `f64` and splits them into an affine function of the inputs.
    pub fn to_aff_func(&self) -> Result<AffFunc, PrecisionError> {
        let table = to_float_table(self.nodes())?;
        Ok(AffFunc::from_table(&table))
    }
}

/// Converts every entry of ``table`` to the nearest `f64`.
pub fn to_float_table(table: ArrayView2<Decimal>) -> Result<Array2<f64>, PrecisionError> {
    let mut values = Array2::zeros(table.raw_dim());
    for (dst, &src) in values.iter_mut().zip(table.iter()) {
        *dst = exact::to_float(src)?;
    }
    Ok(values)
}

impl fmt::Display for ExprMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, row) in self.nodes().outer_iter().enumerate() {
            write!(f, "n{} =", idx)?;
            for (axis, coeff) in row.iter().take(self.in_dim()).enumerate() {
                if !coeff.is_zero() {
                    write_signed(f, *coeff)?;
                    write!(f, " x{}", axis)?;
                }
            }
            write_signed(f, row[self.in_dim()])?;
            writeln!(f)?;
        }
        Ok(())
    }
}

fn write_signed(f: &mut fmt::Formatter<'_>, value: Decimal) -> fmt::Result {
    if value.is_sign_negative() && !value.is_zero() {
        write!(f, " -{}", value.abs())
    } else {
        write!(f, " +{}", value.abs())
    }
}
