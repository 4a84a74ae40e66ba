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

//! Propagation of affine expressions through one dense layer
//!
//! Given the nodes of the current layer as affine functions of the inputs, the pre-activation
//! of next-layer node ``i`` under a selector is
//!
//! ```text
//! W[i][bias] * C + sum over selected j of W[i][j] * A[j]
//! ```
//!
//! where ``A[j]`` are the rows of the current [`ExprMatrix`] and ``C`` its constant generator.
//! The scaled terms do not depend on the selector. [`ContributionCache`] computes them once
//! per layer, so that each of the 2^width patterns only pays for the additions.

use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use rust_decimal::Decimal;

use super::error::RegionError;
use super::network::ShapeError;
use super::pattern::NodeSelector;
use crate::linalg::exact::{self, PrecisionError};
use crate::linalg::expr::ExprMatrix;

/// Scaled contributions `W[i][j] * A[j]` of every current node to every next node.
///
/// Index ``[i, j, ..]`` holds the contribution of current node ``j`` to next node ``i``.
/// The bias contribution is stored at ``j = n_nodes``.
#[derive(Clone, Debug)]
pub struct ContributionCache {
    terms: Array3<Decimal>,
}

impl ContributionCache {
    pub fn new(current: &ExprMatrix, weights: ArrayView2<Decimal>) -> Result<Self, RegionError> {
        let n_nodes = current.n_nodes();
        if weights.len_of(Axis(1)) != n_nodes + 1 {
            return Err(ShapeError::Operand {
                expected: weights.len_of(Axis(1)),
                got: n_nodes + 1,
            }
            .into());
        }

        let expr = current.as_array();
        let shape = (weights.len_of(Axis(0)), n_nodes + 1, current.in_dim() + 1);
        let mut terms = Array3::from_elem(shape, Decimal::ZERO);

        for ((i, j, k), term) in terms.indexed_iter_mut() {
            let weight = weights[[i, j]];
            if !weight.is_zero() {
                *term = exact::checked_mul(weight, expr[[j, k]])?;
            }
        }

        Ok(ContributionCache { terms })
    }

    /// Number of nodes of the next layer.
    #[inline]
    pub fn width(&self) -> usize {
        self.terms.len_of(Axis(0))
    }

    /// Number of nodes of the current layer.
    #[inline]
    pub fn n_sources(&self) -> usize {
        self.terms.len_of(Axis(1)) - 1
    }

    /// Sums the bias contribution and the contributions of all selected nodes, in node order.
    pub fn assemble<S: NodeSelector>(&self, selector: &S) -> Result<ExprMatrix, PrecisionError> {
        let n_sources = self.n_sources();
        let mut nodes = Array2::from_elem(
            (self.width(), self.terms.len_of(Axis(2))),
            Decimal::ZERO,
        );

        for (i, mut row) in nodes.outer_iter_mut().enumerate() {
            row.assign(&self.terms.slice(s![i, n_sources, ..]));

            for j in (0..n_sources).filter(|&j| selector.includes(j)) {
                for (acc, term) in row.iter_mut().zip(self.terms.slice(s![i, j, ..])) {
                    *acc = exact::checked_add(*acc, *term)?;
                }
            }
        }

        Ok(ExprMatrix::from_nodes(nodes))
    }
}

/// Computes the pre-activation expressions of the next layer in one step.
///
/// Prefer [`ContributionCache`] when the same layer is assembled for several selectors.
pub fn propagate<S: NodeSelector>(
    current: &ExprMatrix,
    weights: ArrayView2<Decimal>,
    selector: &S,
) -> Result<ExprMatrix, RegionError> {
    let cache = ContributionCache::new(current, weights)?;
    Ok(cache.assemble(selector)?)
}
