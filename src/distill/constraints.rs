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

//! Linear inequalities implied by an activation pattern
//!
//! Every row `r` returned by [`build_constraints`] encodes `r[..d] @ x + r[d] <= 0`.
//! An active node ``j`` requires `A[j] >= 0`, which is stored as `-A[j] <= 0`.
//! An inactive node requires `A[j] <= 0`.
//!
//! Both inequalities are non-strict, so inputs on which a node evaluates to exactly zero
//! satisfy the constraints of both branches.

use ndarray::{Array2, Axis};
use rust_decimal::Decimal;

use super::pattern::ActivationPattern;
use crate::linalg::expr::ExprMatrix;

/// Returns one inequality row per node of ``current``, in node order.
pub fn build_constraints(current: &ExprMatrix, pattern: &ActivationPattern) -> Array2<Decimal> {
    assert_eq!(
        current.n_nodes(),
        pattern.width(),
        "Pattern of width {} does not match layer of {} nodes",
        pattern.width(),
        current.n_nodes()
    );

    let mut rows = current.nodes().to_owned();
    for (node, mut row) in rows.axis_iter_mut(Axis(0)).enumerate() {
        if pattern.is_active(node) {
            row.mapv_inplace(|val| -val);
        }
    }
    rows
}
