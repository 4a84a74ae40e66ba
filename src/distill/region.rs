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

//! Linear regions of a network
//!
//! A [`Region`] pairs a polyhedral set of inputs with the affine function the network computes
//! on that set. Regions are only created once all layers of a network are processed and are
//! immutable afterwards.

use std::fmt::{self, Display};

use itertools::Itertools;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix1};
use rust_decimal::Decimal;

use super::pattern::ActivationPattern;
use crate::linalg::affine::{AffFunc, Polytope};
use crate::linalg::exact::PrecisionError;
use crate::linalg::expr::{to_float_table, ExprMatrix};
use crate::linalg::impl_affineformat::FormatOptions;

#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    aff: AffFunc,
    poly: Polytope,
    path: Vec<ActivationPattern>,
}

impl Region {
    /// Creates a new region from the output expressions of the last layer and the
    /// accumulated inequality rows (each meaning `row[..d] @ x + row[d] <= 0`).
    pub fn new(
        output: &ExprMatrix,
        constraints: &Array2<Decimal>,
        path: Vec<ActivationPattern>,
    ) -> Result<Region, PrecisionError> {
        let aff = output.to_aff_func()?;
        let poly = Polytope::from_leq_zero(&to_float_table(constraints.view())?);

        assert_eq!(
            aff.indim(),
            poly.indim(),
            "Output map and constraints disagree on the input dimension"
        );

        Ok(Region { aff, poly, path })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.aff.indim()
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.aff.outdim()
    }

    #[inline]
    pub fn n_constraints(&self) -> usize {
        self.poly.n_constraints()
    }

    /// The affine function the network computes on this region.
    #[inline]
    pub fn aff(&self) -> &AffFunc {
        &self.aff
    }

    /// The set of inputs of this region as `mat @ x <= bias`.
    #[inline]
    pub fn polytope(&self) -> &Polytope {
        &self.poly
    }

    /// Activation patterns of all hidden layers that lead to this region, first layer first.
    #[inline]
    pub fn patterns(&self) -> &[ActivationPattern] {
        &self.path
    }

    /// Returns the output map as (out_dim) x (in_dim + 1) table, the constant term last.
    pub fn output_table(&self) -> Array2<f64> {
        self.aff.to_table()
    }

    /// Returns the constraints as (n_constraints) x (in_dim + 1) table, where each row means
    /// `row[..d] @ x + row[d] <= 0`.
    pub fn constraint_table(&self) -> Array2<f64> {
        self.poly.to_leq_zero()
    }

    /// Tests whether ``point`` satisfies all constraints of this region.
    ///
    /// Points on a boundary belong to all adjacent regions.
    pub fn contains<S: Data<Elem = f64>>(&self, point: &ArrayBase<S, Ix1>) -> bool {
        self.poly.contains(point)
    }

    /// Evaluates the output map of this region at ``point``.
    pub fn apply<S: Data<Elem = f64>>(&self, point: &ArrayBase<S, Ix1>) -> Array1<f64> {
        self.aff.apply(point)
    }

    /// Replaces the constraints of this region, e.g. by a simplified but equivalent system.
    ///
    /// The output map and the activation patterns stay untouched.
    pub fn with_constraints(self, poly: Polytope) -> Region {
        assert_eq!(
            self.in_dim(),
            poly.indim(),
            "Constraints must range over the {} inputs of this region",
            self.in_dim()
        );
        Region { poly, ..self }
    }

    /// Concatenated activation patterns, one group of digits per hidden layer.
    pub fn path_string(&self) -> String {
        self.path.iter().join("|")
    }

    pub fn display_with(&self, options: FormatOptions) -> RegionPrinter<'_> {
        RegionPrinter {
            region: self,
            options,
        }
    }
}

impl Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.display_with(FormatOptions::default_poly()), f)
    }
}

#[derive(Clone, Debug)]
pub struct RegionPrinter<'a> {
    region: &'a Region,
    options: FormatOptions,
}

impl Display for RegionPrinter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "region [{}]", self.region.path_string())?;
        writeln!(f, "{}", self.region.poly.display_with(self.options.clone()))?;
        write!(
            f,
            "=> {}",
            self.region.aff.display_with(FormatOptions::default_func())
        )
    }
}
