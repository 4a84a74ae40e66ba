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

//! Structs to store linear functions and polytopes
//!
//! Both share the same layout, a matrix `mat` and a vector `bias`. As a function the pair
//! encodes f(x) = mat @ x + bias, as a polytope it encodes the set {x | mat @ x <= bias}.
//! The enumeration engine itself works on exact [`ExprMatrix`](super::expr::ExprMatrix)
//! instances; these float types are what finished regions hand out to their consumers.

use core::fmt;
use std::fmt::Debug;
use std::marker::PhantomData;

use approx::{AbsDiffEq, RelativeEq};
use ndarray::{
    concatenate, s, Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Axis, Data, Ix1, Ix2,
    LinalgScalar, OwnedRepr, RawDataClone, ViewRepr,
};
use num_traits::float::Float;

pub struct AffFuncBase<T, S>
where
    S: Data,
    S::Elem: Float,
{
    pub mat: ArrayBase<S, Ix2>,
    pub bias: ArrayBase<S, Ix1>,
    pub _phantom: PhantomData<T>,
}

#[derive(Clone, Default, Debug)]
pub struct FunctionT;

#[derive(Clone, Default, Debug)]
pub struct PolytopeT;

type AffFuncG<A> = AffFuncBase<FunctionT, OwnedRepr<A>>;
type PolytopeG<A> = AffFuncBase<PolytopeT, OwnedRepr<A>>;

pub type AffFunc = AffFuncG<f64>;
pub type AffFuncView<'a> = AffFuncBase<FunctionT, ViewRepr<&'a f64>>;
pub type Polytope = PolytopeG<f64>;
pub type PolytopeView<'a> = AffFuncBase<PolytopeT, ViewRepr<&'a f64>>;

impl<I, D: Data<Elem = A>, A: Float + Debug> Debug for AffFuncBase<I, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.debug_tuple("AffFuncBase")
            .field(&self.mat)
            .field(&self.bias)
            .finish()
    }
}

impl<I, D: Data<Elem = A> + RawDataClone, A: Float> Clone for AffFuncBase<I, D> {
    fn clone(&self) -> Self {
        AffFuncBase {
            mat: self.mat.clone(),
            bias: self.bias.clone(),
            _phantom: PhantomData,
        }
    }
}

/// # General constructor
impl<I, D: Data<Elem = A>, A: Float> AffFuncBase<I, D> {
    /// Create a new instance from a matrix mat: R^{m x n} and a vector bias: R^m.
    #[inline(always)]
    pub fn from_mats(mat: ArrayBase<D, Ix2>, bias: ArrayBase<D, Ix1>) -> AffFuncBase<I, D> {
        assert_eq!(
            mat.len_of(Axis(0)),
            bias.len_of(Axis(0)),
            "Dimensions mismatch of matrix and bias: {} x {} and {}",
            mat.len_of(Axis(0)),
            mat.len_of(Axis(1)),
            bias.len_of(Axis(0))
        );

        AffFuncBase {
            mat,
            bias,
            _phantom: PhantomData,
        }
    }
}

/// # AffFunc specific constructors
impl<A: Float> AffFuncG<A> {
    /// Splits a homogeneous coefficient table into matrix and bias.
    ///
    /// Each row of ``table`` holds the coefficients of one output followed by its constant term,
    /// i.e., the table has ``indim + 1`` columns.
    pub fn from_table<S: Data<Elem = A>>(table: &ArrayBase<S, Ix2>) -> AffFuncG<A> {
        let ncols = table.len_of(Axis(1));
        assert!(ncols > 0, "Coefficient table requires a constant column");

        AffFuncG::<A>::from_mats(
            table.slice(s![.., ..ncols - 1]).to_owned(),
            table.column(ncols - 1).to_owned(),
        )
    }
}

/// # Polytope specific constructors
impl<A: Float> PolytopeG<A> {
    /// Creates a polytope that contains the complete `dim`-dimensional ambient space.
    ///
    /// The polytope has no constraints at all.
    #[inline(always)]
    pub fn unbounded(dim: usize) -> PolytopeG<A> {
        PolytopeG::<A>::from_mats(Array2::zeros((0, dim)), Array1::zeros(0))
    }

    /// Creates a polytope from rows in the form `a @ x + c <= 0`, where each row of ``rows``
    /// stores `a` followed by `c`.
    pub fn from_leq_zero<S: Data<Elem = A>>(rows: &ArrayBase<S, Ix2>) -> PolytopeG<A> {
        let ncols = rows.len_of(Axis(1));
        assert!(ncols > 0, "Inequality rows require a constant column");

        PolytopeG::<A>::from_mats(
            rows.slice(s![.., ..ncols - 1]).to_owned(),
            rows.column(ncols - 1).mapv(|x| A::zero() - x),
        )
    }
}

/// # General methods
impl<I, D: Data<Elem = A>, A: Float> AffFuncBase<I, D> {
    /// Returns the dimension of the input space.
    #[inline(always)]
    pub fn indim(&self) -> usize {
        self.mat.shape()[1]
    }

    /// Returns the dimension of the image space.
    #[inline(always)]
    pub fn outdim(&self) -> usize {
        self.mat.shape()[0]
    }

    #[inline(always)]
    pub fn matrix_view(&self) -> ArrayView2<D::Elem> {
        self.mat.view()
    }

    #[inline(always)]
    pub fn bias_view(&self) -> ArrayView1<D::Elem> {
        self.bias.view()
    }

    /// Returns the row ``row`` as its own instance.
    pub fn row(&self, row: usize) -> AffFuncBase<I, ViewRepr<&A>> {
        assert!(
            row < self.outdim(),
            "Row outside range: got {} but only {} rows exist",
            row,
            self.outdim()
        );
        AffFuncBase::<I, ViewRepr<&A>>::from_mats(
            self.mat.row(row).insert_axis(Axis(0)),
            self.bias.slice(s![row]).insert_axis(Axis(0)),
        )
    }

    #[inline]
    pub fn view(&self) -> AffFuncBase<I, ViewRepr<&A>> {
        AffFuncBase::<I, ViewRepr<&A>>::from_mats(self.mat.view(), self.bias.view())
    }

    #[inline]
    pub fn to_owned(&self) -> AffFuncBase<I, OwnedRepr<A>> {
        AffFuncBase::<I, OwnedRepr<A>>::from_mats(self.mat.to_owned(), self.bias.to_owned())
    }
}

impl<D: Data<Elem = A>, A: Float> AffFuncBase<FunctionT, D> {
    /// Returns the homogeneous coefficient table [mat | bias] of this function.
    pub fn to_table(&self) -> Array2<A> {
        concatenate![Axis(1), self.mat, self.bias.view().insert_axis(Axis(1))]
    }
}

impl<D: Data<Elem = A>, A: Float> AffFuncBase<PolytopeT, D> {
    /// Returns the number of inequalities (constraints) of this polytope.
    pub fn n_constraints(&self) -> usize {
        self.mat.shape()[0]
    }

    /// Returns the constraints as rows `[a | c]` meaning `a @ x + c <= 0`.
    ///
    /// This is the inverse of [`PolytopeG::from_leq_zero`].
    pub fn to_leq_zero(&self) -> Array2<A> {
        let neg_bias = self.bias.mapv(|x| A::zero() - x);
        concatenate![Axis(1), self.mat, neg_bias.insert_axis(Axis(1))]
    }

    /// Concatenates the constraints of this polytope with those of ``other``.
    pub fn intersection(&self, other: &AffFuncBase<PolytopeT, D>) -> PolytopeG<A> {
        assert_eq!(
            self.indim(),
            other.indim(),
            "Invalid dimensions for intersection: {} and {}",
            self.indim(),
            other.indim()
        );

        PolytopeG::<A>::from_mats(
            concatenate![Axis(0), self.mat, other.mat],
            concatenate![Axis(0), self.bias, other.bias],
        )
    }
}

/// # Evaluation on inputs
impl<D: Data<Elem = A>, A: Float + LinalgScalar> AffFuncBase<FunctionT, D> {
    /// Evaluates this function under the given input.
    /// Mathematically, this corresponds to calculating mat @ input + bias
    pub fn apply<S: Data<Elem = A>>(&self, input: &ArrayBase<S, Ix1>) -> Array1<A> {
        self.mat.dot(input) + &self.bias
    }
}

/// # Membership
impl<D: Data<Elem = A>, A: Float + LinalgScalar> AffFuncBase<PolytopeT, D> {
    /// Calculates the slack of ``point`` with respect to every inequality.
    ///
    /// Slack is non-negative exactly for satisfied inequalities. It is not normalized.
    #[inline]
    pub fn distance_raw<S: Data<Elem = A>>(&self, point: &ArrayBase<S, Ix1>) -> Array1<A> {
        &self.bias - self.mat.dot(point)
    }

    /// Tests whether the input ``point`` lies inside this polytope or not.
    ///
    /// Points whose slack is at least -1e-8 for every inequality count as inside,
    /// so points on a shared facet belong to both neighbouring polytopes.
    #[inline]
    pub fn contains<S: Data<Elem = A>>(&self, point: &ArrayBase<S, Ix1>) -> bool {
        let tolerance = A::from(-1e-8).unwrap_or_else(A::zero);
        self.distance_raw(point).into_iter().all(|x| x >= tolerance)
    }
}

impl<I, D: Data<Elem = A>, A: Float> core::cmp::PartialEq for AffFuncBase<I, D> {
    fn eq(&self, other: &Self) -> bool {
        self.mat.eq(&other.mat) && self.bias.eq(&other.bias)
    }
}

impl<I, S, A> AbsDiffEq for AffFuncBase<I, S>
where
    S: Data<Elem = A>,
    A: Float + AbsDiffEq,
    A::Epsilon: Clone,
{
    type Epsilon = A::Epsilon;

    fn default_epsilon() -> A::Epsilon {
        A::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: A::Epsilon) -> bool {
        <ArrayBase<S, Ix2> as AbsDiffEq<_>>::abs_diff_eq(&self.mat, &other.mat, epsilon.clone())
            && <ArrayBase<S, Ix1> as AbsDiffEq<_>>::abs_diff_eq(&self.bias, &other.bias, epsilon)
    }
}

impl<I, S, A> RelativeEq for AffFuncBase<I, S>
where
    S: Data<Elem = A>,
    A: Float + RelativeEq,
    A::Epsilon: Clone,
{
    fn default_max_relative() -> Self::Epsilon {
        A::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: A::Epsilon, max_relative: A::Epsilon) -> bool {
        <ArrayBase<S, Ix2> as RelativeEq<_>>::relative_eq(
            &self.mat,
            &other.mat,
            epsilon.clone(),
            max_relative.clone(),
        ) && <ArrayBase<S, Ix1> as RelativeEq<_>>::relative_eq(
            &self.bias,
            &other.bias,
            epsilon,
            max_relative,
        )
    }
}

/// Creates a new ``AffFunc`` from the given matrix and bias.
///
/// # Examples
///
/// ```rust
/// use affregion::aff;
///
/// let func = aff!([[1, 2, 5, 7], [-2, -9, 7, 8]] + [1, -1]);
/// ```
#[macro_export]
macro_rules! aff {
    ([ $([$($x:expr),* $(,)*]),+ $(,)* ] + [ $($y:expr),* $(,)* ]) => {{
        $crate::linalg::affine::AffFunc::from_mats(
           ndarray::Array2::<f64>::from(vec![$( [ $( ($x as f64), )* ], )*]),
           ndarray::Array1::<f64>::from(vec![$($y as f64,)*])
        )
    }};
}

/// Creates a new ``Polytope`` from the given matrix and bias (mat @ x <= bias).
///
/// # Examples
///
/// ```rust
/// use affregion::poly;
///
/// let poly = poly!([[1, 0], [0, 1]] < [2, 3]);
/// ```
#[macro_export]
macro_rules! poly {
    ([ $([$($x:expr),* $(,)*]),+ $(,)* ] < [ $($y:expr),* $(,)* ]) => {{
        $crate::linalg::affine::Polytope::from_mats(
           ndarray::Array2::<f64>::from(vec![$( [ $( ($x as f64), )* ], )*]),
           ndarray::Array1::<f64>::from(vec![$($y as f64,)*])
        )
    }};
}
