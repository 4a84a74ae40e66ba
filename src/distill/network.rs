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

//! Validated layer sequences of ReLU networks
//!
//! A network is a sequence of weight matrices. Each matrix has one row per output node and one
//! column per input node, followed by a trailing bias column. A ReLU is applied after every
//! layer except the last one.

use std::fmt::Display;

use itertools::Itertools;
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use rust_decimal::Decimal;
use thiserror::Error;

use super::error::RegionError;
use super::pattern::MAX_WIDTH;
use crate::linalg::affine::AffFunc;
use crate::linalg::exact;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Network has no layers")]
    Empty,
    #[error("Layer {layer} has no nodes")]
    EmptyLayer { layer: usize },
    #[error("First layer has no inputs besides its bias column")]
    NoInputs,
    #[error("Row {row} of layer {layer} has {got} entries, expected {expected}")]
    Ragged {
        layer: usize,
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("Shape mismatch in layer {layer}: expected {expected} columns, got {got}")]
    Dim {
        layer: usize,
        expected: usize,
        got: usize,
    },
    #[error("Weights expect {expected} rows including the constant generator, got {got}")]
    Operand { expected: usize, got: usize },
    #[error("Layer {layer} has {width} nodes, at most {max} can be branched over")]
    Width {
        layer: usize,
        width: usize,
        max: usize,
    },
}

/// A sequence of dense layers with ReLU activations in between.
///
/// Weights are stored as exact decimals, see [`crate::linalg::exact`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Network {
    layers: Vec<Array2<Decimal>>,
}

impl Network {
    /// Validates the shapes of ``layers`` and converts their weights to exact decimals.
    ///
    /// Each layer must have one more column than the previous layer has rows, and every layer
    /// followed by a ReLU may have at most 63 nodes.
    pub fn new(layers: &[Array2<f64>]) -> Result<Network, RegionError> {
        validate(layers.iter().map(|layer| layer.dim()))?;

        let layers = layers
            .iter()
            .map(|layer| {
                let mut exact_layer = Array2::from_elem(layer.dim(), Decimal::ZERO);
                for (dst, &src) in exact_layer.iter_mut().zip(layer.iter()) {
                    *dst = exact::to_decimal(src)?;
                }
                Ok(exact_layer)
            })
            .collect::<Result<Vec<_>, RegionError>>()?;

        Ok(Network { layers })
    }

    /// Creates a network from nested rows, one `Vec` of rows per layer.
    ///
    /// All rows of a layer must have the same length.
    pub fn from_rows(layers: &[Vec<Vec<f64>>]) -> Result<Network, RegionError> {
        let mut matrices = Vec::with_capacity(layers.len());

        for (idx, rows) in layers.iter().enumerate() {
            let ncols = rows.first().map_or(0, |row| row.len());
            if let Some((row, got)) = rows
                .iter()
                .map(|row| row.len())
                .find_position(|len| *len != ncols)
            {
                return Err(ShapeError::Ragged {
                    layer: idx,
                    row,
                    expected: ncols,
                    got,
                }
                .into());
            }

            matrices.push(Array2::from_shape_fn((rows.len(), ncols), |(i, j)| rows[i][j]));
        }

        Network::new(&matrices)
    }

    /// Creates a network from affine layers, appending the bias of each as its last column.
    pub fn from_affine(layers: &[AffFunc]) -> Result<Network, RegionError> {
        let matrices = layers
            .iter()
            .map(|aff| concatenate![Axis(1), aff.mat, aff.bias.view().insert_axis(Axis(1))])
            .collect_vec();

        Network::new(&matrices)
    }

    /// Number of network inputs.
    #[inline]
    pub fn in_dim(&self) -> usize {
        self.layers[0].len_of(Axis(1)) - 1
    }

    /// Number of nodes of the last layer.
    #[inline]
    pub fn out_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].len_of(Axis(0))
    }

    /// Number of layers, which is always at least one.
    #[inline]
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn layer(&self, idx: usize) -> ArrayView2<Decimal> {
        self.layers[idx].view()
    }

    /// Widths of all layers followed by a ReLU, i.e., all but the last layer.
    pub fn hidden_widths(&self) -> impl Iterator<Item = usize> + '_ {
        self.layers[..self.layers.len() - 1]
            .iter()
            .map(|layer| layer.len_of(Axis(0)))
    }

    /// Returns the number of regions an enumeration of this network yields.
    ///
    /// This is 2 to the power of the total hidden width, or `None` if that exceeds `u128`.
    pub fn n_regions(&self) -> Option<u128> {
        let exponent = u32::try_from(self.hidden_widths().sum::<usize>()).ok()?;
        1u128.checked_shl(exponent)
    }
}

fn validate<I>(shapes: I) -> Result<(), ShapeError>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let shapes = shapes.into_iter().collect_vec();

    let (_, first_cols) = *shapes.first().ok_or(ShapeError::Empty)?;

    for (idx, (rows, _)) in shapes.iter().enumerate() {
        if *rows == 0 {
            return Err(ShapeError::EmptyLayer { layer: idx });
        }
    }

    if first_cols < 2 {
        return Err(ShapeError::NoInputs);
    }

    for (idx, ((prev_rows, _), (_, cols))) in shapes.iter().tuple_windows().enumerate() {
        if *cols != prev_rows + 1 {
            return Err(ShapeError::Dim {
                layer: idx + 1,
                expected: prev_rows + 1,
                got: *cols,
            });
        }
    }

    for (idx, (rows, _)) in shapes[..shapes.len() - 1].iter().enumerate() {
        if *rows > MAX_WIDTH {
            return Err(ShapeError::Width {
                layer: idx,
                width: *rows,
                max: MAX_WIDTH,
            });
        }
    }

    Ok(())
}

impl Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:<8}   {:>8}   {:>8}   {:>20}",
            "Layer", "Inputs", "Outputs", "Branches"
        )?;
        writeln!(f, "{:=<8}==={:=>8}==={:=>8}==={:=>20}", "=", "=", "=", "=")?;

        let mut branches = 1u64;
        for (idx, layer) in self.layers.iter().enumerate() {
            let (rows, cols) = layer.dim();
            writeln!(
                f,
                "{:<8}   {:>8}   {:>8}   {:>20}",
                idx,
                cols - 1,
                rows,
                branches
            )?;
            // the next layer branches over all activation patterns of this one
            branches = 1u64 << rows.min(MAX_WIDTH);
        }

        match self.n_regions() {
            Some(n) => write!(f, "Regions: {}", n),
            None => write!(f, "Regions: more than 2^128"),
        }
    }
}
