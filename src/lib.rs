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

/*!
Exact enumeration of the linear regions of ReLU networks.

A feed-forward network built from dense layers and ReLU activations is a
[piece-wise linear function](https://en.wikipedia.org/wiki/Piecewise_linear_function):
its input space decomposes into convex polyhedral regions such that the network computes a single
affine function on each of them. Which region an input belongs to is decided by the activation
pattern of the network, that is, by which ReLUs pass their value on (active) and which output zero
(inactive).

This crate enumerates all these regions. For every combination of activation patterns it reports
 - the linear inequalities over the inputs under which the patterns hold, and
 - the affine function from inputs to outputs the network computes under these patterns.

Coefficients are combined in exact decimal arithmetic (see [`linalg::exact`]) and only rounded to
`f64` when a [`Region`](crate::distill::region::Region) is created.

# Quick Start
Networks are given as a sequence of weight matrices. Each matrix has one row per node of the layer
and one column per input of the layer, followed by a bias column. A ReLU is applied after every
layer but the last.

The following example enumerates a network with two inputs, one hidden layer of two nodes and a
single output.
```rust
use ndarray::{arr1, arr2};
use affregion::distill::enumerate::enumerate;

let layers = [
    arr2(&[[1., 1., -1.], [1., -1., 0.]]),
    arr2(&[[2., 3., 0.5]]),
];
let regions = enumerate(&layers).unwrap();

// one region per activation pattern of the hidden layer
assert_eq!(regions.len(), 4);

// evaluate the network at a point through the first region containing it
let point = arr1(&[2., 0.]);
let region = regions.iter().find(|region| region.contains(&point)).unwrap();
assert_eq!(region.apply(&point), arr1(&[2. * 1. + 3. * 2. + 0.5]));
```

Layers can also be given as [`AffFunc`](crate::linalg::affine::AffFunc) instances via
[`Network::from_affine`](crate::distill::network::Network::from_affine), and enumeration can be
observed through a [`RegionVisitor`](crate::distill::visitor::RegionVisitor), for example to
report progress on the console or to record regions into a csv file.

# Parallelism
With the default `parallel` feature the branches of the first hidden layers can be enumerated on
a [`rayon`](https://docs.rs/rayon) thread pool, see
[`EnumerationOptions`](crate::distill::enumerate::EnumerationOptions). The resulting regions are
identical to those of the sequential enumeration, including their order.
*/

#![warn(
    missing_debug_implementations,
    rust_2021_compatibility,
)]

pub mod distill;
pub mod linalg;
