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

use thiserror::Error;

use super::network::ShapeError;
use crate::linalg::exact::PrecisionError;

/// Errors raised while enumerating the regions of a network.
///
/// Infeasible regions are regular output and never reported here.
#[derive(Error, Debug)]
pub enum RegionError {
    #[error("Invalid network: {0}")]
    InvalidNetwork(#[from] ShapeError),
    #[error("Precision loss: {0}")]
    Precision(#[from] PrecisionError),
    #[error("Failed to open region recorder: {0}")]
    Recorder(#[from] csv::Error),
    #[cfg(feature = "parallel")]
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
