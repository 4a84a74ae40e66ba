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

//! Enumeration of all linear regions of a ReLU network
//!
//! The enumeration walks the layers of a network depth-first. The first layer is applied to the
//! inputs directly. Every following layer branches over all activation patterns of the previous
//! layer, in descending order: each branch records the inequalities of its pattern and carries
//! the pattern-specific expression on to the next layer. After the last layer each branch
//! becomes one [`Region`].
//!
//! The number of regions is the product of 2^width over all hidden layers, see
//! [`Network::n_regions`]. No region is pruned, even if its constraints are infeasible.

use std::path::Path;

use log::{debug, info, trace};
use ndarray::{s, Array2, Axis};
use rust_decimal::Decimal;
use slab::Slab;

use super::constraints::build_constraints;
use super::error::RegionError;
use super::network::Network;
use super::pattern::{ActivationPattern, Descending, PassThrough};
use super::propagate::ContributionCache;
use super::region::Region;
use super::visitor::{NoOpVis, RegionConsole, RegionCsv, RegionVisitor};
use crate::linalg::expr::ExprMatrix;

/// Configures how an enumeration is distributed over threads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumerationOptions {
    /// Dispatch sibling branches as parallel tasks (requires the `parallel` feature)
    pub parallel: bool,
    /// Number of hidden layers whose branches are dispatched as separate tasks.
    /// Deeper layers are enumerated sequentially within each task.
    pub parallel_depth: usize,
    /// Maximum number of threads to use.
    /// None means use rayon's default (typically number of cores).
    pub max_threads: Option<usize>,
}

impl Default for EnumerationOptions {
    fn default() -> Self {
        EnumerationOptions {
            parallel: false,
            parallel_depth: 1,
            max_threads: None,
        }
    }
}

impl EnumerationOptions {
    pub fn parallel() -> EnumerationOptions {
        EnumerationOptions {
            parallel: true,
            ..Default::default()
        }
    }
}

/// Enumerates all regions of the network given by ``layers``.
///
/// Each layer is a matrix with one row per node and one column per input, followed by a
/// bias column.
///
/// # Examples
///
/// ```rust
/// use ndarray::arr2;
/// use affregion::distill::enumerate::enumerate;
///
/// // y = relu(x)
/// let regions = enumerate(&[arr2(&[[1., 0.]]), arr2(&[[1., 0.]])]).unwrap();
///
/// assert_eq!(regions.len(), 2);
/// assert_eq!(regions[0].output_table(), arr2(&[[1., 0.]]));
/// assert_eq!(regions[1].output_table(), arr2(&[[0., 0.]]));
/// ```
pub fn enumerate(layers: &[Array2<f64>]) -> Result<Vec<Region>, RegionError> {
    let network = Network::new(layers)?;
    enumerate_generic(&network, &EnumerationOptions::default(), &mut NoOpVis {})
}

/// Specialization of [`enumerate_generic`] that reports the progress to the console.
pub fn enumerate_verbose(layers: &[Array2<f64>]) -> Result<Vec<Region>, RegionError> {
    let network = Network::new(layers)?;
    enumerate_generic(
        &network,
        &EnumerationOptions::default(),
        &mut RegionConsole::new(),
    )
}

/// Specialization of [`enumerate_generic`] that records every region to a csv file located
/// at ``path``.
pub fn enumerate_csv<P: AsRef<Path>>(
    layers: &[Array2<f64>],
    path: P,
) -> Result<Vec<Region>, RegionError> {
    let network = Network::new(layers)?;
    let mut recorder = RegionCsv::new(path)?;
    enumerate_generic(&network, &EnumerationOptions::default(), &mut recorder)
}

/// Specialization of [`enumerate_generic`] that dispatches the branches of the first hidden
/// layer as parallel tasks. The result equals that of [`enumerate`].
pub fn enumerate_parallel(layers: &[Array2<f64>]) -> Result<Vec<Region>, RegionError> {
    let network = Network::new(layers)?;
    enumerate_generic(&network, &EnumerationOptions::parallel(), &mut NoOpVis {})
}

/// Generic implementation of the enumeration.
///
/// Regions are returned depth-first with patterns in descending order at every layer,
/// independent of ``options``. Behavior can be customized by providing an appropriate
/// ``visitor``.
pub fn enumerate_generic<V: RegionVisitor>(
    network: &Network,
    options: &EnumerationOptions,
    visitor: &mut V,
) -> Result<Vec<Region>, RegionError> {
    match network.n_regions() {
        Some(n) => info!(
            "Enumerating network with {} inputs and {} layers, expecting {} regions",
            network.in_dim(),
            network.n_layers(),
            n
        ),
        None => info!(
            "Enumerating network with {} inputs and {} layers, expecting more than 2^128 regions",
            network.in_dim(),
            network.n_layers()
        ),
    }

    visitor.start_enumeration(network);

    let regions = if options.parallel {
        let regions = run_parallel(network, options)?;
        for (idx, region) in regions.iter().enumerate() {
            visitor.visit_region(idx, region);
        }
        regions
    } else {
        Enumerator::new(network, visitor).run(Branch::root(network))?
    };

    visitor.finish_enumeration(regions.len());
    info!("Enumeration finished with {} regions", regions.len());

    Ok(regions)
}

/// Constraint rows of one branch, linked to the rows of its parent branch.
#[derive(Debug)]
struct Frame {
    parent: Option<usize>,
    rows: Array2<Decimal>,
    pattern: ActivationPattern,
    refs: usize,
}

/// Input state of a layer: its index, the expressions of the previous layer and the frame of
/// the branch that led here.
#[derive(Debug)]
struct Branch {
    layer: usize,
    expr: ExprMatrix,
    frame: Option<usize>,
}

impl Branch {
    fn root(network: &Network) -> Branch {
        Branch {
            layer: 0,
            expr: ExprMatrix::identity(network.in_dim()),
            frame: None,
        }
    }
}

/// A hidden layer whose patterns are being expanded.
#[derive(Debug)]
struct Level {
    layer: usize,
    expr: ExprMatrix,
    cache: ContributionCache,
    patterns: Descending,
    frame: Option<usize>,
}

/// Sequential depth-first enumeration with an explicit work stack.
///
/// Frames are shared by all branches below them and are reclaimed once their last branch is
/// done. A fixed prefix of constraints and patterns allows resuming below a partial path.
struct Enumerator<'a, V> {
    network: &'a Network,
    visitor: &'a mut V,
    frames: Slab<Frame>,
    prefix_rows: Array2<Decimal>,
    prefix_path: Vec<ActivationPattern>,
    regions: Vec<Region>,
}

impl<'a, V: RegionVisitor> Enumerator<'a, V> {
    fn new(network: &'a Network, visitor: &'a mut V) -> Self {
        let prefix_rows = Array2::from_elem((0, network.in_dim() + 1), Decimal::ZERO);
        Self::with_prefix(network, visitor, prefix_rows, Vec::new())
    }

    fn with_prefix(
        network: &'a Network,
        visitor: &'a mut V,
        prefix_rows: Array2<Decimal>,
        prefix_path: Vec<ActivationPattern>,
    ) -> Self {
        Enumerator {
            network,
            visitor,
            frames: Slab::new(),
            prefix_rows,
            prefix_path,
            regions: Vec::new(),
        }
    }

    fn run(mut self, start: Branch) -> Result<Vec<Region>, RegionError> {
        let mut stack: Vec<Level> = Vec::with_capacity(self.network.n_layers());
        self.descend(start, &mut stack)?;

        while let Some(level) = stack.last_mut() {
            match level.patterns.next() {
                Some(pattern) => {
                    trace!("Branch {} of layer {}", pattern, level.layer);

                    let rows = build_constraints(&level.expr, &pattern);
                    let next = level.cache.assemble(&pattern)?;
                    let parent = level.frame;
                    let branch = Branch {
                        layer: level.layer + 1,
                        expr: next,
                        frame: Some(self.push_frame(parent, rows, pattern)),
                    };
                    self.descend(branch, &mut stack)?;
                }
                None => {
                    if let Some(level) = stack.pop() {
                        self.release(level.frame);
                    }
                }
            }
        }

        debug_assert!(self.frames.is_empty());
        Ok(self.regions)
    }

    /// Applies layers to ``branch`` until it either becomes a region or reaches a layer that
    /// has to be branched over.
    fn descend(&mut self, mut branch: Branch, stack: &mut Vec<Level>) -> Result<(), RegionError> {
        if branch.layer == 0 {
            let cache = ContributionCache::new(&branch.expr, self.network.layer(0))?;
            branch = Branch {
                layer: 1,
                expr: cache.assemble(&PassThrough)?,
                frame: branch.frame,
            };
        }

        if branch.layer == self.network.n_layers() {
            let region = self.materialize(&branch.expr, branch.frame)?;
            self.visitor.visit_region(self.regions.len(), &region);
            self.regions.push(region);
            self.release(branch.frame);
            return Ok(());
        }

        let width = branch.expr.n_nodes();
        debug!(
            "Expanding layer {} with {} patterns",
            branch.layer,
            1u64 << width
        );
        self.visitor.visit_layer(branch.layer, &branch.expr);

        let cache = ContributionCache::new(&branch.expr, self.network.layer(branch.layer))?;
        stack.push(Level {
            layer: branch.layer,
            expr: branch.expr,
            cache,
            patterns: ActivationPattern::descending(width),
            frame: branch.frame,
        });
        Ok(())
    }

    fn push_frame(
        &mut self,
        parent: Option<usize>,
        rows: Array2<Decimal>,
        pattern: ActivationPattern,
    ) -> usize {
        if let Some(parent) = parent {
            self.frames[parent].refs += 1;
        }
        self.frames.insert(Frame {
            parent,
            rows,
            pattern,
            refs: 1,
        })
    }

    /// Drops one reference to ``frame``, reclaiming it and possibly its ancestors.
    fn release(&mut self, frame: Option<usize>) {
        let mut current = frame;
        while let Some(key) = current {
            let entry = &mut self.frames[key];
            entry.refs -= 1;
            if entry.refs > 0 {
                break;
            }
            current = self.frames.remove(key).parent;
        }
    }

    /// Collects the constraints and patterns along the path to ``frame`` into a region.
    fn materialize(
        &self,
        output: &ExprMatrix,
        frame: Option<usize>,
    ) -> Result<Region, RegionError> {
        let mut chain = Vec::new();
        let mut current = frame;
        while let Some(key) = current {
            let entry = &self.frames[key];
            chain.push(entry);
            current = entry.parent;
        }
        chain.reverse();

        let n_rows = self.prefix_rows.len_of(Axis(0))
            + chain.iter().map(|entry| entry.rows.len_of(Axis(0))).sum::<usize>();
        let mut rows = Array2::from_elem((n_rows, output.in_dim() + 1), Decimal::ZERO);

        let n_prefix = self.prefix_rows.len_of(Axis(0));
        rows.slice_mut(s![..n_prefix, ..]).assign(&self.prefix_rows);
        let mut offset = n_prefix;
        for entry in chain.iter() {
            let len = entry.rows.len_of(Axis(0));
            rows.slice_mut(s![offset..offset + len, ..])
                .assign(&entry.rows);
            offset += len;
        }

        let mut path = self.prefix_path.clone();
        path.extend(chain.iter().map(|entry| entry.pattern));

        Ok(Region::new(output, &rows, path)?)
    }
}

#[cfg(feature = "parallel")]
fn run_parallel(
    network: &Network,
    options: &EnumerationOptions,
) -> Result<Vec<Region>, RegionError> {
    let root = Task {
        layer: 0,
        expr: ExprMatrix::identity(network.in_dim()),
        rows: Array2::from_elem((0, network.in_dim() + 1), Decimal::ZERO),
        path: Vec::new(),
    };

    match options.max_threads {
        Some(max_threads) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(max_threads)
                .build()?;
            info!("Enumerating in parallel with {} threads", max_threads);
            pool.install(|| fan_out(network, root, options.parallel_depth))
        }
        None => fan_out(network, root, options.parallel_depth),
    }
}

#[cfg(not(feature = "parallel"))]
fn run_parallel(
    network: &Network,
    _options: &EnumerationOptions,
) -> Result<Vec<Region>, RegionError> {
    log::warn!("Parallel enumeration requested but the parallel feature is disabled");
    Enumerator::new(network, &mut NoOpVis {}).run(Branch::root(network))
}

/// A branch that owns its complete constraint prefix, so that it can be moved to another thread.
#[cfg(feature = "parallel")]
#[derive(Debug)]
struct Task {
    layer: usize,
    expr: ExprMatrix,
    rows: Array2<Decimal>,
    path: Vec<ActivationPattern>,
}

#[cfg(feature = "parallel")]
fn fan_out(network: &Network, task: Task, depth: usize) -> Result<Vec<Region>, RegionError> {
    use ndarray::concatenate;
    use rayon::prelude::*;

    if task.layer == 0 {
        let cache = ContributionCache::new(&task.expr, network.layer(0))?;
        let expr = cache.assemble(&PassThrough)?;
        return fan_out(network, Task { layer: 1, expr, ..task }, depth);
    }

    if depth == 0 || task.layer == network.n_layers() {
        let branch = Branch {
            layer: task.layer,
            expr: task.expr,
            frame: None,
        };
        let mut visitor = NoOpVis {};
        return Enumerator::with_prefix(network, &mut visitor, task.rows, task.path).run(branch);
    }

    debug!("Dispatching branches of layer {}", task.layer);

    let cache = ContributionCache::new(&task.expr, network.layer(task.layer))?;
    let patterns: Vec<ActivationPattern> = ActivationPattern::descending(task.expr.n_nodes()).collect();

    let results = patterns
        .into_par_iter()
        .map(|pattern| {
            let constraints = build_constraints(&task.expr, &pattern);
            let rows = concatenate![Axis(0), task.rows, constraints];
            let mut path = task.path.clone();
            path.push(pattern);

            let child = Task {
                layer: task.layer + 1,
                expr: cache.assemble(&pattern)?,
                rows,
                path,
            };
            fan_out(network, child, depth - 1)
        })
        .collect::<Result<Vec<Vec<Region>>, RegionError>>()?;

    Ok(results.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use ndarray::{arr1, arr2};

    use super::*;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn mixed_network() -> Network {
        Network::new(&[
            arr2(&[[1., -1., 0.5], [0.25, 2., -1.], [-1., 0.5, 0.]]),
            arr2(&[[1., 0., -2., 0.5], [0.5, 1., 1., -1.]]),
            arr2(&[[1., -1., 0.], [2., 0.5, 1.]]),
        ])
        .unwrap()
    }

    #[test]
    fn test_identity_relu() {
        init_logger();

        let regions = enumerate(&[arr2(&[[1., 0.]]), arr2(&[[1., 0.]])]).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].constraint_table(), arr2(&[[-1., 0.]]));
        assert_eq!(regions[0].output_table(), arr2(&[[1., 0.]]));
        assert_eq!(regions[1].constraint_table(), arr2(&[[1., 0.]]));
        assert_eq!(regions[1].output_table(), arr2(&[[0., 0.]]));
    }

    #[test]
    fn test_single_layer() {
        init_logger();

        let regions = enumerate(&[arr2(&[[2., -1., 3.], [0., 1., 0.]])]).unwrap();

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].n_constraints(), 0);
        assert!(regions[0].patterns().is_empty());
        assert_eq!(
            regions[0].output_table(),
            arr2(&[[2., -1., 3.], [0., 1., 0.]])
        );
    }

    #[test]
    fn test_order() {
        init_logger();

        let regions = enumerate_generic(
            &mixed_network(),
            &EnumerationOptions::default(),
            &mut NoOpVis {},
        )
        .unwrap();

        let paths = regions.iter().map(|region| region.path_string()).collect_vec();
        assert_eq!(paths.len(), 32);
        assert_eq!(paths[0], "111|11");
        assert_eq!(paths[1], "111|01");
        assert_eq!(paths[4], "011|11");
        assert_eq!(paths[31], "000|00");
    }

    #[test]
    fn test_shared_prefix() {
        init_logger();

        let regions = enumerate_generic(
            &mixed_network(),
            &EnumerationOptions::default(),
            &mut NoOpVis {},
        )
        .unwrap();

        // siblings share the constraints of their first hidden layer
        let first = regions[0].constraint_table();
        let second = regions[1].constraint_table();
        assert_eq!(first.slice(s![..3, ..]), second.slice(s![..3, ..]));
        assert_ne!(first.slice(s![3.., ..]), second.slice(s![3.., ..]));
    }

    #[test]
    fn test_bias_only_region() {
        init_logger();

        let regions = enumerate(&[
            arr2(&[[1., 1., -10.], [1., -1., -10.]]),
            arr2(&[[2., 3., 0.5]]),
        ])
        .unwrap();

        let point = arr1(&[0., 0.]);
        let region = regions.iter().find(|region| region.contains(&point)).unwrap();

        assert_eq!(region.path_string(), "00");
        assert_eq!(region.output_table(), arr2(&[[0., 0., 0.5]]));
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_equals_sequential() {
        init_logger();

        let network = mixed_network();
        let sequential =
            enumerate_generic(&network, &EnumerationOptions::default(), &mut NoOpVis {}).unwrap();

        for depth in 0..4 {
            let options = EnumerationOptions {
                parallel: true,
                parallel_depth: depth,
                max_threads: None,
            };
            let parallel = enumerate_generic(&network, &options, &mut NoOpVis {}).unwrap();
            assert_eq!(parallel, sequential);
        }
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_max_threads() {
        init_logger();

        let network = mixed_network();
        let options = EnumerationOptions {
            parallel: true,
            parallel_depth: 2,
            max_threads: Some(2),
        };

        let regions = enumerate_generic(&network, &options, &mut NoOpVis {}).unwrap();

        assert_eq!(regions.len(), 32);
    }

    #[test]
    fn test_frames_reclaimed() {
        let network = mixed_network();
        let mut visitor = NoOpVis {};
        let mut enumerator = Enumerator::new(&network, &mut visitor);

        let mut stack = Vec::new();
        enumerator.descend(Branch::root(&network), &mut stack).unwrap();

        let level = stack.last_mut().unwrap();
        let pattern = level.patterns.next().unwrap();
        let rows = build_constraints(&level.expr, &pattern);
        let frame = enumerator.push_frame(None, rows.clone(), pattern);
        let child = enumerator.push_frame(Some(frame), rows, pattern);
        enumerator.release(Some(frame));

        assert_eq!(enumerator.frames.len(), 2);
        enumerator.release(Some(child));
        assert!(enumerator.frames.is_empty());
    }

    #[test]
    fn test_verbose() {
        init_logger();
        let layers = [
            arr2(&[[1., 1., -1.], [1., -1., 0.]]),
            arr2(&[[2., 3., 0.5]]),
        ];

        let regions = enumerate_verbose(&layers).unwrap();

        assert_eq!(regions, enumerate(&layers).unwrap());
    }

    #[test]
    fn test_csv() {
        init_logger();
        let path = std::env::temp_dir().join(format!("affregion-enum-{}.csv", std::process::id()));
        let layers = [arr2(&[[1., 0.]]), arr2(&[[1., 0.]])];

        let regions = enumerate_csv(&layers, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(regions.len(), 2);
        assert_eq!(
            content.lines().collect_vec(),
            vec![
                "index,path,n_constraints,constraints,output",
                "0,1,1,-1 0,1 0",
                "1,0,1,1 0,0 0",
            ]
        );
    }

    #[test]
    fn test_csv_unwritable() {
        let path = std::env::temp_dir()
            .join("affregion-missing-dir")
            .join("regions.csv");

        let err = enumerate_csv(&[arr2(&[[1., 0.]])], &path).unwrap_err();

        assert!(matches!(err, RegionError::Recorder(_)));
    }
}
