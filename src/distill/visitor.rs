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

//! Observers of an enumeration
//!
//! Visitors are notified about the progress of an enumeration but cannot influence its result.
//! Failures of a visitor (for example a full disk) are logged and otherwise ignored.

use std::fs::File;
use std::path::Path;
use std::time::{Duration, Instant};

use console::style;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use itertools::Itertools;
use log::{error, info};
use ndarray::Array2;

use super::network::Network;
use super::region::Region;
use crate::linalg::expr::ExprMatrix;

pub trait RegionVisitor {
    /// Called once before the first layer is processed.
    fn start_enumeration(&mut self, network: &Network);
    /// Called whenever the branches of hidden layer ``layer`` are expanded from ``current``.
    ///
    /// The parallel driver does not report layers.
    fn visit_layer(&mut self, layer: usize, current: &ExprMatrix);
    /// Called for every completed region, in output order.
    fn visit_region(&mut self, index: usize, region: &Region);
    fn finish_enumeration(&mut self, n_regions: usize);
}

#[derive(Clone, Debug, Default)]
pub struct NoOpVis {}

impl RegionVisitor for NoOpVis {
    fn start_enumeration(&mut self, _: &Network) {}
    fn visit_layer(&mut self, _: usize, _: &ExprMatrix) {}
    fn visit_region(&mut self, _: usize, _: &Region) {}
    fn finish_enumeration(&mut self, _: usize) {}
}

fn progress_style(width: usize) -> ProgressStyle {
    let template = format!(
        "{: >12} [{{bar:{}}}] {{pos}}/{{len}} ({{elapsed}})",
        style("Enumerating").cyan().bold(),
        width
    );
    ProgressStyle::default_bar()
        .template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Reports the progress of an enumeration on the console.
#[derive(Clone, Debug)]
pub struct RegionConsole {
    pb: ProgressBar,
    timer: Instant,
    expansions: Vec<usize>,
}

impl RegionConsole {
    pub fn new() -> RegionConsole {
        RegionConsole {
            pb: ProgressBar::hidden(),
            timer: Instant::now(),
            expansions: Vec::new(),
        }
    }
}

impl Default for RegionConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionVisitor for RegionConsole {
    fn start_enumeration(&mut self, network: &Network) {
        let n_regions = network.n_regions();
        // regions beyond u64::MAX cannot be tracked anyway
        let len = n_regions.map_or(u64::MAX, |n| u64::try_from(n).unwrap_or(u64::MAX));

        self.pb = ProgressBar::new(len);
        self.pb.set_style(progress_style(25));
        self.pb.enable_steady_tick(Duration::from_secs(1));

        println!("{}", network);
        println!(
            "{: >12} {} inputs, {} layers",
            style("Network").cyan().bold(),
            network.in_dim(),
            network.n_layers()
        );

        self.expansions = vec![0; network.n_layers()];
        self.timer = Instant::now();
    }

    fn visit_layer(&mut self, layer: usize, _current: &ExprMatrix) {
        if let Some(count) = self.expansions.get_mut(layer) {
            *count += 1;
        }
    }

    fn visit_region(&mut self, _index: usize, _region: &Region) {
        self.pb.inc(1);
    }

    fn finish_enumeration(&mut self, n_regions: usize) {
        self.pb.finish_and_clear();

        for (layer, count) in self.expansions.iter().enumerate().filter(|(_, count)| **count > 0) {
            println!(
                "{: >12} layer {} ({} branch points)",
                style("Expanded").green().bold(),
                layer,
                count
            );
        }
        println!(
            "{: >12} enumeration in {:#} ({} regions)",
            style("Completed").green().bold(),
            HumanDuration(self.timer.elapsed()),
            n_regions
        );
    }
}

fn table_field(table: &Array2<f64>) -> String {
    table
        .outer_iter()
        .map(|row| row.iter().join(" "))
        .join(";")
}

#[derive(serde::Serialize)]
struct CsvRow {
    index: usize,
    path: String,
    n_constraints: usize,
    constraints: String,
    output: String,
}

/// Records one CSV row per region to a file.
///
/// Each row holds the index of the region, its activation patterns, the number of constraints,
/// the constraint table (each row `a @ x + c <= 0`) and the output table. Table rows are
/// separated by `;`.
#[derive(Debug)]
pub struct RegionCsv {
    writer: csv::Writer<File>,
    timer: Instant,
}

impl RegionCsv {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<RegionCsv, csv::Error> {
        Ok(RegionCsv {
            writer: csv::Writer::from_path(path)?,
            timer: Instant::now(),
        })
    }

    fn flush(&mut self) {
        if let Err(err) = self.writer.flush() {
            error!("Failed to flush region records: {}", err);
        }
    }
}

impl RegionVisitor for RegionCsv {
    fn start_enumeration(&mut self, _network: &Network) {
        self.timer = Instant::now();
    }

    fn visit_layer(&mut self, _layer: usize, _current: &ExprMatrix) {}

    fn visit_region(&mut self, index: usize, region: &Region) {
        let row = CsvRow {
            index,
            path: region.path_string(),
            n_constraints: region.n_constraints(),
            constraints: table_field(&region.constraint_table()),
            output: table_field(&region.output_table()),
        };
        if let Err(err) = self.writer.serialize(row) {
            error!("Failed to record region {}: {}", index, err);
        }
    }

    fn finish_enumeration(&mut self, n_regions: usize) {
        self.flush();
        info!(
            "Recorded {} regions in {:?}",
            n_regions,
            self.timer.elapsed()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use ndarray::arr2;

    use super::*;
    use crate::distill::enumerate::enumerate_generic;
    use crate::distill::enumerate::EnumerationOptions;

    #[derive(Debug, Default)]
    struct Recorder {
        layers: Vec<usize>,
        indices: Vec<usize>,
        finished: Option<usize>,
    }

    impl RegionVisitor for Recorder {
        fn start_enumeration(&mut self, _: &Network) {}

        fn visit_layer(&mut self, layer: usize, _: &ExprMatrix) {
            self.layers.push(layer);
        }

        fn visit_region(&mut self, index: usize, _: &Region) {
            self.indices.push(index);
        }

        fn finish_enumeration(&mut self, n_regions: usize) {
            self.finished = Some(n_regions);
        }
    }

    fn network() -> Network {
        Network::new(&[
            arr2(&[[1., 0., 0.], [0., 1., 0.]]),
            arr2(&[[1., 1., 0.]]),
            arr2(&[[2., 1.]]),
        ])
        .unwrap()
    }

    #[test]
    fn test_callbacks() {
        let mut recorder = Recorder::default();

        let regions =
            enumerate_generic(&network(), &EnumerationOptions::default(), &mut recorder).unwrap();

        assert_eq!(regions.len(), 8);
        assert_eq!(recorder.indices, (0..8).collect_vec());
        // one expansion of layer 1, four of layer 2
        assert_eq!(recorder.layers, vec![1, 2, 2, 2, 2]);
        assert_eq!(recorder.finished, Some(8));
    }

    #[test]
    fn test_csv() {
        let path = std::env::temp_dir().join(format!("affregion-{}.csv", std::process::id()));
        let mut recorder = RegionCsv::new(&path).unwrap();

        enumerate_generic(&network(), &EnumerationOptions::default(), &mut recorder).unwrap();
        drop(recorder);

        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let lines = content.lines().collect_vec();
        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "index,path,n_constraints,constraints,output");
        assert_eq!(lines[1], "0,11|1,3,-1 0 0;0 -1 0;-1 -1 0,2 2 1");
        // inactive second layer: x0 + x1 <= 0 and the bias of the output remains
        assert_eq!(lines[2], "1,11|0,3,-1 0 0;0 -1 0;1 1 0,0 0 1");
        assert_eq!(lines[8], "7,00|0,3,1 0 0;0 1 0;0 0 0,0 0 1");
    }

    #[test]
    fn test_console() {
        let mut console = RegionConsole::new();

        let regions =
            enumerate_generic(&network(), &EnumerationOptions::default(), &mut console).unwrap();

        assert_eq!(regions.len(), 8);
        assert_eq!(console.expansions, vec![0, 1, 4]);
    }
}
