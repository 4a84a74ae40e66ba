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

/// Equivalence tests of enumerated regions against a direct evaluation of the network.
///
/// Random inputs are assigned to the first region that contains them. The affine function of
/// that region must agree with a sequential evaluation of the layers. Also the frequency with
/// which the regions are hit is logged.
#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use affregion::aff;
    use affregion::distill::enumerate::{enumerate, enumerate_generic, EnumerationOptions};
    use affregion::distill::network::Network;
    use affregion::distill::region::Region;
    use affregion::distill::visitor::NoOpVis;
    use affregion::linalg::affine::AffFunc;
    use approx::assert_relative_eq;
    use assertables::assert_le;
    use ndarray::{arr1, arr2, s, Array, Array1, Array2};
    use ndarray_rand::rand_distr::{Normal, Uniform};
    use ndarray_rand::RandomExt;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    pub fn eval_layers(layers: &[Array2<f64>], input: &Array1<f64>) -> Array1<f64> {
        let mut val = input.to_owned();
        for (idx, layer) in layers.iter().enumerate() {
            let ncols = layer.ncols();
            val = layer.slice(s![.., ..ncols - 1]).dot(&val) + layer.column(ncols - 1);
            if idx + 1 < layers.len() {
                val.mapv_inplace(|x| x.max(0.));
            }
        }
        val
    }

    /// Random layers with weights rounded to four decimal places.
    fn random_layers(widths: &[usize], rng: &mut StdRng) -> Vec<Array2<f64>> {
        let dist = Uniform::new(-1f64, 1f64);
        widths
            .windows(2)
            .map(|dims| {
                Array::random_using((dims[1], dims[0] + 1), dist, rng)
                    .mapv(|x: f64| (x * 1e4).round() / 1e4)
            })
            .collect()
    }

    fn select<'a>(regions: &'a [Region], point: &Array1<f64>) -> &'a Region {
        regions
            .iter()
            .find(|region| region.contains(point))
            .unwrap_or_else(|| panic!("No region contains {}", point))
    }

    fn assert_equivalent(layers: &[Array2<f64>], regions: &[Region], samples: usize, rng: &mut StdRng) {
        let in_dim = layers[0].ncols() - 1;
        let normal = Normal::new(0., 2.).unwrap();

        let mut hits = BTreeMap::<String, usize>::new();

        for _ in 0..samples {
            let x = Array::random_using(in_dim, normal, rng);

            let gt = eval_layers(layers, &x);
            let region = select(regions, &x);

            *hits.entry(region.path_string()).or_insert(0) += 1;

            assert_relative_eq!(gt, region.apply(&x), epsilon = 1e-08, max_relative = 1e-05);
        }

        for (path, count) in hits.iter() {
            log::debug!("{}: {}", path, count);
        }
    }

    #[test]
    pub fn test_equivalence_random() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(42);

        for widths in [vec![2, 3, 1], vec![3, 4, 3, 2], vec![2, 2, 2, 2, 1]] {
            let layers = random_layers(&widths, &mut rng);
            let regions = enumerate(&layers).unwrap();

            assert_equivalent(&layers, &regions, 500, &mut rng);
        }
    }

    #[test]
    pub fn test_equivalence_iris_dnn() {
        init_logger();

        let l0 = aff!([[-0.09177965670824051, 0.8253487348556519, -0.8163803815841675, -0.9800696969032288],
            [0.5591527223587036, -0.3632337152957916, 1.3144720792770386, 0.2468724548816681],
            [0.18317964673042297, -0.3006826341152191, 0.1607706993818283, 1.8758670091629028],
            [0.6726926565170288, -0.3332176208496094, -0.9476901888847351, -0.20959123969078064]]
            + [0.6692222356796265, 1.2492079734802246, -0.49917441606521606, 0.6329305171966553]);
        let l1 = aff!([[1.1643257141113281, -0.7534151673316956, 0.17711225152015686, -1.1624157428741455],
            [-1.2407400608062744, 0.9271628856658936, -1.2888133525848389, 0.23608165979385376],
            [-1.1691803932189941, 0.8739460110664368, 1.1971392631530762, -1.7638847827911377]]
            + [-0.37897831201553345, 0.9170833826065063, -0.7026672959327698]);

        let layers: Vec<Array2<f64>> = [&l0, &l1].iter().map(|aff: &&AffFunc| aff.to_table()).collect();
        let network = Network::from_affine(&[l0, l1]).unwrap();

        let regions =
            enumerate_generic(&network, &EnumerationOptions::default(), &mut NoOpVis {}).unwrap();

        assert_eq!(regions.len(), 16);

        let mut rng = StdRng::seed_from_u64(7);
        assert_equivalent(&layers, &regions, 2000, &mut rng);
    }

    #[test]
    pub fn test_idempotence() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(3);
        let layers = random_layers(&[3, 3, 2, 2], &mut rng);

        let first = enumerate(&layers).unwrap();
        let second = enumerate(&layers).unwrap();

        assert_eq!(first, second);
    }

    #[cfg(feature = "parallel")]
    #[test]
    pub fn test_parallel_equals_sequential() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(11);
        let layers = random_layers(&[3, 4, 3, 2], &mut rng);

        let sequential = enumerate(&layers).unwrap();
        let parallel = affregion::distill::enumerate::enumerate_parallel(&layers).unwrap();

        assert_eq!(sequential, parallel);
    }

    #[test]
    pub fn test_boundary_prefers_active() {
        init_logger();
        let layers = [arr2(&[[1., 0., 0.], [0., 1., 0.]]), arr2(&[[1., -1., 0.]])];
        let regions = enumerate(&layers).unwrap();

        // the origin lies on the boundary of all four regions
        let origin = arr1(&[0., 0.]);
        assert_eq!(regions.iter().filter(|region| region.contains(&origin)).count(), 4);

        let region = select(&regions, &origin);
        assert_eq!(region.path_string(), "11");
        assert_le!(region.apply(&origin)[0].abs(), 1e-12);
    }
}
