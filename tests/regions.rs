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

/// Structural properties of enumerated regions.
///
/// These tests check the number and shape of regions for small hand-written networks,
/// the rejection of malformed networks and the exact arithmetic applied to the weights.
#[cfg(test)]
mod tests {
    use affregion::distill::enumerate::enumerate;
    use affregion::distill::error::RegionError;
    use affregion::distill::network::{Network, ShapeError};
    use affregion::linalg::exact;
    use affregion::poly;
    use assertables::assert_contains;
    use itertools::Itertools;
    use ndarray::{arr1, arr2, Array2};

    fn init_logger() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    pub fn test_identity_through_relu() {
        init_logger();

        let regions = enumerate(&[arr2(&[[1., 0.]]), arr2(&[[1., 0.]])]).unwrap();

        assert_eq!(regions.len(), 2);

        // x >= 0 => x
        assert_eq!(regions[0].constraint_table(), arr2(&[[-1., 0.]]));
        assert_eq!(regions[0].output_table(), arr2(&[[1., 0.]]));
        // x <= 0 => 0
        assert_eq!(regions[1].constraint_table(), arr2(&[[1., 0.]]));
        assert_eq!(regions[1].output_table(), arr2(&[[0., 0.]]));
    }

    #[test]
    pub fn test_two_two_one() {
        init_logger();

        let regions = enumerate(&[
            arr2(&[[1., 1., 0.], [1., -1., 0.]]),
            arr2(&[[1., 1., 0.]]),
        ])
        .unwrap();

        assert_eq!(regions.len(), 4);
        for region in regions.iter() {
            assert_eq!(region.constraint_table().dim(), (2, 3));
            assert_eq!(region.output_table().dim(), (1, 3));
        }

        let outputs = regions.iter().map(|region| region.output_table()).collect_vec();
        assert_eq!(outputs[0], arr2(&[[2., 0., 0.]]));
        assert_eq!(outputs[1], arr2(&[[1., -1., 0.]]));
        assert_eq!(outputs[2], arr2(&[[1., 1., 0.]]));
        assert_eq!(outputs[3], arr2(&[[0., 0., 0.]]));
    }

    #[test]
    pub fn test_region_count() {
        init_logger();

        let layers = [
            Array2::from_elem((4, 4), 0.5),
            Array2::from_elem((3, 5), -0.25),
            Array2::from_elem((2, 4), 1.),
        ];
        let network = Network::new(&layers).unwrap();
        let regions = enumerate(&layers).unwrap();

        assert_eq!(network.n_regions(), Some(128));
        assert_eq!(regions.len(), 128);
        for region in regions.iter() {
            assert_eq!(region.n_constraints(), 7);
            assert_eq!(region.patterns().len(), 2);
            assert_eq!(region.constraint_table().ncols(), 4);
            assert_eq!(region.output_table().dim(), (2, 4));
        }
    }

    #[test]
    pub fn test_no_hidden_layer() {
        init_logger();

        let regions = enumerate(&[arr2(&[[1., 2., 3.]])]).unwrap();

        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].n_constraints(), 0);
        assert_eq!(regions[0].output_table(), arr2(&[[1., 2., 3.]]));
    }

    #[test]
    pub fn test_all_inactive() {
        init_logger();

        let regions = enumerate(&[
            arr2(&[[1., 1., -10.], [1., -1., -10.]]),
            arr2(&[[2., 3., 0.5]]),
        ])
        .unwrap();

        let point = arr1(&[0., 0.]);
        let region = regions.iter().find(|region| region.contains(&point)).unwrap();

        assert_eq!(region.output_table(), arr2(&[[0., 0., 0.5]]));
        assert_eq!(region.apply(&point), arr1(&[0.5]));
    }

    #[test]
    pub fn test_exact_weights() {
        init_logger();

        // relu(0.1 relu(x) + 0.2) + 0.1
        let regions =
            enumerate(&[arr2(&[[1., 0.]]), arr2(&[[0.1, 0.2]]), arr2(&[[1., 0.1]])]).unwrap();

        assert_ne!(0.2 + 0.1, 0.3);
        assert_eq!(regions[0].output_table(), arr2(&[[0.1, 0.3]]));
    }

    #[test]
    pub fn test_with_constraints() {
        init_logger();

        let regions = enumerate(&[arr2(&[[1., 0.]]), arr2(&[[1., 0.]])]).unwrap();
        // restrict the active region x >= 0 to x <= 2
        let refined = regions[0].polytope().intersection(&poly!([[1]] < [2]));
        let region = regions[0].clone().with_constraints(refined);

        assert_eq!(region.n_constraints(), 2);
        assert_eq!(region.constraint_table(), arr2(&[[-1., 0.], [1., -2.]]));
        assert!(region.contains(&arr1(&[1.5])));
        assert!(!region.contains(&arr1(&[3.])));
        assert!(regions[0].contains(&arr1(&[3.])));
        assert_eq!(region.output_table(), regions[0].output_table());
        assert_eq!(region.patterns(), regions[0].patterns());
    }

    #[test]
    pub fn test_display() {
        let regions = enumerate(&[arr2(&[[1., 0.]]), arr2(&[[1., 0.]])]).unwrap();

        assert_contains!(regions[0].to_string(), "region [1]");
    }

    #[test]
    pub fn test_invalid_empty() {
        let err = enumerate(&[]).unwrap_err();

        assert!(matches!(err, RegionError::InvalidNetwork(ShapeError::Empty)));
    }

    #[test]
    pub fn test_invalid_mismatch() {
        let err = enumerate(&[Array2::ones((2, 3)), Array2::ones((1, 4))]).unwrap_err();

        assert!(matches!(
            err,
            RegionError::InvalidNetwork(ShapeError::Dim { layer: 1, expected: 3, got: 4 })
        ));
    }

    #[test]
    pub fn test_invalid_ragged() {
        let err = Network::from_rows(&[vec![vec![1., 0.], vec![1.]]]).unwrap_err();

        assert!(matches!(err, RegionError::InvalidNetwork(ShapeError::Ragged { .. })));
    }

    #[test]
    pub fn test_invalid_width() {
        let err = enumerate(&[Array2::ones((64, 2)), Array2::ones((1, 65))]).unwrap_err();

        assert!(matches!(err, RegionError::InvalidNetwork(ShapeError::Width { .. })));
    }

    #[test]
    pub fn test_invalid_weight() {
        let err = enumerate(&[arr2(&[[f64::INFINITY, 0.]])]).unwrap_err();

        assert!(matches!(err, RegionError::Precision(exact::PrecisionError::NonFinite(_))));
    }

    #[test]
    pub fn test_exact_arithmetic() {
        assert_eq!(exact::add(0.1, 0.2).unwrap(), 0.3);
        assert_eq!(exact::multiply(0.1, 3.0).unwrap(), 0.3);
        assert!(exact::add(f64::NAN, 0.0).is_err());
    }
}
