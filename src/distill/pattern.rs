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

//! Activation patterns of ReLU layers
//!
//! A pattern fixes for every node of a layer whether its ReLU is active (the node passes its
//! value on) or inactive (the node outputs zero). Bit ``j`` of the mask corresponds to node ``j``,
//! a set bit marks an active node.

use std::fmt::{self, Display};

/// Maximal number of nodes of a layer that is branched over.
pub const MAX_WIDTH: usize = 63;

/// Decides which nodes of the current layer contribute to the next layer.
pub trait NodeSelector {
    fn includes(&self, node: usize) -> bool;
}

/// Selector of the first layer: every input contributes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassThrough;

impl NodeSelector for PassThrough {
    #[inline(always)]
    fn includes(&self, _node: usize) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ActivationPattern {
    bits: u64,
    width: usize,
}

impl ActivationPattern {
    pub fn new(bits: u64, width: usize) -> ActivationPattern {
        assert!(
            width <= MAX_WIDTH,
            "Pattern width {} exceeds the maximum of {}",
            width,
            MAX_WIDTH
        );
        assert!(
            bits <= Self::max_bits(width),
            "Pattern {:#b} has bits outside of width {}",
            bits,
            width
        );
        ActivationPattern { bits, width }
    }

    #[inline(always)]
    fn max_bits(width: usize) -> u64 {
        (1u64 << width) - 1
    }

    /// Pattern with all ``width`` nodes active.
    pub fn all_active(width: usize) -> ActivationPattern {
        ActivationPattern::new(Self::max_bits(width), width)
    }

    /// Pattern with all ``width`` nodes inactive.
    pub fn all_inactive(width: usize) -> ActivationPattern {
        ActivationPattern::new(0, width)
    }

    /// Iterates over all 2^width patterns, starting with all nodes active and ending with all
    /// nodes inactive.
    pub fn descending(width: usize) -> Descending {
        Descending {
            next: Some(Self::all_active(width).bits),
            width,
        }
    }

    #[inline]
    pub fn is_active(&self, node: usize) -> bool {
        debug_assert!(node < self.width);
        (self.bits >> node) & 1 == 1
    }

    #[inline]
    pub fn bits(&self) -> u64 {
        self.bits
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn n_active(&self) -> usize {
        self.bits.count_ones() as usize
    }
}

impl NodeSelector for ActivationPattern {
    #[inline(always)]
    fn includes(&self, node: usize) -> bool {
        self.is_active(node)
    }
}

/// Iterator over all patterns of one width in descending order, see [`ActivationPattern::descending`].
#[derive(Clone, Debug)]
pub struct Descending {
    next: Option<u64>,
    width: usize,
}

impl Iterator for Descending {
    type Item = ActivationPattern;

    fn next(&mut self) -> Option<ActivationPattern> {
        let bits = self.next?;
        self.next = bits.checked_sub(1);
        Some(ActivationPattern {
            bits,
            width: self.width,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next.and_then(|bits| usize::try_from(bits).ok()) {
            Some(bits) => (bits.saturating_add(1), bits.checked_add(1)),
            None if self.next.is_none() => (0, Some(0)),
            None => (usize::MAX, None),
        }
    }
}

/// Writes one digit per node in node order, e.g. `10` for node 0 active and node 1 inactive.
impl Display for ActivationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in 0..self.width {
            write!(f, "{}", if self.is_active(node) { '1' } else { '0' })?;
        }
        Ok(())
    }
}
