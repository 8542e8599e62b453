/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::datatype::Number;

/// A sorted set of landing points for threshold widening.
///
/// Instead of jumping straight to ±∞, a threshold widening extrapolates an
/// unstable bound to the nearest enclosing threshold and only gives the bound
/// up once the thresholds are exhausted.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Thresholds {
    values: Vec<Number>,
}

impl Thresholds {
    pub fn new<I: IntoIterator<Item = Number>>(values: I) -> Self {
        let mut values: Vec<Number> = values.into_iter().collect();
        values.sort_unstable();
        values.dedup();
        Self { values }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Smallest threshold `>= n`.
    pub fn next_up(&self, n: Number) -> Option<Number> {
        let idx = self.values.partition_point(|&t| t < n);
        self.values.get(idx).copied()
    }

    /// Largest threshold `<= n`.
    pub fn next_down(&self, n: Number) -> Option<Number> {
        let idx = self.values.partition_point(|&t| t <= n);
        idx.checked_sub(1).map(|i| self.values[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let ts = Thresholds::new([16, 0, -1, 256, 0]);
        assert_eq!(ts.next_up(1), Some(16));
        assert_eq!(ts.next_up(16), Some(16));
        assert_eq!(ts.next_up(257), None);
        assert_eq!(ts.next_down(-1), Some(-1));
        assert_eq!(ts.next_down(-2), None);
        assert_eq!(ts.next_down(100), Some(16));
    }
}
