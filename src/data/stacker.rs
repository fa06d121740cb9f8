//! Interval stacking: assign display levels so overlapping labels don't collide.
//!
//! Within one layout pass, intervals on the frequency axis are claimed one at
//! a time. Each claim gets the lowest level that is free across the whole
//! interval. The stacker keeps a sorted list of boundary points; every point
//! records which levels are in use on the open segment just below it and just
//! above it, plus the levels claimed by point intervals sitting exactly on it.

use thiserror::Error;

/// Highest level the stacker will hand out before giving up.
pub const MAX_LEVELS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("no free stacking level below {limit} for interval [{low}, {high}]")]
pub struct StackOverflow {
    pub low: f64,
    pub high: f64,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct LevelSet {
    words: Vec<u64>,
}

impl LevelSet {
    fn contains(&self, level: usize) -> bool {
        self.words
            .get(level / 64)
            .is_some_and(|w| w & (1 << (level % 64)) != 0)
    }

    fn insert(&mut self, level: usize) {
        let word = level / 64;
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (level % 64);
    }
}

#[derive(Debug, Clone)]
struct Boundary {
    pos: f64,
    below: LevelSet,
    above: LevelSet,
    at: LevelSet,
}

#[derive(Debug, Default)]
pub struct IntervalStacker {
    points: Vec<Boundary>,
}

impl IntervalStacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget all claims; call at the start of every layout pass.
    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Claim the lowest level free over `(low, high)`.
    ///
    /// The interval is open, except that `low == high` is treated as a closed
    /// point, so touching endpoints conflict with it. An interval with a NaN or
    /// infinite bound cannot be placed on the axis; it gets level 0 and is not
    /// recorded.
    ///
    /// ```
    /// # use livespectrum::data::stacker::IntervalStacker;
    /// let mut s = IntervalStacker::new();
    /// assert_eq!(s.claim(0.0, 10.0).unwrap(), 0);
    /// assert_eq!(s.claim(5.0, 15.0).unwrap(), 1);
    /// assert_eq!(s.claim(10.0, 20.0).unwrap(), 0);
    /// ```
    pub fn claim(&mut self, low: f64, high: f64) -> Result<usize, StackOverflow> {
        if !(low.is_finite() && high.is_finite()) {
            return Ok(0);
        }
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let lo = self.insert_point(low);
        let hi = self.insert_point(high);

        let level = (0..MAX_LEVELS)
            .find(|&level| self.is_free(lo, hi, level))
            .ok_or(StackOverflow {
                low,
                high,
                limit: MAX_LEVELS,
            })?;

        if lo == hi {
            self.points[lo].at.insert(level);
        } else {
            self.points[lo].above.insert(level);
            for point in &mut self.points[lo + 1..hi] {
                point.below.insert(level);
                point.above.insert(level);
            }
            self.points[hi].below.insert(level);
        }
        Ok(level)
    }

    fn is_free(&self, lo: usize, hi: usize, level: usize) -> bool {
        if lo == hi {
            let point = &self.points[lo];
            return !point.below.contains(level)
                && !point.above.contains(level)
                && !point.at.contains(level);
        }
        let (first, last) = (&self.points[lo], &self.points[hi]);
        !first.above.contains(level)
            && !first.at.contains(level)
            && !last.below.contains(level)
            && !last.at.contains(level)
            && self.points[lo + 1..hi].iter().all(|p| {
                !p.below.contains(level) && !p.above.contains(level) && !p.at.contains(level)
            })
    }

    /// Index of the boundary at `pos`, inserting it if needed. A new point
    /// inherits the in-use set of the segment it splits on both sides.
    fn insert_point(&mut self, pos: f64) -> usize {
        let idx = self.points.partition_point(|p| p.pos < pos);
        if self.points.get(idx).is_some_and(|p| p.pos == pos) {
            return idx;
        }
        let segment = if idx > 0 {
            self.points[idx - 1].above.clone()
        } else {
            LevelSet::default()
        };
        self.points.insert(
            idx,
            Boundary {
                pos,
                below: segment.clone(),
                above: segment,
                at: LevelSet::default(),
            },
        );
        idx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_point_inherits_segment_levels() {
        let mut s = IntervalStacker::new();
        assert_eq!(s.claim(0.0, 100.0).unwrap(), 0);
        // a point strictly inside an existing interval must not reuse its level
        assert_eq!(s.claim(50.0, 50.0).unwrap(), 1);
        assert_eq!(s.claim(40.0, 60.0).unwrap(), 2);
    }

    #[test]
    fn point_claims_do_not_leak_into_segments() {
        let mut s = IntervalStacker::new();
        assert_eq!(s.claim(0.0, 100.0).unwrap(), 0);
        assert_eq!(s.claim(50.0, 50.0).unwrap(), 1);
        assert_eq!(s.claim(70.0, 80.0).unwrap(), 1);
        // touching a point interval counts as overlap
        assert_eq!(s.claim(50.0, 60.0).unwrap(), 2);
    }

    #[test]
    fn non_finite_bounds_are_not_recorded() {
        let mut s = IntervalStacker::new();
        assert_eq!(s.claim(0.0, 10.0).unwrap(), 0);
        assert_eq!(s.claim(f64::NAN, 5.0).unwrap(), 0);
        assert_eq!(s.claim(5.0, f64::NAN).unwrap(), 0);
        assert_eq!(s.claim(f64::NEG_INFINITY, f64::INFINITY).unwrap(), 0);
        assert_eq!(s.points.len(), 2);
        assert_eq!(s.claim(2.0, 3.0).unwrap(), 1);
    }

    #[test]
    fn reversed_bounds_are_normalized() {
        let mut s = IntervalStacker::new();
        assert_eq!(s.claim(10.0, 0.0).unwrap(), 0);
        assert_eq!(s.claim(2.0, 3.0).unwrap(), 1);
    }

    #[test]
    fn overflow_is_reported() {
        let mut s = IntervalStacker::new();
        for expected in 0..MAX_LEVELS {
            assert_eq!(s.claim(1.0, 1.0).unwrap(), expected);
        }
        let err = s.claim(1.0, 1.0).unwrap_err();
        assert_eq!(err.limit, MAX_LEVELS);
    }
}
