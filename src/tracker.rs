use ndarray::ArrayView1;
use serde_derive::{Deserialize, Serialize};

use crate::bank::ScanBank;
use crate::config::BankConfig;
use crate::segment::{in_range, Candidate};

/// The extent an object had in one older scan.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct OldSegment {
    pub age: usize,
    pub index_min: usize,
    pub index_mean: usize,
    pub index_max: usize,
    pub range_sum: f32,
    pub range_at_index_min: f32,
    pub range_at_index_max: f32,
}

impl OldSegment {
    #[inline]
    pub fn nr_points(&self) -> usize {
        self.index_max - self.index_min + 1
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.range_sum / self.nr_points() as f32
    }
}

/// Object extent expected at the next level, taken from the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Expected {
    pub nr_points: usize,
    pub range_sum: f32,
}

impl Expected {
    #[inline]
    fn distance(&self) -> f32 {
        self.range_sum / self.nr_points as f32
    }
}

/// Grows a segment around `seed` in one scan.
///
/// Returns `None` when the reading at the seed itself is out of range.
pub fn grow_segment(
    ranges: ArrayView1<'_, f32>,
    seed: usize,
    range_min: f32,
    range_max: f32,
    max_delta: f32,
) -> Option<OldSegment> {
    let at_seed = *ranges.get(seed)?;
    if !in_range(at_seed, range_min, range_max) {
        return None;
    }

    let accepts = |r: f32, prev: f32| in_range(r, range_min, range_max) && (r - prev).abs() <= max_delta;
    let mut range_sum = at_seed;

    let (mut left, mut prev) = (seed, at_seed);
    for i in (0..seed).rev() {
        let r = ranges[i];
        if !accepts(r, prev) {
            break;
        }
        left = i;
        prev = r;
        range_sum += r;
    }
    let range_at_index_min = prev;

    let (mut right, mut prev) = (seed, at_seed);
    for i in seed + 1..ranges.len() {
        let r = ranges[i];
        if !accepts(r, prev) {
            break;
        }
        right = i;
        prev = r;
        range_sum += r;
    }

    Some(OldSegment {
        age: 0,
        index_min: left,
        index_mean: (left + right) / 2,
        index_max: right,
        range_sum,
        range_at_index_min,
        range_at_index_max: prev,
    })
}

/// Whether `found` is plausibly the same object as the one described by `expected`.
pub fn matches(found: &OldSegment, expected: &Expected, config: &BankConfig) -> bool {
    let width = found.nr_points();
    let delta_width = (width as i64 - expected.nr_points as i64).unsigned_abs() as usize;

    width >= config.object_threshold_min_nr_points
        && delta_width <= config.object_threshold_max_delta_width_in_points
        && (found.distance() - expected.distance()).abs()
            <= config.object_threshold_bank_tracking_max_delta_distance
}

/// Outcome of following a candidate back through the bank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackResult {
    /// The oldest matched segment, `None` if the object was lost.
    pub segment: Option<OldSegment>,
    /// Number of older scans examined.
    pub levels: usize,
}

/// Follows `candidate` from the newest scan back to the oldest one, re-centering on
/// the segment found at each age. A reading out of `[range_min, range_max]` at the
/// seed loses the object immediately; mismatching segments count as misses and the
/// object is lost once misses exceed the configured tolerance.
pub fn track(
    bank: &ScanBank,
    candidate: &Candidate,
    range_min: f32,
    range_max: f32,
) -> TrackResult {
    let config = bank.config();
    let tolerance = config.tracking_miss_tolerance;
    let max_delta = config.object_threshold_edge_max_delta_range;

    let mut expected = Expected {
        nr_points: candidate.nr_points(),
        range_sum: candidate.range_sum,
    };
    let mut seed = candidate.index_mean();
    let mut misses = 0;
    let mut oldest = None;
    let mut levels = 0;

    for age in 1..bank.capacity() {
        levels += 1;

        let found = bank
            .slot_by_age(age)
            .and_then(|slot| grow_segment(slot, seed, range_min, range_max, max_delta));

        let mut found = match found {
            Some(found) => found,
            None => return TrackResult { segment: None, levels },
        };
        found.age = age;

        if !matches(&found, &expected, config) {
            misses += 1;
            if misses > tolerance {
                return TrackResult { segment: None, levels };
            }
        }

        seed = found.index_mean;
        expected = Expected {
            nr_points: found.nr_points(),
            range_sum: found.range_sum,
        };
        oldest = Some(found);
    }

    TrackResult {
        segment: oldest,
        levels,
    }
}
