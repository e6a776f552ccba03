use ndarray::ArrayView1;
use serde_derive::{Deserialize, Serialize};

use crate::config::BankConfig;
use crate::math;

/// A contiguous run of mutually consistent ranges in the newest scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Candidate {
    pub index_min: usize,
    pub index_max: usize,
    pub range_sum: f32,

    /// Closest reading within the run.
    pub range_min: f32,
    pub range_min_index: usize,
    /// Farthest reading within the run.
    pub range_max: f32,
    pub range_max_index: usize,

    pub range_at_index_min: f32,
    pub range_at_index_max: f32,

    /// Chord between the two edge readings (law of cosines).
    pub seen_width: f32,
}

impl Candidate {
    #[inline(always)]
    pub fn nr_points(&self) -> usize {
        self.index_max - self.index_min + 1
    }

    #[inline(always)]
    pub fn index_mean(&self) -> usize {
        (self.index_min + self.index_max) / 2
    }

    /// Average range of the run.
    #[inline(always)]
    pub fn distance(&self) -> f32 {
        self.range_sum / self.nr_points() as f32
    }
}

#[inline(always)]
pub(crate) fn in_range(r: f32, range_min: f32, range_max: f32) -> bool {
    range_min <= r && r <= range_max
}

/// Splits one scan into candidates, left to right.
///
/// A run grows while readings stay inside `[range_min, range_max]` and neighbours
/// differ by at most the edge threshold. Runs shorter than the minimum point count
/// are skipped; scanning resumes right after every run.
pub fn segment(
    ranges: ArrayView1<'_, f32>,
    range_min: f32,
    range_max: f32,
    angle_increment: f64,
    config: &BankConfig,
) -> Vec<Candidate> {
    let max_delta = config.object_threshold_edge_max_delta_range;
    let n = ranges.len();
    let mut candidates = Vec::new();

    let mut i = 0;
    while i < n {
        let first = ranges[i];
        if !in_range(first, range_min, range_max) {
            i += 1;
            continue;
        }

        let mut cand = Candidate {
            index_min: i,
            index_max: i,
            range_sum: first,
            range_min: first,
            range_min_index: i,
            range_max: first,
            range_max_index: i,
            range_at_index_min: first,
            range_at_index_max: first,
            seen_width: 0.0,
        };

        let mut prev = first;
        for j in i + 1..n {
            let r = ranges[j];
            if !in_range(r, range_min, range_max) || (prev - r).abs() > max_delta {
                break;
            }

            cand.index_max = j;
            cand.range_sum += r;
            if r < cand.range_min {
                cand.range_min = r;
                cand.range_min_index = j;
            } else if cand.range_max < r {
                cand.range_max = r;
                cand.range_max_index = j;
            }
            prev = r;
        }

        let nr_points = cand.nr_points();
        cand.range_at_index_max = prev;
        cand.seen_width = math::chord_width(
            first,
            prev,
            (angle_increment * nr_points as f64) as f32,
        );

        if nr_points >= config.object_threshold_min_nr_points {
            candidates.push(cand);
        }

        i += nr_points;
    }

    candidates
}
