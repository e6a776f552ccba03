use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::BankConfig;
use crate::error::Error;

/// Coordinate systems in which object kinematics are reported.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceFrame {
    Sensor,
    Map,
    Fixed,
    Base,
}

impl ReferenceFrame {
    pub const ALL: [ReferenceFrame; 4] = [
        ReferenceFrame::Sensor,
        ReferenceFrame::Map,
        ReferenceFrame::Fixed,
        ReferenceFrame::Base,
    ];

    /// Name of this frame in the transform tree.
    pub fn name<'a>(&self, config: &'a BankConfig, sensor_frame: &'a str) -> &'a str {
        match self {
            ReferenceFrame::Sensor => sensor_frame,
            ReferenceFrame::Map => &config.map_frame,
            ReferenceFrame::Fixed => &config.fixed_frame,
            ReferenceFrame::Base => &config.base_frame,
        }
    }
}

/// Source of rigid transforms between named frames.
///
/// `lookup` returns the transform taking points expressed in `source` at time
/// `stamp` into `target`. Implementations backed by a live transform tree should
/// bound how long they wait and answer `Error::TransformUnavailable` on timeout.
pub trait TransformLookup {
    fn lookup(&self, target: &str, source: &str, stamp: f64) -> Result<na::Isometry3<f64>, Error>;
}

impl<F> TransformLookup for F
where
    F: Fn(&str, &str, f64) -> Option<na::Isometry3<f64>>,
{
    fn lookup(&self, target: &str, source: &str, stamp: f64) -> Result<na::Isometry3<f64>, Error> {
        self(target, source, stamp).ok_or_else(|| unavailable(target, source, stamp))
    }
}

fn unavailable(target: &str, source: &str, stamp: f64) -> Error {
    Error::TransformUnavailable {
        target: target.to_string(),
        source_frame: source.to_string(),
        stamp,
    }
}

/// Every lookup fails; all frames degrade to sensor coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTransforms;

impl TransformLookup for NoTransforms {
    fn lookup(&self, target: &str, source: &str, stamp: f64) -> Result<na::Isometry3<f64>, Error> {
        Err(unavailable(target, source, stamp))
    }
}

/// Time-invariant transforms keyed by `(target, source)`.
#[derive(Debug, Clone, Default)]
pub struct StaticTransforms {
    transforms: HashMap<(String, String), na::Isometry3<f64>>,
}

impl StaticTransforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: &str, source: &str, transform: na::Isometry3<f64>) {
        self.transforms
            .insert((target.to_string(), source.to_string()), transform);
    }

    pub fn with(mut self, target: &str, source: &str, transform: na::Isometry3<f64>) -> Self {
        self.insert(target, source, transform);
        self
    }
}

impl TransformLookup for StaticTransforms {
    fn lookup(&self, target: &str, source: &str, stamp: f64) -> Result<na::Isometry3<f64>, Error> {
        if target == source {
            return Ok(na::Isometry3::identity());
        }

        self.transforms
            .get(&(target.to_string(), source.to_string()))
            .copied()
            .ok_or_else(|| unavailable(target, source, stamp))
    }
}
