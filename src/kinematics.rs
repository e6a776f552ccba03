//! Position, velocity and speed of a tracked object in every reference frame.
//!
//! The object's position is derived twice from the bank: from the candidate in the
//! newest scan and from its matched segment in the oldest scan. Both are projected
//! into each frame with the transform valid at the respective time; a frame whose
//! transforms are missing keeps sensor coordinates.

use nalgebra as na;
use tracing::warn;

use crate::bank::ScanBank;
use crate::confidence::TransformFlags;
use crate::math;
use crate::segment::Candidate;
use crate::track::{FrameKinematics, MovingObject};
use crate::tracker::OldSegment;
use crate::transform::{ReferenceFrame, TransformLookup};

/// A tracked object before confidence scoring.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub object: MovingObject,
    pub dt: f64,
    pub old_seen_width: f64,
    pub transforms: TransformFlags,
}

/// Sensor-frame points the per-frame computation starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorPoints {
    pub new: na::Point3<f64>,
    pub old: na::Point3<f64>,
    pub closest: na::Point3<f64>,
}

/// Transforms of one frame at the old and the new time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPair {
    pub old: Option<na::Isometry3<f64>>,
    pub new: Option<na::Isometry3<f64>>,
}

impl TransformPair {
    pub fn identity() -> Self {
        Self {
            old: Some(na::Isometry3::identity()),
            new: Some(na::Isometry3::identity()),
        }
    }

    #[inline]
    pub fn flags(&self) -> (bool, bool) {
        (self.old.is_some(), self.new.is_some())
    }
}

fn lookup_logged(
    transforms: &dyn TransformLookup,
    target: &str,
    source: &str,
    stamp: f64,
) -> Option<na::Isometry3<f64>> {
    match transforms.lookup(target, source, stamp) {
        Ok(t) => Some(t),
        Err(err) => {
            warn!(target_frame = target, stamp, "{}", err);
            None
        }
    }
}

pub fn lookup_pair(
    transforms: &dyn TransformLookup,
    target: &str,
    source: &str,
    old_stamp: f64,
    new_stamp: f64,
) -> TransformPair {
    TransformPair {
        old: lookup_logged(transforms, target, source, old_stamp),
        new: lookup_logged(transforms, target, source, new_stamp),
    }
}

/// Kinematics in one frame. Without both transforms the sensor coordinates are used.
pub fn frame_kinematics(
    frame: ReferenceFrame,
    pair: &TransformPair,
    points: &SensorPoints,
    dt: f64,
) -> FrameKinematics {
    let (transformed, new, old, closest) = match (pair.old, pair.new) {
        (Some(t_old), Some(t_new)) => (
            true,
            t_new * points.new,
            t_old * points.old,
            t_new * points.closest,
        ),
        _ => (false, points.new, points.old, points.closest),
    };

    let velocity = if dt > 0.0 {
        (new - old) / dt
    } else {
        na::Vector3::zeros()
    };
    let (speed, velocity_normalized) = math::norm_and_direction(&velocity);

    FrameKinematics {
        frame,
        transformed,
        position: new,
        old_position: old,
        closest_point: closest,
        velocity,
        speed,
        velocity_normalized,
    }
}

/// Builds the object seen as `candidate` in the newest scan and as `old` in the
/// oldest one.
pub fn estimate(
    bank: &ScanBank,
    candidate: &Candidate,
    old: &OldSegment,
    seq: u32,
    transforms: &dyn TransformLookup,
) -> Estimate {
    let config = bank.config();
    let geometry = bank.geometry();
    let (angle_min, inc) = (config.angle_min, geometry.angle_increment);

    let stamp = bank.stamp_by_age(0).unwrap_or_default();
    let old_stamp = bank.stamp_by_age(old.age).unwrap_or_default();
    let dt = stamp - old_stamp;

    let angle_begin = math::index_to_angle(candidate.index_min, angle_min, inc);
    let angle_end = math::index_to_angle(candidate.index_max, angle_min, inc);
    let distance = candidate.distance() as f64;
    let angle_for_closest_distance =
        math::index_to_angle(candidate.range_min_index, angle_min, inc);

    let old_seen_width = math::chord_width(
        old.range_at_index_min as f64,
        old.range_at_index_max as f64,
        old.nr_points() as f64 * inc,
    );

    let points = SensorPoints {
        new: math::polar_to_point(distance, (angle_begin + angle_end) / 2.0),
        old: math::polar_to_point(
            old.distance() as f64,
            math::index_to_angle(old.index_mean, angle_min, inc),
        ),
        closest: math::polar_to_point(candidate.range_min as f64, angle_for_closest_distance),
    };

    let sensor_frame = geometry.frame_id.as_str();
    let pair = |frame: ReferenceFrame| {
        lookup_pair(
            transforms,
            frame.name(config, sensor_frame),
            sensor_frame,
            old_stamp,
            stamp,
        )
    };
    let (map, fixed, base) = (
        pair(ReferenceFrame::Map),
        pair(ReferenceFrame::Fixed),
        pair(ReferenceFrame::Base),
    );

    let object = MovingObject {
        seq,
        stamp,
        old_stamp,
        sensor_frame: sensor_frame.to_string(),
        map_frame: config.map_frame.clone(),
        fixed_frame: config.fixed_frame.clone(),
        base_frame: config.base_frame.clone(),
        index_min: candidate.index_min,
        index_max: candidate.index_max,
        old_index_min: old.index_min,
        old_index_max: old.index_max,
        angle_begin,
        angle_end,
        distance_at_angle_begin: candidate.range_at_index_min as f64,
        distance_at_angle_end: candidate.range_at_index_max as f64,
        distance,
        seen_width: candidate.seen_width as f64,
        angle_for_closest_distance,
        closest_distance: candidate.range_min as f64,
        sensor: frame_kinematics(ReferenceFrame::Sensor, &TransformPair::identity(), &points, dt),
        map: frame_kinematics(ReferenceFrame::Map, &map, &points, dt),
        fixed: frame_kinematics(ReferenceFrame::Fixed, &fixed, &points, dt),
        base: frame_kinematics(ReferenceFrame::Base, &base, &points, dt),
        confidence: 0.0,
    };

    Estimate {
        object,
        dt,
        old_seen_width,
        transforms: TransformFlags {
            map: map.flags(),
            fixed: fixed.flags(),
            base: base.flags(),
        },
    }
}
