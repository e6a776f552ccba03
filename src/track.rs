use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

use crate::transform::ReferenceFrame;

/// Position and motion of an object expressed in one reference frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FrameKinematics {
    pub frame: ReferenceFrame,
    // true if both the old-time and new-time transforms were found
    pub transformed: bool,
    pub position: na::Point3<f64>,
    pub old_position: na::Point3<f64>,
    pub closest_point: na::Point3<f64>,

    // in m/s
    pub velocity: na::Vector3<f64>,
    pub speed: f64,

    // unit vector, zero when the object stands still
    pub velocity_normalized: na::Vector3<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovingObject {
    /// 1-based position of the object among the candidates of its scan.
    pub seq: u32,
    pub stamp: f64,
    pub old_stamp: f64,
    pub sensor_frame: String,
    pub map_frame: String,
    pub fixed_frame: String,
    pub base_frame: String,

    pub index_min: usize,
    pub index_max: usize,
    pub old_index_min: usize,
    pub old_index_max: usize,

    pub angle_begin: f64,
    pub angle_end: f64,
    pub distance_at_angle_begin: f64,
    pub distance_at_angle_end: f64,
    pub distance: f64,
    pub seen_width: f64,
    pub angle_for_closest_distance: f64,
    pub closest_distance: f64,

    pub sensor: FrameKinematics,
    pub map: FrameKinematics,
    pub fixed: FrameKinematics,
    pub base: FrameKinematics,

    pub confidence: f64,
}

impl MovingObject {
    #[inline]
    pub fn frame(&self, frame: ReferenceFrame) -> &FrameKinematics {
        match frame {
            ReferenceFrame::Sensor => &self.sensor,
            ReferenceFrame::Map => &self.map,
            ReferenceFrame::Fixed => &self.fixed,
            ReferenceFrame::Base => &self.base,
        }
    }

    #[inline]
    pub fn frames(&self) -> impl Iterator<Item = &FrameKinematics> {
        ReferenceFrame::ALL.iter().map(move |f| self.frame(*f))
    }

    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.stamp - self.old_stamp
    }

    /// True if the object moves at least `min_speed` relative to any frame.
    pub fn is_moving(&self, min_speed: f64) -> bool {
        self.frames().any(|k| k.speed >= min_speed)
    }
}

/// Objects reported for one scan.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct MovingObjectArray {
    pub seq: u64,
    pub stamp: f64,
    pub objects: Vec<MovingObject>,
}

impl MovingObjectArray {
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &MovingObject> {
        self.objects.iter()
    }
}
