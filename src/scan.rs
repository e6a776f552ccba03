use serde_derive::{Deserialize, Serialize};

use crate::config::SensorGeometry;

/// A planar range scan, ordered by angle.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LaserScan {
    pub frame_id: String,
    pub timestamp: f64, // in seconds
    pub angle_min: f64,
    pub angle_max: f64,
    pub angle_increment: f64,
    pub time_increment: f64,
    pub scan_time: f64,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
    #[serde(default)]
    pub intensities: Vec<f32>,
}

impl LaserScan {
    #[inline]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn geometry(&self) -> SensorGeometry {
        SensorGeometry {
            frame_id: self.frame_id.clone(),
            angle_increment: self.angle_increment,
            time_increment: self.time_increment,
            scan_time: self.scan_time,
            range_min: self.range_min,
            range_max: self.range_max,
        }
    }
}
