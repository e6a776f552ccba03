use serde_derive::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::Error;

/// Tunables of the scan bank and of the object detection thresholds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BankConfig {
    /// EMA weight of the incoming scan, in [0,1]. 1.0 disables smoothing.
    pub ema_alpha: f32,
    pub nr_scans_in_bank: usize,
    pub points_per_scan: usize,
    pub angle_min: f64,
    pub angle_max: f64,

    pub object_threshold_edge_max_delta_range: f32,
    pub object_threshold_min_nr_points: usize,
    pub object_threshold_max_distance: f32,
    pub object_threshold_min_speed: f64,
    pub object_threshold_max_delta_width_in_points: usize,
    pub object_threshold_min_confidence: f64,
    pub object_threshold_bank_tracking_max_delta_distance: f32,

    /// Misses the tracker tolerates before giving up on an object.
    pub tracking_miss_tolerance: usize,
    pub base_confidence: f64,

    pub map_frame: String,
    pub fixed_frame: String,
    pub base_frame: String,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 1.0,
            nr_scans_in_bank: 11,
            points_per_scan: 360,
            angle_min: -PI,
            angle_max: PI,
            object_threshold_edge_max_delta_range: 0.15,
            object_threshold_min_nr_points: 5,
            object_threshold_max_distance: 6.5,
            object_threshold_min_speed: 0.03,
            object_threshold_max_delta_width_in_points: 5,
            object_threshold_min_confidence: 0.67,
            object_threshold_bank_tracking_max_delta_distance: 0.2,
            tracking_miss_tolerance: 0,
            base_confidence: 0.3,
            map_frame: "map".to_string(),
            fixed_frame: "odom".to_string(),
            base_frame: "base_link".to_string(),
        }
    }
}

fn ensure(cond: bool, msg: &str) -> Result<(), Error> {
    if cond {
        Ok(())
    } else {
        Err(Error::InvalidConfig(msg.to_string()))
    }
}

impl BankConfig {
    pub fn validate(&self) -> Result<(), Error> {
        ensure(
            (0.0..=1.0).contains(&self.ema_alpha),
            "ema_alpha must be a value in [0,1]",
        )?;
        ensure(
            self.nr_scans_in_bank >= 2,
            "the bank must hold at least 2 scans to estimate velocities",
        )?;
        ensure(self.points_per_scan >= 1, "a scan must have at least 1 point")?;
        ensure(
            -PI <= self.angle_min && self.angle_min <= self.angle_max && self.angle_max <= PI,
            "angles must satisfy -PI <= angle_min <= angle_max <= PI",
        )?;
        ensure(
            self.object_threshold_edge_max_delta_range >= 0.0,
            "edge max delta range cannot be negative",
        )?;
        ensure(
            self.object_threshold_min_nr_points >= 1,
            "an object must consist of at least 1 point",
        )?;
        ensure(
            self.object_threshold_max_distance >= 0.0,
            "max distance cannot be negative",
        )?;
        ensure(
            self.object_threshold_min_speed >= 0.0,
            "min speed cannot be negative",
        )?;
        ensure(
            (0.0..=1.0).contains(&self.object_threshold_min_confidence),
            "min confidence must be a value in [0,1]",
        )?;
        ensure(
            self.object_threshold_bank_tracking_max_delta_distance >= 0.0,
            "tracking max delta distance cannot be negative",
        )?;
        ensure(!self.map_frame.is_empty(), "map frame must be given")?;
        ensure(!self.fixed_frame.is_empty(), "fixed frame must be given")?;
        ensure(!self.base_frame.is_empty(), "base frame must be given")?;

        Ok(())
    }
}

/// Decoding and projection settings for point cloud input.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PointCloudConfig {
    pub x_field: String,
    pub y_field: String,
    pub z_field: String,
    /// Linear size a single point is assumed to cover, in meters.
    pub voxel_leaf_size: f64,
    pub threshold_z_min: f64,
    pub threshold_z_max: f64,
}

impl Default for PointCloudConfig {
    fn default() -> Self {
        Self {
            x_field: "x".to_string(),
            y_field: "y".to_string(),
            z_field: "z".to_string(),
            voxel_leaf_size: 0.02,
            threshold_z_min: 0.1,
            threshold_z_max: 1.0,
        }
    }
}

impl PointCloudConfig {
    pub fn validate(&self) -> Result<(), Error> {
        ensure(!self.x_field.is_empty(), "x field name must be given")?;
        ensure(!self.y_field.is_empty(), "y field name must be given")?;
        ensure(!self.z_field.is_empty(), "z field name must be given")?;
        ensure(
            self.voxel_leaf_size >= 0.0,
            "voxel leaf size cannot be negative",
        )?;
        ensure(
            self.threshold_z_min <= self.threshold_z_max,
            "threshold_z_min must not exceed threshold_z_max",
        )?;

        Ok(())
    }
}

/// Properties of the sensor, taken from the first message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SensorGeometry {
    pub frame_id: String,
    pub angle_increment: f64,
    pub time_increment: f64,
    pub scan_time: f64,
    pub range_min: f32,
    pub range_max: f32,
}

impl SensorGeometry {
    /// Geometry of a synthesized scan: `points` bins spread evenly over the configured span.
    pub fn synthesized(frame_id: &str, config: &BankConfig) -> Self {
        let angle_increment = if config.points_per_scan <= 1 {
            0.0
        } else {
            (config.angle_max - config.angle_min) / (config.points_per_scan - 1) as f64
        };

        Self {
            frame_id: frame_id.to_string(),
            angle_increment,
            time_increment: 0.0,
            scan_time: 0.0,
            range_min: 0.01,
            range_max: config.object_threshold_max_distance,
        }
    }
}
