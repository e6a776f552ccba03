//! Unordered 3-D point input and its projection onto an angular range scan.
//!
//! A point cloud carries a field table describing where each coordinate lives
//! inside a point record. The table is parsed once per message into a
//! [`CloudLayout`], which then decodes coordinates honoring the declared byte order.

use serde_derive::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::config::{BankConfig, PointCloudConfig};
use crate::error::Error;

/// Numeric kind of a point field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFieldType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl PointFieldType {
    #[inline]
    pub fn width(&self) -> usize {
        match self {
            PointFieldType::Int8 | PointFieldType::Uint8 => 1,
            PointFieldType::Int16 | PointFieldType::Uint16 => 2,
            PointFieldType::Int32 | PointFieldType::Uint32 | PointFieldType::Float32 => 4,
            PointFieldType::Float64 => 8,
        }
    }
}

impl TryFrom<u8> for PointFieldType {
    type Error = u8;

    fn try_from(datatype: u8) -> Result<Self, u8> {
        Ok(match datatype {
            1 => PointFieldType::Int8,
            2 => PointFieldType::Uint8,
            3 => PointFieldType::Int16,
            4 => PointFieldType::Uint16,
            5 => PointFieldType::Int32,
            6 => PointFieldType::Uint32,
            7 => PointFieldType::Float32,
            8 => PointFieldType::Float64,
            other => return Err(other),
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PointField {
    pub name: String,
    pub offset: usize,
    pub datatype: u8,
    pub count: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub frame_id: String,
    pub timestamp: f64, // in seconds
    pub height: usize,
    pub width: usize,
    pub fields: Vec<PointField>,
    pub is_bigendian: bool,
    pub point_step: usize,
    pub row_step: usize,
    pub data: Vec<u8>,
}

impl PointCloud {
    /// Byte offsets of every point record, row by row.
    ///
    /// Fails when the declared rows do not fit into `data`.
    pub fn point_offsets(&self) -> Result<impl Iterator<Item = usize> + '_, Error> {
        let extent = self
            .height
            .checked_mul(self.row_step)
            .filter(|&n| n <= self.data.len())
            .ok_or(Error::TruncatedPoint {
                offset: 0,
                len: self.height.saturating_mul(self.row_step),
            })?;

        let step = self.point_step.max(1);
        let rows = if extent == 0 { 0 } else { self.height };

        Ok((0..rows).flat_map(move |row| {
            let row_offset = row * self.row_step;
            (0..self.row_step / step).map(move |col| row_offset + col * step)
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldDescriptor {
    pub offset: usize,
    pub kind: PointFieldType,
}

impl FieldDescriptor {
    fn find(cloud: &PointCloud, name: &str) -> Result<Self, Error> {
        let field = cloud
            .fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::MissingField(name.to_string()))?;

        let kind =
            PointFieldType::try_from(field.datatype).map_err(|datatype| Error::UnsupportedFieldWidth {
                field: name.to_string(),
                datatype,
            })?;

        Ok(Self {
            offset: field.offset,
            kind,
        })
    }

    /// Decodes the field from a point record starting at `point` within `data`.
    pub fn read(&self, data: &[u8], point: usize, big_endian: bool) -> Result<f64, Error> {
        let len = self.kind.width();
        let truncated = || Error::TruncatedPoint {
            offset: point.saturating_add(self.offset),
            len,
        };

        let start = point.checked_add(self.offset).ok_or_else(truncated)?;
        let end = start.checked_add(len).ok_or_else(truncated)?;
        let bytes = data.get(start..end).ok_or_else(truncated)?;

        macro_rules! decode {
            ($t:ty, $n:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(bytes);
                if big_endian {
                    <$t>::from_be_bytes(buf) as f64
                } else {
                    <$t>::from_le_bytes(buf) as f64
                }
            }};
        }

        Ok(match self.kind {
            PointFieldType::Int8 => bytes[0] as i8 as f64,
            PointFieldType::Uint8 => bytes[0] as f64,
            PointFieldType::Int16 => decode!(i16, 2),
            PointFieldType::Uint16 => decode!(u16, 2),
            PointFieldType::Int32 => decode!(i32, 4),
            PointFieldType::Uint32 => decode!(u32, 4),
            PointFieldType::Float32 => decode!(f32, 4),
            PointFieldType::Float64 => decode!(f64, 8),
        })
    }
}

/// Where x, y and z live inside a point record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudLayout {
    pub x: FieldDescriptor,
    pub y: FieldDescriptor,
    pub z: FieldDescriptor,
    pub big_endian: bool,
}

impl CloudLayout {
    pub fn parse(cloud: &PointCloud, config: &PointCloudConfig) -> Result<Self, Error> {
        Ok(Self {
            x: FieldDescriptor::find(cloud, &config.x_field)?,
            y: FieldDescriptor::find(cloud, &config.y_field)?,
            z: FieldDescriptor::find(cloud, &config.z_field)?,
            big_endian: cloud.is_bigendian,
        })
    }

    #[inline]
    pub fn read_point(&self, data: &[u8], point: usize) -> Result<(f64, f64, f64), Error> {
        Ok((
            self.x.read(data, point, self.big_endian)?,
            self.y.read(data, point, self.big_endian)?,
            self.z.read(data, point, self.big_endian)?,
        ))
    }
}

/// Value written into every bin before projecting; farther than any accepted range.
#[inline]
pub fn sentinel_range(config: &BankConfig) -> f32 {
    config.object_threshold_max_distance + 10.0
}

/// Projects the points of `cloud` inside the height band onto `slot`, keeping the
/// closest range per angular bin. A point covers every bin its voxel subtends.
///
/// Returns the number of points that landed in at least one bin. `slot` is
/// overwritten even when that number is zero.
pub fn project(
    cloud: &PointCloud,
    layout: &CloudLayout,
    pc_config: &PointCloudConfig,
    config: &BankConfig,
    angle_increment: f64,
    slot: &mut [f32],
) -> Result<usize, Error> {
    slot.iter_mut().for_each(|r| *r = sentinel_range(config));

    let last = slot.len() as i64 - 1;
    let half_voxel = pc_config.voxel_leaf_size / 2.0;
    let bin = |angle: f64| -> i64 {
        if angle_increment > 0.0 {
            ((angle - config.angle_min) / angle_increment).round() as i64
        } else {
            0
        }
    };

    let mut added = 0;
    for point in cloud.point_offsets()? {
        let (x, y, z) = layout.read_point(&cloud.data, point)?;

        if z < pc_config.threshold_z_min || pc_config.threshold_z_max < z {
            continue;
        }

        let range = (x * x + y * y + z * z).sqrt() as f32;
        let mut landed = false;

        for (from, to) in voxel_spans(x, y, half_voxel).iter().flatten() {
            let lo = bin(*from).max(0);
            let hi = bin(*to).min(last);
            if lo > hi {
                continue;
            }

            for r in &mut slot[lo as usize..=hi as usize] {
                if range < *r {
                    *r = range;
                }
            }
            landed = true;
        }

        if landed {
            added += 1;
        }
    }

    Ok(added)
}

/// Angular intervals subtended by a voxel centered at `(x, y)`, in ascending order.
/// A voxel straddling the ±PI seam yields one interval on each side of it.
fn voxel_spans(x: f64, y: f64, half_voxel: f64) -> [Option<(f64, f64)>; 2] {
    let (a, b) = ((y - half_voxel).atan2(x), (y + half_voxel).atan2(x));
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

    if hi - lo <= PI {
        [Some((lo, hi)), None]
    } else {
        [Some((hi, PI)), Some((-PI, lo))]
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn xyz_fields(datatype: u8, width: usize) -> Vec<PointField> {
        ["x", "y", "z"]
            .iter()
            .enumerate()
            .map(|(i, name)| PointField {
                name: name.to_string(),
                offset: i * width,
                datatype,
                count: 1,
            })
            .collect()
    }

    pub(crate) fn cloud_f32(points: &[(f32, f32, f32)], big_endian: bool) -> PointCloud {
        let mut data = Vec::new();
        for &(x, y, z) in points {
            for v in [x, y, z] {
                if big_endian {
                    data.extend_from_slice(&v.to_be_bytes());
                } else {
                    data.extend_from_slice(&v.to_le_bytes());
                }
            }
        }

        PointCloud {
            frame_id: "lidar".to_string(),
            timestamp: 0.0,
            height: 1,
            width: points.len(),
            fields: xyz_fields(7, 4),
            is_bigendian: big_endian,
            point_step: 12,
            row_step: 12 * points.len(),
            data,
        }
    }

    fn small_bank() -> BankConfig {
        BankConfig {
            points_per_scan: 5,
            angle_min: -1.0,
            angle_max: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn decodes_both_byte_orders() {
        let config = PointCloudConfig::default();

        for big_endian in [false, true] {
            let cloud = cloud_f32(&[(1.5, -2.0, 0.25)], big_endian);
            let layout = CloudLayout::parse(&cloud, &config).unwrap();

            assert_eq!(layout.read_point(&cloud.data, 0).unwrap(), (1.5, -2.0, 0.25));
        }
    }

    #[test]
    fn decodes_integer_fields() {
        let mut data = Vec::new();
        for v in [-3i16, 7, 1] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let cloud = PointCloud {
            height: 1,
            width: 1,
            fields: xyz_fields(3, 2),
            is_bigendian: true,
            point_step: 6,
            row_step: 6,
            data,
            ..Default::default()
        };
        let layout = CloudLayout::parse(&cloud, &PointCloudConfig::default()).unwrap();

        assert_eq!(layout.read_point(&cloud.data, 0).unwrap(), (-3.0, 7.0, 1.0));
    }

    #[test]
    fn rejects_unknown_datatype_and_missing_field() {
        let mut cloud = cloud_f32(&[(1.0, 0.0, 0.5)], false);
        cloud.fields[1].datatype = 42;
        assert!(matches!(
            CloudLayout::parse(&cloud, &PointCloudConfig::default()),
            Err(Error::UnsupportedFieldWidth { datatype: 42, .. })
        ));

        cloud.fields[1].datatype = 7;
        cloud.fields.pop();
        assert!(matches!(
            CloudLayout::parse(&cloud, &PointCloudConfig::default()),
            Err(Error::MissingField(name)) if name == "z"
        ));
    }

    #[test]
    fn truncated_record_is_reported() {
        let mut cloud = cloud_f32(&[(1.0, 0.0, 0.5)], false);
        cloud.data.truncate(10);
        let layout = CloudLayout::parse(&cloud, &PointCloudConfig::default()).unwrap();

        assert!(matches!(
            layout.read_point(&cloud.data, 0),
            Err(Error::TruncatedPoint { .. })
        ));
    }

    #[test]
    fn projection_keeps_closest_range_per_bin() {
        let config = small_bank();
        let pc_config = PointCloudConfig {
            voxel_leaf_size: 0.0,
            ..Default::default()
        };
        let cloud = cloud_f32(&[(3.0, 0.0, 0.5), (2.0, 0.0, 0.5), (4.0, 0.0, 5.0)], false);
        let layout = CloudLayout::parse(&cloud, &pc_config).unwrap();
        let mut slot = vec![0.0; 5];

        let added = project(&cloud, &layout, &pc_config, &config, 0.5, &mut slot).unwrap();

        assert_eq!(added, 2);
        let sentinel = sentinel_range(&config);
        assert_eq!(slot[0], sentinel);
        assert_eq!(slot[1], sentinel);
        assert!((slot[2] - (4.25f32).sqrt()).abs() < 1e-6);
        assert_eq!(slot[3], sentinel);
    }

    #[test]
    fn voxel_spans_several_bins() {
        let config = small_bank();
        let pc_config = PointCloudConfig {
            voxel_leaf_size: 1.0,
            ..Default::default()
        };
        let cloud = cloud_f32(&[(1.0, 0.0, 0.5)], false);
        let layout = CloudLayout::parse(&cloud, &pc_config).unwrap();
        let mut slot = vec![0.0; 5];

        project(&cloud, &layout, &pc_config, &config, 0.5, &mut slot).unwrap();

        // atan(±0.5) = ±0.46 rad -> bins 1..=3
        assert_eq!(slot[0], sentinel_range(&config));
        assert!(slot[1..=3].iter().all(|&r| r < 2.0));
        assert_eq!(slot[4], sentinel_range(&config));
    }

    #[test]
    fn point_behind_sensor_covers_only_the_seam_bins() {
        let config = BankConfig::default();
        let pc_config = PointCloudConfig::default();
        let cloud = cloud_f32(&[(-2.0, 0.0, 0.5)], false);
        let layout = CloudLayout::parse(&cloud, &pc_config).unwrap();
        let inc = (config.angle_max - config.angle_min) / (config.points_per_scan - 1) as f64;
        let mut slot = vec![0.0; config.points_per_scan];

        let added = project(&cloud, &layout, &pc_config, &config, inc, &mut slot).unwrap();

        let sentinel = sentinel_range(&config);
        let hit: Vec<usize> = (0..slot.len()).filter(|&i| slot[i] < sentinel).collect();
        assert_eq!(added, 1);
        assert_eq!(hit, vec![0, config.points_per_scan - 1]);
    }

    #[test]
    fn rear_half_plane_voxel_is_projected() {
        let config = BankConfig::default();
        let pc_config = PointCloudConfig {
            voxel_leaf_size: 0.1,
            ..Default::default()
        };
        let cloud = cloud_f32(&[(-1.0, 1.0, 0.5)], false);
        let layout = CloudLayout::parse(&cloud, &pc_config).unwrap();
        let inc = (config.angle_max - config.angle_min) / (config.points_per_scan - 1) as f64;
        let mut slot = vec![0.0; config.points_per_scan];

        assert_eq!(
            project(&cloud, &layout, &pc_config, &config, inc, &mut slot).unwrap(),
            1
        );

        // 3*PI/4 lies at bin 314 of 360; the voxel subtends about 0.05 rad.
        let sentinel = sentinel_range(&config);
        let hit: Vec<usize> = (0..slot.len()).filter(|&i| slot[i] < sentinel).collect();
        assert!(hit.contains(&314));
        assert!(hit.len() <= 5);
    }

    #[test]
    fn overflowing_field_offset_is_an_error() {
        let mut cloud = cloud_f32(&[(1.0, 0.0, 0.5)], false);
        cloud.fields[0].offset = usize::MAX - 1;
        let layout = CloudLayout::parse(&cloud, &PointCloudConfig::default()).unwrap();

        assert!(matches!(
            layout.read_point(&cloud.data, 0),
            Err(Error::TruncatedPoint { .. })
        ));
    }

    #[test]
    fn rows_beyond_data_are_an_error() {
        let config = small_bank();
        let pc_config = PointCloudConfig::default();
        let mut slot = vec![0.0; 5];

        let mut cloud = cloud_f32(&[(1.0, 0.0, 0.5)], false);
        cloud.height = 2;
        cloud.row_step = usize::MAX;
        let layout = CloudLayout::parse(&cloud, &pc_config).unwrap();
        assert!(matches!(
            project(&cloud, &layout, &pc_config, &config, 0.5, &mut slot),
            Err(Error::TruncatedPoint { .. })
        ));

        cloud.height = 3;
        cloud.row_step = 12;
        assert!(matches!(
            project(&cloud, &layout, &pc_config, &config, 0.5, &mut slot),
            Err(Error::TruncatedPoint { .. })
        ));
    }

    #[test]
    fn nothing_in_band_projects_zero_points() {
        let config = small_bank();
        let pc_config = PointCloudConfig::default();
        let cloud = cloud_f32(&[(1.0, 0.0, 3.0)], false);
        let layout = CloudLayout::parse(&cloud, &pc_config).unwrap();
        let mut slot = vec![0.0; 5];

        assert_eq!(
            project(&cloud, &layout, &pc_config, &config, 0.5, &mut slot).unwrap(),
            0
        );
    }
}
