use ndarray::{Array2, ArrayView1, ArrayViewMut1, Axis, Zip};
use std::fmt::Write;
use tracing::{debug, info};

use crate::circular_queue::CircularIndex;
use crate::config::{BankConfig, PointCloudConfig, SensorGeometry};
use crate::error::Error;
use crate::point_cloud::{self, CloudLayout, PointCloud};
use crate::scan::LaserScan;

/// Rolling history of EMA-smoothed range scans.
///
/// Storage is one `capacity x points_per_scan` array allocated at construction.
/// Each insertion overwrites the oldest row.
#[derive(Debug, Clone)]
pub struct ScanBank {
    config: BankConfig,
    geometry: SensorGeometry,
    ranges: Array2<f32>,
    stamps: Vec<f64>,
    index: CircularIndex,
    scratch: Vec<f32>,
}

impl ScanBank {
    pub fn new(config: BankConfig, geometry: SensorGeometry) -> Result<Self, Error> {
        config.validate()?;

        let (capacity, points) = (config.nr_scans_in_bank, config.points_per_scan);

        info!(
            capacity,
            points,
            angle_min = config.angle_min,
            angle_max = config.angle_max,
            frame = %geometry.frame_id,
            "scan bank initialized"
        );

        Ok(Self {
            ranges: Array2::zeros((capacity, points)),
            stamps: vec![0.0; capacity],
            index: CircularIndex::with_capacity(capacity),
            scratch: vec![0.0; points],
            config,
            geometry,
        })
    }

    /// Bank whose width and angular span follow the given scan.
    pub fn for_scan(config: &BankConfig, scan: &LaserScan) -> Result<Self, Error> {
        let config = BankConfig {
            points_per_scan: scan.len(),
            angle_min: scan.angle_min,
            angle_max: scan.angle_max,
            ..config.clone()
        };

        Self::new(config, scan.geometry())
    }

    /// Bank fed by point clouds projected into `points_per_scan` angular bins.
    pub fn for_cloud(
        config: &BankConfig,
        pc_config: &PointCloudConfig,
        frame_id: &str,
    ) -> Result<Self, Error> {
        pc_config.validate()?;

        Self::new(config.clone(), SensorGeometry::synthesized(frame_id, config))
    }

    /// Smooths `ranges` against the newest slot and stores the result at the put slot.
    /// The very first insertion is stored as is.
    pub fn insert(&mut self, ranges: &[f32], stamp: f64) -> Result<(), Error> {
        if ranges.len() != self.config.points_per_scan {
            return Err(Error::ScanWidthMismatch {
                expected: self.config.points_per_scan,
                actual: ranges.len(),
            });
        }

        let put = self.index.put();
        let incoming = ArrayView1::from(ranges);

        match self.index.newest() {
            None => self.ranges.row_mut(put).assign(&incoming),
            Some(newest) => {
                let alpha = self.config.ema_alpha;
                let (dst, prev) = split_rows(&mut self.ranges, put, newest);

                Zip::from(dst)
                    .and(&prev)
                    .and(&incoming)
                    .for_each(|d, &p, &x| *d = alpha * x + (1.0 - alpha) * p);
            }
        }

        self.stamps[put] = stamp;
        self.index.advance();

        Ok(())
    }

    #[inline]
    pub fn insert_scan(&mut self, scan: &LaserScan) -> Result<(), Error> {
        self.insert(&scan.ranges, scan.timestamp)
    }

    /// Projects the cloud into a fresh scan and inserts it. When no point falls
    /// into the height band the bank is left untouched.
    pub fn insert_cloud(
        &mut self,
        cloud: &PointCloud,
        pc_config: &PointCloudConfig,
    ) -> Result<(), Error> {
        let layout = CloudLayout::parse(cloud, pc_config)?;
        let mut scratch = std::mem::take(&mut self.scratch);

        let result = point_cloud::project(
            cloud,
            &layout,
            pc_config,
            &self.config,
            self.geometry.angle_increment,
            &mut scratch,
        )
        .and_then(|added| {
            if added == 0 {
                debug!(stamp = cloud.timestamp, "no points inside the height band");
                Err(Error::NoPointsInBand)
            } else {
                self.insert(&scratch, cloud.timestamp)
            }
        });

        self.scratch = scratch;
        result?;

        debug!("{}", self.describe_newest_slot());

        Ok(())
    }

    #[inline]
    pub fn config(&self) -> &BankConfig {
        &self.config
    }

    #[inline]
    pub fn geometry(&self) -> &SensorGeometry {
        &self.geometry
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.index.capacity()
    }

    #[inline]
    pub fn points_per_scan(&self) -> usize {
        self.config.points_per_scan
    }

    #[inline]
    pub fn is_filled(&self) -> bool {
        self.index.is_full()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn index(&self) -> &CircularIndex {
        &self.index
    }

    pub fn slot_by_age(&self, age: usize) -> Option<ArrayView1<'_, f32>> {
        let slot = self.index.slot_by_age(age)?;

        Some(self.ranges.row(slot))
    }

    pub fn stamp_by_age(&self, age: usize) -> Option<f64> {
        let slot = self.index.slot_by_age(age)?;

        Some(self.stamps[slot])
    }

    #[inline]
    pub fn newest(&self) -> Option<ArrayView1<'_, f32>> {
        self.slot_by_age(0)
    }

    #[inline]
    pub fn oldest(&self) -> Option<ArrayView1<'_, f32>> {
        self.slot_by_age(self.capacity() - 1)
    }

    pub fn describe_newest_slot(&self) -> String {
        let mut out = String::from("Bank points (newest):");

        if let Some(row) = self.newest() {
            for r in row {
                let _ = write!(out, " {}", r);
            }
        }

        out
    }
}

/// Mutable view of row `dst` alongside a view of row `src`; the rows must differ.
fn split_rows(
    ranges: &mut Array2<f32>,
    dst: usize,
    src: usize,
) -> (ArrayViewMut1<'_, f32>, ArrayViewMut1<'_, f32>) {
    let view = ranges.view_mut();

    if dst < src {
        let (lo, hi) = view.split_at(Axis(0), src);
        (lo.index_axis_move(Axis(0), dst), hi.index_axis_move(Axis(0), 0))
    } else {
        let (lo, hi) = view.split_at(Axis(0), dst);
        (hi.index_axis_move(Axis(0), 0), lo.index_axis_move(Axis(0), src))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point_cloud::tests::cloud_f32;
    use approx::assert_abs_diff_eq;

    fn geometry() -> SensorGeometry {
        SensorGeometry {
            frame_id: "laser".to_string(),
            angle_increment: 0.1,
            time_increment: 0.0,
            scan_time: 0.0,
            range_min: 0.1,
            range_max: 5.0,
        }
    }

    fn bank(capacity: usize, points: usize, alpha: f32) -> ScanBank {
        let config = BankConfig {
            nr_scans_in_bank: capacity,
            points_per_scan: points,
            ema_alpha: alpha,
            ..Default::default()
        };

        ScanBank::new(config, geometry()).unwrap()
    }

    #[test]
    fn invalid_config_is_fatal() {
        let config = BankConfig {
            nr_scans_in_bank: 1,
            ..Default::default()
        };

        assert!(matches!(
            ScanBank::new(config, geometry()),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn first_insertion_is_copied() {
        let mut bank = bank(3, 3, 0.5);
        bank.insert(&[1.0, 2.0, 3.0], 0.0).unwrap();

        assert_eq!(bank.newest().unwrap().to_vec(), vec![1.0, 2.0, 3.0]);
        assert_eq!(bank.index().put(), 1);
        assert_eq!(bank.index().newest(), Some(0));
        assert!(!bank.is_filled());
    }

    #[test]
    fn repeated_value_is_a_fixed_point() {
        for alpha in [0.0, 0.25, 0.5, 1.0] {
            let mut bank = bank(3, 2, alpha);
            bank.insert(&[2.5, 4.0], 0.0).unwrap();
            bank.insert(&[2.5, 4.0], 1.0).unwrap();

            let newest = bank.newest().unwrap();
            assert_abs_diff_eq!(newest[0], 2.5, epsilon = 1e-6);
            assert_abs_diff_eq!(newest[1], 4.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn smoothing_blends_with_newest() {
        let mut bank = bank(2, 1, 0.25);
        bank.insert(&[4.0], 0.0).unwrap();
        bank.insert(&[8.0], 1.0).unwrap();
        assert_abs_diff_eq!(bank.newest().unwrap()[0], 5.0, epsilon = 1e-6);

        // Slot 0 is overwritten next but blends with slot 1.
        bank.insert(&[1.0], 2.0).unwrap();
        assert_abs_diff_eq!(bank.newest().unwrap()[0], 4.0, epsilon = 1e-6);
    }

    #[test]
    fn filled_after_capacity_insertions() {
        let mut bank = bank(3, 1, 1.0);

        for (n, stamp) in [0.0, 1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            bank.insert(&[1.0], *stamp).unwrap();
            assert_eq!(bank.is_filled(), n + 1 >= 3);
        }
    }

    #[test]
    fn ages_map_to_history() {
        let mut bank = bank(3, 1, 1.0);
        for v in 1..=4 {
            bank.insert(&[v as f32], v as f64).unwrap();
        }

        assert_eq!(bank.slot_by_age(0).unwrap()[0], 4.0);
        assert_eq!(bank.slot_by_age(1).unwrap()[0], 3.0);
        assert_eq!(bank.oldest().unwrap()[0], 2.0);
        assert_eq!(bank.stamp_by_age(2), Some(2.0));
    }

    #[test]
    fn rejects_width_mismatch_without_side_effects() {
        let mut bank = bank(3, 3, 1.0);
        bank.insert(&[1.0, 1.0, 1.0], 0.0).unwrap();

        let err = bank.insert(&[1.0, 1.0], 1.0);
        assert!(matches!(
            err,
            Err(Error::ScanWidthMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(bank.index().put(), 1);
    }

    #[test]
    fn empty_cloud_leaves_bank_unchanged() {
        let config = BankConfig {
            nr_scans_in_bank: 2,
            points_per_scan: 5,
            angle_min: -1.0,
            angle_max: 1.0,
            ..Default::default()
        };
        let pc_config = PointCloudConfig::default();
        let mut bank = ScanBank::for_cloud(&config, &pc_config, "lidar").unwrap();

        let cloud = cloud_f32(&[(1.0, 0.0, 0.5)], false);
        bank.insert_cloud(&cloud, &pc_config).unwrap();
        let before = bank.newest().unwrap().to_vec();

        let high = cloud_f32(&[(1.0, 0.0, 9.0)], false);
        assert!(matches!(
            bank.insert_cloud(&high, &pc_config),
            Err(Error::NoPointsInBand)
        ));
        assert_eq!(bank.index().put(), 1);
        assert_eq!(bank.newest().unwrap().to_vec(), before);
    }

    #[test]
    fn cloud_lands_in_center_bin() {
        let config = BankConfig {
            nr_scans_in_bank: 2,
            points_per_scan: 5,
            angle_min: -1.0,
            angle_max: 1.0,
            ..Default::default()
        };
        let pc_config = PointCloudConfig {
            voxel_leaf_size: 0.0,
            ..Default::default()
        };
        let mut bank = ScanBank::for_cloud(&config, &pc_config, "lidar").unwrap();

        bank.insert_cloud(&cloud_f32(&[(2.0, 0.0, 0.5)], true), &pc_config)
            .unwrap();

        let newest = bank.newest().unwrap();
        assert_abs_diff_eq!(newest[2], (4.25f32).sqrt(), epsilon = 1e-6);
        assert_eq!(newest[0], point_cloud::sentinel_range(&config));
    }
}
