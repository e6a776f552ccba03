pub mod bank;
pub mod confidence;
pub mod config;
pub mod error;
pub mod kinematics;
pub mod math;
pub mod point_cloud;
pub mod scan;
pub mod segment;
pub mod track;
pub mod tracker;
pub mod transform;

mod circular_queue;

pub use bank::ScanBank;
pub use confidence::{ConfidenceInput, ConfidenceScorer, DefaultConfidence};
pub use config::{BankConfig, PointCloudConfig};
pub use point_cloud::PointCloud;
pub use scan::LaserScan;
pub use track::{FrameKinematics, MovingObject, MovingObjectArray};
pub use transform::{NoTransforms, ReferenceFrame, StaticTransforms, TransformLookup};

pub use error::Error;
use std::rc::Rc;
use tracing::{debug, warn};

/// Intensity marking object readings in the smoothed scan.
const OBJECT_INTENSITY: f32 = 300.0;

pub trait Detecting {
    fn update_scan(&mut self, scan: &LaserScan) -> Result<(), Error>;
    fn update_cloud(&mut self, cloud: &PointCloud) -> Result<(), Error>;
    fn objects(&self) -> Rc<[MovingObject]>;
}

/// Finds moving objects in a stream of scans from one sensor.
///
/// The bank is created from the first message. Once it holds a full history every
/// new message runs one detection cycle over the newest scan.
pub struct MovingObjectFinder<T = NoTransforms, C = DefaultConfidence> {
    config: BankConfig,
    pc_config: PointCloudConfig,
    bank: Option<ScanBank>,
    transforms: T,
    scorer: C,
    seq: u64,
    last: MovingObjectArray,
}

impl MovingObjectFinder {
    /// Reports in sensor coordinates only, scored by [`DefaultConfidence`].
    pub fn new(config: BankConfig) -> Result<Self, Error> {
        Self::with_parts(config, NoTransforms, DefaultConfidence)
    }
}

impl<T: TransformLookup, C: ConfidenceScorer> MovingObjectFinder<T, C> {
    pub fn with_parts(config: BankConfig, transforms: T, scorer: C) -> Result<Self, Error> {
        config.validate()?;

        Ok(Self {
            config,
            pc_config: PointCloudConfig::default(),
            bank: None,
            transforms,
            scorer,
            seq: 0,
            last: MovingObjectArray::default(),
        })
    }

    pub fn with_point_cloud_config(mut self, pc_config: PointCloudConfig) -> Result<Self, Error> {
        pc_config.validate()?;
        self.pc_config = pc_config;
        Ok(self)
    }

    #[inline]
    pub fn bank(&self) -> Option<&ScanBank> {
        self.bank.as_ref()
    }

    #[inline]
    pub fn last_cycle(&self) -> &MovingObjectArray {
        &self.last
    }

    /// Runs one detection cycle over the newest scan in the bank and keeps its
    /// result as the last cycle.
    ///
    /// Before the bank holds a full history this reports nothing.
    pub fn find(&mut self) -> Result<&MovingObjectArray, Error> {
        let bank = self.bank.as_ref().ok_or(Error::UninitializedBank)?;

        if !bank.is_filled() {
            warn!("bank is not filled yet, cannot report objects");
            return Ok(&self.last);
        }

        let config = bank.config();
        let geometry = bank.geometry();
        let track_range_max = geometry
            .range_max
            .min(config.object_threshold_max_distance);

        let newest = bank.newest().ok_or(Error::UninitializedBank)?;
        let candidates = segment::segment(
            newest,
            geometry.range_min,
            geometry.range_max,
            geometry.angle_increment,
            config,
        );

        let mut objects = Vec::new();
        for (i, candidate) in candidates.iter().enumerate() {
            let old = match tracker::track(bank, candidate, geometry.range_min, track_range_max)
                .segment
            {
                Some(old) => old,
                None => continue,
            };

            let est = kinematics::estimate(bank, candidate, &old, i as u32 + 1, &self.transforms);
            if !est.object.is_moving(config.object_threshold_min_speed) {
                continue;
            }

            let s = &est.object.sensor;
            debug!(
                seq = est.object.seq,
                x = s.position.x,
                y = s.position.y,
                vx = s.velocity.x,
                vy = s.velocity.y,
                speed = s.speed,
                "moving object"
            );

            let raw = self.scorer.score(&ConfidenceInput {
                object: &est.object,
                config,
                dt: est.dt,
                old_seen_width: est.old_seen_width,
                transforms: est.transforms,
            });

            let mut object = est.object;
            object.confidence = confidence::clamp_confidence(raw);

            if object.confidence >= config.object_threshold_min_confidence {
                objects.push(object);
            }
        }

        let stamp = bank.stamp_by_age(0).unwrap_or_default();
        self.seq += 1;
        self.last = MovingObjectArray {
            seq: self.seq,
            stamp,
            objects,
        };

        Ok(&self.last)
    }

    fn cycle(&mut self) -> Result<(), Error> {
        let filled = self.bank.as_ref().map_or(false, ScanBank::is_filled);
        if filled {
            self.find()?;
        }

        Ok(())
    }

    /// The newest smoothed scan; readings of the last reported objects carry a
    /// non-zero intensity.
    pub fn smoothed_scan(&self) -> Option<LaserScan> {
        let bank = self.bank.as_ref()?;
        let geometry = bank.geometry();
        let config = bank.config();
        let ranges = bank.newest()?.to_vec();

        let mut intensities = vec![0.0; ranges.len()];
        for object in self.last.iter() {
            for v in &mut intensities[object.index_min..=object.index_max] {
                *v = OBJECT_INTENSITY;
            }
        }

        Some(LaserScan {
            frame_id: geometry.frame_id.clone(),
            timestamp: bank.stamp_by_age(0).unwrap_or_default(),
            angle_min: config.angle_min,
            angle_max: config.angle_max,
            angle_increment: geometry.angle_increment,
            time_increment: geometry.time_increment,
            scan_time: geometry.scan_time,
            range_min: geometry.range_min,
            range_max: geometry.range_max,
            ranges,
            intensities,
        })
    }
}

impl<T: TransformLookup, C: ConfidenceScorer> crate::Detecting for MovingObjectFinder<T, C> {
    fn update_scan(&mut self, scan: &LaserScan) -> Result<(), Error> {
        if self.bank.is_none() {
            self.bank = Some(ScanBank::for_scan(&self.config, scan)?);
        }

        let bank = self.bank.as_mut().ok_or(Error::UninitializedBank)?;

        if let Err(err) = bank.insert_scan(scan) {
            debug!(stamp = scan.timestamp, "dropping scan: {}", err);
            return Err(err);
        }

        self.cycle()
    }

    fn update_cloud(&mut self, cloud: &PointCloud) -> Result<(), Error> {
        if self.bank.is_none() {
            self.bank = Some(ScanBank::for_cloud(
                &self.config,
                &self.pc_config,
                &cloud.frame_id,
            )?);
        }

        let bank = self.bank.as_mut().ok_or(Error::UninitializedBank)?;

        bank.insert_cloud(cloud, &self.pc_config)?;

        self.cycle()
    }

    #[inline]
    fn objects(&self) -> Rc<[MovingObject]> {
        self.last.objects.clone().into_boxed_slice().into()
    }
}
