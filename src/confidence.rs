use crate::config::BankConfig;
use crate::track::MovingObject;

/// Which transform lookups succeeded, at the old and at the new time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformFlags {
    pub map: (bool, bool),
    pub fixed: (bool, bool),
    pub base: (bool, bool),
}

impl TransformFlags {
    pub fn successes(&self) -> usize {
        [self.map, self.fixed, self.base]
            .iter()
            .map(|(old, new)| *old as usize + *new as usize)
            .sum()
    }
}

/// Everything a confidence function may look at.
#[derive(Debug, Clone, Copy)]
pub struct ConfidenceInput<'a> {
    pub object: &'a MovingObject,
    pub config: &'a BankConfig,
    /// Seconds between the oldest and the newest scan.
    pub dt: f64,
    /// Width of the object as seen in the oldest scan.
    pub old_seen_width: f64,
    pub transforms: TransformFlags,
}

/// Rates how much a tracked object is believed to be a real moving object.
///
/// The raw score may fall outside [0,1]; it is clamped before use.
pub trait ConfidenceScorer {
    fn score(&self, input: &ConfidenceInput<'_>) -> f64;
}

impl<F> ConfidenceScorer for F
where
    F: Fn(&ConfidenceInput<'_>) -> f64,
{
    #[inline]
    fn score(&self, input: &ConfidenceInput<'_>) -> f64 {
        self(input)
    }
}

/// `base_confidence` plus credit for a stable width and for available transforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConfidence;

impl DefaultConfidence {
    const WIDTH_WEIGHT: f64 = 0.4;
    const TRANSFORM_WEIGHT: f64 = 0.3;
}

impl ConfidenceScorer for DefaultConfidence {
    fn score(&self, input: &ConfidenceInput<'_>) -> f64 {
        let (new_w, old_w) = (input.object.seen_width, input.old_seen_width);
        let widest = new_w.max(old_w);
        let width_agreement = if widest > 0.0 {
            1.0 - (new_w - old_w).abs() / widest
        } else {
            1.0
        };

        let transforms = input.transforms.successes() as f64 / 6.0;

        input.config.base_confidence
            + Self::WIDTH_WEIGHT * width_agreement
            + Self::TRANSFORM_WEIGHT * transforms
    }
}

/// Bounds a raw score to [0,1]; NaN counts as no confidence.
#[inline]
pub fn clamp_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}
