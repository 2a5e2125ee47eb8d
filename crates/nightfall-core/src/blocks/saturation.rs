use tracing::debug;

use crate::block::{Block, BlockParams};
use crate::error::{NightfallError, Result};
use crate::image::Image;

/// Discards images whose brightest pixel reaches `threshold`.
///
/// The peak value is stored under `peak` for every image, discarded or not.
#[derive(Clone, Debug)]
pub struct SaturationGuard {
    threshold: f64,
}

impl SaturationGuard {
    pub const KIND: &'static str = "SaturationGuard";

    /// Full well of a 16-bit sensor.
    pub const DEFAULT_THRESHOLD: f64 = 65_535.0;

    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn from_params(params: &BlockParams) -> Result<Box<dyn Block>> {
        let threshold = match params.args.first() {
            Some(v) => v.as_f64().ok_or_else(|| NightfallError::InvalidParameter {
                block: Self::KIND.into(),
                param: "threshold".into(),
                reason: format!("expected a number, got {v}"),
            })?,
            None => params.f64_or(Self::KIND, "threshold", Self::DEFAULT_THRESHOLD)?,
        };
        Ok(Box::new(Self::new(threshold)))
    }
}

impl Default for SaturationGuard {
    fn default() -> Self {
        Self::new(Self::DEFAULT_THRESHOLD)
    }
}

impl Block for SaturationGuard {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> BlockParams {
        BlockParams::new().kwarg("threshold", self.threshold)
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let data = image.data.as_ref().ok_or(NightfallError::MissingData)?;
        let peak = data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        image.set("peak", peak)?;
        if peak >= self.threshold {
            debug!(peak, threshold = self.threshold, "Saturated image");
            image.discard();
        }
        Ok(())
    }
}
