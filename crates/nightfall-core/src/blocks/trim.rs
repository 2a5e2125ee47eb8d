use tracing::debug;

use crate::block::{Block, BlockParams};
use crate::error::{NightfallError, Result};
use crate::image::Image;

/// Crops a fixed margin off every edge (typically the overscan region).
///
/// Sources left in the trimmed area are dropped, the others and the WCS move
/// with the new pixel origin.
#[derive(Clone, Debug, Default)]
pub struct Trim {
    /// Columns removed on the left and on the right.
    x: usize,
    /// Rows removed at the top and at the bottom.
    y: usize,
}

impl Trim {
    pub const KIND: &'static str = "Trim";

    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    pub fn from_params(params: &BlockParams) -> Result<Box<dyn Block>> {
        Ok(Box::new(Self::new(
            params.usize_or(Self::KIND, "x", 0)?,
            params.usize_or(Self::KIND, "y", 0)?,
        )))
    }
}

impl Block for Trim {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> BlockParams {
        BlockParams::new().kwarg("x", self.x).kwarg("y", self.y)
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let (h, w) = image.shape().ok_or(NightfallError::MissingData)?;
        if 2 * self.x >= w || 2 * self.y >= h {
            return Err(NightfallError::Block {
                block: Self::KIND.into(),
                message: format!(
                    "margin ({}, {}) leaves nothing of a {w}x{h} image",
                    self.x, self.y
                ),
            });
        }
        let shape = (h - 2 * self.y, w - 2 * self.x);
        let center = [w as f64 / 2.0, h as f64 / 2.0];
        let trimmed = image.cutout(center, shape)?;
        debug!(from = ?(h, w), to = ?shape, "Trimmed");

        image.data = trimmed.data;
        image.sources = trimmed.sources;
        image.wcs = trimmed.wcs;
        image.origin = trimmed.origin;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Source;
    use ndarray::Array2;

    #[test]
    fn test_trim_margins() {
        let data = Array2::from_shape_fn((10, 12), |(r, c)| (r * 100 + c) as f64);
        let mut image = Image::new(data);
        image.sources = vec![Source::new(0, 1.0, 1.0), Source::new(1, 6.0, 5.0)];

        Trim::new(2, 1).run(&mut image).unwrap();

        let data = image.data.as_ref().unwrap();
        assert_eq!(data.dim(), (8, 8));
        assert_eq!(data[[0, 0]], 102.0);
        assert_eq!(image.origin, [2, 1]);
        assert_eq!(image.sources.len(), 1);
        assert_eq!(image.sources[0].coords, [4.0, 4.0]);
    }

    #[test]
    fn test_trim_too_large() {
        let mut image = Image::new(Array2::zeros((4, 4)));
        assert!(Trim::new(2, 0).run(&mut image).is_err());
    }
}
