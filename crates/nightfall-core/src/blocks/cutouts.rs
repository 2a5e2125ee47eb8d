use crate::block::{Block, BlockParams};
use crate::error::Result;
use crate::image::Image;

/// Cuts a square window around every source and stores the windows, in
/// source order, under `cutouts` (a `Vec<Image>`).
#[derive(Clone, Debug)]
pub struct Cutouts {
    size: usize,
}

impl Cutouts {
    pub const KIND: &'static str = "Cutouts";

    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn from_params(params: &BlockParams) -> Result<Box<dyn Block>> {
        Ok(Box::new(Self::new(params.usize_or(Self::KIND, "size", 21)?)))
    }
}

impl Block for Cutouts {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> BlockParams {
        BlockParams::new().kwarg("size", self.size)
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let cutouts = image
            .sources
            .iter()
            .map(|s| image.cutout(s.coords, (self.size, self.size)))
            .collect::<Result<Vec<Image>>>()?;
        image.set("cutouts", cutouts)
    }
}
