use std::path::PathBuf;

use tracing::{info, warn};

use crate::block::{Block, BlockParams};
use crate::error::{NightfallError, Result};
use crate::image::Image;
use crate::io::image_io::save_image;
use crate::io::loader::{is_fits_path, save_fits};
use crate::io::source::ImageSource;
use crate::stack::StreamingMean;
use crate::value::Value;

/// Running mean of every image that reaches it.
///
/// The first image provides metadata, WCS and sources of the result. On
/// `terminate` the stack is finalized and, if an output path is set, written
/// as FITS (or as a PNG/TIFF preview, by extension).
#[derive(Clone, Debug, Default)]
pub struct MeanStack {
    output: Option<PathBuf>,
    mean: StreamingMean,
    reference: Option<Image>,
    stacked: Option<Image>,
}

impl MeanStack {
    pub const KIND: &'static str = "MeanStack";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn from_params(params: &BlockParams) -> Result<Box<dyn Block>> {
        let mut block = Self::new();
        block.output = params.string(Self::KIND, "output")?.map(PathBuf::from);
        Ok(Box::new(block))
    }

    /// The stacked image, available after `terminate`.
    pub fn stacked(&self) -> Option<&Image> {
        self.stacked.as_ref()
    }

    pub fn count(&self) -> usize {
        self.mean.count()
    }
}

impl Block for MeanStack {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> BlockParams {
        let mut params = BlockParams::new();
        if let Some(path) = &self.output {
            params = params.kwarg("output", path.display().to_string());
        }
        params
    }

    fn is_data_block(&self) -> bool {
        true
    }

    fn initialize(&mut self, _source: &dyn ImageSource) -> Result<()> {
        self.mean = StreamingMean::new();
        self.reference = None;
        self.stacked = None;
        Ok(())
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let data = image.data.as_ref().ok_or(NightfallError::MissingData)?;
        self.mean.add(data)?;
        if self.reference.is_none() {
            self.reference = Some(image.copy(false));
        }
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        if self.mean.count() == 0 {
            warn!("No image reached the stack");
            return Ok(());
        }
        let mut stacked = self.reference.clone().unwrap_or_default();
        stacked.data = Some(self.mean.result()?);
        stacked
            .metadata
            .insert("type".into(), Value::from(crate::consts::KIND_STACK));
        stacked
            .metadata
            .insert("stacked_images".into(), Value::from(self.mean.count()));

        if let Some(path) = &self.output {
            if is_fits_path(path) {
                save_fits(&stacked, path)?;
            } else if let Some(data) = &stacked.data {
                save_image(data, path)?;
            }
            info!(path = %path.display(), images = self.mean.count(), "Stack written");
        }
        self.stacked = Some(stacked);
        Ok(())
    }

    fn citations(&self) -> Option<Vec<String>> {
        Some(vec!["ndarray".into()])
    }
}
