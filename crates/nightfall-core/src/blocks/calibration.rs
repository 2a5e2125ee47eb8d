use std::path::{Path, PathBuf};

use ndarray::Array2;
use tracing::{debug, info};

use crate::block::{Block, BlockParams};
use crate::consts::{EPSILON, KIND_BIAS, KIND_DARK, KIND_FLAT};
use crate::error::{NightfallError, Result};
use crate::image::Image;
use crate::io::fits::{write_fits, FitsHeader};
use crate::io::loader::load_image_file;
use crate::io::source::ImageSource;
use crate::stack::{mean_combine, median_combine};

/// Bias, dark and flat correction.
///
/// Master frames are built from the image source in `initialize`:
/// - bias: mean of the bias frames
/// - dark: mean of `(dark - bias) / exposure`, i.e. a per-second dark current
/// - flat: median of `flat - (bias + dark * exposure)`, each normalized by its mean
///
/// Every image is then corrected as `(data - (dark * exposure + bias)) / flat`.
#[derive(Clone, Debug, Default)]
pub struct Calibration {
    /// Folder the master frames are written to after initialization.
    masters_dir: Option<PathBuf>,
    master_bias: Option<Array2<f64>>,
    master_dark: Option<Array2<f64>>,
    master_flat: Option<Array2<f64>>,
}

impl Calibration {
    pub const KIND: &'static str = "Calibration";

    pub fn new() -> Self {
        Self::default()
    }

    /// Skip master production and calibrate with the given frames.
    /// `dark` is in counts per second of exposure.
    pub fn from_masters(bias: Array2<f64>, dark: Array2<f64>, flat: Array2<f64>) -> Self {
        Self {
            masters_dir: None,
            master_bias: Some(bias),
            master_dark: Some(dark),
            master_flat: Some(flat),
        }
    }

    pub fn with_masters_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.masters_dir = Some(dir.into());
        self
    }

    pub fn from_params(params: &BlockParams) -> Result<Box<dyn Block>> {
        let mut block = Self::new();
        block.masters_dir = params.string(Self::KIND, "masters_dir")?.map(PathBuf::from);
        Ok(Box::new(block))
    }

    pub fn master_bias(&self) -> Option<&Array2<f64>> {
        self.master_bias.as_ref()
    }

    pub fn master_dark(&self) -> Option<&Array2<f64>> {
        self.master_dark.as_ref()
    }

    pub fn master_flat(&self) -> Option<&Array2<f64>> {
        self.master_flat.as_ref()
    }

    fn masters(&self) -> Result<(&Array2<f64>, &Array2<f64>, &Array2<f64>)> {
        match (&self.master_bias, &self.master_dark, &self.master_flat) {
            (Some(bias), Some(dark), Some(flat)) => Ok((bias, dark, flat)),
            _ => Err(NightfallError::Block {
                block: Self::KIND.into(),
                message: "master frames not produced, was the block initialized?".into(),
            }),
        }
    }

    /// Load every frame of `kind`, failing if there is none.
    fn load_frames(source: &dyn ImageSource, kind: &str) -> Result<Vec<Image>> {
        let paths = source.get(kind);
        if paths.is_empty() {
            return Err(NightfallError::NoCalibrationImages(kind.to_string()));
        }
        paths.iter().map(|p| load_image_file(p, None)).collect()
    }

    fn produce_bias(source: &dyn ImageSource) -> Result<Array2<f64>> {
        let frames = Self::load_frames(source, KIND_BIAS)?
            .into_iter()
            .map(pixels)
            .collect::<Result<Vec<_>>>()?;
        mean_combine(&frames)
    }

    fn produce_dark(source: &dyn ImageSource, bias: &Array2<f64>) -> Result<Array2<f64>> {
        let frames = Self::load_frames(source, KIND_DARK)?
            .into_iter()
            .map(|image| {
                let exposure = exposure(&image)?;
                let data = pixels(image)?;
                check_shape(bias, &data)?;
                Ok((data - bias) / exposure)
            })
            .collect::<Result<Vec<_>>>()?;
        mean_combine(&frames)
    }

    fn produce_flat(
        source: &dyn ImageSource,
        bias: &Array2<f64>,
        dark: &Array2<f64>,
    ) -> Result<Array2<f64>> {
        let frames = Self::load_frames(source, KIND_FLAT)?
            .into_iter()
            .map(|image| {
                let exposure = exposure(&image)?;
                let data = pixels(image)?;
                check_shape(bias, &data)?;
                let flat = data - &(bias + &(dark * exposure));
                let mean = flat.mean().unwrap_or(1.0);
                let norm = if mean.abs() < EPSILON { 1.0 } else { mean };
                Ok(flat / norm)
            })
            .collect::<Result<Vec<_>>>()?;
        median_combine(&frames)
    }

    fn save_masters(&self, dir: &Path) -> Result<()> {
        let (bias, dark, flat) = self.masters()?;
        std::fs::create_dir_all(dir)?;
        for (kind, data) in [(KIND_BIAS, bias), (KIND_DARK, dark), (KIND_FLAT, flat)] {
            let mut header = FitsHeader::new();
            header.set("IMAGETYP", format!("master {kind}"));
            write_fits(&dir.join(format!("master_{kind}.fits")), data, &header)?;
        }
        info!(dir = %dir.display(), "Master frames written");
        Ok(())
    }
}

fn pixels(image: Image) -> Result<Array2<f64>> {
    image.data.ok_or(NightfallError::MissingData)
}

fn exposure(image: &Image) -> Result<f64> {
    image
        .exposure()
        .ok_or_else(|| NightfallError::MissingMetadata("exposure".into()))
}

fn check_shape(expected: &Array2<f64>, actual: &Array2<f64>) -> Result<()> {
    if expected.dim() == actual.dim() {
        Ok(())
    } else {
        Err(NightfallError::ShapeMismatch {
            expected: expected.dim(),
            actual: actual.dim(),
        })
    }
}

impl Block for Calibration {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> BlockParams {
        let mut params = BlockParams::new();
        if let Some(dir) = &self.masters_dir {
            params = params.kwarg("masters_dir", dir.display().to_string());
        }
        params
    }

    fn initialize(&mut self, source: &dyn ImageSource) -> Result<()> {
        if self.master_bias.is_some() && self.master_dark.is_some() && self.master_flat.is_some() {
            debug!("Master frames provided, skipping production");
        } else {
            let bias = Self::produce_bias(source)?;
            let dark = Self::produce_dark(source, &bias)?;
            let flat = Self::produce_flat(source, &bias, &dark)?;
            info!(shape = ?bias.dim(), "Master frames produced");
            self.master_bias = Some(bias);
            self.master_dark = Some(dark);
            self.master_flat = Some(flat);
        }
        if let Some(dir) = &self.masters_dir {
            self.save_masters(dir)?;
        }
        Ok(())
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let (bias, dark, flat) = self.masters()?;
        let exposure = exposure(image)?;
        let data = image.data.as_mut().ok_or(NightfallError::MissingData)?;
        for master in [bias, dark, flat] {
            check_shape(master, data)?;
        }

        ndarray::Zip::from(data)
            .and(bias)
            .and(dark)
            .and(flat)
            .for_each(|v, &b, &d, &f| *v = (*v - (d * exposure + b)) / f);
        Ok(())
    }

    fn citations(&self) -> Option<Vec<String>> {
        Some(vec!["ndarray".into()])
    }
}
