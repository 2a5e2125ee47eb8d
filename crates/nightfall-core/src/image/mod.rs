pub mod computed;
pub mod source;
pub mod wcs;

use std::any::Any;
use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime};
use ndarray::Array2;

use crate::consts::NIGHT_DATE_OFFSET_HOURS;
use crate::error::{NightfallError, Result};
use crate::value::Value;

pub use computed::{Computed, ComputedValue};
pub use source::Source;
pub use wcs::Wcs;

/// Header-derived scalars, keyed by lowercase name (`exposure`, `jd`, `filter`...).
pub type Metadata = BTreeMap<String, Value>;

/// Where an image stands in the current run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ImageState {
    #[default]
    Active,
    /// `block` is the index of the block that discarded the image, or `None`
    /// when the image was already discarded before entering the sequence.
    Discarded { block: Option<usize> },
}

/// A single observation flowing through a sequence.
///
/// Pixel values are `f64`, row-major, shape = (height, width).
#[derive(Clone, Debug, Default)]
pub struct Image {
    pub data: Option<Array2<f64>>,
    pub metadata: Metadata,
    pub sources: Vec<Source>,
    pub wcs: Option<Wcs>,
    /// Position of this image's `(0, 0)` pixel in the frame it was cut from.
    pub origin: [i64; 2],
    computed: Computed,
    state: ImageState,
    index: Option<usize>,
}

impl Image {
    pub fn new(data: Array2<f64>) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn with_metadata(data: Option<Array2<f64>>, metadata: Metadata) -> Self {
        Self {
            data,
            metadata,
            ..Self::default()
        }
    }

    // Computed store
    // --------------

    /// Attach a named stage output. Reserved attribute names are rejected.
    pub fn set<T: ComputedValue>(&mut self, name: &str, value: T) -> Result<()> {
        self.computed.set(name, value)
    }

    /// Read a named stage output, failing with `AttributeNotFound` if it was
    /// never computed.
    pub fn get<T: Any>(&self, name: &str) -> Result<&T> {
        self.computed.get(name)
    }

    pub fn get_mut<T: Any>(&mut self, name: &str) -> Result<&mut T> {
        self.computed.get_mut(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.computed.contains(name)
    }

    pub fn computed(&self) -> &Computed {
        &self.computed
    }

    /// Pick up stage outputs of `other` (typically the stack image) that this
    /// image does not have yet.
    pub fn inherit_computed(&mut self, other: &Image) {
        self.computed.merge_missing(&other.computed);
    }

    // Discard state
    // -------------

    /// Stop this image from reaching any further block in the current run.
    /// Once discarded, an image never becomes active again.
    pub fn discard(&mut self) {
        if self.state == ImageState::Active {
            self.state = ImageState::Discarded { block: None };
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self.state, ImageState::Discarded { .. })
    }

    pub fn state(&self) -> ImageState {
        self.state
    }

    /// Attribute a fresh discard to the block that just ran. Returns `true`
    /// when the discard happened in that block.
    pub(crate) fn settle_discard(&mut self, block: usize) -> bool {
        if self.state == (ImageState::Discarded { block: None }) {
            self.state = ImageState::Discarded { block: Some(block) };
            true
        } else {
            false
        }
    }

    /// Position of this image in the current run.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = Some(index);
    }

    // Copies
    // ------

    /// Copy with independently owned metadata and computed stores. Without
    /// `with_data` the copy carries no pixel buffer.
    pub fn copy(&self, with_data: bool) -> Image {
        Image {
            data: if with_data { self.data.clone() } else { None },
            metadata: self.metadata.clone(),
            sources: self.sources.clone(),
            wcs: self.wcs.clone(),
            origin: self.origin,
            computed: self.computed.clone(),
            state: ImageState::Active,
            index: None,
        }
    }

    /// Extract a `shape = (height, width)` window centered on `center = (x, y)`.
    ///
    /// Pixels outside the parent image are NaN. Sources inside the window are
    /// kept and moved to window coordinates (`coords - center + (width, height) / 2`).
    pub fn cutout(&self, center: [f64; 2], shape: (usize, usize)) -> Result<Image> {
        let data = self.data.as_ref().ok_or(NightfallError::MissingData)?;
        let (ny, nx) = shape;
        let (h, w) = data.dim();
        // First pixel whose center lies inside the window.
        let x0 = (center[0] - nx as f64 / 2.0).ceil() as i64;
        let y0 = (center[1] - ny as f64 / 2.0).ceil() as i64;

        let mut window = Array2::<f64>::from_elem((ny, nx), f64::NAN);
        for row in 0..ny {
            let src_row = y0 + row as i64;
            if src_row < 0 || src_row >= h as i64 {
                continue;
            }
            for col in 0..nx {
                let src_col = x0 + col as i64;
                if src_col < 0 || src_col >= w as i64 {
                    continue;
                }
                window[[row, col]] = data[[src_row as usize, src_col as usize]];
            }
        }

        let half = [nx as f64 / 2.0, ny as f64 / 2.0];
        let sources = self
            .sources
            .iter()
            .filter(|s| s.within(center, nx as f64, ny as f64))
            .map(|s| {
                let mut moved = s.clone();
                moved.coords = [
                    s.coords[0] - center[0] + half[0],
                    s.coords[1] - center[1] + half[1],
                ];
                moved
            })
            .collect();

        Ok(Image {
            data: Some(window),
            metadata: self.metadata.clone(),
            sources,
            wcs: self.wcs.as_ref().map(|wcs| wcs.shifted(x0 as f64, y0 as f64)),
            origin: [self.origin[0] + x0, self.origin[1] + y0],
            computed: self.computed.clone(),
            state: ImageState::Active,
            index: None,
        })
    }

    // Metadata accessors
    // ------------------

    /// `(height, width)` of the pixel buffer.
    pub fn shape(&self) -> Option<(usize, usize)> {
        self.data.as_ref().map(|d| d.dim())
    }

    fn meta_f64(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(Value::as_f64)
    }

    fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Exposure time in seconds.
    pub fn exposure(&self) -> Option<f64> {
        self.meta_f64("exposure")
    }

    pub fn jd(&self) -> Option<f64> {
        self.meta_f64("jd")
    }

    pub fn ra(&self) -> Option<f64> {
        self.meta_f64("ra")
    }

    pub fn dec(&self) -> Option<f64> {
        self.meta_f64("dec")
    }

    /// Pixel scale in arcseconds per pixel.
    pub fn pixel_scale(&self) -> Option<f64> {
        self.meta_f64("pixel_scale")
    }

    pub fn filter(&self) -> Option<&str> {
        self.meta_str("filter")
    }

    pub fn object(&self) -> Option<&str> {
        self.meta_str("object")
    }

    pub fn telescope(&self) -> Option<&str> {
        self.meta_str("telescope")
    }

    /// Frame category (`light`, `bias`, `dark`, `flat`...).
    pub fn kind(&self) -> Option<&str> {
        self.meta_str("type")
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.meta_str("path").map(PathBuf::from)
    }

    /// Field of view `(x, y)` in degrees.
    pub fn fov(&self) -> Option<(f64, f64)> {
        let (h, w) = self.shape()?;
        let scale = self.pixel_scale()? / 3600.0;
        Some((w as f64 * scale, h as f64 * scale))
    }

    /// Observation start, parsed from the `date` metadata.
    pub fn date(&self) -> Option<NaiveDateTime> {
        let raw = self.meta_str("date")?.trim();
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }

    /// Calendar date of the evening the observing night started.
    pub fn night_date(&self) -> Option<NaiveDate> {
        let date = self.date()?;
        Some((date - chrono::Duration::hours(NIGHT_DATE_OFFSET_HOURS)).date())
    }
}
