use std::path::{Path, PathBuf};

use fitsio::compat::fitsfile::FitsFile as FitsHandle;
use fitsio::compat::hdu::FitsHdu;
use fitsio::compat::images::{ImageDescription, ImageType, ReadImage, WriteImage};
use ndarray::Array2;
use tracing::debug;

use crate::error::{NightfallError, Result};
use crate::image::Wcs;
use crate::value::Value;

/// Keywords describing the data layout. The writer produces its own and never
/// copies these from a header.
const STRUCTURAL_KEYWORDS: [&str; 11] = [
    "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3", "EXTEND", "BSCALE", "BZERO",
    "BLANK", "END",
];

#[derive(Clone, Copy, Debug)]
enum KeyKind {
    Int,
    Float,
    Text,
    /// Numeric when it parses as one, text otherwise (sexagesimal RA/DEC).
    Any,
}

/// Keywords read from the primary HDU. Anything else in the file is ignored.
const KNOWN_KEYWORDS: [(&str, KeyKind); 44] = [
    ("BITPIX", KeyKind::Int),
    ("NAXIS", KeyKind::Int),
    ("NAXIS1", KeyKind::Int),
    ("NAXIS2", KeyKind::Int),
    ("NAXIS3", KeyKind::Int),
    ("BSCALE", KeyKind::Float),
    ("BZERO", KeyKind::Float),
    ("BLANK", KeyKind::Int),
    ("IMAGETYP", KeyKind::Text),
    ("EXPTIME", KeyKind::Float),
    ("EXPOSURE", KeyKind::Float),
    ("JD", KeyKind::Float),
    ("JD-OBS", KeyKind::Float),
    ("DATE-OBS", KeyKind::Text),
    ("DATE", KeyKind::Text),
    ("FILTER", KeyKind::Text),
    ("OBJECT", KeyKind::Text),
    ("TELESCOP", KeyKind::Text),
    ("INSTRUME", KeyKind::Text),
    ("OBSERVER", KeyKind::Text),
    ("ORIGIN", KeyKind::Text),
    ("RA", KeyKind::Any),
    ("DEC", KeyKind::Any),
    ("OBJCTRA", KeyKind::Any),
    ("OBJCTDEC", KeyKind::Any),
    ("PIXSCALE", KeyKind::Float),
    ("SECPIX", KeyKind::Float),
    ("AIRMASS", KeyKind::Float),
    ("GAIN", KeyKind::Float),
    ("CCD-TEMP", KeyKind::Float),
    ("XBINNING", KeyKind::Int),
    ("YBINNING", KeyKind::Int),
    ("CTYPE1", KeyKind::Text),
    ("CTYPE2", KeyKind::Text),
    ("CRPIX1", KeyKind::Float),
    ("CRPIX2", KeyKind::Float),
    ("CRVAL1", KeyKind::Float),
    ("CRVAL2", KeyKind::Float),
    ("CD1_1", KeyKind::Float),
    ("CD1_2", KeyKind::Float),
    ("CD2_1", KeyKind::Float),
    ("CD2_2", KeyKind::Float),
    ("CDELT1", KeyKind::Float),
    ("CDELT2", KeyKind::Float),
];

/// Primary header of a FITS file, keyword order preserved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FitsHeader {
    cards: Vec<(String, Value)>,
}

impl FitsHeader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a keyword, replacing an existing card in place.
    pub fn set(&mut self, keyword: &str, value: impl Into<Value>) {
        let keyword = keyword.to_uppercase();
        let value = value.into();
        match self.cards.iter_mut().find(|(k, _)| *k == keyword) {
            Some(card) => card.1 = value,
            None => self.cards.push((keyword, value)),
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&Value> {
        let keyword = keyword.to_uppercase();
        self.cards.iter().find(|(k, _)| *k == keyword).map(|(_, v)| v)
    }

    pub fn get_f64(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(Value::as_i64)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(Value::as_str)
    }

    pub fn cards(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cards.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Linear WCS, when the header carries a reference pixel and value.
    pub fn wcs(&self) -> Option<Wcs> {
        let crpix = [self.get_f64("CRPIX1")?, self.get_f64("CRPIX2")?];
        let crval = [self.get_f64("CRVAL1")?, self.get_f64("CRVAL2")?];
        let cd = match (self.get_f64("CD1_1"), self.get_f64("CD2_2")) {
            (Some(cd11), Some(cd22)) => [
                [cd11, self.get_f64("CD1_2").unwrap_or(0.0)],
                [self.get_f64("CD2_1").unwrap_or(0.0), cd22],
            ],
            _ => [
                [self.get_f64("CDELT1").unwrap_or(0.0), 0.0],
                [0.0, self.get_f64("CDELT2").unwrap_or(0.0)],
            ],
        };
        let ctype = [
            self.get_str("CTYPE1").unwrap_or_default().to_string(),
            self.get_str("CTYPE2").unwrap_or_default().to_string(),
        ];
        Some(Wcs {
            crpix,
            crval,
            cd,
            ctype,
        })
    }

    /// Write (or overwrite) the WCS cards.
    pub fn set_wcs(&mut self, wcs: &Wcs) {
        self.set("CTYPE1", wcs.ctype[0].as_str());
        self.set("CTYPE2", wcs.ctype[1].as_str());
        self.set("CRPIX1", wcs.crpix[0]);
        self.set("CRPIX2", wcs.crpix[1]);
        self.set("CRVAL1", wcs.crval[0]);
        self.set("CRVAL2", wcs.crval[1]);
        self.set("CD1_1", wcs.cd[0][0]);
        self.set("CD1_2", wcs.cd[0][1]);
        self.set("CD2_1", wcs.cd[1][0]);
        self.set("CD2_2", wcs.cd[1][1]);
    }
}

/// Primary HDU of an open FITS file.
pub struct FitsFile {
    handle: FitsHandle,
    hdu: FitsHdu,
    path: PathBuf,
    pub header: FitsHeader,
}

impl FitsFile {
    /// Open a FITS file and read the known keywords of its primary header.
    pub fn open(path: &Path) -> Result<Self> {
        // Missing files surface as I/O errors, not as malformed FITS.
        std::fs::metadata(path)?;

        let handle = FitsHandle::open(path).map_err(|e| invalid(path, e))?;
        let hdu = handle.hdu(0).map_err(|e| invalid(path, e))?;
        let header = read_header(&handle, &hdu);
        if header.get_i64("BITPIX").is_none() {
            return Err(invalid(path, "missing BITPIX"));
        }

        Ok(Self {
            handle,
            hdu,
            path: path.to_path_buf(),
            header,
        })
    }

    pub fn bitpix(&self) -> Result<i64> {
        self.header
            .get_i64("BITPIX")
            .ok_or_else(|| invalid(&self.path, "missing BITPIX"))
    }

    /// `(height, width)` of the primary image. `None` when the HDU holds no
    /// image or declares a negative axis.
    pub fn dimensions(&self) -> Option<(usize, usize)> {
        let naxis = self.header.get_i64("NAXIS").unwrap_or(0);
        if naxis < 2 {
            return None;
        }
        // A third axis is accepted only as a degenerate single plane.
        if naxis > 2 && self.header.get_i64("NAXIS3").unwrap_or(1) != 1 {
            return None;
        }
        let width = usize::try_from(self.header.get_i64("NAXIS1")?).ok()?;
        let height = usize::try_from(self.header.get_i64("NAXIS2")?).ok()?;
        Some((height, width))
    }

    /// Decode the primary image to `f64`. `BSCALE`/`BZERO` are applied and
    /// integer pixels equal to `BLANK` become NaN.
    pub fn read_data(&self) -> Result<Array2<f64>> {
        let (h, w) = self
            .dimensions()
            .ok_or_else(|| invalid(&self.path, "primary HDU holds no 2-D image"))?;
        let size = h
            .checked_mul(w)
            .ok_or_else(|| invalid(&self.path, format!("{w}x{h} image is too large")))?;

        let mut values =
            f64::read_image(&self.handle, &self.hdu).map_err(|e| invalid(&self.path, e))?;
        if values.len() < size {
            return Err(invalid(
                &self.path,
                format!("File truncated: expected {size} pixels, got {}", values.len()),
            ));
        }
        values.truncate(size);

        if let Some(null) = self.null_value()? {
            for v in values.iter_mut().filter(|v| **v == null) {
                *v = f64::NAN;
            }
        }

        Array2::from_shape_vec((h, w), values).map_err(|e| invalid(&self.path, e))
    }

    /// Scaled value of `BLANK` pixels. Only integer images carry one.
    fn null_value(&self) -> Result<Option<f64>> {
        if self.bitpix()? < 0 {
            return Ok(None);
        }
        let Some(blank) = self.header.get_i64("BLANK") else {
            return Ok(None);
        };
        let scale = self.header.get_f64("BSCALE").unwrap_or(1.0);
        let zero = self.header.get_f64("BZERO").unwrap_or(0.0);
        Ok(Some(blank as f64 * scale + zero))
    }
}

fn invalid(path: &Path, reason: impl std::fmt::Display) -> NightfallError {
    NightfallError::InvalidFits(format!("{}: {reason}", path.display()))
}

fn read_header(handle: &FitsHandle, hdu: &FitsHdu) -> FitsHeader {
    let text = |keyword: &str| {
        hdu.read_key::<String>(handle, keyword)
            .map(|s| Value::Str(s.trim_end().to_string()))
    };

    let mut header = FitsHeader::new();
    for (keyword, kind) in KNOWN_KEYWORDS {
        let value = match kind {
            KeyKind::Int => hdu.read_key::<i64>(handle, keyword).map(Value::Int).ok(),
            KeyKind::Float => hdu.read_key::<f64>(handle, keyword).map(Value::Float).ok(),
            KeyKind::Text => text(keyword).ok(),
            KeyKind::Any => hdu
                .read_key::<f64>(handle, keyword)
                .map(Value::Float)
                .or_else(|_| text(keyword))
                .ok(),
        };
        if let Some(value) = value {
            header.set(keyword, value);
        }
    }
    header
}

/// Write `data` as a double precision primary image, followed by the non
/// structural cards of `header`.
pub fn write_fits(path: &Path, data: &Array2<f64>, header: &FitsHeader) -> Result<()> {
    let (height, width) = data.dim();
    let description = ImageDescription {
        data_type: ImageType::Double,
        dimensions: vec![width, height],
    };

    let mut handle = FitsHandle::create(path).overwrite().open()?;
    let hdu = handle.create_image("PRIMARY", &description)?;
    let values: Vec<f64> = data.iter().copied().collect();
    f64::write_image(&mut handle, &hdu, &values)?;

    for (keyword, value) in header.cards() {
        if STRUCTURAL_KEYWORDS.contains(&keyword) {
            continue;
        }
        match value {
            Value::Int(v) => hdu.write_key(&mut handle, keyword, v)?,
            Value::Float(v) => hdu.write_key(&mut handle, keyword, v)?,
            Value::Str(s) => hdu.write_key(&mut handle, keyword, s)?,
            Value::Bool(b) => {
                let flag = String::from(if *b { "T" } else { "F" });
                hdu.write_key(&mut handle, keyword, &flag)?
            }
            Value::List(_) => hdu.write_key(&mut handle, keyword, &value.to_string())?,
        }
    }

    debug!(path = %path.display(), width, height, cards = header.len(), "FITS written");
    Ok(())
}

/// Normalize an `IMAGETYP` card to a frame category.
pub fn classify_image_type(raw: &str) -> &'static str {
    let lower = raw.to_lowercase();
    if lower.contains("bias") || lower.contains("zero") {
        crate::consts::KIND_BIAS
    } else if lower.contains("dark") {
        crate::consts::KIND_DARK
    } else if lower.contains("flat") {
        crate::consts::KIND_FLAT
    } else if lower.contains("stack") {
        crate::consts::KIND_STACK
    } else {
        crate::consts::KIND_LIGHT
    }
}
