use std::path::Path;

use tracing::debug;

use crate::error::{NightfallError, Result};
use crate::image::{Image, Metadata};
use crate::value::Value;

use super::fits::{classify_image_type, write_fits, FitsFile, FitsHeader};
use super::image_io;

/// Turns a path into an [`Image`].
///
/// `telescope` is a hint naming the instrument that took the frame; when set
/// it takes precedence over whatever the file header says.
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path, telescope: Option<&str>) -> Result<Image>;
}

impl<F> ImageLoader for F
where
    F: Fn(&Path, Option<&str>) -> Result<Image> + Send + Sync,
{
    fn load(&self, path: &Path, telescope: Option<&str>) -> Result<Image> {
        self(path, telescope)
    }
}

/// Loads FITS files, and common raster formats by extension.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultLoader;

impl ImageLoader for DefaultLoader {
    fn load(&self, path: &Path, telescope: Option<&str>) -> Result<Image> {
        load_image_file(path, telescope)
    }
}

/// Header keyword -> metadata key, first match wins.
const HEADER_FIELDS: [(&str, &[&str]); 10] = [
    ("exposure", &["EXPTIME", "EXPOSURE"]),
    ("jd", &["JD", "JD-OBS"]),
    ("date", &["DATE-OBS"]),
    ("filter", &["FILTER"]),
    ("object", &["OBJECT"]),
    ("telescope", &["TELESCOP"]),
    ("instrument", &["INSTRUME"]),
    ("ra", &["RA", "OBJCTRA"]),
    ("dec", &["DEC", "OBJCTDEC"]),
    ("pixel_scale", &["PIXSCALE", "SECPIX"]),
];

pub fn is_fits_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref(),
        Some("fits" | "fit" | "fts")
    )
}

/// Load an image file, dispatching on the extension. Unknown extensions are
/// read as FITS.
pub fn load_image_file(path: &Path, telescope: Option<&str>) -> Result<Image> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    let mut image = match ext.as_deref() {
        Some("png" | "tif" | "tiff" | "jpg" | "jpeg") => image_io::load_image(path)?,
        _ => load_fits(path)?,
    };
    if let Some(telescope) = telescope {
        image
            .metadata
            .insert("telescope".into(), Value::from(telescope));
    }
    debug!(path = %path.display(), shape = ?image.shape(), "Image loaded");
    Ok(image)
}

/// Read a FITS file into an image: pixel data, mapped metadata, WCS, and the
/// full header under the `fits_header` computed entry.
pub fn load_fits(path: &Path) -> Result<Image> {
    let fits = FitsFile::open(path)?;
    let data = fits.read_data()?;
    let mut image = Image::with_metadata(Some(data), header_metadata(&fits.header));
    image
        .metadata
        .insert("path".into(), Value::from(path.display().to_string()));
    image.wcs = fits.header.wcs();
    image.set("fits_header", fits.header)?;
    Ok(image)
}

/// Metadata derived from a FITS header.
pub fn header_metadata(header: &FitsHeader) -> Metadata {
    let mut metadata = Metadata::new();
    for (key, keywords) in HEADER_FIELDS {
        if let Some(value) = keywords.iter().find_map(|k| header.get(k)) {
            metadata.insert(key.to_string(), value.clone());
        }
    }
    let kind = header.get_str("IMAGETYP").map(classify_image_type);
    metadata.insert(
        "type".into(),
        Value::from(kind.unwrap_or(crate::consts::KIND_LIGHT)),
    );
    metadata
}

/// Header to write alongside an image: the original header if it was loaded
/// from FITS, updated with current metadata and WCS.
pub fn image_header(image: &Image) -> FitsHeader {
    let mut header = image
        .get::<FitsHeader>("fits_header")
        .cloned()
        .unwrap_or_default();
    for (key, keywords) in HEADER_FIELDS {
        if let Some(value) = image.metadata.get(key) {
            header.set(keywords[0], value.clone());
        }
    }
    if let Some(kind) = image.kind() {
        header.set("IMAGETYP", kind);
    }
    if let Some(wcs) = &image.wcs {
        header.set_wcs(wcs);
    }
    header
}

/// Write an image as FITS.
pub fn save_fits(image: &Image, path: &Path) -> Result<()> {
    let data = image.data.as_ref().ok_or(NightfallError::MissingData)?;
    write_fits(path, data, &image_header(image))
}
