use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::Array2;

use crate::error::{NightfallError, Result};
use crate::image::{Image, Metadata};
use crate::value::Value;

/// Linear min/max stretch of finite pixels to `[0, 1]`. NaN maps to 0.
fn stretch(data: &Array2<f64>) -> Array2<f64> {
    let (lo, hi) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = hi - lo;
    data.mapv(|v| {
        if !v.is_finite() || !(range > 0.0) {
            0.0
        } else {
            (v - lo) / range
        }
    })
}

/// Save pixel data as a 16-bit grayscale TIFF, stretched to the full range.
pub fn save_tiff(data: &Array2<f64>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let pixels: Vec<u16> = stretch(data)
        .iter()
        .map(|v| (v.clamp(0.0, 1.0) * 65535.0) as u16)
        .collect();

    let img = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_raw(w as u32, h as u32, pixels)
        .ok_or_else(|| NightfallError::Block {
            block: "image_io".into(),
            message: "pixel buffer does not match dimensions".into(),
        })?;
    img.save(path)?;
    Ok(())
}

/// Save pixel data as an 8-bit grayscale PNG preview.
pub fn save_png(data: &Array2<f64>, path: &Path) -> Result<()> {
    let (h, w) = data.dim();
    let stretched = stretch(data);

    let mut img = GrayImage::new(w as u32, h as u32);
    for ((row, col), v) in stretched.indexed_iter() {
        img.put_pixel(col as u32, row as u32, Luma([(v.clamp(0.0, 1.0) * 255.0) as u8]));
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Save pixel data, choosing the format from the file extension.
pub fn save_image(data: &Array2<f64>, path: &Path) -> Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => save_png(data, path),
        _ => save_tiff(data, path),
    }
}

/// Load a grayscale raster (PNG, TIFF, JPEG...) as raw 16-bit counts.
pub fn load_image(path: &Path) -> Result<Image> {
    let img = image::open(path)?;
    let gray = img.to_luma16();
    let (w, h) = gray.dimensions();
    let mut data = Array2::<f64>::zeros((h as usize, w as usize));

    for (col, row, pixel) in gray.enumerate_pixels() {
        data[[row as usize, col as usize]] = pixel.0[0] as f64;
    }

    let mut metadata = Metadata::new();
    metadata.insert("path".into(), Value::from(path.display().to_string()));
    Ok(Image::with_metadata(Some(data), metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_stretch_ignores_nan() {
        let data = array![[f64::NAN, 10.0], [20.0, 30.0]];
        let s = stretch(&data);
        assert_eq!(s[[0, 0]], 0.0);
        assert_eq!(s[[0, 1]], 0.0);
        assert_eq!(s[[1, 1]], 1.0);
        assert!((s[[1, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_stretch_flat_image() {
        let data = Array2::from_elem((2, 2), 5.0);
        assert!(stretch(&data).iter().all(|&v| v == 0.0));
    }
}
