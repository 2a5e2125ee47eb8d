use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{NightfallError, Result};

/// Combine frames by computing the median at each pixel position.
///
/// Uses `select_nth_unstable` for O(n) median without full sort.
/// Parallelizes at the row level for large frames.
pub fn median_combine(frames: &[Array2<f64>]) -> Result<Array2<f64>> {
    let first = frames.first().ok_or(NightfallError::EmptySequence)?;
    let (h, w) = first.dim();
    if let Some(bad) = frames.iter().find(|f| f.dim() != (h, w)) {
        return Err(NightfallError::ShapeMismatch {
            expected: (h, w),
            actual: bad.dim(),
        });
    }
    let n = frames.len();

    let median_row = |row: usize, pixel_values: &mut [f64], out: &mut [f64]| {
        for (col, result) in out.iter_mut().enumerate() {
            for (i, frame) in frames.iter().enumerate() {
                pixel_values[i] = frame[[row, col]];
            }
            *result = compute_median(pixel_values);
        }
    };

    let mut result = Array2::<f64>::zeros((h, w));
    if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        // Row-parallel: each row allocates its own pixel_values
        let rows: Vec<Vec<f64>> = (0..h)
            .into_par_iter()
            .map(|row| {
                let mut pixel_values = vec![0.0; n];
                let mut row_result = vec![0.0; w];
                median_row(row, &mut pixel_values, &mut row_result);
                row_result
            })
            .collect();
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, val) in row_data.into_iter().enumerate() {
                result[[row, col]] = val;
            }
        }
    } else {
        let mut pixel_values = vec![0.0; n];
        let mut row_result = vec![0.0; w];
        for row in 0..h {
            median_row(row, &mut pixel_values, &mut row_result);
            for (col, val) in row_result.iter().enumerate() {
                result[[row, col]] = *val;
            }
        }
    }
    Ok(result)
}

fn compute_median(pixel_values: &mut [f64]) -> f64 {
    let n = pixel_values.len();
    if n == 1 {
        pixel_values[0]
    } else if n % 2 == 1 {
        let mid = n / 2;
        *pixel_values
            .select_nth_unstable_by(mid, |a, b| a.total_cmp(b))
            .1
    } else {
        let mid = n / 2;
        pixel_values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        pixel_values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (pixel_values[mid - 1] + pixel_values[mid]) / 2.0
    }
}
