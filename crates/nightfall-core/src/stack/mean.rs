use ndarray::Array2;

use crate::error::{NightfallError, Result};

/// Combine frames by computing the mean at each pixel.
pub fn mean_combine(frames: &[Array2<f64>]) -> Result<Array2<f64>> {
    let mut acc = StreamingMean::new();
    for frame in frames {
        acc.add(frame)?;
    }
    acc.result()
}

/// Running per-pixel mean, fed one frame at a time.
#[derive(Clone, Debug, Default)]
pub struct StreamingMean {
    sum: Option<Array2<f64>>,
    count: usize,
}

impl StreamingMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame. Every frame must have the shape of the first one.
    pub fn add(&mut self, frame: &Array2<f64>) -> Result<()> {
        match &mut self.sum {
            None => self.sum = Some(frame.clone()),
            Some(sum) => {
                if sum.dim() != frame.dim() {
                    return Err(NightfallError::ShapeMismatch {
                        expected: sum.dim(),
                        actual: frame.dim(),
                    });
                }
                *sum += frame;
            }
        }
        self.count += 1;
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Current mean. Fails if no frame was added.
    pub fn result(&self) -> Result<Array2<f64>> {
        let sum = self.sum.as_ref().ok_or(NightfallError::EmptySequence)?;
        Ok(sum / self.count as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_of_two() {
        let a = Array2::from_elem((4, 4), 0.0);
        let b = Array2::from_elem((4, 4), 1.0);
        let result = mean_combine(&[a, b]).unwrap();
        assert!((result[[0, 0]] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_error() {
        assert!(mean_combine(&[]).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let mut acc = StreamingMean::new();
        acc.add(&Array2::zeros((4, 4))).unwrap();
        assert!(matches!(
            acc.add(&Array2::zeros((4, 5))),
            Err(NightfallError::ShapeMismatch { .. })
        ));
        assert_eq!(acc.count(), 1);
    }
}
