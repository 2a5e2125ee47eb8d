use serde::{Deserialize, Serialize};

/// A point source detected on an image, in 0-based pixel coordinates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// `(x, y)` = `(column, row)`.
    pub coords: [f64; 2],
    /// Identifier of the source within its image, stable across cutouts.
    pub id: usize,
    pub peak: Option<f64>,
}

impl Source {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        Self {
            coords: [x, y],
            id,
            peak: None,
        }
    }

    pub fn x(&self) -> f64 {
        self.coords[0]
    }

    pub fn y(&self) -> f64 {
        self.coords[1]
    }

    /// Whether the source lies strictly inside a `width x height` window centered on `center`.
    pub fn within(&self, center: [f64; 2], width: f64, height: f64) -> bool {
        (self.coords[0] - center[0]).abs() < width / 2.0
            && (self.coords[1] - center[1]).abs() < height / 2.0
    }
}
