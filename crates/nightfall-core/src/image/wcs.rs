use serde::{Deserialize, Serialize};

/// Linear world coordinate system read from the FITS `CRPIX`/`CRVAL`/`CD` cards.
///
/// Projection math lives outside this crate; what the pipeline needs is to
/// keep the reference pixel consistent when images are trimmed or cut out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wcs {
    /// Reference pixel, 1-based as in FITS.
    pub crpix: [f64; 2],
    /// World coordinates of the reference pixel (degrees).
    pub crval: [f64; 2],
    /// Linear transform from pixel offsets to world offsets.
    pub cd: [[f64; 2]; 2],
    pub ctype: [String; 2],
}

impl Wcs {
    /// Same frame seen from a window whose origin sits at `(x0, y0)` of this one.
    pub fn shifted(&self, x0: f64, y0: f64) -> Wcs {
        Wcs {
            crpix: [self.crpix[0] - x0, self.crpix[1] - y0],
            ..self.clone()
        }
    }

    /// Intermediate world coordinates of a 0-based pixel position.
    pub fn pixel_to_world(&self, x: f64, y: f64) -> [f64; 2] {
        let dx = x + 1.0 - self.crpix[0];
        let dy = y + 1.0 - self.crpix[1];
        [
            self.crval[0] + self.cd[0][0] * dx + self.cd[0][1] * dy,
            self.crval[1] + self.cd[1][0] * dx + self.cd[1][1] * dy,
        ]
    }

    /// Whether the transform carries celestial information at all.
    pub fn is_celestial(&self) -> bool {
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        det != 0.0 && self.ctype.iter().all(|t| !t.is_empty())
    }
}
