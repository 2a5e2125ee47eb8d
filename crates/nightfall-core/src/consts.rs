/// Prefix used to name blocks that were not given an explicit name.
pub const DEFAULT_BLOCK_PREFIX: &str = "block";

/// Image attribute names that cannot be used as computed-store keys.
pub const RESERVED_ATTRIBUTES: [&str; 8] = [
    "data", "metadata", "computed", "discard", "index", "sources", "origin", "wcs",
];

/// Hours subtracted from the observation date to get the night it belongs to.
pub const NIGHT_DATE_OFFSET_HOURS: i64 = 15;

/// Frame categories used by image sources.
pub const KIND_LIGHT: &str = "light";
pub const KIND_BIAS: &str = "bias";
pub const KIND_DARK: &str = "dark";
pub const KIND_FLAT: &str = "flat";
pub const KIND_STACK: &str = "stack";

/// Minimum pixel count (h*w) to use row-level Rayon parallelism when
/// combining calibration frames.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero when normalizing flats.
pub const EPSILON: f64 = 1e-12;
