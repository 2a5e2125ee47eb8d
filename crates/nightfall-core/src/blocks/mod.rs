//! Blocks shipped with the crate. Each one can be rebuilt from a
//! [`BlockDescriptor`](crate::block::BlockDescriptor) through
//! [`BlockRegistry::with_builtin`](crate::registry::BlockRegistry::with_builtin).

pub mod calibration;
pub mod cutouts;
pub mod light_curve;
pub mod mean_stack;
pub mod saturation;
pub mod trim;

pub use calibration::Calibration;
pub use cutouts::Cutouts;
pub use light_curve::LightCurve;
pub use mean_stack::MeanStack;
pub use saturation::SaturationGuard;
pub use trim::Trim;
