pub mod mean;
pub mod median;

pub use mean::{mean_combine, StreamingMean};
pub use median::median_combine;
