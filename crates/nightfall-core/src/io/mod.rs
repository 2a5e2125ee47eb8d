pub mod fits;
pub mod image_io;
pub mod loader;
pub mod source;

pub use fits::{FitsFile, FitsHeader};
pub use loader::{load_image_file, save_fits, DefaultLoader, ImageLoader};
pub use source::{EmptySource, FileSource, ImageSource};
