use std::time::{Duration, Instant};

use tracing::debug;

use crate::block::Block;
use crate::error::Result;
use crate::image::Image;
use crate::io::loader::ImageLoader;

use super::types::ImageInput;

/// Turn an input into an image, loading paths through `loader`.
pub(super) fn load_input(
    input: ImageInput,
    loader: &dyn ImageLoader,
    telescope: Option<&str>,
) -> Result<Image> {
    match input {
        ImageInput::Path(path) => {
            debug!(path = %path.display(), "Loading image");
            loader.load(&path, telescope)
        }
        ImageInput::Image(image) => Ok(image),
    }
}

/// Run one image through the per-image chain.
///
/// Stack blocks are skipped. Each `run` is timed into `timings[k]`, whether
/// it succeeds or not. As soon as block `k` discards the image the traversal
/// stops and `Some(k)` is returned. Images that enter already discarded are
/// left untouched.
pub(super) fn run_image(
    blocks: &mut [Box<dyn Block>],
    image: &mut Image,
    timings: &mut [Duration],
) -> Result<Option<usize>> {
    if image.is_discarded() {
        return Ok(None);
    }
    for (k, block) in blocks.iter_mut().enumerate() {
        if block.stack() {
            continue;
        }
        let start = Instant::now();
        let result = block.run(image);
        timings[k] += start.elapsed();
        result?;
        if image.settle_discard(k) {
            return Ok(Some(k));
        }
    }
    Ok(None)
}

/// `"1, 3"` style list used in discard warnings.
pub(super) fn join_indices(indices: &[usize]) -> String {
    indices
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Default name of the block at `position`.
pub(super) fn default_block_name(position: usize) -> String {
    format!("{}{position}", crate::consts::DEFAULT_BLOCK_PREFIX)
}
