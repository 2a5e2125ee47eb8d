use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ndarray::Array2;

use nightfall_core::block::{Block, BlockParams};
use nightfall_core::error::{NightfallError, Result};
use nightfall_core::image::Image;
use nightfall_core::io::fits::{write_fits, FitsHeader};
use nightfall_core::io::source::ImageSource;
use nightfall_core::value::Value;

/// Shared event log: `"{kind}:{event}"` entries in call order.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// Events of one block, without the kind prefix.
pub fn events_of(log: &Log, kind: &str) -> Vec<String> {
    let prefix = format!("{kind}:");
    entries(log)
        .into_iter()
        .filter_map(|e| e.strip_prefix(&prefix).map(str::to_string))
        .collect()
}

/// Logs every hook call. Discards the images whose index is listed in `discard`.
#[derive(Clone)]
pub struct Recorder {
    pub kind: &'static str,
    pub log: Log,
    pub discard: Vec<usize>,
    pub stack: bool,
}

impl Recorder {
    pub fn new(kind: &'static str, log: &Log) -> Self {
        Self {
            kind,
            log: Arc::clone(log),
            discard: Vec::new(),
            stack: false,
        }
    }

    pub fn discarding(mut self, indices: &[usize]) -> Self {
        self.discard = indices.to_vec();
        self
    }

    pub fn boxed(self) -> Box<dyn Block> {
        Box::new(self)
    }

    fn push(&self, event: String) {
        self.log.lock().unwrap().push(format!("{}:{event}", self.kind));
    }
}

impl Block for Recorder {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn stack(&self) -> bool {
        self.stack
    }

    fn initialize(&mut self, _source: &dyn ImageSource) -> Result<()> {
        self.push("initialize".into());
        Ok(())
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let index = image.index().map(|i| i.to_string()).unwrap_or("stack".into());
        self.push(format!("run {index}"));
        if image.index().is_some_and(|i| self.discard.contains(&i)) {
            image.discard();
        }
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.push("terminate".into());
        Ok(())
    }
}

/// Stack block leaving a `reference` value on the stack image.
#[derive(Clone)]
pub struct Reference {
    pub value: f64,
}

impl Block for Reference {
    fn kind(&self) -> &'static str {
        "Reference"
    }

    fn stack(&self) -> bool {
        true
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        image.set("reference", self.value)
    }

    fn stack_method(&mut self, image: &mut Image) -> Result<()> {
        image.set("stack_method_ran", true)
    }
}

/// Copies the inherited `reference` value into the image metadata.
#[derive(Clone)]
pub struct UseReference;

impl Block for UseReference {
    fn kind(&self) -> &'static str {
        "UseReference"
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let reference = *image.get::<f64>("reference")?;
        image.metadata.insert("reference".into(), Value::Float(reference));
        Ok(())
    }
}

/// Fails on one image.
#[derive(Clone)]
pub struct FailOn {
    pub index: usize,
}

impl Block for FailOn {
    fn kind(&self) -> &'static str {
        "FailOn"
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        if image.index() == Some(self.index) {
            return Err(NightfallError::Block {
                block: "FailOn".into(),
                message: format!("image {}", self.index),
            });
        }
        Ok(())
    }
}

/// Spends `delay` on every image, then fails.
#[derive(Clone)]
pub struct SlowFail {
    pub delay: Duration,
}

impl Block for SlowFail {
    fn kind(&self) -> &'static str {
        "SlowFail"
    }

    fn run(&mut self, _image: &mut Image) -> Result<()> {
        std::thread::sleep(self.delay);
        Err(NightfallError::Block {
            block: "SlowFail".into(),
            message: "gave up".into(),
        })
    }
}

/// Logs `"Echo:{index} {key}={value}"` for each listed metadata key the
/// image carries.
#[derive(Clone)]
pub struct Echo {
    pub keys: Vec<&'static str>,
    pub log: Log,
    pub stack: bool,
}

impl Block for Echo {
    fn kind(&self) -> &'static str {
        "Echo"
    }

    fn stack(&self) -> bool {
        self.stack
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let index = image.index().map(|i| i.to_string()).unwrap_or("stack".into());
        for key in &self.keys {
            if let Some(value) = image.metadata.get(*key) {
                self.log
                    .lock()
                    .unwrap()
                    .push(format!("Echo:{index} {key}={value}"));
            }
        }
        Ok(())
    }
}

/// Data block collecting the indices of the images it sees.
#[derive(Clone, Default)]
pub struct Collector {
    pub seen: Vec<usize>,
    pub terminated: bool,
}

impl Block for Collector {
    fn kind(&self) -> &'static str {
        "Collector"
    }

    fn is_data_block(&self) -> bool {
        true
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        self.seen.extend(image.index());
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        self.terminated = true;
        Ok(())
    }
}

/// Adds a constant to every pixel.
#[derive(Clone)]
pub struct AddConstant {
    pub value: f64,
}

impl Block for AddConstant {
    fn kind(&self) -> &'static str {
        "AddConstant"
    }

    fn params(&self) -> BlockParams {
        BlockParams::new().arg(self.value)
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        if let Some(data) = image.data.as_mut() {
            *data += self.value;
        }
        Ok(())
    }

    fn citations(&self) -> Option<Vec<String>> {
        Some(vec!["ndarray".into(), "arithmetic".into()])
    }
}

/// In-memory images with distinct constant pixel values.
pub fn constant_images(n: usize, shape: (usize, usize)) -> Vec<Image> {
    (0..n)
        .map(|i| Image::new(Array2::from_elem(shape, i as f64)))
        .collect()
}

/// Write a FITS frame with the given header cards.
pub fn write_frame(dir: &Path, name: &str, data: &Array2<f64>, cards: &[(&str, Value)]) -> PathBuf {
    let mut header = FitsHeader::new();
    for (keyword, value) in cards {
        header.set(keyword, value.clone());
    }
    let path = dir.join(name);
    write_fits(&path, data, &header).unwrap();
    path
}
