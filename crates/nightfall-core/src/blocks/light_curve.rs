use std::path::{Path, PathBuf};

use tracing::info;

use crate::block::{Block, BlockParams};
use crate::error::Result;
use crate::image::Image;
use crate::io::source::ImageSource;
use crate::value::Value;

/// One row of a [`LightCurve`] table.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// Position of the image in the run.
    pub index: Option<usize>,
    /// One cell per field, `None` when the image did not have it.
    pub values: Vec<Option<Value>>,
}

/// Gathers per-image fields into a table.
///
/// A field is looked up in the metadata first, then in the computed store as
/// an `f64`. The table is written as CSV on `terminate` when an output path
/// is set.
#[derive(Clone, Debug, Default)]
pub struct LightCurve {
    fields: Vec<String>,
    output: Option<PathBuf>,
    rows: Vec<Row>,
}

impl LightCurve {
    pub const KIND: &'static str = "LightCurve";

    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    pub fn from_params(params: &BlockParams) -> Result<Box<dyn Block>> {
        let mut block = Self::new(params.strings(Self::KIND, "fields")?);
        block.output = params.string(Self::KIND, "output")?.map(PathBuf::from);
        Ok(Box::new(block))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Numeric values of one field, row by row.
    pub fn column(&self, field: &str) -> Option<Vec<Option<f64>>> {
        let k = self.fields.iter().position(|f| f == field)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.values[k].as_ref().and_then(Value::as_f64))
                .collect(),
        )
    }

    fn lookup(image: &Image, field: &str) -> Option<Value> {
        image
            .metadata
            .get(field)
            .cloned()
            .or_else(|| image.get::<f64>(field).ok().map(|v| Value::Float(*v)))
    }

    fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(std::iter::once("index").chain(self.fields.iter().map(String::as_str)))?;
        for row in &self.rows {
            let mut cells = vec![row.index.map(|i| i.to_string()).unwrap_or_default()];
            cells.extend(
                row.values
                    .iter()
                    .map(|v| v.as_ref().map(Value::to_string).unwrap_or_default()),
            );
            wtr.write_record(&cells)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

impl Block for LightCurve {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn params(&self) -> BlockParams {
        let fields: Vec<Value> = self.fields.iter().map(|f| Value::from(f.as_str())).collect();
        let mut params = BlockParams::new().kwarg("fields", Value::List(fields));
        if let Some(path) = &self.output {
            params = params.kwarg("output", path.display().to_string());
        }
        params
    }

    fn is_data_block(&self) -> bool {
        true
    }

    fn initialize(&mut self, _source: &dyn ImageSource) -> Result<()> {
        self.rows.clear();
        Ok(())
    }

    fn run(&mut self, image: &mut Image) -> Result<()> {
        let values = self
            .fields
            .iter()
            .map(|field| Self::lookup(image, field))
            .collect();
        self.rows.push(Row {
            index: image.index(),
            values,
        });
        Ok(())
    }

    fn terminate(&mut self) -> Result<()> {
        if let Some(path) = &self.output {
            self.write_csv(path)?;
            info!(path = %path.display(), rows = self.rows.len(), "Light curve written");
        }
        Ok(())
    }
}
