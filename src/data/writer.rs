//! Line-per-point dataset output driven by a field pattern
//!
//! Pattern keywords:
//! - `#c` comment, `#g` group, `#v` value, `#w` weight
//! - `#G` predicted group, `#V` predicted value
//! - `#f` the comma-separated feature values
//!
//! Missing groups and predictions are written as empty fields.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::core::{Datapoint, Dataset, Result};

/// Same layout as the reader's input, so written files can be read back
pub const DATASET_PATTERN: &str = "#c,#g,#v,#w,#f";

/// Labels, targets and predictions side by side
pub const PREDICTION_PATTERN: &str = "#c,#g,#G,#v,#V";

#[derive(Debug, Clone)]
pub struct DatasetWriter {
    pattern: String,
}

impl Default for DatasetWriter {
    fn default() -> Self {
        Self::new(DATASET_PATTERN)
    }
}

impl DatasetWriter {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    pub fn predictions() -> Self {
        Self::new(PREDICTION_PATTERN)
    }

    pub fn to_file<P: AsRef<Path>>(&self, dataset: &Dataset, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.to_writer(dataset, &mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn to_writer<W: Write>(&self, dataset: &Dataset, writer: &mut W) -> Result<()> {
        for point in dataset {
            writeln!(writer, "{}", self.format_point(point))?;
        }
        Ok(())
    }

    /// Render one point through the pattern
    pub fn format_point(&self, point: &Datapoint) -> String {
        let mut out = String::with_capacity(self.pattern.len() + 16 * point.num_features());
        let mut chars = self.pattern.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '#' {
                out.push(c);
                continue;
            }
            let field = match chars.peek() {
                Some('c') => point.comment.clone(),
                Some('g') => point.group.map(|g| g.to_string()).unwrap_or_default(),
                Some('v') => point.value.to_string(),
                Some('w') => point.weight.to_string(),
                Some('G') => point.predicted_group.map(|g| g.to_string()).unwrap_or_default(),
                Some('V') => point.predicted_value.map(|v| v.to_string()).unwrap_or_default(),
                Some('f') => point
                    .features()
                    .iter()
                    .map(f64::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                _ => {
                    out.push('#');
                    continue;
                }
            };
            chars.next();
            out.push_str(&field);
        }
        out
    }
}
