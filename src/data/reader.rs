//! Comma-separated dataset files
//!
//! One line per point: `comment, group, value, weight, f1, f2, ..., fn`.
//! - Blank `comment`, `group`, `value` or `weight` fields keep the defaults
//!   (a blank value takes the group as its ±1 proxy)
//! - Lines starting with `#` and empty lines are ignored
//! - A first line whose feature columns are not numeric is a header and
//!   names the features (headers are automatically detected)

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::core::{Datapoint, Dataset, RermError, Result};

/// Number of leading attribute columns before the features
const ATTRIBUTE_COLUMNS: usize = 4;

pub struct DatasetReader;

impl DatasetReader {
    /// Load a dataset from a file, named after the file stem
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Dataset> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_reader(BufReader::new(file), name)
    }

    pub fn from_reader<R: BufRead>(reader: R, name: impl Into<String>) -> Result<Dataset> {
        Self::from_reader_with_options(reader, name, true)
    }

    pub fn from_reader_with_options<R: BufRead>(
        reader: R,
        name: impl Into<String>,
        auto_detect_header: bool,
    ) -> Result<Dataset> {
        let mut dataset = Dataset::new(name);
        let mut names = None;

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line_number = number + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if auto_detect_header && dataset.is_empty() && names.is_none() && Self::is_header_line(trimmed) {
                names = Some(
                    trimmed
                        .split(',')
                        .skip(ATTRIBUTE_COLUMNS)
                        .map(|f| f.trim().to_string())
                        .collect::<Vec<_>>(),
                );
                continue;
            }

            let point = Self::parse_data_line(trimmed)
                .map_err(|e| RermError::ParseError(format!("line {line_number}: {e}")))?;
            dataset.add_datapoint(point).map_err(|e| match e {
                RermError::DimensionMismatch { expected, actual } => RermError::ParseError(
                    format!("line {line_number}: expected {expected} features, found {actual}"),
                ),
                other => other,
            })?;
        }

        if dataset.is_empty() {
            return Err(RermError::EmptyDataset);
        }
        if let Some(names) = names {
            dataset.set_feature_names(names)?;
        }
        debug!(
            "Read {} points with {} features into dataset '{}'",
            dataset.len(),
            dataset.num_features(),
            dataset.name()
        );
        Ok(dataset)
    }

    /// A header has at least one feature column and no numeric feature column
    fn is_header_line(line: &str) -> bool {
        let features: Vec<&str> = line.split(',').skip(ATTRIBUTE_COLUMNS).collect();
        !features.is_empty() && features.iter().all(|f| f.trim().parse::<f64>().is_err())
    }

    /// Parse one data line; errors carry only the field description
    fn parse_data_line(line: &str) -> std::result::Result<Datapoint, String> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < ATTRIBUTE_COLUMNS {
            return Err(format!(
                "expected at least {ATTRIBUTE_COLUMNS} fields, found {}",
                fields.len()
            ));
        }

        let features = fields[ATTRIBUTE_COLUMNS..]
            .iter()
            .enumerate()
            .map(|(i, f)| {
                f.parse::<f64>()
                    .map_err(|_| format!("invalid value '{f}' for feature {}", i + 1))
            })
            .collect::<std::result::Result<Vec<f64>, String>>()?;

        let mut point = Datapoint::new(features);
        if !fields[0].is_empty() {
            point.comment = fields[0].to_string();
        }
        if !fields[1].is_empty() {
            let group = fields[1]
                .parse::<i32>()
                .map_err(|_| format!("invalid group '{}'", fields[1]))?;
            point = point.with_group(group);
            point.value = group as f64;
        }
        if !fields[2].is_empty() {
            point.value = fields[2]
                .parse::<f64>()
                .map_err(|_| format!("invalid value '{}'", fields[2]))?;
        }
        if !fields[3].is_empty() {
            point.weight = fields[3]
                .parse::<f64>()
                .map_err(|_| format!("invalid weight '{}'", fields[3]))?;
        }
        Ok(point)
    }
}
