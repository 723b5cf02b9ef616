//! Dataset files and feature normalization

pub mod normalizer;
pub mod reader;
pub mod writer;

pub use self::normalizer::Normalizer;
pub use self::reader::DatasetReader;
pub use self::writer::{DatasetWriter, DATASET_PATTERN, PREDICTION_PATTERN};
