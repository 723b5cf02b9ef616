//! Core data model: datapoints, datasets and groupers

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::vector;
use crate::core::{RermError, Result};

/// Feature-index entry of the appended bias column
pub const BIAS_INDEX: usize = usize::MAX;

/// A single observation
#[derive(Debug, Clone, PartialEq)]
pub struct Datapoint {
    pub comment: String,
    /// Class label, conventionally +1 / -1
    pub group: Option<i32>,
    /// Regression target, or the +1 / -1 proxy of the group
    pub value: f64,
    /// Reliability weight
    pub weight: f64,
    pub predicted_group: Option<i32>,
    pub predicted_value: Option<f64>,
    features: Vec<f64>,
    extended: bool,
}

impl Datapoint {
    /// Create an unlabeled point with unit weight
    pub fn new(features: Vec<f64>) -> Self {
        Self {
            comment: String::new(),
            group: None,
            value: f64::NAN,
            weight: 1.0,
            predicted_group: None,
            predicted_value: None,
            features,
            extended: false,
        }
    }

    /// Create a classification point whose value mirrors its group
    pub fn labeled(features: Vec<f64>, group: i32) -> Self {
        let mut point = Self::new(features);
        point.group = Some(group);
        point.value = group as f64;
        point
    }

    /// Create a regression point
    pub fn valued(features: Vec<f64>, value: f64) -> Self {
        let mut point = Self::new(features);
        point.value = value;
        point
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_group(mut self, group: i32) -> Self {
        self.group = Some(group);
        self
    }

    pub fn features(&self) -> &[f64] {
        &self.features
    }

    pub(crate) fn features_mut(&mut self) -> &mut [f64] {
        &mut self.features
    }

    /// Replace the feature values; the point loses its bias column
    pub(crate) fn set_features(&mut self, features: Vec<f64>) {
        self.features = features;
        self.extended = false;
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Feature values followed by the constant bias input 1.0.
    ///
    /// A point that already carries the bias column is yielded as is.
    pub fn augmented(&self) -> impl Iterator<Item = f64> + '_ {
        let bias = if self.extended { None } else { Some(1.0) };
        self.features.iter().copied().chain(bias)
    }

    /// Sign used by margin-based losses: the group if present, else the sign of the value
    pub fn margin_sign(&self) -> f64 {
        match self.group {
            Some(g) => g as f64,
            None => {
                if self.value < 0.0 {
                    -1.0
                } else {
                    1.0
                }
            }
        }
    }

    /// Whether the last prediction put this point into the positive group
    pub fn predicted_positive(&self) -> bool {
        match (self.predicted_group, self.predicted_value) {
            (Some(g), _) => g == 1,
            (None, Some(v)) => v > 0.0,
            (None, None) => false,
        }
    }

    /// Append a constant bias feature; no-op when already extended
    pub fn extend(&mut self, value: f64) {
        if !self.extended {
            self.features.push(value);
            self.extended = true;
        }
    }

    /// Remove the bias feature; no-op when not extended
    pub fn reduce(&mut self) {
        if self.extended {
            self.features.pop();
            self.extended = false;
        }
    }

    fn delete_features(&mut self, sorted: &[usize]) -> Result<()> {
        self.features = vector::delete_indices(&self.features, sorted)?;
        Ok(())
    }

    fn keep_features(&mut self, sorted: &[usize]) -> Result<()> {
        self.features = vector::keep_indices(&self.features, sorted)?;
        Ok(())
    }
}

/// Maps a continuous score to a discrete group label
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Grouper {
    /// score > threshold yields +1, everything else -1
    AboveThreshold(f64),
    /// score < threshold yields +1, everything else -1
    BelowThreshold(f64),
}

impl Grouper {
    pub fn group(&self, score: f64) -> i32 {
        match *self {
            Grouper::AboveThreshold(t) => {
                if score > t {
                    1
                } else {
                    -1
                }
            }
            Grouper::BelowThreshold(t) => {
                if score < t {
                    1
                } else {
                    -1
                }
            }
        }
    }
}

impl Default for Grouper {
    fn default() -> Self {
        Grouper::AboveThreshold(0.0)
    }
}

/// Ordered collection of datapoints sharing one feature layout
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    name: String,
    points: Vec<Datapoint>,
    group_counts: BTreeMap<i32, usize>,
    feature_index: Vec<usize>,
    feature_names: Option<Vec<String>>,
    extended: bool,
}

impl Dataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Build a dataset from points, checking their dimensions
    pub fn from_points(name: impl Into<String>, points: Vec<Datapoint>) -> Result<Self> {
        let mut dataset = Self::new(name);
        for point in points {
            dataset.add_datapoint(point)?;
        }
        Ok(dataset)
    }

    /// Empty dataset sharing this one's feature layout
    fn empty_like(&self) -> Self {
        Self {
            name: self.name.clone(),
            points: Vec::new(),
            group_counts: BTreeMap::new(),
            feature_index: self.feature_index.clone(),
            feature_names: self.feature_names.clone(),
            extended: self.extended,
        }
    }

    pub fn add_datapoint(&mut self, mut point: Datapoint) -> Result<()> {
        if self.extended {
            point.extend(1.0);
        } else if point.is_extended() {
            point.reduce();
        }

        if self.points.is_empty() && point.num_features() != self.num_features() {
            let plain = point.num_features() - usize::from(self.extended);
            self.feature_index = (0..plain).collect();
            if self.extended {
                self.feature_index.push(BIAS_INDEX);
            }
            self.feature_names = None;
        } else if point.num_features() != self.num_features() {
            return Err(RermError::DimensionMismatch {
                expected: self.num_features(),
                actual: point.num_features(),
            });
        }

        if let Some(g) = point.group {
            *self.group_counts.entry(g).or_insert(0) += 1;
        }
        self.points.push(point);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of feature columns, including the bias column while extended
    pub fn num_features(&self) -> usize {
        self.feature_index.len()
    }

    pub fn points(&self) -> &[Datapoint] {
        &self.points
    }

    /// Mutable access for writing predictions; feature vectors stay read-only
    pub(crate) fn points_mut(&mut self) -> &mut [Datapoint] {
        &mut self.points
    }

    pub fn point(&self, i: usize) -> Option<&Datapoint> {
        self.points.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datapoint> {
        self.points.iter()
    }

    pub fn group_counts(&self) -> &BTreeMap<i32, usize> {
        &self.group_counts
    }

    pub fn group_count(&self, group: i32) -> usize {
        self.group_counts.get(&group).copied().unwrap_or(0)
    }

    /// Original column of every current column
    pub fn feature_index(&self) -> &[usize] {
        &self.feature_index
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    pub fn set_feature_names(&mut self, names: Vec<String>) -> Result<()> {
        let expected = self.num_features() - usize::from(self.extended);
        if names.len() != expected {
            return Err(RermError::DimensionMismatch {
                expected,
                actual: names.len(),
            });
        }
        self.feature_names = Some(names);
        Ok(())
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Append a bias column to every point; no-op when already extended
    pub fn extend(&mut self, value: f64) {
        if self.extended {
            return;
        }
        for point in &mut self.points {
            point.extend(value);
        }
        self.feature_index.push(BIAS_INDEX);
        self.extended = true;
    }

    /// Remove the bias column; no-op when not extended
    pub fn reduce(&mut self) {
        if !self.extended {
            return;
        }
        for point in &mut self.points {
            point.reduce();
        }
        self.feature_index.pop();
        self.extended = false;
    }

    fn normalize_indices(&self, indices: &[usize]) -> Result<Vec<usize>> {
        if self.extended {
            return Err(RermError::UnsupportedOperation(
                "feature deletion on an extended dataset".to_string(),
            ));
        }
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if let Some(&last) = sorted.last() {
            if last >= self.num_features() {
                return Err(RermError::InvalidParameter(format!(
                    "feature {last} out of range for {} features",
                    self.num_features()
                )));
            }
        }
        Ok(sorted)
    }

    /// Delete the given columns from every point and from the feature index
    pub fn delete_features(&mut self, indices: &[usize]) -> Result<()> {
        let sorted = self.normalize_indices(indices)?;
        for point in &mut self.points {
            point.delete_features(&sorted)?;
        }
        self.feature_index = vector::delete_indices(&self.feature_index, &sorted)?;
        if let Some(names) = &self.feature_names {
            self.feature_names = Some(vector::delete_indices(names, &sorted)?);
        }
        Ok(())
    }

    /// Keep only the given columns
    pub fn keep_features(&mut self, indices: &[usize]) -> Result<()> {
        let sorted = self.normalize_indices(indices)?;
        for point in &mut self.points {
            point.keep_features(&sorted)?;
        }
        self.feature_index = vector::keep_indices(&self.feature_index, &sorted)?;
        if let Some(names) = &self.feature_names {
            self.feature_names = Some(vector::keep_indices(names, &sorted)?);
        }
        Ok(())
    }

    /// Copy of the selected points, keeping the feature layout
    pub fn subset(&self, indices: &[usize]) -> Result<Dataset> {
        let mut out = self.empty_like();
        for &i in indices {
            let point = self.points.get(i).ok_or_else(|| {
                RermError::InvalidParameter(format!(
                    "point {i} out of range for {} points",
                    self.len()
                ))
            })?;
            out.add_datapoint(point.clone())?;
        }
        Ok(out)
    }

    /// Copy with every point's group, and its value proxy, replaced by `label(point)`
    pub fn relabeled(&self, label: impl Fn(&Datapoint) -> i32) -> Dataset {
        let mut out = self.empty_like();
        for point in &self.points {
            let group = label(point);
            let mut copy = point.clone();
            copy.group = Some(group);
            copy.value = group as f64;
            *out.group_counts.entry(group).or_insert(0) += 1;
            out.points.push(copy);
        }
        out
    }

    /// Copy restricted to the columns of a feature subset
    pub fn generate_subset(&self, subset: &crate::selection::FeatureSubset) -> Result<Dataset> {
        let mut out = self.clone();
        out.keep_features(&subset.sorted_indices())?;
        Ok(out)
    }

    /// Points whose predicted group equals their group
    pub fn num_correct_predictions(&self) -> usize {
        self.points
            .iter()
            .filter(|p| p.group.is_some() && p.group == p.predicted_group)
            .count()
    }

    pub fn clear_predictions(&mut self) {
        for point in &mut self.points {
            point.predicted_group = None;
            point.predicted_value = None;
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Datapoint;
    type IntoIter = std::slice::Iter<'a, Datapoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
