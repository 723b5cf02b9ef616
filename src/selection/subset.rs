//! Scored sets of feature indices

use std::fmt;

use serde::{Deserialize, Serialize};

/// Feature indices in insertion order, with a score and the subsets merged into it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSubset {
    indices: Vec<usize>,
    score: f64,
    merge_history: Vec<FeatureSubset>,
}

impl FeatureSubset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(index: usize) -> Self {
        Self::from_indices(&[index])
    }

    /// Duplicates are kept once, at their first position
    pub fn from_indices(indices: &[usize]) -> Self {
        let mut subset = Self::new();
        subset.add_all(indices);
        subset
    }

    pub fn add(&mut self, index: usize) {
        if !self.contains(index) {
            self.indices.push(index);
        }
    }

    pub fn add_all(&mut self, indices: &[usize]) {
        for &i in indices {
            self.add(i);
        }
    }

    /// Add every index of `other` and remember it as a parent
    pub fn merge(&mut self, other: &FeatureSubset) {
        self.add_all(&other.indices);
        self.merge_history.push(other.clone());
    }

    pub fn remove(&mut self, index: usize) {
        self.indices.retain(|&i| i != index);
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn overlaps(&self, other: &FeatureSubset) -> bool {
        self.indices.iter().any(|&i| other.contains(i))
    }

    pub fn size(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Indices in insertion order
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn sorted_indices(&self) -> Vec<usize> {
        let mut sorted = self.indices.clone();
        sorted.sort_unstable();
        sorted
    }

    /// The subset without its most recently added index
    pub fn root(&self) -> FeatureSubset {
        let keep = self.indices.len().saturating_sub(1);
        Self::from_indices(&self.indices[..keep])
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    pub fn merge_history(&self) -> &[FeatureSubset] {
        &self.merge_history
    }
}

/// Equal when the index sets are equal, regardless of order and score
impl PartialEq for FeatureSubset {
    fn eq(&self, other: &Self) -> bool {
        self.size() == other.size() && self.sorted_indices() == other.sorted_indices()
    }
}

impl fmt::Display for FeatureSubset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list: Vec<String> = self.indices.iter().map(usize::to_string).collect();
        write!(f, "sc: {:.4} #f: {} --> {}", self.score, self.size(), list.join(","))
    }
}
