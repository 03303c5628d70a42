//! Parameters shared by threshold and similarity computations.

use super::discrete::Discretizer;
use super::err::Error;
use super::threshold::BoundaryType;

/// The configuration of threshold and similarity computations.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// The discretization rate of cheap approximate computations.
    pub rough_discretization: f64,
    /// The discretization rate of recalculated similarities.
    pub precise_discretization: f64,
    /// The maximum number of entries of single model distributions.
    pub max_distribution_entries: Option<usize>,
    /// The maximum number of entries of joint distributions.
    pub max_pair_entries: Option<usize>,
    /// The side taken by threshold searches.
    pub boundary: BoundaryType,
    /// The p-value models are thresholded at.
    pub pvalue: f64,
    /// The rough similarity above which a similarity is recalculated.
    pub recalculation_cutoff: Option<f64>,
    /// The similarity below which results are dropped.
    pub similarity_cutoff: Option<f64>,
}

impl Config {
    /// The discretizer for rough computations.
    pub fn rough_discretizer(&self) -> Result<Discretizer, Error> {
        Discretizer::new(self.rough_discretization)
    }

    /// The discretizer for precise computations.
    pub fn precise_discretizer(&self) -> Result<Discretizer, Error> {
        Discretizer::new(self.precise_discretization)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rough_discretization: 1.0,
            precise_discretization: 10.0,
            max_distribution_entries: Some(10_000_000),
            max_pair_entries: Some(10_000_000),
            boundary: BoundaryType::Lower,
            pvalue: 0.0005,
            recalculation_cutoff: Some(0.05),
            similarity_cutoff: Some(0.05),
        }
    }
}
