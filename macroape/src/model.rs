//! Capabilities shared by the scoring models of the crate.

use std::fmt::Debug;

use typenum::marker_traits::Unsigned;

use super::abc::Alphabet;
use super::bg::BackgroundModel;
use super::discrete::DiscreteMatrix;
use super::discrete::Discretizer;
use super::err::Error;

/// A position-dependent model scoring fixed-length words.
///
/// Implemented by mononucleotide ([`ScoringMatrix`]) and dinucleotide
/// ([`DiScoringMatrix`]) matrices, so that distribution, threshold and
/// similarity computations are written once for both.
///
/// [`ScoringMatrix`]: crate::pwm::ScoringMatrix
/// [`DiScoringMatrix`]: crate::pwm::DiScoringMatrix
pub trait ScoringModel: Clone + Debug + Send + Sync {
    /// The alphabet of the scored words.
    type Alphabet: Alphabet;
    /// The number of scores stored for each position.
    type Columns: Unsigned + Debug + PartialEq + Send + Sync;
    /// The background model weighting words scored by this model.
    type Background: BackgroundModel;

    /// The name of the model, if any.
    fn name(&self) -> Option<&str>;

    /// The number of positions of the model.
    fn len(&self) -> usize;

    /// Check whether the model has no positions.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The length of the words scored by the model.
    fn word_len(&self) -> usize;

    /// The highest score any word can reach.
    fn best_score(&self) -> f64;

    /// The lowest score any word can reach.
    fn worst_score(&self) -> f64;

    /// Create a new model with zero-scoring positions on both sides.
    fn padded(&self, left: usize, right: usize) -> Self;

    /// Rescale the model to integer scores.
    fn discretize(&self, discretizer: &Discretizer) -> Result<DiscreteMatrix<Self::Columns>, Error>;
}

/// A model that can score the reverse strand of a word.
pub trait ReverseComplement {
    /// Get the model scoring the reverse complement of words.
    fn reverse_complement(&self) -> Self;
}
