//! Position-specific matrices storing counts, frequencies and scores.

use std::marker::PhantomData;

use typenum::marker_traits::Unsigned;

use super::abc::Alphabet;
use super::abc::ComplementableAlphabet;
use super::abc::Symbol;
use super::bg::Background;
use super::dense::DenseMatrix;
use super::discrete::DiscreteMatrix;
use super::discrete::Discretizer;
use super::err::Error;
use super::model::ReverseComplement;
use super::model::ScoringModel;

mod di;

pub use self::di::DiScoringMatrix;

/// The number of sequences assumed behind a frequency matrix by default.
pub const DEFAULT_EFFECTIVE_COUNT: f64 = 100.0;

/// Check that a matrix has rows and only finite values.
fn check_scores<C: Unsigned>(data: &DenseMatrix<f64, C>) -> Result<(), Error> {
    if data.rows() == 0 {
        return Err(Error::EmptyModel);
    }
    for (i, row) in data.iter().enumerate() {
        if let Some(x) = row.iter().find(|x| !x.is_finite()) {
            return Err(Error::InvalidData(format!(
                "non-finite value {} at position {}",
                x, i
            )));
        }
    }
    Ok(())
}

// --- CountMatrix -------------------------------------------------------------

/// A matrix storing symbol occurences at each position.
///
/// Counts are real numbers, since count matrices are often obtained by
/// weighting or rescaling the aligned sites.
#[derive(Clone, Debug, PartialEq)]
pub struct CountMatrix<A: Alphabet> {
    alphabet: PhantomData<A>,
    data: DenseMatrix<f64, A::K>,
}

impl<A: Alphabet> CountMatrix<A> {
    /// Create a new count matrix from the given data.
    pub fn new(data: DenseMatrix<f64, A::K>) -> Result<Self, Error> {
        check_scores(&data)?;
        if data.iter().flatten().any(|&x| x < 0.0) {
            return Err(Error::InvalidData("negative count".into()));
        }
        Ok(Self {
            alphabet: PhantomData,
            data,
        })
    }

    /// Create a new count matrix from aligned sequences of the same length.
    pub fn from_sequences<I>(sequences: I) -> Result<Self, Error>
    where
        I: IntoIterator,
        <I as IntoIterator>::Item: AsRef<str>,
    {
        let mut data: Option<DenseMatrix<f64, A::K>> = None;
        for seq in sequences {
            let seq = seq.as_ref();
            let d = data.get_or_insert_with(|| DenseMatrix::new(seq.chars().count()));
            if seq.chars().count() != d.rows() {
                return Err(Error::InvalidData(format!(
                    "sequence {:?} does not have length {}",
                    seq,
                    d.rows()
                )));
            }
            for (i, c) in seq.chars().enumerate() {
                let symbol = A::Symbol::from_char(c)
                    .map_err(|e| Error::InvalidData(e.to_string()))?;
                d[i][symbol.as_index()] += 1.0;
            }
        }
        Self::new(data.ok_or(Error::EmptyModel)?)
    }

    /// The number of positions of the matrix.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.rows()
    }

    /// Check whether the matrix has no positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw counts of the matrix.
    #[inline]
    pub fn counts(&self) -> &DenseMatrix<f64, A::K> {
        &self.data
    }

    /// Build a scoring matrix using log-odds against the given background.
    ///
    /// Each position of `n` observations receives a pseudocount of `ln(n)`
    /// distributed along the background probabilities. Wordwise backgrounds
    /// use uniform probabilities.
    pub fn to_scoring(&self, background: &Background<A>) -> Result<ScoringMatrix<A>, Error> {
        let probabilities = background.frequencies();
        let mut scores = DenseMatrix::new(self.data.rows());
        for (src, dst) in self.data.iter().zip(scores.iter_mut()) {
            let count: f64 = src.iter().sum();
            let pseudo = count.ln().max(0.0);
            for (j, (&x, &p)) in src.iter().zip(probabilities).enumerate() {
                dst[j] = ((x + p * pseudo) / (p * (count + pseudo))).ln();
            }
        }
        ScoringMatrix::new(scores)
    }
}

impl<A: Alphabet> AsRef<DenseMatrix<f64, A::K>> for CountMatrix<A> {
    fn as_ref(&self) -> &DenseMatrix<f64, A::K> {
        &self.data
    }
}

// --- FrequencyMatrix ---------------------------------------------------------

/// A matrix storing symbol frequencies at each position.
#[derive(Clone, Debug, PartialEq)]
pub struct FrequencyMatrix<A: Alphabet> {
    alphabet: PhantomData<A>,
    data: DenseMatrix<f64, A::K>,
}

impl<A: Alphabet> FrequencyMatrix<A> {
    /// Create a new frequency matrix, normalizing each row.
    pub fn new(mut data: DenseMatrix<f64, A::K>) -> Result<Self, Error> {
        check_scores(&data)?;
        for (i, row) in data.iter_mut().enumerate() {
            let sum: f64 = row.iter().sum();
            if sum <= 0.0 || row.iter().any(|&x| x < 0.0) {
                return Err(Error::InvalidData(format!(
                    "position {} is not a frequency vector",
                    i
                )));
            }
            row.iter_mut().for_each(|x| *x /= sum);
        }
        Ok(Self {
            alphabet: PhantomData,
            data,
        })
    }

    /// The number of positions of the matrix.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.rows()
    }

    /// Check whether the matrix has no positions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The normalized frequencies of the matrix.
    #[inline]
    pub fn frequencies(&self) -> &DenseMatrix<f64, A::K> {
        &self.data
    }

    /// Rescale frequencies to the counts of `effective_count` sequences.
    pub fn to_counts(&self, effective_count: f64) -> Result<CountMatrix<A>, Error> {
        if !(effective_count.is_finite() && effective_count > 0.0) {
            return Err(Error::InvalidData(format!(
                "invalid effective count: {}",
                effective_count
            )));
        }
        let mut counts = self.data.clone();
        counts
            .iter_mut()
            .flatten()
            .for_each(|x| *x *= effective_count);
        CountMatrix::new(counts)
    }
}

impl<A: Alphabet> From<CountMatrix<A>> for FrequencyMatrix<A> {
    fn from(counts: CountMatrix<A>) -> Self {
        let mut data = counts.data;
        for row in data.iter_mut() {
            let sum: f64 = row.iter().sum();
            if sum > 0.0 {
                row.iter_mut().for_each(|x| *x /= sum);
            }
        }
        Self {
            alphabet: PhantomData,
            data,
        }
    }
}

// --- ScoringMatrix -----------------------------------------------------------

/// A matrix storing log-odds scores of symbols at each position.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoringMatrix<A: Alphabet> {
    name: Option<String>,
    data: DenseMatrix<f64, A::K>,
    alphabet: PhantomData<A>,
}

impl<A: Alphabet> ScoringMatrix<A> {
    /// Create a new scoring matrix from the given scores.
    ///
    /// # Example
    /// ```
    /// # use macroape::abc::*;
    /// # use macroape::dense::*;
    /// # use macroape::model::*;
    /// # use macroape::pwm::*;
    /// let pwm = ScoringMatrix::<Dna>::new(DenseMatrix::from_rows([
    ///     [2.0, 0.0, 0.0, 0.0],
    ///     [0.0, 2.0, 0.0, 0.0],
    /// ]))
    /// .unwrap();
    /// assert_eq!(pwm.len(), 2);
    /// assert_eq!(pwm.best_score(), 4.0);
    /// ```
    pub fn new(data: DenseMatrix<f64, A::K>) -> Result<Self, Error> {
        check_scores(&data)?;
        Ok(Self {
            name: None,
            data,
            alphabet: PhantomData,
        })
    }

    /// Attach a name to the matrix.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The scores of the matrix.
    #[inline]
    pub fn matrix(&self) -> &DenseMatrix<f64, A::K> {
        &self.data
    }

    /// Compute the score of a word of the same length as the matrix.
    pub fn score_word<S: AsRef<[A::Symbol]>>(&self, word: S) -> Option<f64> {
        let word = word.as_ref();
        if word.len() != self.len() {
            return None;
        }
        Some(
            word.iter()
                .zip(self.data.iter())
                .map(|(s, row)| row[s.as_index()])
                .sum(),
        )
    }
}

impl<A: Alphabet> AsRef<DenseMatrix<f64, A::K>> for ScoringMatrix<A> {
    fn as_ref(&self) -> &DenseMatrix<f64, A::K> {
        &self.data
    }
}

impl<A: Alphabet> ScoringModel for ScoringMatrix<A> {
    type Alphabet = A;
    type Columns = A::K;
    type Background = Background<A>;

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.rows()
    }

    #[inline]
    fn word_len(&self) -> usize {
        self.len()
    }

    fn best_score(&self) -> f64 {
        self.data
            .iter()
            .map(|row| row.iter().cloned().fold(f64::NEG_INFINITY, f64::max))
            .sum()
    }

    fn worst_score(&self) -> f64 {
        self.data
            .iter()
            .map(|row| row.iter().cloned().fold(f64::INFINITY, f64::min))
            .sum()
    }

    fn padded(&self, left: usize, right: usize) -> Self {
        Self {
            name: self.name.clone(),
            data: self.data.padded(left, right),
            alphabet: PhantomData,
        }
    }

    fn discretize(&self, discretizer: &Discretizer) -> Result<DiscreteMatrix<A::K>, Error> {
        DiscreteMatrix::new(&self.data, 1, *discretizer)
    }
}

impl<A: ComplementableAlphabet> ReverseComplement for ScoringMatrix<A> {
    fn reverse_complement(&self) -> Self {
        let mut data = DenseMatrix::new(self.data.rows());
        for (src, dst) in self.data.iter().rev().zip(data.iter_mut()) {
            for (j, y) in dst.iter_mut().enumerate() {
                *y = src[A::complement_index(j)];
            }
        }
        Self {
            name: self.name.clone(),
            data,
            alphabet: PhantomData,
        }
    }
}
