//! Background models weighting the sequence universe.
//!
//! A background model decides how much each word contributes to a score
//! distribution. A *wordwise* background gives a weight of one to every
//! word, so that distributions count words and the vocabulary volume is
//! `K^n` for words of length `n`. A probabilistic background weights each
//! word by its probability, giving a vocabulary volume of one.

use std::fmt::Debug;

use generic_array::GenericArray;
use typenum::marker_traits::Unsigned;

use super::abc::Alphabet;
use super::err::Error;

/// The tolerance on the sum of background frequencies.
const SUM_TOLERANCE: f64 = 1e-4;

// --- BackgroundModel ---------------------------------------------------------

/// A model weighting symbols, possibly depending on the previous symbol.
///
/// The distribution engines consume a background as a small automaton:
/// a word starts in a *context* with [`initial_weight`], and each symbol
/// read from a context contributes [`transition_weight`]. Mononucleotide
/// backgrounds have a single context, dinucleotide backgrounds use the
/// previous symbol as the context.
///
/// [`initial_weight`]: BackgroundModel::initial_weight
/// [`transition_weight`]: BackgroundModel::transition_weight
pub trait BackgroundModel: Clone + Debug + PartialEq + Send + Sync {
    /// The per-symbol normalizing constant of the vocabulary.
    fn volume(&self) -> f64;

    /// Whether every word has a weight of one.
    fn is_wordwise(&self) -> bool;

    /// Whether two backgrounds weight the sequence universe identically.
    fn matches(&self, other: &Self) -> bool {
        self == other
    }

    /// The weight of starting a word in the given context.
    fn initial_weight(&self, context: usize) -> f64;

    /// The weight of reading `symbol` in the given context.
    fn transition_weight(&self, context: usize, symbol: usize) -> f64;

    /// The total volume of a vocabulary of words with the given length.
    fn vocabulary_volume(&self, word_len: usize) -> f64 {
        self.volume().powi(word_len as i32)
    }
}

fn check_frequencies(frequencies: &[f64]) -> Result<(), Error> {
    let mut sum = 0.0;
    for &f in frequencies {
        if !(0.0..=1.0).contains(&f) {
            return Err(Error::InvalidBackground(format!(
                "frequency {} outside of [0, 1]",
                f
            )));
        }
        sum += f;
    }
    if (sum - 1.0).abs() > SUM_TOLERANCE {
        return Err(Error::InvalidBackground(format!(
            "frequencies sum to {}, expected 1",
            sum
        )));
    }
    Ok(())
}

// --- Background --------------------------------------------------------------

/// The background frequencies for an alphabet.
#[derive(Clone, Debug, PartialEq)]
pub struct Background<A: Alphabet> {
    frequencies: GenericArray<f64, A::K>,
    wordwise: bool,
    alphabet: std::marker::PhantomData<A>,
}

impl<A: Alphabet> Background<A> {
    /// Create a new background with the given frequencies.
    ///
    /// The array must contain valid frequencies, i.e. real numbers between
    /// zero and one that sum to one.
    pub fn new<F>(frequencies: F) -> Result<Self, Error>
    where
        F: Into<GenericArray<f64, A::K>>,
    {
        let frequencies = frequencies.into();
        check_frequencies(&frequencies)?;
        Ok(Self {
            frequencies,
            wordwise: false,
            alphabet: std::marker::PhantomData,
        })
    }

    /// Create a new background from a slice of frequencies.
    pub fn from_slice(frequencies: &[f64]) -> Result<Self, Error> {
        let array = GenericArray::try_from_iter(frequencies.iter().cloned()).map_err(|_| {
            Error::InvalidBackground(format!(
                "expected {} frequencies, got {}",
                A::K::USIZE,
                frequencies.len()
            ))
        })?;
        Self::new(array)
    }

    /// Create a new background with uniform probabilities.
    ///
    /// # Example
    /// ```
    /// # use macroape::abc::*;
    /// # use macroape::bg::*;
    /// let bg = Background::<Dna>::uniform();
    /// assert_eq!(bg.frequencies(), &[0.25, 0.25, 0.25, 0.25]);
    /// assert_eq!(bg.volume(), 1.0);
    /// ```
    pub fn uniform() -> Self {
        Self {
            frequencies: (0..A::K::USIZE)
                .map(|_| 1.0 / A::K::USIZE as f64)
                .collect(),
            wordwise: false,
            alphabet: std::marker::PhantomData,
        }
    }

    /// Create a new background counting every word once.
    ///
    /// # Note
    /// The `Default` implementation for `Background` is wordwise.
    pub fn wordwise() -> Self {
        Self {
            frequencies: (0..A::K::USIZE)
                .map(|_| 1.0 / A::K::USIZE as f64)
                .collect(),
            wordwise: true,
            alphabet: std::marker::PhantomData,
        }
    }

    /// A reference to the symbol probabilities.
    ///
    /// Wordwise backgrounds report uniform probabilities.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }
}

impl<A: Alphabet> BackgroundModel for Background<A> {
    fn volume(&self) -> f64 {
        if self.wordwise {
            A::K::USIZE as f64
        } else {
            1.0
        }
    }

    fn is_wordwise(&self) -> bool {
        self.wordwise
    }

    #[inline]
    fn initial_weight(&self, _context: usize) -> f64 {
        1.0
    }

    #[inline]
    fn transition_weight(&self, _context: usize, symbol: usize) -> f64 {
        if self.wordwise {
            1.0
        } else {
            self.frequencies[symbol]
        }
    }
}

impl<A: Alphabet> AsRef<[f64]> for Background<A> {
    fn as_ref(&self) -> &[f64] {
        self.frequencies()
    }
}

impl<A: Alphabet> Default for Background<A> {
    fn default() -> Self {
        Self::wordwise()
    }
}

// --- DiBackground ------------------------------------------------------------

/// The background frequencies of symbol pairs for an alphabet.
///
/// The first symbol of a word is weighted by its marginal frequency, and
/// every following symbol by its frequency conditioned on the previous one.
#[derive(Clone, Debug, PartialEq)]
pub struct DiBackground<A: Alphabet> {
    frequencies: GenericArray<f64, A::K2>,
    marginals: GenericArray<f64, A::K>,
    wordwise: bool,
}

impl<A: Alphabet> DiBackground<A> {
    /// Create a new background with the given pair frequencies.
    ///
    /// The pair `(a, b)` is stored at index `a * K + b`.
    pub fn new<F>(frequencies: F) -> Result<Self, Error>
    where
        F: Into<GenericArray<f64, A::K2>>,
    {
        let frequencies = frequencies.into();
        check_frequencies(&frequencies)?;
        let k = A::K::USIZE;
        let marginals = (0..k)
            .map(|a| frequencies[a * k..(a + 1) * k].iter().sum())
            .collect();
        Ok(Self {
            frequencies,
            marginals,
            wordwise: false,
        })
    }

    /// Create a new background from a slice of pair frequencies.
    pub fn from_slice(frequencies: &[f64]) -> Result<Self, Error> {
        let array = GenericArray::try_from_iter(frequencies.iter().cloned()).map_err(|_| {
            Error::InvalidBackground(format!(
                "expected {} frequencies, got {}",
                A::K2::USIZE,
                frequencies.len()
            ))
        })?;
        Self::new(array)
    }

    /// Create a new background counting every word once.
    pub fn wordwise() -> Self {
        Self {
            frequencies: (0..A::K2::USIZE)
                .map(|_| 1.0 / A::K2::USIZE as f64)
                .collect(),
            marginals: (0..A::K::USIZE)
                .map(|_| 1.0 / A::K::USIZE as f64)
                .collect(),
            wordwise: true,
        }
    }

    /// Build the dinucleotide background equivalent to a mononucleotide one.
    pub fn from_mono(background: &Background<A>) -> Self {
        if background.is_wordwise() {
            return Self::wordwise();
        }
        let f = background.frequencies();
        let k = A::K::USIZE;
        Self {
            frequencies: (0..A::K2::USIZE).map(|i| f[i / k] * f[i % k]).collect(),
            marginals: f.iter().cloned().collect(),
            wordwise: false,
        }
    }

    /// A reference to the pair probabilities.
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }
}

impl<A: Alphabet> BackgroundModel for DiBackground<A> {
    fn volume(&self) -> f64 {
        if self.wordwise {
            A::K::USIZE as f64
        } else {
            1.0
        }
    }

    fn is_wordwise(&self) -> bool {
        self.wordwise
    }

    #[inline]
    fn initial_weight(&self, context: usize) -> f64 {
        if self.wordwise {
            1.0
        } else {
            self.marginals[context]
        }
    }

    #[inline]
    fn transition_weight(&self, context: usize, symbol: usize) -> f64 {
        if self.wordwise {
            1.0
        } else if self.marginals[context] > 0.0 {
            self.frequencies[context * A::K::USIZE + symbol] / self.marginals[context]
        } else {
            0.0
        }
    }
}

impl<A: Alphabet> Default for DiBackground<A> {
    fn default() -> Self {
        Self::wordwise()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::abc::Dna;

    #[test]
    fn background_new() {
        assert!(Background::<Dna>::new([0.3, 0.2, 0.2, 0.3]).is_ok());
        assert!(Background::<Dna>::new([0.1, 0.1, 0.1, 0.1]).is_err());
        assert!(Background::<Dna>::new([1.5, -0.5, 0.0, 0.0]).is_err());
    }

    #[test]
    fn background_from_slice() {
        assert!(Background::<Dna>::from_slice(&[0.25, 0.25, 0.5]).is_err());
        let bg = Background::<Dna>::from_slice(&[0.1, 0.4, 0.4, 0.1]).unwrap();
        assert_eq!(bg.transition_weight(0, 1), 0.4);
    }

    #[test]
    fn background_matches() {
        let a = Background::<Dna>::uniform();
        let b = Background::<Dna>::new([0.25, 0.25, 0.25, 0.25]).unwrap();
        assert!(a.matches(&b));
        assert!(!a.matches(&Background::wordwise()));
        assert!(Background::<Dna>::default().is_wordwise());
        assert_eq!(Background::<Dna>::wordwise().vocabulary_volume(3), 64.0);
    }

    #[test]
    fn dibackground_conditional() {
        let mono = Background::<Dna>::new([0.1, 0.2, 0.3, 0.4]).unwrap();
        let di = DiBackground::from_mono(&mono);
        for a in 0..4 {
            assert!((di.initial_weight(a) - mono.frequencies()[a]).abs() < 1e-12);
            for b in 0..4 {
                let t = di.transition_weight(a, b);
                assert!((t - mono.frequencies()[b]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn dibackground_invalid() {
        assert!(DiBackground::<Dna>::from_slice(&[0.25; 4]).is_err());
        assert!(DiBackground::<Dna>::from_slice(&[0.1; 16]).is_err());
        assert!(DiBackground::<Dna>::from_slice(&[0.0625; 16]).is_ok());
    }
}
