use std::marker::PhantomData;

use typenum::marker_traits::Unsigned;

use super::super::abc::Alphabet;
use super::super::abc::ComplementableAlphabet;
use super::super::abc::Symbol;
use super::super::bg::DiBackground;
use super::super::dense::DenseMatrix;
use super::super::discrete::DiscreteMatrix;
use super::super::discrete::Discretizer;
use super::super::err::Error;
use super::super::model::ReverseComplement;
use super::super::model::ScoringModel;
use super::check_scores;
use super::ScoringMatrix;

/// A matrix storing log-odds scores of symbol pairs at each position.
///
/// The column `a * K + b` of row `i` scores reading symbol `a` at position
/// `i` followed by symbol `b` at position `i + 1`, so a matrix of `n` rows
/// scores words of `n + 1` symbols.
#[derive(Clone, Debug, PartialEq)]
pub struct DiScoringMatrix<A: Alphabet> {
    name: Option<String>,
    data: DenseMatrix<f64, A::K2>,
    alphabet: PhantomData<A>,
}

impl<A: Alphabet> DiScoringMatrix<A> {
    /// Create a new dinucleotide scoring matrix from the given scores.
    pub fn new(data: DenseMatrix<f64, A::K2>) -> Result<Self, Error> {
        check_scores(&data)?;
        Ok(Self {
            name: None,
            data,
            alphabet: PhantomData,
        })
    }

    /// Build the dinucleotide matrix scoring words like a mononucleotide one.
    ///
    /// Each pair column carries the score of its first symbol; the last row
    /// also carries the score of the second symbol.
    pub fn from_mono(matrix: &ScoringMatrix<A>) -> Result<Self, Error> {
        let n = matrix.len();
        if n < 2 {
            return Err(Error::InvalidData(format!(
                "cannot build a dinucleotide matrix from {} position(s)",
                n
            )));
        }
        let k = A::K::USIZE;
        let mono = matrix.matrix();
        let mut data = DenseMatrix::new(n - 1);
        for (i, row) in data.iter_mut().enumerate() {
            for a in 0..k {
                for b in 0..k {
                    let tail = if i == n - 2 { mono[i + 1][b] } else { 0.0 };
                    row[a * k + b] = mono[i][a] + tail;
                }
            }
        }
        let mut di = Self::new(data)?;
        di.name = matrix.name().map(String::from);
        Ok(di)
    }

    /// Attach a name to the matrix.
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The scores of the matrix.
    #[inline]
    pub fn matrix(&self) -> &DenseMatrix<f64, A::K2> {
        &self.data
    }

    /// Compute the score of a word of length `len() + 1`.
    pub fn score_word<S: AsRef<[A::Symbol]>>(&self, word: S) -> Option<f64> {
        let word = word.as_ref();
        if word.len() != self.word_len() {
            return None;
        }
        let k = A::K::USIZE;
        Some(
            word.windows(2)
                .zip(self.data.iter())
                .map(|(w, row)| row[w[0].as_index() * k + w[1].as_index()])
                .sum(),
        )
    }

    /// Best or worst score of a word, following symbol chains.
    fn extreme_score<F: Fn(f64, f64) -> f64>(&self, pick: F, init: f64) -> f64 {
        let k = A::K::USIZE;
        let mut current = vec![0.0; k];
        let mut next = vec![init; k];
        for row in self.data.iter() {
            next.iter_mut().for_each(|x| *x = init);
            for a in 0..k {
                for b in 0..k {
                    next[b] = pick(next[b], current[a] + row[a * k + b]);
                }
            }
            std::mem::swap(&mut current, &mut next);
        }
        current.into_iter().fold(init, pick)
    }
}

impl<A: Alphabet> AsRef<DenseMatrix<f64, A::K2>> for DiScoringMatrix<A> {
    fn as_ref(&self) -> &DenseMatrix<f64, A::K2> {
        &self.data
    }
}

impl<A: Alphabet> ScoringModel for DiScoringMatrix<A> {
    type Alphabet = A;
    type Columns = A::K2;
    type Background = DiBackground<A>;

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    fn len(&self) -> usize {
        self.data.rows()
    }

    #[inline]
    fn word_len(&self) -> usize {
        self.len() + 1
    }

    fn best_score(&self) -> f64 {
        self.extreme_score(f64::max, f64::NEG_INFINITY)
    }

    fn worst_score(&self) -> f64 {
        self.extreme_score(f64::min, f64::INFINITY)
    }

    fn padded(&self, left: usize, right: usize) -> Self {
        Self {
            name: self.name.clone(),
            data: self.data.padded(left, right),
            alphabet: PhantomData,
        }
    }

    fn discretize(&self, discretizer: &Discretizer) -> Result<DiscreteMatrix<A::K2>, Error> {
        DiscreteMatrix::new(&self.data, A::K::USIZE, *discretizer)
    }
}

impl<A: ComplementableAlphabet> ReverseComplement for DiScoringMatrix<A> {
    fn reverse_complement(&self) -> Self {
        let k = A::K::USIZE;
        let mut data = DenseMatrix::new(self.data.rows());
        for (src, dst) in self.data.iter().rev().zip(data.iter_mut()) {
            for a in 0..k {
                for b in 0..k {
                    dst[a * k + b] = src[A::complement_index(b) * k + A::complement_index(a)];
                }
            }
        }
        Self {
            name: self.name.clone(),
            data,
            alphabet: PhantomData,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::abc::ComplementableSymbol;
    use crate::abc::Dna;
    use crate::abc::Nucleotide;
    use crate::abc::Nucleotide::*;

    fn mono() -> ScoringMatrix<Dna> {
        ScoringMatrix::new(DenseMatrix::from_rows([
            [1.0, -1.0, 0.5, 0.0],
            [0.0, 2.0, -2.0, 1.0],
            [-0.5, 0.0, 1.5, 0.25],
        ]))
        .unwrap()
    }

    fn all_words(n: usize) -> Vec<Vec<Nucleotide>> {
        let mut words = vec![Vec::new()];
        for _ in 0..n {
            words = words
                .into_iter()
                .flat_map(|w| {
                    [A, C, G, T].into_iter().map(move |s| {
                        let mut w = w.clone();
                        w.push(s);
                        w
                    })
                })
                .collect();
        }
        words
    }

    #[test]
    fn from_mono_scores() {
        let pwm = mono();
        let di = DiScoringMatrix::from_mono(&pwm).unwrap();
        assert_eq!(di.len(), 2);
        assert_eq!(di.word_len(), 3);
        for word in all_words(3) {
            let x = pwm.score_word(&word).unwrap();
            let y = di.score_word(&word).unwrap();
            assert!((x - y).abs() < 1e-12);
        }
        assert!((di.best_score() - pwm.best_score()).abs() < 1e-12);
        assert!((di.worst_score() - pwm.worst_score()).abs() < 1e-12);
    }

    #[test]
    fn from_mono_too_short() {
        let pwm = ScoringMatrix::<Dna>::new(DenseMatrix::from_rows([[0.0; 4]])).unwrap();
        assert!(DiScoringMatrix::from_mono(&pwm).is_err());
    }

    #[test]
    fn reverse_complement_scores() {
        let di = DiScoringMatrix::from_mono(&mono()).unwrap();
        let rc = di.reverse_complement();
        for word in all_words(3) {
            let rc_word: Vec<Nucleotide> = word.iter().rev().map(|s| s.complement()).collect();
            let x = di.score_word(&word).unwrap();
            let y = rc.score_word(&rc_word).unwrap();
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn best_score_follows_chains() {
        // row maxima sum to 6, but no chain goes through both AC and TT
        let mut data = DenseMatrix::<f64, typenum::consts::U16>::new(2);
        data[0][1] = 2.0;
        data[1][4] = 3.0;
        data[1][15] = 4.0;
        let di = DiScoringMatrix::<Dna>::new(data).unwrap();
        assert_eq!(di.best_score(), 5.0);
        assert_eq!(di.score_word([A, C, A]), Some(5.0));
    }
}
