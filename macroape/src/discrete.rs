//! Integer discretization of scoring models.
//!
//! Every distribution computed by this crate works on integer scores: a
//! [`Discretizer`] maps real scores to integer buckets with a fixed rate,
//! and a [`DiscreteMatrix`] stores the bucketed scores of a model together
//! with the [`SuffixBounds`] used to prune distributions.

use typenum::marker_traits::Unsigned;

use super::dense::DenseMatrix;
use super::err::Error;

/// Tolerance on upscaled values before rounding them up to a bucket.
const EPSILON: f64 = 1e-6;

/// The largest absolute total score allowed in discretized space.
///
/// Pair distributions pack two scores in a single 64-bit key, so every
/// reachable score must fit in 32 bits.
pub(crate) const SCORE_LIMIT: i64 = i32::MAX as i64;

// --- Discretizer -------------------------------------------------------------

/// A scale factor converting real scores to integer buckets.
///
/// A score `x` falls in the bucket `ceil(x * rate)`, so larger rates give
/// finer (and more expensive) distributions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Discretizer {
    rate: f64,
}

impl Discretizer {
    /// Create a new discretizer with the given rate.
    pub fn new(rate: f64) -> Result<Self, Error> {
        if rate.is_finite() && rate > 0.0 {
            Ok(Self { rate })
        } else {
            Err(Error::InvalidDiscretization(rate))
        }
    }

    /// The number of buckets per score unit.
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Scale a real value to discretized units, without rounding.
    #[inline]
    pub fn upscale(&self, value: f64) -> f64 {
        value * self.rate
    }

    /// Scale a discretized value back to real units.
    #[inline]
    pub fn downscale(&self, value: f64) -> f64 {
        value / self.rate
    }

    /// Get the bucket of a real value.
    ///
    /// Upscaled values within a small tolerance above an integer fall in
    /// that integer bucket, so that `discrete(unscale(b)) == b`.
    pub fn discrete(&self, value: f64) -> Result<i64, Error> {
        if !value.is_finite() {
            return Err(Error::InvalidData(format!("non-finite score: {}", value)));
        }
        let bucket = (self.upscale(value) - EPSILON).ceil();
        if bucket.abs() > SCORE_LIMIT as f64 {
            return Err(Error::DiscretizationOverflow(self.rate));
        }
        Ok(bucket as i64)
    }

    /// Get the real value of a bucket.
    #[inline]
    pub fn unscale(&self, bucket: i64) -> f64 {
        self.downscale(bucket as f64)
    }
}

// --- SuffixBounds ------------------------------------------------------------

/// The best score reachable from each position to the end of a matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct SuffixBounds {
    best: Vec<i64>,
}

impl SuffixBounds {
    /// The maximum score contribution of positions `pos..len`.
    ///
    /// Returns zero for `pos >= len`.
    #[inline]
    pub fn best_suffix(&self, pos: usize) -> i64 {
        self.best.get(pos).cloned().unwrap_or(0)
    }
}

// --- DiscreteMatrix ----------------------------------------------------------

/// A scoring matrix rescaled to integer scores.
///
/// Rows have `C` columns split into `contexts` blocks of symbols: a
/// mononucleotide matrix has a single context, a dinucleotide matrix uses
/// the previous symbol as the context of the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscreteMatrix<C: Unsigned> {
    data: DenseMatrix<i64, C>,
    contexts: usize,
    discretizer: Discretizer,
}

impl<C: Unsigned> DiscreteMatrix<C> {
    /// Discretize the given real-valued rows.
    pub fn new(
        matrix: &DenseMatrix<f64, C>,
        contexts: usize,
        discretizer: Discretizer,
    ) -> Result<Self, Error> {
        if contexts == 0 || C::USIZE % contexts != 0 {
            return Err(Error::InvalidData(format!(
                "cannot split {} columns in {} contexts",
                C::USIZE,
                contexts
            )));
        }

        let mut data = DenseMatrix::new(matrix.rows());
        for (src, dst) in matrix.iter().zip(data.iter_mut()) {
            for (x, y) in src.iter().zip(dst.iter_mut()) {
                *y = discretizer.discrete(*x)?;
            }
        }

        let discrete = Self {
            data,
            contexts,
            discretizer,
        };
        let best: i64 = (0..discrete.len()).map(|i| discrete.row_max(i)).sum();
        let worst: i64 = (0..discrete.len()).map(|i| discrete.row_min(i)).sum();
        if best.abs() > SCORE_LIMIT || worst.abs() > SCORE_LIMIT {
            return Err(Error::DiscretizationOverflow(discretizer.rate()));
        }

        Ok(discrete)
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

    /// The number of contexts in each row.
    #[inline]
    pub fn contexts(&self) -> usize {
        self.contexts
    }

    /// The number of symbols that can be read in each context.
    #[inline]
    pub fn symbols(&self) -> usize {
        C::USIZE / self.contexts
    }

    /// The discretizer used to build the matrix.
    #[inline]
    pub fn discretizer(&self) -> &Discretizer {
        &self.discretizer
    }

    /// The integer scores of the matrix.
    #[inline]
    pub fn data(&self) -> &DenseMatrix<i64, C> {
        &self.data
    }

    /// The score of reading `symbol` in `context` at position `pos`.
    #[inline]
    pub fn score(&self, pos: usize, context: usize, symbol: usize) -> i64 {
        self.data[pos][context * self.symbols() + symbol]
    }

    /// The context reached after reading `symbol` in `context`.
    #[inline]
    pub fn next_context(&self, context: usize, symbol: usize) -> usize {
        if self.contexts == 1 {
            debug_assert_eq!(context, 0);
            0
        } else {
            symbol
        }
    }

    /// The best score reachable at each row.
    fn row_max(&self, pos: usize) -> i64 {
        self.data[pos].iter().cloned().max().unwrap_or(0)
    }

    /// The worst score reachable at each row.
    fn row_min(&self, pos: usize) -> i64 {
        self.data[pos].iter().cloned().min().unwrap_or(0)
    }

    /// Follow every chain of contexts, keeping the score picked at each step.
    fn chain_score<F: Fn(i64, i64) -> i64>(&self, pick: F, init: i64) -> i64 {
        let mut current = vec![0; self.contexts];
        let mut next = vec![init; self.contexts];
        for pos in 0..self.len() {
            next.iter_mut().for_each(|x| *x = init);
            for (ctx, &score) in current.iter().enumerate() {
                for sym in 0..self.symbols() {
                    let dst = &mut next[self.next_context(ctx, sym)];
                    *dst = pick(*dst, score + self.score(pos, ctx, sym));
                }
            }
            std::mem::swap(&mut current, &mut next);
        }
        current.into_iter().fold(init, pick)
    }

    /// The best score of any word.
    pub fn best_score(&self) -> i64 {
        self.chain_score(i64::max, i64::MIN)
    }

    /// The worst score of any word.
    pub fn worst_score(&self) -> i64 {
        self.chain_score(i64::min, i64::MAX)
    }

    /// Compute the best suffix score for every position.
    pub fn suffix_bounds(&self) -> SuffixBounds {
        let mut best = vec![0; self.len() + 1];
        for i in (0..self.len()).rev() {
            best[i] = best[i + 1] + self.row_max(i);
        }
        SuffixBounds { best }
    }

    /// Create a new matrix padded with zero-scoring positions.
    pub fn padded(&self, left: usize, right: usize) -> Self {
        Self {
            data: self.data.padded(left, right),
            contexts: self.contexts,
            discretizer: self.discretizer,
        }
    }
}

#[cfg(test)]
mod test {
    use typenum::consts::U4;

    use super::*;

    #[test]
    fn discretizer_buckets() {
        let d = Discretizer::new(10.0).unwrap();
        assert_eq!(d.discrete(0.3).unwrap(), 3);
        assert_eq!(d.discrete(0.31).unwrap(), 4);
        assert_eq!(d.discrete(-0.31).unwrap(), -3);
        assert_eq!(d.discrete(d.unscale(17)).unwrap(), 17);
        assert!(d.discrete(f64::NAN).is_err());
        assert!(Discretizer::new(0.0).is_err());
        assert!(Discretizer::new(-1.0).is_err());
    }

    #[test]
    fn discretizer_overflow() {
        let d = Discretizer::new(1e12).unwrap();
        assert_eq!(d.discrete(10.0), Err(Error::DiscretizationOverflow(1e12)));
    }

    #[test]
    fn suffix_bounds() {
        let d = Discretizer::new(1.0).unwrap();
        let m = DenseMatrix::<f64, U4>::from_rows([
            [2.0, 0.0, 0.0, -1.0],
            [0.0, 2.0, 0.0, 0.0],
            [1.0, 0.0, 3.0, 0.0],
        ]);
        let dm = DiscreteMatrix::new(&m, 1, d).unwrap();
        let bounds = dm.suffix_bounds();
        assert_eq!(bounds.best_suffix(0), 7);
        assert_eq!(bounds.best_suffix(1), 5);
        assert_eq!(bounds.best_suffix(2), 3);
        assert_eq!(bounds.best_suffix(3), 0);
        assert_eq!(bounds.best_suffix(10), 0);
        assert_eq!(dm.best_score(), 7);
        assert_eq!(dm.worst_score(), -1);
    }

    #[test]
    fn chain_scores() {
        // row maxima sum to 6, but no chain reads both AC and TT
        let d = Discretizer::new(1.0).unwrap();
        let mut m = DenseMatrix::<f64, typenum::consts::U16>::new(2);
        m[0][1] = 2.0;
        m[1][4] = 3.0;
        m[1][15] = 4.0;
        m[1][0] = -1.0;
        let dm = DiscreteMatrix::new(&m, 4, d).unwrap();
        assert_eq!(dm.best_score(), 5);
        assert_eq!(dm.worst_score(), -1);
        assert_eq!(dm.suffix_bounds().best_suffix(0), 6);
    }

    #[test]
    fn invalid_contexts() {
        let d = Discretizer::new(1.0).unwrap();
        let m = DenseMatrix::<f64, U4>::new(2);
        assert!(DiscreteMatrix::new(&m, 3, d).is_err());
    }
}
