//! Discretized score distributions of a single model.
//!
//! The distribution of a model is built position by position: each entry
//! maps an accumulated integer score to the total background weight of the
//! prefixes reaching it. Entries are kept per background context, so that
//! dinucleotide models weight each symbol by the one before it. When a
//! floor is given, prefixes that cannot reach it anymore are dropped.

use log::debug;
use log::trace;
use typenum::marker_traits::Unsigned;

use super::bg::BackgroundModel;
use super::discrete::DiscreteMatrix;
use super::discrete::Discretizer;
use super::err::Error;
use super::hash::IntMap;
use super::threshold::BoundaryType;

/// Relative tolerance used when comparing accumulated weights.
pub(crate) const TOLERANCE: f64 = 1e-9;

/// Fail if the entries of the distribution maps exceed the limit.
pub(crate) fn check_limit<V>(maps: &[IntMap<V>], limit: Option<usize>) -> Result<(), Error> {
    if let Some(limit) = limit {
        let entries = maps.iter().map(|m| m.len()).sum::<usize>();
        if entries > limit {
            return Err(Error::ResourceLimitExceeded { entries, limit });
        }
    }
    Ok(())
}

/// Build the per-context starting maps for the given background.
pub(crate) fn initial_maps<B: BackgroundModel>(contexts: usize, background: &B, key: i64) -> Vec<IntMap<f64>> {
    (0..contexts)
        .map(|ctx| {
            let mut map = IntMap::default();
            let w = background.initial_weight(ctx);
            if w > 0.0 {
                map.insert(key, w);
            }
            map
        })
        .collect()
}

/// Compute the weight of every score reachable by the matrix.
///
/// Scores that cannot reach `floor` are pruned while the distribution is
/// built, so the returned map only contains scores at or above it.
pub(crate) fn count_distribution<C, B>(
    matrix: &DiscreteMatrix<C>,
    background: &B,
    floor: Option<i64>,
    limit: Option<usize>,
) -> Result<IntMap<f64>, Error>
where
    C: Unsigned,
    B: BackgroundModel,
{
    let bounds = matrix.suffix_bounds();
    let wordwise = background.is_wordwise();
    let symbols = matrix.symbols();

    let mut current = initial_maps(matrix.contexts(), background, 0);
    check_limit(&current, limit)?;

    for pos in 0..matrix.len() {
        let least = floor.map(|f| f - bounds.best_suffix(pos + 1));
        let mut next = vec![IntMap::default(); matrix.contexts()];
        for (ctx, scores) in current.iter().enumerate() {
            for sym in 0..symbols {
                let w = background.transition_weight(ctx, sym);
                if w == 0.0 {
                    continue;
                }
                let s = matrix.score(pos, ctx, sym);
                let dst: &mut IntMap<f64> = &mut next[matrix.next_context(ctx, sym)];
                for (&score, &weight) in scores.iter() {
                    let new_score = score + s;
                    if least.map(|l| new_score < l).unwrap_or(false) {
                        continue;
                    }
                    let added = if wordwise { weight } else { weight * w };
                    *dst.entry(new_score).or_default() += added;
                }
            }
        }
        current = next;
        trace!(
            "position {}: {} entries",
            pos,
            current.iter().map(|m| m.len()).sum::<usize>()
        );
        check_limit(&current, limit)?;
    }

    let mut merged = IntMap::default();
    for map in current {
        for (score, weight) in map {
            *merged.entry(score).or_default() += weight;
        }
    }
    debug!(
        "distribution over {} positions has {} scores (floor: {:?})",
        matrix.len(),
        merged.len(),
        floor
    );
    Ok(merged)
}

/// Compute the mean and variance of the score of a random word.
///
/// Context probabilities are propagated along the matrix, and the variance
/// treats positions as independent, which is only an estimate for
/// dinucleotide backgrounds.
pub(crate) fn score_moments<C, B>(matrix: &DiscreteMatrix<C>, background: &B) -> (f64, f64)
where
    C: Unsigned,
    B: BackgroundModel,
{
    let contexts = matrix.contexts();
    let mut probs = (0..contexts)
        .map(|ctx| background.initial_weight(ctx))
        .collect::<Vec<f64>>();
    let total: f64 = probs.iter().sum();
    if total > 0.0 {
        probs.iter_mut().for_each(|p| *p /= total);
    }

    let mut mean = 0.0;
    let mut variance = 0.0;
    for pos in 0..matrix.len() {
        let mut next = vec![0.0; contexts];
        let mut m1 = 0.0;
        let mut m2 = 0.0;
        for (ctx, &p_ctx) in probs.iter().enumerate() {
            let norm: f64 = (0..matrix.symbols())
                .map(|sym| background.transition_weight(ctx, sym))
                .sum();
            if p_ctx <= 0.0 || norm <= 0.0 {
                continue;
            }
            for sym in 0..matrix.symbols() {
                let p = p_ctx * background.transition_weight(ctx, sym) / norm;
                let x = matrix.score(pos, ctx, sym) as f64;
                m1 += p * x;
                m2 += p * x * x;
                next[matrix.next_context(ctx, sym)] += p;
            }
        }
        mean += m1;
        variance += (m2 - m1 * m1).max(0.0);
        probs = next;
    }
    (mean, variance)
}

// --- ScoreDistribution -------------------------------------------------------

/// The discretized distribution of the scores of a model.
///
/// Scores are stored in decreasing order together with the cumulated
/// weight of all words scoring at least as much. A distribution built with
/// a floor only knows the tail above that floor.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreDistribution {
    scores: Vec<i64>,
    weights: Vec<f64>,
    tails: Vec<f64>,
    floor: Option<i64>,
    vocabulary_volume: f64,
    discretizer: Discretizer,
}

impl ScoreDistribution {
    pub(crate) fn from_counts(
        counts: IntMap<f64>,
        floor: Option<i64>,
        vocabulary_volume: f64,
        discretizer: Discretizer,
    ) -> Self {
        let mut entries = counts.into_iter().collect::<Vec<(i64, f64)>>();
        entries.sort_unstable_by(|x, y| y.0.cmp(&x.0));
        let mut total = 0.0;
        let mut tails = Vec::with_capacity(entries.len());
        for &(_, w) in entries.iter() {
            total += w;
            tails.push(total);
        }
        let (scores, weights) = entries.into_iter().unzip();
        Self {
            scores,
            weights,
            tails,
            floor,
            vocabulary_volume,
            discretizer,
        }
    }

    /// The number of distinct scores in the distribution.
    #[inline]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Check whether the distribution has no scores.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// The lowest score the distribution was built for, if pruned.
    #[inline]
    pub fn floor(&self) -> Option<i64> {
        self.floor
    }

    /// The total weight of all the words of the model length.
    #[inline]
    pub fn vocabulary_volume(&self) -> f64 {
        self.vocabulary_volume
    }

    /// The discretizer of the distribution scores.
    #[inline]
    pub fn discretizer(&self) -> &Discretizer {
        &self.discretizer
    }

    /// The total weight retained in the distribution.
    pub fn total_weight(&self) -> f64 {
        self.tails.last().cloned().unwrap_or(0.0)
    }

    /// Iterate over the scores and their weights, by decreasing score.
    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.scores.iter().cloned().zip(self.weights.iter().cloned())
    }

    /// The weight of the words scoring at least `bucket`.
    ///
    /// Returns `None` when the bucket is below the floor of the
    /// distribution, since the weight there is unknown.
    pub fn weight_at_least(&self, bucket: i64) -> Option<f64> {
        if self.floor.map(|f| bucket < f).unwrap_or(false) {
            return None;
        }
        let n = self.scores.partition_point(|&s| s >= bucket);
        Some(if n == 0 { 0.0 } else { self.tails[n - 1] })
    }

    /// The probability of a word scoring at least `bucket`.
    pub fn pvalue_at_least(&self, bucket: i64) -> Option<f64> {
        self.weight_at_least(bucket)
            .map(|w| w / self.vocabulary_volume)
    }

    /// Find the bucket whose tail weight best matches `target`.
    ///
    /// With [`BoundaryType::Lower`], returns the lowest bucket whose tail
    /// does not exceed the target, or the highest score if every tail
    /// exceeds it. With [`BoundaryType::Upper`], returns the highest bucket
    /// whose tail reaches the target, or the lowest score if none does.
    /// The returned pair holds the bucket and its tail weight.
    pub fn bucket_by_weight(&self, target: f64, boundary: BoundaryType) -> Option<(i64, f64)> {
        if self.is_empty() {
            return None;
        }
        let i = match boundary {
            BoundaryType::Lower => {
                let upper = target * (1.0 + TOLERANCE);
                self.tails.partition_point(|&t| t <= upper).max(1) - 1
            }
            BoundaryType::Upper => {
                let lower = target * (1.0 - TOLERANCE);
                self.tails
                    .partition_point(|&t| t < lower)
                    .min(self.len() - 1)
            }
        };
        Some((self.scores[i], self.tails[i]))
    }
}

#[cfg(test)]
mod test {
    use typenum::consts::U4;

    use super::*;
    use crate::bg::Background;
    use crate::dense::DenseMatrix;

    macro_rules! assert_almost_eq {
        ($x:expr, $y:expr) => {
            assert!(($x - $y).abs() < 1e-9, "{} != {}", $x, $y)
        };
    }

    fn matrix() -> DiscreteMatrix<U4> {
        let d = Discretizer::new(1.0).unwrap();
        let m = DenseMatrix::<f64, U4>::from_rows([[2.0, 0.0, 0.0, 0.0], [0.0, 2.0, 0.0, 0.0]]);
        DiscreteMatrix::new(&m, 1, d).unwrap()
    }

    fn distribution(bg: &Background<crate::abc::Dna>, floor: Option<i64>) -> ScoreDistribution {
        let m = matrix();
        let counts = count_distribution(&m, bg, floor, None).unwrap();
        ScoreDistribution::from_counts(counts, floor, bg.vocabulary_volume(2), *m.discretizer())
    }

    #[test]
    fn count_wordwise() {
        let dist = distribution(&Background::wordwise(), None);
        assert_eq!(dist.iter().collect::<Vec<_>>(), vec![(4, 1.0), (2, 6.0), (0, 9.0)]);
        assert_eq!(dist.total_weight(), 16.0);
        assert_eq!(dist.weight_at_least(3), Some(1.0));
        assert_eq!(dist.weight_at_least(-10), Some(16.0));
        assert_eq!(dist.pvalue_at_least(4), Some(1.0 / 16.0));
    }

    #[test]
    fn count_uniform() {
        let dist = distribution(&Background::uniform(), None);
        assert_almost_eq!(dist.total_weight(), 1.0);
        assert_almost_eq!(dist.pvalue_at_least(2).unwrap(), 7.0 / 16.0);
    }

    #[test]
    fn count_pruned() {
        let dist = distribution(&Background::wordwise(), Some(2));
        assert_eq!(dist.len(), 2);
        assert_eq!(dist.weight_at_least(2), Some(7.0));
        assert_eq!(dist.weight_at_least(1), None);
    }

    #[test]
    fn count_limit() {
        let m = matrix();
        let bg = Background::<crate::abc::Dna>::wordwise();
        assert_eq!(
            count_distribution(&m, &bg, None, Some(0)),
            Err(Error::ResourceLimitExceeded {
                entries: 1,
                limit: 0
            })
        );
        assert!(count_distribution(&m, &bg, None, Some(2)).is_err());
        assert!(count_distribution(&m, &bg, None, Some(3)).is_ok());
    }

    #[test]
    fn bucket_by_weight() {
        let dist = distribution(&Background::wordwise(), None);
        assert_eq!(dist.bucket_by_weight(1.0, BoundaryType::Lower), Some((4, 1.0)));
        assert_eq!(dist.bucket_by_weight(1.0, BoundaryType::Upper), Some((4, 1.0)));
        assert_eq!(dist.bucket_by_weight(3.0, BoundaryType::Lower), Some((4, 1.0)));
        assert_eq!(dist.bucket_by_weight(3.0, BoundaryType::Upper), Some((2, 7.0)));
        assert_eq!(dist.bucket_by_weight(0.5, BoundaryType::Lower), Some((4, 1.0)));
        assert_eq!(dist.bucket_by_weight(20.0, BoundaryType::Lower), Some((0, 16.0)));
        assert_eq!(dist.bucket_by_weight(20.0, BoundaryType::Upper), Some((0, 16.0)));
    }

    #[test]
    fn moments() {
        let m = matrix();
        let (mean, var) = score_moments(&m, &Background::<crate::abc::Dna>::wordwise());
        assert_almost_eq!(mean, 1.0);
        assert_almost_eq!(var, 2.0 * 0.75);
    }
}
