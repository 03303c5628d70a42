//! Conversion between score thresholds and p-values.

use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use log::debug;
use statrs::distribution::ContinuousCDF;
use statrs::distribution::Normal;

use super::bg::BackgroundModel;
use super::discrete::DiscreteMatrix;
use super::discrete::Discretizer;
use super::dist::count_distribution;
use super::dist::score_moments;
use super::dist::ScoreDistribution;
use super::dist::TOLERANCE;
use super::err::Error;
use super::model::ScoringModel;

/// The lowest p-value used to estimate a distribution floor.
const MIN_ESTIMATE_PVALUE: f64 = 1e-12;

// --- BoundaryType ------------------------------------------------------------

/// The side a threshold search settles on when no score hits the p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BoundaryType {
    /// The threshold whose p-value is the largest one not above the target.
    #[default]
    Lower,
    /// The threshold whose p-value is the smallest one not below the target.
    Upper,
}

impl FromStr for BoundaryType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lower" | "strong" => Ok(BoundaryType::Lower),
            "upper" | "weak" => Ok(BoundaryType::Upper),
            other => Err(format!("unknown boundary type: {:?}", other)),
        }
    }
}

impl Display for BoundaryType {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            BoundaryType::Lower => f.write_str("lower"),
            BoundaryType::Upper => f.write_str("upper"),
        }
    }
}

// --- Results -----------------------------------------------------------------

/// The p-value of a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PvalueInfo {
    /// The score threshold.
    pub threshold: f64,
    /// The probability of a word scoring at least the threshold.
    pub pvalue: f64,
    /// The background weight of the words scoring at least the threshold.
    pub count: f64,
}

/// A threshold found for a requested p-value.
///
/// Because of discretization, the p-value actually achieved by the
/// threshold may differ from the requested one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdInfo {
    /// The score threshold.
    pub threshold: f64,
    /// The p-value achieved by the threshold.
    pub pvalue: f64,
    /// The background weight of the words scoring at least the threshold.
    pub count: f64,
    /// The p-value the threshold was searched for.
    pub requested_pvalue: f64,
}

impl From<ThresholdInfo> for PvalueInfo {
    fn from(info: ThresholdInfo) -> Self {
        PvalueInfo {
            threshold: info.threshold,
            pvalue: info.pvalue,
            count: info.count,
        }
    }
}

// --- Traits ------------------------------------------------------------------

/// A source of p-values for score thresholds.
pub trait FindPvalue {
    /// Get the p-value of the given threshold.
    fn pvalue_by_threshold(&self, threshold: f64) -> Result<PvalueInfo, Error>;

    /// Get the p-values of several thresholds.
    fn pvalues_by_thresholds(&self, thresholds: &[f64]) -> Result<Vec<PvalueInfo>, Error> {
        thresholds
            .iter()
            .map(|&t| self.pvalue_by_threshold(t))
            .collect()
    }
}

/// A source of score thresholds for p-values.
pub trait FindThreshold {
    /// Get the threshold matching the given p-value.
    fn threshold_by_pvalue(&self, pvalue: f64, boundary: BoundaryType)
        -> Result<ThresholdInfo, Error>;

    /// Get the thresholds matching several p-values.
    fn thresholds_by_pvalues(
        &self,
        pvalues: &[f64],
        boundary: BoundaryType,
    ) -> Result<Vec<ThresholdInfo>, Error> {
        pvalues
            .iter()
            .map(|&p| self.threshold_by_pvalue(p, boundary))
            .collect()
    }
}

fn check_pvalue(pvalue: f64) -> Result<(), Error> {
    if (0.0..=1.0).contains(&pvalue) {
        Ok(())
    } else {
        Err(Error::InvalidPvalue(pvalue))
    }
}

// --- Calculator --------------------------------------------------------------

/// A threshold and p-value calculator for a scoring model.
///
/// The calculator discretizes the model once, and builds a score
/// distribution for every query, pruned as much as the query allows.
#[derive(Debug, Clone)]
pub struct Calculator<M: ScoringModel> {
    matrix: DiscreteMatrix<M::Columns>,
    background: M::Background,
    word_len: usize,
    best_score: f64,
    worst_score: f64,
    normal: Option<Normal>,
    max_entries: Option<usize>,
}

impl<M: ScoringModel> Calculator<M> {
    /// Create a new calculator for the given model.
    pub fn new(
        model: &M,
        background: &M::Background,
        discretizer: Discretizer,
    ) -> Result<Self, Error> {
        if model.is_empty() {
            return Err(Error::EmptyModel);
        }
        let matrix = model.discretize(&discretizer)?;
        let (mean, variance) = score_moments(&matrix, background);
        Ok(Self {
            matrix,
            background: background.clone(),
            word_len: model.word_len(),
            best_score: model.best_score(),
            worst_score: model.worst_score(),
            normal: Normal::new(mean, variance.sqrt()).ok(),
            max_entries: None,
        })
    }

    /// Limit the number of entries of the distributions built.
    pub fn max_entries(mut self, limit: Option<usize>) -> Self {
        self.max_entries = limit;
        self
    }

    /// The discretized model.
    #[inline]
    pub fn matrix(&self) -> &DiscreteMatrix<M::Columns> {
        &self.matrix
    }

    /// The background used to weight words.
    #[inline]
    pub fn background(&self) -> &M::Background {
        &self.background
    }

    /// The discretizer used to build the distributions.
    #[inline]
    pub fn discretizer(&self) -> &Discretizer {
        self.matrix.discretizer()
    }

    /// The length of the words scored by the model.
    #[inline]
    pub fn word_len(&self) -> usize {
        self.word_len
    }

    /// The total weight of the words scored by the model.
    pub fn vocabulary_volume(&self) -> f64 {
        self.background.vocabulary_volume(self.word_len)
    }

    /// Build the distribution of the scores at or above `floor`.
    pub fn distribution(&self, floor: Option<i64>) -> Result<ScoreDistribution, Error> {
        let counts = count_distribution(&self.matrix, &self.background, floor, self.max_entries)?;
        Ok(ScoreDistribution::from_counts(
            counts,
            floor,
            self.vocabulary_volume(),
            *self.discretizer(),
        ))
    }

    /// Estimate the bucket scored by a fraction `pvalue` of the words.
    ///
    /// Models without score variance have no estimate and keep every score.
    fn estimate_floor(&self, pvalue: f64) -> i64 {
        let best = self.matrix.best_score();
        let worst = self.matrix.worst_score();
        let estimate = match self.normal.as_ref() {
            Some(normal) => normal.inverse_cdf(1.0 - pvalue),
            None => return worst,
        };
        if estimate.is_nan() || estimate >= best as f64 {
            best
        } else if estimate <= worst as f64 {
            worst
        } else {
            estimate.floor() as i64
        }
    }

    /// Build a distribution retaining more than a `pvalue` fraction of words.
    ///
    /// The floor is estimated from a normal approximation of the scores,
    /// and lowered until enough weight is retained to answer a threshold
    /// search for `pvalue` exactly.
    pub fn distribution_under_pvalue(&self, pvalue: f64) -> Result<ScoreDistribution, Error> {
        check_pvalue(pvalue)?;
        let target = pvalue * self.vocabulary_volume();
        let mut working = pvalue.max(MIN_ESTIMATE_PVALUE);
        while working < 1.0 {
            let floor = self.estimate_floor(working);
            let dist = self.distribution(Some(floor))?;
            if dist.total_weight() > target * (1.0 + TOLERANCE) {
                debug!(
                    "estimated floor {} for p-value {} (working p-value {})",
                    floor, pvalue, working
                );
                return Ok(dist);
            }
            working *= 2.0;
        }
        self.distribution(None)
    }

    fn out_of_range(&self, threshold: f64) -> Error {
        Error::ThresholdOutOfRange {
            threshold,
            min: self.worst_score,
            max: self.discretizer().unscale(self.matrix.best_score()),
        }
    }

    /// Get the bucket of a threshold, checking it can be reached.
    fn threshold_bucket(&self, threshold: f64) -> Result<i64, Error> {
        if !threshold.is_finite() || threshold < self.worst_score {
            return Err(self.out_of_range(threshold));
        }
        let bucket = self.discretizer().discrete(threshold)?;
        if bucket > self.matrix.best_score() {
            return Err(self.out_of_range(threshold));
        }
        Ok(bucket)
    }

    fn pvalue_info(&self, dist: &ScoreDistribution, threshold: f64, bucket: i64) -> Result<PvalueInfo, Error> {
        let count = dist
            .weight_at_least(bucket)
            .ok_or_else(|| self.out_of_range(threshold))?;
        Ok(PvalueInfo {
            threshold,
            pvalue: count / dist.vocabulary_volume(),
            count,
        })
    }

    fn threshold_info(
        &self,
        dist: &ScoreDistribution,
        pvalue: f64,
        boundary: BoundaryType,
    ) -> Result<ThresholdInfo, Error> {
        let (bucket, count) = dist
            .bucket_by_weight(pvalue * dist.vocabulary_volume(), boundary)
            .ok_or_else(|| Error::InvalidData("empty score distribution".into()))?;
        Ok(ThresholdInfo {
            threshold: self.discretizer().unscale(bucket),
            pvalue: count / dist.vocabulary_volume(),
            count,
            requested_pvalue: pvalue,
        })
    }

    /// The best score reachable by the model.
    #[inline]
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    /// The worst score reachable by the model.
    #[inline]
    pub fn worst_score(&self) -> f64 {
        self.worst_score
    }
}

impl<M: ScoringModel> FindPvalue for Calculator<M> {
    fn pvalue_by_threshold(&self, threshold: f64) -> Result<PvalueInfo, Error> {
        let bucket = self.threshold_bucket(threshold)?;
        let dist = self.distribution(Some(bucket))?;
        self.pvalue_info(&dist, threshold, bucket)
    }

    fn pvalues_by_thresholds(&self, thresholds: &[f64]) -> Result<Vec<PvalueInfo>, Error> {
        let buckets = thresholds
            .iter()
            .map(|&t| self.threshold_bucket(t))
            .collect::<Result<Vec<_>, _>>()?;
        let floor = match buckets.iter().min() {
            Some(&floor) => floor,
            None => return Ok(Vec::new()),
        };
        let dist = self.distribution(Some(floor))?;
        thresholds
            .iter()
            .zip(buckets)
            .map(|(&t, b)| self.pvalue_info(&dist, t, b))
            .collect()
    }
}

impl<M: ScoringModel> FindThreshold for Calculator<M> {
    fn threshold_by_pvalue(
        &self,
        pvalue: f64,
        boundary: BoundaryType,
    ) -> Result<ThresholdInfo, Error> {
        let dist = self.distribution_under_pvalue(pvalue)?;
        self.threshold_info(&dist, pvalue, boundary)
    }

    fn thresholds_by_pvalues(
        &self,
        pvalues: &[f64],
        boundary: BoundaryType,
    ) -> Result<Vec<ThresholdInfo>, Error> {
        for &p in pvalues {
            check_pvalue(p)?;
        }
        let max = match pvalues.iter().cloned().reduce(f64::max) {
            Some(max) => max,
            None => return Ok(Vec::new()),
        };
        let dist = self.distribution_under_pvalue(max)?;
        pvalues
            .iter()
            .map(|&p| self.threshold_info(&dist, p, boundary))
            .collect()
    }
}

// --- ThresholdTable ----------------------------------------------------------

/// A precomputed table of thresholds and their p-values.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    /// Entries sorted by increasing threshold.
    entries: Vec<(f64, f64)>,
    vocabulary_volume: f64,
}

impl ThresholdTable {
    /// Create a new table from `(threshold, pvalue)` pairs.
    ///
    /// The vocabulary volume is used to turn p-values into word counts.
    pub fn new<I>(entries: I, vocabulary_volume: f64) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut entries = entries.into_iter().collect::<Vec<_>>();
        if entries.is_empty() {
            return Err(Error::InvalidData("empty threshold table".into()));
        }
        for &(t, p) in entries.iter() {
            if !t.is_finite() {
                return Err(Error::InvalidData(format!("invalid threshold: {}", t)));
            }
            check_pvalue(p)?;
        }
        entries.sort_by(|x, y| x.0.total_cmp(&y.0));
        if entries.windows(2).any(|w| w[1].1 > w[0].1) {
            return Err(Error::InvalidData(
                "p-values increase with thresholds".into(),
            ));
        }
        Ok(Self {
            entries,
            vocabulary_volume,
        })
    }

    /// The number of entries in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `(threshold, pvalue)` entries, by increasing threshold.
    #[inline]
    pub fn entries(&self) -> &[(f64, f64)] {
        &self.entries
    }

    fn info(&self, i: usize) -> PvalueInfo {
        let (threshold, pvalue) = self.entries[i];
        PvalueInfo {
            threshold,
            pvalue,
            count: pvalue * self.vocabulary_volume,
        }
    }
}

impl FindPvalue for ThresholdTable {
    fn pvalue_by_threshold(&self, threshold: f64) -> Result<PvalueInfo, Error> {
        let n = self.entries.partition_point(|&(t, _)| t <= threshold);
        if n == 0 {
            return Err(Error::ThresholdOutOfRange {
                threshold,
                min: self.entries[0].0,
                max: self.entries[self.len() - 1].0,
            });
        }
        let info = self.info(n - 1);
        Ok(PvalueInfo { threshold, ..info })
    }
}

impl FindThreshold for ThresholdTable {
    fn threshold_by_pvalue(
        &self,
        pvalue: f64,
        boundary: BoundaryType,
    ) -> Result<ThresholdInfo, Error> {
        check_pvalue(pvalue)?;
        let i = match boundary {
            BoundaryType::Lower => {
                let upper = pvalue * (1.0 + TOLERANCE);
                self.entries
                    .partition_point(|&(_, p)| p > upper)
                    .min(self.len() - 1)
            }
            BoundaryType::Upper => {
                let lower = pvalue * (1.0 - TOLERANCE);
                self.entries.partition_point(|&(_, p)| p >= lower).max(1) - 1
            }
        };
        let info = self.info(i);
        Ok(ThresholdInfo {
            threshold: info.threshold,
            pvalue: info.pvalue,
            count: info.count,
            requested_pvalue: pvalue,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::abc::Dna;
    use crate::bg::Background;
    use crate::dense::DenseMatrix;
    use crate::bg::DiBackground;
    use crate::pwm::DiScoringMatrix;
    use crate::pwm::ScoringMatrix;

    macro_rules! assert_almost_eq {
        ($x:expr, $y:expr) => {
            assert!(($x - $y).abs() < 1e-9, "{} != {}", $x, $y)
        };
    }

    fn pwm() -> ScoringMatrix<Dna> {
        ScoringMatrix::new(DenseMatrix::from_rows([[2.0, 0.0, 0.0, 0.0], [0.0, 2.0, 0.0, 0.0]]))
            .unwrap()
    }

    fn calculator(bg: Background<Dna>) -> Calculator<ScoringMatrix<Dna>> {
        Calculator::new(&pwm(), &bg, Discretizer::new(1.0).unwrap()).unwrap()
    }

    #[test]
    fn boundary_from_str() {
        assert_eq!("lower".parse(), Ok(BoundaryType::Lower));
        assert_eq!("Upper".parse(), Ok(BoundaryType::Upper));
        assert_eq!("weak".parse(), Ok(BoundaryType::Upper));
        assert!("middle".parse::<BoundaryType>().is_err());
    }

    #[test]
    fn threshold_by_pvalue() {
        let calc = calculator(Background::uniform());
        let info = calc.threshold_by_pvalue(0.0625, BoundaryType::Lower).unwrap();
        assert_eq!(info.threshold, 4.0);
        assert_almost_eq!(info.pvalue, 0.0625);
        let info = calc.threshold_by_pvalue(0.2, BoundaryType::Upper).unwrap();
        assert_eq!(info.threshold, 2.0);
        assert_almost_eq!(info.pvalue, 7.0 / 16.0);
        let info = calc.threshold_by_pvalue(0.0, BoundaryType::Lower).unwrap();
        assert_eq!(info.threshold, 4.0);
    }

    #[test]
    fn threshold_by_pvalue_wordwise() {
        let calc = calculator(Background::wordwise());
        let info = calc.threshold_by_pvalue(0.5, BoundaryType::Lower).unwrap();
        assert_eq!(info.threshold, 2.0);
        assert_eq!(info.count, 7.0);
        assert_almost_eq!(info.pvalue, 7.0 / 16.0);
    }

    #[test]
    fn pvalue_by_threshold() {
        let calc = calculator(Background::uniform());
        assert_almost_eq!(calc.pvalue_by_threshold(4.0).unwrap().pvalue, 0.0625);
        assert_almost_eq!(calc.pvalue_by_threshold(1.5).unwrap().pvalue, 7.0 / 16.0);
        assert_almost_eq!(calc.pvalue_by_threshold(0.0).unwrap().pvalue, 1.0);
        assert!(matches!(
            calc.pvalue_by_threshold(4.5),
            Err(Error::ThresholdOutOfRange { .. })
        ));
        assert!(matches!(
            calc.pvalue_by_threshold(-1.0),
            Err(Error::ThresholdOutOfRange { .. })
        ));
    }

    #[test]
    fn pvalue_by_threshold_dinucleotide() {
        // row maxima sum to 6, but the best chain A-C-A only scores 5
        let mut data = DenseMatrix::<f64, typenum::consts::U16>::new(2);
        data[0][1] = 2.0;
        data[1][4] = 3.0;
        data[1][15] = 4.0;
        let di = DiScoringMatrix::<Dna>::new(data).unwrap();
        let bg = DiBackground::wordwise();
        let calc = Calculator::new(&di, &bg, Discretizer::new(1.0).unwrap()).unwrap();
        assert_eq!(calc.pvalue_by_threshold(5.0).unwrap().count, 1.0);
        match calc.pvalue_by_threshold(5.5) {
            Err(Error::ThresholdOutOfRange { max, .. }) => assert_eq!(max, 5.0),
            other => panic!("unexpected result: {:?}", other),
        }
        let info = calc.threshold_by_pvalue(0.0, BoundaryType::Lower).unwrap();
        assert_eq!(info.threshold, 5.0);
    }

    #[test]
    fn constant_model() {
        let m = ScoringMatrix::<Dna>::new(DenseMatrix::from_rows([[1.0; 4], [1.0; 4]])).unwrap();
        let calc = Calculator::new(&m, &Background::uniform(), Discretizer::new(1.0).unwrap()).unwrap();
        let info = calc.threshold_by_pvalue(0.01, BoundaryType::Lower).unwrap();
        assert_eq!(info.threshold, 2.0);
        assert_almost_eq!(info.pvalue, 1.0);
    }

    #[test]
    fn invalid_pvalue() {
        let calc = calculator(Background::uniform());
        assert_eq!(
            calc.threshold_by_pvalue(1.5, BoundaryType::Lower),
            Err(Error::InvalidPvalue(1.5))
        );
        assert!(calc.threshold_by_pvalue(f64::NAN, BoundaryType::Lower).is_err());
    }

    #[test]
    fn batched() {
        let calc = calculator(Background::uniform());
        let infos = calc
            .thresholds_by_pvalues(&[0.0625, 0.5, 1.0], BoundaryType::Lower)
            .unwrap();
        let single = [0.0625, 0.5, 1.0].map(|p| calc.threshold_by_pvalue(p, BoundaryType::Lower).unwrap());
        assert_eq!(infos, single.to_vec());

        let infos = calc.pvalues_by_thresholds(&[4.0, 2.0, 0.0]).unwrap();
        assert_almost_eq!(infos[0].pvalue, 1.0 / 16.0);
        assert_almost_eq!(infos[1].pvalue, 7.0 / 16.0);
        assert_almost_eq!(infos[2].pvalue, 1.0);
        assert!(calc.pvalues_by_thresholds(&[]).unwrap().is_empty());
    }

    #[test]
    fn resource_limit() {
        let calc = calculator(Background::uniform()).max_entries(Some(0));
        assert!(matches!(
            calc.threshold_by_pvalue(0.1, BoundaryType::Lower),
            Err(Error::ResourceLimitExceeded { .. })
        ));
    }

    #[test]
    fn table() {
        let table = ThresholdTable::new(vec![(4.0, 0.0625), (0.0, 1.0), (2.0, 0.4375)], 16.0).unwrap();
        assert_eq!(table.pvalue_by_threshold(3.0).unwrap().pvalue, 0.4375);
        assert_eq!(table.pvalue_by_threshold(10.0).unwrap().pvalue, 0.0625);
        assert_eq!(table.pvalue_by_threshold(2.0).unwrap().count, 7.0);
        assert!(table.pvalue_by_threshold(-1.0).is_err());

        let lower = table.threshold_by_pvalue(0.2, BoundaryType::Lower).unwrap();
        assert_eq!(lower.threshold, 4.0);
        let upper = table.threshold_by_pvalue(0.2, BoundaryType::Upper).unwrap();
        assert_eq!(upper.threshold, 2.0);
        let lower = table.threshold_by_pvalue(0.01, BoundaryType::Lower).unwrap();
        assert_eq!(lower.threshold, 4.0);
        let upper = table.threshold_by_pvalue(1.0, BoundaryType::Upper).unwrap();
        assert_eq!(upper.threshold, 0.0);
        assert!(ThresholdTable::new(Vec::new(), 1.0).is_err());
    }
}
