//! Comparison of a query model against a collection of models.

use log::debug;
use log::warn;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::config::Config;
use super::discrete::Discretizer;
use super::err::Error;
use super::model::ReverseComplement;
use super::model::ScoringModel;
use super::similarity::CompareModels;
use super::similarity::SimilarityInfo;
use super::threshold::BoundaryType;
use super::threshold::Calculator;
use super::threshold::FindPvalue;
use super::threshold::FindThreshold;
use super::threshold::PvalueInfo;
use super::threshold::ThresholdInfo;
use super::threshold::ThresholdTable;

// --- Evaluator ---------------------------------------------------------------

/// A source of thresholds and p-values for a model of the collection.
#[derive(Debug, Clone)]
pub enum Evaluator<M: ScoringModel> {
    /// Values computed from the score distribution of the model.
    Computed(Calculator<M>),
    /// Values looked up in a precomputed table.
    Table(ThresholdTable),
}

impl<M: ScoringModel> FindPvalue for Evaluator<M> {
    fn pvalue_by_threshold(&self, threshold: f64) -> Result<PvalueInfo, Error> {
        match self {
            Evaluator::Computed(calc) => calc.pvalue_by_threshold(threshold),
            Evaluator::Table(table) => table.pvalue_by_threshold(threshold),
        }
    }

    fn pvalues_by_thresholds(&self, thresholds: &[f64]) -> Result<Vec<PvalueInfo>, Error> {
        match self {
            Evaluator::Computed(calc) => calc.pvalues_by_thresholds(thresholds),
            Evaluator::Table(table) => table.pvalues_by_thresholds(thresholds),
        }
    }
}

impl<M: ScoringModel> FindThreshold for Evaluator<M> {
    fn threshold_by_pvalue(
        &self,
        pvalue: f64,
        boundary: BoundaryType,
    ) -> Result<ThresholdInfo, Error> {
        match self {
            Evaluator::Computed(calc) => calc.threshold_by_pvalue(pvalue, boundary),
            Evaluator::Table(table) => table.threshold_by_pvalue(pvalue, boundary),
        }
    }
}

impl<M: ScoringModel> From<Calculator<M>> for Evaluator<M> {
    fn from(calc: Calculator<M>) -> Self {
        Evaluator::Computed(calc)
    }
}

impl<M: ScoringModel> From<ThresholdTable> for Evaluator<M> {
    fn from(table: ThresholdTable) -> Self {
        Evaluator::Table(table)
    }
}

// --- CandidateEvaluator ------------------------------------------------------

/// A model of the collection with its threshold sources.
#[derive(Debug, Clone)]
pub struct CandidateEvaluator<M: ScoringModel> {
    name: String,
    model: M,
    rough: Evaluator<M>,
    precise: Option<Evaluator<M>>,
}

impl<M: ScoringModel> CandidateEvaluator<M> {
    /// Create a new candidate with the given threshold sources.
    ///
    /// Without a precise source, the candidate is never recalculated.
    pub fn new<S: Into<String>>(
        name: S,
        model: M,
        rough: Evaluator<M>,
        precise: Option<Evaluator<M>>,
    ) -> Self {
        Self {
            name: name.into(),
            model,
            rough,
            precise,
        }
    }

    /// Create a new candidate computing thresholds at both discretizations.
    pub fn computed<S: Into<String>>(
        name: S,
        model: M,
        background: &M::Background,
        config: &Config,
    ) -> Result<Self, Error> {
        let calculator = |d: Discretizer| -> Result<Evaluator<M>, Error> {
            Ok(Calculator::new(&model, background, d)?
                .max_entries(config.max_distribution_entries)
                .into())
        };
        let rough = calculator(config.rough_discretizer()?)?;
        let precise = calculator(config.precise_discretizer()?)?;
        Ok(Self::new(name, model, rough, Some(precise)))
    }

    /// The name of the candidate.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The model of the candidate.
    #[inline]
    pub fn model(&self) -> &M {
        &self.model
    }
}

// --- ScanHit -----------------------------------------------------------------

/// A candidate similar enough to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanHit {
    /// The index of the candidate in the collection.
    pub index: usize,
    /// The name of the candidate.
    pub name: String,
    /// The similarity of the query and the candidate.
    pub info: SimilarityInfo,
    /// Whether the similarity was recalculated with the precise discretizer.
    pub precise: bool,
}

/// A candidate whose comparison failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("failed to compare with {name:?}: {error}")]
pub struct CandidateError {
    /// The index of the candidate in the collection.
    pub index: usize,
    /// The name of the candidate.
    pub name: String,
    /// The error raised by the comparison.
    #[source]
    pub error: Error,
}

fn reaches(similarity: Option<f64>, cutoff: f64) -> bool {
    similarity.map(|s| s >= cutoff).unwrap_or(false)
}

// --- ScanCollection ----------------------------------------------------------

/// The comparison of a query against a collection of candidates.
///
/// Every candidate is first compared at the rough discretization; those
/// reaching the recalculation cutoff are compared again at the precise
/// one when they have a precise threshold source. Candidates below the
/// similarity cutoff are dropped.
#[derive(Debug, Clone)]
pub struct ScanCollection<'a, M: ScoringModel> {
    query: &'a M,
    candidates: &'a [CandidateEvaluator<M>],
    background: &'a M::Background,
    config: &'a Config,
    query_threshold: Option<f64>,
}

impl<'a, M: ScoringModel + ReverseComplement> ScanCollection<'a, M> {
    /// Create a new scan of the candidates with the given query.
    pub fn new(
        query: &'a M,
        candidates: &'a [CandidateEvaluator<M>],
        background: &'a M::Background,
        config: &'a Config,
    ) -> Self {
        Self {
            query,
            candidates,
            background,
            config,
            query_threshold: None,
        }
    }

    /// Use a fixed threshold for the query instead of the p-value.
    pub fn query_threshold(mut self, threshold: Option<f64>) -> Self {
        self.query_threshold = threshold;
        self
    }

    fn query_info(&self, discretizer: Discretizer) -> Result<PvalueInfo, Error> {
        let calc = Calculator::new(self.query, self.background, discretizer)?
            .max_entries(self.config.max_distribution_entries);
        match self.query_threshold {
            Some(t) => calc.pvalue_by_threshold(t),
            None => calc
                .threshold_by_pvalue(self.config.pvalue, self.config.boundary)
                .map(PvalueInfo::from),
        }
    }

    fn compare(
        &self,
        candidate: &CandidateEvaluator<M>,
        evaluator: &Evaluator<M>,
        query: &PvalueInfo,
        discretizer: Discretizer,
    ) -> Result<SimilarityInfo, Error> {
        let info: PvalueInfo = evaluator
            .threshold_by_pvalue(self.config.pvalue, self.config.boundary)?
            .into();
        CompareModels::new(
            self.query,
            &candidate.model,
            self.background,
            self.background,
            discretizer,
        )?
        .max_entries(self.config.max_distribution_entries)
        .max_pair_entries(self.config.max_pair_entries)
        .jaccard_given(query, &info)
    }

    fn scan_candidate(
        &self,
        index: usize,
        candidate: &CandidateEvaluator<M>,
        rough_query: &PvalueInfo,
        precise_query: Option<&PvalueInfo>,
    ) -> Result<Option<ScanHit>, Error> {
        let rough = self.config.rough_discretizer()?;
        let mut info = self.compare(candidate, &candidate.rough, rough_query, rough)?;
        let mut precise = false;

        if let (Some(cutoff), Some(evaluator), Some(query)) = (
            self.config.recalculation_cutoff,
            candidate.precise.as_ref(),
            precise_query,
        ) {
            if reaches(info.similarity(), cutoff) {
                let d = self.config.precise_discretizer()?;
                info = self.compare(candidate, evaluator, query, d)?;
                precise = true;
            }
        }

        if let Some(cutoff) = self.config.similarity_cutoff {
            if !reaches(info.similarity(), cutoff) {
                debug!("dropping {:?} with similarity {:?}", candidate.name, info.similarity());
                return Ok(None);
            }
        }

        Ok(Some(ScanHit {
            index,
            name: candidate.name.clone(),
            info,
            precise,
        }))
    }

    /// Compare the query with every candidate.
    ///
    /// Results follow the order of the collection. A failure on a
    /// candidate is reported in place of its result, while a failure on
    /// the query aborts the whole scan.
    pub fn similarity_infos(&self) -> Result<Vec<Result<ScanHit, CandidateError>>, Error> {
        let rough_query = self.query_info(self.config.rough_discretizer()?)?;
        let needs_precise = self.config.recalculation_cutoff.is_some()
            && self.candidates.iter().any(|c| c.precise.is_some());
        let precise_query = if needs_precise {
            Some(self.query_info(self.config.precise_discretizer()?)?)
        } else {
            None
        };

        let scan = |(index, candidate): (usize, &CandidateEvaluator<M>)| {
            self.scan_candidate(index, candidate, &rough_query, precise_query.as_ref())
        };
        #[cfg(feature = "parallel")]
        let results = self.candidates.par_iter().enumerate().map(scan).collect::<Vec<_>>();
        #[cfg(not(feature = "parallel"))]
        let results = self.candidates.iter().enumerate().map(scan).collect::<Vec<_>>();

        Ok(results
            .into_iter()
            .zip(self.candidates)
            .enumerate()
            .filter_map(|(index, (result, candidate))| match result {
                Ok(hit) => hit.map(Ok),
                Err(error) => {
                    warn!("failed to compare with {:?}: {}", candidate.name, error);
                    Some(Err(CandidateError {
                        index,
                        name: candidate.name.clone(),
                        error,
                    }))
                }
            })
            .collect())
    }
}

// --- Distance matrix ---------------------------------------------------------

/// Compute the distances between every pair of models.
///
/// Models are thresholded at the configured p-value with the rough
/// discretizer, and compared at their best alignment. Distances are
/// undefined for pairs whose similarity is undefined or whose comparison
/// failed; a failure to threshold a model aborts the computation.
pub fn collect_distance_matrix<M>(
    models: &[M],
    background: &M::Background,
    config: &Config,
) -> Result<Vec<Vec<Option<f64>>>, Error>
where
    M: ScoringModel + ReverseComplement,
{
    let discretizer = config.rough_discretizer()?;
    let infos = models
        .iter()
        .map(|m| {
            Calculator::new(m, background, discretizer)?
                .max_entries(config.max_distribution_entries)
                .threshold_by_pvalue(config.pvalue, config.boundary)
                .map(PvalueInfo::from)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pairs = (0..models.len())
        .flat_map(|i| (i + 1..models.len()).map(move |j| (i, j)))
        .collect::<Vec<_>>();
    let distance = |&(i, j): &(usize, usize)| {
        let result = CompareModels::new(&models[i], &models[j], background, background, discretizer)
            .map(|cmp| {
                cmp.max_entries(config.max_distribution_entries)
                    .max_pair_entries(config.max_pair_entries)
            })
            .and_then(|cmp| cmp.jaccard_given(&infos[i], &infos[j]));
        match result {
            Ok(info) => info.distance(),
            Err(e) => {
                warn!("failed to compare models {} and {}: {}", i, j, e);
                None
            }
        }
    };
    #[cfg(feature = "parallel")]
    let distances = pairs.par_iter().map(distance).collect::<Vec<_>>();
    #[cfg(not(feature = "parallel"))]
    let distances = pairs.iter().map(distance).collect::<Vec<_>>();

    let mut matrix = vec![vec![None; models.len()]; models.len()];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[i] = Some(0.0);
    }
    for (&(i, j), d) in pairs.iter().zip(distances) {
        matrix[i][j] = d;
        matrix[j][i] = d;
    }
    Ok(matrix)
}
