//! Jaccard similarity between scoring models.
//!
//! Two models are compared by the words they both recognize: given a
//! threshold for each model and an alignment, the similarity is the weight
//! of the words recognized by both models over the weight of the words
//! recognized by either of them.

use log::debug;

use super::bg::BackgroundModel;
use super::discrete::Discretizer;
use super::err::Error;
use super::model::ReverseComplement;
use super::model::ScoringModel;
use super::pair::intersection_counts;
use super::pair::Alignment;
use super::pair::Orientation;
use super::threshold::BoundaryType;
use super::threshold::Calculator;
use super::threshold::FindPvalue;
use super::threshold::FindThreshold;
use super::threshold::PvalueInfo;

// --- SimilarityInfo ----------------------------------------------------------

/// The words recognized by two aligned models.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityInfo {
    /// The weight of the words recognized by both models.
    pub recognized_by_both: f64,
    /// The weight of the words recognized by the first model.
    pub recognized_by_first: f64,
    /// The weight of the words recognized by the second model.
    pub recognized_by_second: f64,
    /// The total weight of the aligned words under the first background.
    pub first_vocabulary_volume: Option<f64>,
    /// The total weight of the aligned words under the second background.
    pub second_vocabulary_volume: Option<f64>,
    /// The alignment the words were counted for, if known.
    pub alignment: Option<Alignment>,
}

impl SimilarityInfo {
    /// The Jaccard similarity of the recognized words.
    ///
    /// Undefined when either model recognizes no word.
    pub fn similarity(&self) -> Option<f64> {
        if self.recognized_by_first == 0.0 || self.recognized_by_second == 0.0 {
            return None;
        }
        let union = self.recognized_by_first + self.recognized_by_second - self.recognized_by_both;
        Some(self.recognized_by_both / union)
    }

    /// The Jaccard distance of the recognized words.
    pub fn distance(&self) -> Option<f64> {
        self.similarity().map(|s| 1.0 - s)
    }

    /// The fraction of aligned words recognized by the first model.
    pub fn real_pvalue_first(&self) -> Option<f64> {
        self.first_vocabulary_volume
            .map(|v| self.recognized_by_first / v)
    }

    /// The fraction of aligned words recognized by the second model.
    pub fn real_pvalue_second(&self) -> Option<f64> {
        self.second_vocabulary_volume
            .map(|v| self.recognized_by_second / v)
    }
}

// --- CompareModels -----------------------------------------------------------

/// A comparison of two scoring models at a given discretization.
#[derive(Debug, Clone)]
pub struct CompareModels<M: ScoringModel> {
    first: Calculator<M>,
    second: Calculator<M>,
    second_reverse: Option<Calculator<M>>,
    first_len: usize,
    second_len: usize,
    max_pair_entries: Option<usize>,
}

impl<M: ScoringModel + ReverseComplement> CompareModels<M> {
    /// Compare two models on both strands.
    pub fn new(
        first: &M,
        second: &M,
        first_background: &M::Background,
        second_background: &M::Background,
        discretizer: Discretizer,
    ) -> Result<Self, Error> {
        let mut cmp = Self::direct(first, second, first_background, second_background, discretizer)?;
        cmp.second_reverse = Some(Calculator::new(
            &second.reverse_complement(),
            second_background,
            discretizer,
        )?);
        Ok(cmp)
    }
}

impl<M: ScoringModel> CompareModels<M> {
    /// Compare two models on the direct strand only.
    pub fn direct(
        first: &M,
        second: &M,
        first_background: &M::Background,
        second_background: &M::Background,
        discretizer: Discretizer,
    ) -> Result<Self, Error> {
        Ok(Self {
            first: Calculator::new(first, first_background, discretizer)?,
            second: Calculator::new(second, second_background, discretizer)?,
            second_reverse: None,
            first_len: first.len(),
            second_len: second.len(),
            max_pair_entries: None,
        })
    }

    /// Limit the number of entries of single model distributions.
    pub fn max_entries(mut self, limit: Option<usize>) -> Self {
        self.first = self.first.max_entries(limit);
        self.second = self.second.max_entries(limit);
        self.second_reverse = self.second_reverse.map(|c| c.max_entries(limit));
        self
    }

    /// Limit the number of entries of joint distributions.
    pub fn max_pair_entries(mut self, limit: Option<usize>) -> Self {
        self.max_pair_entries = limit;
        self
    }

    /// The calculator of the first model.
    pub fn first(&self) -> &Calculator<M> {
        &self.first
    }

    /// The calculator of the second model.
    pub fn second(&self) -> &Calculator<M> {
        &self.second
    }

    /// Every alignment considered when searching for the best one.
    pub fn alignments(&self) -> Vec<Alignment> {
        Alignment::all(
            self.first_len,
            self.second_len,
            self.second_reverse.is_some(),
        )
    }

    fn second_for(&self, orientation: Orientation) -> Result<&Calculator<M>, Error> {
        match orientation {
            Orientation::Direct => Ok(&self.second),
            Orientation::Reverse => self.second_reverse.as_ref().ok_or_else(|| {
                Error::InvalidData("reverse orientation is not available".into())
            }),
        }
    }

    /// Compute the similarity at an alignment, given each model's counts.
    ///
    /// The counts are the weights of the words recognized by each model on
    /// its own length, as computed for the given thresholds. The count of
    /// the second model must be taken on the strand of the alignment, see
    /// [`CompareModels::second_info`].
    pub fn jaccard_given_at(
        &self,
        alignment: &Alignment,
        first: &PvalueInfo,
        second: &PvalueInfo,
    ) -> Result<SimilarityInfo, Error> {
        let expected = Alignment::new(
            self.first_len,
            self.second_len,
            alignment.shift(),
            alignment.orientation(),
        );
        if *alignment != expected {
            return Err(Error::InvalidData(format!(
                "alignment {:?} does not fit models of length {} and {}",
                alignment, self.first_len, self.second_len
            )));
        }
        let second_calc = self.second_for(alignment.orientation())?;
        let discretizer = self.first.discretizer();
        let (l1, r1) = alignment.first_padding();
        let (l2, r2) = alignment.second_padding();
        let m1 = self.first.matrix().padded(l1, r1);
        let m2 = second_calc.matrix().padded(l2, r2);
        let t1 = discretizer.discrete(first.threshold)?;
        let t2 = discretizer.discrete(second.threshold)?;

        let bg1 = self.first.background();
        let bg2 = second_calc.background();
        let (i1, i2) = intersection_counts(&m1, &m2, (t1, t2), (bg1, bg2), self.max_pair_entries)?;

        // the padded models score longer words than the original ones
        let extra = alignment.length() - self.first_len;
        let f = first.count * bg1.volume().powi(extra as i32);
        let extra = alignment.length() - self.second_len;
        let s = second.count * bg2.volume().powi(extra as i32);
        let both = (i1 * i2).sqrt().min(f).min(s);

        let word_len = self.first.word_len() + alignment.length() - self.first_len;
        Ok(SimilarityInfo {
            recognized_by_both: both,
            recognized_by_first: f,
            recognized_by_second: s,
            first_vocabulary_volume: Some(bg1.vocabulary_volume(word_len)),
            second_vocabulary_volume: Some(bg2.vocabulary_volume(word_len)),
            alignment: Some(*alignment),
        })
    }

    /// Get the count of the second model on the strand of `orientation`.
    ///
    /// `second` is the count on the direct strand. Wordwise backgrounds
    /// weight a word and its reverse complement equally, so the count is
    /// only recomputed for weighted backgrounds.
    pub fn second_info(
        &self,
        orientation: Orientation,
        second: &PvalueInfo,
    ) -> Result<PvalueInfo, Error> {
        let calc = self.second_for(orientation)?;
        match orientation {
            Orientation::Reverse if !calc.background().is_wordwise() => {
                calc.pvalue_by_threshold(second.threshold)
            }
            _ => Ok(*second),
        }
    }

    /// Compute the similarity at the best alignment, given the counts.
    ///
    /// `second` is the count of the second model on the direct strand.
    /// The best alignment is the first one reaching the highest defined
    /// similarity, in the order of [`CompareModels::alignments`]. If no
    /// alignment has a defined similarity, the first one is reported.
    pub fn jaccard_given(
        &self,
        first: &PvalueInfo,
        second: &PvalueInfo,
    ) -> Result<SimilarityInfo, Error> {
        let second_reverse = match self.second_reverse {
            Some(_) => Some(self.second_info(Orientation::Reverse, second)?),
            None => None,
        };
        let mut best: Option<SimilarityInfo> = None;
        let mut best_similarity = None;
        for alignment in self.alignments() {
            let oriented = match (alignment.orientation(), second_reverse.as_ref()) {
                (Orientation::Reverse, Some(info)) => info,
                _ => second,
            };
            let info = self.jaccard_given_at(&alignment, first, oriented)?;
            match (info.similarity(), best_similarity) {
                (Some(s), Some(b)) if s <= b => (),
                (Some(s), _) => {
                    best_similarity = Some(s);
                    best = Some(info);
                }
                (None, _) => {
                    if best.is_none() {
                        best = Some(info);
                    }
                }
            }
        }
        if let Some(info) = best.as_ref() {
            debug!(
                "best alignment {:?} with similarity {:?}",
                info.alignment,
                info.similarity()
            );
        }
        best.ok_or_else(|| Error::InvalidData("no alignment to compare".into()))
    }

    /// Compute the similarity at an alignment for the given thresholds.
    pub fn jaccard_at(
        &self,
        alignment: &Alignment,
        first_threshold: f64,
        second_threshold: f64,
    ) -> Result<SimilarityInfo, Error> {
        let first = self.first.pvalue_by_threshold(first_threshold)?;
        let second = self.second.pvalue_by_threshold(second_threshold)?;
        let second = self.second_info(alignment.orientation(), &second)?;
        self.jaccard_given_at(alignment, &first, &second)
    }

    /// Compute the similarity at the best alignment for the given thresholds.
    pub fn jaccard(&self, first_threshold: f64, second_threshold: f64) -> Result<SimilarityInfo, Error> {
        let first = self.first.pvalue_by_threshold(first_threshold)?;
        let second = self.second.pvalue_by_threshold(second_threshold)?;
        self.jaccard_given(&first, &second)
    }

    /// Compute the similarity at the best alignment for a given p-value.
    ///
    /// Each model is thresholded at the score matching the p-value.
    pub fn jaccard_by_pvalue(&self, pvalue: f64, boundary: BoundaryType) -> Result<SimilarityInfo, Error> {
        let first = self.first.threshold_by_pvalue(pvalue, boundary)?;
        let second = self.second.threshold_by_pvalue(pvalue, boundary)?;
        self.jaccard_given(&first.into(), &second.into())
    }
}
