//! Joint score distributions of two aligned models.

use std::fmt::Display;
use std::fmt::Formatter;
use std::str::FromStr;

use log::debug;
use log::trace;
use typenum::marker_traits::Unsigned;

use super::bg::BackgroundModel;
use super::discrete::DiscreteMatrix;
use super::dist::check_limit;
use super::dist::initial_maps;
use super::err::Error;
use super::hash::pack;
use super::hash::unpack;
use super::hash::IntMap;

// --- Orientation -------------------------------------------------------------

/// The strand of the second model in an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// The second model is used as is.
    Direct,
    /// The second model is reverse-complemented.
    Reverse,
}

impl FromStr for Orientation {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" | "+" => Ok(Orientation::Direct),
            "revcomp" | "reverse" | "-" => Ok(Orientation::Reverse),
            other => Err(format!("unknown orientation: {:?}", other)),
        }
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Orientation::Direct => f.write_str("direct"),
            Orientation::Reverse => f.write_str("revcomp"),
        }
    }
}

// --- Alignment ---------------------------------------------------------------

/// The relative placement of two models.
///
/// The second model starts `shift` positions after the first one (before
/// it when `shift` is negative). Both models are padded with zero-scoring
/// positions so that they cover the whole span of the alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Alignment {
    shift: isize,
    orientation: Orientation,
    first_len: usize,
    second_len: usize,
}

impl Alignment {
    /// Create a new alignment of models of the given lengths.
    pub fn new(first_len: usize, second_len: usize, shift: isize, orientation: Orientation) -> Self {
        Self {
            shift,
            orientation,
            first_len,
            second_len,
        }
    }

    /// Enumerate every alignment where the models overlap.
    ///
    /// Direct alignments come first, by increasing shift, followed by the
    /// reverse alignments when `both_strands` is set.
    pub fn all(first_len: usize, second_len: usize, both_strands: bool) -> Vec<Self> {
        let shifts = -(second_len as isize - 1)..=(first_len as isize - 1);
        let mut orientations = vec![Orientation::Direct];
        if both_strands {
            orientations.push(Orientation::Reverse);
        }
        orientations
            .into_iter()
            .flat_map(|o| shifts.clone().map(move |d| Self::new(first_len, second_len, d, o)))
            .collect()
    }

    /// The position of the second model relative to the first one.
    #[inline]
    pub fn shift(&self) -> isize {
        self.shift
    }

    /// The orientation of the second model.
    #[inline]
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// The number of positions spanned by both models together.
    pub fn length(&self) -> usize {
        let start = self.shift.min(0);
        let end = (self.first_len as isize).max(self.shift + self.second_len as isize);
        (end - start) as usize
    }

    /// The number of positions covered by both models.
    pub fn overlap(&self) -> usize {
        let start = self.shift.max(0);
        let end = (self.first_len as isize).min(self.shift + self.second_len as isize);
        (end - start).max(0) as usize
    }

    /// The padding of the first model, on the left and on the right.
    pub fn first_padding(&self) -> (usize, usize) {
        let left = (-self.shift).max(0) as usize;
        (left, self.length() - left - self.first_len)
    }

    /// The padding of the second model, on the left and on the right.
    pub fn second_padding(&self) -> (usize, usize) {
        let left = self.shift.max(0) as usize;
        (left, self.length() - left - self.second_len)
    }

    /// Get the equivalent alignment with the models swapped.
    ///
    /// A reverse alignment is mirrored so that the new second model, which
    /// is the old first one, is the one reverse-complemented.
    pub fn swapped(&self) -> Self {
        let shift = match self.orientation {
            Orientation::Direct => -self.shift,
            Orientation::Reverse => {
                self.shift + self.second_len as isize - self.first_len as isize
            }
        };
        Self::new(self.second_len, self.first_len, shift, self.orientation)
    }
}

// --- Pairwise convolution ----------------------------------------------------

/// Count the words scoring at least both thresholds on two aligned models.
///
/// Both matrices must already be padded to the same length. Pairs of
/// scores are packed in a single key, and pruned independently on each
/// side once they cannot reach their threshold anymore.
fn convolve<C, B>(
    first: &DiscreteMatrix<C>,
    second: &DiscreteMatrix<C>,
    first_threshold: i64,
    second_threshold: i64,
    background: &B,
    weighted: bool,
    limit: Option<usize>,
) -> Result<f64, Error>
where
    C: Unsigned,
    B: BackgroundModel,
{
    debug_assert_eq!(first.len(), second.len());
    debug_assert_eq!(first.contexts(), second.contexts());

    let first_bounds = first.suffix_bounds();
    let second_bounds = second.suffix_bounds();
    let symbols = first.symbols();

    let mut current = initial_maps(first.contexts(), background, pack(0, 0));
    check_limit(&current, limit)?;

    for pos in 0..first.len() {
        let first_least = first_threshold - first_bounds.best_suffix(pos + 1);
        let second_least = second_threshold - second_bounds.best_suffix(pos + 1);
        let mut next = vec![IntMap::default(); first.contexts()];
        for (ctx, scores) in current.iter().enumerate() {
            for sym in 0..symbols {
                let w = background.transition_weight(ctx, sym);
                if w == 0.0 {
                    continue;
                }
                let s1 = first.score(pos, ctx, sym);
                let s2 = second.score(pos, ctx, sym);
                let dst: &mut IntMap<f64> = &mut next[first.next_context(ctx, sym)];
                for (&key, &weight) in scores.iter() {
                    let (x, y) = unpack(key);
                    let (x, y) = (x + s1, y + s2);
                    if x < first_least || y < second_least {
                        continue;
                    }
                    let added = if weighted { weight * w } else { weight };
                    *dst.entry(pack(x, y)).or_default() += added;
                }
            }
        }
        current = next;
        trace!(
            "position {}: {} score pairs",
            pos,
            current.iter().map(|m| m.len()).sum::<usize>()
        );
        check_limit(&current, limit)?;
    }

    Ok(current.iter().flat_map(|m| m.values()).sum())
}

/// Count the words recognized by both models under a single background.
pub(crate) fn count_intersection<C, B>(
    first: &DiscreteMatrix<C>,
    second: &DiscreteMatrix<C>,
    first_threshold: i64,
    second_threshold: i64,
    background: &B,
    limit: Option<usize>,
) -> Result<f64, Error>
where
    C: Unsigned,
    B: BackgroundModel,
{
    convolve(
        first,
        second,
        first_threshold,
        second_threshold,
        background,
        !background.is_wordwise(),
        limit,
    )
}

/// Count the words recognized by both models under each background.
///
/// Matching backgrounds need a single pass; otherwise the intersection is
/// counted once per background since they weight different universes.
pub(crate) fn intersection_counts<C, B>(
    first: &DiscreteMatrix<C>,
    second: &DiscreteMatrix<C>,
    thresholds: (i64, i64),
    backgrounds: (&B, &B),
    limit: Option<usize>,
) -> Result<(f64, f64), Error>
where
    C: Unsigned,
    B: BackgroundModel,
{
    let (t1, t2) = thresholds;
    let (bg1, bg2) = backgrounds;
    if bg1.matches(bg2) {
        let count = count_intersection(first, second, t1, t2, bg1, limit)?;
        debug!("intersection over {} positions: {}", first.len(), count);
        Ok((count, count))
    } else {
        let c1 = count_intersection(first, second, t1, t2, bg1, limit)?;
        let c2 = count_intersection(first, second, t1, t2, bg2, limit)?;
        debug!(
            "intersection over {} positions: {} and {}",
            first.len(),
            c1,
            c2
        );
        Ok((c1, c2))
    }
}

#[cfg(test)]
mod test {
    use typenum::consts::U4;

    use super::*;
    use crate::abc::Dna;
    use crate::bg::Background;
    use crate::dense::DenseMatrix;
    use crate::discrete::Discretizer;

    fn discrete(rows: &[[f64; 4]]) -> DiscreteMatrix<U4> {
        let d = Discretizer::new(1.0).unwrap();
        DiscreteMatrix::new(&DenseMatrix::from_rows(rows), 1, d).unwrap()
    }

    #[test]
    fn alignment_geometry() {
        let a = Alignment::new(5, 3, 1, Orientation::Direct);
        assert_eq!(a.length(), 5);
        assert_eq!(a.overlap(), 3);
        assert_eq!(a.first_padding(), (0, 0));
        assert_eq!(a.second_padding(), (1, 1));

        let a = Alignment::new(3, 4, -2, Orientation::Direct);
        assert_eq!(a.length(), 5);
        assert_eq!(a.overlap(), 2);
        assert_eq!(a.first_padding(), (2, 0));
        assert_eq!(a.second_padding(), (0, 1));
        assert!(a.length() >= 4);
    }

    #[test]
    fn alignment_swapped() {
        let a = Alignment::new(3, 4, -2, Orientation::Direct);
        let b = a.swapped();
        assert_eq!(b.shift(), 2);
        assert_eq!(b.length(), a.length());
        assert_eq!(b.swapped(), a);

        let r = Alignment::new(5, 2, 1, Orientation::Reverse);
        let s = r.swapped();
        assert_eq!(s.shift(), -2);
        assert_eq!(s.length(), r.length());
        assert_eq!(s.overlap(), r.overlap());
        assert_eq!(s.swapped(), r);
    }

    #[test]
    fn alignment_all() {
        let all = Alignment::all(3, 2, true);
        assert_eq!(all.len(), 8);
        assert_eq!(all[0].shift(), -1);
        assert_eq!(all[3].shift(), 2);
        assert_eq!(all[4].orientation(), Orientation::Reverse);
        assert!(all.iter().all(|a| a.overlap() > 0));
        assert_eq!(Alignment::all(3, 2, false).len(), 4);
    }

    #[test]
    fn orientation_from_str() {
        assert_eq!("direct".parse(), Ok(Orientation::Direct));
        assert_eq!("revcomp".parse(), Ok(Orientation::Reverse));
        assert!("sideways".parse::<Orientation>().is_err());
    }

    #[test]
    fn intersection_identical() {
        let m = discrete(&[[2.0, 0.0, 0.0, 0.0], [0.0, 2.0, 0.0, 0.0]]);
        let bg = Background::<Dna>::wordwise();
        assert_eq!(count_intersection(&m, &m, 4, 4, &bg, None), Ok(1.0));
        assert_eq!(count_intersection(&m, &m, 2, 2, &bg, None), Ok(7.0));
        assert_eq!(count_intersection(&m, &m, 2, 4, &bg, None), Ok(1.0));
    }

    #[test]
    fn intersection_disjoint() {
        let m1 = discrete(&[[2.0, 0.0, 0.0, 0.0]]);
        let m2 = discrete(&[[0.0, 2.0, 0.0, 0.0]]);
        let bg = Background::<Dna>::wordwise();
        assert_eq!(count_intersection(&m1, &m2, 2, 2, &bg, None), Ok(0.0));
        assert_eq!(count_intersection(&m1, &m2, 0, 2, &bg, None), Ok(1.0));
    }

    #[test]
    fn wordwise_fast_path() {
        let m1 = discrete(&[[2.0, 1.0, 0.0, -1.0], [0.0, 2.0, 1.0, 0.0], [1.0, 1.0, 0.0, 3.0]]);
        let m2 = discrete(&[[0.0, 0.0, 2.0, 1.0], [1.0, 0.0, 2.0, -2.0], [0.0, 1.0, 0.0, 2.0]]);
        let bg = Background::<Dna>::wordwise();
        for (t1, t2) in [(0, 0), (2, 3), (4, 4), (6, 1)] {
            let fast = convolve(&m1, &m2, t1, t2, &bg, false, None).unwrap();
            let slow = convolve(&m1, &m2, t1, t2, &bg, true, None).unwrap();
            assert_eq!(fast, slow);
            let (c1, c2) = intersection_counts(&m1, &m2, (t1, t2), (&bg, &bg), None).unwrap();
            assert_eq!((c1, c2), (fast, fast));
        }
    }

    #[test]
    fn different_backgrounds() {
        let m = discrete(&[[2.0, 0.0, 0.0, 0.0]]);
        let bg1 = Background::<Dna>::new([0.4, 0.2, 0.2, 0.2]).unwrap();
        let bg2 = Background::<Dna>::new([0.1, 0.3, 0.3, 0.3]).unwrap();
        let (c1, c2) = intersection_counts(&m, &m, (2, 2), (&bg1, &bg2), None).unwrap();
        assert!((c1 - 0.4).abs() < 1e-12);
        assert!((c2 - 0.1).abs() < 1e-12);
    }

    #[test]
    fn pair_limit() {
        let m = discrete(&[[2.0, 0.0, 0.0, 0.0], [0.0, 2.0, 0.0, 0.0]]);
        let bg = Background::<Dna>::wordwise();
        assert!(matches!(
            count_intersection(&m, &m, 0, 0, &bg, Some(0)),
            Err(Error::ResourceLimitExceeded { .. })
        ));
        assert!(count_intersection(&m, &m, 0, 0, &bg, Some(3)).is_ok());
    }
}
