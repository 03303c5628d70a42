extern crate macroape;
extern crate rand;

use macroape::abc::Dna;
use macroape::abc::Protein;
use macroape::bg::Background;
use macroape::bg::BackgroundModel;
use macroape::bg::DiBackground;
use macroape::dense::DenseMatrix;
use macroape::discrete::Discretizer;
use macroape::err::Error;
use macroape::model::ScoringModel;
use macroape::pwm::DiScoringMatrix;
use macroape::pwm::ScoringMatrix;
use macroape::threshold::BoundaryType;
use macroape::threshold::Calculator;
use macroape::threshold::FindPvalue;
use macroape::threshold::FindThreshold;
use rand::Rng;
use rand::SeedableRng;

const LENGTH: usize = 5;

fn random_pwm<R: Rng>(rng: &mut R) -> ScoringMatrix<Dna> {
    let rows = (0..LENGTH)
        .map(|_| {
            let mut row = [0.0; 4];
            for x in row.iter_mut() {
                *x = rng.gen_range(-4..=4) as f64;
            }
            row
        })
        .collect::<Vec<_>>();
    ScoringMatrix::new(DenseMatrix::from_rows(rows)).unwrap()
}

fn random_background<R: Rng>(rng: &mut R) -> Background<Dna> {
    let mut f = [0.0; 4];
    for x in f.iter_mut() {
        *x = rng.gen_range(0.1..1.0);
    }
    let total: f64 = f.iter().sum();
    for x in f.iter_mut() {
        *x /= total;
    }
    // absorb the rounding error in the last frequency
    f[3] = 1.0 - f[0] - f[1] - f[2];
    Background::new(f).unwrap()
}

/// Enumerate every word of the model length with its score and weight.
fn enumerate(pwm: &ScoringMatrix<Dna>, bg: &Background<Dna>) -> Vec<(f64, f64)> {
    let n = pwm.len();
    (0..4usize.pow(n as u32))
        .map(|mut code| {
            let mut score = 0.0;
            let mut weight = 1.0;
            for i in 0..n {
                let s = code % 4;
                code /= 4;
                score += pwm.matrix()[i][s];
                weight *= bg.transition_weight(0, s);
            }
            (score, weight)
        })
        .collect()
}

fn tail(words: &[(f64, f64)], threshold: f64) -> f64 {
    words
        .iter()
        .filter(|(s, _)| *s >= threshold)
        .map(|(_, w)| w)
        .sum()
}

fn discretizer() -> Discretizer {
    Discretizer::new(1.0).unwrap()
}

#[test]
fn single_word() {
    let pwm = ScoringMatrix::<Dna>::new(DenseMatrix::from_rows([
        [2.0, 0.0, 0.0, 0.0],
        [0.0, 2.0, 0.0, 0.0],
    ]))
    .unwrap();
    let calc = Calculator::new(&pwm, &Background::uniform(), discretizer()).unwrap();

    let info = calc.pvalue_by_threshold(4.0).unwrap();
    assert_eq!(info.pvalue, 0.0625);
    let info = calc.pvalue_by_threshold(2.0).unwrap();
    assert_eq!(info.pvalue, 0.4375);

    let info = calc.threshold_by_pvalue(0.0625, BoundaryType::Lower).unwrap();
    assert_eq!(info.threshold, 4.0);
    assert_eq!(info.pvalue, 0.0625);
    let info = calc.threshold_by_pvalue(0.1, BoundaryType::Upper).unwrap();
    assert_eq!(info.threshold, 2.0);
    assert_eq!(info.pvalue, 0.4375);
}

#[test]
fn pvalues_match_enumeration() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    for _ in 0..10 {
        let pwm = random_pwm(&mut rng);
        let bg = random_background(&mut rng);
        let words = enumerate(&pwm, &bg);
        let calc = Calculator::new(&pwm, &bg, discretizer()).unwrap();

        let worst = pwm.worst_score() as i64;
        let best = pwm.best_score() as i64;
        let mut last = f64::INFINITY;
        for t in worst..=best {
            let info = calc.pvalue_by_threshold(t as f64).unwrap();
            let expected = tail(&words, t as f64);
            assert!(
                (info.pvalue - expected).abs() < 1e-9,
                "threshold {}: {} != {}",
                t,
                info.pvalue,
                expected
            );
            assert!(info.pvalue <= last + 1e-12);
            last = info.pvalue;
        }
    }
}

#[test]
fn batched_pvalues_match_single() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let pwm = random_pwm(&mut rng);
    let bg = random_background(&mut rng);
    let calc = Calculator::new(&pwm, &bg, discretizer()).unwrap();

    let middle = ((pwm.best_score() + pwm.worst_score()) / 2.0).floor();
    let thresholds = [pwm.best_score(), middle, pwm.worst_score()];
    let batch = calc.pvalues_by_thresholds(&thresholds).unwrap();
    assert_eq!(batch.len(), thresholds.len());
    for (t, info) in thresholds.iter().zip(batch) {
        let single = calc.pvalue_by_threshold(*t).unwrap();
        assert_eq!(single.threshold, info.threshold);
        assert!((single.pvalue - info.pvalue).abs() < 1e-12);
    }
}

#[test]
fn thresholds_round_trip() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(1234);
    for _ in 0..5 {
        let pwm = random_pwm(&mut rng);
        let bg = random_background(&mut rng);
        let words = enumerate(&pwm, &bg);
        let calc = Calculator::new(&pwm, &bg, discretizer()).unwrap();

        let mut scores = words.iter().map(|(s, _)| *s).collect::<Vec<_>>();
        scores.sort_by(|x, y| y.total_cmp(x));
        scores.dedup();
        for &s in scores.iter() {
            let pvalue = tail(&words, s).min(1.0);
            for boundary in [BoundaryType::Lower, BoundaryType::Upper] {
                let info = calc.threshold_by_pvalue(pvalue, boundary).unwrap();
                assert_eq!(info.threshold, s, "p-value {} ({})", pvalue, boundary);
                assert!((info.pvalue - pvalue).abs() < 1e-9);
                assert_eq!(info.requested_pvalue, pvalue);
            }
        }
    }
}

#[test]
fn boundaries_bracket_pvalue() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(99);
    let pwm = random_pwm(&mut rng);
    let bg = random_background(&mut rng);
    let calc = Calculator::new(&pwm, &bg, discretizer()).unwrap();

    for &p in [0.001, 0.01, 0.05, 0.3].iter() {
        let lower = calc.threshold_by_pvalue(p, BoundaryType::Lower).unwrap();
        let upper = calc.threshold_by_pvalue(p, BoundaryType::Upper).unwrap();
        assert!(lower.threshold >= upper.threshold);
        assert!(upper.pvalue >= p * (1.0 - 1e-9) || upper.threshold == pwm.worst_score());
        assert!(lower.pvalue <= p * (1.0 + 1e-9) || lower.threshold == pwm.best_score());
    }
}

#[test]
fn mass_conservation() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(5);
    let pwm = random_pwm(&mut rng);

    let calc = Calculator::new(&pwm, &Background::wordwise(), discretizer()).unwrap();
    let dist = calc.distribution(None).unwrap();
    assert_eq!(dist.total_weight(), 4f64.powi(LENGTH as i32));
    assert_eq!(dist.vocabulary_volume(), 4f64.powi(LENGTH as i32));

    let bg = random_background(&mut rng);
    let calc = Calculator::new(&pwm, &bg, discretizer()).unwrap();
    let dist = calc.distribution(None).unwrap();
    assert!((dist.total_weight() - 1.0).abs() < 1e-9);
}

#[test]
fn resource_limit() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let pwm = random_pwm(&mut rng);
    let calc = Calculator::new(&pwm, &Background::uniform(), discretizer())
        .unwrap()
        .max_entries(Some(0));
    for _ in 0..2 {
        let err = calc.pvalue_by_threshold(pwm.best_score()).unwrap_err();
        assert!(matches!(err, Error::ResourceLimitExceeded { limit: 0, .. }));
    }
    let err = calc
        .threshold_by_pvalue(0.01, BoundaryType::Lower)
        .unwrap_err();
    assert!(matches!(err, Error::ResourceLimitExceeded { .. }));
}

#[test]
fn out_of_range() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(3);
    let pwm = random_pwm(&mut rng);
    let calc = Calculator::new(&pwm, &Background::uniform(), discretizer()).unwrap();
    assert!(matches!(
        calc.pvalue_by_threshold(pwm.best_score() + 1.0),
        Err(Error::ThresholdOutOfRange { .. })
    ));
    assert!(matches!(
        calc.pvalue_by_threshold(pwm.worst_score() - 1.0),
        Err(Error::ThresholdOutOfRange { .. })
    ));
    assert!(matches!(
        calc.threshold_by_pvalue(1.5, BoundaryType::Lower),
        Err(Error::InvalidPvalue(_))
    ));
}

#[test]
fn dinucleotide_matches_mononucleotide() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(2024);
    let pwm = random_pwm(&mut rng);
    let bg = random_background(&mut rng);
    let di = DiScoringMatrix::from_mono(&pwm).unwrap();
    let dibg = DiBackground::from_mono(&bg);

    let mono_calc = Calculator::new(&pwm, &bg, discretizer()).unwrap();
    let di_calc = Calculator::new(&di, &dibg, discretizer()).unwrap();
    assert_eq!(mono_calc.word_len(), di_calc.word_len());

    let worst = pwm.worst_score() as i64;
    let best = pwm.best_score() as i64;
    for t in worst..=best {
        let mono = mono_calc.pvalue_by_threshold(t as f64).unwrap();
        let di = di_calc.pvalue_by_threshold(t as f64).unwrap();
        assert!(
            (mono.pvalue - di.pvalue).abs() < 1e-9,
            "threshold {}: {} != {}",
            t,
            mono.pvalue,
            di.pvalue
        );
    }
}

#[test]
fn padded_models_keep_pvalues() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(77);
    let pwm = random_pwm(&mut rng);
    let padded = pwm.padded(1, 2);
    assert_eq!(padded.len(), LENGTH + 3);
    assert_eq!(padded.best_score(), pwm.best_score());

    let bg = random_background(&mut rng);
    let calc = Calculator::new(&pwm, &bg, discretizer()).unwrap();
    let padded_calc = Calculator::new(&padded, &bg, discretizer()).unwrap();
    let wordwise = Calculator::new(&pwm, &Background::wordwise(), discretizer()).unwrap();
    let padded_wordwise =
        Calculator::new(&padded, &Background::wordwise(), discretizer()).unwrap();
    for t in (pwm.worst_score() as i64)..=(pwm.best_score() as i64) {
        let x = calc.pvalue_by_threshold(t as f64).unwrap();
        let y = padded_calc.pvalue_by_threshold(t as f64).unwrap();
        assert!((x.pvalue - y.pvalue).abs() < 1e-9);
        let x = wordwise.pvalue_by_threshold(t as f64).unwrap();
        let y = padded_wordwise.pvalue_by_threshold(t as f64).unwrap();
        assert_eq!(x.count * 64.0, y.count);
    }
}

#[test]
fn protein_pvalues_match_enumeration() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(20);
    let rows = (0..3)
        .map(|_| (0..20).map(|_| rng.gen_range(-2..=2) as f64).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let pwm = ScoringMatrix::<Protein>::new(DenseMatrix::from_rows(&rows)).unwrap();
    let calc = Calculator::new(&pwm, &Background::uniform(), discretizer()).unwrap();

    let mut scores = Vec::new();
    for a in &rows[0] {
        for b in &rows[1] {
            for c in &rows[2] {
                scores.push(a + b + c);
            }
        }
    }
    for t in (pwm.worst_score() as i64)..=(pwm.best_score() as i64) {
        let expected = scores.iter().filter(|&&s| s >= t as f64).count() as f64 / 8000.0;
        let info = calc.pvalue_by_threshold(t as f64).unwrap();
        assert!(
            (info.pvalue - expected).abs() < 1e-9,
            "threshold {}: {} != {}",
            t,
            info.pvalue,
            expected
        );
    }

    let info = calc.threshold_by_pvalue(0.01, BoundaryType::Lower).unwrap();
    assert!(info.pvalue <= 0.01 * (1.0 + 1e-9) || info.threshold == pwm.best_score());
}
