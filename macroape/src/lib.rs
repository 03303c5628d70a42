#![doc = include_str!("../README.md")]

extern crate generic_array;
extern crate typenum;

pub mod abc;
pub mod bg;
pub mod config;
pub mod dense;
pub mod discrete;
pub mod dist;
pub mod err;
pub mod hash;
pub mod model;
pub mod pair;
pub mod pwm;
pub mod scan;
pub mod similarity;
pub mod threshold;

pub use abc::Alphabet;
pub use abc::AminoAcid;
pub use abc::ComplementableAlphabet;
pub use abc::ComplementableSymbol;
pub use abc::Dna;
pub use abc::Nucleotide;
pub use abc::Protein;
pub use abc::Symbol;
pub use bg::Background;
pub use bg::BackgroundModel;
pub use bg::DiBackground;
pub use config::Config;
pub use dense::DenseMatrix;
pub use discrete::DiscreteMatrix;
pub use discrete::Discretizer;
pub use discrete::SuffixBounds;
pub use dist::ScoreDistribution;
pub use err::Error;
pub use err::InvalidSymbol;
pub use model::ReverseComplement;
pub use model::ScoringModel;
pub use pair::Alignment;
pub use pair::Orientation;
pub use pwm::CountMatrix;
pub use pwm::DiScoringMatrix;
pub use pwm::FrequencyMatrix;
pub use pwm::ScoringMatrix;
pub use scan::collect_distance_matrix;
pub use scan::CandidateError;
pub use scan::CandidateEvaluator;
pub use scan::Evaluator;
pub use scan::ScanCollection;
pub use scan::ScanHit;
pub use similarity::CompareModels;
pub use similarity::SimilarityInfo;
pub use threshold::BoundaryType;
pub use threshold::Calculator;
pub use threshold::FindPvalue;
pub use threshold::FindThreshold;
pub use threshold::PvalueInfo;
pub use threshold::ThresholdInfo;
pub use threshold::ThresholdTable;
