//! Parser implementation for matrices in plain-text format.
//!
//! A matrix file starts with an optional name line, either prefixed with
//! `>` or bare, followed by one line of whitespace-separated numbers for
//! each position of the motif, in the order of the alphabet symbols:
//! ```text
//! >KLF4_f2
//! 0.30 0.65 -1.42 0.25
//! -1.07 -2.20 2.11 -1.99
//! ```
//! Transposed files store one line for each symbol instead. The numbers
//! may be counts (PCM), frequencies (PPM) or log-odds scores (PWM), which
//! is not recorded in the file. Dinucleotide matrices store `K * K`
//! numbers for each position.

use std::fmt::Display;
use std::fmt::Formatter;
use std::io::Read;
use std::str::FromStr;

use log::debug;
use macroape::abc::Alphabet;
use macroape::bg::Background;
use macroape::dense::DenseMatrix;
use macroape::pwm::CountMatrix;
use macroape::pwm::DiScoringMatrix;
use macroape::pwm::FrequencyMatrix;
use macroape::pwm::ScoringMatrix;
use typenum::Unsigned;

use crate::error::Error;

mod parse;

// --- DataModel ---------------------------------------------------------------

/// The kind of values stored in a matrix file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataModel {
    /// Position count matrix.
    Pcm,
    /// Position frequency matrix.
    Ppm,
    /// Position weight matrix, storing log-odds scores.
    #[default]
    Pwm,
}

impl FromStr for DataModel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pcm" => Ok(DataModel::Pcm),
            "ppm" | "pfm" => Ok(DataModel::Ppm),
            "pwm" => Ok(DataModel::Pwm),
            other => Err(format!("unknown data model: {:?}", other)),
        }
    }
}

impl Display for DataModel {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            DataModel::Pcm => f.write_str("PCM"),
            DataModel::Ppm => f.write_str("PPM"),
            DataModel::Pwm => f.write_str("PWM"),
        }
    }
}

// --- RawMatrix ---------------------------------------------------------------

/// A matrix read from a file, before its values are interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMatrix {
    name: Option<String>,
    rows: Vec<Vec<f64>>,
}

impl RawMatrix {
    /// Create a new raw matrix from its rows.
    pub fn new(name: Option<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { name, rows }
    }

    /// The name of the matrix, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The rows of the matrix, as read.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Get the matrix with rows and columns exchanged.
    pub fn transposed(&self) -> Result<Self, Error> {
        let width = self.rows.first().map(Vec::len).unwrap_or(0);
        if self.rows.iter().any(|row| row.len() != width) {
            return Err(Error::InvalidData(
                "rows of a transposed matrix must have the same length".into(),
            ));
        }
        let rows = (0..width)
            .map(|j| self.rows.iter().map(|row| row[j]).collect())
            .collect();
        Ok(Self {
            name: self.name.clone(),
            rows,
        })
    }

    fn dense<C: Unsigned>(&self) -> Result<DenseMatrix<f64, C>, Error> {
        Ok(DenseMatrix::try_from_rows(&self.rows)?)
    }

    /// Interpret the matrix as a mononucleotide model.
    ///
    /// Counts and frequencies are converted to log-odds scores against
    /// the given background; frequencies are first scaled to counts with
    /// `effective_count` sequences.
    pub fn to_scoring<A: Alphabet>(
        &self,
        model: DataModel,
        background: &Background<A>,
        effective_count: f64,
    ) -> Result<ScoringMatrix<A>, Error> {
        let data = self.dense::<A::K>()?;
        let pwm = match model {
            DataModel::Pwm => ScoringMatrix::new(data)?,
            DataModel::Pcm => CountMatrix::new(data)?.to_scoring(background)?,
            DataModel::Ppm => FrequencyMatrix::new(data)?
                .to_counts(effective_count)?
                .to_scoring(background)?,
        };
        Ok(match self.name.as_ref() {
            Some(name) => pwm.with_name(name.as_str()),
            None => pwm,
        })
    }

    /// Interpret the matrix as a dinucleotide model.
    ///
    /// Only log-odds scores are supported for dinucleotide matrices.
    pub fn to_di_scoring<A: Alphabet>(&self, model: DataModel) -> Result<DiScoringMatrix<A>, Error> {
        if model != DataModel::Pwm {
            return Err(Error::InvalidData(format!(
                "dinucleotide matrices cannot be read from a {}",
                model
            )));
        }
        let pwm = DiScoringMatrix::new(self.dense::<A::K2>()?)?;
        Ok(match self.name.as_ref() {
            Some(name) => pwm.with_name(name.as_str()),
            None => pwm,
        })
    }
}

/// Parse a matrix from a string.
pub fn parse(text: &str) -> Result<RawMatrix, Error> {
    let (rest, (name, rows)) = self::parse::matrix(text)?;
    if !rest.is_empty() {
        let line = rest.lines().next().unwrap_or_default();
        return Err(Error::InvalidData(format!("unexpected line: {:?}", line)));
    }
    debug!("parsed matrix {:?} with {} rows", name, rows.len());
    Ok(RawMatrix::new(name.map(String::from), rows))
}

/// Read a matrix from a reader.
pub fn read<R: Read>(mut reader: R) -> Result<RawMatrix, Error> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse(&text)
}
