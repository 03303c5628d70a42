//! Parser implementation for background strings.
//!
//! A background is given as comma-separated numbers. A string of ones
//! denotes the wordwise background, where every word has a weight of one:
//! ```text
//! 1,1,1,1
//! ```
//! Any other string must hold symbol probabilities, in the order of the
//! alphabet symbols:
//! ```text
//! 0.3,0.2,0.2,0.3
//! ```
//! Dinucleotide backgrounds take the probabilities of symbol pairs, with
//! the pair `(a, b)` at index `a * K + b`, or mononucleotide probabilities
//! which are then assumed independent.

use macroape::abc::Alphabet;
use macroape::bg::Background;
use macroape::bg::DiBackground;
use nom::character::complete::char;
use nom::character::complete::space0;
use nom::combinator::all_consuming;
use nom::multi::separated_list1;
use nom::number::complete::double;
use nom::sequence::delimited;
use nom::IResult;
use nom::Parser;
use typenum::Unsigned;

use crate::error::Error;

fn values(input: &str) -> IResult<&str, Vec<f64>> {
    all_consuming(delimited(
        space0,
        separated_list1(delimited(space0, char(','), space0), double),
        space0,
    ))
    .parse(input)
}

fn is_wordwise(values: &[f64]) -> bool {
    values.iter().all(|&x| x == 1.0)
}

/// Parse a mononucleotide background.
pub fn parse<A: Alphabet>(text: &str) -> Result<Background<A>, Error> {
    let (_, values) = values(text)?;
    if values.len() == A::K::USIZE && is_wordwise(&values) {
        Ok(Background::wordwise())
    } else {
        Ok(Background::from_slice(&values)?)
    }
}

/// Parse a dinucleotide background.
pub fn parse_di<A: Alphabet>(text: &str) -> Result<DiBackground<A>, Error> {
    let (_, values) = values(text)?;
    let n = values.len();
    if (n == A::K::USIZE || n == A::K2::USIZE) && is_wordwise(&values) {
        Ok(DiBackground::wordwise())
    } else if n == A::K::USIZE {
        let mono = Background::from_slice(&values)?;
        Ok(DiBackground::from_mono(&mono))
    } else {
        Ok(DiBackground::from_slice(&values)?)
    }
}
