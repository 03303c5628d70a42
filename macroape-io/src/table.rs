//! Parser implementation for precomputed threshold tables.
//!
//! A table stores one `threshold<TAB>pvalue` pair per line. Lines starting
//! with `#` are comments, and so is anything following a `#` on a line:
//! ```text
//! # threshold	pvalue
//! -2.5	0.0021
//! -1.0	0.0005
//! 3.2	0.00001
//! ```

use std::io::BufRead;

use log::debug;
use macroape::threshold::ThresholdTable;
use nom::character::complete::space0;
use nom::character::complete::space1;
use nom::combinator::all_consuming;
use nom::number::complete::double;
use nom::sequence::delimited;
use nom::sequence::separated_pair;
use nom::IResult;
use nom::Parser;

use crate::error::Error;

fn entry(input: &str) -> IResult<&str, (f64, f64)> {
    all_consuming(delimited(
        space0,
        separated_pair(double, space1, double),
        space0,
    ))
    .parse(input)
}

/// Strip the comment and surrounding whitespace from a line.
fn content(line: &str) -> &str {
    match memchr::memchr(b'#', line.as_bytes()) {
        Some(i) => line[..i].trim(),
        None => line.trim(),
    }
}

/// Parse a single line of a table, skipping comments and blank lines.
fn parse_line(line: &str) -> Result<Option<(f64, f64)>, Error> {
    let line = content(line);
    if line.is_empty() {
        return Ok(None);
    }
    let (_, pair) = entry(line)?;
    Ok(Some(pair))
}

/// Parse the entries of a table from a string.
pub fn parse_entries(text: &str) -> Result<Vec<(f64, f64)>, Error> {
    text.lines()
        .filter_map(|line| parse_line(line).transpose())
        .collect()
}

/// Read a threshold table from a reader.
///
/// The vocabulary volume of the model the table was computed for is used
/// to report the weight of the recognized words.
pub fn read<B: BufRead>(reader: B, vocabulary_volume: f64) -> Result<ThresholdTable, Error> {
    let mut entries = Vec::new();
    for line in reader.lines() {
        if let Some(pair) = parse_line(&line?)? {
            entries.push(pair);
        }
    }
    debug!("read threshold table with {} entries", entries.len());
    Ok(ThresholdTable::new(entries, vocabulary_volume)?)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use macroape::threshold::BoundaryType;
    use macroape::threshold::FindPvalue;
    use macroape::threshold::FindThreshold;

    use super::*;

    const TEXT: &str = concat!(
        "# threshold\tpvalue\n",
        "-2.5\t0.0021\n",
        "\n",
        "3.2\t0.00001 # best\n",
        "-1.0\t0.0005\n",
    );

    #[test]
    fn parse_entries() {
        let entries = super::parse_entries(TEXT).unwrap();
        assert_eq!(entries, vec![(-2.5, 0.0021), (3.2, 0.00001), (-1.0, 0.0005)]);
        assert!(super::parse_entries("1.0 0.5 0.2\n").is_err());
        assert!(super::parse_entries("1.0\n").is_err());
    }

    #[test]
    fn read_table() {
        let table = read(Cursor::new(TEXT), 1.0).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.entries()[0], (-2.5, 0.0021));

        let info = table.pvalue_by_threshold(0.0).unwrap();
        assert_eq!(info.pvalue, 0.0005);
        let info = table.threshold_by_pvalue(0.001, BoundaryType::Lower).unwrap();
        assert_eq!(info.threshold, -1.0);
    }

    #[test]
    fn read_invalid() {
        assert!(matches!(read(Cursor::new("# empty\n"), 1.0), Err(Error::Core(_))));
        assert!(matches!(
            read(Cursor::new("1.0\t0.1\n2.0\t0.5\n"), 1.0),
            Err(Error::Core(_))
        ));
    }
}
