//! Formatter implementation for tab-delimited reports.
//!
//! Reports start with `#`-prefixed lines describing the parameters of the
//! computation and the columns of the table, followed by one tab-separated
//! line per result:
//! ```text
//! # pvalue: 0.0005
//! # name	similarity	shift	overlap	orientation	precise
//! KLF4_f2	0.742	1	14	direct	true
//! ```

use std::fmt::Display;
use std::io::Write;

use macroape::scan::CandidateError;
use macroape::scan::ScanHit;
use macroape::similarity::SimilarityInfo;
use macroape::threshold::PvalueInfo;
use macroape::threshold::ThresholdInfo;

/// Write the parameters of a computation as header lines.
pub fn write_parameters<W, K, V>(mut writer: W, parameters: &[(K, V)]) -> std::io::Result<()>
where
    W: Write,
    K: Display,
    V: Display,
{
    for (key, value) in parameters {
        writeln!(writer, "# {}: {}", key, value)?;
    }
    Ok(())
}

/// Write thresholds found for a list of p-values.
pub fn write_thresholds<W: Write>(mut writer: W, infos: &[ThresholdInfo]) -> std::io::Result<()> {
    writeln!(writer, "# requested_pvalue\tthreshold\treal_pvalue")?;
    for info in infos {
        writeln!(
            writer,
            "{}\t{}\t{}",
            info.requested_pvalue, info.threshold, info.pvalue
        )?;
    }
    Ok(())
}

/// Write p-values found for a list of thresholds.
pub fn write_pvalues<W: Write>(mut writer: W, infos: &[PvalueInfo]) -> std::io::Result<()> {
    writeln!(writer, "# threshold\tpvalue")?;
    for info in infos {
        writeln!(writer, "{}\t{}", info.threshold, info.pvalue)?;
    }
    Ok(())
}

fn optional<T: Display>(value: Option<T>) -> String {
    match value {
        Some(x) => x.to_string(),
        None => String::from("NA"),
    }
}

/// Write the similarity of two models.
pub fn write_similarity<W: Write>(
    mut writer: W,
    info: &SimilarityInfo,
    first_threshold: f64,
    second_threshold: f64,
) -> std::io::Result<()> {
    let rows: [(&str, String); 12] = [
        ("similarity", optional(info.similarity())),
        ("distance", optional(info.distance())),
        ("shift", optional(info.alignment.map(|a| a.shift()))),
        ("overlap", optional(info.alignment.map(|a| a.overlap()))),
        ("orientation", optional(info.alignment.map(|a| a.orientation()))),
        ("first_threshold", first_threshold.to_string()),
        ("first_pvalue", optional(info.real_pvalue_first())),
        ("second_threshold", second_threshold.to_string()),
        ("second_pvalue", optional(info.real_pvalue_second())),
        ("recognized_by_both", info.recognized_by_both.to_string()),
        ("recognized_by_first", info.recognized_by_first.to_string()),
        ("recognized_by_second", info.recognized_by_second.to_string()),
    ];
    writeln!(writer, "# parameter\tvalue")?;
    for (key, value) in rows.iter() {
        writeln!(writer, "{}\t{}", key, value)?;
    }
    Ok(())
}

/// Write the candidates of a collection similar to the query.
///
/// Failed candidates are skipped, they are reported separately.
pub fn write_scan<W: Write>(
    mut writer: W,
    results: &[Result<ScanHit, CandidateError>],
) -> std::io::Result<()> {
    writeln!(
        writer,
        "# name\tsimilarity\tshift\toverlap\torientation\tprecise"
    )?;
    for hit in results.iter().filter_map(|r| r.as_ref().ok()) {
        let alignment = hit.info.alignment;
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            hit.name,
            optional(hit.info.similarity()),
            optional(alignment.map(|a| a.shift())),
            optional(alignment.map(|a| a.overlap())),
            optional(alignment.map(|a| a.orientation())),
            hit.precise,
        )?;
    }
    Ok(())
}

/// Write a matrix of pairwise distances.
pub fn write_distance_matrix<W, S>(
    mut writer: W,
    names: &[S],
    distances: &[Vec<Option<f64>>],
) -> std::io::Result<()>
where
    W: Write,
    S: AsRef<str>,
{
    write!(writer, "#")?;
    for name in names {
        write!(writer, "\t{}", name.as_ref())?;
    }
    writeln!(writer)?;
    for (name, row) in names.iter().zip(distances) {
        write!(writer, "{}", name.as_ref())?;
        for &d in row {
            write!(writer, "\t{}", optional(d))?;
        }
        writeln!(writer)?;
    }
    Ok(())
}
