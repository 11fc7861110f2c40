//! Predict command implementation - conserved-region epitope mapping for a FASTA input

use std::io::Write;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use epimap_core::progress::LogProgress;
use epimap_core::{
    IedbClient, NdjsonProgress, Pipeline, PredictionParams, PredictionResult, PublishedDb,
};

use super::{build_aligner, resolve_fasta};
use crate::config::Config;
use crate::error::{CliError, CliResult};

/// Peptide lengths the prediction service accepts
pub const PEPTIDE_LENGTH_RANGE: RangeInclusive<usize> = 8..=14;

#[allow(clippy::too_many_arguments)]
pub fn execute(
    config: &Config,
    input: Option<PathBuf>,
    sample: bool,
    alleles: Vec<String>,
    lengths: Option<String>,
    min_conserved: Option<usize>,
    accession: Option<String>,
    skip_prediction: bool,
    stream: bool,
    output: Option<PathBuf>,
) -> CliResult<()> {
    let params = PredictionParams {
        alleles: if alleles.is_empty() { config.defaults.alleles.clone() } else { alleles },
        peptide_lengths: resolve_lengths(config, lengths.as_deref())?,
        min_conserved_length: min_conserved.unwrap_or(config.defaults.min_conserved_length),
        accession,
        skip_prediction,
    };
    log::info!(
        "Predicting for alleles [{}], lengths {}-{}",
        params.alleles.join(", "),
        params.peptide_lengths.0,
        params.peptide_lengths.1
    );

    let aligner = build_aligner(&config.msa)?;
    let service = IedbClient::new(config.prediction.timeout())?
        .with_url(config.prediction.url.as_str())
        .with_method(config.prediction.method.as_str())
        .with_species(config.prediction.species.as_str());
    let published = if params.accession.is_some() {
        PublishedDb::load_or_empty(&config.data.published_epitopes)
    } else {
        PublishedDb::empty()
    };

    let retry = config.prediction.retry_policy();

    if stream {
        let sink = NdjsonProgress::new(std::io::stdout());
        let outcome = resolve_fasta(config, input, sample).and_then(|fasta| {
            Pipeline::new(aligner.as_ref(), &service, &published)
                .with_retry(retry)
                .with_observer(&sink)
                .run(&fasta, &params)
                .map_err(CliError::from)
        });
        return finish_stream(&sink, outcome);
    }

    let fasta = resolve_fasta(config, input, sample)?;
    let result = Pipeline::new(aligner.as_ref(), &service, &published)
        .with_retry(retry)
        .with_observer(&LogProgress)
        .run(&fasta, &params)?;
    log_summary(&result);
    write_output(output.as_deref(), &serde_json::to_string_pretty(&result)?)
}

/// Close an NDJSON stream with exactly one result or error event
fn finish_stream<W: Write>(sink: &NdjsonProgress<W>, outcome: CliResult<PredictionResult>) -> CliResult<()> {
    match outcome {
        Ok(result) => {
            log_summary(&result);
            sink.write_result(&result)?;
            Ok(())
        }
        Err(err) => {
            sink.write_error(&err.to_string())?;
            Err(err)
        }
    }
}

fn log_summary(result: &PredictionResult) {
    log::info!(
        "{} predicted binders, {} published epitopes, {} conserved regions",
        result.predicted.len(),
        result.published.len(),
        result.conserved_aln.len()
    );
}

/// Parse `9-10` or `9` into an inclusive peptide length range
pub fn parse_length_range(spec: &str) -> CliResult<(usize, usize)> {
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| CliError::validation(format!("Invalid peptide length '{}' in '{}'", s.trim(), spec)))
    };
    let (min, max) = match spec.split_once('-') {
        Some((lo, hi)) => (parse(lo)?, parse(hi)?),
        None => {
            let n = parse(spec)?;
            (n, n)
        }
    };
    check_length_range(min, max).map_err(CliError::validation)
}

/// Lengths from `--lengths`, or from `[defaults]` in the configuration
fn resolve_lengths(config: &Config, lengths: Option<&str>) -> CliResult<(usize, usize)> {
    match lengths {
        Some(spec) => parse_length_range(spec),
        None => check_length_range(config.defaults.peptide_min, config.defaults.peptide_max)
            .map_err(|e| CliError::config(format!("[defaults] peptide_min/peptide_max: {}", e))),
    }
}

fn check_length_range(min: usize, max: usize) -> Result<(usize, usize), String> {
    if min > max {
        return Err(format!("Peptide length range {}-{} is reversed", min, max));
    }
    if !PEPTIDE_LENGTH_RANGE.contains(&min) || !PEPTIDE_LENGTH_RANGE.contains(&max) {
        return Err(format!(
            "Peptide lengths must be within {}-{}, got {}-{}",
            PEPTIDE_LENGTH_RANGE.start(),
            PEPTIDE_LENGTH_RANGE.end(),
            min,
            max
        ));
    }
    Ok((min, max))
}

/// Write JSON to a file, or to stdout when no path is given
pub fn write_output(path: Option<&Path>, json: &str) -> CliResult<()> {
    match path {
        Some(path) => {
            std::fs::write(path, format!("{}\n", json))?;
            log::info!("Results written to: {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_length_range() -> CliResult<()> {
        assert_eq!(parse_length_range("9-10")?, (9, 10));
        assert_eq!(parse_length_range(" 8 - 14 ")?, (8, 14));
        assert_eq!(parse_length_range("9")?, (9, 9));
        Ok(())
    }

    #[test]
    fn test_parse_length_range_rejects_bad_input() {
        assert!(parse_length_range("10-9").is_err());
        assert!(parse_length_range("7-9").is_err());
        assert!(parse_length_range("9-15").is_err());
        assert!(parse_length_range("nine").is_err());
        assert!(parse_length_range("9-").is_err());
    }

    #[test]
    fn test_configured_lengths_are_checked() -> CliResult<()> {
        let mut config = Config::default();
        assert_eq!(resolve_lengths(&config, None)?, (9, 10));
        assert_eq!(resolve_lengths(&config, Some("8-11"))?, (8, 11));

        config.defaults.peptide_max = 100_000;
        let err = resolve_lengths(&config, None).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
        assert!(err.to_string().contains("must be within 8-14"));

        config.defaults.peptide_min = 12;
        config.defaults.peptide_max = 10;
        assert!(resolve_lengths(&config, None).is_err());

        // An explicit range still overrides a bad configuration
        assert_eq!(resolve_lengths(&config, Some("9"))?, (9, 9));
        Ok(())
    }

    #[test]
    fn test_stream_ends_with_error_event() {
        let sink = NdjsonProgress::new(Vec::new());
        let outcome = finish_stream(&sink, Err(CliError::validation("Select at least one HLA allele")));
        assert!(outcome.is_err());

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "Validation error: Select at least one HLA allele");
    }

    #[test]
    fn test_write_output_to_file() -> CliResult<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("result.json");
        write_output(Some(&path), "{\"predicted\":[]}")?;
        assert_eq!(std::fs::read_to_string(&path)?, "{\"predicted\":[]}\n");
        Ok(())
    }
}
