//! End-to-end spectrum reduction: aggregate, bin, mask, aperture, exposure.

use crate::aggregator::{Aggregation, FileSummary, StreamingAggregator};
use crate::run_log::{RunEvent, RunEvents, RunLogger};
use crate::Result;
use cbspec_core::binning::{BinnedCounts, MaskedBins};
use cbspec_core::config::{ArrayType, RunConfig};
use cbspec_core::exposure::ApertureExposure;
use cbspec_core::streams::FinalStreams;
use serde::Serialize;
use std::path::PathBuf;

/// Everything a run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumResult {
    pub array_type: ArrayType,
    pub run_time_s: f64,
    pub mc_summary: FileSummary,
    pub data_summary: FileSummary,
    /// Finalised log-energy streams.
    #[serde(skip)]
    pub streams: FinalStreams,
    /// Counts over every bin, with the validity mask. Masked-out bins carry
    /// no statistical meaning and are not serialized.
    #[serde(skip)]
    pub counts: BinnedCounts,
    /// Bins passing the validity mask.
    pub masked: MaskedBins,
    /// Aperture and exposure over the masked bins.
    pub aperture_exposure: ApertureExposure,
}

/// Bin finalised streams and compute aperture and exposure.
///
/// # Errors
/// Returns an error if binning or the acceptance backstop fails.
pub fn reduce_streams(config: &RunConfig, aggregation: Aggregation) -> Result<SpectrumResult> {
    let counts = BinnedCounts::from_streams(&config.energy_bins, &aggregation.streams)?;
    let masked = counts.masked();
    log::info!(
        "{} of {} energy bins pass the validity mask",
        masked.len(),
        counts.len()
    );
    let aperture_exposure =
        ApertureExposure::from_masked(&masked, &config.geometry, config.run_time_s)?;
    Ok(SpectrumResult {
        array_type: config.array_type(),
        run_time_s: config.run_time_s,
        mc_summary: aggregation.mc,
        data_summary: aggregation.data,
        streams: aggregation.streams,
        counts,
        masked,
        aperture_exposure,
    })
}

/// Run the full reduction for `config`, reporting progress to `events`.
///
/// # Errors
/// Returns the first fatal error; nothing is produced on failure.
pub fn run_spectrum<E: RunEvents>(config: &RunConfig, events: &mut E) -> Result<SpectrumResult> {
    let files = config.files()?;
    log::info!(
        "reducing {} spectrum: MC {}, data {}",
        config.array_type(),
        files.mc_file.display(),
        files.dt_file.display()
    );
    let aggregation =
        StreamingAggregator::new(&config.cuts, config.array_type(), config.read, events)
            .run(&files.mc_file, &files.dt_file)?;
    reduce_streams(config, aggregation)
}

/// A run reduced by [`run_spectrum_logged`].
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRun {
    pub result: SpectrumResult,
    /// Text run log, `None` if the logs directory could not be opened.
    pub text_log: Option<PathBuf>,
    /// JSON Lines run log, `None` if the logs directory could not be opened.
    pub json_log: Option<PathBuf>,
    /// Run log writes that failed.
    pub failed_log_writes: usize,
}

/// Run the full reduction, logging events to `config.output.logs_dir`.
///
/// An unusable logs directory is warned about and the run proceeds with
/// events kept in memory only.
///
/// # Errors
/// Returns the first fatal reduction error; log failures are never fatal.
pub fn run_spectrum_logged(config: &RunConfig) -> Result<LoggedRun> {
    let logs_dir = &config.output.logs_dir;
    let mut logger = match RunLogger::open(logs_dir) {
        Ok(logger) => logger,
        Err(err) => {
            log::warn!(
                "cannot open run logs in {}: {err}; continuing without them",
                logs_dir.display()
            );
            let mut events: Vec<RunEvent> = Vec::new();
            let result = run_spectrum(config, &mut events)?;
            return Ok(LoggedRun {
                result,
                text_log: None,
                json_log: None,
                failed_log_writes: 0,
            });
        }
    };

    let result = run_spectrum(config, &mut logger)?;
    logger.log_text(&format!("Run finished: {} valid bins", result.masked.len()));
    let failed_log_writes = logger.failed_writes();
    if failed_log_writes > 0 {
        log::warn!(
            "{failed_log_writes} run log writes failed in {}",
            logs_dir.display()
        );
    }
    Ok(LoggedRun {
        result,
        text_log: Some(logger.text_path()),
        json_log: Some(logger.json_path()),
        failed_log_writes,
    })
}
