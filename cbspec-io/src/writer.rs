//! Result writers for reduced spectra.

use crate::pipeline::SpectrumResult;
use crate::Result;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Per-bin table file name inside the runs directory.
pub const BINS_CSV_NAME: &str = "spectrum_bins.csv";
/// Run summary file name inside the runs directory.
pub const SUMMARY_JSON_NAME: &str = "spectrum_summary.json";

const CSV_HEADER: &str =
    "bin,center,width,mc_reconstructed,data_reconstructed,mc_raw_truth,aperture_m2sr,exposure_m2srs";

/// Writer for spectrum tables and summaries.
pub struct SpectrumWriter {
    writer: BufWriter<File>,
}

impl SpectrumWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes one CSV row per bin surviving the validity mask.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn write_bins_csv(&mut self, result: &SpectrumResult) -> Result<()> {
        let bins = &result.masked;
        let ae = &result.aperture_exposure;

        writeln!(self.writer, "{CSV_HEADER}")?;
        for i in 0..bins.len() {
            writeln!(
                self.writer,
                "{},{},{},{},{},{},{},{}",
                bins.bin_index[i],
                bins.centers[i],
                bins.widths[i],
                bins.mc_reconstructed[i],
                bins.data_reconstructed[i],
                bins.mc_raw_truth[i],
                ae.aperture[i],
                ae.exposure[i]
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes the run summary as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns an error on serialization or write failure.
    pub fn write_summary_json<T: Serialize>(&mut self, summary: &T) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, summary)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Paths written by [`write_results`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenResults {
    pub bins_csv: PathBuf,
    pub summary_json: PathBuf,
}

/// Write the bin table and summary of `result` into `runs_dir`.
///
/// # Errors
/// Returns an error if the directory or either file cannot be written.
pub fn write_results<P: AsRef<Path>>(
    runs_dir: P,
    result: &SpectrumResult,
) -> Result<WrittenResults> {
    let runs_dir = runs_dir.as_ref();
    fs::create_dir_all(runs_dir)?;
    let written = WrittenResults {
        bins_csv: runs_dir.join(BINS_CSV_NAME),
        summary_json: runs_dir.join(SUMMARY_JSON_NAME),
    };

    SpectrumWriter::create(&written.bins_csv)?.write_bins_csv(result)?;
    SpectrumWriter::create(&written.summary_json)?.write_summary_json(result)?;
    log::info!("results written to {}", runs_dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{Aggregation, FileSummary};
    use crate::pipeline::reduce_streams;
    use cbspec_core::binning::EnergyBins;
    use cbspec_core::config::{ArrayFiles, ArrayType, GeneratedGeometry, RunConfig};
    use cbspec_core::streams::FinalStreams;
    use tempfile::{NamedTempFile, TempDir};

    fn result() -> SpectrumResult {
        let config = RunConfig::new(
            ArrayType::Tasd,
            ArrayFiles {
                mc_file: PathBuf::from("mc.parquet"),
                dt_file: PathBuf::from("dt.parquet"),
            },
            EnergyBins::new(vec![18.0, 18.5, 19.0, 19.5]).unwrap(),
            GeneratedGeometry {
                generated_area_m2: 100.0,
                generated_solid_angle_sr: 2.0,
            },
            10.0,
        )
        .unwrap();
        let aggregation = Aggregation {
            streams: FinalStreams {
                mc_reconstructed: vec![18.2, 18.7, 19.2],
                data_reconstructed: vec![18.7, 18.8],
                mc_raw_truth: vec![18.2, 18.7, 18.8, 19.2, 19.3, 19.4],
            },
            mc: FileSummary::default(),
            data: FileSummary::default(),
        };
        reduce_streams(&config, aggregation).unwrap()
    }

    #[test]
    fn test_write_bins_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = SpectrumWriter::create(file.path()).unwrap();

        writer.write_bins_csv(&result()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        // Bin 0 (center 18.25) is below the energy floor and absent.
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);
        // 1 of 2 thrown reconstructed -> 0.5 * 200 m^2 sr, times 10 s.
        assert_eq!(lines[1], "1,18.75,0.5,1,2,2,100,1000");
        assert!(lines[2].starts_with("2,19.25,0.5,1,0,3,66.6"));
    }

    #[test]
    fn test_write_results_creates_runs_dir() {
        let dir = TempDir::new().unwrap();
        let runs = dir.path().join("output").join("runs");
        let written = write_results(&runs, &result()).unwrap();

        assert!(written.bins_csv.exists());
        let json = std::fs::read_to_string(&written.summary_json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["array_type"], "TASD");
        assert_eq!(value["masked"]["bin_index"], serde_json::json!([1, 2]));
        assert_eq!(value["aperture_exposure"]["exposure"][0], 1000.0);
        assert!(value.get("counts").is_none());
        assert!(value.get("streams").is_none());
    }
}
