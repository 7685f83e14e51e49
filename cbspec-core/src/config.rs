//! Run configuration.
//!
//! A [`RunConfig`] is built once at startup, validated, and passed by
//! reference to every stage. Nothing downstream reads process-wide state.

use crate::binning::EnergyBins;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Fluorescence-detector energy-scale correction applied to SD energies.
pub const FD_ENERGY_CORRECTION: f64 = 1.27;
/// Offset from log10(E/EeV) to log10(E/eV).
pub const EEV_LOG_OFFSET: f64 = 18.0;
/// Default rows per Parquet batch.
pub const DEFAULT_BATCH_SIZE: usize = 160_000;
/// Upper bound on batches reduced concurrently.
pub const MAX_PARALLELISM: usize = 1024;

/// Surface-detector array the input was recorded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArrayType {
    #[serde(rename = "TASD")]
    Tasd,
    #[serde(rename = "CBSD")]
    Cbsd,
}

impl ArrayType {
    /// Zenith-angle offset in degrees added to the reconstructed zenith.
    #[must_use]
    pub fn zenith_offset_deg(self) -> f64 {
        match self {
            ArrayType::Tasd => 0.5,
            ArrayType::Cbsd => 1.0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArrayType::Tasd => "TASD",
            ArrayType::Cbsd => "CBSD",
        }
    }
}

impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArrayType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "TASD" => Ok(ArrayType::Tasd),
            "CBSD" => Ok(ArrayType::Cbsd),
            other => Err(Error::Config(format!(
                "array type {other:?} is not supported (expected TASD or CBSD)"
            ))),
        }
    }
}

/// Quality-cut thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityCuts {
    /// Minimum number of good SDs (inclusive).
    #[serde(rename = "number_of_good_sd")]
    pub min_good_sd: u32,
    /// Maximum corrected zenith angle in degrees (exclusive).
    #[serde(rename = "theta_deg")]
    pub max_theta_deg: f64,
    /// Minimum distance to the array border in metres (inclusive).
    #[serde(rename = "border_dist_m", alias = "boarder_dist_m")]
    pub min_border_dist_m: f64,
    /// Maximum geometry-fit chi2 (exclusive).
    #[serde(rename = "geometry_chi2")]
    pub max_geom_chi2: f64,
    /// Maximum LDF-fit chi2 (exclusive).
    #[serde(rename = "ldf_chi2")]
    pub max_ldf_chi2: f64,
    /// Maximum Pedistool error (exclusive).
    #[serde(rename = "ped_error")]
    pub max_ped_err: f64,
    /// Maximum fractional S800 uncertainty (exclusive).
    #[serde(rename = "frac_s800")]
    pub max_frac_s800: f64,
}

impl Default for QualityCuts {
    fn default() -> Self {
        Self {
            min_good_sd: 5,
            max_theta_deg: 45.0,
            min_border_dist_m: 1200.0,
            max_geom_chi2: 4.0,
            max_ldf_chi2: 4.0,
            max_ped_err: 5.0,
            max_frac_s800: 0.25,
        }
    }
}

impl QualityCuts {
    /// Check all thresholds are finite.
    ///
    /// # Errors
    /// Returns [`Error::Config`] naming the first non-finite threshold.
    pub fn validate(&self) -> Result<()> {
        let thresholds = [
            ("theta_deg", self.max_theta_deg),
            ("border_dist_m", self.min_border_dist_m),
            ("geometry_chi2", self.max_geom_chi2),
            ("ldf_chi2", self.max_ldf_chi2),
            ("ped_error", self.max_ped_err),
            ("frac_s800", self.max_frac_s800),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() {
                return Err(Error::Config(format!(
                    "quality cut {name} must be finite, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Thrown-MC geometry, used to turn acceptance into aperture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedGeometry {
    pub generated_area_m2: f64,
    pub generated_solid_angle_sr: f64,
}

impl Default for GeneratedGeometry {
    fn default() -> Self {
        Self {
            // 25 km throw radius
            generated_area_m2: PI * 25_000.0_f64.powi(2),
            generated_solid_angle_sr: 3.0 * PI / 4.0,
        }
    }
}

impl GeneratedGeometry {
    /// Area times solid angle in m^2 sr.
    #[must_use]
    pub fn area_solid_angle(&self) -> f64 {
        self.generated_area_m2 * self.generated_solid_angle_sr
    }
}

/// Batch reading options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
    /// Rows per fetched batch.
    pub batch_size: usize,
    /// Batches reduced concurrently (1 = sequential).
    pub parallelism: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallelism: 1,
        }
    }
}

impl ReadOptions {
    /// Set the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the number of batches reduced concurrently.
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// # Errors
    /// Returns [`Error::Config`] if either value is zero or `parallelism`
    /// exceeds [`MAX_PARALLELISM`].
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if !(1..=MAX_PARALLELISM).contains(&self.parallelism) {
            return Err(Error::Config(format!(
                "parallelism must be between 1 and {MAX_PARALLELISM}, got {}",
                self.parallelism
            )));
        }
        Ok(())
    }
}

/// MC and data result files for one array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayFiles {
    pub mc_file: PathBuf,
    pub dt_file: PathBuf,
}

impl ArrayFiles {
    /// Files in processing order: MC first, data second.
    #[must_use]
    pub fn ordered(&self) -> [&Path; 2] {
        [self.mc_file.as_path(), self.dt_file.as_path()]
    }
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub base_dir: PathBuf,
    pub plots_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub runs_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("output"),
            plots_dir: PathBuf::from("output/plots"),
            logs_dir: PathBuf::from("output/logs"),
            runs_dir: PathBuf::from("output/runs"),
        }
    }
}

// Intermediate structs mirroring the YAML layout
#[derive(Deserialize)]
struct YamlConfig {
    array: YamlArray,
    #[serde(default)]
    data: YamlData,
    #[serde(default)]
    energy: YamlEnergy,
    #[serde(default)]
    geometry: GeneratedGeometry,
    run: YamlRun,
    #[serde(default)]
    quality_cuts: QualityCuts,
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Deserialize)]
struct YamlArray {
    #[serde(rename = "type")]
    array_type: String,
}

#[derive(Deserialize, Default)]
struct YamlData {
    tasd: Option<ArrayFiles>,
    cbsd: Option<ArrayFiles>,
}

#[derive(Deserialize)]
struct YamlEnergy {
    bins: Vec<f64>,
}

impl Default for YamlEnergy {
    fn default() -> Self {
        Self {
            bins: EnergyBins::default().edges().to_vec(),
        }
    }
}

#[derive(Deserialize)]
struct YamlRun {
    time_s: f64,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_parallelism")]
    parallelism: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_parallelism() -> usize {
    1
}

/// Validated, immutable configuration for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    array_type: ArrayType,
    tasd_files: Option<ArrayFiles>,
    cbsd_files: Option<ArrayFiles>,
    pub energy_bins: EnergyBins,
    pub geometry: GeneratedGeometry,
    pub run_time_s: f64,
    pub cuts: QualityCuts,
    pub read: ReadOptions,
    pub output: OutputConfig,
}

impl RunConfig {
    /// Build a configuration for a single file pair.
    ///
    /// # Errors
    /// Returns an error if any value fails validation.
    pub fn new(
        array_type: ArrayType,
        files: ArrayFiles,
        energy_bins: EnergyBins,
        geometry: GeneratedGeometry,
        run_time_s: f64,
    ) -> Result<Self> {
        let (tasd_files, cbsd_files) = match array_type {
            ArrayType::Tasd => (Some(files), None),
            ArrayType::Cbsd => (None, Some(files)),
        };
        let config = Self {
            array_type,
            tasd_files,
            cbsd_files,
            energy_bins,
            geometry,
            run_time_s,
            cuts: QualityCuts::default(),
            read: ReadOptions::default(),
            output: OutputConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("cannot read config {}: {err}", path.display()))
        })?;
        Self::from_yaml(&text)
    }

    /// Load configuration from a YAML string.
    ///
    /// # Errors
    /// Returns an error if the text cannot be parsed or validated.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: YamlConfig = serde_yaml::from_str(yaml)?;
        let array_type = raw.array.array_type.parse()?;
        let config = Self {
            array_type,
            tasd_files: raw.data.tasd,
            cbsd_files: raw.data.cbsd,
            energy_bins: EnergyBins::new(raw.energy.bins)
                .map_err(|err| Error::Config(err.to_string()))?,
            geometry: raw.geometry,
            run_time_s: raw.run.time_s,
            cuts: raw.quality_cuts,
            read: ReadOptions {
                batch_size: raw.run.batch_size,
                parallelism: raw.run.parallelism,
            },
            output: raw.output,
        };
        config.validate()?;
        Ok(config)
    }

    /// Select a different array, re-validating the file pair.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if no files are configured for `array_type`.
    pub fn with_array_type(mut self, array_type: ArrayType) -> Result<Self> {
        self.array_type = array_type;
        self.validate()?;
        Ok(self)
    }

    /// Replace the read options.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the options are invalid.
    pub fn with_read_options(mut self, read: ReadOptions) -> Result<Self> {
        read.validate()?;
        self.read = read;
        Ok(self)
    }

    /// Replace the quality cuts.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a threshold is not finite.
    pub fn with_cuts(mut self, cuts: QualityCuts) -> Result<Self> {
        cuts.validate()?;
        self.cuts = cuts;
        Ok(self)
    }

    /// Replace the output locations.
    #[must_use]
    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn array_type(&self) -> ArrayType {
        self.array_type
    }

    /// MC/data files for the selected array.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if no files are configured for the array.
    pub fn files(&self) -> Result<&ArrayFiles> {
        let files = match self.array_type {
            ArrayType::Tasd => self.tasd_files.as_ref(),
            ArrayType::Cbsd => self.cbsd_files.as_ref(),
        };
        files.ok_or_else(|| {
            Error::Config(format!(
                "no data files configured for array {}",
                self.array_type
            ))
        })
    }

    fn validate(&self) -> Result<()> {
        self.files()?;
        let geometry = &self.geometry;
        if !(geometry.generated_area_m2.is_finite() && geometry.generated_area_m2 > 0.0) {
            return Err(Error::Config(format!(
                "generated_area_m2 must be positive, got {}",
                geometry.generated_area_m2
            )));
        }
        if !(geometry.generated_solid_angle_sr.is_finite()
            && geometry.generated_solid_angle_sr > 0.0)
        {
            return Err(Error::Config(format!(
                "generated_solid_angle_sr must be positive, got {}",
                geometry.generated_solid_angle_sr
            )));
        }
        if !(self.run_time_s.is_finite() && self.run_time_s >= 0.0) {
            return Err(Error::Config(format!(
                "run time must be non-negative, got {}",
                self.run_time_s
            )));
        }
        self.cuts.validate()?;
        self.read.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const YAML: &str = r"
array:
  type: CBSD
data:
  tasd:
    mc_file: /data/ta_mc.parquet
    dt_file: /data/ta_dt.parquet
  cbsd:
    mc_file: /data/cb_mc.parquet
    dt_file: /data/cb_dt.parquet
energy:
  bins: [18.0, 18.5, 19.0, 19.5]
geometry:
  generated_area_m2: 1.0e9
  generated_solid_angle_sr: 2.0
run:
  time_s: 3.0e8
quality_cuts:
  number_of_good_sd: 4
  theta_deg: 55.0
  boarder_dist_m: 600.0
  geometry_chi2: 4.0
  ldf_chi2: 4.0
  ped_error: 10.0
  frac_s800: 0.25
output:
  base_dir: out
  plots_dir: out/plots
  logs_dir: out/logs
  runs_dir: out/runs
";

    #[test]
    fn test_yaml_loading() {
        let config = RunConfig::from_yaml(YAML).expect("config should parse");
        assert_eq!(config.array_type(), ArrayType::Cbsd);
        assert_eq!(
            config.files().unwrap().mc_file,
            PathBuf::from("/data/cb_mc.parquet")
        );
        assert_eq!(config.energy_bins.len(), 3);
        assert_relative_eq!(config.geometry.area_solid_angle(), 2.0e9);
        assert_eq!(config.cuts.min_good_sd, 4);
        assert_relative_eq!(config.cuts.min_border_dist_m, 600.0);
        assert_eq!(config.read.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.output.logs_dir, PathBuf::from("out/logs"));
    }

    #[test]
    fn test_array_override_reselects_files() {
        let config = RunConfig::from_yaml(YAML)
            .unwrap()
            .with_array_type(ArrayType::Tasd)
            .unwrap();
        assert_eq!(
            config.files().unwrap().ordered()[1],
            Path::new("/data/ta_dt.parquet")
        );
    }

    #[test]
    fn test_unknown_array_type_rejected() {
        let yaml = YAML.replace("type: CBSD", "type: MDSD");
        let err = RunConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("MDSD"));
    }

    #[test]
    fn test_missing_files_for_array_rejected() {
        let yaml = r"
array: { type: TASD }
run: { time_s: 1.0 }
";
        let err = RunConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("TASD"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let yaml = r"
array: { type: TASD }
data:
  tasd: { mc_file: mc.parquet, dt_file: dt.parquet }
run: { time_s: 10.0, batch_size: 1000 }
";
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.cuts, QualityCuts::default());
        assert_eq!(config.energy_bins.len(), 16);
        assert_eq!(config.read.batch_size, 1000);
        assert_relative_eq!(
            config.geometry.generated_solid_angle_sr,
            3.0 * PI / 4.0
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_bins = YAML.replace("[18.0, 18.5, 19.0, 19.5]", "[18.0, 18.0, 19.0]");
        assert!(RunConfig::from_yaml(&bad_bins).is_err());

        let bad_area = YAML.replace("1.0e9", "-1.0");
        assert!(RunConfig::from_yaml(&bad_area).is_err());

        let bad_time = YAML.replace("3.0e8", "-5.0");
        assert!(RunConfig::from_yaml(&bad_time).is_err());

        let config = RunConfig::from_yaml(YAML).unwrap();
        assert!(config
            .clone()
            .with_read_options(ReadOptions::default().with_batch_size(0))
            .is_err());
        for parallelism in [0, MAX_PARALLELISM + 1, usize::MAX] {
            assert!(config
                .clone()
                .with_read_options(ReadOptions::default().with_parallelism(parallelism))
                .is_err());
        }
        assert!(config
            .clone()
            .with_read_options(ReadOptions::default().with_parallelism(MAX_PARALLELISM))
            .is_ok());

        let bad_parallelism =
            YAML.replace("time_s: 3.0e8", "time_s: 3.0e8\n  parallelism: 100000");
        assert!(RunConfig::from_yaml(&bad_parallelism).is_err());

        let cuts = QualityCuts {
            max_theta_deg: f64::NAN,
            ..QualityCuts::default()
        };
        assert!(config.clone().with_cuts(cuts).is_err());
        let cuts = QualityCuts {
            max_theta_deg: 50.0,
            ..QualityCuts::default()
        };
        assert_relative_eq!(config.with_cuts(cuts).unwrap().cuts.max_theta_deg, 50.0);
    }

    #[test]
    fn test_zenith_offsets() {
        assert_relative_eq!(ArrayType::Tasd.zenith_offset_deg(), 0.5);
        assert_relative_eq!(ArrayType::Cbsd.zenith_offset_deg(), 1.0);
        assert_eq!("CBSD".parse::<ArrayType>().unwrap(), ArrayType::Cbsd);
        assert!("tasd".parse::<ArrayType>().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, YAML).unwrap();
        let config = RunConfig::from_file(&path).unwrap();
        assert_eq!(config.array_type(), ArrayType::Cbsd);

        let missing = RunConfig::from_file(dir.path().join("absent.yaml"));
        assert!(matches!(missing, Err(Error::Config(_))));
    }

    #[test]
    fn test_shipped_default_config() {
        let yaml = include_str!("../../config/default_config.yaml");
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.array_type(), ArrayType::Tasd);
        assert_eq!(config.cuts, QualityCuts::default());
        let defaults = EnergyBins::default();
        assert_eq!(config.energy_bins.len(), defaults.len());
        for (a, b) in config.energy_bins.edges().iter().zip(defaults.edges()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-12);
        }
        assert_relative_eq!(
            config.geometry.area_solid_angle(),
            GeneratedGeometry::default().area_solid_angle(),
            max_relative = 1e-12
        );
    }
}
