use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::constants::{FRAMES_DIR, LOG_DIR};
use super::detector::DetectorId;
use super::error::ConfigError;
use super::frame_source::scan_directory_name;
use super::geometry::ScanMode;
use super::log_parser::ParsePolicy;
use super::reducer::OutputKind;

/// Structure representing the application configuration. Contains pathing and scan information
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub raw_path: PathBuf,
    pub output_path: PathBuf,
    pub calibration_path: PathBuf,
    pub scan_mode: ScanMode,
    pub output_kind: OutputKind,
    pub first_scan_number: u32,
    pub last_scan_number: u32,
    pub n_threads: i32,
    pub parse_policy: ParsePolicy,
    pub detectors: Vec<DetectorId>,
    pub reference_detector: DetectorId,
    pub compression_level: u8,
}

impl Default for Config {
    /// Generate a new Config object. Paths will be empty/invalid
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from("None"),
            output_path: PathBuf::from("None"),
            calibration_path: PathBuf::from("None"),
            scan_mode: ScanMode::Step,
            output_kind: OutputKind::SummaryMap,
            first_scan_number: 0,
            last_scan_number: 0,
            n_threads: 1,
            parse_policy: ParsePolicy::Strict,
            detectors: DetectorId::ALL.to_vec(),
            reference_detector: DetectorId::LambdaFar,
            compression_level: 4,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file
    /// Returns a Config if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Check the settings which do not depend on the filesystem
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_n_threads_valid() {
            return Err(ConfigError::BadThreadCount(self.n_threads));
        }
        if self.first_scan_number > self.last_scan_number {
            return Err(ConfigError::BadScanRange(
                self.first_scan_number,
                self.last_scan_number,
            ));
        }
        if self.output_kind == OutputKind::SummaryMap
            && !self.detectors.contains(&self.reference_detector)
        {
            return Err(ConfigError::BadReference(self.reference_detector));
        }
        if self.compression_level > 9 {
            return Err(ConfigError::BadCompression(self.compression_level));
        }
        Ok(())
    }

    /// Check if a specific scan exists by evaluating the existance of its log
    pub fn does_scan_exist(&self, scan_number: u32) -> bool {
        self.get_log_path(scan_number).exists()
    }

    /// Get the path to the motor log of a scan
    pub fn get_log_path(&self, scan_number: u32) -> PathBuf {
        self.raw_path
            .join(LOG_DIR)
            .join(format!("{}.log", scan_directory_name(scan_number)))
    }

    /// Get the directory holding the per-scan frame directories
    pub fn get_frames_root(&self) -> PathBuf {
        self.raw_path.join(FRAMES_DIR)
    }

    /// Get the path to the output hdf5 file. The scan directory below the output path is
    /// not required to exist yet.
    pub fn get_hdf_file_name(&self, scan_number: u32) -> Result<PathBuf, ConfigError> {
        if !self.output_path.exists() {
            return Err(ConfigError::BadFilePath(self.output_path.clone()));
        }
        let file_name = match self.output_kind {
            OutputKind::FullData => format!("scan_{scan_number}_data.h5"),
            OutputKind::SummaryMap => format!("scan_{scan_number}.h5"),
        };
        Ok(self
            .output_path
            .join(scan_directory_name(scan_number))
            .join(file_name))
    }

    pub fn is_n_threads_valid(&self) -> bool {
        self.n_threads >= 1
    }

    pub fn n_scans(&self) -> u32 {
        self.last_scan_number.saturating_sub(self.first_scan_number) + 1
    }
}
