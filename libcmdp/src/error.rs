use std::path::PathBuf;
use thiserror::Error;

use super::constants::*;
use super::detector::DetectorId;
use super::reducer::OutputKind;
use super::worker_status::WorkerStatus;

#[derive(Debug, Error)]
pub enum LogParseError {
    #[error("Could not open scan log because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Scan log failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Scan log declared {0} sizes; expected at least {exp}", exp=N_DECLARED_SIZES)]
    MissingSizes(usize),
    #[error("Scan log declares a raster of {fast} x {slow} positions, which is too large")]
    SizeOverflow { fast: usize, slow: usize },
    #[error("Scan log line {line} has an invalid declared size {text:?}: {source}")]
    BadSize {
        line: usize,
        text: String,
        source: std::num::ParseIntError,
    },
}

#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Coordinate line {line} does not match the expected field layout: {text:?}")]
    BadCoordinateLine { line: usize, text: String },
    #[error("Coordinate line {line} has an invalid coordinate {text:?}: {source}")]
    BadCoordinateValue {
        line: usize,
        text: String,
        source: std::num::ParseFloatError,
    },
}

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Found invalid detector keyword: {0}")]
    InvalidKeyword(String),
}

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Could not open calibration because file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Calibration failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
}

#[derive(Debug, Error)]
pub enum FrameReadError {
    #[error("Could not read frames because file {0:?} does not exist")]
    MissingFile(PathBuf),
    #[error("Could not list frames because directory {0:?} does not exist")]
    BadDirectory(PathBuf),
    #[error("Frame file {path:?} holds a {ndim}-dimensional array; expected a frame stack")]
    BadRank { path: PathBuf, ndim: usize },
    #[error("Frame file {path:?} holds {frame:?} frames but the detector mask is {mask:?}")]
    ShapeMismatch {
        path: PathBuf,
        frame: (usize, usize),
        mask: (usize, usize),
    },
    #[error("Frame file {0:?} holds no frames to average")]
    EmptyStack(PathBuf),
    #[error("Frame read failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("Frame read failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("Reduced series of length {len} overflows the raster of {capacity} positions")]
    ShapeOverflow { len: usize, capacity: usize },
    #[error("Detector map {0} has shape {1:?}, but the reference map has shape {2:?}")]
    MapShapeMismatch(DetectorId, Vec<usize>, Vec<usize>),
    #[error("Reference detector {0} has no reduced map to normalize against")]
    MissingReference(DetectorId),
    #[error("Reduced data does not match the requested {0} output")]
    BatchKindMismatch(OutputKind),
    #[error("Aggregator failed due to frame error: {0}")]
    FrameError(#[from] FrameReadError),
    #[error("Aggregator failed due to array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

#[derive(Debug, Error)]
pub enum HDF5WriterError {
    #[error("HDF5Writer failed due to HDF5 error: {0}")]
    HDF5Error(#[from] hdf5::Error),
    #[error("HDF5Writer failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("HDF5Writer failed to encode a string attribute: {0}")]
    StringError(#[from] hdf5::types::StringError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config requested {0} worker threads; at least 1 is required")]
    BadThreadCount(i32),
    #[error("Config scan range is reversed -- first: {0} last: {1}")]
    BadScanRange(u32, u32),
    #[error("Config reference detector {0} is not among the processed detectors")]
    BadReference(DetectorId),
    #[error("Config compression level {0} is outside of 0-9")]
    BadCompression(u8),
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor failed due to scan log error: {0}")]
    LogError(#[from] LogParseError),
    #[error("Processor failed due to geometry error: {0}")]
    GeometryError(#[from] GeometryError),
    #[error("Processor failed due to calibration error: {0}")]
    CalibrationError(#[from] CalibrationError),
    #[error("Processor failed to reduce detector {0}: {1}")]
    DetectorError(DetectorId, AggregateError),
    #[error("Processor failed due to aggregation error: {0}")]
    AggregateError(#[from] AggregateError),
    #[error("Processor failed due to HDF5Writer error: {0}")]
    HDFError(#[from] HDF5WriterError),
    #[error("Processor failed due to Config error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Processor failed due to Send error: {0}")]
    SendError(#[from] std::sync::mpsc::SendError<WorkerStatus>),
    #[error("Processor failed due to IO error: {0}")]
    IoError(#[from] std::io::Error),
}
