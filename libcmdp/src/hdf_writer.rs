use fxhash::FxHashMap;
use hdf5::types::VarLenUnicode;
use hdf5::{File, Group};
use ndarray::{arr0, Array1, Array2, Array3};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::error::HDF5WriterError;

pub const DETECTOR_DATA_NAME: &str = "detector_data";
pub const MOTOR_COORDINATES_NAME: &str = "motor_coordinates";
pub const FAST_COORDINATES_NAME: &str = "fast_coordinates";
pub const SLOW_COORDINATES_NAME: &str = "slow_coordinates";
pub const SCAN_SIZE_NAME: &str = "scan_size";
pub const FAST_SIZE_NAME: &str = "fast_size";
pub const SLOW_SIZE_NAME: &str = "slow_size";

/// This is the version of the output format
const FORMAT_VERSION: &str = "1.0";

// Structure
// / - version, mode, kind
// |---- detector_data
// |    |---- lambda_up(dset)   (n, rows, cols) images or (fast_size, slow_size) map
// |    |---- lambda_far(dset)
// |    |---- lambda_down(dset)
// |---- motor_coordinates
// |    |---- fast_coordinates(dset)
// |    |---- slow_coordinates(dset)
// |---- scan_size
// |    |---- fast_size(scalar dset)
// |    |---- slow_size(scalar dset)

/// Destination of a reconstruction: accepts named arrays within named groups.
pub trait ScanSink {
    /// Write a stack of images (compressed where the sink supports it)
    fn write_images(
        &mut self,
        group: &str,
        name: &str,
        data: &Array3<f64>,
    ) -> Result<(), HDF5WriterError>;

    fn write_map(&mut self, group: &str, name: &str, data: &Array2<f64>)
        -> Result<(), HDF5WriterError>;

    fn write_series(
        &mut self,
        group: &str,
        name: &str,
        data: &Array1<f64>,
    ) -> Result<(), HDF5WriterError>;

    fn write_scalar(&mut self, group: &str, name: &str, value: u64)
        -> Result<(), HDF5WriterError>;
}

/// A simple struct which wraps around the hdf5-rust library.
///
/// Opens an HDF5 file for writing one reconstructed scan. Image stacks are gzip compressed
/// at the configured level (0 disables compression).
#[derive(Debug)]
pub struct HDFWriter {
    file_handle: File,
    file_path: PathBuf,
    compression_level: u8,
    n_datasets: usize,
}

impl HDFWriter {
    /// Create the writer, opening a file at path and tagging it with the reconstruction
    /// settings
    pub fn new(
        path: &Path,
        mode: &str,
        kind: &str,
        compression_level: u8,
    ) -> Result<Self, HDF5WriterError> {
        let file_handle = File::create(path)?;
        let version = format!("{}:{}", env!("CARGO_PKG_NAME"), FORMAT_VERSION);
        for (name, value) in [("version", version.as_str()), ("mode", mode), ("kind", kind)] {
            let value = VarLenUnicode::from_str(value)?;
            file_handle
                .new_attr::<VarLenUnicode>()
                .create(name)?
                .write_scalar(&value)?;
        }
        log::info!("Output path: {}", path.display());
        Ok(Self {
            file_handle,
            file_path: path.to_path_buf(),
            compression_level,
            n_datasets: 0,
        })
    }

    fn group(&self, name: &str) -> Result<Group, HDF5WriterError> {
        match self.file_handle.group(name) {
            Ok(group) => Ok(group),
            Err(_) => Ok(self.file_handle.create_group(name)?),
        }
    }

    /// Flush and close the file, consume the writer
    pub fn close(self) -> Result<(), HDF5WriterError> {
        self.file_handle.flush()?;
        log::info!(
            "{} datasets written to {}",
            self.n_datasets,
            self.file_path.display()
        );
        Ok(())
    }
}

impl ScanSink for HDFWriter {
    fn write_images(
        &mut self,
        group: &str,
        name: &str,
        data: &Array3<f64>,
    ) -> Result<(), HDF5WriterError> {
        let group = self.group(group)?;
        let builder = group.new_dataset_builder().with_data(data);
        if self.compression_level > 0 && !data.is_empty() {
            builder.deflate(self.compression_level).create(name)?;
        } else {
            builder.create(name)?;
        }
        self.n_datasets += 1;
        Ok(())
    }

    fn write_map(
        &mut self,
        group: &str,
        name: &str,
        data: &Array2<f64>,
    ) -> Result<(), HDF5WriterError> {
        self.group(group)?
            .new_dataset_builder()
            .with_data(data)
            .create(name)?;
        self.n_datasets += 1;
        Ok(())
    }

    fn write_series(
        &mut self,
        group: &str,
        name: &str,
        data: &Array1<f64>,
    ) -> Result<(), HDF5WriterError> {
        self.group(group)?
            .new_dataset_builder()
            .with_data(data)
            .create(name)?;
        self.n_datasets += 1;
        Ok(())
    }

    fn write_scalar(&mut self, group: &str, name: &str, value: u64) -> Result<(), HDF5WriterError> {
        self.group(group)?
            .new_dataset_builder()
            .with_data(&arr0(value))
            .create(name)?;
        self.n_datasets += 1;
        Ok(())
    }
}

/// Keeps everything written to it in memory, keyed by `group/name`
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub images: FxHashMap<String, Array3<f64>>,
    pub maps: FxHashMap<String, Array2<f64>>,
    pub series: FxHashMap<String, Array1<f64>>,
    pub scalars: FxHashMap<String, u64>,
}

fn memory_key(group: &str, name: &str) -> String {
    format!("{group}/{name}")
}

impl ScanSink for MemorySink {
    fn write_images(
        &mut self,
        group: &str,
        name: &str,
        data: &Array3<f64>,
    ) -> Result<(), HDF5WriterError> {
        self.images.insert(memory_key(group, name), data.clone());
        Ok(())
    }

    fn write_map(
        &mut self,
        group: &str,
        name: &str,
        data: &Array2<f64>,
    ) -> Result<(), HDF5WriterError> {
        self.maps.insert(memory_key(group, name), data.clone());
        Ok(())
    }

    fn write_series(
        &mut self,
        group: &str,
        name: &str,
        data: &Array1<f64>,
    ) -> Result<(), HDF5WriterError> {
        self.series.insert(memory_key(group, name), data.clone());
        Ok(())
    }

    fn write_scalar(&mut self, group: &str, name: &str, value: u64) -> Result<(), HDF5WriterError> {
        self.scalars.insert(memory_key(group, name), value);
        Ok(())
    }
}
