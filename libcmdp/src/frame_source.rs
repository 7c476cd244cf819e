use fxhash::FxHashMap;
use ndarray::{Array3, Axis, Ix2, Ix3};
use std::path::{Path, PathBuf};

use super::detector::DetectorId;
use super::error::FrameReadError;

/// Name of the directory holding a scan's frames (and of its output directory)
pub fn scan_directory_name(scan_number: u32) -> String {
    format!("Scan_{scan_number}")
}

/// Access to the raw detector frames of a scan.
///
/// Implementations must be shareable between worker threads; every read is independent.
pub trait FrameSource: Sync {
    /// Frame files recorded by `detector` during a scan, sorted in raster order
    fn frame_files(
        &self,
        scan_number: u32,
        detector: DetectorId,
    ) -> Result<Vec<PathBuf>, FrameReadError>;

    /// Read the frame stack stored under `name` in a frame file as `(n, rows, cols)`
    fn read_frames(&self, path: &Path, name: &str) -> Result<Array3<f64>, FrameReadError>;
}

/// Reads NeXus/HDF5 frame files laid out as `<frames_root>/Scan_<n>/*<suffix>`
#[derive(Debug, Clone)]
pub struct Hdf5FrameSource {
    frames_root: PathBuf,
}

impl Hdf5FrameSource {
    pub fn new(frames_root: PathBuf) -> Self {
        Self { frames_root }
    }
}

impl FrameSource for Hdf5FrameSource {
    fn frame_files(
        &self,
        scan_number: u32,
        detector: DetectorId,
    ) -> Result<Vec<PathBuf>, FrameReadError> {
        let scan_dir = self.frames_root.join(scan_directory_name(scan_number));
        if !scan_dir.exists() {
            return Err(FrameReadError::BadDirectory(scan_dir));
        }
        let mut file_list: Vec<PathBuf> = Vec::new();
        for item in scan_dir.read_dir()? {
            let item_path = item?.path();
            let is_match = item_path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(detector.raw_suffix()));
            if is_match {
                file_list.push(item_path);
            }
        }
        // Lexicographic order is the acquisition order
        file_list.sort();

        let total_size_bytes = file_list
            .iter()
            .filter_map(|path| path.metadata().ok())
            .fold(0, |sum, meta| sum + meta.len());
        log::info!(
            "Found {} {} files in {} ({})",
            file_list.len(),
            detector,
            scan_dir.display(),
            human_bytes::human_bytes(total_size_bytes as f64)
        );
        Ok(file_list)
    }

    fn read_frames(&self, path: &Path, name: &str) -> Result<Array3<f64>, FrameReadError> {
        if !path.exists() {
            return Err(FrameReadError::MissingFile(path.to_path_buf()));
        }
        let file = hdf5::File::open(path)?;
        let data = file.dataset(name)?.read_dyn::<f64>()?;
        match data.ndim() {
            // A lone frame is a stack of one
            2 => Ok(data
                .into_dimensionality::<Ix2>()
                .map_err(|_| bad_rank(path, 2))?
                .insert_axis(Axis(0))),
            3 => data
                .into_dimensionality::<Ix3>()
                .map_err(|_| bad_rank(path, 3)),
            ndim => Err(bad_rank(path, ndim)),
        }
    }
}

fn bad_rank(path: &Path, ndim: usize) -> FrameReadError {
    FrameReadError::BadRank {
        path: path.to_path_buf(),
        ndim,
    }
}

/// Frame files held in memory, keyed by path. Used to drive reductions without touching
/// the filesystem.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrameSource {
    files: FxHashMap<PathBuf, Array3<f64>>,
}

impl MemoryFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a frame file `<Scan_n>/<file_name>`
    pub fn insert(&mut self, scan_number: u32, file_name: &str, frames: Array3<f64>) {
        let path = PathBuf::from(scan_directory_name(scan_number)).join(file_name);
        self.files.insert(path, frames);
    }
}

impl FrameSource for MemoryFrameSource {
    fn frame_files(
        &self,
        scan_number: u32,
        detector: DetectorId,
    ) -> Result<Vec<PathBuf>, FrameReadError> {
        let scan_dir = PathBuf::from(scan_directory_name(scan_number));
        let mut file_list: Vec<PathBuf> = self
            .files
            .keys()
            .filter(|path| path.parent() == Some(scan_dir.as_path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.ends_with(detector.raw_suffix()))
            })
            .cloned()
            .collect();
        file_list.sort();
        Ok(file_list)
    }

    fn read_frames(&self, path: &Path, _name: &str) -> Result<Array3<f64>, FrameReadError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| FrameReadError::MissingFile(path.to_path_buf()))
    }
}
