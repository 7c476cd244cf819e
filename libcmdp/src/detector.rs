use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;
use std::str::FromStr;

use super::calibration::CalibrationMask;
use super::error::{CalibrationError, DetectorError};

/// The detectors installed at the beamline.
///
/// The set is closed: every detector has its raw file suffix, region of interest and
/// calibration dataset fixed at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorId {
    LambdaUp,
    LambdaFar,
    LambdaDown,
}

impl DetectorId {
    /// All detectors in their canonical processing order
    pub const ALL: [DetectorId; 3] = [Self::LambdaUp, Self::LambdaFar, Self::LambdaDown];

    /// Name of the detector in output containers and configuration files
    pub fn name(&self) -> &'static str {
        match self {
            Self::LambdaUp => "lambda_up",
            Self::LambdaFar => "lambda_far",
            Self::LambdaDown => "lambda_down",
        }
    }

    /// Suffix identifying this detector's raw frame files
    pub fn raw_suffix(&self) -> &'static str {
        match self {
            Self::LambdaUp => "_LambdaUp.nxs",
            Self::LambdaFar => "_LambdaFar.nxs",
            Self::LambdaDown => "_LambdaDown.nxs",
        }
    }

    /// Region summed when a fly scan frame is reduced to an intensity
    pub fn roi(&self) -> Roi {
        match self {
            Self::LambdaUp => Roi::new(Some((0, 301)), None),
            Self::LambdaFar => Roi::new(Some((140, 241)), Some((146, 247))),
            Self::LambdaDown => Roi::FULL,
        }
    }

    /// Name of the pixel mask dataset in the calibration file
    pub fn mask_dataset(&self) -> &'static str {
        match self {
            Self::LambdaUp => "pixelmask_up",
            Self::LambdaFar => "pixelmask_far",
            Self::LambdaDown => "pixelmask_down",
        }
    }
}

impl Display for DetectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for DetectorId {
    type Err = DetectorError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| DetectorError::InvalidKeyword(s.to_string()))
    }
}

/// A rectangular region of interest as independent half-open row and column ranges.
///
/// A range of `None` spans the whole axis. Ranges reaching past the frame are clamped to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub rows: Option<(usize, usize)>,
    pub cols: Option<(usize, usize)>,
}

impl Roi {
    pub const FULL: Roi = Roi {
        rows: None,
        cols: None,
    };

    pub const fn new(rows: Option<(usize, usize)>, cols: Option<(usize, usize)>) -> Self {
        Self { rows, cols }
    }

    /// View the region of a 2-D array
    pub fn view<'a, T>(&self, array: ArrayView2<'a, T>) -> ArrayView2<'a, T> {
        let (n_rows, n_cols) = array.dim();
        let (r0, r1) = clamp_range(self.rows, n_rows);
        let (c0, c1) = clamp_range(self.cols, n_cols);
        array.slice_move(s![r0..r1, c0..c1])
    }
}

fn clamp_range(range: Option<(usize, usize)>, len: usize) -> (usize, usize) {
    match range {
        Some((start, stop)) => {
            let stop = stop.min(len);
            (start.min(stop), stop)
        }
        None => (0, len),
    }
}

/// A detector together with its validity mask
#[derive(Debug, Clone)]
pub struct Detector {
    pub id: DetectorId,
    pub roi: Roi,
    mask: CalibrationMask,
}

impl Detector {
    pub fn new(id: DetectorId, mask: CalibrationMask) -> Self {
        Self {
            id,
            roi: id.roi(),
            mask,
        }
    }

    pub fn raw_suffix(&self) -> &'static str {
        self.id.raw_suffix()
    }

    pub fn mask(&self) -> &CalibrationMask {
        &self.mask
    }

    /// Spatial shape every frame of this detector must have
    pub fn frame_shape(&self) -> (usize, usize) {
        self.mask.dim()
    }
}

/// The detectors taking part in a reconstruction, loaded once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct DetectorSet {
    detectors: Vec<Detector>,
}

impl DetectorSet {
    /// Load the masks of the requested detectors from an HDF5 calibration file
    pub fn load(calibration_path: &Path, ids: &[DetectorId]) -> Result<Self, CalibrationError> {
        if !calibration_path.exists() {
            return Err(CalibrationError::BadFilePath(calibration_path.to_path_buf()));
        }
        let file = hdf5::File::open(calibration_path)?;
        let mut detectors = Vec::with_capacity(ids.len());
        for id in ids {
            let pixel_mask = file.dataset(id.mask_dataset())?.read_2d::<u32>()?;
            let mask = CalibrationMask::from_pixel_mask(pixel_mask.view());
            log::info!(
                "Loaded {} mask {:?} with {} bad pixels",
                id,
                mask.dim(),
                mask.n_invalid()
            );
            detectors.push(Detector::new(*id, mask));
        }
        Ok(Self { detectors })
    }

    /// Build a set from masks already in memory
    pub fn from_masks(masks: Vec<(DetectorId, Array2<bool>)>) -> Self {
        Self {
            detectors: masks
                .into_iter()
                .map(|(id, valid)| Detector::new(id, CalibrationMask::from_valid(valid)))
                .collect(),
        }
    }

    pub fn get(&self, id: DetectorId) -> Option<&Detector> {
        self.detectors.iter().find(|det| det.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detector> {
        self.detectors.iter()
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_detector_names_round_trip() {
        for id in DetectorId::ALL {
            assert_eq!(DetectorId::from_str(id.name()).unwrap(), id);
        }
        assert!(DetectorId::from_str("lambda_side").is_err());
    }

    #[test]
    fn test_roi_clamps_to_frame() {
        let frame = Array2::<f64>::ones((200, 300));
        let view = DetectorId::LambdaFar.roi().view(frame.view());
        assert_eq!(view.dim(), (60, 101));
        let view = DetectorId::LambdaUp.roi().view(frame.view());
        assert_eq!(view.dim(), (200, 300));
        let view = Roi::FULL.view(frame.view());
        assert_eq!(view.dim(), (200, 300));
    }

    #[test]
    fn test_roi_past_frame_is_empty() {
        let frame = Array2::<f64>::ones((100, 100));
        let view = DetectorId::LambdaFar.roi().view(frame.view());
        assert_eq!(view.dim(), (0, 0));
    }

    #[test]
    fn test_set_lookup() {
        let set = DetectorSet::from_masks(vec![
            (DetectorId::LambdaFar, Array2::from_elem((4, 3), true)),
            (DetectorId::LambdaDown, Array2::from_elem((2, 2), false)),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(DetectorId::LambdaFar).unwrap().frame_shape(), (4, 3));
        assert!(set.get(DetectorId::LambdaUp).is_none());
    }
}
