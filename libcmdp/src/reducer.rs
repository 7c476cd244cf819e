use ndarray::{Array1, Array3, Axis, Zip};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::constants::FRAME_DATA_PATH;
use super::detector::Detector;
use super::error::FrameReadError;
use super::frame_source::FrameSource;
use super::geometry::ScanMode;

/// What a reconstruction produces per detector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    /// The masked image of every position
    FullData,
    /// One normalized intensity per position, shaped into the raster (an STXM map)
    #[default]
    SummaryMap,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FullData => write!(f, "full_data"),
            Self::SummaryMap => write!(f, "summary_map"),
        }
    }
}

/// The reduced content of one frame file
#[derive(Debug, Clone, PartialEq)]
pub enum FrameBatch {
    /// Masked images, `(n, rows, cols)`
    Images(Array3<f64>),
    /// Masked intensities, `(n,)`
    Sums(Array1<f64>),
}

impl FrameBatch {
    /// Number of raster positions covered by the batch
    pub fn len(&self) -> usize {
        match self {
            Self::Images(images) => images.len_of(Axis(0)),
            Self::Sums(sums) => sums.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reduction strategy selected by scan mode and output kind.
///
/// Reducing is a pure function of the frame file and the detector, so files may be reduced
/// in any order and on any thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReducer {
    mode: ScanMode,
    kind: OutputKind,
}

impl FrameReducer {
    pub fn new(mode: ScanMode, kind: OutputKind) -> Self {
        Self { mode, kind }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    /// Read one frame file and reduce it
    pub fn reduce<S: FrameSource + ?Sized>(
        &self,
        source: &S,
        path: &Path,
        detector: &Detector,
    ) -> Result<FrameBatch, FrameReadError> {
        let stack = source.read_frames(path, FRAME_DATA_PATH)?;
        self.reduce_stack(path, stack, detector)
    }

    /// Reduce a frame stack already read from `path`
    pub fn reduce_stack(
        &self,
        path: &Path,
        mut stack: Array3<f64>,
        detector: &Detector,
    ) -> Result<FrameBatch, FrameReadError> {
        let (_, rows, cols) = stack.dim();
        if (rows, cols) != detector.frame_shape() {
            return Err(FrameReadError::ShapeMismatch {
                path: path.to_path_buf(),
                frame: (rows, cols),
                mask: detector.frame_shape(),
            });
        }
        let mask = detector.mask();

        match self.mode {
            // Each step file is a burst of exposures of one position
            ScanMode::Step => {
                let mean = stack
                    .mean_axis(Axis(0))
                    .ok_or_else(|| FrameReadError::EmptyStack(path.to_path_buf()))?;
                let image = mask.apply(mean.view());
                match self.kind {
                    OutputKind::FullData => Ok(FrameBatch::Images(image.insert_axis(Axis(0)))),
                    OutputKind::SummaryMap => Ok(FrameBatch::Sums(Array1::from_elem(1, image.sum()))),
                }
            }
            ScanMode::Fly => match self.kind {
                OutputKind::FullData => {
                    for frame in stack.axis_iter_mut(Axis(0)) {
                        mask.apply_inplace(frame);
                    }
                    Ok(FrameBatch::Images(stack))
                }
                OutputKind::SummaryMap => {
                    let roi = detector.roi;
                    let valid = roi.view(mask.valid());
                    let sums = stack
                        .axis_iter(Axis(0))
                        .map(|frame| {
                            Zip::from(&roi.view(frame))
                                .and(&valid)
                                .fold(0.0, |acc, &value, &ok| if ok { acc + value } else { acc })
                        })
                        .collect::<Array1<f64>>();
                    Ok(FrameBatch::Sums(sums))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{DetectorId, DetectorSet};
    use ndarray::{array, Array2};

    fn detector(id: DetectorId, valid: Array2<bool>) -> Detector {
        DetectorSet::from_masks(vec![(id, valid)])
            .get(id)
            .cloned()
            .unwrap()
    }

    fn checker_mask() -> Array2<bool> {
        array![[true, false], [true, true]]
    }

    fn two_frames() -> Array3<f64> {
        array![[[1.0, 10.0], [2.0, 3.0]], [[3.0, 30.0], [4.0, 5.0]]]
    }

    #[test]
    fn test_step_image_averages_then_masks() {
        let det = detector(DetectorId::LambdaDown, checker_mask());
        let reducer = FrameReducer::new(ScanMode::Step, OutputKind::FullData);
        let batch = reducer
            .reduce_stack(Path::new("a.nxs"), two_frames(), &det)
            .unwrap();
        assert_eq!(
            batch,
            FrameBatch::Images(array![[[2.0, 0.0], [3.0, 4.0]]])
        );
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_step_sum_ignores_roi() {
        // The far detector ROI lies outside a 2x2 frame, step sums must not use it
        let det = detector(DetectorId::LambdaFar, checker_mask());
        let reducer = FrameReducer::new(ScanMode::Step, OutputKind::SummaryMap);
        let batch = reducer
            .reduce_stack(Path::new("a.nxs"), two_frames(), &det)
            .unwrap();
        assert_eq!(batch, FrameBatch::Sums(array![9.0]));
    }

    #[test]
    fn test_fly_image_masks_each_frame() {
        let det = detector(DetectorId::LambdaDown, checker_mask());
        let reducer = FrameReducer::new(ScanMode::Fly, OutputKind::FullData);
        let batch = reducer
            .reduce_stack(Path::new("a.nxs"), two_frames(), &det)
            .unwrap();
        assert_eq!(
            batch,
            FrameBatch::Images(array![[[1.0, 0.0], [2.0, 3.0]], [[3.0, 0.0], [4.0, 5.0]]])
        );
    }

    #[test]
    fn test_fly_sum_uses_roi() {
        let det = detector(DetectorId::LambdaDown, checker_mask());
        let reducer = FrameReducer::new(ScanMode::Fly, OutputKind::SummaryMap);
        let batch = reducer
            .reduce_stack(Path::new("a.nxs"), two_frames(), &det)
            .unwrap();
        assert_eq!(batch, FrameBatch::Sums(array![6.0, 12.0]));

        // Only rows 0..301 count for the up detector
        let mut stack = Array3::<f64>::ones((3, 310, 4));
        stack[[1, 305, 0]] = 100.0;
        let det = detector(DetectorId::LambdaUp, Array2::from_elem((310, 4), true));
        let batch = reducer
            .reduce_stack(Path::new("b.nxs"), stack, &det)
            .unwrap();
        assert_eq!(batch, FrameBatch::Sums(array![1204.0, 1204.0, 1204.0]));
    }

    #[test]
    fn test_shape_mismatch() {
        let det = detector(DetectorId::LambdaDown, Array2::from_elem((3, 3), true));
        let reducer = FrameReducer::new(ScanMode::Fly, OutputKind::SummaryMap);
        assert!(matches!(
            reducer.reduce_stack(Path::new("a.nxs"), two_frames(), &det),
            Err(FrameReadError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_empty_step_file() {
        let det = detector(DetectorId::LambdaDown, checker_mask());
        let reducer = FrameReducer::new(ScanMode::Step, OutputKind::SummaryMap);
        assert!(matches!(
            reducer.reduce_stack(Path::new("a.nxs"), Array3::zeros((0, 2, 2)), &det),
            Err(FrameReadError::EmptyStack(_))
        ));
        let reducer = FrameReducer::new(ScanMode::Fly, OutputKind::SummaryMap);
        let batch = reducer
            .reduce_stack(Path::new("a.nxs"), Array3::zeros((0, 2, 2)), &det)
            .unwrap();
        assert!(batch.is_empty());
    }
}
