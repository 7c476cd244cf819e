use ndarray::{Array1, Array2, Array3, ArrayView3, Axis};
use std::path::PathBuf;

use super::detector::{Detector, DetectorId};
use super::error::AggregateError;
use super::frame_source::FrameSource;
use super::geometry::ScanGeometry;
use super::pool::WorkerPool;
use super::reducer::{FrameBatch, FrameReducer, OutputKind};

/// Every reduced position of one detector, in raster order
#[derive(Debug, Clone, PartialEq)]
pub enum ReducedSeries {
    Images(Array3<f64>),
    Sums(Array1<f64>),
}

impl ReducedSeries {
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

/// Reduce every frame file of a detector on the pool and join the batches in file order.
///
/// `files` must already be in raster order. Any failing file fails the whole detector, as
/// a missing batch would shift every following position.
pub fn reduce_detector<S, P>(
    files: &[PathBuf],
    reducer: &FrameReducer,
    detector: &Detector,
    source: &S,
    pool: &WorkerPool,
    progress: P,
) -> Result<ReducedSeries, AggregateError>
where
    S: FrameSource + ?Sized,
    P: FnMut(usize, usize),
{
    let batches = pool.try_map_with_progress(
        files,
        |path| reducer.reduce(source, path, detector),
        progress,
    )?;
    let series = concatenate_batches(batches, reducer.kind(), detector.frame_shape())?;
    log::info!("Reduced {} data shape: {}", detector.id, series_shape(&series));
    Ok(series)
}

/// Join batches along the position axis.
///
/// Every batch must be of the variant produced for `kind`.
pub fn concatenate_batches(
    batches: Vec<FrameBatch>,
    kind: OutputKind,
    frame_shape: (usize, usize),
) -> Result<ReducedSeries, AggregateError> {
    match kind {
        OutputKind::SummaryMap => {
            let mut sums = Vec::with_capacity(batches.len());
            for batch in batches.iter() {
                match batch {
                    FrameBatch::Sums(batch_sums) => sums.extend(batch_sums.iter().copied()),
                    FrameBatch::Images(_) => return Err(AggregateError::BatchKindMismatch(kind)),
                }
            }
            Ok(ReducedSeries::Sums(Array1::from(sums)))
        }
        OutputKind::FullData => {
            let views = batches
                .iter()
                .map(|batch| match batch {
                    FrameBatch::Images(images) => Ok(images.view()),
                    FrameBatch::Sums(_) => Err(AggregateError::BatchKindMismatch(kind)),
                })
                .collect::<Result<Vec<ArrayView3<f64>>, AggregateError>>()?;
            if views.is_empty() {
                let (rows, cols) = frame_shape;
                return Ok(ReducedSeries::Images(Array3::zeros((0, rows, cols))));
            }
            Ok(ReducedSeries::Images(ndarray::concatenate(
                Axis(0),
                &views,
            )?))
        }
    }
}

fn series_shape(series: &ReducedSeries) -> String {
    match series {
        ReducedSeries::Images(images) => format!("{:?}", images.shape()),
        ReducedSeries::Sums(sums) => format!("{:?}", sums.shape()),
    }
}

/// Zero-pad a series of intensities to the full raster and reshape it to
/// `(fast_size, slow_size)` in row-major order.
///
/// A series longer than the raster means the log and the frames disagree and is an error.
pub fn pad_to_raster(
    series: Array1<f64>,
    geometry: &ScanGeometry,
) -> Result<Array2<f64>, AggregateError> {
    let capacity = geometry.n_positions();
    let len = series.len();
    if len > capacity {
        return Err(AggregateError::ShapeOverflow { len, capacity });
    }
    let padded = if len < capacity {
        log::warn!(
            "Series holds {len} of {capacity} raster positions; padding {} with zeros",
            capacity - len
        );
        let mut values = series.to_vec();
        values.resize(capacity, 0.0);
        Array1::from(values)
    } else {
        series
    };
    Ok(padded.into_shape(geometry.shape())?)
}

/// Divide every detector map elementwise by the reference detector's map.
///
/// Division by zero is not special-cased: a zero reference pixel yields `NaN` (for a zero
/// numerator) or an infinity in every normalized map.
pub fn normalize_maps(
    maps: &[(DetectorId, Array2<f64>)],
    reference: DetectorId,
) -> Result<Vec<(DetectorId, Array2<f64>)>, AggregateError> {
    let reference_map = maps
        .iter()
        .find(|(id, _)| *id == reference)
        .map(|(_, map)| map)
        .ok_or(AggregateError::MissingReference(reference))?;
    maps.iter()
        .map(|(id, map)| {
            if map.shape() != reference_map.shape() {
                return Err(AggregateError::MapShapeMismatch(
                    *id,
                    map.shape().to_vec(),
                    reference_map.shape().to_vec(),
                ));
            }
            Ok((*id, map / reference_map))
        })
        .collect()
}
