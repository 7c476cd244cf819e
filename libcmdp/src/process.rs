use ndarray::{Array2, Array3};
use std::sync::mpsc::Sender;

use super::aggregator::{normalize_maps, pad_to_raster, reduce_detector, ReducedSeries};
use super::config::Config;
use super::detector::{DetectorId, DetectorSet};
use super::error::{AggregateError, ProcessorError};
use super::frame_source::{FrameSource, Hdf5FrameSource};
use super::geometry::{ScanGeometry, ScanMode};
use super::hdf_writer::*;
use super::log_parser::ScanLog;
use super::pool::WorkerPool;
use super::reducer::{FrameReducer, OutputKind};
use super::worker_status::{BarColor, WorkerStatus};

/// The final product of a detector
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorOutput {
    /// Masked image per recorded position, `(n, rows, cols)`
    Images(Array3<f64>),
    /// Normalized intensity map, `(fast_size, slow_size)`
    Map(Array2<f64>),
}

/// Everything reconstructed for one scan
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub scan_number: u32,
    pub mode: ScanMode,
    pub kind: OutputKind,
    pub geometry: ScanGeometry,
    pub outputs: Vec<(DetectorId, DetectorOutput)>,
}

/// Reconstruct one scan, reading its log from the configured raw data directory.
///
/// `progress(detector_index, done, total)` is called as frame files complete.
pub fn reconstruct<S, P>(
    config: &Config,
    scan_number: u32,
    detectors: &DetectorSet,
    source: &S,
    pool: &WorkerPool,
    progress: P,
) -> Result<Reconstruction, ProcessorError>
where
    S: FrameSource + ?Sized,
    P: FnMut(usize, usize, usize),
{
    let log_path = config.get_log_path(scan_number);
    log::info!("Reading motor coordinates from {}", log_path.display());
    let log = ScanLog::read(&log_path, config.parse_policy)?;
    reconstruct_with_log(config, scan_number, &log, detectors, source, pool, progress)
}

/// Reconstruct one scan from an already parsed log
pub fn reconstruct_with_log<S, P>(
    config: &Config,
    scan_number: u32,
    log: &ScanLog,
    detectors: &DetectorSet,
    source: &S,
    pool: &WorkerPool,
    mut progress: P,
) -> Result<Reconstruction, ProcessorError>
where
    S: FrameSource + ?Sized,
    P: FnMut(usize, usize, usize),
{
    let geometry = ScanGeometry::from_log(config.scan_mode, log, config.parse_policy)?;
    log::info!(
        "Scan {} ({} mode) raster shape: {:?}",
        scan_number,
        config.scan_mode,
        geometry.shape()
    );

    let reducer = FrameReducer::new(config.scan_mode, config.output_kind);
    let mut series = Vec::with_capacity(detectors.len());
    for (det_idx, detector) in detectors.iter().enumerate() {
        let files = source
            .frame_files(scan_number, detector.id)
            .map_err(|e| ProcessorError::DetectorError(detector.id, e.into()))?;
        let reduced = reduce_detector(&files, &reducer, detector, source, pool, |done, total| {
            progress(det_idx, done, total)
        })
        .map_err(|e| ProcessorError::DetectorError(detector.id, e))?;
        series.push((detector.id, reduced));
    }

    let kind = config.output_kind;
    let outputs = match kind {
        OutputKind::FullData => series
            .into_iter()
            .map(|(id, reduced)| match reduced {
                ReducedSeries::Images(images) => Ok((id, DetectorOutput::Images(images))),
                ReducedSeries::Sums(_) => Err(ProcessorError::DetectorError(
                    id,
                    AggregateError::BatchKindMismatch(kind),
                )),
            })
            .collect::<Result<Vec<_>, ProcessorError>>()?,
        OutputKind::SummaryMap => {
            let mut maps = Vec::with_capacity(series.len());
            for (id, reduced) in series {
                let sums = match reduced {
                    ReducedSeries::Sums(sums) => sums,
                    ReducedSeries::Images(_) => {
                        return Err(ProcessorError::DetectorError(
                            id,
                            AggregateError::BatchKindMismatch(kind),
                        ))
                    }
                };
                let map = pad_to_raster(sums, &geometry)
                    .map_err(|e| ProcessorError::DetectorError(id, e))?;
                maps.push((id, map));
            }
            normalize_maps(&maps, config.reference_detector)?
                .into_iter()
                .map(|(id, map)| (id, DetectorOutput::Map(map)))
                .collect()
        }
    };

    Ok(Reconstruction {
        scan_number,
        mode: config.scan_mode,
        kind,
        geometry,
        outputs,
    })
}

/// Write a reconstruction in the standard container layout
pub fn write_reconstruction<W: ScanSink + ?Sized>(
    sink: &mut W,
    reconstruction: &Reconstruction,
) -> Result<(), ProcessorError> {
    for (id, output) in reconstruction.outputs.iter() {
        match output {
            DetectorOutput::Images(images) => {
                sink.write_images(DETECTOR_DATA_NAME, id.name(), images)?
            }
            DetectorOutput::Map(map) => sink.write_map(DETECTOR_DATA_NAME, id.name(), map)?,
        }
    }

    let geometry = &reconstruction.geometry;
    log::info!("Writing motor coordinates, scan size: {:?}", geometry.shape());
    sink.write_series(
        MOTOR_COORDINATES_NAME,
        FAST_COORDINATES_NAME,
        &geometry.fast_coords,
    )?;
    sink.write_series(
        MOTOR_COORDINATES_NAME,
        SLOW_COORDINATES_NAME,
        &geometry.slow_coords,
    )?;
    sink.write_scalar(SCAN_SIZE_NAME, FAST_SIZE_NAME, geometry.fast_size as u64)?;
    sink.write_scalar(SCAN_SIZE_NAME, SLOW_SIZE_NAME, geometry.slow_size as u64)?;
    Ok(())
}

/// Reconstruct a scan from disk and write it to the configured output directory
pub fn process_scan(
    config: &Config,
    detectors: &DetectorSet,
    scan_number: u32,
    tx: &Sender<WorkerStatus>,
) -> Result<(), ProcessorError> {
    let source = Hdf5FrameSource::new(config.get_frames_root());
    let pool = WorkerPool::new(config.n_threads as usize);
    let n_detectors = detectors.len().max(1) as f32;

    tx.send(WorkerStatus::new(0.0, scan_number, BarColor::CYAN))?;
    let reconstruction = reconstruct(
        config,
        scan_number,
        detectors,
        &source,
        &pool,
        |det_idx, done, total| {
            let progress = (det_idx as f32 + done as f32 / total as f32) / n_detectors;
            // A closed channel only means nobody is watching
            let _ = tx.send(WorkerStatus::new(progress, scan_number, BarColor::CYAN));
        },
    )?;

    tx.send(WorkerStatus::new(0.0, scan_number, BarColor::GREEN))?;
    let hdf_path = config.get_hdf_file_name(scan_number)?;
    if let Some(scan_dir) = hdf_path.parent() {
        std::fs::create_dir_all(scan_dir)?;
    }
    let mut writer = HDFWriter::new(
        &hdf_path,
        &config.scan_mode.to_string(),
        &config.output_kind.to_string(),
        config.compression_level,
    )?;
    write_reconstruction(&mut writer, &reconstruction)?;
    writer.close()?;
    tx.send(WorkerStatus::new(1.0, scan_number, BarColor::GREEN))?;
    Ok(())
}

/// The main loop of cmdp.
///
/// Loads the detector calibration once, then reconstructs every scan of the configured
/// range. Scans without a log are skipped.
pub fn process(config: Config, tx: Sender<WorkerStatus>) -> Result<(), ProcessorError> {
    config.validate()?;
    let detectors = DetectorSet::load(&config.calibration_path, &config.detectors)?;
    for scan in config.first_scan_number..=config.last_scan_number {
        if config.does_scan_exist(scan) {
            log::info!("Processing scan {}...", scan);
            process_scan(&config, &detectors, scan, &tx)?;
            log::info!("Finished processing scan {}.", scan);
        } else {
            log::info!("Scan {} does not exist, skipping...", scan);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_source::MemoryFrameSource;
    use crate::log_parser::ParsePolicy;
    use ndarray::Array3;

    /// Step log over a `fast` x `slow` raster, every point recorded
    fn step_log(fast: usize, slow: usize) -> ScanLog {
        let mut text = format!(
            "# Points count: {}\n# Points count: {slow}\n# Points count: {fast}\n",
            fast * slow
        );
        for point in 0..fast * slow {
            text.push_str("move\n");
            if point % fast == 0 {
                text.push_str("line\n");
            }
            text.push_str(&format!("p;{}um;{}um\n", point / fast, point % fast));
        }
        ScanLog::parse(&text, ParsePolicy::Strict).unwrap()
    }

    fn detectors() -> DetectorSet {
        DetectorSet::from_masks(
            DetectorId::ALL
                .iter()
                .map(|id| (*id, Array2::from_elem((2, 2), true)))
                .collect(),
        )
    }

    fn config(mode: ScanMode, kind: OutputKind) -> Config {
        Config {
            scan_mode: mode,
            output_kind: kind,
            ..Default::default()
        }
    }

    #[test]
    fn test_step_summary_scenario() {
        let log = step_log(5, 4);
        let mut source = MemoryFrameSource::new();
        for point in 0..20 {
            let value = point as f64 + 1.0;
            source.insert(3, &format!("{point:04}_LambdaFar.nxs"), Array3::from_elem((2, 2, 2), value));
            source.insert(3, &format!("{point:04}_LambdaUp.nxs"), Array3::from_elem((2, 2, 2), 2.0 * value));
            // The down detector lost its last two files
            if point < 18 {
                source.insert(3, &format!("{point:04}_LambdaDown.nxs"), Array3::from_elem((1, 2, 2), value));
            }
        }

        let mut progress_calls = 0;
        let reconstruction = reconstruct_with_log(
            &config(ScanMode::Step, OutputKind::SummaryMap),
            3,
            &log,
            &detectors(),
            &source,
            &WorkerPool::new(3),
            |_, _, _| progress_calls += 1,
        )
        .unwrap();
        assert_eq!(progress_calls, 58);
        assert_eq!(reconstruction.geometry.shape(), (5, 4));
        assert_eq!(reconstruction.geometry.n_coordinates(), 20);

        let maps: Vec<(DetectorId, Array2<f64>)> = reconstruction
            .outputs
            .iter()
            .map(|(id, output)| match output {
                DetectorOutput::Map(map) => (*id, map.clone()),
                DetectorOutput::Images(_) => panic!("expected maps"),
            })
            .collect();
        assert_eq!(
            maps.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            DetectorId::ALL.to_vec()
        );
        let (_, up) = &maps[0];
        assert!(up.iter().all(|v| *v == 2.0));
        let (_, far) = &maps[1];
        assert!(far.iter().all(|v| *v == 1.0));
        let (_, down) = &maps[2];
        assert_eq!(down.dim(), (5, 4));
        assert_eq!(down[[4, 1]], 1.0);
        assert_eq!(down[[4, 2]], 0.0);
        assert_eq!(down[[4, 3]], 0.0);
    }

    #[test]
    fn test_missing_reference_frames_give_nan() {
        let log = step_log(2, 2);
        let mut source = MemoryFrameSource::new();
        for point in 0..3 {
            source.insert(1, &format!("{point}_LambdaFar.nxs"), Array3::from_elem((1, 2, 2), 1.0));
        }
        let detectors = DetectorSet::from_masks(vec![(DetectorId::LambdaFar, Array2::from_elem((2, 2), true))]);
        let reconstruction = reconstruct_with_log(
            &config(ScanMode::Step, OutputKind::SummaryMap),
            1,
            &log,
            &detectors,
            &source,
            &WorkerPool::new(1),
            |_, _, _| (),
        )
        .unwrap();
        let DetectorOutput::Map(far) = &reconstruction.outputs[0].1 else {
            panic!("expected a map");
        };
        assert_eq!(far[[0, 0]], 1.0);
        assert!(far[[1, 1]].is_nan());
    }

    #[test]
    fn test_fly_full_data_written() {
        let mut text = String::from("# Points count: 9\n# Points count: 3\n# Points count: 2\n");
        for line in 0..2 {
            let samples: Vec<String> = (0..14).map(|i| format!("{i}")).collect();
            text.push_str(&format!("move\nl;{line}um;{}\n", samples.join(",")));
        }
        let log = ScanLog::parse(&text, ParsePolicy::Strict).unwrap();
        let mut source = MemoryFrameSource::new();
        for line in 0..2 {
            source.insert(5, &format!("line_{line}_LambdaUp.nxs"), Array3::from_elem((2, 2, 2), line as f64));
        }
        let detectors = DetectorSet::from_masks(vec![(DetectorId::LambdaUp, Array2::from_elem((2, 2), true))]);
        let config = config(ScanMode::Fly, OutputKind::FullData);
        let reconstruction = reconstruct_with_log(
            &config,
            5,
            &log,
            &detectors,
            &source,
            &WorkerPool::new(2),
            |_, _, _| (),
        )
        .unwrap();
        assert_eq!(reconstruction.geometry.shape(), (2, 2));

        let mut sink = MemorySink::default();
        write_reconstruction(&mut sink, &reconstruction).unwrap();
        let images = &sink.images["detector_data/lambda_up"];
        assert_eq!(images.dim(), (4, 2, 2));
        assert_eq!(images[[3, 0, 0]], 1.0);
        assert_eq!(sink.series["motor_coordinates/fast_coordinates"].to_vec(), vec![5.0, 7.0, 5.0, 7.0]);
        assert_eq!(sink.series["motor_coordinates/slow_coordinates"].to_vec(), vec![0.0, 0.0, 1.0, 1.0]);
        assert_eq!(sink.scalars["scan_size/fast_size"], 2);
        assert_eq!(sink.scalars["scan_size/slow_size"], 2);
    }

    #[test]
    fn test_overflowing_detector_is_reported() {
        let log = step_log(2, 2);
        let mut source = MemoryFrameSource::new();
        for point in 0..5 {
            source.insert(1, &format!("{point}_LambdaFar.nxs"), Array3::from_elem((1, 2, 2), 1.0));
        }
        let detectors = DetectorSet::from_masks(vec![(DetectorId::LambdaFar, Array2::from_elem((2, 2), true))]);
        let result = reconstruct_with_log(
            &config(ScanMode::Step, OutputKind::SummaryMap),
            1,
            &log,
            &detectors,
            &source,
            &WorkerPool::new(2),
            |_, _, _| (),
        );
        assert!(matches!(
            result,
            Err(ProcessorError::DetectorError(
                DetectorId::LambdaFar,
                AggregateError::ShapeOverflow { len: 5, capacity: 4 }
            ))
        ));
    }
}
