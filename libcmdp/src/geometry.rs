use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::constants::*;
use super::error::GeometryError;
use super::log_parser::{LogRecord, ParsePolicy, ScanLog};

/// How the beam moved during a scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// The beam dwells at every raster position; one frame file per position
    #[default]
    Step,
    /// The beam sweeps each fast line continuously; one frame file per line
    Fly,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step => write!(f, "step"),
            Self::Fly => write!(f, "fly"),
        }
    }
}

/// Motor coordinates of every recorded position plus the canonical raster shape.
///
/// `fast_coords` and `slow_coords` always have the same length, which may fall short of
/// `fast_size * slow_size` for an incomplete scan but never exceeds it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanGeometry {
    pub fast_coords: Array1<f64>,
    pub slow_coords: Array1<f64>,
    pub fast_size: usize,
    pub slow_size: usize,
}

impl ScanGeometry {
    pub fn from_log(
        mode: ScanMode,
        log: &ScanLog,
        policy: ParsePolicy,
    ) -> Result<Self, GeometryError> {
        match mode {
            ScanMode::Step => Self::step(log, policy),
            ScanMode::Fly => Self::fly(log, policy),
        }
    }

    /// Step scans log one coordinate pair per position, plus one marker record per slow
    /// line which is removed before pairing.
    pub fn step(log: &ScanLog, policy: ParsePolicy) -> Result<Self, GeometryError> {
        let fast_size = log.fast_size();
        let slow_size = log.slow_size();
        let stride = 2 * fast_size + 1;
        let kept: Vec<&LogRecord> = log
            .records
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx == 0 || (idx - 1) % stride != 0)
            .map(|(_, record)| record)
            .collect();

        let mut fast_coords = Vec::new();
        let mut slow_coords = Vec::new();
        for record in kept.into_iter().skip(1).step_by(2) {
            match parse_step_line(record) {
                Ok((slow, fast)) => {
                    slow_coords.push(slow);
                    fast_coords.push(fast);
                }
                Err(e) => skip_or_fail(policy, e)?,
            }
        }
        Ok(Self::new(fast_coords, slow_coords, fast_size, slow_size))
    }

    /// Fly scans log one record per line, the fast axis being a comma separated list of
    /// encoder samples. Only the settled samples are kept, and the final declared line is
    /// a return sweep without detector data. Its coordinates are dropped if it was logged.
    pub fn fly(log: &ScanLog, policy: ParsePolicy) -> Result<Self, GeometryError> {
        let fast_size = log.fast_size();
        let slow_size = log.slow_size().saturating_sub(1);

        let mut fast_coords = Vec::new();
        let mut slow_coords = Vec::new();
        for record in log.records.iter().skip(1).step_by(2) {
            match parse_fly_line(record) {
                Ok((slow, samples)) => {
                    let kept = settled_samples(&samples);
                    slow_coords.extend(std::iter::repeat(slow).take(kept.len()));
                    fast_coords.extend(kept);
                }
                Err(e) => skip_or_fail(policy, e)?,
            }
        }
        Ok(Self::new(fast_coords, slow_coords, fast_size, slow_size))
    }

    fn new(
        mut fast_coords: Vec<f64>,
        mut slow_coords: Vec<f64>,
        fast_size: usize,
        slow_size: usize,
    ) -> Self {
        let capacity = fast_size.saturating_mul(slow_size);
        if fast_coords.len() > capacity {
            log::warn!(
                "Scan log holds {} coordinates for a raster of {} positions; dropping the last {}",
                fast_coords.len(),
                capacity,
                fast_coords.len() - capacity
            );
            fast_coords.truncate(capacity);
            slow_coords.truncate(capacity);
        }
        log::info!("Number of coordinates: {}", fast_coords.len());
        Self {
            fast_coords: Array1::from(fast_coords),
            slow_coords: Array1::from(slow_coords),
            fast_size,
            slow_size,
        }
    }

    /// Canonical raster shape, `(fast_size, slow_size)`
    pub fn shape(&self) -> (usize, usize) {
        (self.fast_size, self.slow_size)
    }

    /// Number of positions in the full raster
    pub fn n_positions(&self) -> usize {
        self.fast_size.saturating_mul(self.slow_size)
    }

    /// Number of positions actually recovered from the log
    pub fn n_coordinates(&self) -> usize {
        self.fast_coords.len()
    }
}

fn skip_or_fail(policy: ParsePolicy, error: GeometryError) -> Result<(), GeometryError> {
    match policy {
        ParsePolicy::Strict => Err(error),
        ParsePolicy::Lenient => {
            log::warn!("Skipping coordinate point: {error}");
            Ok(())
        }
    }
}

/// Split a coordinate record into its slow field and its last (fast) field
fn split_fields(record: &LogRecord) -> Result<(&str, &str), GeometryError> {
    let mut fields = record.text.rsplit(FIELD_SEPARATOR);
    match (fields.next(), fields.next()) {
        (Some(fast), Some(slow)) => Ok((slow, fast)),
        _ => Err(GeometryError::BadCoordinateLine {
            line: record.line,
            text: record.text.clone(),
        }),
    }
}

fn parse_coordinate(record: &LogRecord, field: &str) -> Result<f64, GeometryError> {
    field
        .trim()
        .trim_matches(&UNIT_CHARS[..])
        .trim()
        .parse::<f64>()
        .map_err(|e| GeometryError::BadCoordinateValue {
            line: record.line,
            text: field.to_string(),
            source: e,
        })
}

fn parse_step_line(record: &LogRecord) -> Result<(f64, f64), GeometryError> {
    let (slow, fast) = split_fields(record)?;
    Ok((
        parse_coordinate(record, slow)?,
        parse_coordinate(record, fast)?,
    ))
}

fn parse_fly_line(record: &LogRecord) -> Result<(f64, Vec<f64>), GeometryError> {
    let (slow, fast) = split_fields(record)?;
    let slow = parse_coordinate(record, slow)?;
    let samples = fast
        .split(FLY_SAMPLE_SEPARATOR)
        .map(|sample| parse_coordinate(record, sample))
        .collect::<Result<Vec<f64>, GeometryError>>()?;
    Ok((slow, samples))
}

/// Drop the edge samples of a fly line and keep every other remaining one
pub fn settled_samples(samples: &[f64]) -> Vec<f64> {
    if samples.len() <= 2 * FLY_EDGE_SAMPLES {
        return Vec::new();
    }
    samples[FLY_EDGE_SAMPLES..samples.len() - FLY_EDGE_SAMPLES]
        .iter()
        .step_by(FLY_SAMPLE_STRIDE)
        .copied()
        .collect()
}
