/// Every metadata line of a scan log starts with this marker
pub const HEADER_MARKER: &str = "#";
/// Header lines carrying one declared size of the scan
pub const SIZE_MARKER: &str = "# Points count:";
/// Minimum number of size markers a scan log must declare
pub const N_DECLARED_SIZES: usize = 3;
/// Position of the slow axis size among the declared sizes
pub const SLOW_SIZE_INDEX: usize = 1;
/// Position of the fast axis size among the declared sizes
pub const FAST_SIZE_INDEX: usize = 2;

/// Separator between fields of a coordinate line
pub const FIELD_SEPARATOR: char = ';';
/// Separator between fast axis samples of a fly scan coordinate line
pub const FLY_SAMPLE_SEPARATOR: char = ',';
/// Characters trimmed off a motor coordinate field (the micron unit)
pub const UNIT_CHARS: [char; 2] = ['u', 'm'];
/// Fly scan samples discarded at each edge of a line (settle/timing samples)
pub const FLY_EDGE_SAMPLES: usize = 5;
/// Stride between valid fly scan samples
pub const FLY_SAMPLE_STRIDE: usize = 2;

/// Path of the frame stack inside every raw detector file
pub const FRAME_DATA_PATH: &str = "/entry/instrument/detector/data";

/// Directory holding the scan logs, relative to the raw data root
pub const LOG_DIR: &str = "raw/Scans";
/// Directory holding the per-scan frame directories, relative to the raw data root
pub const FRAMES_DIR: &str = "raw/scanFrames";
