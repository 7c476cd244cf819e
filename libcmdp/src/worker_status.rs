/// Phase of the processing a status refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BarColor {
    /// Reducing detector frames
    #[default]
    CYAN,
    /// Writing the output container
    GREEN,
}

/// Progress message sent from the processing thread to the UI
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub scan_number: u32,
    pub color: BarColor,
}

impl WorkerStatus {
    pub fn new(progress: f32, scan_number: u32, color: BarColor) -> Self {
        Self {
            progress,
            scan_number,
            color,
        }
    }
}
