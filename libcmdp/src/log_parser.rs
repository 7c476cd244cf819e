use serde::{Deserialize, Serialize};
use std::path::Path;

use super::constants::*;
use super::error::LogParseError;

/// What to do with a log line which can not be converted.
///
/// `Strict` aborts the whole scan at the first bad line. `Lenient` drops the offending line
/// (a declared size or a coordinate point) and warns about it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    #[default]
    Strict,
    Lenient,
}

/// One non-header line of a scan log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// 1-based line number in the log, for error reporting
    pub line: usize,
    pub text: String,
}

/// A parsed scan log: the motor records in order plus the sizes declared in the header.
#[derive(Debug, Clone)]
pub struct ScanLog {
    pub records: Vec<LogRecord>,
    sizes: Vec<usize>,
}

impl ScanLog {
    /// Read and parse the log file at `path`
    pub fn read(path: &Path, policy: ParsePolicy) -> Result<Self, LogParseError> {
        if !path.exists() {
            return Err(LogParseError::BadFilePath(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, policy)
    }

    /// Split log text into header sizes and motor records.
    ///
    /// Fails if fewer than three sizes are declared, or if the declared raster (or the step
    /// record stride `2 * fast + 1`) does not fit in a `usize`.
    pub fn parse(text: &str, policy: ParsePolicy) -> Result<Self, LogParseError> {
        let mut records = Vec::new();
        let mut sizes = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if !line.starts_with(HEADER_MARKER) {
                records.push(LogRecord {
                    line: idx + 1,
                    text: line.to_string(),
                });
                continue;
            }
            let Some(value) = line.strip_prefix(SIZE_MARKER) else {
                continue;
            };
            match value.trim().parse::<usize>() {
                Ok(size) => sizes.push(size),
                Err(e) => match policy {
                    ParsePolicy::Strict => {
                        return Err(LogParseError::BadSize {
                            line: idx + 1,
                            text: line.to_string(),
                            source: e,
                        })
                    }
                    ParsePolicy::Lenient => {
                        log::warn!("Skipping invalid size on log line {}: {line:?}", idx + 1)
                    }
                },
            }
        }

        if sizes.len() < N_DECLARED_SIZES {
            return Err(LogParseError::MissingSizes(sizes.len()));
        }
        let (fast, slow) = (sizes[FAST_SIZE_INDEX], sizes[SLOW_SIZE_INDEX]);
        let fits = fast.checked_mul(slow).is_some()
            && fast.checked_mul(2).and_then(|n| n.checked_add(1)).is_some();
        if !fits {
            return Err(LogParseError::SizeOverflow { fast, slow });
        }
        Ok(Self { records, sizes })
    }

    /// Nominal number of positions along the fast axis (the third declared size)
    pub fn fast_size(&self) -> usize {
        self.sizes[FAST_SIZE_INDEX]
    }

    /// Nominal number of lines along the slow axis (the second declared size)
    pub fn slow_size(&self) -> usize {
        self.sizes[SLOW_SIZE_INDEX]
    }

    pub fn declared_sizes(&self) -> &[usize] {
        &self.sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "# Scan 12\n# Points count: 10\n# Points count: 4\n# Points count: 5\n# Motors: samx;samy\n";

    #[test]
    fn test_size_mapping() {
        let text = format!("{HEADER}first\nsecond\n");
        let log = ScanLog::parse(&text, ParsePolicy::Strict).unwrap();
        assert_eq!(log.declared_sizes(), &[10, 4, 5]);
        assert_eq!(log.fast_size(), 5);
        assert_eq!(log.slow_size(), 4);
        assert_eq!(log.records.len(), 2);
        assert_eq!(log.records[0].text, "first");
        assert_eq!(log.records[0].line, 6);
        assert_eq!(log.records[1].text, "second");
    }

    #[test]
    fn test_missing_sizes() {
        let text = "# Points count: 10\n# Points count: 4\nline\n";
        match ScanLog::parse(text, ParsePolicy::Strict) {
            Err(LogParseError::MissingSizes(2)) => (),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_bad_size_policy() {
        let text = format!("# Points count: ten\n{HEADER}line\n");
        assert!(matches!(
            ScanLog::parse(&text, ParsePolicy::Strict),
            Err(LogParseError::BadSize { line: 1, .. })
        ));
        let log = ScanLog::parse(&text, ParsePolicy::Lenient).unwrap();
        assert_eq!(log.declared_sizes(), &[10, 4, 5]);
    }

    #[test]
    fn test_extra_sizes_keep_positions() {
        let text = format!("{HEADER}# Points count: 99\n");
        let log = ScanLog::parse(&text, ParsePolicy::Strict).unwrap();
        assert_eq!(log.fast_size(), 5);
        assert_eq!(log.slow_size(), 4);
        assert!(log.records.is_empty());
    }

    #[test]
    fn test_oversized_raster_is_rejected() {
        let text = format!(
            "# Points count: 1\n# Points count: 4\n# Points count: {}\nline\n",
            usize::MAX / 2
        );
        assert!(matches!(
            ScanLog::parse(&text, ParsePolicy::Strict),
            Err(LogParseError::SizeOverflow { slow: 4, .. })
        ));

        let text = format!(
            "# Points count: 1\n# Points count: 1\n# Points count: {}\nline\n",
            usize::MAX / 2 + 1
        );
        assert!(matches!(
            ScanLog::parse(&text, ParsePolicy::Lenient),
            Err(LogParseError::SizeOverflow { slow: 1, .. })
        ));
    }
}
