//! Frame output destinations and their failure tally

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

/// Where an emitted frame goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Raw bytes appended to the stdout stream
    Stdout,
    /// Single atomically replaced file
    File,
    /// One numbered file per emitted frame
    Sequence,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SinkKind::Stdout => "stdout",
            SinkKind::File => "file",
            SinkKind::Sequence => "sequence",
        })
    }
}

/// Path of the `index`th sequence file: `<prefix>-NNNNNN`.
pub fn sequence_path(prefix: &Path, index: u64) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!("-{index:06}"));
    PathBuf::from(name)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SinkTally {
    pub writes: u64,
    pub failures: u64,
}

/// Per-sink success and failure counts for one session.
///
/// Sink failures do not stop the session; they are logged as they happen and
/// summarized once at the end.
#[derive(Debug, Default)]
pub struct SinkReport {
    stdout: SinkTally,
    file: SinkTally,
    sequence: SinkTally,
    last_error: Option<String>,
}

impl SinkReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn tally_mut(&mut self, kind: SinkKind) -> &mut SinkTally {
        match kind {
            SinkKind::Stdout => &mut self.stdout,
            SinkKind::File => &mut self.file,
            SinkKind::Sequence => &mut self.sequence,
        }
    }

    pub fn tally(&self, kind: SinkKind) -> SinkTally {
        match kind {
            SinkKind::Stdout => self.stdout,
            SinkKind::File => self.file,
            SinkKind::Sequence => self.sequence,
        }
    }

    pub fn record_write(&mut self, kind: SinkKind) {
        self.tally_mut(kind).writes += 1;
    }

    pub fn record_failure(&mut self, kind: SinkKind, target: Option<&Path>, err: &io::Error) {
        self.tally_mut(kind).failures += 1;
        metrics::counter!("framecap_sink_failures", "sink" => kind.to_string()).increment(1);

        let message = match target {
            Some(path) => format!("{kind} sink {}: {err}", path.display()),
            None => format!("{kind} sink: {err}"),
        };
        warn!("{}", message);
        self.last_error = Some(message);
    }

    pub fn writes(&self) -> u64 {
        self.stdout.writes + self.file.writes + self.sequence.writes
    }

    pub fn failures(&self) -> u64 {
        self.stdout.failures + self.file.failures + self.sequence.failures
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Log the end-of-session summary, at error level if anything failed.
    pub fn log_summary(&self) {
        if self.failures() == 0 {
            info!("Sinks: {} writes, no failures", self.writes());
            return;
        }

        error!(
            stdout = self.stdout.failures,
            file = self.file.failures,
            sequence = self.sequence.failures,
            "{} of {} sink writes failed, last: {}",
            self.failures(),
            self.writes() + self.failures(),
            self.last_error().unwrap_or("unknown"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_names_are_zero_padded() {
        let prefix = Path::new("/tmp/f");
        assert_eq!(sequence_path(prefix, 0), PathBuf::from("/tmp/f-000000"));
        assert_eq!(sequence_path(prefix, 1), PathBuf::from("/tmp/f-000001"));
        assert_eq!(
            sequence_path(prefix, 1_234_567),
            PathBuf::from("/tmp/f-1234567")
        );
    }

    #[test]
    fn report_tallies_per_sink() {
        let mut report = SinkReport::new();
        report.record_write(SinkKind::File);
        report.record_write(SinkKind::File);
        report.record_write(SinkKind::Sequence);
        report.record_failure(
            SinkKind::Sequence,
            Some(Path::new("/nope/x-000001")),
            &io::Error::from(io::ErrorKind::NotFound),
        );

        assert_eq!(report.tally(SinkKind::File), SinkTally { writes: 2, failures: 0 });
        assert_eq!(report.tally(SinkKind::Sequence).failures, 1);
        assert_eq!(report.writes(), 3);
        assert_eq!(report.failures(), 1);
        assert!(report.last_error().unwrap().contains("/nope/x-000001"));
    }
}
