//! Human-readable packet trace.

use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::Path;

use portal_net::{Direction, Message};

/// Append-only destination for one trace line per message.
///
/// Tracing is diagnostic: a failed write is logged and otherwise ignored.
pub struct TraceSink {
    out: Box<dyn Write + Send>,
}

impl TraceSink {
    /// Trace into any writer.
    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self { out: Box::new(out) }
    }

    /// Trace into a freshly created file, flushed line by line.
    pub fn create(path: &Path) -> io::Result<Self> {
        Ok(Self::new(LineWriter::new(File::create(path)?)))
    }

    /// Append `"<origin>: <direction> <message>"`.
    pub fn record(&mut self, origin: &str, direction: Direction, msg: &Message) {
        if let Err(e) = writeln!(self.out, "{origin}: {direction} {msg:?}") {
            tracing::warn!(error = %e, "packet trace write failed");
        }
    }
}

impl std::fmt::Debug for TraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TraceSink")
    }
}
