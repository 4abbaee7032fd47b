// src/exec/sink.rs

//! Destinations for a task's combined output stream.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::info;

const REDACTED: &str = "[REDACTED]";

/// Receives a task's combined stdout/stderr as it is produced.
///
/// Chunks arrive in stream order from a single relay per task, but a sink
/// shared between tasks may see several relays at once, hence `&self`.
pub trait OutputSink: Send + Sync {
    fn write_chunk(&self, task: &str, chunk: &[u8]) -> io::Result<()>;

    /// End of stream for `task`.
    fn finish(&self, _task: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Copy output verbatim to the parent's stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write_chunk(&self, _task: &str, chunk: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(chunk)?;
        out.flush()
    }
}

/// Emit one `info!` event per output line.
///
/// Partial lines are buffered per task until a newline or end of stream.
/// Every configured secret value is replaced by `[REDACTED]` before logging.
#[derive(Default)]
pub struct TracingSink {
    redact: Vec<String>,
    partial: Mutex<HashMap<String, Vec<u8>>>,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: mask these values in logged lines.
    ///
    /// Output is logged line by line, so a value spanning several lines is
    /// also masked piecewise: each of its lines is a mask of its own.
    pub fn redacting<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values.into_iter().map(Into::into) {
            let fragments: Vec<String> = if value.contains('\n') {
                value
                    .split('\n')
                    .map(|f| f.trim_end_matches('\r'))
                    .filter(|f| !f.trim().is_empty())
                    .map(str::to_string)
                    .collect()
            } else {
                vec![value]
            };
            for fragment in fragments {
                if !fragment.is_empty() && !self.redact.contains(&fragment) {
                    self.redact.push(fragment);
                }
            }
        }
        // longest first so a secret containing another is masked whole
        self.redact.sort_by_key(|v| std::cmp::Reverse(v.len()));
        self
    }

    fn emit(&self, task: &str, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\r', '\n']);
        let line = mask(line, &self.redact);
        info!(task = %task, "output: {}", line);
    }
}

impl OutputSink for TracingSink {
    fn write_chunk(&self, task: &str, chunk: &[u8]) -> io::Result<()> {
        let complete: Vec<Vec<u8>> = {
            let mut partial = self
                .partial
                .lock()
                .map_err(|_| io::Error::other("tracing sink buffer poisoned"))?;
            let buf = partial.entry(task.to_string()).or_default();
            buf.extend_from_slice(chunk);

            let mut lines = Vec::new();
            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                lines.push(buf.drain(..=pos).collect());
            }
            lines
        };

        for line in complete {
            self.emit(task, &line);
        }
        Ok(())
    }

    fn finish(&self, task: &str) -> io::Result<()> {
        let rest = self
            .partial
            .lock()
            .map_err(|_| io::Error::other("tracing sink buffer poisoned"))?
            .remove(task);

        if let Some(rest) = rest.filter(|r| !r.is_empty()) {
            self.emit(task, &rest);
        }
        Ok(())
    }
}

fn mask(line: &str, secrets: &[String]) -> String {
    let mut out = line.to_string();
    for secret in secrets {
        if out.contains(secret.as_str()) {
            out = out.replace(secret.as_str(), REDACTED);
        }
    }
    out
}

/// Forward every chunk to several sinks.
///
/// All sinks are attempted; the first error is reported.
#[derive(Clone, Default)]
pub struct TeeSink {
    sinks: Vec<Arc<dyn OutputSink>>,
}

impl TeeSink {
    pub fn new(sinks: Vec<Arc<dyn OutputSink>>) -> Self {
        Self { sinks }
    }
}

impl OutputSink for TeeSink {
    fn write_chunk(&self, task: &str, chunk: &[u8]) -> io::Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.write_chunk(task, chunk) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn finish(&self, task: &str) -> io::Result<()> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.finish(task) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
