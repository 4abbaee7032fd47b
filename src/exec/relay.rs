// src/exec/relay.rs

//! Output relay: drain the child's combined output into an [`OutputSink`].

use std::io::{self, Read};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::sink::OutputSink;

const CHUNK_SIZE: usize = 8 * 1024;

/// Read side of the child's combined stdout/stderr.
pub type OutputReader = Box<dyn Read + Send>;

/// Copy `reader` into `sink` until end of stream, returning the byte count.
///
/// Once the sink fails, the rest of the stream is still read and discarded
/// so the child never blocks on a full pipe. Only read errors are returned.
pub fn relay_output(task: &str, mut reader: impl Read, sink: &dyn OutputSink) -> io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    let mut sink_ok = true;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        total += n as u64;

        if sink_ok {
            if let Err(e) = sink.write_chunk(task, &buf[..n]) {
                warn!(task = %task, error = %e, "output sink failed; discarding remaining output");
                sink_ok = false;
            }
        }
    }

    if sink_ok {
        if let Err(e) = sink.finish(task) {
            warn!(task = %task, error = %e, "output sink failed to finish");
        }
    }

    Ok(total)
}

/// Run [`relay_output`] on the blocking pool.
pub fn spawn_relay(
    task: String,
    reader: OutputReader,
    sink: Arc<dyn OutputSink>,
) -> JoinHandle<io::Result<u64>> {
    tokio::task::spawn_blocking(move || {
        let res = relay_output(&task, reader, sink.as_ref());
        if let Ok(bytes) = &res {
            debug!(task = %task, bytes, "output relay reached end of stream");
        }
        res
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect {
        data: Mutex<Vec<u8>>,
        chunks: Mutex<usize>,
        finished: Mutex<bool>,
    }

    impl OutputSink for Collect {
        fn write_chunk(&self, _task: &str, chunk: &[u8]) -> io::Result<()> {
            self.data.lock().unwrap().extend_from_slice(chunk);
            *self.chunks.lock().unwrap() += 1;
            Ok(())
        }

        fn finish(&self, _task: &str) -> io::Result<()> {
            *self.finished.lock().unwrap() = true;
            Ok(())
        }
    }

    struct FailAfterFirst(Mutex<usize>);

    impl OutputSink for FailAfterFirst {
        fn write_chunk(&self, _task: &str, _chunk: &[u8]) -> io::Result<()> {
            let mut calls = self.0.lock().unwrap();
            *calls += 1;
            if *calls > 1 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
            }
            Ok(())
        }
    }

    #[test]
    fn copies_everything_in_order() {
        let input: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
        let sink = Collect::default();

        let n = relay_output("t", Cursor::new(input.clone()), &sink).unwrap();

        assert_eq!(n, input.len() as u64);
        assert_eq!(*sink.data.lock().unwrap(), input);
        assert!(*sink.chunks.lock().unwrap() >= input.len() / CHUNK_SIZE);
        assert!(*sink.finished.lock().unwrap());
    }

    #[test]
    fn keeps_draining_after_sink_failure() {
        let input = vec![b'x'; CHUNK_SIZE * 4];
        let sink = FailAfterFirst(Mutex::new(0));

        let n = relay_output("t", Cursor::new(input), &sink).unwrap();

        assert_eq!(n, (CHUNK_SIZE * 4) as u64);
        // one success, one failure, then the sink is no longer called
        assert_eq!(*sink.0.lock().unwrap(), 2);
    }

    #[test]
    fn empty_stream_still_finishes() {
        let sink = Collect::default();
        assert_eq!(relay_output("t", io::empty(), &sink).unwrap(), 0);
        assert!(*sink.finished.lock().unwrap());
    }
}
