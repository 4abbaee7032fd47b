use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use shtask::errors::LaunchError;
use shtask::exec::{
    EnvironmentMap, LaunchRequest, LocalProcessStarter, OutputSink, ProcessStarter,
    SpawnedProcess,
};

/// Sink that keeps everything in memory.
#[derive(Default)]
pub struct MemorySink {
    data: Mutex<Vec<u8>>,
    finished: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    /// Tasks whose stream reached its end.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

impl OutputSink for MemorySink {
    fn write_chunk(&self, _task: &str, chunk: &[u8]) -> io::Result<()> {
        self.data.lock().unwrap().extend_from_slice(chunk);
        Ok(())
    }

    fn finish(&self, task: &str) -> io::Result<()> {
        self.finished.lock().unwrap().push(task.to_string());
        Ok(())
    }
}

/// What a [`RecordingStarter`] was asked to start.
#[derive(Debug, Clone)]
pub struct RecordedLaunch {
    pub task_name: String,
    pub working_dir: PathBuf,
    pub interpreter: Vec<String>,
    pub env: EnvironmentMap,
}

/// Process-start hook that records every request and then delegates to
/// [`LocalProcessStarter`].
#[derive(Default)]
pub struct RecordingStarter {
    launches: Mutex<Vec<RecordedLaunch>>,
}

impl RecordingStarter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn launches(&self) -> Vec<RecordedLaunch> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

impl ProcessStarter for RecordingStarter {
    fn start(&self, request: &LaunchRequest<'_>) -> Result<SpawnedProcess, LaunchError> {
        self.launches.lock().unwrap().push(RecordedLaunch {
            task_name: request.task.task_name.clone(),
            working_dir: request.working_dir.to_path_buf(),
            interpreter: request.interpreter.to_vec(),
            env: request.env.clone(),
        });
        LocalProcessStarter.start(request)
    }
}
