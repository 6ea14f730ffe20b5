use super::{import_gltf, AssetError};
use crate::scene::SceneNode;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

/// Bytes read between progress reports and cancellation checks.
pub const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug)]
pub struct LoadedModel {
    pub path: PathBuf,
    pub root: SceneNode,
}

/// Zero or more `Progress` events followed by exactly one terminal event,
/// unless the load is cancelled first.
#[derive(Debug)]
pub enum LoadEvent {
    Progress { loaded: u64, total: u64 },
    Loaded(LoadedModel),
    Failed(AssetError),
}

impl LoadEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadEvent::Progress { .. })
    }
}

/// Receives load events on the loader thread. Returning `false` means nobody
/// is listening anymore and the load stops.
pub trait LoadSink: Send + 'static {
    fn deliver(&self, event: LoadEvent) -> bool;
}

impl LoadSink for mpsc::Sender<LoadEvent> {
    fn deliver(&self, event: LoadEvent) -> bool {
        self.send(event).is_ok()
    }
}

/// Owner side of a running load. Dropping it cancels the load.
#[derive(Debug)]
pub struct LoadHandle {
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl LoadHandle {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    #[cfg(test)]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Blocks until the loader thread exits.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("model loader thread panicked");
            }
        }
    }
}

impl Drop for LoadHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct AssetLoader;

impl AssetLoader {
    /// Reads and parses `path` on a background thread, streaming events to
    /// `sink`.
    pub fn spawn(path: PathBuf, sink: impl LoadSink) -> Result<LoadHandle, AssetError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let worker_cancel = Arc::clone(&cancel);
        let thread = std::thread::Builder::new()
            .name("model-loader".to_string())
            .spawn(move || run(&path, &worker_cancel, &sink))
            .map_err(AssetError::Spawn)?;
        Ok(LoadHandle {
            cancel,
            thread: Some(thread),
        })
    }
}

enum Stop {
    Cancelled,
    Failed(AssetError),
}

impl From<AssetError> for Stop {
    fn from(error: AssetError) -> Self {
        Stop::Failed(error)
    }
}

fn run(path: &Path, cancel: &AtomicBool, sink: &impl LoadSink) {
    log::debug!("loading model from {}", path.display());
    let outcome = read_with_progress(path, cancel, sink)
        .and_then(|bytes| import_gltf(path, &bytes).map_err(Stop::from));
    if cancel.load(Ordering::Acquire) {
        log::debug!("model load cancelled: {}", path.display());
        return;
    }
    let event = match outcome {
        Ok(root) => LoadEvent::Loaded(LoadedModel {
            path: path.to_path_buf(),
            root,
        }),
        Err(Stop::Failed(error)) => LoadEvent::Failed(error),
        Err(Stop::Cancelled) => return,
    };
    sink.deliver(event);
}

fn read_with_progress(path: &Path, cancel: &AtomicBool, sink: &impl LoadSink) -> Result<Vec<u8>, Stop> {
    let read_error = |source| AssetError::Read {
        path: path.display().to_string(),
        source,
    };
    let mut file = File::open(path).map_err(read_error)?;
    let total = file.metadata().map(|meta| meta.len()).unwrap_or(0);
    let mut bytes = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.load(Ordering::Acquire) {
            return Err(Stop::Cancelled);
        }
        let read = match file.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(read_error(err).into()),
        };
        bytes.extend_from_slice(&chunk[..read]);
        let progress = LoadEvent::Progress {
            loaded: bytes.len() as u64,
            total,
        };
        if !sink.deliver(progress) {
            return Err(Stop::Cancelled);
        }
    }
    Ok(bytes)
}
