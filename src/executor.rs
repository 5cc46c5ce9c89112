//! Dedicated background thread that runs an image analyzer.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::traits::{Frame, Result, Rotation};

/// Per-frame analysis callback.
///
/// Always invoked on the analysis executor thread, never on the thread that
/// built the session.
pub trait Analyzer: Send {
    /// Analyze one frame. `rotation` brings the frame upright.
    fn analyze(&mut self, frame: &Frame, rotation: Rotation);
}

impl<F> Analyzer for F
where
    F: FnMut(&Frame, Rotation) + Send,
{
    fn analyze(&mut self, frame: &Frame, rotation: Rotation) {
        self(frame, rotation);
    }
}

static NEXT_EXECUTOR_ID: AtomicU64 = AtomicU64::new(1);

/// Single-thread execution context owned by one image-analysis use-case.
///
/// Frames are queued with depth one: a frame offered while the analyzer is
/// still busy with the previous one is dropped. The thread stops when
/// [`AnalysisExecutor::shutdown`] is called or the executor is dropped.
#[derive(Debug)]
pub struct AnalysisExecutor {
    id: u64,
    name: String,
    sender: Mutex<Option<SyncSender<(Frame, Rotation)>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    analyzed: Arc<AtomicU64>,
}

impl AnalysisExecutor {
    /// Start a new executor thread named `name` running `analyzer`.
    ///
    /// Without an analyzer the thread still runs and discards frames.
    pub fn spawn(name: &str, analyzer: Option<Box<dyn Analyzer>>) -> Result<Self> {
        let id = NEXT_EXECUTOR_ID.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::sync_channel(1);
        let analyzed = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&analyzed);
        let handle = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || run(receiver, analyzer, &counter))?;

        debug!(executor = id, thread = name, "Analysis executor started");
        Ok(Self {
            id,
            name: name.to_owned(),
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
            analyzed,
        })
    }

    /// Process-unique id of this executor.
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Name of the executor thread.
    pub fn thread_name(&self) -> &str {
        &self.name
    }

    /// Whether the executor still accepts frames.
    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Number of frames handed to the analyzer so far.
    pub fn analyzed_count(&self) -> u64 {
        self.analyzed.load(Ordering::Relaxed)
    }

    /// Offer a frame to the analyzer. Returns `false` if it was dropped.
    pub fn dispatch(&self, frame: Frame, rotation: Rotation) -> bool {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(sender) = sender.as_ref() else {
            return false;
        };
        match sender.try_send((frame, rotation)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!(executor = self.id, "Analyzer busy, frame dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!(executor = self.id, "Analyzer thread gone, frame dropped");
                false
            }
        }
    }

    /// Stop accepting frames and join the thread once the queued frame is done.
    ///
    /// Safe to call more than once, and from the executor thread itself (the
    /// join is skipped there).
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(sender) = sender else {
            return;
        };
        drop(sender);

        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                warn!(executor = self.id, "Analyzer thread panicked");
            }
        }
        debug!(executor = self.id, "Analysis executor stopped");
    }
}

impl Drop for AnalysisExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    receiver: Receiver<(Frame, Rotation)>,
    mut analyzer: Option<Box<dyn Analyzer>>,
    analyzed: &AtomicU64,
) {
    for (frame, rotation) in receiver {
        if let Some(analyzer) = analyzer.as_mut() {
            analyzer.analyze(&frame, rotation);
            analyzed.fetch_add(1, Ordering::Relaxed);
        }
    }
}
