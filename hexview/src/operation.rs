//! The `operation` module runs at most one long operation (render, export, checksum) on
//! a background thread. The worker posts its outcome on a channel; [`OperationManager::poll`]
//! never blocks and reports progress while the worker is busy.

use crate::error::SessionError;
use hexviewlib::{CancelToken, Progress};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Render,
    Export,
    Checksum,
}

impl OperationKind {
    /// Text shown after the progress bar.
    #[must_use]
    pub const fn progress_suffix(self) -> &'static str {
        match self {
            Self::Render => "converted to hex",
            Self::Export => "chunks written",
            Self::Checksum => "chunks hashed",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render => write!(f, "converting"),
            Self::Export => write!(f, "exporting"),
            Self::Checksum => write!(f, "checksumming"),
        }
    }
}

/// Terminal outcome of an operation.
#[derive(Debug)]
pub enum OperationResult {
    Rendered {
        text: String,
        lines: usize,
        bytes: u64,
    },
    Exported {
        path: PathBuf,
        bytes: u64,
        /// `(algorithm, hexdigest)` of the written bytes when checksumming on save
        checksum: Option<(String, String)>,
    },
    Checksummed {
        algorithm: String,
        hexdigest: String,
    },
    Aborted,
    Failed(SessionError),
}

/// Unit of background work driven one step at a time.
pub trait Job: Send {
    fn kind(&self) -> OperationKind;

    /// Does one chunk of work. Returns the outcome once the job is finished.
    fn step(&mut self) -> Option<OperationResult>;

    fn progress(&self) -> Progress;

    fn cancel_token(&self) -> CancelToken;

    /// Steps until finished.
    fn run_to_end(&mut self) -> OperationResult {
        loop {
            if let Some(outcome) = self.step() {
                return outcome;
            }
        }
    }
}

#[derive(Debug)]
pub enum OperationEvent {
    Progress(OperationKind, Progress),
    Finished(OperationKind, OperationResult),
}

#[derive(Debug, Default)]
struct SharedProgress {
    processed: AtomicUsize,
    total: AtomicUsize,
}

impl SharedProgress {
    fn store(&self, progress: Progress) {
        self.processed.store(progress.processed, Ordering::Relaxed);
        self.total.store(progress.total, Ordering::Relaxed);
    }

    fn load(&self) -> Progress {
        Progress {
            processed: self.processed.load(Ordering::Relaxed),
            total: self.total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
struct RunningOperation {
    kind: OperationKind,
    cancel: CancelToken,
    progress: Arc<SharedProgress>,
    receiver: Receiver<OperationResult>,
    handle: JoinHandle<()>,
}

/// Owner of the single background operation of a session.
#[derive(Debug, Default)]
pub struct OperationManager {
    running: Option<RunningOperation>,
}

impl OperationManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running.is_some()
    }

    #[must_use]
    pub fn running_kind(&self) -> Option<OperationKind> {
        self.running.as_ref().map(|op| op.kind)
    }

    /// Fails with `AlreadyRunning` if another operation has not been collected yet.
    ///
    /// # Errors
    /// Returns an error if an operation is already running.
    pub fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.running_kind() {
            Some(kind) => Err(SessionError::AlreadyRunning(kind)),
            None => Ok(()),
        }
    }

    /// Moves `job` to a worker thread.
    ///
    /// # Errors
    /// Returns an error if an operation is already running.
    pub fn try_start(&mut self, mut job: Box<dyn Job>) -> Result<(), SessionError> {
        self.ensure_idle()?;

        let kind = job.kind();
        let cancel = job.cancel_token();
        let progress = Arc::new(SharedProgress::default());
        progress.store(job.progress());
        let (sender, receiver) = mpsc::channel();

        let worker_progress = Arc::clone(&progress);
        let handle = thread::spawn(move || {
            let outcome = loop {
                if let Some(outcome) = job.step() {
                    break outcome;
                }
                worker_progress.store(job.progress());
            };
            worker_progress.store(job.progress());
            // Dropped receiver means nobody waits for the outcome
            let _ = sender.send(outcome);
        });

        log::info!("Started {kind}");
        self.running = Some(RunningOperation {
            kind,
            cancel,
            progress,
            receiver,
            handle,
        });
        Ok(())
    }

    /// Asks the running operation to stop at the next chunk boundary.
    ///
    /// # Errors
    /// Returns an error if nothing is running.
    pub fn cancel(&self) -> Result<(), SessionError> {
        let op = self
            .running
            .as_ref()
            .ok_or(SessionError::NoActiveOperation)?;
        log::info!("Aborting {}", op.kind);
        op.cancel.cancel();
        Ok(())
    }

    /// Progress of the running operation, or its outcome once finished.
    pub fn poll(&mut self) -> Option<OperationEvent> {
        let op = self.running.as_ref()?;
        let outcome = match op.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => {
                return Some(OperationEvent::Progress(op.kind, op.progress.load()));
            }
            Err(TryRecvError::Disconnected) => OperationResult::Failed(SessionError::WorkerLost),
        };
        let op = self.running.take()?;
        let (kind, outcome) = Self::finish(op, outcome);
        Some(OperationEvent::Finished(kind, outcome))
    }

    /// Blocks until the running operation finishes.
    pub fn wait(&mut self) -> Option<(OperationKind, OperationResult)> {
        let op = self.running.take()?;
        let outcome = op
            .receiver
            .recv()
            .unwrap_or_else(|_| OperationResult::Failed(SessionError::WorkerLost));
        Some(Self::finish(op, outcome))
    }

    fn finish(
        op: RunningOperation,
        outcome: OperationResult,
    ) -> (OperationKind, OperationResult) {
        if op.handle.join().is_err() {
            log::error!("{} worker panicked", op.kind);
        }
        match &outcome {
            OperationResult::Aborted => log::warn!("{} aborted", op.kind),
            OperationResult::Failed(err) => log::error!("{} failed: {err}", op.kind),
            _ => log::info!("Finished {}", op.kind),
        }
        (op.kind, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Sender;
    use std::time::Duration;

    /// Counts to `total`, waiting for a go signal before each step.
    struct Counter {
        gate: Receiver<()>,
        processed: usize,
        total: usize,
        cancel: CancelToken,
    }

    fn counter(total: usize) -> (Box<Counter>, Sender<()>) {
        let (tx, gate) = mpsc::channel();
        let job = Counter {
            gate,
            processed: 0,
            total,
            cancel: CancelToken::new(),
        };
        (Box::new(job), tx)
    }

    impl Job for Counter {
        fn kind(&self) -> OperationKind {
            OperationKind::Checksum
        }

        fn step(&mut self) -> Option<OperationResult> {
            if self.gate.recv().is_err() || self.cancel.is_cancelled() {
                return Some(OperationResult::Aborted);
            }
            self.processed += 1;
            (self.processed == self.total).then(|| OperationResult::Checksummed {
                algorithm: "count".into(),
                hexdigest: format!("{:02x}", self.processed),
            })
        }

        fn progress(&self) -> Progress {
            Progress {
                processed: self.processed,
                total: self.total,
            }
        }

        fn cancel_token(&self) -> CancelToken {
            self.cancel.clone()
        }
    }

    fn poll_until_finished(manager: &mut OperationManager) -> (OperationKind, OperationResult) {
        loop {
            match manager.poll() {
                Some(OperationEvent::Finished(kind, outcome)) => return (kind, outcome),
                Some(OperationEvent::Progress(..)) => thread::sleep(Duration::from_millis(5)),
                None => panic!("nothing running"),
            }
        }
    }

    #[test]
    fn test_second_operation_is_rejected() {
        // Arrange
        let mut manager = OperationManager::new();
        let (first, go) = counter(1);
        let (second, _go2) = counter(1);

        // Act
        manager.try_start(first).unwrap();
        let res = manager.try_start(second);

        // Assert
        assert!(matches!(
            res,
            Err(SessionError::AlreadyRunning(OperationKind::Checksum))
        ));
        go.send(()).unwrap();
        let (_, outcome) = poll_until_finished(&mut manager);
        assert!(matches!(outcome, OperationResult::Checksummed { .. }));
        assert!(!manager.is_running());
    }

    #[test]
    fn test_progress_is_reported_while_running() {
        // Arrange
        let mut manager = OperationManager::new();
        let (job, go) = counter(3);
        manager.try_start(job).unwrap();

        // Act
        let first = manager.poll();
        go.send(()).unwrap();
        go.send(()).unwrap();
        go.send(()).unwrap();
        let (kind, outcome) = manager.wait().unwrap();

        // Assert
        assert!(matches!(
            first,
            Some(OperationEvent::Progress(OperationKind::Checksum, Progress { total: 3, .. }))
        ));
        assert_eq!(kind, OperationKind::Checksum);
        assert!(
            matches!(outcome, OperationResult::Checksummed { ref hexdigest, .. } if hexdigest == "03")
        );
        assert!(manager.poll().is_none());
    }

    #[test]
    fn test_cancel() {
        // Arrange
        let mut manager = OperationManager::new();
        let (job, go) = counter(10);
        manager.try_start(job).unwrap();

        // Act
        manager.cancel().unwrap();
        go.send(()).unwrap();
        let (_, outcome) = manager.wait().unwrap();

        // Assert
        assert!(matches!(outcome, OperationResult::Aborted));
        assert!(matches!(
            manager.cancel(),
            Err(SessionError::NoActiveOperation)
        ));
    }
}
