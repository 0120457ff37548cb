//! The `checksum` module provides [`ChecksumDriver`], a resumable state machine that
//! feeds chunks into a [`Digest`] one at a time so the caller can report progress and
//! cancel between chunks.

use crate::digest::Digest;
use crate::error::HexViewError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Chunks processed out of the expected total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
}

impl Progress {
    /// Completion in whole percent, clamped to 100.
    #[must_use]
    pub const fn percent(&self) -> usize {
        if self.total == 0 {
            return 100;
        }
        let percent = self.processed * 100 / self.total;
        if percent > 100 { 100 } else { percent }
    }
}

#[derive(Debug)]
pub enum ChecksumState {
    Running,
    /// Final digest as lowercase hex
    Completed(String),
    Aborted,
    Failed(HexViewError),
}

impl ChecksumState {
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

pub struct ChecksumDriver<I> {
    chunks: I,
    digest: Box<dyn Digest>,
    progress: Progress,
    cancel: CancelToken,
    state: ChecksumState,
}

impl<I> fmt::Debug for ChecksumDriver<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChecksumDriver")
            .field("algorithm", &self.digest.name())
            .field("progress", &self.progress)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<I> ChecksumDriver<I>
where
    I: Iterator<Item = Result<Vec<u8>, HexViewError>>,
{
    /// Creates a driver over `chunks`. `total_chunks` is only used for progress.
    pub fn new(chunks: I, digest: Box<dyn Digest>, total_chunks: usize) -> Self {
        Self {
            chunks,
            digest,
            progress: Progress {
                processed: 0,
                total: total_chunks,
            },
            cancel: CancelToken::new(),
            state: ChecksumState::Running,
        }
    }

    /// Uses an externally owned cancellation flag.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub const fn progress(&self) -> Progress {
        self.progress
    }

    #[must_use]
    pub const fn state(&self) -> &ChecksumState {
        &self.state
    }

    #[must_use]
    pub fn algorithm(&self) -> &str {
        self.digest.name()
    }

    /// Consumes at most one chunk. Does nothing once the driver left `Running`.
    pub fn step(&mut self) -> &ChecksumState {
        if !self.state.is_running() {
            return &self.state;
        }

        if self.cancel.is_cancelled() {
            log::warn!(
                "{} checksum aborted after {} of {} chunks",
                self.digest.name(),
                self.progress.processed,
                self.progress.total
            );
            self.state = ChecksumState::Aborted;
            return &self.state;
        }

        self.state = match self.chunks.next() {
            None => {
                let hex = self.digest.hexdigest();
                log::debug!("{} checksum completed: {hex}", self.digest.name());
                ChecksumState::Completed(hex)
            }
            Some(Err(err)) => ChecksumState::Failed(err),
            Some(Ok(chunk)) => match self.digest.update(&chunk) {
                Ok(()) => {
                    self.progress.processed += 1;
                    ChecksumState::Running
                }
                Err(err) => ChecksumState::Failed(HexViewError::DigestUpdate(
                    self.digest.name().to_string(),
                    err,
                )),
            },
        };
        &self.state
    }

    /// Consumes the driver, returning its current state.
    #[must_use]
    pub fn into_state(self) -> ChecksumState {
        self.state
    }

    /// Steps until the driver leaves `Running`, reporting progress after each chunk.
    pub fn run_with_progress(mut self, mut on_progress: impl FnMut(Progress)) -> ChecksumState {
        while self.step().is_running() {
            on_progress(self.progress);
        }
        self.into_state()
    }

    /// Steps until the driver leaves `Running`.
    pub fn run(self) -> ChecksumState {
        self.run_with_progress(|_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::{DigestError, DigestRegistry};

    fn chunks(data: &[&[u8]]) -> std::vec::IntoIter<Result<Vec<u8>, HexViewError>> {
        data.iter()
            .map(|c| Ok(c.to_vec()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn md5() -> Box<dyn Digest> {
        DigestRegistry::default().create("md5").unwrap()
    }

    #[test]
    fn test_completes_with_hexdigest() {
        // Arrange
        let driver = ChecksumDriver::new(chunks(&[b"a", b"b", b"c"]), md5(), 3);

        // Act
        let mut reported = Vec::new();
        let state = driver.run_with_progress(|p| reported.push(p.processed));

        // Assert
        assert!(
            matches!(state, ChecksumState::Completed(ref hex) if hex == "900150983cd24fb0d6963f7d28e17f72")
        );
        assert_eq!(reported, vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_between_chunks() {
        // Arrange
        let mut driver = ChecksumDriver::new(chunks(&[b"a", b"b", b"c"]), md5(), 3);
        let token = driver.cancel_token();

        // Act
        driver.step();
        token.cancel();
        let state = driver.step();

        // Assert
        assert!(matches!(state, ChecksumState::Aborted));
        assert_eq!(driver.progress().processed, 1);
        // Terminal states are sticky
        assert!(matches!(driver.step(), ChecksumState::Aborted));
    }

    #[test]
    fn test_chunk_error_fails() {
        // Arrange
        let source = vec![
            Ok(vec![1u8]),
            Err(HexViewError::MalformedLine(
                crate::error::HexViewErrorKind::OddNibbleCount,
                2,
            )),
        ];
        let driver = ChecksumDriver::new(source.into_iter(), md5(), 2);

        // Act
        let state = driver.run();

        // Assert
        assert!(matches!(
            state,
            ChecksumState::Failed(HexViewError::MalformedLine(_, 2))
        ));
    }

    #[test]
    fn test_digest_update_error_is_wrapped() {
        struct Broken;
        impl Digest for Broken {
            fn name(&self) -> &str {
                "broken"
            }
            fn digest_size(&self) -> usize {
                0
            }
            fn update(&mut self, _bytes: &[u8]) -> Result<(), DigestError> {
                Err("device unplugged".into())
            }
            fn digest(&self) -> Vec<u8> {
                Vec::new()
            }
        }

        // Arrange
        let driver = ChecksumDriver::new(chunks(&[b"x"]), Box::new(Broken), 1);

        // Act
        let state = driver.run();

        // Assert
        match state {
            ChecksumState::Failed(HexViewError::DigestUpdate(name, source)) => {
                assert_eq!(name, "broken");
                assert_eq!(source.to_string(), "device unplugged");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(Progress { processed: 1, total: 4 }.percent(), 25);
        assert_eq!(Progress { processed: 5, total: 4 }.percent(), 100);
        assert_eq!(Progress { processed: 0, total: 0 }.percent(), 100);
    }
}
