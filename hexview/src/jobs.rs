//! Background jobs started by a [`crate::HexSession`]. Every job stages its output in a
//! temporary file that is deleted when the job is dropped before completing.

use crate::error::SessionError;
use crate::operation::{Job, OperationKind, OperationResult};
use hexviewlib::{
    CancelToken, ChecksumDriver, ChecksumState, DecodeStream, Digest, HexDecoder, HexEncoder,
    HexViewError, Layout, Progress,
};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::vec;
use tempfile::NamedTempFile;

/// Largest block read from the source file at once.
const READ_BLOCK_SIZE: usize = 4096;

fn clamp_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

/// Converts a binary file to hex text.
pub struct RenderJob {
    path: PathBuf,
    source: File,
    size: u64,
    read: u64,
    encoder: HexEncoder,
    base_address: u64,
    block_size: usize,
    staging: BufWriter<NamedTempFile>,
    lines: usize,
    cancel: CancelToken,
}

impl RenderJob {
    /// Opens `path` read-only and prepares a staging file for the rendered text.
    ///
    /// # Errors
    /// Returns an error if the source cannot be opened or the staging file created.
    pub fn new(
        path: impl Into<PathBuf>,
        layout: Layout,
        base_address: u64,
    ) -> Result<Self, SessionError> {
        let path = path.into();
        let source = File::open(&path).map_err(|err| HexViewError::Io(path.clone(), err))?;
        let size = source
            .metadata()
            .map_err(|err| HexViewError::Io(path.clone(), err))?
            .len();
        let staging = tempfile::Builder::new()
            .prefix("hexview")
            .suffix(".hex")
            .tempfile()
            .map_err(|err| HexViewError::Io(std::env::temp_dir(), err))?;

        // Blocks hold whole lines only
        let width = layout.bytes_per_line();
        let block_size = (READ_BLOCK_SIZE - READ_BLOCK_SIZE % width).max(width);

        Ok(Self {
            path,
            source,
            size,
            read: 0,
            encoder: HexEncoder::from_layout(layout),
            base_address,
            block_size,
            staging: BufWriter::new(staging),
            lines: 0,
            cancel: CancelToken::new(),
        })
    }

    /// Renders the next block. Returns `false` at the end of the file.
    fn render_block(&mut self) -> io::Result<bool> {
        let mut block = Vec::with_capacity(self.block_size);
        (&self.source)
            .take(self.block_size as u64)
            .read_to_end(&mut block)?;
        if block.is_empty() {
            return Ok(false);
        }

        let address = self.base_address.wrapping_add(self.read);
        for line in self.encoder.encode_lines(&block, address) {
            if self.lines > 0 {
                self.staging.write_all(b"\n")?;
            }
            write!(self.staging, "{line}")?;
            self.lines += 1;
        }
        self.read += block.len() as u64;
        Ok(true)
    }

    fn staged_text(&mut self) -> io::Result<String> {
        self.staging.flush()?;
        let mut text = String::new();
        self.staging.get_ref().reopen()?.read_to_string(&mut text)?;
        Ok(text)
    }
}

impl Job for RenderJob {
    fn kind(&self) -> OperationKind {
        OperationKind::Render
    }

    fn step(&mut self) -> Option<OperationResult> {
        if self.cancel.is_cancelled() {
            return Some(OperationResult::Aborted);
        }
        let outcome = match self.render_block() {
            Ok(true) => return None,
            Ok(false) => self.staged_text().map(|text| {
                log::debug!(
                    "Rendered {} bytes of {} into {} lines",
                    self.read,
                    self.path.display(),
                    self.lines
                );
                OperationResult::Rendered {
                    text,
                    lines: self.lines,
                    bytes: self.read,
                }
            }),
            Err(err) => Err(err),
        };
        Some(outcome.unwrap_or_else(|err| {
            OperationResult::Failed(HexViewError::Io(self.path.clone(), err).into())
        }))
    }

    fn progress(&self) -> Progress {
        Progress {
            processed: clamp_usize(self.read),
            total: clamp_usize(self.size),
        }
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Writes the bytes decoded from hex text to a file, optionally hashing them on the way.
///
/// The bytes go to a temporary file next to the destination, which replaces the
/// destination only once every line decoded.
pub struct ExportJob {
    destination: PathBuf,
    lines: DecodeStream<vec::IntoIter<String>>,
    total: usize,
    staging: Option<BufWriter<NamedTempFile>>,
    digest: Option<Box<dyn Digest>>,
    written: u64,
    cancel: CancelToken,
}

impl ExportJob {
    /// # Errors
    /// - Returns an error if the destination directory does not exist
    /// - Returns an error if the staging file cannot be created
    pub fn new(
        lines: Vec<String>,
        decoder: HexDecoder,
        destination: impl Into<PathBuf>,
        digest: Option<Box<dyn Digest>>,
    ) -> Result<Self, SessionError> {
        let destination = destination.into();
        let directory = destination
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        if !directory.is_dir() {
            return Err(SessionError::MissingDirectory(directory.to_path_buf()));
        }
        let staging = NamedTempFile::new_in(directory)
            .map_err(|err| HexViewError::Io(directory.to_path_buf(), err))?;

        Ok(Self {
            total: lines.len(),
            lines: decoder.decode_stream(lines),
            destination,
            staging: Some(BufWriter::new(staging)),
            digest,
            written: 0,
            cancel: CancelToken::new(),
        })
    }

    fn io_error(&self, err: io::Error) -> SessionError {
        HexViewError::Io(self.destination.clone(), err).into()
    }

    fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SessionError> {
        if let Some(staging) = self.staging.as_mut()
            && let Err(err) = staging.write_all(chunk)
        {
            return Err(self.io_error(err));
        }
        if let Some(digest) = self.digest.as_mut() {
            digest
                .update(chunk)
                .map_err(|err| HexViewError::DigestUpdate(digest.name().to_string(), err))?;
        }
        self.written += chunk.len() as u64;
        Ok(())
    }

    fn persist(&mut self) -> Result<OperationResult, SessionError> {
        let Some(staging) = self.staging.take() else {
            return Ok(OperationResult::Aborted);
        };
        let file = staging
            .into_inner()
            .map_err(|err| self.io_error(err.into_error()))?;
        file.persist(&self.destination)
            .map_err(|err| self.io_error(err.error))?;

        log::debug!(
            "Exported {} bytes to {}",
            self.written,
            self.destination.display()
        );
        Ok(OperationResult::Exported {
            path: self.destination.clone(),
            bytes: self.written,
            checksum: self
                .digest
                .as_ref()
                .map(|digest| (digest.name().to_string(), digest.hexdigest())),
        })
    }
}

impl Job for ExportJob {
    fn kind(&self) -> OperationKind {
        OperationKind::Export
    }

    /// Stepping a finished job reports `Aborted`.
    fn step(&mut self) -> Option<OperationResult> {
        if self.staging.is_none() {
            return Some(OperationResult::Aborted);
        }
        if self.cancel.is_cancelled() {
            log::warn!("Export aborted, {} left untouched", self.destination.display());
            self.staging = None;
            return Some(OperationResult::Aborted);
        }

        let res = match self.lines.next() {
            None => self.persist().map(Some),
            Some(chunk) => chunk
                .map_err(SessionError::from)
                .and_then(|chunk| self.write_chunk(&chunk))
                .map(|()| None),
        };
        res.unwrap_or_else(|err| {
            self.staging = None;
            Some(OperationResult::Failed(err))
        })
    }

    fn progress(&self) -> Progress {
        Progress {
            processed: self.lines.line_number(),
            total: self.total,
        }
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

/// Hashes the bytes decoded from hex text.
pub struct ChecksumJob {
    driver: Option<ChecksumDriver<DecodeStream<vec::IntoIter<String>>>>,
    algorithm: String,
    progress: Progress,
    cancel: CancelToken,
}

impl ChecksumJob {
    #[must_use]
    pub fn new(lines: Vec<String>, decoder: HexDecoder, digest: Box<dyn Digest>) -> Self {
        let total = lines.len();
        let algorithm = digest.name().to_string();
        let driver = ChecksumDriver::new(decoder.decode_stream(lines), digest, total);
        Self {
            cancel: driver.cancel_token(),
            progress: driver.progress(),
            driver: Some(driver),
            algorithm,
        }
    }
}

impl Job for ChecksumJob {
    fn kind(&self) -> OperationKind {
        OperationKind::Checksum
    }

    fn step(&mut self) -> Option<OperationResult> {
        let Some(driver) = self.driver.as_mut() else {
            return Some(OperationResult::Aborted);
        };
        let running = driver.step().is_running();
        self.progress = driver.progress();
        if running {
            return None;
        }

        let state = self.driver.take()?.into_state();
        Some(match state {
            ChecksumState::Completed(hexdigest) => OperationResult::Checksummed {
                algorithm: self.algorithm.clone(),
                hexdigest,
            },
            ChecksumState::Failed(err) => OperationResult::Failed(err.into()),
            ChecksumState::Aborted | ChecksumState::Running => OperationResult::Aborted,
        })
    }

    fn progress(&self) -> Progress {
        self.progress
    }

    fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}
