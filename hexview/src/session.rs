//! The `session` module provides [`HexSession`], one hex document: the rendered text on
//! a [`TextSurface`], the bytes edited since loading, and the background operation
//! converting, exporting or checksumming it.

use crate::debounce::Debouncer;
use crate::error::SessionError;
use crate::highlight::{Highlight, Highlighter, bytes_in_line};
use crate::jobs::{ChecksumJob, ExportJob, RenderJob};
use crate::operation::{OperationEvent, OperationKind, OperationManager, OperationResult};
use crate::settings::Settings;
use crate::surface::{Region, TextBuffer, TextSelection, TextSurface};
use hexviewlib::{
    AddressLocation, DEFAULT_ALGORITHM, Digest, DigestRegistry, EditDiffEngine, EditOutcome,
    Endianness, HexDecoder, HexEncoder, HexViewError, Inspection, Layout, SelectionMapper,
};
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Highlight layer marking edited bytes.
pub const EDITED_REGIONS: &str = "hex_edited";

/// Bytes shown by the inspector.
const INSPECTED_BYTES: usize = 8;

pub struct HexSession<S: TextSurface = TextBuffer> {
    settings: Settings,
    layout: Layout,
    registry: DigestRegistry,
    surface: S,
    operations: OperationManager,
    debouncer: Debouncer,
    /// Binary file the text was rendered from
    source: Option<PathBuf>,
    loaded: bool,
    /// Offsets of edited bytes and their values before the first edit
    modified: BTreeMap<usize, u8>,
    endianness: Endianness,
}

impl HexSession<TextBuffer> {
    /// Session rendering into an in-memory [`TextBuffer`].
    ///
    /// # Errors
    /// Returns an error if the layout of `settings` is rejected.
    pub fn new(settings: Settings) -> Result<Self, SessionError> {
        Self::with_surface(settings, TextBuffer::new())
    }
}

impl<S: TextSurface> HexSession<S> {
    /// # Errors
    /// Returns an error if the layout of `settings` is rejected.
    pub fn with_surface(settings: Settings, surface: S) -> Result<Self, SessionError> {
        let layout = settings.layout()?;
        Ok(Self {
            layout,
            registry: DigestRegistry::default(),
            surface,
            operations: OperationManager::new(),
            debouncer: Debouncer::new(settings.highlight_delay),
            source: None,
            loaded: false,
            modified: BTreeMap::new(),
            endianness: settings.inspector_endianness,
            settings,
        })
    }

    /// Replaces the built-in digest catalogue.
    #[must_use]
    pub fn with_registry(mut self, registry: DigestRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn layout(&self) -> &Layout {
        &self.layout
    }

    pub const fn registry(&self) -> &DigestRegistry {
        &self.registry
    }

    pub const fn surface(&self) -> &S {
        &self.surface
    }

    pub const fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub const fn is_busy(&self) -> bool {
        self.operations.is_running()
    }

    pub fn running_kind(&self) -> Option<OperationKind> {
        self.operations.running_kind()
    }

    /// Edited byte offsets mapped to their original values.
    pub const fn modified(&self) -> &BTreeMap<usize, u8> {
        &self.modified
    }

    pub fn is_dirty(&self) -> bool {
        !self.modified.is_empty()
    }

    pub const fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub const fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    const fn encoder(&self) -> HexEncoder {
        HexEncoder::from_layout(self.layout)
    }

    const fn decoder(&self) -> HexDecoder {
        HexDecoder::from_layout(self.layout)
    }

    const fn mapper(&self) -> SelectionMapper {
        SelectionMapper::new(self.layout)
    }

    fn highlighter(&self) -> Highlighter {
        let max_bytes = self
            .settings
            .highlight_throttle
            .then_some(self.settings.highlight_max_bytes);
        Highlighter::new(self.layout, self.settings.starting_address, max_bytes)
    }

    fn ensure_loaded(&self) -> Result<(), SessionError> {
        if self.loaded {
            Ok(())
        } else {
            Err(SessionError::NotLoaded)
        }
    }

    fn mark_loaded(&mut self) {
        self.loaded = true;
        self.modified.clear();
        self.debouncer.cancel();
    }

    /// Starts converting the binary file at `path` in the background.
    ///
    /// # Errors
    /// - Returns an error if an operation is already running
    /// - Returns an error if the file is missing or larger than `max_file_size_kb`
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        self.operations.ensure_idle()?;
        let path = path.as_ref();
        let size = fs::metadata(path)
            .map_err(|err| HexViewError::Io(path.to_path_buf(), err))?
            .len();
        if size > self.settings.max_file_size() {
            return Err(SessionError::FileTooLarge {
                size_kb: size / 1000,
                max_kb: self.settings.max_file_size_kb,
            });
        }

        let job = RenderJob::new(path, self.layout, self.settings.starting_address)?;
        self.operations.try_start(Box::new(job))?;
        self.source = Some(path.to_path_buf());
        Ok(())
    }

    /// Converts the source file again, dropping all edits.
    ///
    /// # Errors
    /// Returns an error if the session was not opened from a file.
    pub fn reload(&mut self) -> Result<(), SessionError> {
        let path = self.source.clone().ok_or(SessionError::NotLoaded)?;
        self.open(path)
    }

    /// Uses existing hex text instead of a binary file.
    ///
    /// # Errors
    /// Returns an error if an operation is running.
    pub fn load_text(&mut self, text: &str) -> Result<(), SessionError> {
        self.operations.ensure_idle()?;
        self.surface.set_text(text);
        self.source = None;
        self.mark_loaded();
        Ok(())
    }

    /// Switches to another group size and line width. Files are converted again, hex
    /// text is re-rendered from its decoded bytes.
    ///
    /// # Errors
    /// - Returns an error if an operation is running
    /// - Returns an error if the current text does not decode
    /// - Returns an error if the source file cannot be converted again, keeping the
    ///   previous layout
    pub fn reformat(&mut self, group_bits: usize, bytes_per_line: usize) -> Result<(), SessionError> {
        self.operations.ensure_idle()?;
        let settings = Settings {
            group_bits,
            bytes_per_line,
            ..self.settings.clone()
        };
        let layout = settings.layout()?;

        if let Some(path) = self.source.clone() {
            let settings = std::mem::replace(&mut self.settings, settings);
            let layout = std::mem::replace(&mut self.layout, layout);
            if let Err(err) = self.open(path) {
                self.settings = settings;
                self.layout = layout;
                return Err(err);
            }
            return Ok(());
        }

        let decoded = if self.loaded {
            let decoder = self.decoder();
            let base = self
                .surface
                .line(0)
                .and_then(|text| decoder.parse_line(text).ok())
                .map_or(self.settings.starting_address, |parsed| parsed.address);
            Some((base, decoder.decode_text(&self.surface.text())?))
        } else {
            None
        };

        self.settings = settings;
        self.layout = layout;
        if let Some((base, data)) = decoded {
            let text = self.encoder().render(&data, base);
            self.surface.set_text(&text);
            self.mark_loaded();
        }
        Ok(())
    }

    /// Progress of the running operation, or its outcome once finished. A rendered text
    /// is moved into the surface, leaving the event's `text` empty.
    pub fn poll(&mut self) -> Option<OperationEvent> {
        let mut event = self.operations.poll()?;
        if let OperationEvent::Finished(_, outcome) = &mut event {
            self.absorb(outcome);
        }
        Some(event)
    }

    /// Blocks until the running operation finishes. See [`HexSession::poll`].
    pub fn wait(&mut self) -> Option<(OperationKind, OperationResult)> {
        let (kind, mut outcome) = self.operations.wait()?;
        self.absorb(&mut outcome);
        Some((kind, outcome))
    }

    fn absorb(&mut self, outcome: &mut OperationResult) {
        match outcome {
            OperationResult::Rendered { text, .. } => {
                self.surface.set_text(&std::mem::take(text));
                self.mark_loaded();
            }
            OperationResult::Exported { path, .. } => {
                self.source = Some(path.clone());
                self.clear_edits();
            }
            _ => {}
        }
    }

    /// Asks the running operation to stop.
    ///
    /// # Errors
    /// Returns an error if nothing is running.
    pub fn cancel(&self) -> Result<(), SessionError> {
        self.operations.cancel()
    }

    /// Replaces the bytes under `selection` with `payload`: hex digits, or text after an
    /// `s:` prefix. The line is rewritten only if the payload is valid.
    ///
    /// # Errors
    /// - Returns an error if an operation is running or nothing is loaded
    /// - Returns an error if the line does not exist or does not parse
    /// - Returns an error if the payload does not fit the selected bytes
    pub fn edit(
        &mut self,
        selection: &TextSelection,
        payload: &str,
    ) -> Result<EditOutcome, SessionError> {
        self.operations.ensure_idle()?;
        self.ensure_loaded()?;

        let text = self
            .surface
            .line(selection.line)
            .ok_or(SessionError::LineOutOfRange(selection.line))?;
        let parsed = self
            .decoder()
            .parse_line(text)
            .map_err(|kind| HexViewError::MalformedLine(kind, selection.line + 1))?;
        let line = self.encoder().encode_at(&parsed.bytes, parsed.address)?;
        let target = self.mapper().map(selection.columns.clone(), line.bytes.len());
        let outcome = EditDiffEngine::new(self.layout).apply_edit(&line, target.bytes, payload)?;

        if outcome.changed.is_empty() {
            return Ok(outcome);
        }
        for run in &outcome.changed {
            for index in run.bytes.clone() {
                let offset = self.layout.offset_of_position(selection.line, index);
                self.track(offset, line.bytes[index], outcome.line.bytes[index]);
            }
        }
        self.surface
            .replace_line(selection.line, outcome.line.to_string());
        self.refresh_edited_regions();

        log::debug!(
            "Edited {} byte run(s) on line {}",
            outcome.changed.len(),
            selection.line
        );
        Ok(outcome)
    }

    fn track(&mut self, offset: usize, before: u8, after: u8) {
        match self.modified.entry(offset) {
            Entry::Vacant(entry) => {
                entry.insert(before);
            }
            Entry::Occupied(entry) => {
                // Back to the original value
                if *entry.get() == after {
                    entry.remove();
                }
            }
        }
    }

    /// Runs of edited bytes as `(line, byte indices)`.
    fn edited_runs(&self) -> Vec<(usize, Range<usize>)> {
        let mut runs: Vec<(usize, Range<usize>)> = Vec::new();
        for &offset in self.modified.keys() {
            let (line, index) = self.layout.position_of_offset(offset);
            match runs.last_mut() {
                Some((last_line, bytes)) if *last_line == line && bytes.end == index => {
                    bytes.end += 1;
                }
                _ => runs.push((line, index..index + 1)),
            }
        }
        runs
    }

    fn refresh_edited_regions(&mut self) {
        let mapper = self.mapper();
        let regions = self
            .edited_runs()
            .into_iter()
            .flat_map(|(line, bytes)| {
                let selection = mapper.from_bytes(bytes.start, bytes.end);
                [selection.hex, selection.ascii]
                    .into_iter()
                    .map(move |columns| Region { line, columns })
            })
            .collect();
        self.surface.set_regions(EDITED_REGIONS, regions);
    }

    fn clear_edits(&mut self) {
        self.modified.clear();
        self.surface.set_regions(EDITED_REGIONS, Vec::new());
    }

    /// Puts the original values of all edited bytes back. Returns the number of
    /// restored bytes.
    ///
    /// # Errors
    /// - Returns an error if an operation is running
    /// - Returns an error if an edited line no longer parses
    pub fn discard_edits(&mut self) -> Result<usize, SessionError> {
        self.operations.ensure_idle()?;

        let mut by_line: BTreeMap<usize, Vec<(usize, u8)>> = BTreeMap::new();
        for (&offset, &original) in &self.modified {
            let (line, index) = self.layout.position_of_offset(offset);
            by_line.entry(line).or_default().push((index, original));
        }

        let decoder = self.decoder();
        let encoder = self.encoder();
        let restored_lines = by_line
            .into_iter()
            .map(|(line_no, originals)| -> Result<(usize, String), SessionError> {
                let text = self
                    .surface
                    .line(line_no)
                    .ok_or(SessionError::LineOutOfRange(line_no))?;
                let mut parsed = decoder
                    .parse_line(text)
                    .map_err(|kind| HexViewError::MalformedLine(kind, line_no + 1))?;
                for (index, original) in originals {
                    if let Some(byte) = parsed.bytes.get_mut(index) {
                        *byte = original;
                    }
                }
                let line = encoder.encode_at(&parsed.bytes, parsed.address)?;
                Ok((line_no, line.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (line_no, text) in restored_lines {
            self.surface.replace_line(line_no, text);
        }
        let restored = self.modified.len();
        self.clear_edits();
        log::info!("Discarded {restored} edited byte(s)");
        Ok(restored)
    }

    /// Starts writing the bytes of the current text to `destination`.
    ///
    /// # Errors
    /// - Returns an error if an operation is running or nothing is loaded
    /// - Returns an error if the destination directory does not exist
    pub fn export(&mut self, destination: impl Into<PathBuf>) -> Result<(), SessionError> {
        self.operations.ensure_idle()?;
        self.ensure_loaded()?;
        let digest = if self.settings.checksum_on_save {
            Some(self.create_digest(&self.settings.hash_algorithm)?)
        } else {
            None
        };
        let job = ExportJob::new(self.surface.lines(), self.decoder(), destination, digest)?;
        self.operations.try_start(Box::new(job))
    }

    /// Starts hashing the bytes of the current text. `None` uses the configured algorithm.
    ///
    /// # Errors
    /// - Returns an error if an operation is running or nothing is loaded
    /// - Returns an error if neither the algorithm nor a fallback is registered
    pub fn checksum(&mut self, algorithm: Option<&str>) -> Result<(), SessionError> {
        self.operations.ensure_idle()?;
        self.ensure_loaded()?;
        let digest = self.create_digest(algorithm.unwrap_or(self.settings.hash_algorithm.as_str()))?;
        let job = ChecksumJob::new(self.surface.lines(), self.decoder(), digest);
        self.operations.try_start(Box::new(job))
    }

    /// Unknown names fall back to the configured algorithm, then to md5.
    fn create_digest(&self, name: &str) -> Result<Box<dyn Digest>, SessionError> {
        self.registry
            .create_or(name, &self.settings.hash_algorithm)
            .or_else(|| self.registry.create(DEFAULT_ALGORITHM))
            .ok_or_else(|| SessionError::UnknownAlgorithm(name.to_string()))
    }

    /// Hashes the UTF-8 bytes of `text`.
    ///
    /// # Errors
    /// Returns an error if no digest can be created or it rejects the input.
    pub fn hash_text(&self, algorithm: Option<&str>, text: &str) -> Result<String, SessionError> {
        let mut digest = self.create_digest(algorithm.unwrap_or(self.settings.hash_algorithm.as_str()))?;
        digest
            .update(text.as_bytes())
            .map_err(|err| HexViewError::DigestUpdate(digest.name().to_string(), err))?;
        Ok(digest.hexdigest())
    }

    /// Hashes the text under all selections, in selection order.
    ///
    /// # Errors
    /// See [`HexSession::hash_text`].
    pub fn hash_selections(&self, algorithm: Option<&str>) -> Result<String, SessionError> {
        let text: String = self
            .surface
            .selections()
            .iter()
            .filter_map(|selection| self.surface.selected_text(selection))
            .collect();
        self.hash_text(algorithm, &text)
    }

    /// Locates `address` and selects the byte there.
    ///
    /// # Errors
    /// Returns an error if no byte is shown at `address`.
    pub fn find_address(&mut self, address: u64) -> Result<AddressLocation, SessionError> {
        self.ensure_loaded()?;
        let location = self
            .layout
            .locate_address(address, self.settings.starting_address)
            .filter(|location| {
                self.surface
                    .line(location.line)
                    .is_some_and(|text| location.byte_index < bytes_in_line(&self.layout, text))
            })
            .ok_or(SessionError::AddressOutOfRange(address))?;

        self.surface
            .set_selections(vec![TextSelection::caret(location.line, location.column)]);
        self.highlight_now();
        Ok(location)
    }

    /// Up to `count` bytes starting at byte `index` of `line`, continuing on the
    /// following lines.
    fn bytes_from(&self, line: usize, index: usize, count: usize) -> Vec<u8> {
        let decoder = self.decoder();
        let mut bytes = Vec::with_capacity(count);
        let mut skip = index;
        for line_no in line..self.surface.line_count() {
            let Some(chunk) = self
                .surface
                .line(line_no)
                .and_then(|text| decoder.decode_line(text).ok())
            else {
                break;
            };
            bytes.extend(chunk.iter().skip(skip).take(count - bytes.len()));
            skip = 0;
            if bytes.len() == count {
                break;
            }
        }
        bytes
    }

    /// Values of the bytes starting at the first selected byte.
    pub fn inspect(&self) -> Option<Inspection> {
        let first = self.highlighter().highlight(&self.surface).first_byte?;
        let bytes = self.bytes_from(first.line, first.index, INSPECTED_BYTES);
        Some(Inspection::from_bytes(&bytes, self.endianness))
    }

    /// Values of the bytes starting at `address`.
    ///
    /// # Errors
    /// Returns an error if no byte is shown at `address`.
    pub fn inspect_address(&mut self, address: u64) -> Result<Inspection, SessionError> {
        let location = self.find_address(address)?;
        let bytes = self.bytes_from(location.line, location.byte_index, INSPECTED_BYTES);
        Ok(Inspection::from_bytes(&bytes, self.endianness))
    }

    /// Replaces the selections and schedules a highlight update.
    pub fn select(&mut self, selections: Vec<TextSelection>, now: Instant) {
        self.surface.set_selections(selections);
        self.selection_changed(now);
    }

    /// Schedules a highlight update once the selections stop changing.
    pub fn selection_changed(&mut self, now: Instant) {
        self.debouncer.trigger(now);
    }

    /// Runs a scheduled highlight update if its quiet period is over.
    pub fn tick(&mut self, now: Instant) -> Option<Highlight> {
        self.debouncer.poll(now).then(|| self.highlight_now())
    }

    /// Highlights the current selections right away.
    pub fn highlight_now(&mut self) -> Highlight {
        self.debouncer.cancel();
        self.highlighter().apply(&mut self.surface)
    }
}
