//! The `surface` module abstracts the text view the session renders into. A GUI would
//! implement [`TextSurface`] over its editor widget; [`TextBuffer`] keeps everything in
//! memory and backs the CLI and the tests.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// A selection inside a single line, in character columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSelection {
    pub line: usize,
    pub columns: Range<usize>,
}

impl TextSelection {
    #[must_use]
    pub const fn new(line: usize, columns: Range<usize>) -> Self {
        Self { line, columns }
    }

    /// Zero-width selection at `column`.
    #[must_use]
    pub const fn caret(line: usize, column: usize) -> Self {
        Self {
            line,
            columns: column..column,
        }
    }
}

/// A highlighted span inside a single line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub line: usize,
    pub columns: Range<usize>,
}

/// Line-oriented text view with named highlight layers and status fields.
pub trait TextSurface {
    fn line_count(&self) -> usize;

    fn line(&self, index: usize) -> Option<&str>;

    /// Replaces the whole content. Selections and highlight layers are cleared.
    fn set_text(&mut self, text: &str);

    /// Replaces one line. Returns `false` if the line does not exist.
    fn replace_line(&mut self, index: usize, text: String) -> bool;

    fn selections(&self) -> &[TextSelection];

    fn set_selections(&mut self, selections: Vec<TextSelection>);

    fn regions(&self, key: &str) -> &[Region];

    fn set_regions(&mut self, key: &str, regions: Vec<Region>);

    fn status(&self, key: &str) -> Option<&str>;

    /// Sets or, with `None`, erases a status field.
    fn set_status(&mut self, key: &str, status: Option<String>);

    /// Snapshot of all lines.
    fn lines(&self) -> Vec<String> {
        (0..self.line_count())
            .filter_map(|index| self.line(index).map(str::to_owned))
            .collect()
    }

    /// Whole content joined by `'\n'`.
    fn text(&self) -> String {
        self.lines().join("\n")
    }

    /// Text covered by a selection, clamped to its line.
    fn selected_text(&self, selection: &TextSelection) -> Option<String> {
        let line = self.line(selection.line)?;
        Some(
            line.chars()
                .skip(selection.columns.start)
                .take(selection.columns.end.saturating_sub(selection.columns.start))
                .collect(),
        )
    }
}

/// In-memory [`TextSurface`].
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    lines: Vec<String>,
    selections: Vec<TextSelection>,
    regions: HashMap<String, Vec<Region>>,
    statuses: BTreeMap<String, String>,
}

impl TextBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TextSurface for TextBuffer {
    fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    fn set_text(&mut self, text: &str) {
        self.lines = text.lines().map(str::to_owned).collect();
        self.selections.clear();
        self.regions.clear();
    }

    fn replace_line(&mut self, index: usize, text: String) -> bool {
        self.lines.get_mut(index).map(|line| *line = text).is_some()
    }

    fn selections(&self) -> &[TextSelection] {
        &self.selections
    }

    fn set_selections(&mut self, selections: Vec<TextSelection>) {
        self.selections = selections;
    }

    fn regions(&self, key: &str) -> &[Region] {
        self.regions.get(key).map_or(&[], Vec::as_slice)
    }

    fn set_regions(&mut self, key: &str, regions: Vec<Region>) {
        if regions.is_empty() {
            self.regions.remove(key);
        } else {
            self.regions.insert(key.to_string(), regions);
        }
    }

    fn status(&self, key: &str) -> Option<&str> {
        self.statuses.get(key).map(String::as_str)
    }

    fn set_status(&mut self, key: &str, status: Option<String>) {
        match status {
            Some(status) => self.statuses.insert(key.to_string(), status),
            None => self.statuses.remove(key),
        };
    }
}
