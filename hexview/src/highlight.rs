//! The `highlight` module mirrors text selections between the hex and ASCII fields and
//! summarises them as status text (`Address: ...`, `Total Bytes: ...`).

use crate::surface::{Region, TextSurface};
use hexviewlib::{Layout, SelectionMapper};
use std::fmt::Write;

/// Highlight layer holding the mirrored selections.
pub const HIGHLIGHT_REGIONS: &str = "hex_view";
pub const ADDRESS_STATUS: &str = "hex_address";
pub const TOTAL_BYTES_STATUS: &str = "hex_total_bytes";

/// Number of bytes on a rendered line, derived from its ASCII gutter.
#[must_use]
pub fn bytes_in_line(layout: &Layout, text: &str) -> usize {
    text.chars()
        .count()
        .saturating_sub(layout.line_ascii_offset())
        .min(layout.bytes_per_line())
}

/// Position of a selected byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BytePosition {
    pub line: usize,
    pub index: usize,
}

/// Addresses of the first run of consecutive selected bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AddressRun {
    first: u64,
    last: u64,
    /// A later selection was not adjacent to the run
    complete: bool,
}

/// Selected bytes as seen by the highlighter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    pub regions: Vec<Region>,
    /// `None` once throttling stopped the count
    pub total_bytes: Option<usize>,
    /// First selected byte, used by the inspector
    pub first_byte: Option<BytePosition>,
    address: Option<AddressRun>,
}

impl Highlight {
    /// `Address: 0x00000010-0x00000013 [+2 bytes]` style status.
    #[must_use]
    pub fn address_status(&self) -> String {
        let Some(run) = self.address.filter(|_| self.total_bytes != Some(0)) else {
            return "Address: None".to_string();
        };

        let mut status = format!("Address: 0x{:08x}", run.first);
        if run.last != run.first {
            let _ = write!(status, "-0x{:08x}", run.last);
        }
        if run.complete {
            let shown = run.last.wrapping_sub(run.first).wrapping_add(1);
            match self.total_bytes {
                None => status.push_str(" [+?]"),
                Some(total) => {
                    let hidden = (total as u64).saturating_sub(shown);
                    if hidden > 0 {
                        let _ = write!(status, " [+{hidden} bytes]");
                    }
                }
            }
        }
        status
    }

    #[must_use]
    pub fn total_bytes_status(&self) -> String {
        match self.total_bytes {
            Some(total) => format!("Total Bytes: {total}"),
            None => "Total Bytes: ?".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Highlighter {
    mapper: SelectionMapper,
    starting_address: u64,
    /// Byte count at which counting stops
    max_bytes: Option<usize>,
}

impl Highlighter {
    #[must_use]
    pub const fn new(layout: Layout, starting_address: u64, max_bytes: Option<usize>) -> Self {
        Self {
            mapper: SelectionMapper::new(layout),
            starting_address,
            max_bytes,
        }
    }

    /// Maps every selection of `surface` to its bytes.
    pub fn highlight<S: TextSurface + ?Sized>(&self, surface: &S) -> Highlight {
        let layout = self.mapper.layout();
        let mut highlight = Highlight {
            regions: Vec::new(),
            total_bytes: Some(0),
            first_byte: None,
            address: None,
        };
        let mut total = 0;

        for selection in surface.selections() {
            if let Some(max) = self.max_bytes
                && total >= max
            {
                if let Some(run) = highlight.address.as_mut() {
                    run.last = run.first;
                }
                highlight.total_bytes = None;
                return highlight;
            }

            let Some(text) = surface.line(selection.line) else {
                continue;
            };
            let mapped = self
                .mapper
                .map(selection.columns.clone(), bytes_in_line(layout, text));
            if mapped.is_empty() {
                continue;
            }

            total += mapped.byte_count();
            highlight.total_bytes = Some(total);
            highlight.first_byte.get_or_insert(BytePosition {
                line: selection.line,
                index: mapped.bytes.start,
            });
            highlight.regions.extend(
                self.mapper
                    .hex_regions(&mapped)
                    .into_iter()
                    .chain(std::iter::once(mapped.ascii.clone()))
                    .map(|columns| Region {
                        line: selection.line,
                        columns,
                    }),
            );

            // Addresses wrap past u64::MAX like the rendered address field
            let first = self
                .starting_address
                .wrapping_add(layout.offset_of_position(selection.line, mapped.bytes.start) as u64);
            let last = first.wrapping_add(mapped.byte_count() as u64 - 1);
            match highlight.address.as_mut() {
                None => {
                    highlight.address = Some(AddressRun {
                        first,
                        last,
                        complete: false,
                    });
                }
                Some(run) if !run.complete && run.last.wrapping_add(1) == first => run.last = last,
                Some(run) => run.complete = true,
            }
        }
        highlight
    }

    /// Highlights the selections of `surface` and updates its status fields.
    pub fn apply<S: TextSurface + ?Sized>(&self, surface: &mut S) -> Highlight {
        let highlight = self.highlight(surface);
        surface.set_regions(HIGHLIGHT_REGIONS, highlight.regions.clone());
        surface.set_status(ADDRESS_STATUS, Some(highlight.address_status()));
        surface.set_status(TOTAL_BYTES_STATUS, Some(highlight.total_bytes_status()));
        highlight
    }
}
