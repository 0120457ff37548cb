//! # `hexview`
//!
//! `hexview` drives a hex document on top of `hexviewlib`: it converts binary files to
//! hex text in the background, applies validated edits to a text surface, and exports
//! or checksums the bytes the text shows.
//!
//! The crate provides:
//! - A document type tracking edited bytes ([`HexSession`]).
//! - An abstract text view ([`TextSurface`]) with an in-memory implementation.
//! - A single background operation per session ([`OperationManager`]).
//! - Selection highlighting and status text ([`Highlighter`]), debounced by [`Debouncer`].
//!
//! ## Example
//!
//! ```
//! use hexview::{HexSession, Settings, TextSelection, TextSurface};
//!
//! let mut session = HexSession::new(Settings { bytes_per_line: 8, ..Settings::default() }).unwrap();
//! session.load_text("00000000:  0102 0304 0506 0708  :........").unwrap();
//!
//! // Replace the first byte
//! session.edit(&TextSelection::caret(0, 11), "ff").unwrap();
//! assert_eq!(session.surface().line(0), Some("00000000:  ff02 0304 0506 0708  :........"));
//! assert!(session.is_dirty());
//! ```

mod debounce;
mod error;
mod highlight;
mod jobs;
mod operation;
mod progress;
mod session;
mod settings;
mod surface;

// Public APIs
pub use debounce::Debouncer;
pub use error::SessionError;
pub use highlight::{
    ADDRESS_STATUS, BytePosition, HIGHLIGHT_REGIONS, Highlight, Highlighter, TOTAL_BYTES_STATUS,
    bytes_in_line,
};
pub use jobs::{ChecksumJob, ExportJob, RenderJob};
pub use operation::{Job, OperationEvent, OperationKind, OperationManager, OperationResult};
pub use progress::progress_text;
pub use session::{EDITED_REGIONS, HexSession};
pub use settings::Settings;
pub use surface::{Region, TextBuffer, TextSelection, TextSurface};
