//! Read-only summary of a document: layout plus directives.

use serde::Serialize;

use boardpress_markdown::board_from_unit;
use boardpress_shared::{ContentUnit, SurfaceFormat};

use crate::directive::{Directive, scan_directives};
use crate::scope::{RowLayout, layout};

/// What `inspect` reports about one document.
#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    /// Detected surface format.
    pub format: SurfaceFormat,
    /// Whether the document carries the board marker block.
    pub has_marker: bool,
    /// Number of sections.
    pub sections: usize,
    /// Number of items across all sections.
    pub items: usize,
    /// Rows, stacks and sections.
    pub rows: Vec<RowLayout>,
    /// Include directives found in the document itself (not followed).
    pub directives: Vec<Directive>,
}

/// Summarize `unit` without touching any other file.
pub fn inspect(unit: &ContentUnit) -> Inspection {
    let board = board_from_unit(unit);
    Inspection {
        format: unit.format,
        has_marker: board.has_marker(),
        sections: board.sections.len(),
        items: board.item_count(),
        rows: layout(&board),
        directives: scan_directives(&unit.text, &unit.base_dir()),
    }
}
