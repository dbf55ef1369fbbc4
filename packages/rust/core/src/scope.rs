//! Sub-tree extraction by row, stack, section or item.
//!
//! Extraction builds new containers around the same `Arc` leaves, so a
//! section pulled out of a board is the very same allocation.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use boardpress_markdown::{ConvertOptions, board_from_unit, convert, serialize_board};
use boardpress_shared::{
    Board, BoardpressError, ContentUnit, FormatStrategy, Result, Scope, Section, SurfaceFormat,
    UnitLevel,
};

/// Sections of one row grouped into stacks, as section indexes.
///
/// A `#stack` section joins the stack of the row's previous section;
/// anything else starts a new stack.
pub fn stacks_in_row(board: &Board, row: u32) -> Vec<Vec<usize>> {
    let mut stacks: Vec<Vec<usize>> = Vec::new();
    for (index, section) in board.sections.iter().enumerate() {
        if section.row() != row {
            continue;
        }
        match stacks.last_mut() {
            Some(stack) if section.is_stacked() => stack.push(index),
            _ => stacks.push(vec![index]),
        }
    }
    stacks
}

/// Distinct rows present in the board, ascending.
pub fn rows(board: &Board) -> Vec<u32> {
    let mut rows: Vec<u32> = board.sections.iter().map(|s| s.row()).collect();
    rows.sort_unstable();
    rows.dedup();
    rows
}

/// Extract the sub-tree selected by `scope`.
///
/// An index or id that does not exist is a [`BoardpressError::Scope`]; a
/// row with no sections is a valid, empty board.
pub fn extract(board: &Board, scope: &Scope) -> Result<Board> {
    let sections: Vec<Arc<Section>> = match scope {
        Scope::Full => return Ok(board.clone()),
        Scope::Row(row) => board
            .sections
            .iter()
            .filter(|section| section.row() == *row)
            .cloned()
            .collect(),
        Scope::Stack { row, stack } => {
            let stacks = stacks_in_row(board, *row);
            let members = stacks.get(*stack).ok_or_else(|| {
                BoardpressError::scope(format!(
                    "row {row} has {} stack(s), no stack {stack}",
                    stacks.len()
                ))
            })?;
            members
                .iter()
                .map(|&index| Arc::clone(&board.sections[index]))
                .collect()
        }
        Scope::Section(index) => {
            let section = board.sections.get(*index).ok_or_else(|| {
                BoardpressError::scope(format!(
                    "board has {} section(s), no section {index}",
                    board.sections.len()
                ))
            })?;
            vec![Arc::clone(section)]
        }
        Scope::Item(id) => {
            let (index, item) = board
                .find_item(id)
                .ok_or_else(|| BoardpressError::scope(format!("no item with id '{id}'")))?;
            let owner = &board.sections[index];
            vec![Arc::new(Section {
                header: owner.header.clone(),
                notes: Vec::new(),
                items: vec![Arc::clone(item)],
            })]
        }
    };

    debug!(%scope, sections = sections.len(), "extracted scope");

    Ok(Board {
        front_matter: board.front_matter.clone(),
        notes: Vec::new(),
        sections,
    })
}

/// Result of scoping the root unit.
#[derive(Debug, Clone)]
pub struct ScopedUnit {
    /// The unit to resolve.
    pub unit: ContentUnit,
    /// Whether the scope selected nothing.
    pub is_empty: bool,
}

/// Narrow the root unit to `scope`.
///
/// `Full` passes the unit through untouched. Any other scope parses the unit
/// into a board, extracts, and serializes back into the unit's own format.
pub fn scope_unit(root: &ContentUnit, scope: &Scope) -> Result<ScopedUnit> {
    if *scope == Scope::Full {
        return Ok(ScopedUnit {
            unit: root.clone(),
            is_empty: root.text.trim().is_empty(),
        });
    }

    let board = board_from_unit(root);
    let sub = extract(&board, scope)?;
    let is_empty = sub.sections.is_empty();

    let as_board = ContentUnit::new(
        root.source_path.clone(),
        SurfaceFormat::Board,
        UnitLevel::Document,
        serialize_board(&sub),
    )
    .with_tags(root.tags.clone());

    let unit = match root.format {
        SurfaceFormat::Slides => convert(
            &as_board,
            FormatStrategy::ToSlides,
            &ConvertOptions::default(),
        ),
        SurfaceFormat::Board | SurfaceFormat::Opaque => as_board,
    };
    Ok(ScopedUnit { unit, is_empty })
}

// ---------------------------------------------------------------------------
// Layout summary
// ---------------------------------------------------------------------------

/// One section as shown by `inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionLayout {
    /// 0-based section index.
    pub index: usize,
    /// Raw header text.
    pub header: String,
    /// Ids of the section's items.
    pub items: Vec<String>,
}

/// One row and its stacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowLayout {
    /// Row number (1-based).
    pub row: u32,
    /// Stacks in order, each a list of sections.
    pub stacks: Vec<Vec<SectionLayout>>,
}

/// Rows, stacks and sections of a board.
pub fn layout(board: &Board) -> Vec<RowLayout> {
    rows(board)
        .into_iter()
        .map(|row| RowLayout {
            row,
            stacks: stacks_in_row(board, row)
                .into_iter()
                .map(|stack| {
                    stack
                        .into_iter()
                        .map(|index| {
                            let section = &board.sections[index];
                            SectionLayout {
                                index,
                                header: section.header.clone(),
                                items: section.items.iter().map(|i| i.id.clone()).collect(),
                            }
                        })
                        .collect()
                })
                .collect(),
        })
        .collect()
}
