// Selection tracking
// Anchor/focus pairs over document positions, and a descriptor format
// that survives re-renders and best-effort relocation after reshaping

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::structured_document::{Bias, BlockOffset, Document, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Position,
    pub focus: Position,
}

impl Selection {
    pub fn new(anchor: Position, focus: Position) -> Self {
        Selection { anchor, focus }
    }

    pub fn collapsed(pos: Position) -> Self {
        Selection {
            anchor: pos,
            focus: pos,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    /// The earlier of anchor and focus in document order
    pub fn start(&self) -> Position {
        self.anchor.min(self.focus)
    }

    /// The later of anchor and focus in document order
    pub fn end(&self) -> Position {
        self.anchor.max(self.focus)
    }

    pub fn is_backward(&self) -> bool {
        self.focus < self.anchor
    }

    /// True if both ends address the same character gap, whatever spans they name
    pub fn is_empty_in(&self, doc: &Document) -> bool {
        doc.point_of(self.anchor) == doc.point_of(self.focus)
    }
}

/// A serialized selection end: the index triple plus enough text to relocate it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointDescriptor {
    pub block_index: usize,
    pub span_index: usize,
    pub offset: usize,
    /// Offset within the block's flattened text
    pub block_offset: usize,
    /// Text of the span the point sat in
    pub span_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionDescriptor {
    pub anchor: PointDescriptor,
    pub focus: PointDescriptor,
}

fn describe_point(pos: Position, doc: &Document) -> PointDescriptor {
    let pos = doc.clamp_position(pos);
    let span = &doc.blocks()[pos.block_index].spans()[pos.span_index];
    PointDescriptor {
        block_index: pos.block_index,
        span_index: pos.span_index,
        offset: pos.offset,
        block_offset: doc.point_of(pos).offset,
        span_text: span.text.clone(),
    }
}

pub fn serialize_selection(sel: &Selection, doc: &Document) -> SelectionDescriptor {
    SelectionDescriptor {
        anchor: describe_point(sel.anchor, doc),
        focus: describe_point(sel.focus, doc),
    }
}

/// How a point was recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Exact,
    SameBlock,
    Elsewhere,
}

/// Restore one end of a selection.
/// Exact index match first (same span text at the same indices), then the span's text
/// searched in the same block (nearest occurrence), then in the whole document (first occurrence).
pub fn restore_point(point: &PointDescriptor, doc: &Document) -> Option<(Position, Recovery)> {
    let exact = doc
        .block(point.block_index)
        .and_then(|block| block.spans().get(point.span_index))
        .filter(|span| span.text == point.span_text && point.offset <= span.len());
    if exact.is_some() {
        let pos = Position::new(point.block_index, point.span_index, point.offset);
        return doc.resolve(pos).map(|pos| (pos, Recovery::Exact));
    }

    if point.span_text.is_empty() {
        // Nothing to search for: a placeholder or style marker. Keep the block offset if the block survived.
        let block = doc.block(point.block_index)?;
        let offset = point.block_offset.min(block.text_len());
        let pos = doc.position_at(BlockOffset::new(point.block_index, offset), Bias::Upstream);
        return Some((pos, Recovery::SameBlock));
    }

    let span_start = point.block_offset.saturating_sub(point.offset);
    if let Some(block) = doc.block(point.block_index)
        && let Some(found) = nearest_occurrence(&block.to_plain_text(), &point.span_text, span_start)
    {
        let target = BlockOffset::new(point.block_index, found + point.offset);
        return Some((doc.position_at(target, Bias::Upstream), Recovery::SameBlock));
    }

    doc.blocks().iter().enumerate().find_map(|(index, block)| {
        let found = block.to_plain_text().find(&point.span_text)?;
        let target = BlockOffset::new(index, found + point.offset);
        Some((doc.position_at(target, Bias::Upstream), Recovery::Elsewhere))
    })
}

fn nearest_occurrence(haystack: &str, needle: &str, target: usize) -> Option<usize> {
    haystack
        .match_indices(needle)
        .map(|(index, _)| index)
        .min_by_key(|index| index.abs_diff(target))
}

/// Restore a serialized selection. None means the caller should collapse the cursor to the document end.
pub fn restore_selection(desc: &SelectionDescriptor, doc: &Document) -> Option<Selection> {
    let (anchor, anchor_recovery) = restore_point(&desc.anchor, doc)?;
    let (focus, focus_recovery) = restore_point(&desc.focus, doc)?;
    if anchor_recovery != Recovery::Exact || focus_recovery != Recovery::Exact {
        debug!(
            ?anchor_recovery,
            ?focus_recovery,
            "selection relocated by text search"
        );
    }
    Some(Selection::new(anchor, focus))
}
