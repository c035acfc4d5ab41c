// Structured Document Model
// Blocks of styled spans; the authoritative model every editing
// operation mutates. Markup is only a storage/serialization format.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::style::Style;

/// A run of text sharing one style
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub text: String,
    pub style: Style,
}

impl Span {
    pub fn new(text: impl Into<String>, style: Style) -> Self {
        Span {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Style::plain())
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Split this span at the given byte offset
    /// Returns (left_span, right_span)
    pub fn split_at(&self, offset: usize) -> (Span, Span) {
        let (left, right) = self.text.split_at(offset);
        (Span::new(left, self.style), Span::new(right, self.style))
    }
}

/// One paragraph: an ordered, contiguous sequence of spans (never zero spans)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Block {
    spans: Vec<Span>,
}

impl Block {
    /// Build a block from spans, normalizing them. An empty vector yields a default placeholder.
    pub fn new(spans: Vec<Span>) -> Self {
        let mut block = Block { spans };
        if block.spans.is_empty() {
            block.spans.push(Span::new("", Style::default()));
        }
        block.merge_adjacent_equal_spans();
        block
    }

    /// An empty paragraph whose placeholder span carries `style`
    pub fn empty(style: Style) -> Self {
        Block {
            spans: vec![Span::new("", style)],
        }
    }

    pub fn from_text(text: impl Into<String>, style: Style) -> Self {
        Block {
            spans: vec![Span::new(text, style)],
        }
    }

    pub fn with_text(mut self, text: impl Into<String>, style: Style) -> Self {
        self.spans.push(Span::new(text, style));
        self.merge_adjacent_equal_spans();
        self
    }

    pub fn with_plain_text(self, text: impl Into<String>) -> Self {
        self.with_text(text, Style::plain())
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn span_count(&self) -> usize {
        self.spans.len()
    }

    /// Get the total text length of this block
    pub fn text_len(&self) -> usize {
        self.spans.iter().map(Span::len).sum()
    }

    pub fn to_plain_text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// True when the block holds only its placeholder span
    pub fn is_empty(&self) -> bool {
        self.spans.iter().all(Span::is_empty)
    }

    /// Style of the placeholder (or first) span
    pub fn leading_style(&self) -> Style {
        self.spans[0].style
    }

    /// Block-relative byte offset of a span-relative location
    pub fn flat_offset(&self, span_index: usize, offset: usize) -> usize {
        let before: usize = self.spans[..span_index.min(self.spans.len())]
            .iter()
            .map(Span::len)
            .sum();
        before + offset
    }

    /// Map a block-relative offset to (span_index, offset).
    /// At a span boundary, `Bias::Upstream` picks the end of the left span.
    pub fn locate(&self, flat: usize, bias: Bias) -> (usize, usize) {
        let flat = snap_to_boundary(&self.to_plain_text(), flat.min(self.text_len()));
        let mut start = 0;
        for (index, span) in self.spans.iter().enumerate() {
            let end = start + span.len();
            let inside = match bias {
                Bias::Upstream => flat <= end,
                Bias::Downstream => flat < end,
            };
            if inside {
                return (index, flat - start);
            }
            start = end;
        }
        let last = self.spans.len() - 1;
        (last, self.spans[last].len())
    }

    /// Style of the character immediately before `flat`, if any
    pub fn style_before(&self, flat: usize) -> Option<Style> {
        let mut start = 0;
        for span in &self.spans {
            let end = start + span.len();
            if !span.is_empty() && start < flat && flat <= end {
                return Some(span.style);
            }
            start = end;
        }
        None
    }

    /// Style of the character starting at `flat`, if any
    pub fn style_after(&self, flat: usize) -> Option<Style> {
        let mut start = 0;
        for span in &self.spans {
            let end = start + span.len();
            if !span.is_empty() && start <= flat && flat < end {
                return Some(span.style);
            }
            start = end;
        }
        None
    }

    /// Split the span at `span_index` so that a span boundary exists at `offset`.
    /// Returns the index of the span that starts at the boundary.
    pub fn split_span(&mut self, span_index: usize, offset: usize) -> usize {
        let span = &self.spans[span_index];
        if offset == 0 {
            return span_index;
        }
        if offset >= span.len() {
            return span_index + 1;
        }
        let offset = snap_to_boundary(&span.text, offset);
        if offset == 0 {
            return span_index;
        }
        let (left, right) = span.split_at(offset);
        self.spans[span_index] = left;
        self.spans.insert(span_index + 1, right);
        span_index + 1
    }

    /// Ensure a span boundary at a block-relative offset. Returns the index of the first span at or after it.
    pub fn split_at_flat(&mut self, flat: usize) -> usize {
        let mut start = 0;
        for index in 0..self.spans.len() {
            if flat == start {
                return index;
            }
            let end = start + self.spans[index].len();
            if flat < end {
                return self.split_span(index, flat - start);
            }
            start = end;
        }
        self.spans.len()
    }

    /// Merge neighbours with equal styles and drop empty spans, keeping a placeholder when nothing is left
    pub fn merge_adjacent_equal_spans(&mut self) {
        let placeholder = self.spans.first().map(|s| s.style).unwrap_or_default();
        let mut merged: Vec<Span> = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            if span.is_empty() {
                continue;
            }
            if let Some(last) = merged.last_mut()
                && last.style == span.style
            {
                last.text.push_str(&span.text);
                continue;
            }
            merged.push(span);
        }
        if merged.is_empty() {
            merged.push(Span::new("", placeholder));
        }
        self.spans = merged;
    }

    /// Insert `text` with `style` at a span-relative location.
    /// Returns the (span_index, offset) right after the inserted text.
    pub fn insert_text(
        &mut self,
        span_index: usize,
        offset: usize,
        text: &str,
        style: Style,
    ) -> (usize, usize) {
        let flat = self.flat_offset(span_index, offset);
        if text.is_empty() {
            return (span_index, offset);
        }

        if self.is_empty() {
            self.spans = vec![Span::new(text, style)];
            return (0, text.len());
        }

        if self.spans[span_index].style == style {
            let offset = snap_to_boundary(&self.spans[span_index].text, offset);
            self.spans[span_index].text.insert_str(offset, text);
        } else {
            let at = self.split_span(span_index, offset);
            self.spans.insert(at, Span::new(text, style));
        }

        self.merge_adjacent_equal_spans();
        self.locate(flat + text.len(), Bias::Upstream)
    }

    /// Insert an empty span carrying `style` at a span-relative location.
    /// Returns its span index. The block is left unnormalized.
    pub(crate) fn insert_marker(&mut self, span_index: usize, offset: usize, style: Style) -> usize {
        if self.is_empty() {
            self.spans = vec![Span::new("", style)];
            return 0;
        }
        let at = self.split_span(span_index, offset);
        self.spans.insert(at, Span::new("", style));
        at
    }

    /// Delete text in [from..to) of the flattened block text
    pub fn delete_flat_range(&mut self, from: usize, to: usize) {
        let len = self.text_len();
        let to = to.min(len);
        if from >= to {
            return;
        }
        let placeholder = self
            .style_after(from)
            .unwrap_or_else(|| self.leading_style());
        let a = self.split_at_flat(from);
        let b = self.split_at_flat(to);
        self.spans.drain(a..b);
        if self.spans.is_empty() {
            self.spans.push(Span::new("", placeholder));
        }
        self.merge_adjacent_equal_spans();
    }

    /// Split this block at a flattened offset, returning the right part's spans (possibly none).
    /// The left part remains in self, with a placeholder if it became empty.
    pub fn split_off(&mut self, flat: usize) -> Vec<Span> {
        let leading = self.style_after(flat).unwrap_or_else(|| self.leading_style());
        let at = self.split_at_flat(flat);
        let right: Vec<Span> = self
            .spans
            .split_off(at)
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if self.spans.is_empty() {
            self.spans.push(Span::new("", leading));
        }
        self.merge_adjacent_equal_spans();
        right
    }

    /// Append spans at the end of this block
    pub fn append(&mut self, spans: Vec<Span>) {
        if spans.iter().all(Span::is_empty) {
            return;
        }
        self.spans.extend(spans);
        self.merge_adjacent_equal_spans();
    }

    /// Apply `apply` to the style of every span within [from..to), splitting at the edges
    pub fn map_styles(&mut self, from: usize, to: usize, apply: &mut impl FnMut(&mut Style)) {
        let to = to.min(self.text_len());
        if from >= to {
            return;
        }
        let a = self.split_at_flat(from);
        let b = self.split_at_flat(to);
        for span in &mut self.spans[a..b] {
            apply(&mut span.style);
        }
        self.merge_adjacent_equal_spans();
    }

    /// Styles of spans with a non-empty overlap with [from..to)
    pub fn styles_in(&self, from: usize, to: usize) -> impl Iterator<Item = &Style> {
        let mut start = 0;
        self.spans.iter().filter_map(move |span| {
            let span_start = start;
            start += span.len();
            (!span.is_empty() && span_start < to && start > from).then_some(&span.style)
        })
    }

    pub(crate) fn spans_mut(&mut self) -> &mut Vec<Span> {
        &mut self.spans
    }
}

/// Which side wins when an offset sits on a span boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    Upstream,
    Downstream,
}

/// Addressable location: a span within a block and a byte offset into that span
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub block_index: usize,
    pub span_index: usize,
    /// Byte offset into the span's text, on a char boundary
    pub offset: usize,
}

impl Position {
    pub fn new(block_index: usize, span_index: usize, offset: usize) -> Self {
        Position {
            block_index,
            span_index,
            offset,
        }
    }

    pub fn start() -> Self {
        Position::new(0, 0, 0)
    }
}

/// A block-relative location that ignores span structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockOffset {
    pub block_index: usize,
    pub offset: usize,
}

impl BlockOffset {
    pub fn new(block_index: usize, offset: usize) -> Self {
        BlockOffset {
            block_index,
            offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
    #[error("document has no blocks")]
    NoBlocks,
    #[error("block {0} has no spans")]
    NoSpans(usize),
    #[error("block {block} span {span} is empty but not the block's only span")]
    StrayEmptySpan { block: usize, span: usize },
}

/// The structured document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    /// An empty document: one block holding one empty span
    pub fn new() -> Self {
        Self::with_style(Style::default())
    }

    pub fn with_style(style: Style) -> Self {
        Document {
            blocks: vec![Block::empty(style)],
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        if blocks.is_empty() {
            return Self::new();
        }
        Document { blocks }
    }

    /// Create a simple document with one paragraph
    pub fn with_paragraph(text: impl Into<String>) -> Self {
        Document {
            blocks: vec![Block::from_text(text, Style::default())],
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// True when the document is one empty block
    pub fn is_empty(&self) -> bool {
        self.blocks.len() == 1 && self.blocks[0].is_empty()
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    pub fn start(&self) -> Position {
        Position::start()
    }

    pub fn end(&self) -> Position {
        let block_index = self.blocks.len() - 1;
        let block = &self.blocks[block_index];
        let span_index = block.span_count() - 1;
        Position::new(block_index, span_index, block.spans()[span_index].len())
    }

    /// Check that a position addresses a span in this document. Offsets are snapped to a char boundary.
    pub fn resolve(&self, pos: Position) -> Option<Position> {
        let block = self.blocks.get(pos.block_index)?;
        let span = block.spans().get(pos.span_index)?;
        if pos.offset > span.len() {
            return None;
        }
        Some(Position {
            offset: snap_to_boundary(&span.text, pos.offset),
            ..pos
        })
    }

    /// Validate and clamp a position to document bounds
    pub fn clamp_position(&self, pos: Position) -> Position {
        if let Some(pos) = self.resolve(pos) {
            return pos;
        }
        if pos.block_index >= self.blocks.len() {
            return self.end();
        }
        let block = &self.blocks[pos.block_index];
        if pos.span_index >= block.span_count() {
            let last = block.span_count() - 1;
            return Position::new(pos.block_index, last, block.spans()[last].len());
        }
        let span = &block.spans()[pos.span_index];
        Position::new(pos.block_index, pos.span_index, span.len())
    }

    /// Block-relative offset of a position (clamped)
    pub fn point_of(&self, pos: Position) -> BlockOffset {
        let pos = self.clamp_position(pos);
        let block = &self.blocks[pos.block_index];
        BlockOffset::new(pos.block_index, block.flat_offset(pos.span_index, pos.offset))
    }

    /// Position of a block-relative offset (clamped)
    pub fn position_at(&self, point: BlockOffset, bias: Bias) -> Position {
        let block_index = point.block_index.min(self.blocks.len() - 1);
        let (span_index, offset) = self.blocks[block_index].locate(point.offset, bias);
        Position::new(block_index, span_index, offset)
    }

    /// Position with the same block offset, re-located with `bias`
    pub fn normalize_position(&self, pos: Position, bias: Bias) -> Position {
        self.position_at(self.point_of(pos), bias)
    }

    pub fn to_plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(Block::to_plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Plain text between two positions, blocks separated by `\n`
    pub fn text_in_range(&self, start: Position, end: Position) -> String {
        let (a, b) = ordered(self.point_of(start), self.point_of(end));
        let mut out = String::new();
        for index in a.block_index..=b.block_index {
            let text = self.blocks[index].to_plain_text();
            let from = if index == a.block_index { a.offset } else { 0 };
            let to = if index == b.block_index {
                b.offset
            } else {
                text.len()
            };
            if index > a.block_index {
                out.push('\n');
            }
            if from < to {
                out.push_str(&text[from..to]);
            }
        }
        out
    }

    /// Insert text carrying `style`; returns the position right after it
    pub fn insert_text(&mut self, pos: Position, text: &str, style: Style) -> Position {
        let pos = self.clamp_position(pos);
        let block = &mut self.blocks[pos.block_index];
        let (span_index, offset) = block.insert_text(pos.span_index, pos.offset, text, style);
        Position::new(pos.block_index, span_index, offset)
    }

    /// Split the span under `pos` so a boundary exists there; returns the position at the start of the right span
    pub fn split_span(&mut self, pos: Position) -> Position {
        let pos = self.clamp_position(pos);
        let block = &mut self.blocks[pos.block_index];
        let at = block.split_span(pos.span_index, pos.offset);
        if at >= block.span_count() {
            let last = block.span_count() - 1;
            return Position::new(pos.block_index, last, block.spans()[last].len());
        }
        Position::new(pos.block_index, at, 0)
    }

    pub fn merge_adjacent_equal_spans(&mut self, block_index: usize) {
        if let Some(block) = self.blocks.get_mut(block_index) {
            block.merge_adjacent_equal_spans();
        }
    }

    /// Delete content between two positions (in either order).
    /// A range spanning blocks merges the tail of the end block into the start block.
    /// Returns the position where the deleted content began.
    pub fn delete_range(&mut self, start: Position, end: Position) -> Position {
        let (a, b) = ordered(self.point_of(start), self.point_of(end));

        if a.block_index == b.block_index {
            self.blocks[a.block_index].delete_flat_range(a.offset, b.offset);
            return self.position_at(a, Bias::Upstream);
        }

        let tail = self.blocks[b.block_index].split_off(b.offset);
        {
            let block = &mut self.blocks[a.block_index];
            let len = block.text_len();
            block.delete_flat_range(a.offset, len);
        }
        self.blocks.drain(a.block_index + 1..=b.block_index);
        self.blocks[a.block_index].append(tail);
        self.position_at(a, Bias::Upstream)
    }

    /// Split the block at `pos` into two. The new block's placeholder (if it ends up empty)
    /// carries `placeholder_style`. Returns the position at the start of the new block.
    pub fn split_block(&mut self, pos: Position, placeholder_style: Style) -> Position {
        let point = self.point_of(pos);
        let right = self.blocks[point.block_index].split_off(point.offset);
        let mut block = Block::empty(placeholder_style);
        block.append(right);
        self.blocks.insert(point.block_index + 1, block);
        Position::new(point.block_index + 1, 0, 0)
    }

    /// Splice blocks in at `pos`: the first joins the current block, the last receives
    /// the content that followed `pos`. Returns the position after the inserted content.
    pub fn insert_blocks(&mut self, pos: Position, blocks: Vec<Block>) -> Position {
        if blocks.is_empty() {
            return self.clamp_position(pos);
        }
        let point = self.point_of(pos);
        let tail = self.blocks[point.block_index].split_off(point.offset);

        let mut incoming = blocks.into_iter();
        let mut last = point.block_index;
        if let Some(first) = incoming.next() {
            self.blocks[last].append(first.spans);
        }
        for block in incoming {
            last += 1;
            self.blocks.insert(last, block);
        }

        let end = BlockOffset::new(last, self.blocks[last].text_len());
        self.blocks[last].append(tail);
        self.position_at(end, Bias::Upstream)
    }

    /// Apply `apply` to every span style between two positions, splitting spans at the edges.
    /// Returns the (ordered) block offsets of the range, which are unaffected by restyling.
    pub fn map_styles_in_range(
        &mut self,
        start: Position,
        end: Position,
        mut apply: impl FnMut(&mut Style),
    ) -> (BlockOffset, BlockOffset) {
        let (a, b) = ordered(self.point_of(start), self.point_of(end));
        for index in a.block_index..=b.block_index {
            let block = &mut self.blocks[index];
            let from = if index == a.block_index { a.offset } else { 0 };
            let to = if index == b.block_index {
                b.offset
            } else {
                block.text_len()
            };
            block.map_styles(from, to, &mut apply);
        }
        (a, b)
    }

    /// Styles of every span with a non-empty overlap with the range
    pub fn styles_in_range(&self, start: Position, end: Position) -> Vec<Style> {
        let (a, b) = ordered(self.point_of(start), self.point_of(end));
        let mut styles = Vec::new();
        for index in a.block_index..=b.block_index {
            let block = &self.blocks[index];
            let from = if index == a.block_index { a.offset } else { 0 };
            let to = if index == b.block_index {
                b.offset
            } else {
                block.text_len()
            };
            styles.extend(block.styles_in(from, to).copied());
        }
        styles
    }

    /// Check the block/span invariants. An empty span is tolerated at `marker`.
    pub fn validate_allowing(&self, marker: Option<Position>) -> Result<(), InvariantError> {
        if self.blocks.is_empty() {
            return Err(InvariantError::NoBlocks);
        }
        for (bi, block) in self.blocks.iter().enumerate() {
            if block.spans.is_empty() {
                return Err(InvariantError::NoSpans(bi));
            }
            if block.spans.len() == 1 {
                continue;
            }
            for (si, span) in block.spans.iter().enumerate() {
                let is_marker = marker
                    .is_some_and(|m| m.block_index == bi && m.span_index == si);
                if span.is_empty() && !is_marker {
                    return Err(InvariantError::StrayEmptySpan {
                        block: bi,
                        span: si,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), InvariantError> {
        self.validate_allowing(None)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document ({} blocks):", self.blocks.len())?;
        for (i, block) in self.blocks.iter().enumerate() {
            write!(f, "  [{}]", i)?;
            for span in block.spans() {
                write!(f, " {:?}", span.text)?;
                let s = &span.style;
                let mut flags = Vec::new();
                if s.bold {
                    flags.push("b".to_string());
                }
                if s.italic {
                    flags.push("i".to_string());
                }
                if s.underline {
                    flags.push("u".to_string());
                }
                if s.strikethrough {
                    flags.push("s".to_string());
                }
                flags.push(format!("{}px", s.font_size));
                if let Some(color) = s.color {
                    flags.push(format!("fg={}", color));
                }
                if let Some(color) = s.highlight {
                    flags.push(format!("bg={}", color));
                }
                write!(f, "({})", flags.join(","))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn ordered(a: BlockOffset, b: BlockOffset) -> (BlockOffset, BlockOffset) {
    if b < a { (b, a) } else { (a, b) }
}

/// Largest char boundary at or below `offset`
pub(crate) fn snap_to_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}
