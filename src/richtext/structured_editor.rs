// Structured Editor
// Editing and formatting commands over a Document, with the cursor,
// the pending (active) style and the style marker that carries it.

use tracing::{debug, warn};
use unicode_segmentation::UnicodeSegmentation;

use super::paste::{PasteInput, sanitize_and_normalize};
use super::selection::{Selection, SelectionDescriptor, restore_selection, serialize_selection};
use super::structured_document::{Bias, BlockOffset, Document, Position};
use super::style::{
    ColorKind, DisplayedStyle, Style, StyleChange, ToggleAttr, clamp_font_size, parse_color_value,
};
use super::style_state::{StyleEvent, StyleTracker};
use crate::config::EditorConfig;

/// Result of an editing operation
pub type EditResult = Result<(), EditError>;

/// Errors that can occur during editing. Every error leaves the editor unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("selection does not resolve in the document")]
    SelectionOutOfDocument,
    #[error("invalid color value {0:?}")]
    InvalidColorValue(String),
    #[error("nothing to paste")]
    EmptyPaste,
}

/// How a serialized selection came back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(Selection),
    /// Nothing matched; the cursor sits at the end of the document
    CollapsedToEnd,
}

/// The structured editor with cursor and style state
#[derive(Debug, Clone)]
pub struct StructuredEditor {
    document: Document,
    selection: Selection,
    /// Empty span carrying the active style at the cursor, if one is placed
    marker: Option<Position>,
    styles: StyleTracker,
    config: EditorConfig,
    dirty: bool,
}

impl StructuredEditor {
    /// Create a new editor with an empty document
    pub fn new() -> Self {
        Self::with_config(EditorConfig::default())
    }

    pub fn with_config(config: EditorConfig) -> Self {
        let document = Document::with_style(config.default_style());
        Self::with_document(document, config)
    }

    /// Create an editor with an existing document
    pub fn with_document(document: Document, config: EditorConfig) -> Self {
        let mut editor = StructuredEditor {
            document: Document::new(),
            selection: Selection::default(),
            marker: None,
            styles: StyleTracker::new(config.default_style()),
            config,
            dirty: false,
        };
        editor.load_document(document);
        editor
    }

    /// Replace the document. The cursor goes to the start and the active style
    /// is taken from there.
    pub fn load_document(&mut self, mut document: Document) {
        for block in document.blocks_mut() {
            block.merge_adjacent_equal_spans();
        }
        self.document = document;
        self.marker = None;
        self.selection = Selection::collapsed(self.document.start());
        self.finish_edit(StyleEvent::Loaded);
    }

    /// Get the document, including a style marker if one is placed
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// A copy of the document without the style marker
    pub fn snapshot(&self) -> Document {
        let mut doc = self.document.clone();
        if let Some(marker) = self.marker {
            doc.merge_adjacent_equal_spans(marker.block_index);
        }
        doc
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Get cursor position (the selection's focus)
    pub fn cursor(&self) -> Position {
        self.selection.focus
    }

    pub fn marker(&self) -> Option<Position> {
        self.marker
    }

    /// Style the next typed character gets
    pub fn active_style(&self) -> Style {
        self.styles.active()
    }

    /// Style for the toolbar: the active style for a cursor, per-attribute uniform-or-mixed for a range
    pub fn displayed_style(&self) -> DisplayedStyle {
        self.styles.displayed(&self.document, &self.selection)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and clear the needs-render flag
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Set the selection. Both ends must resolve in the current document.
    pub fn set_selection(&mut self, selection: Selection) -> EditResult {
        let anchor = self
            .document
            .resolve(selection.anchor)
            .ok_or(EditError::SelectionOutOfDocument)?;
        let focus = self
            .document
            .resolve(selection.focus)
            .ok_or(EditError::SelectionOutOfDocument)?;
        self.apply_selection(Selection::new(anchor, focus));
        Ok(())
    }

    /// Set cursor position (collapses the selection)
    pub fn set_cursor(&mut self, pos: Position) -> EditResult {
        self.set_selection(Selection::collapsed(pos))
    }

    /// Move the focus, keeping the anchor
    pub fn extend_selection_to(&mut self, pos: Position) -> EditResult {
        self.set_selection(Selection::new(self.selection.anchor, pos))
    }

    /// Select all content in the document
    pub fn select_all(&mut self) {
        let all = Selection::new(self.document.start(), self.document.end());
        self.apply_selection(all);
    }

    pub fn serialize_selection(&self) -> SelectionDescriptor {
        serialize_selection(&self.selection, &self.document)
    }

    /// Restore a serialized selection, collapsing to the document end when it cannot be found
    pub fn restore_selection(&mut self, descriptor: &SelectionDescriptor) -> RestoreOutcome {
        match restore_selection(descriptor, &self.document) {
            Some(selection) => {
                self.apply_selection(selection);
                RestoreOutcome::Restored(self.selection)
            }
            None => {
                debug!("selection could not be restored, collapsing to document end");
                self.apply_selection(Selection::collapsed(self.document.end()));
                RestoreOutcome::CollapsedToEnd
            }
        }
    }

    fn apply_selection(&mut self, selection: Selection) {
        let anchor = self.document.point_of(selection.anchor);
        let focus = self.document.point_of(selection.focus);

        // Coming back to the marker keeps the pending style
        if let Some(marker) = self.marker
            && anchor == focus
            && focus == self.document.point_of(marker)
        {
            self.selection = Selection::collapsed(marker);
            self.styles.invalidate();
            return;
        }

        self.selection = if self.take_marker() {
            Selection::new(
                self.document.position_at(anchor, Bias::Upstream),
                self.document.position_at(focus, Bias::Upstream),
            )
        } else {
            selection
        };
        self.styles
            .transition(StyleEvent::SelectionChanged, &self.document, &self.selection);
    }

    fn step_left(&self, point: BlockOffset) -> BlockOffset {
        if point.offset > 0 {
            let text = self.document.blocks()[point.block_index].to_plain_text();
            let prev = text[..point.offset]
                .grapheme_indices(true)
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
            BlockOffset::new(point.block_index, prev)
        } else if point.block_index > 0 {
            let block_index = point.block_index - 1;
            BlockOffset::new(block_index, self.document.blocks()[block_index].text_len())
        } else {
            point
        }
    }

    fn step_right(&self, point: BlockOffset) -> BlockOffset {
        let text = self.document.blocks()[point.block_index].to_plain_text();
        if point.offset < text.len() {
            let next = text[point.offset..]
                .graphemes(true)
                .next()
                .map(|g| point.offset + g.len())
                .unwrap_or(text.len());
            BlockOffset::new(point.block_index, next)
        } else if point.block_index + 1 < self.document.block_count() {
            BlockOffset::new(point.block_index + 1, 0)
        } else {
            point
        }
    }

    fn collapse_to(&mut self, point: BlockOffset) {
        let pos = self.document.position_at(point, Bias::Upstream);
        self.apply_selection(Selection::collapsed(pos));
    }

    fn extend_to(&mut self, point: BlockOffset) {
        let pos = self.document.position_at(point, Bias::Upstream);
        self.apply_selection(Selection::new(self.selection.anchor, pos));
    }

    fn focus_point(&self) -> BlockOffset {
        self.document.point_of(self.selection.focus)
    }

    /// Move cursor left one grapheme, or to the start of a selection
    pub fn move_left(&mut self) {
        let target = if self.selection.is_empty_in(&self.document) {
            self.step_left(self.focus_point())
        } else {
            self.document.point_of(self.selection.start())
        };
        self.collapse_to(target);
    }

    /// Move cursor right one grapheme, or to the end of a selection
    pub fn move_right(&mut self) {
        let target = if self.selection.is_empty_in(&self.document) {
            self.step_right(self.focus_point())
        } else {
            self.document.point_of(self.selection.end())
        };
        self.collapse_to(target);
    }

    pub fn move_left_extend(&mut self) {
        let target = self.step_left(self.focus_point());
        self.extend_to(target);
    }

    pub fn move_right_extend(&mut self) {
        let target = self.step_right(self.focus_point());
        self.extend_to(target);
    }

    pub fn move_to_block_start(&mut self) {
        let block_index = self.focus_point().block_index;
        self.collapse_to(BlockOffset::new(block_index, 0));
    }

    pub fn move_to_block_end(&mut self) {
        let block_index = self.focus_point().block_index;
        let len = self.document.blocks()[block_index].text_len();
        self.collapse_to(BlockOffset::new(block_index, len));
    }

    pub fn move_to_document_start(&mut self) {
        self.collapse_to(BlockOffset::new(0, 0));
    }

    pub fn move_to_document_end(&mut self) {
        let end = self.document.point_of(self.document.end());
        self.collapse_to(end);
    }

    /// Selected text, blocks separated by `\n`
    pub fn selected_text(&self) -> String {
        self.document
            .text_in_range(self.selection.anchor, self.selection.focus)
    }

    /// Type text at the cursor with the active style, replacing a selection.
    /// Newlines split blocks.
    pub fn insert_text(&mut self, text: &str) -> EditResult {
        if text.is_empty() {
            return Ok(());
        }
        self.take_marker();
        if !self.selection.is_empty_in(&self.document) {
            self.remove_selected();
            self.styles
                .transition(StyleEvent::Edited, &self.document, &self.selection);
        }

        let style = self.styles.active();
        let text = text.replace("\r\n", "\n").replace('\r', "\n");
        let mut pos = self.selection.focus;
        for (index, line) in text.split('\n').enumerate() {
            if index > 0 {
                pos = self.document.split_block(pos, style);
            }
            pos = self.document.insert_text(pos, line, style);
        }
        self.selection = Selection::collapsed(pos);
        self.finish_edit(StyleEvent::Edited);
        Ok(())
    }

    /// Split the current block at the cursor (Enter). Typing continues with the active style.
    pub fn split_block(&mut self) -> EditResult {
        self.take_marker();
        if !self.selection.is_empty_in(&self.document) {
            self.remove_selected();
            self.styles
                .transition(StyleEvent::Edited, &self.document, &self.selection);
        }

        let style = self.styles.active();
        let pos = self.document.split_block(self.selection.focus, style);
        self.selection = Selection::collapsed(pos);
        self.place_marker();
        self.finish_edit(StyleEvent::Edited);
        Ok(())
    }

    /// Delete the grapheme before the cursor (backspace), or the selection
    pub fn delete_backward(&mut self) -> EditResult {
        if !self.selection.is_empty_in(&self.document) {
            return self.delete_selection();
        }
        self.take_marker();
        let point = self.focus_point();
        let from = self.step_left(point);
        if from == point {
            return Ok(());
        }
        let from = self.document.position_at(from, Bias::Upstream);
        let pos = self.document.delete_range(from, self.selection.focus);
        self.selection = Selection::collapsed(pos);
        self.finish_edit(StyleEvent::Edited);
        Ok(())
    }

    /// Delete the grapheme after the cursor (delete key), or the selection
    pub fn delete_forward(&mut self) -> EditResult {
        if !self.selection.is_empty_in(&self.document) {
            return self.delete_selection();
        }
        self.take_marker();
        let point = self.focus_point();
        let to = self.step_right(point);
        if to == point {
            return Ok(());
        }
        let to = self.document.position_at(to, Bias::Upstream);
        let pos = self.document.delete_range(self.selection.focus, to);
        self.selection = Selection::collapsed(pos);
        self.finish_edit(StyleEvent::Edited);
        Ok(())
    }

    /// Delete the selected range
    pub fn delete_selection(&mut self) -> EditResult {
        self.take_marker();
        if self.selection.is_empty_in(&self.document) {
            return Ok(());
        }
        self.remove_selected();
        self.finish_edit(StyleEvent::Edited);
        Ok(())
    }

    fn remove_selected(&mut self) {
        let pos = self
            .document
            .delete_range(self.selection.anchor, self.selection.focus);
        self.selection = Selection::collapsed(pos);
    }

    /// Toggle a boolean attribute. Over a range this is the uniform toggle:
    /// off only if every touched span has it on, otherwise on everywhere.
    pub fn toggle_format(&mut self, attr: ToggleAttr) -> EditResult {
        self.take_marker();
        let value = if self.selection.is_empty_in(&self.document) {
            !self.styles.active().flag(attr)
        } else {
            let styles = self
                .document
                .styles_in_range(self.selection.start(), self.selection.end());
            !DisplayedStyle::from_styles(&styles).is_some_and(|displayed| displayed.is_on(attr))
        };
        self.apply_change(StyleChange::Flag(attr, value));
        Ok(())
    }

    /// Toggle bold style on the current selection
    pub fn toggle_bold(&mut self) -> EditResult {
        self.toggle_format(ToggleAttr::Bold)
    }

    /// Toggle italic style on the current selection
    pub fn toggle_italic(&mut self) -> EditResult {
        self.toggle_format(ToggleAttr::Italic)
    }

    pub fn toggle_underline(&mut self) -> EditResult {
        self.toggle_format(ToggleAttr::Underline)
    }

    pub fn toggle_strikethrough(&mut self) -> EditResult {
        self.toggle_format(ToggleAttr::Strikethrough)
    }

    /// Set or clear (None) the text or highlight color. An unparsable value changes nothing.
    pub fn apply_color(&mut self, kind: ColorKind, value: Option<&str>) -> EditResult {
        let color = match value {
            None => None,
            Some(value) => parse_color_value(value).map_err(|err| {
                warn!(%err, "rejecting color command");
                EditError::InvalidColorValue(value.to_string())
            })?,
        };
        self.take_marker();
        self.apply_change(StyleChange::Color(kind, color));
        Ok(())
    }

    /// Set the font size in pixels, clamped to the supported range
    pub fn apply_font_size(&mut self, px: i64) -> EditResult {
        let size = clamp_font_size(px);
        if i64::from(size) != px {
            debug!(requested = px, applied = size, "font size clamped");
        }
        self.take_marker();
        self.apply_change(StyleChange::FontSize(size));
        Ok(())
    }

    /// Reset the selection (or the active style) to the default style
    pub fn clear_formatting(&mut self) -> EditResult {
        self.take_marker();
        self.apply_change(StyleChange::Reset(self.config.default_style()));
        Ok(())
    }

    fn apply_change(&mut self, change: StyleChange) {
        if self.selection.is_empty_in(&self.document) {
            self.styles.transition(
                StyleEvent::Formatted(change),
                &self.document,
                &self.selection,
            );
            self.place_marker();
        } else {
            let backward = self.selection.is_backward();
            let (start, end) = self.document.map_styles_in_range(
                self.selection.anchor,
                self.selection.focus,
                |style| change.apply(style),
            );
            let start = self.document.position_at(start, Bias::Downstream);
            let end = self.document.position_at(end, Bias::Upstream);
            self.selection = if backward {
                Selection::new(end, start)
            } else {
                Selection::new(start, end)
            };
            self.styles.transition(
                StyleEvent::Formatted(change),
                &self.document,
                &self.selection,
            );
        }
        self.dirty = true;
        debug!(?change, mode = ?self.styles.mode(), "formatting applied");
        self.check_invariants();
    }

    /// Paste clipboard content at the cursor, replacing a selection
    pub fn paste(&mut self, input: &PasteInput) -> EditResult {
        let report = sanitize_and_normalize(input, &self.styles.active(), &self.config);
        if report.is_empty() {
            return Err(EditError::EmptyPaste);
        }
        if report.dropped_nodes > 0 {
            debug!(dropped = report.dropped_nodes, "paste dropped disallowed nodes");
        }

        self.take_marker();
        if !self.selection.is_empty_in(&self.document) {
            self.remove_selected();
        }
        let pos = self
            .document
            .insert_blocks(self.selection.focus, report.blocks);
        self.selection = Selection::collapsed(pos);
        self.finish_edit(StyleEvent::Edited);
        Ok(())
    }

    /// Remove the style marker if one is placed. The selection keeps its block offsets.
    fn take_marker(&mut self) -> bool {
        let Some(marker) = self.marker.take() else {
            return false;
        };
        let anchor = self.document.point_of(self.selection.anchor);
        let focus = self.document.point_of(self.selection.focus);
        self.document.merge_adjacent_equal_spans(marker.block_index);
        self.selection = Selection::new(
            self.document.position_at(anchor, Bias::Upstream),
            self.document.position_at(focus, Bias::Upstream),
        );
        self.dirty = true;
        true
    }

    /// Make the active style visible at a collapsed cursor: restyle an empty
    /// block's placeholder, or insert a marker span where typing would
    /// otherwise inherit a different style.
    fn place_marker(&mut self) {
        if !self.selection.is_collapsed() {
            return;
        }
        let style = self.styles.active();
        let pos = self.document.clamp_position(self.selection.focus);
        let block = &mut self.document.blocks_mut()[pos.block_index];

        if block.is_empty() {
            block.spans_mut()[0].style = style;
            return;
        }
        let flat = block.flat_offset(pos.span_index, pos.offset);
        let inherited = block.style_before(flat).or_else(|| block.style_after(flat));
        if inherited == Some(style) {
            return;
        }
        let span_index = block.insert_marker(pos.span_index, pos.offset, style);
        let marker = Position::new(pos.block_index, span_index, 0);
        self.marker = Some(marker);
        self.selection = Selection::collapsed(marker);
    }

    fn finish_edit(&mut self, event: StyleEvent) {
        self.styles
            .transition(event, &self.document, &self.selection);
        self.dirty = true;
        self.check_invariants();
    }

    fn check_invariants(&self) {
        debug_assert!(
            self.document.validate_allowing(self.marker).is_ok(),
            "document invariants violated:\n{}",
            self.document
        );
    }
}

impl Default for StructuredEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::structured_document::{Block, Span};
    use crate::richtext::style::{AttrState, Color};

    fn editor_with(blocks: Vec<Block>) -> StructuredEditor {
        StructuredEditor::with_document(Document::from_blocks(blocks), EditorConfig::default())
    }

    fn hello_world() -> StructuredEditor {
        editor_with(vec![Block::from_text("Hello World", Style::plain())])
    }

    fn select(editor: &mut StructuredEditor, anchor: Position, focus: Position) {
        editor.set_selection(Selection::new(anchor, focus)).unwrap();
    }

    #[test]
    fn test_toggle_bold_on_selection_and_back() {
        let mut editor = hello_world();
        select(&mut editor, Position::new(0, 0, 0), Position::new(0, 0, 5));
        editor.toggle_bold().unwrap();
        assert_eq!(
            editor.document().blocks()[0].spans(),
            &[
                Span::new("Hello", Style::bold()),
                Span::new(" World", Style::plain())
            ]
        );
        assert_eq!(editor.selected_text(), "Hello");

        editor.toggle_bold().unwrap();
        assert_eq!(
            editor.document().blocks()[0].spans(),
            &[Span::new("Hello World", Style::plain())]
        );
    }

    #[test]
    fn test_mixed_selection_turns_on_everywhere() {
        let mut editor = editor_with(vec![
            Block::from_text("Hello", Style::bold()).with_plain_text(" World"),
        ]);
        editor.select_all();
        editor.toggle_bold().unwrap();
        assert_eq!(
            editor.document().blocks()[0].spans(),
            &[Span::new("Hello World", Style::bold())]
        );
        editor.toggle_bold().unwrap();
        assert_eq!(
            editor.document().blocks()[0].spans(),
            &[Span::new("Hello World", Style::plain())]
        );
    }

    #[test]
    fn test_toggle_across_blocks() {
        let mut editor = editor_with(vec![
            Block::from_text("abc", Style::plain()),
            Block::from_text("def", Style::plain()),
        ]);
        // Backward selection keeps its direction
        select(&mut editor, Position::new(1, 0, 1), Position::new(0, 0, 2));
        editor.toggle_italic().unwrap();
        let doc = editor.document();
        assert_eq!(doc.blocks()[0].spans()[1], Span::new("c", Style::italic()));
        assert_eq!(doc.blocks()[1].spans()[0], Span::new("d", Style::italic()));
        assert!(editor.selection().is_backward());
        assert_eq!(editor.selected_text(), "c\nd");
    }

    #[test]
    fn test_collapsed_toggle_places_marker() {
        let mut editor = hello_world();
        editor.set_cursor(Position::new(0, 0, 5)).unwrap();
        editor.toggle_bold().unwrap();

        assert_eq!(editor.marker(), Some(Position::new(0, 1, 0)));
        assert_eq!(editor.cursor(), Position::new(0, 1, 0));
        assert_eq!(editor.active_style(), Style::bold());
        assert_eq!(editor.displayed_style().bold, AttrState::Uniform(true));
        assert_eq!(editor.document().blocks()[0].span_count(), 3);
        assert_eq!(editor.snapshot().blocks()[0].span_count(), 1);

        editor.insert_text("X").unwrap();
        assert_eq!(editor.marker(), None);
        assert_eq!(
            editor.document().blocks()[0].spans(),
            &[
                Span::new("Hello", Style::plain()),
                Span::new("X", Style::bold()),
                Span::new(" World", Style::plain()),
            ]
        );
        assert!(editor.document().validate().is_ok());
    }

    #[test]
    fn test_pending_color_applies_to_next_character() {
        let mut editor = hello_world();
        editor.set_cursor(Position::new(0, 0, 11)).unwrap();
        editor
            .apply_color(ColorKind::Text, Some("#ff0000"))
            .unwrap();
        editor.insert_text("!").unwrap();
        let red = Style::plain().with_color(Some(Color::rgb(255, 0, 0)));
        assert_eq!(
            editor.document().blocks()[0].spans(),
            &[
                Span::new("Hello World", Style::plain()),
                Span::new("!", red)
            ]
        );
    }

    #[test]
    fn test_pending_font_size() {
        let mut editor = hello_world();
        editor.move_to_document_end();
        editor.apply_font_size(24).unwrap();
        editor.insert_text("a").unwrap();
        let block = &editor.document().blocks()[0];
        assert_eq!(block.spans()[block.span_count() - 1].style.font_size, 24);
    }

    #[test]
    fn test_font_size_is_clamped() {
        let mut editor = hello_world();
        editor.apply_font_size(500).unwrap();
        assert_eq!(editor.active_style().font_size, 200);
        editor.apply_font_size(-3).unwrap();
        assert_eq!(editor.active_style().font_size, 8);
    }

    #[test]
    fn test_invalid_color_is_a_no_op() {
        let mut editor = hello_world();
        select(&mut editor, Position::new(0, 0, 0), Position::new(0, 0, 5));
        let before = editor.document().clone();
        assert_eq!(
            editor.apply_color(ColorKind::Highlight, Some("nope")),
            Err(EditError::InvalidColorValue("nope".to_string()))
        );
        assert_eq!(editor.document(), &before);
        assert_eq!(editor.active_style(), Style::plain());
    }

    #[test]
    fn test_clearing_a_color() {
        let yellow = Style::plain().with_highlight(Some(Color::rgb(255, 255, 0)));
        let mut editor = editor_with(vec![Block::from_text("marked", yellow)]);
        editor.select_all();
        editor.apply_color(ColorKind::Highlight, None).unwrap();
        assert_eq!(editor.document().blocks()[0].leading_style(), Style::plain());
    }

    #[test]
    fn test_moving_away_drops_marker() {
        let mut editor = hello_world();
        editor.set_cursor(Position::new(0, 0, 5)).unwrap();
        editor.toggle_bold().unwrap();
        editor.set_cursor(Position::new(0, 0, 2)).unwrap();
        assert_eq!(editor.marker(), None);
        assert_eq!(editor.active_style(), Style::plain());
        assert_eq!(editor.document().blocks()[0].span_count(), 1);
    }

    #[test]
    fn test_returning_to_marker_keeps_pending_style() {
        let mut editor = hello_world();
        editor.set_cursor(Position::new(0, 0, 5)).unwrap();
        editor.toggle_bold().unwrap();
        // Same character gap, addressed through the span before the marker
        editor.set_cursor(Position::new(0, 0, 5)).unwrap();
        assert_eq!(editor.marker(), Some(Position::new(0, 1, 0)));
        assert_eq!(editor.active_style(), Style::bold());
    }

    #[test]
    fn test_cursor_inherits_style_from_left() {
        let mut editor = editor_with(vec![
            Block::from_text("Hello", Style::bold()).with_plain_text(" World"),
        ]);
        editor.set_cursor(Position::new(0, 1, 0)).unwrap();
        assert_eq!(editor.active_style(), Style::bold());
        editor.move_right();
        assert_eq!(editor.active_style(), Style::plain());
        editor.move_to_block_start();
        assert_eq!(editor.active_style(), Style::bold());
    }

    #[test]
    fn test_split_block_at_end_carries_active_style() {
        let mut editor = editor_with(vec![Block::from_text("Hello", Style::plain())]);
        editor.move_to_document_end();
        editor.toggle_bold().unwrap();
        editor.split_block().unwrap();

        assert_eq!(editor.document().block_count(), 2);
        assert_eq!(editor.document().blocks()[0].spans(), &[Span::plain("Hello")]);
        assert!(editor.document().blocks()[1].is_empty());
        assert_eq!(editor.document().blocks()[1].leading_style(), Style::bold());
        assert_eq!(editor.cursor(), Position::new(1, 0, 0));

        editor.insert_text("x").unwrap();
        assert_eq!(
            editor.document().blocks()[1].spans(),
            &[Span::new("x", Style::bold())]
        );
    }

    #[test]
    fn test_split_block_mid_text_places_marker() {
        let mut editor = hello_world();
        editor.set_cursor(Position::new(0, 0, 5)).unwrap();
        editor.toggle_italic().unwrap();
        editor.split_block().unwrap();

        assert_eq!(editor.marker(), Some(Position::new(1, 0, 0)));
        assert_eq!(editor.active_style(), Style::italic());
        editor.insert_text("x").unwrap();
        assert_eq!(
            editor.document().blocks()[1].spans(),
            &[
                Span::new("x", Style::italic()),
                Span::new(" World", Style::plain())
            ]
        );
        assert_eq!(editor.document().blocks()[0].to_plain_text(), "Hello");
    }

    #[test]
    fn test_insert_text_with_newlines() {
        let mut editor = StructuredEditor::new();
        editor.insert_text("one\r\ntwo\nthree").unwrap();
        assert_eq!(editor.document().block_count(), 3);
        assert_eq!(editor.document().to_plain_text(), "one\ntwo\nthree");
        assert_eq!(editor.cursor(), Position::new(2, 0, 5));
    }

    #[test]
    fn test_typing_replaces_selection() {
        let mut editor = editor_with(vec![
            Block::from_text("Hello", Style::bold()).with_plain_text(" World"),
        ]);
        select(&mut editor, Position::new(0, 0, 1), Position::new(0, 1, 3));
        editor.insert_text("i").unwrap();
        assert_eq!(editor.document().to_plain_text(), "Hirld");
        // The replacement inherits from the left of the deleted range
        assert_eq!(editor.document().blocks()[0].spans()[0].text, "Hi");
    }

    #[test]
    fn test_delete_backward_by_grapheme() {
        let mut editor = editor_with(vec![Block::from_text("ae\u{301}", Style::plain())]);
        editor.move_to_document_end();
        editor.delete_backward().unwrap();
        assert_eq!(editor.document().to_plain_text(), "a");
        editor.delete_backward().unwrap();
        editor.delete_backward().unwrap();
        assert!(editor.document().is_empty());
    }

    #[test]
    fn test_delete_backward_merges_blocks() {
        let mut editor = editor_with(vec![
            Block::from_text("ab", Style::plain()),
            Block::from_text("cd", Style::bold()),
        ]);
        editor.set_cursor(Position::new(1, 0, 0)).unwrap();
        editor.delete_backward().unwrap();
        assert_eq!(editor.document().block_count(), 1);
        assert_eq!(editor.document().to_plain_text(), "abcd");
        assert_eq!(editor.document().point_of(editor.cursor()), BlockOffset::new(0, 2));
    }

    #[test]
    fn test_delete_forward() {
        let mut editor = editor_with(vec![
            Block::from_text("ab", Style::plain()),
            Block::from_text("cd", Style::plain()),
        ]);
        editor.set_cursor(Position::new(0, 0, 2)).unwrap();
        editor.delete_forward().unwrap();
        assert_eq!(editor.document().to_plain_text(), "abcd");
        editor.move_to_document_end();
        editor.delete_forward().unwrap();
        assert_eq!(editor.document().to_plain_text(), "abcd");
    }

    #[test]
    fn test_movement_and_extend() {
        let mut editor = editor_with(vec![
            Block::from_text("ab", Style::plain()),
            Block::from_text("cd", Style::plain()),
        ]);
        editor.move_right();
        editor.move_right();
        editor.move_right();
        assert_eq!(editor.cursor(), Position::new(1, 0, 0));
        editor.move_left();
        assert_eq!(editor.cursor(), Position::new(0, 0, 2));

        editor.move_left_extend();
        editor.move_left_extend();
        assert_eq!(editor.selected_text(), "ab");
        editor.move_right();
        assert_eq!(editor.cursor(), Position::new(0, 0, 2));
        assert!(editor.selection().is_collapsed());

        editor.move_right_extend();
        assert_eq!(editor.selected_text(), "\n");
        editor.move_to_document_start();
        assert_eq!(editor.cursor(), Position::start());
    }

    #[test]
    fn test_paste_plain_text_into_empty_document() {
        let mut editor = StructuredEditor::new();
        editor
            .paste(&PasteInput::PlainText("A\nB".to_string()))
            .unwrap();
        let doc = editor.document();
        assert_eq!(doc.block_count(), 2);
        assert_eq!(doc.blocks()[0].spans(), &[Span::plain("A")]);
        assert_eq!(doc.blocks()[1].spans(), &[Span::plain("B")]);
        assert_eq!(doc.point_of(editor.cursor()), BlockOffset::new(1, 1));
    }

    #[test]
    fn test_paste_markup_replaces_selection() {
        let mut editor = hello_world();
        select(&mut editor, Position::new(0, 0, 0), Position::new(0, 0, 5));
        editor
            .paste(&PasteInput::detect("<b>Hi</b><script>x</script>"))
            .unwrap();
        assert_eq!(
            editor.document().blocks()[0].spans(),
            &[
                Span::new("Hi", Style::bold()),
                Span::new(" World", Style::plain())
            ]
        );
        assert_eq!(editor.document().point_of(editor.cursor()), BlockOffset::new(0, 2));
    }

    #[test]
    fn test_empty_paste_is_rejected() {
        let mut editor = hello_world();
        assert_eq!(
            editor.paste(&PasteInput::detect("<style>p {}</style>")),
            Err(EditError::EmptyPaste)
        );
        assert_eq!(editor.document().to_plain_text(), "Hello World");
    }

    #[test]
    fn test_displayed_style_mixed_over_range() {
        let mut editor = editor_with(vec![
            Block::from_text("Hello", Style::bold()).with_plain_text(" World"),
        ]);
        editor.select_all();
        let displayed = editor.displayed_style();
        assert_eq!(displayed.bold, AttrState::Mixed);
        assert_eq!(displayed.italic, AttrState::Uniform(false));
    }

    #[test]
    fn test_clear_formatting() {
        let mut editor = editor_with(vec![
            Block::from_text("Hello", Style::bold()).with_text(" World", Style::italic()),
        ]);
        editor.select_all();
        editor.clear_formatting().unwrap();
        assert_eq!(
            editor.document().blocks()[0].spans(),
            &[Span::plain("Hello World")]
        );
    }

    #[test]
    fn test_loaded_document_sets_active_style() {
        let editor = editor_with(vec![Block::from_text("Bold start", Style::bold())]);
        assert_eq!(editor.active_style(), Style::bold());
    }

    #[test]
    fn test_set_cursor_out_of_document() {
        let mut editor = hello_world();
        assert_eq!(
            editor.set_cursor(Position::new(3, 0, 0)),
            Err(EditError::SelectionOutOfDocument)
        );
        assert_eq!(editor.cursor(), Position::start());
    }

    #[test]
    fn test_restore_selection_falls_back_to_end() {
        let mut editor = hello_world();
        editor.set_cursor(Position::new(0, 0, 2)).unwrap();
        let descriptor = editor.serialize_selection();
        assert_eq!(
            editor.restore_selection(&descriptor),
            RestoreOutcome::Restored(Selection::collapsed(Position::new(0, 0, 2)))
        );

        editor.load_document(Document::with_paragraph("Zzz"));
        assert_eq!(
            editor.restore_selection(&descriptor),
            RestoreOutcome::CollapsedToEnd
        );
        assert_eq!(editor.cursor(), Position::new(0, 0, 3));
    }

    #[test]
    fn test_dirty_flag() {
        let mut editor = hello_world();
        assert!(editor.take_dirty());
        assert!(!editor.is_dirty());
        editor.move_right();
        assert!(!editor.is_dirty());
        editor.insert_text("x").unwrap();
        assert!(editor.take_dirty());
    }
}
