// Active / displayed style state machine
//
// ActiveStyle is what the next typed character gets while the cursor is
// collapsed. DisplayedStyle is the read-only toolbar view: it mirrors
// ActiveStyle for a cursor and is folded per attribute over a range.

use std::cell::Cell;

use super::selection::Selection;
use super::structured_document::{Document, Position};
use super::style::{DisplayedStyle, Style, StyleChange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    Collapsed,
    Ranged,
}

/// Inputs to the style state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleEvent {
    /// A document was loaded; ActiveStyle starts from the style at its start
    Loaded,
    /// The cursor or selection moved without the document changing
    SelectionChanged,
    /// A formatting command ran against the current selection
    Formatted(StyleChange),
    /// The document changed under the selection (typing, deletion, paste)
    Edited,
}

/// Style the cursor at `pos` inherits: look left first, then right.
/// None for an empty block, where the caller keeps its prior style.
/// A style marker (an empty span beside other spans) yields its own style.
pub fn detect_style_at_position(doc: &Document, pos: Position) -> Option<Style> {
    let pos = doc.resolve(pos)?;
    let block = doc.block(pos.block_index)?;
    let span = &block.spans()[pos.span_index];
    if span.is_empty() && block.span_count() > 1 {
        return Some(span.style);
    }
    if block.is_empty() {
        return None;
    }
    let flat = block.flat_offset(pos.span_index, pos.offset);
    block.style_before(flat).or_else(|| block.style_after(flat))
}

#[derive(Debug, Clone)]
pub struct StyleTracker {
    active: Style,
    mode: SelectionMode,
    displayed: Cell<Option<DisplayedStyle>>,
}

impl StyleTracker {
    pub fn new(initial: Style) -> Self {
        StyleTracker {
            active: initial,
            mode: SelectionMode::Collapsed,
            displayed: Cell::new(None),
        }
    }

    pub fn active(&self) -> Style {
        self.active
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    /// Drop the cached displayed style so the next read recomputes it
    pub fn invalidate(&self) {
        self.displayed.set(None);
    }

    /// The single transition function for both styles
    pub fn transition(&mut self, event: StyleEvent, doc: &Document, selection: &Selection) {
        self.mode = if selection.is_empty_in(doc) {
            SelectionMode::Collapsed
        } else {
            SelectionMode::Ranged
        };

        match (event, self.mode) {
            (StyleEvent::Loaded, _) => {
                self.active = doc.blocks()[0]
                    .style_after(0)
                    .unwrap_or_else(|| doc.blocks()[0].leading_style());
            }
            (StyleEvent::SelectionChanged | StyleEvent::Edited, SelectionMode::Collapsed) => {
                if let Some(style) = detect_style_at_position(doc, selection.focus) {
                    self.active = style;
                }
            }
            (StyleEvent::Formatted(change), SelectionMode::Collapsed) => {
                self.active = change.applied_to(self.active);
            }
            // ActiveStyle only matters once a range collapses again
            (_, SelectionMode::Ranged) => {}
        }

        self.invalidate();
    }

    /// Read the displayed style, recomputing it if invalidated
    pub fn displayed(&self, doc: &Document, selection: &Selection) -> DisplayedStyle {
        if let Some(cached) = self.displayed.get() {
            return cached;
        }
        let displayed = match self.mode {
            SelectionMode::Collapsed => DisplayedStyle::from_style(&self.active),
            SelectionMode::Ranged => {
                let styles = doc.styles_in_range(selection.start(), selection.end());
                DisplayedStyle::from_styles(styles.iter())
                    .unwrap_or_else(|| DisplayedStyle::from_style(&self.active))
            }
        };
        self.displayed.set(Some(displayed));
        displayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::structured_document::Block;
    use crate::richtext::style::{AttrState, ToggleAttr};

    fn doc() -> Document {
        Document::from_blocks(vec![
            Block::from_text("Hello", Style::bold()).with_plain_text(" World"),
            Block::empty(Style::plain()),
        ])
    }

    #[test]
    fn test_detect_looks_left_first() {
        let doc = doc();
        // Right after "Hello": inherits bold from the left
        assert_eq!(
            detect_style_at_position(&doc, Position::new(0, 1, 0)),
            Some(Style::bold())
        );
        assert_eq!(
            detect_style_at_position(&doc, Position::new(0, 1, 3)),
            Some(Style::plain())
        );
    }

    #[test]
    fn test_detect_looks_right_at_block_start() {
        let doc = doc();
        assert_eq!(
            detect_style_at_position(&doc, Position::new(0, 0, 0)),
            Some(Style::bold())
        );
    }

    #[test]
    fn test_detect_empty_block_keeps_prior() {
        let doc = doc();
        assert_eq!(detect_style_at_position(&doc, Position::new(1, 0, 0)), None);

        let mut tracker = StyleTracker::new(Style::italic());
        tracker.transition(
            StyleEvent::SelectionChanged,
            &doc,
            &Selection::collapsed(Position::new(1, 0, 0)),
        );
        assert_eq!(tracker.active(), Style::italic());
    }

    #[test]
    fn test_loaded_takes_style_at_start() {
        let doc = doc();
        let mut tracker = StyleTracker::new(Style::plain());
        tracker.transition(StyleEvent::Loaded, &doc, &Selection::default());
        assert_eq!(tracker.active(), Style::bold());
    }

    #[test]
    fn test_formatted_collapsed_updates_active() {
        let doc = doc();
        let mut tracker = StyleTracker::new(Style::plain());
        let cursor = Selection::collapsed(Position::new(0, 1, 3));
        tracker.transition(
            StyleEvent::Formatted(StyleChange::FontSize(24)),
            &doc,
            &cursor,
        );
        assert_eq!(tracker.active().font_size, 24);
        assert_eq!(
            tracker.displayed(&doc, &cursor).font_size,
            AttrState::Uniform(24)
        );
    }

    #[test]
    fn test_ranged_leaves_active_untouched() {
        let doc = doc();
        let mut tracker = StyleTracker::new(Style::italic());
        let range = Selection::new(Position::new(0, 0, 0), Position::new(0, 1, 6));
        tracker.transition(StyleEvent::SelectionChanged, &doc, &range);
        assert_eq!(tracker.mode(), SelectionMode::Ranged);
        assert_eq!(tracker.active(), Style::italic());

        let displayed = tracker.displayed(&doc, &range);
        assert_eq!(displayed.bold, AttrState::Mixed);
        assert!(!displayed.is_on(ToggleAttr::Bold));
        assert_eq!(displayed.italic, AttrState::Uniform(false));
    }
}
