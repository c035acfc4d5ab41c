// Editor sessions
// Binds an editor to a host surface, and keeps one session per item for
// hosts that edit many items at once.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EditorConfig;
use crate::richtext::markup::{document_to_markup, load_markup};
use crate::richtext::paste::PasteInput;
use crate::richtext::selection::{Selection, SelectionDescriptor};
use crate::richtext::structured_document::Document;
use crate::richtext::structured_editor::{EditResult, StructuredEditor};
use crate::richtext::style::{ColorKind, DisplayedStyle};

/// The surface an editor is mounted in
pub trait EditorHost {
    /// The selection as the host currently shows it, if it has one
    fn current_selection(&self) -> Option<Selection>;

    /// Redraw with the current document, the editor's selection and toolbar state
    fn render(&mut self, document: &Document, selection: Selection, displayed: &DisplayedStyle);
}

/// Toolbar commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatCommand {
    ToggleBold,
    ToggleItalic,
    ToggleUnderline,
    ToggleStrikethrough,
    /// None clears the color
    TextColor(Option<String>),
    Highlight(Option<String>),
    FontSize(i64),
    ClearFormatting,
}

/// Raw input events from the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Format(FormatCommand),
    TypeText(String),
    Paste(PasteInput),
    Enter,
    Backspace,
    Delete,
    SelectionChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Applied,
    /// The event was rejected and nothing changed
    Ignored,
}

pub struct EditorSession<H: EditorHost> {
    editor: StructuredEditor,
    host: H,
    last_selection: Option<SelectionDescriptor>,
    /// Last selection reported by the host; only a different one is adopted
    host_selection: Option<Selection>,
    last_displayed: Option<DisplayedStyle>,
}

impl<H: EditorHost> EditorSession<H> {
    /// Mount an editor on `host` and draw it once
    pub fn mount(host: H, document: Document, config: EditorConfig) -> Self {
        let mut session = EditorSession {
            editor: StructuredEditor::with_document(document, config),
            host,
            last_selection: None,
            host_selection: None,
            last_displayed: None,
        };
        session.after_event();
        session
    }

    pub fn editor(&self) -> &StructuredEditor {
        &self.editor
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn displayed_style(&self) -> DisplayedStyle {
        self.editor.displayed_style()
    }

    pub fn document_snapshot(&self) -> Document {
        self.editor.snapshot()
    }

    pub fn load_document(&mut self, document: Document) {
        self.editor.load_document(document);
        self.after_event();
    }

    /// Handle one input event. Errors are logged and reported as `Ignored`;
    /// the document is valid either way.
    pub fn dispatch(&mut self, event: InputEvent) -> Dispatch {
        self.sync_selection();

        let result = match &event {
            InputEvent::Format(command) => self.format(command),
            InputEvent::TypeText(text) => self.editor.insert_text(text),
            InputEvent::Paste(input) => self.editor.paste(input),
            InputEvent::Enter => self.editor.split_block(),
            InputEvent::Backspace => self.editor.delete_backward(),
            InputEvent::Delete => self.editor.delete_forward(),
            InputEvent::SelectionChange => Ok(()),
        };

        let outcome = match result {
            Ok(()) => Dispatch::Applied,
            Err(err) => {
                warn!(%err, ?event, "input event ignored");
                Dispatch::Ignored
            }
        };
        self.after_event();
        outcome
    }

    fn format(&mut self, command: &FormatCommand) -> EditResult {
        match command {
            FormatCommand::ToggleBold => self.editor.toggle_bold(),
            FormatCommand::ToggleItalic => self.editor.toggle_italic(),
            FormatCommand::ToggleUnderline => self.editor.toggle_underline(),
            FormatCommand::ToggleStrikethrough => self.editor.toggle_strikethrough(),
            FormatCommand::TextColor(value) => {
                self.editor.apply_color(ColorKind::Text, value.as_deref())
            }
            FormatCommand::Highlight(value) => {
                self.editor.apply_color(ColorKind::Highlight, value.as_deref())
            }
            FormatCommand::FontSize(px) => self.editor.apply_font_size(*px),
            FormatCommand::ClearFormatting => self.editor.clear_formatting(),
        }
    }

    /// Adopt the host's selection; a stale one is recovered from the last descriptor
    fn sync_selection(&mut self) {
        let Some(selection) = self.host.current_selection() else {
            return;
        };
        if self.host_selection.replace(selection) == Some(selection)
            || selection == self.editor.selection()
        {
            return;
        }
        if let Err(err) = self.editor.set_selection(selection) {
            debug!(%err, "host selection is stale, restoring");
            match &self.last_selection {
                Some(descriptor) => {
                    self.editor.restore_selection(descriptor);
                }
                None => self.editor.move_to_document_end(),
            }
        }
    }

    fn after_event(&mut self) {
        self.last_selection = Some(self.editor.serialize_selection());
        let displayed = self.editor.displayed_style();
        let changed = self.last_displayed != Some(displayed);
        if self.editor.take_dirty() || changed {
            self.last_displayed = Some(displayed);
            self.host
                .render(self.editor.document(), self.editor.selection(), &displayed);
        }
    }

    /// Tear the session down, handing back the host and the stored form of the document
    pub fn unmount(self) -> (H, String) {
        let markup = document_to_markup(&self.editor.snapshot());
        (self.host, markup)
    }
}

/// Stable identity of an editable item, assigned when the item is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    pub fn new() -> Self {
        ItemId(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        ItemId(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What an unmounted session hands back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDocument {
    pub item: ItemId,
    pub markup: String,
    pub saved_at: DateTime<Utc>,
}

/// Sessions keyed by item identity, never by position in the host's list
pub struct EditorRegistry<H: EditorHost> {
    config: EditorConfig,
    sessions: HashMap<ItemId, EditorSession<H>>,
}

impl<H: EditorHost> EditorRegistry<H> {
    pub fn new(config: EditorConfig) -> Self {
        EditorRegistry {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Mount an editor for a new item. `initial` is stored markup, if the item has content.
    pub fn mount(&mut self, host: H, initial: Option<&str>) -> ItemId {
        let id = ItemId::new();
        self.mount_with_id(id, host, initial);
        id
    }

    /// Mount an editor for an existing item. A session already mounted for it is
    /// unmounted first and its document returned.
    pub fn mount_with_id(
        &mut self,
        id: ItemId,
        host: H,
        initial: Option<&str>,
    ) -> Option<SavedDocument> {
        let replaced = self.unmount(id);
        let document = match initial {
            Some(markup) => load_markup(markup, &self.config),
            None => Document::with_style(self.config.default_style()),
        };
        let session = EditorSession::mount(host, document, self.config.clone());
        self.sessions.insert(id, session);
        debug!(item = %id, "editor mounted");
        replaced
    }

    pub fn get(&self, id: ItemId) -> Option<&EditorSession<H>> {
        self.sessions.get(&id)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut EditorSession<H>> {
        self.sessions.get_mut(&id)
    }

    /// Route an event to one item's session. None if the item has no session.
    pub fn dispatch(&mut self, id: ItemId, event: InputEvent) -> Option<Dispatch> {
        self.sessions
            .get_mut(&id)
            .map(|session| session.dispatch(event))
    }

    /// Unmount an item's editor and return its stored form
    pub fn unmount(&mut self, id: ItemId) -> Option<SavedDocument> {
        let session = self.sessions.remove(&id)?;
        let (_host, markup) = session.unmount();
        debug!(item = %id, "editor unmounted");
        Some(SavedDocument {
            item: id,
            markup,
            saved_at: Utc::now(),
        })
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.sessions.keys().copied()
    }
}
