// Library exports for pagetext

pub mod config;
pub mod richtext;
pub mod session;

pub use config::{ConfigError, EditorConfig};
pub use richtext::markup::{document_to_markup, load_markup, parse_markup};
pub use richtext::paste::{PasteInput, PasteReport, sanitize_and_normalize};
pub use richtext::selection::{Selection, SelectionDescriptor};
pub use richtext::structured_document::{Block, Document, Position, Span};
pub use richtext::structured_editor::{EditError, EditResult, RestoreOutcome, StructuredEditor};
pub use richtext::style::{AttrState, Color, ColorKind, DisplayedStyle, Style, ToggleAttr};
pub use session::{
    Dispatch, EditorHost, EditorRegistry, EditorSession, FormatCommand, InputEvent, ItemId,
    SavedDocument,
};
