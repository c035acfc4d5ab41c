// Rich text model, editing and conversion

pub mod css;
pub mod html_tokenizer;
pub mod markdown_converter;
pub mod markup;
pub mod paste;
pub mod selection;
pub mod structured_document;
pub mod structured_editor;
pub mod style;
pub mod style_state;
