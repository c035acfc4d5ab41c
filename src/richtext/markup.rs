// Persistence format
// <p> blocks holding <span style="..."> runs; the style attribute carries
// only the whitelisted properties. Anything else is not trusted and goes
// through the paste sanitizer.

use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::warn;

use super::css::{PERSISTED_PROPERTIES, apply_declaration, declarations, style_to_css};
use super::html_tokenizer::{Token, tokenize};
use super::paste::{PasteInput, sanitize_and_normalize};
use super::structured_document::{Block, Document, Span};
use super::style::Style;
use crate::config::EditorConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarkupError {
    #[error("unexpected element <{0}>")]
    UnexpectedElement(String),
    #[error("unexpected attribute {0:?}")]
    UnexpectedAttribute(String),
    #[error("text outside of a span")]
    UnexpectedText,
    #[error("element <{0}> is never closed")]
    UnclosedElement(String),
    #[error("unsupported style {0:?}")]
    UnsupportedStyle(String),
}

pub fn document_to_markup(doc: &Document) -> String {
    doc.blocks()
        .iter()
        .map(|block| {
            let mut out = String::from("<p>");
            for span in block.spans() {
                out.push_str("<span style=\"");
                out.push_str(&encode_double_quoted_attribute(&style_to_css(&span.style)));
                out.push_str("\">");
                out.push_str(&encode_text(&span.text));
                out.push_str("</span>");
            }
            out.push_str("</p>");
            out
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone, Copy)]
enum State {
    Outside,
    InBlock,
    InSpan,
}

/// Strict parser for the persistence subset. `default` is the style of
/// `<p></p>` and the base every span's declarations apply to.
pub fn parse_markup(input: &str, default: &Style) -> Result<Document, MarkupError> {
    let mut state = State::Outside;
    let mut blocks = Vec::new();
    let mut spans: Vec<Span> = Vec::new();
    let mut span_style = *default;
    let mut span_text = String::new();

    for token in tokenize(input) {
        match (state, token) {
            (State::Outside | State::InBlock, Token::Text(text)) if text.trim().is_empty() => {}
            (
                State::Outside,
                Token::StartTag {
                    name,
                    attrs,
                    self_closing: false,
                },
            ) if name == "p" => {
                if let Some((attr, _)) = attrs.into_iter().next() {
                    return Err(MarkupError::UnexpectedAttribute(attr));
                }
                state = State::InBlock;
            }
            (
                State::InBlock,
                Token::StartTag {
                    name,
                    attrs,
                    self_closing: false,
                },
            ) if name == "span" => {
                span_style = parse_span_style(&attrs, default)?;
                state = State::InSpan;
            }
            (State::InBlock, Token::EndTag { name }) if name == "p" => {
                blocks.push(if spans.is_empty() {
                    Block::empty(*default)
                } else {
                    Block::new(std::mem::take(&mut spans))
                });
                state = State::Outside;
            }
            (State::InSpan, Token::Text(text)) => span_text.push_str(&text),
            (State::InSpan, Token::EndTag { name }) if name == "span" => {
                spans.push(Span::new(std::mem::take(&mut span_text), span_style));
                state = State::InBlock;
            }
            (_, Token::Text(_)) => return Err(MarkupError::UnexpectedText),
            (_, Token::StartTag { name, .. } | Token::EndTag { name }) => {
                return Err(MarkupError::UnexpectedElement(name));
            }
            (_, Token::Comment) => return Err(MarkupError::UnexpectedElement("!--".to_string())),
            (_, Token::Declaration) => return Err(MarkupError::UnexpectedElement("!".to_string())),
        }
    }

    match state {
        State::Outside => Ok(if blocks.is_empty() {
            Document::with_style(*default)
        } else {
            Document::from_blocks(blocks)
        }),
        State::InBlock => Err(MarkupError::UnclosedElement("p".to_string())),
        State::InSpan => Err(MarkupError::UnclosedElement("span".to_string())),
    }
}

fn parse_span_style(attrs: &[(String, String)], default: &Style) -> Result<Style, MarkupError> {
    let mut style = *default;
    for (name, value) in attrs {
        if name != "style" {
            return Err(MarkupError::UnexpectedAttribute(name.clone()));
        }
        for (property, value) in declarations(value) {
            if !PERSISTED_PROPERTIES.contains(&property.as_str()) {
                return Err(MarkupError::UnsupportedStyle(property));
            }
            if !apply_declaration(&mut style, &property, value, default.font_size) {
                return Err(MarkupError::UnsupportedStyle(format!("{property}: {value}")));
            }
        }
    }
    Ok(style)
}

/// Load stored markup. Input outside the persistence subset is treated as
/// untrusted paste input; the result is never an error.
pub fn load_markup(input: &str, config: &EditorConfig) -> Document {
    let default = config.default_style();
    match parse_markup(input, &default) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(%err, "stored markup is not in the persistence format, sanitizing it");
            let report = sanitize_and_normalize(&PasteInput::detect(input), &default, config);
            if report.is_empty() {
                Document::with_style(default)
            } else {
                Document::from_blocks(report.blocks)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::style::Color;

    #[test]
    fn test_document_to_markup() {
        let doc = Document::from_blocks(vec![
            Block::from_text("Hello", Style::bold()).with_plain_text(" <World>"),
        ]);
        assert_eq!(
            document_to_markup(&doc),
            r#"<p><span style="font-size: 16px; font-weight: bold">Hello</span><span style="font-size: 16px"> &lt;World&gt;</span></p>"#
        );
    }

    #[test]
    fn test_markup_round_trip_keeps_placeholder_style() {
        let red = Style::plain().with_color(Some(Color::rgb(255, 0, 0)));
        let marked = Style::plain()
            .with_font_size(24)
            .with_highlight(Some(Color::rgb(255, 255, 0)));
        let doc = Document::from_blocks(vec![
            Block::from_text("red", red).with_text("big & marked", marked),
            Block::empty(Style::italic()),
        ]);
        let markup = document_to_markup(&doc);
        assert_eq!(parse_markup(&markup, &Style::plain()), Ok(doc));
    }

    #[test]
    fn test_empty_paragraph_uses_default() {
        let doc = parse_markup("<p></p>", &Style::bold()).unwrap();
        assert_eq!(doc.blocks()[0].leading_style(), Style::bold());
        assert!(parse_markup("", &Style::plain()).unwrap().is_empty());
    }

    #[test]
    fn test_strict_parser_rejects_foreign_markup() {
        let plain = Style::plain();
        assert_eq!(
            parse_markup("<div>x</div>", &plain),
            Err(MarkupError::UnexpectedElement("div".to_string()))
        );
        assert_eq!(
            parse_markup(r#"<p class="x"></p>"#, &plain),
            Err(MarkupError::UnexpectedAttribute("class".to_string()))
        );
        assert_eq!(
            parse_markup("<p>bare</p>", &plain),
            Err(MarkupError::UnexpectedText)
        );
        assert_eq!(
            parse_markup(r#"<p><span style="position: fixed">x</span></p>"#, &plain),
            Err(MarkupError::UnsupportedStyle("position".to_string()))
        );
        assert_eq!(
            parse_markup(r#"<p><span style="color: blurple">x</span></p>"#, &plain),
            Err(MarkupError::UnsupportedStyle("color: blurple".to_string()))
        );
        assert_eq!(
            parse_markup("<p><span>x", &plain),
            Err(MarkupError::UnclosedElement("span".to_string()))
        );
    }

    #[test]
    fn test_load_markup_falls_back_to_sanitizer() {
        let config = EditorConfig::default();
        let doc = load_markup("<div><b>x</b><script>y</script></div>", &config);
        assert_eq!(doc.to_plain_text(), "x");
        assert!(doc.blocks()[0].leading_style().bold);

        let doc = load_markup("a\nb", &config);
        assert_eq!(doc.block_count(), 2);

        assert!(load_markup("", &config).is_empty());
        assert!(load_markup("<script>x</script>", &config).is_empty());
    }
}
