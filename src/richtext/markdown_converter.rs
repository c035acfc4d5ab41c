// Markdown Converter
// Export of a document as Markdown, and import of pasted Markdown as blocks.
// Markdown has no colors or sizes: those are lost on export, and only
// headings pick up a size on import.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use tracing::trace;

use super::paste::heading_size;
use super::structured_document::{Block, Document, Span};
use super::style::Style;

/// Convert a document to Markdown, one paragraph per block
pub fn document_to_markdown(doc: &Document) -> String {
    doc.blocks()
        .iter()
        .map(|block| block.spans().iter().map(span_to_markdown).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn span_to_markdown(span: &Span) -> String {
    let text = span.text.as_str();
    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }
    // Emphasis markers must hug the text, so edge whitespace stays outside
    let leading = &text[..text.len() - text.trim_start().len()];
    let trailing = &text[text.trim_end().len()..];

    let style = &span.style;
    let mut result = escape_inline(core);
    if style.strikethrough {
        result = format!("~~{}~~", result);
    }
    if style.bold && style.italic {
        result = format!("***{}***", result);
    } else if style.bold {
        result = format!("**{}**", result);
    } else if style.italic {
        result = format!("*{}*", result);
    }
    if style.underline {
        result = format!("<u>{}</u>", result);
    }
    format!("{}{}{}", leading, result, trailing)
}

fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '`' | '<' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Parse Markdown into blocks. Unstyled text carries `base`.
pub fn markdown_to_blocks(markdown: &str, base: &Style) -> Vec<Block> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);

    let mut styles = vec![*base];
    let mut collector = Collector::default();
    let mut in_code_block = false;

    for event in Parser::new_ext(markdown, options) {
        let current = styles.last().copied().unwrap_or(*base);
        match event {
            Event::Start(tag) => {
                let mut style = current;
                match tag {
                    Tag::Heading { level, .. } => {
                        collector.flush(false, current);
                        style.bold = true;
                        if let Some(px) = heading_size(level as u8) {
                            style.font_size = px;
                        }
                    }
                    Tag::CodeBlock(_) => {
                        collector.flush(false, current);
                        in_code_block = true;
                    }
                    Tag::Paragraph | Tag::Item | Tag::BlockQuote(_) | Tag::TableCell => {
                        collector.flush(false, current);
                    }
                    Tag::Emphasis => style.italic = true,
                    Tag::Strong => style.bold = true,
                    Tag::Strikethrough => style.strikethrough = true,
                    _ => {}
                }
                styles.push(style);
            }
            Event::End(tag_end) => {
                match tag_end {
                    TagEnd::CodeBlock => {
                        collector.flush(false, current);
                        in_code_block = false;
                    }
                    TagEnd::Paragraph
                    | TagEnd::Heading(_)
                    | TagEnd::Item
                    | TagEnd::BlockQuote(_)
                    | TagEnd::TableCell => collector.flush(false, current),
                    _ => {}
                }
                if styles.len() > 1 {
                    styles.pop();
                }
            }
            Event::Text(text) if in_code_block => {
                for (index, line) in text.split('\n').enumerate() {
                    if index > 0 {
                        collector.flush(true, current);
                    }
                    collector.push(line, current);
                }
            }
            Event::Text(text) | Event::Code(text) => collector.push(&text, current),
            Event::SoftBreak => collector.push(" ", current),
            Event::HardBreak => collector.flush(true, current),
            Event::Rule => collector.flush(false, current),
            Event::Html(html) | Event::InlineHtml(html) => {
                trace!(html = %html, "dropping html in markdown paste");
            }
            _ => {}
        }
    }

    collector.flush(false, *base);
    collector.blocks
}

#[derive(Default)]
struct Collector {
    blocks: Vec<Block>,
    spans: Vec<Span>,
}

impl Collector {
    fn push(&mut self, text: &str, style: Style) {
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(text),
            _ => self.spans.push(Span::new(text, style)),
        }
    }

    fn flush(&mut self, force: bool, style: Style) {
        if self.spans.is_empty() {
            if force {
                self.blocks.push(Block::empty(style));
            }
            return;
        }
        self.blocks.push(Block::new(std::mem::take(&mut self.spans)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_to_markdown_paragraph() {
        let doc = Document::with_paragraph("Hello world");
        assert_eq!(document_to_markdown(&doc), "Hello world");
    }

    #[test]
    fn test_whitespace_stays_outside_markers() {
        let doc = Document::from_blocks(vec![
            Block::from_text("Hello ", Style::bold()).with_plain_text("World"),
        ]);
        assert_eq!(document_to_markdown(&doc), "**Hello** World");
    }

    #[test]
    fn test_combined_styles() {
        let style = Style {
            bold: true,
            italic: true,
            underline: true,
            strikethrough: true,
            ..Style::plain()
        };
        let doc = Document::from_blocks(vec![Block::from_text("x", style)]);
        assert_eq!(document_to_markdown(&doc), "<u>***~~x~~***</u>");
    }

    #[test]
    fn test_blocks_and_escaping() {
        let doc = Document::from_blocks(vec![
            Block::from_text("2*3", Style::plain()),
            Block::empty(Style::plain()),
            Block::from_text("end", Style::italic()),
        ]);
        assert_eq!(document_to_markdown(&doc), "2\\*3\n\n\n\n*end*");
    }

    #[test]
    fn test_markdown_to_blocks_heading_and_emphasis() {
        let blocks = markdown_to_blocks("# Title\n\nSome **bold** text.", &Style::plain());
        assert_eq!(blocks.len(), 2);
        let title = blocks[0].leading_style();
        assert!(title.bold);
        assert_eq!(title.font_size, 32);
        assert_eq!(
            blocks[1].spans(),
            &[
                Span::new("Some ", Style::plain()),
                Span::new("bold", Style::bold()),
                Span::new(" text.", Style::plain()),
            ]
        );
    }

    #[test]
    fn test_markdown_list_items_become_blocks() {
        let blocks = markdown_to_blocks("- a\n- b\n\n1. c", &Style::plain());
        let texts: Vec<String> = blocks.iter().map(Block::to_plain_text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_markdown_code_block_lines() {
        let blocks = markdown_to_blocks("```\nx\n\ny\n```", &Style::plain());
        let texts: Vec<String> = blocks.iter().map(Block::to_plain_text).collect();
        assert_eq!(texts, vec!["x", "", "y"]);
    }

    #[test]
    fn test_markdown_html_dropped() {
        let blocks = markdown_to_blocks("a <span>b</span> c", &Style::plain());
        assert_eq!(blocks[0].to_plain_text(), "a b c");
    }

    #[test]
    fn test_markdown_inherits_base_style() {
        let blocks = markdown_to_blocks("*x*", &Style::bold());
        let style = blocks[0].leading_style();
        assert!(style.bold && style.italic);
    }

    #[test]
    fn test_round_trip_keeps_structure() {
        let original = "# Heading\n\nSome **bold** text.";
        let blocks = markdown_to_blocks(original, &Style::plain());
        let doc = Document::from_blocks(blocks.clone());
        let again = markdown_to_blocks(&document_to_markdown(&doc), &Style::plain());
        assert_eq!(blocks.len(), again.len());
        assert_eq!(blocks[1], again[1]);
    }
}
