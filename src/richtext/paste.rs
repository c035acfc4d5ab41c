// Paste Sanitizer
// Turns clipboard markup, Markdown or plain text into normalized blocks.
// Elements not on the allow-lists are dropped together with their content.
// Nothing in here fails: malformed markup degrades to text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use super::css;
use super::html_tokenizer::{Token, is_void, tokenize};
use super::markdown_converter::markdown_to_blocks;
use super::structured_document::{Block, Span, snap_to_boundary};
use super::style::{Style, parse_color_value};
use crate::config::EditorConfig;

static MARKUP_HINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[a-zA-Z/!]").expect("valid markup hint pattern"));

/// `<font size=N>` for N in 1..=7
const FONT_TAG_SIZES: [u16; 7] = [10, 13, 16, 18, 24, 32, 48];

/// What the clipboard handed over
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteInput {
    Html(String),
    Markdown(String),
    PlainText(String),
}

impl PasteInput {
    /// Html if the text contains anything tag-like, plain text otherwise
    pub fn detect(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if MARKUP_HINT.is_match(&raw) {
            PasteInput::Html(raw)
        } else {
            PasteInput::PlainText(raw)
        }
    }

    pub fn raw(&self) -> &str {
        match self {
            PasteInput::Html(raw) | PasteInput::Markdown(raw) | PasteInput::PlainText(raw) => raw,
        }
    }

    /// Style unformatted pasted text starts from. Markup carries its own
    /// formatting and starts from the default style.
    pub fn base_style(&self, active: &Style, config: &EditorConfig) -> Style {
        match self {
            PasteInput::Html(_) => config.default_style(),
            PasteInput::Markdown(_) | PasteInput::PlainText(_) => {
                if config.plain_paste_inherits_active_style {
                    *active
                } else {
                    config.default_style()
                }
            }
        }
    }
}

/// Result of sanitizing one paste
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PasteReport {
    pub blocks: Vec<Block>,
    /// Elements dropped because they are not allowed
    pub dropped_nodes: usize,
}

impl PasteReport {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

pub fn sanitize_and_normalize(
    input: &PasteInput,
    active: &Style,
    config: &EditorConfig,
) -> PasteReport {
    let raw = input.raw();
    let limit = snap_to_boundary(raw, config.max_paste_bytes);
    if limit < raw.len() {
        debug!(
            len = raw.len(),
            limit = config.max_paste_bytes,
            "truncating paste input"
        );
    }
    let raw = &raw[..limit];
    let base = input.base_style(active, config);

    match input {
        PasteInput::Html(_) => sanitize_markup(raw, &base, config),
        PasteInput::Markdown(_) => PasteReport {
            blocks: markdown_to_blocks(raw, &base),
            dropped_nodes: 0,
        },
        PasteInput::PlainText(_) => PasteReport {
            blocks: plain_text_blocks(raw, &base),
            dropped_nodes: 0,
        },
    }
}

/// One block per line, every line carrying `style`
pub fn plain_text_blocks(text: &str, style: &Style) -> Vec<Block> {
    if text.is_empty() {
        return Vec::new();
    }
    text.split("\r\n")
        .flat_map(|chunk| chunk.split(['\r', '\n']))
        .map(|line| {
            let line: String = line
                .chars()
                .filter(|c| *c == '\t' || !c.is_control())
                .collect();
            if line.is_empty() {
                Block::empty(*style)
            } else {
                Block::from_text(line, *style)
            }
        })
        .collect()
}

pub fn sanitize_markup(markup: &str, base: &Style, config: &EditorConfig) -> PasteReport {
    let mut sanitizer = Sanitizer::new(*base, config);
    for token in tokenize(markup) {
        sanitizer.feed(token);
    }
    sanitizer.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Block,
    Preformatted,
    Break,
    Rule,
    Inline,
    Transparent,
    Void,
    Disallowed,
}

fn classify(name: &str) -> ElementKind {
    match name {
        "p" | "div" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "li" | "ul" | "ol" | "dl"
        | "dt" | "dd" | "blockquote" | "section" | "article" | "header" | "footer" | "main"
        | "aside" | "nav" | "figure" | "figcaption" | "address" | "center" | "table"
        | "caption" | "thead" | "tbody" | "tfoot" | "tr" | "td" | "th" => ElementKind::Block,
        "pre" | "listing" => ElementKind::Preformatted,
        "br" => ElementKind::Break,
        "hr" => ElementKind::Rule,
        "span" | "b" | "strong" | "i" | "em" | "cite" | "dfn" | "var" | "u" | "ins" | "s"
        | "strike" | "del" | "font" | "mark" | "a" | "code" | "kbd" | "samp" | "tt" | "small"
        | "big" | "sub" | "sup" | "abbr" | "q" | "label" | "time" => ElementKind::Inline,
        "html" | "body" => ElementKind::Transparent,
        _ if is_void(name) => ElementKind::Void,
        _ => ElementKind::Disallowed,
    }
}

/// Pixel size of a level 1..=6 heading
pub(crate) fn heading_size(level: u8) -> Option<u16> {
    match level {
        1 => Some(32),
        2 => Some(24),
        3 => Some(19),
        4 => Some(16),
        5 => Some(13),
        6 => Some(11),
        _ => None,
    }
}

/// `<font size>`: absolute 1..7 or relative to 3
fn font_tag_size(value: &str) -> Option<u16> {
    let value = value.trim();
    let n: i32 = value.trim_start_matches('+').parse().ok()?;
    let n = if value.starts_with(['+', '-']) {
        3i32.saturating_add(n)
    } else {
        n
    };
    Some(FONT_TAG_SIZES[(n.clamp(1, 7) - 1) as usize])
}

#[derive(Debug)]
struct Frame {
    name: String,
    style: Style,
    is_block: bool,
    preformatted: bool,
}

struct Sanitizer<'a> {
    config: &'a EditorConfig,
    base: Style,
    stack: Vec<Frame>,
    /// Disallowed element being skipped, with its nesting depth
    skipping: Option<(String, usize)>,
    blocks: Vec<Block>,
    spans: Vec<Span>,
    /// Collapsed whitespace waiting for the next word, with the style it had
    pending_space: Option<Style>,
    dropped: usize,
}

impl<'a> Sanitizer<'a> {
    fn new(base: Style, config: &'a EditorConfig) -> Self {
        Sanitizer {
            config,
            base,
            stack: Vec::new(),
            skipping: None,
            blocks: Vec::new(),
            spans: Vec::new(),
            pending_space: None,
            dropped: 0,
        }
    }

    fn style(&self) -> Style {
        self.stack.last().map(|f| f.style).unwrap_or(self.base)
    }

    fn in_pre(&self) -> bool {
        self.stack.iter().any(|f| f.preformatted)
    }

    fn feed(&mut self, token: Token) {
        if let Some((skip_name, depth)) = self.skipping.as_mut() {
            match &token {
                Token::StartTag {
                    name,
                    self_closing: false,
                    ..
                } if name == skip_name => *depth += 1,
                Token::EndTag { name } if name == skip_name => *depth -= 1,
                _ => {}
            }
            if *depth == 0 {
                self.skipping = None;
            }
            return;
        }

        match token {
            Token::Text(text) => self.text(&text),
            tag @ Token::StartTag { .. } => self.start(&tag),
            Token::EndTag { name } => self.end(&name),
            Token::Comment | Token::Declaration => {}
        }
    }

    fn start(&mut self, tag: &Token) {
        let Token::StartTag {
            name, self_closing, ..
        } = tag
        else {
            return;
        };
        let self_closing = *self_closing;
        match classify(name) {
            ElementKind::Break => self.flush(true),
            ElementKind::Rule => self.flush(false),
            ElementKind::Transparent => {}
            ElementKind::Void => {
                trace!(element = %name, "dropping void element");
                self.dropped += 1;
            }
            ElementKind::Disallowed => {
                trace!(element = %name, "dropping disallowed element with its content");
                self.dropped += 1;
                if !self_closing {
                    self.skipping = Some((name.clone(), 1));
                }
            }
            kind @ (ElementKind::Block | ElementKind::Preformatted | ElementKind::Inline) => {
                let is_block = kind != ElementKind::Inline;
                if is_block {
                    self.flush(false);
                }
                if self_closing {
                    return;
                }
                let style = self.element_style(name, tag);
                self.stack.push(Frame {
                    name: name.clone(),
                    style,
                    is_block,
                    preformatted: kind == ElementKind::Preformatted,
                });
            }
        }
    }

    fn end(&mut self, name: &str) {
        // Stray end tags are ignored; unclosed inner elements close with their parent
        let Some(index) = self.stack.iter().rposition(|f| f.name == name) else {
            return;
        };
        if self.stack[index..].iter().any(|f| f.is_block) {
            self.flush(false);
        }
        self.stack.truncate(index);
    }

    fn element_style(&self, name: &str, tag: &Token) -> Style {
        let parent = self.style();
        let mut style = parent;

        if let Some(level) = name.strip_prefix('h').and_then(|l| l.parse::<u8>().ok())
            && let Some(px) = heading_size(level)
        {
            style.bold = true;
            style.font_size = px;
        }
        match name {
            "b" | "strong" => style.bold = true,
            "i" | "em" | "cite" | "dfn" | "var" => style.italic = true,
            "u" | "ins" => style.underline = true,
            "s" | "strike" | "del" => style.strikethrough = true,
            "mark" => style.highlight = Some(self.config.mark_highlight_color()),
            "small" | "big" => {
                let keyword = if name == "small" { "smaller" } else { "larger" };
                if let Some(px) = css::parse_font_size(keyword, parent.font_size) {
                    style.font_size = px;
                }
            }
            "font" => {
                if let Some(Ok(color)) = tag.attr("color").map(parse_color_value) {
                    style.color = color;
                }
                if let Some(px) = tag.attr("size").and_then(font_tag_size) {
                    style.font_size = px;
                }
            }
            _ => {}
        }

        if let Some(css_text) = tag.attr("style") {
            for (property, value) in css::declarations(css_text) {
                if !css::apply_declaration(&mut style, &property, value, parent.font_size) {
                    trace!(%property, value, "ignoring style declaration");
                }
            }
        }
        style
    }

    fn text(&mut self, text: &str) {
        let style = self.style();
        if self.in_pre() {
            for (index, line) in text.split('\n').enumerate() {
                if index > 0 {
                    self.flush(true);
                }
                self.push(line.trim_end_matches('\r'), style);
            }
            return;
        }

        let mut word = String::new();
        for c in text.chars() {
            if c.is_ascii_whitespace() {
                if !word.is_empty() {
                    self.push_word(&word, style);
                    word.clear();
                }
                if self.pending_space.is_none() && !self.spans.is_empty() {
                    self.pending_space = Some(style);
                }
            } else {
                word.push(c);
            }
        }
        if !word.is_empty() {
            self.push_word(&word, style);
        }
    }

    fn push_word(&mut self, word: &str, style: Style) {
        if let Some(space_style) = self.pending_space.take() {
            self.push(" ", space_style);
        }
        self.push(word, style);
    }

    fn push(&mut self, text: &str, style: Style) {
        let text: String = text
            .chars()
            .filter(|c| *c == '\t' || !c.is_control())
            .collect();
        if text.is_empty() {
            return;
        }
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.text.push_str(&text),
            _ => self.spans.push(Span::new(text, style)),
        }
    }

    /// Close the block being collected. `force` emits an empty block when nothing was collected.
    fn flush(&mut self, force: bool) {
        self.pending_space = None;
        if self.spans.is_empty() {
            if force {
                self.blocks.push(Block::empty(self.style()));
            }
            return;
        }
        self.blocks.push(Block::new(std::mem::take(&mut self.spans)));
    }

    fn finish(mut self) -> PasteReport {
        if let Some((name, _)) = &self.skipping {
            debug!(element = %name, "paste ended inside a dropped element");
        }
        self.flush(false);
        PasteReport {
            blocks: self.blocks,
            dropped_nodes: self.dropped,
        }
    }
}
