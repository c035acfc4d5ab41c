// Tolerant HTML tokenizer
// Never fails: anything that does not parse as a tag is kept as text.

use html_escape::decode_html_entities;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    /// Entity-decoded character data
    Text(String),
    Comment,
    /// `<!DOCTYPE ...>`, `<?xml ...?>` and similar declarations
    Declaration,
}

impl Token {
    pub fn attr(&self, wanted: &str) -> Option<&str> {
        match self {
            Token::StartTag { attrs, .. } => attrs
                .iter()
                .find(|(name, _)| name == wanted)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }
}

/// Elements whose content is raw text up to the matching end tag
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "textarea", "title", "xmp", "iframe", "noembed", "noframes", "noscript",
];

/// Elements that never have content or an end tag
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

pub fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut text_start = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'<' {
            pos += 1;
            continue;
        }

        let rest = &input[pos..];
        let (token, consumed) = if rest.starts_with("<!--") {
            let end = rest.find("-->").map(|e| e + 3).unwrap_or(rest.len());
            (Token::Comment, end)
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest.find('>').map(|e| e + 1).unwrap_or(rest.len());
            (Token::Declaration, end)
        } else if let Some(parsed) = parse_tag(rest) {
            parsed
        } else {
            // A literal '<'
            pos += 1;
            continue;
        };

        push_text(&mut tokens, &input[text_start..pos]);
        pos += consumed;

        let raw_text_name = match &token {
            Token::StartTag {
                name, self_closing, ..
            } if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) => Some(name.clone()),
            _ => None,
        };
        tokens.push(token);

        if let Some(name) = raw_text_name {
            let close = find_end_tag(&input[pos..], &name);
            let content_end = close.map(|c| pos + c).unwrap_or(input.len());
            if content_end > pos {
                tokens.push(Token::Text(input[pos..content_end].to_string()));
            }
            pos = content_end;
            if close.is_some()
                && let Some((end_tag, consumed)) = parse_tag(&input[pos..])
            {
                tokens.push(end_tag);
                pos += consumed;
            }
        }
        text_start = pos;
    }

    push_text(&mut tokens, &input[text_start..]);
    tokens
}

fn push_text(tokens: &mut Vec<Token>, raw: &str) {
    if raw.is_empty() {
        return;
    }
    let decoded = decode_html_entities(raw).into_owned();
    if let Some(Token::Text(previous)) = tokens.last_mut() {
        previous.push_str(&decoded);
    } else {
        tokens.push(Token::Text(decoded));
    }
}

/// Offset of `</name` (case-insensitive) in `haystack`
fn find_end_tag(haystack: &str, name: &str) -> Option<usize> {
    let needle = format!("</{}", name);
    haystack
        .to_ascii_lowercase()
        .match_indices(&needle)
        .map(|(index, _)| index)
        .find(|&index| {
            haystack
                .as_bytes()
                .get(index + needle.len())
                .is_none_or(|b| b.is_ascii_whitespace() || *b == b'>' || *b == b'/')
        })
}

/// Parse a start or end tag at the beginning of `s`. Returns the token and bytes consumed.
fn parse_tag(s: &str) -> Option<(Token, usize)> {
    let b = s.as_bytes();
    let closing = b.get(1) == Some(&b'/');
    let mut i = if closing { 2 } else { 1 };

    let name_start = i;
    if !b.get(i)?.is_ascii_alphabetic() {
        return None;
    }
    while i < b.len() && (b[i].is_ascii_alphanumeric() || b[i] == b'-' || b[i] == b':') {
        i += 1;
    }
    let name = s[name_start..i].to_ascii_lowercase();

    if closing {
        let end = s[i..].find('>')?;
        return Some((Token::EndTag { name }, i + end + 1));
    }

    let mut attrs = Vec::new();
    let mut self_closing = false;
    loop {
        while i < b.len() && b[i].is_ascii_whitespace() {
            i += 1;
        }
        match *b.get(i)? {
            b'>' => {
                i += 1;
                break;
            }
            b'/' => {
                self_closing = true;
                i += 1;
            }
            _ => {
                let attr_start = i;
                while i < b.len()
                    && !b[i].is_ascii_whitespace()
                    && !matches!(b[i], b'=' | b'>' | b'/')
                {
                    i += 1;
                }
                if i == attr_start {
                    // Stray '=' with no attribute name
                    i += 1;
                    continue;
                }
                let attr_name = s[attr_start..i].to_ascii_lowercase();
                while i < b.len() && b[i].is_ascii_whitespace() {
                    i += 1;
                }
                let mut value = String::new();
                if b.get(i) == Some(&b'=') {
                    i += 1;
                    while i < b.len() && b[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    match *b.get(i)? {
                        quote @ (b'"' | b'\'') => {
                            i += 1;
                            let value_start = i;
                            while i < b.len() && b[i] != quote {
                                i += 1;
                            }
                            if i >= b.len() {
                                return None;
                            }
                            value = decode_html_entities(&s[value_start..i]).into_owned();
                            i += 1;
                        }
                        _ => {
                            let value_start = i;
                            while i < b.len() && !b[i].is_ascii_whitespace() && b[i] != b'>' {
                                i += 1;
                            }
                            value = decode_html_entities(&s[value_start..i]).into_owned();
                        }
                    }
                }
                attrs.push((attr_name, value));
            }
        }
    }

    Some((
        Token::StartTag {
            name,
            attrs,
            self_closing,
        },
        i,
    ))
}
