// Inline CSS handling for the style properties the editor understands

use std::sync::LazyLock;

use regex::Regex;

use super::style::{DEFAULT_FONT_SIZE, Style, clamp_font_size, parse_color_value};

/// Properties the persistence format may carry
pub const PERSISTED_PROPERTIES: &[&str] = &[
    "font-size",
    "color",
    "background-color",
    "font-weight",
    "font-style",
    "text-decoration",
];

static FONT_SIZE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d*\.?\d+)\s*(px|pt|em|rem|%)?$").expect("valid font-size pattern")
});

/// Split a `style` attribute into (lowercased property, value) pairs
pub fn declarations(style_attr: &str) -> impl Iterator<Item = (String, &str)> {
    style_attr.split(';').filter_map(|decl| {
        let (property, value) = decl.split_once(':')?;
        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();
        let value = value
            .strip_suffix("!important")
            .map(str::trim_end)
            .unwrap_or(value);
        (!property.is_empty() && !value.is_empty()).then_some((property, value))
    })
}

/// Resolve a CSS font-size against the parent size
pub fn parse_font_size(value: &str, parent: u16) -> Option<u16> {
    let value = value.trim().to_ascii_lowercase();
    let keyword = match value.as_str() {
        "xx-small" => Some(9.0),
        "x-small" => Some(10.0),
        "small" => Some(13.0),
        "medium" => Some(16.0),
        "large" => Some(18.0),
        "x-large" => Some(24.0),
        "xx-large" => Some(32.0),
        "xxx-large" => Some(48.0),
        "smaller" => Some(parent as f64 * 5.0 / 6.0),
        "larger" => Some(parent as f64 * 1.2),
        _ => None,
    };
    let px = match keyword {
        Some(px) => px,
        None => {
            let caps = FONT_SIZE.captures(&value)?;
            let amount: f64 = caps[1].parse().ok()?;
            match caps.get(2).map(|m| m.as_str()) {
                None | Some("px") => amount,
                Some("pt") => amount * 4.0 / 3.0,
                Some("em") => amount * parent as f64,
                Some("rem") => amount * DEFAULT_FONT_SIZE as f64,
                Some("%") => amount * parent as f64 / 100.0,
                Some(_) => return None,
            }
        }
    };
    Some(clamp_font_size(px.round() as i64))
}

/// Apply one declaration to `style`. Returns false when the property or value is not understood.
pub fn apply_declaration(style: &mut Style, property: &str, value: &str, parent_size: u16) -> bool {
    let lower = value.to_ascii_lowercase();
    match property {
        "font-size" => match parse_font_size(value, parent_size) {
            Some(px) => {
                style.font_size = px;
                true
            }
            None => false,
        },
        "color" => match parse_color_value(value) {
            Ok(color) => {
                style.color = color;
                true
            }
            Err(_) => false,
        },
        "background-color" => match parse_color_value(value) {
            Ok(color) => {
                style.highlight = color;
                true
            }
            Err(_) => false,
        },
        // Shorthand: take the first token that reads as a color
        "background" => {
            let color = parse_color_value(value).ok().or_else(|| {
                value
                    .split_whitespace()
                    .find_map(|token| parse_color_value(token).ok())
            });
            match color {
                Some(color) => {
                    style.highlight = color;
                    true
                }
                None => false,
            }
        }
        "font-weight" => {
            let bold = match lower.as_str() {
                "bold" | "bolder" => Some(true),
                "normal" | "lighter" => Some(false),
                numeric => numeric.parse::<u16>().ok().map(|weight| weight >= 600),
            };
            bold.map(|bold| style.bold = bold).is_some()
        }
        "font-style" => match lower.as_str() {
            "italic" | "oblique" => {
                style.italic = true;
                true
            }
            "normal" => {
                style.italic = false;
                true
            }
            _ => false,
        },
        "text-decoration" | "text-decoration-line" => {
            let mut understood = false;
            for token in lower.split_whitespace() {
                match token {
                    "underline" => {
                        style.underline = true;
                        understood = true;
                    }
                    "line-through" => {
                        style.strikethrough = true;
                        understood = true;
                    }
                    "none" => {
                        style.underline = false;
                        style.strikethrough = false;
                        understood = true;
                    }
                    _ => {}
                }
            }
            understood
        }
        _ => false,
    }
}

/// Render a style as the persistence format's inline CSS, in fixed property order
pub fn style_to_css(style: &Style) -> String {
    let mut parts = vec![format!("font-size: {}px", style.font_size)];
    if let Some(color) = style.color {
        parts.push(format!("color: {}", color));
    }
    if let Some(color) = style.highlight {
        parts.push(format!("background-color: {}", color));
    }
    if style.bold {
        parts.push("font-weight: bold".to_string());
    }
    if style.italic {
        parts.push("font-style: italic".to_string());
    }
    let decorations: Vec<&str> = [
        (style.underline, "underline"),
        (style.strikethrough, "line-through"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect();
    if !decorations.is_empty() {
        parts.push(format!("text-decoration: {}", decorations.join(" ")));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::richtext::style::Color;

    #[test]
    fn test_declarations() {
        let decls: Vec<_> =
            declarations("Font-Weight: 700 ; color:red !important;; bogus; x:").collect();
        assert_eq!(
            decls,
            vec![
                ("font-weight".to_string(), "700"),
                ("color".to_string(), "red")
            ]
        );
    }

    #[test]
    fn test_parse_font_size_units() {
        assert_eq!(parse_font_size("24px", 16), Some(24));
        assert_eq!(parse_font_size("12pt", 16), Some(16));
        assert_eq!(parse_font_size("1.5em", 20), Some(30));
        assert_eq!(parse_font_size("2rem", 10), Some(32));
        assert_eq!(parse_font_size("50%", 20), Some(10));
        assert_eq!(parse_font_size("large", 16), Some(18));
        assert_eq!(parse_font_size("4px", 16), Some(8));
        assert_eq!(parse_font_size("huge", 16), None);
    }

    #[test]
    fn test_apply_declaration() {
        let mut style = Style::plain();
        assert!(apply_declaration(&mut style, "font-weight", "600", 16));
        assert!(style.bold);
        assert!(apply_declaration(
            &mut style,
            "text-decoration",
            "underline line-through",
            16
        ));
        assert!(style.underline && style.strikethrough);
        assert!(apply_declaration(
            &mut style,
            "background",
            "url(x.png) #00ff00",
            16
        ));
        assert_eq!(style.highlight, Some(Color::rgb(0, 255, 0)));
        assert!(!apply_declaration(&mut style, "color", "nope", 16));
        assert!(!apply_declaration(&mut style, "position", "absolute", 16));
    }

    #[test]
    fn test_style_to_css_order() {
        let style = Style {
            bold: true,
            italic: true,
            underline: true,
            strikethrough: true,
            font_size: 20,
            color: Some(Color::rgb(255, 0, 0)),
            highlight: Some(Color::rgb(255, 255, 0)),
        };
        assert_eq!(
            style_to_css(&style),
            "font-size: 20px; color: #ff0000; background-color: #ffff00; font-weight: bold; font-style: italic; text-decoration: underline line-through"
        );
        assert_eq!(style_to_css(&Style::plain()), "font-size: 16px");
    }
}
