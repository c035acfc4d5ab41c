// Text Style
// The immutable attribute set carried by every span, color values,
// and the per-attribute tri-state shown by toolbars

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MIN_FONT_SIZE: u16 = 8;
pub const MAX_FONT_SIZE: u16 = 200;
pub const DEFAULT_FONT_SIZE: u16 = 16;

/// Clamp an arbitrary pixel size into the supported font size range.
pub fn clamp_font_size(px: i64) -> u16 {
    px.clamp(MIN_FONT_SIZE as i64, MAX_FONT_SIZE as i64) as u16
}

/// An RGBA color. Serializes as `#rrggbb` (or `#rrggbbaa` when not opaque).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized color value {0:?}")]
pub struct ColorParseError(pub String);

static RGB_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*(\d*\.?\d+)\s*)?\)$",
    )
    .expect("valid rgb() pattern")
});

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0x00, 0x00, 0x00]),
    ("white", [0xff, 0xff, 0xff]),
    ("red", [0xff, 0x00, 0x00]),
    ("green", [0x00, 0x80, 0x00]),
    ("lime", [0x00, 0xff, 0x00]),
    ("blue", [0x00, 0x00, 0xff]),
    ("navy", [0x00, 0x00, 0x80]),
    ("yellow", [0xff, 0xff, 0x00]),
    ("orange", [0xff, 0xa5, 0x00]),
    ("purple", [0x80, 0x00, 0x80]),
    ("gray", [0x80, 0x80, 0x80]),
    ("grey", [0x80, 0x80, 0x80]),
    ("silver", [0xc0, 0xc0, 0xc0]),
    ("maroon", [0x80, 0x00, 0x00]),
    ("olive", [0x80, 0x80, 0x00]),
    ("teal", [0x00, 0x80, 0x80]),
    ("aqua", [0x00, 0xff, 0xff]),
    ("cyan", [0x00, 0xff, 0xff]),
    ("fuchsia", [0xff, 0x00, 0xff]),
    ("magenta", [0xff, 0x00, 0xff]),
    ("pink", [0xff, 0xc0, 0xcb]),
    ("brown", [0xa5, 0x2a, 0x2a]),
];

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 0xff }
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 0xff
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if !self.is_opaque() {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    /// Parse a concrete color. Keywords meaning "no color" are rejected here;
    /// use [`parse_color_value`] when clearing is acceptable.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_color_value(s)? {
            Some(color) => Ok(color),
            None => Err(ColorParseError(s.to_string())),
        }
    }
}

/// Parse a user or markup supplied color.
/// `Ok(None)` means the value explicitly clears the color (`transparent`, `none`, ...).
pub fn parse_color_value(input: &str) -> Result<Option<Color>, ColorParseError> {
    let value = input.trim();
    let lower = value.to_ascii_lowercase();
    let err = || ColorParseError(input.to_string());

    if matches!(
        lower.as_str(),
        "transparent" | "none" | "inherit" | "initial" | "unset"
    ) {
        return Ok(None);
    }

    if let Some(hex) = lower.strip_prefix('#') {
        return parse_hex(hex).map(Some).ok_or_else(err);
    }

    if let Some(caps) = RGB_FUNCTION.captures(&lower) {
        let channel = |i: usize| -> Option<u8> { caps.get(i)?.as_str().parse::<u8>().ok() };
        let (Some(r), Some(g), Some(b)) = (channel(1), channel(2), channel(3)) else {
            return Err(err());
        };
        let a = match caps.get(4) {
            Some(m) => {
                let alpha: f32 = m.as_str().parse().map_err(|_| err())?;
                if !(0.0..=1.0).contains(&alpha) {
                    return Err(err());
                }
                (alpha * 255.0).round() as u8
            }
            None => 0xff,
        };
        return Ok(Some(Color { r, g, b, a }));
    }

    NAMED_COLORS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, [r, g, b])| Some(Color::rgb(*r, *g, *b)))
        .ok_or_else(err)
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?)),
        4 => Some(Color {
            r: nibble(0)?,
            g: nibble(1)?,
            b: nibble(2)?,
            a: nibble(3)?,
        }),
        6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: byte(6)?,
        }),
        _ => None,
    }
}

/// Boolean attributes that can be toggled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleAttr {
    Bold,
    Italic,
    Underline,
    Strikethrough,
}

/// Which color attribute a color command targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorKind {
    Text,
    Highlight,
}

/// Text styling (semantic, value type compared structurally)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Style {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font_size: u16,
    pub color: Option<Color>,
    pub highlight: Option<Color>,
}

impl Default for Style {
    fn default() -> Self {
        Style {
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            font_size: DEFAULT_FONT_SIZE,
            color: None,
            highlight: None,
        }
    }
}

impl Style {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn bold() -> Self {
        Style {
            bold: true,
            ..Default::default()
        }
    }

    pub fn italic() -> Self {
        Style {
            italic: true,
            ..Default::default()
        }
    }

    pub fn with_font_size(mut self, px: i64) -> Self {
        self.font_size = clamp_font_size(px);
        self
    }

    pub fn with_color(mut self, color: Option<Color>) -> Self {
        self.color = color;
        self
    }

    pub fn with_highlight(mut self, highlight: Option<Color>) -> Self {
        self.highlight = highlight;
        self
    }

    pub fn flag(&self, attr: ToggleAttr) -> bool {
        match attr {
            ToggleAttr::Bold => self.bold,
            ToggleAttr::Italic => self.italic,
            ToggleAttr::Underline => self.underline,
            ToggleAttr::Strikethrough => self.strikethrough,
        }
    }

    pub fn set_flag(&mut self, attr: ToggleAttr, value: bool) {
        match attr {
            ToggleAttr::Bold => self.bold = value,
            ToggleAttr::Italic => self.italic = value,
            ToggleAttr::Underline => self.underline = value,
            ToggleAttr::Strikethrough => self.strikethrough = value,
        }
    }
}

/// A single attribute change produced by a formatting command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleChange {
    Flag(ToggleAttr, bool),
    Color(ColorKind, Option<Color>),
    FontSize(u16),
    Reset(Style),
}

impl StyleChange {
    pub fn apply(&self, style: &mut Style) {
        match *self {
            StyleChange::Flag(attr, value) => style.set_flag(attr, value),
            StyleChange::Color(ColorKind::Text, color) => style.color = color,
            StyleChange::Color(ColorKind::Highlight, color) => style.highlight = color,
            StyleChange::FontSize(px) => style.font_size = px,
            StyleChange::Reset(base) => *style = base,
        }
    }

    pub fn applied_to(&self, mut style: Style) -> Style {
        self.apply(&mut style);
        style
    }
}

/// One attribute as seen across a selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrState<T> {
    Uniform(T),
    Mixed,
}

impl<T: PartialEq + Copy> AttrState<T> {
    fn merge(self, value: T) -> Self {
        match self {
            AttrState::Uniform(current) if current == value => self,
            _ => AttrState::Mixed,
        }
    }
}

/// The style a toolbar should display for the current cursor or selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayedStyle {
    pub bold: AttrState<bool>,
    pub italic: AttrState<bool>,
    pub underline: AttrState<bool>,
    pub strikethrough: AttrState<bool>,
    pub font_size: AttrState<u16>,
    pub color: AttrState<Option<Color>>,
    pub highlight: AttrState<Option<Color>>,
}

impl DisplayedStyle {
    pub fn from_style(style: &Style) -> Self {
        DisplayedStyle {
            bold: AttrState::Uniform(style.bold),
            italic: AttrState::Uniform(style.italic),
            underline: AttrState::Uniform(style.underline),
            strikethrough: AttrState::Uniform(style.strikethrough),
            font_size: AttrState::Uniform(style.font_size),
            color: AttrState::Uniform(style.color),
            highlight: AttrState::Uniform(style.highlight),
        }
    }

    /// Fold the styles of every touched span. Returns None for an empty iterator.
    pub fn from_styles<'a>(styles: impl IntoIterator<Item = &'a Style>) -> Option<Self> {
        let mut styles = styles.into_iter();
        let first = styles.next()?;
        Some(styles.fold(Self::from_style(first), |acc, s| DisplayedStyle {
            bold: acc.bold.merge(s.bold),
            italic: acc.italic.merge(s.italic),
            underline: acc.underline.merge(s.underline),
            strikethrough: acc.strikethrough.merge(s.strikethrough),
            font_size: acc.font_size.merge(s.font_size),
            color: acc.color.merge(s.color),
            highlight: acc.highlight.merge(s.highlight),
        }))
    }

    pub fn flag(&self, attr: ToggleAttr) -> AttrState<bool> {
        match attr {
            ToggleAttr::Bold => self.bold,
            ToggleAttr::Italic => self.italic,
            ToggleAttr::Underline => self.underline,
            ToggleAttr::Strikethrough => self.strikethrough,
        }
    }

    /// Whether a toolbar toggle button should render as pressed. Mixed renders as off.
    pub fn is_on(&self, attr: ToggleAttr) -> bool {
        self.flag(attr) == AttrState::Uniform(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_font_size_clamped() {
        assert_eq!(clamp_font_size(2), MIN_FONT_SIZE);
        assert_eq!(clamp_font_size(24), 24);
        assert_eq!(clamp_font_size(9000), MAX_FONT_SIZE);
        assert_eq!(Style::plain().with_font_size(-5).font_size, 8);
    }

    #[test]
    fn test_parse_hex_colors() {
        assert_eq!("#ff0000".parse::<Color>().unwrap(), Color::rgb(255, 0, 0));
        assert_eq!("#F00".parse::<Color>().unwrap(), Color::rgb(255, 0, 0));
        assert_eq!(
            "#00ff0080".parse::<Color>().unwrap(),
            Color {
                r: 0,
                g: 255,
                b: 0,
                a: 0x80
            }
        );
        assert!("#ff00".parse::<Color>().is_ok());
        assert!("#ggg".parse::<Color>().is_err());
        assert!("#12345".parse::<Color>().is_err());
    }

    #[test]
    fn test_parse_rgb_and_named() {
        assert_eq!(
            parse_color_value("rgb(255, 128, 0)").unwrap(),
            Some(Color::rgb(255, 128, 0))
        );
        assert_eq!(
            parse_color_value("RGBA(0,0,0,0.5)").unwrap(),
            Some(Color {
                r: 0,
                g: 0,
                b: 0,
                a: 128
            })
        );
        assert!(parse_color_value("rgb(300, 0, 0)").is_err());
        assert_eq!(parse_color_value(" Red ").unwrap(), Some(Color::rgb(255, 0, 0)));
        assert_eq!(parse_color_value("transparent").unwrap(), None);
        assert!(parse_color_value("not-a-color").is_err());
    }

    #[test]
    fn test_color_display() {
        assert_eq!(Color::rgb(255, 0, 0).to_string(), "#ff0000");
        let translucent = Color {
            r: 1,
            g: 2,
            b: 3,
            a: 4,
        };
        assert_eq!(translucent.to_string(), "#01020304");
    }

    #[test]
    fn test_displayed_style_mixed() {
        let styles = [Style::bold(), Style::plain()];
        let displayed = DisplayedStyle::from_styles(styles.iter()).unwrap();
        assert_eq!(displayed.bold, AttrState::Mixed);
        assert_eq!(displayed.italic, AttrState::Uniform(false));
        assert!(!displayed.is_on(ToggleAttr::Bold));
    }

    #[test]
    fn test_displayed_style_empty() {
        assert!(DisplayedStyle::from_styles(std::iter::empty()).is_none());
    }

    #[test]
    fn test_style_change_apply() {
        let red = Color::rgb(255, 0, 0);
        let style = StyleChange::Color(ColorKind::Highlight, Some(red)).applied_to(Style::plain());
        assert_eq!(style.highlight, Some(red));
        let style = StyleChange::Flag(ToggleAttr::Underline, true).applied_to(style);
        assert!(style.underline);
        let style = StyleChange::Reset(Style::plain()).applied_to(style);
        assert_eq!(style, Style::plain());
    }
}
