//! Colours and styles for console output.
//!
//! Tables are laid out with ratatui styles and printed through crossterm, so
//! the palette is defined once in ratatui terms and converted on output.

use crossterm::style::{self as ct, Stylize};
use ratatui::style::{Color, Modifier, Style};

// =============================================================================
// COLOR PALETTE
// =============================================================================

pub struct Colors;

impl Colors {
    /// Table headers.
    pub const HEADER: Color = Color::White;
    /// Table body and borders.
    pub const TABLE: Color = Color::Yellow;

    pub const SUCCESS: Color = Color::Green;
    pub const WARNING: Color = Color::Yellow;
    pub const ERROR: Color = Color::Red;
    pub const INFO: Color = Color::Cyan;

    /// Application names cycle through these in first-seen order.
    pub const APP_PALETTE: [Color; 5] = [
        Color::Cyan,
        Color::Yellow,
        Color::Green,
        Color::Magenta,
        Color::Blue,
    ];
}

// =============================================================================
// STYLES
// =============================================================================

pub struct Styles;

impl Styles {
    pub fn header() -> Style {
        Style::default()
            .fg(Colors::HEADER)
            .add_modifier(Modifier::BOLD)
    }

    pub fn table() -> Style {
        Style::default().fg(Colors::TABLE)
    }

    /// Bold, in the palette colour of the `index`-th application.
    pub fn app_name(index: usize) -> Style {
        Style::default()
            .fg(Colors::APP_PALETTE[index % Colors::APP_PALETTE.len()])
            .add_modifier(Modifier::BOLD)
    }
}

// =============================================================================
// LINE TONES
// =============================================================================

/// Semantic colour of a plain output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warning,
    Error,
}

impl Tone {
    fn color(self) -> Color {
        match self {
            Self::Info => Colors::INFO,
            Self::Success => Colors::SUCCESS,
            Self::Warning => Colors::WARNING,
            Self::Error => Colors::ERROR,
        }
    }
}

/// `text` coloured for `tone`.
pub fn paint(text: &str, tone: Tone) -> String {
    text.with(to_crossterm(tone.color())).to_string()
}

/// `text` coloured for `tone`, bold and underlined (section banners).
pub fn banner(text: &str, tone: Tone) -> String {
    text.with(to_crossterm(tone.color()))
        .bold()
        .underlined()
        .to_string()
}

/// Map a palette colour onto crossterm's colour type.
pub fn to_crossterm(color: Color) -> ct::Color {
    match color {
        Color::Reset => ct::Color::Reset,
        Color::Black => ct::Color::Black,
        Color::Red => ct::Color::DarkRed,
        Color::Green => ct::Color::DarkGreen,
        Color::Yellow => ct::Color::DarkYellow,
        Color::Blue => ct::Color::DarkBlue,
        Color::Magenta => ct::Color::DarkMagenta,
        Color::Cyan => ct::Color::DarkCyan,
        Color::Gray => ct::Color::Grey,
        Color::DarkGray => ct::Color::DarkGrey,
        Color::LightRed => ct::Color::Red,
        Color::LightGreen => ct::Color::Green,
        Color::LightYellow => ct::Color::Yellow,
        Color::LightBlue => ct::Color::Blue,
        Color::LightMagenta => ct::Color::Magenta,
        Color::LightCyan => ct::Color::Cyan,
        Color::White => ct::Color::White,
        Color::Rgb(r, g, b) => ct::Color::Rgb { r, g, b },
        Color::Indexed(i) => ct::Color::AnsiValue(i),
    }
}
