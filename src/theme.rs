//! Colours: candy palette plus UI colours, optionally loaded from a btop-style
//! `theme[key]="value"` file.

use crate::Palette;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Number of distinct candy colours a palette provides.
pub const CANDY_COLOURS: usize = 6;

#[derive(Debug, Clone)]
pub struct Theme {
    /// Candy fill colours by kind: red, green, blue, yellow, purple, cyan.
    pub candy: [Color; CANDY_COLOURS],
    /// Board background.
    pub bg: Color,
    /// Borders.
    pub div_line: Color,
    /// Overlay text.
    pub main_fg: Color,
    pub title: Color,
    /// Flash drawn over an exploding area.
    pub explosion: Color,
    /// Keyboard cursor outline.
    pub cursor: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            candy: [
                rgb(0xE0, 0x6C, 0x75),
                rgb(0x98, 0xC3, 0x79),
                rgb(0x61, 0xAF, 0xEF),
                rgb(0xE5, 0xC0, 0x7B),
                rgb(0xC6, 0x78, 0xDD),
                rgb(0x56, 0xB6, 0xC2),
            ],
            bg: rgb(0x28, 0x2C, 0x34),
            div_line: rgb(0x3F, 0x44, 0x4F),
            main_fg: rgb(0xAB, 0xB2, 0xBF),
            title: rgb(0xE5, 0xC0, 0x7B),
            explosion: rgb(0xD1, 0x9A, 0x66),
            cursor: rgb(0xFF, 0xFF, 0xFF),
        }
    }
}

const fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb(r, g, b)
}

/// btop keys tried, in order, for each candy kind.
const CANDY_KEYS: [&[&str]; CANDY_COLOURS] = [
    &["cpu_end", "temp_end"],
    &["mem_box", "cpu_start"],
    &["cpu_box"],
    &["title", "cpu_mid"],
    &["net_box"],
    &["hi_fg", "proc_misc"],
];

impl Theme {
    /// Load from `path` if it exists (missing keys keep their defaults), then apply `palette`.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                let map = parse_theme_file(&std::fs::read_to_string(p)?);
                Self::default().overlay(&map)
            }
            _ => Self::default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn overlay(mut self, map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        for (slot, keys) in self.candy.iter_mut().zip(CANDY_KEYS) {
            if let Some(c) = keys.iter().find_map(|k| get(*k)) {
                *slot = c;
            }
        }
        let ui = [
            (&mut self.bg, "main_bg"),
            (&mut self.div_line, "div_line"),
            (&mut self.main_fg, "main_fg"),
            (&mut self.title, "title"),
            (&mut self.explosion, "temp_mid"),
            (&mut self.cursor, "selected_fg"),
        ];
        for (slot, key) in ui {
            if let Some(c) = get(key) {
                *slot = c;
            }
        }
        self
    }

    /// Swap the candy colours for a high-contrast or colourblind-safe set.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.candy = [
                    rgb(0xFF, 0x00, 0x00),
                    rgb(0x00, 0xFF, 0x00),
                    rgb(0x00, 0x88, 0xFF),
                    rgb(0xFF, 0xFF, 0x00),
                    rgb(0xFF, 0x00, 0xFF),
                    rgb(0x00, 0xFF, 0xFF),
                ];
            }
            Palette::Colorblind => {
                // Tol "vibrant" scheme
                self.candy = [
                    rgb(0xCC, 0x33, 0x11),
                    rgb(0x00, 0x99, 0x88),
                    rgb(0x00, 0x77, 0xBB),
                    rgb(0xEE, 0x77, 0x33),
                    rgb(0xEE, 0x33, 0x77),
                    rgb(0x33, 0xBB, 0xEE),
                ];
            }
        }
    }

    /// Fill colour for a candy kind.
    #[inline]
    pub fn candy_color(&self, kind: u8) -> Color {
        self.candy[kind as usize % CANDY_COLOURS]
    }

    /// Darker rim drawn around a candy.
    pub fn candy_rim(&self, kind: u8) -> Color {
        darken(self.candy_color(kind), 0.55)
    }
}

/// Scale an RGB colour towards black. Named colours are returned unchanged.
pub fn darken(color: Color, factor: f32) -> Color {
    match color {
        Color::Rgb(r, g, b) => {
            let f = |c: u8| (c as f32 * factor).clamp(0.0, 255.0) as u8;
            Color::Rgb(f(r), f(g), f(b))
        }
        other => other,
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .map(str::trim)
        .filter(|l| !l.starts_with('#'))
        .filter_map(|l| l.strip_prefix("theme["))
        .filter_map(|rest| {
            let (key, value) = rest.split_once(']')?;
            let (_, value) = value.split_once('=')?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            (!value.is_empty()).then(|| (key.trim().to_string(), value.to_string()))
        })
        .collect()
}

/// Parse hex colour "#RRGGBB" or "#RGB".
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let hex = s.trim().trim_matches('"').trim_start_matches('#');
    let bad = || ThemeError::InvalidHex(hex.to_string());
    let channel = |range: std::ops::Range<usize>, scale: u8| {
        hex.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .map(|v| v * scale)
            .ok_or_else(bad)
    };
    match hex.len() {
        6 => Ok(rgb(channel(0..2, 1)?, channel(2..4, 1)?, channel(4..6, 1)?)),
        3 => Ok(rgb(channel(0..1, 17)?, channel(1..2, 17)?, channel(2..3, 17)?)),
        _ => Err(bad()),
    }
}
