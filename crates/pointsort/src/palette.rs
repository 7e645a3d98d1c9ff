use serde::{Deserialize, Serialize};

/// An RGB display color assigned to a track at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b }
    }
}

/// The ten category colors used when no palette is supplied.
pub const DEFAULT_PALETTE: [Color; 10] = [
    Color::new(31, 119, 180),
    Color::new(255, 127, 14),
    Color::new(44, 160, 44),
    Color::new(214, 39, 40),
    Color::new(148, 103, 189),
    Color::new(140, 86, 75),
    Color::new(227, 119, 194),
    Color::new(127, 127, 127),
    Color::new(188, 189, 34),
    Color::new(23, 190, 207),
];

/// An endless source of track colors.
pub trait PaletteSource: Send {
    /// Returns the color for the next created track.
    fn next_color(&mut self) -> Color;
}

/// Cycles through a fixed list of colors forever.
#[derive(Debug, Clone)]
pub struct CyclicPalette {
    colors: Vec<Color>,
    position: usize,
}

impl Default for CyclicPalette {
    fn default() -> Self {
        Self::new(DEFAULT_PALETTE.to_vec())
    }
}

impl CyclicPalette {
    /// Returns a new CyclicPalette. An empty list falls back to the default palette.
    pub fn new(colors: Vec<Color>) -> CyclicPalette {
        let colors = if colors.is_empty() {
            DEFAULT_PALETTE.to_vec()
        } else {
            colors
        };
        CyclicPalette {
            colors,
            position: 0,
        }
    }
}

impl PaletteSource for CyclicPalette {
    fn next_color(&mut self) -> Color {
        let color = self.colors[self.position];
        self.position = (self.position + 1) % self.colors.len();
        color
    }
}
