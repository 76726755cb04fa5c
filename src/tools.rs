use std::fmt;

use serde::{Deserialize, Serialize};

use crate::raster::{BlendMode, Color};

pub const MIN_BRUSH_SIZE: u32 = 1;
pub const MAX_BRUSH_SIZE: u32 = 50;
pub const BRUSH_SIZE_STEP: u32 = 2;

/// Opacity change per key press; stepping never goes below one step.
pub const OPACITY_STEP: f32 = 0.1;

/// Swatches bound to the number keys 1 to 6.
pub const PALETTE: [Color; 6] = [
    Color::WHITE,
    Color::BLACK,
    Color::rgb(0xff, 0x47, 0x57),
    Color::rgb(0x2e, 0xd5, 0x73),
    Color::rgb(0x1e, 0x90, 0xff),
    Color::rgb(0xff, 0xa5, 0x02),
];

/// Palette swatch for a number key.
pub fn palette_color(key: char) -> Option<Color> {
    let index = key.to_digit(10)?.checked_sub(1)?;
    PALETTE.get(index as usize).copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Brush,
    Pen,
    Marker,
    Eraser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineCap {
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineJoin {
    Round,
    Miter,
}

/// Fixed paint parameters of a tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolParams {
    pub cap: LineCap,
    pub join: LineJoin,
    pub blend: BlendMode,
    /// Shadow blur in physical pixels, 0 for none.
    pub blur: f32,
    pub size_multiplier: f32,
    pub opacity_override: Option<f32>,
}

impl Tool {
    pub const ALL: [Tool; 4] = [Tool::Brush, Tool::Pen, Tool::Marker, Tool::Eraser];

    pub const fn params(self) -> ToolParams {
        match self {
            Tool::Brush => ToolParams {
                cap: LineCap::Round,
                join: LineJoin::Round,
                blend: BlendMode::Normal,
                blur: 2.0,
                size_multiplier: 1.0,
                opacity_override: None,
            },
            Tool::Pen => ToolParams {
                cap: LineCap::Round,
                join: LineJoin::Round,
                blend: BlendMode::Normal,
                blur: 0.0,
                size_multiplier: 0.5,
                opacity_override: None,
            },
            Tool::Marker => ToolParams {
                cap: LineCap::Square,
                join: LineJoin::Miter,
                blend: BlendMode::Multiply,
                blur: 0.0,
                size_multiplier: 2.0,
                opacity_override: Some(0.4),
            },
            Tool::Eraser => ToolParams {
                cap: LineCap::Round,
                join: LineJoin::Round,
                blend: BlendMode::DestinationOut,
                blur: 0.0,
                size_multiplier: 1.5,
                opacity_override: None,
            },
        }
    }

    /// Single-letter tool switch key.
    pub fn key(self) -> char {
        match self {
            Tool::Brush => 'b',
            Tool::Pen => 'p',
            Tool::Marker => 'm',
            Tool::Eraser => 'e',
        }
    }

    pub fn from_key(key: char) -> Option<Tool> {
        let key = key.to_ascii_lowercase();
        Tool::ALL.into_iter().find(|tool| tool.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Pen => "Pen",
            Tool::Marker => "Marker",
            Tool::Eraser => "Eraser",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolved parameters for painting one dab or segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paint {
    pub color: Color,
    pub opacity: f32,
    pub width: f32,
    pub cap: LineCap,
    pub blend: BlendMode,
    pub blur: f32,
}

/// User-adjustable tool state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToolSettings {
    pub tool: Tool,
    pub color: Color,
    size: u32,
    opacity: f32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            color: Color::WHITE,
            size: 8,
            opacity: 1.0,
        }
    }
}

impl ToolSettings {
    pub fn new(tool: Tool, color: Color, size: u32, opacity: f32) -> Self {
        let mut settings = Self {
            tool,
            color,
            ..Self::default()
        };
        settings.set_size(size);
        settings.set_opacity(opacity);
        settings
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn set_size(&mut self, size: u32) {
        self.size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    pub fn increase_size(&mut self) {
        self.set_size(self.size.saturating_add(BRUSH_SIZE_STEP));
    }

    pub fn decrease_size(&mut self) {
        self.set_size(self.size.saturating_sub(BRUSH_SIZE_STEP));
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
    }

    pub fn increase_opacity(&mut self) {
        self.step_opacity(OPACITY_STEP);
    }

    pub fn decrease_opacity(&mut self) {
        self.step_opacity(-OPACITY_STEP);
    }

    fn step_opacity(&mut self, delta: f32) {
        // Whole percents, like a slider.
        let stepped = ((self.opacity + delta) * 100.0).round() / 100.0;
        self.set_opacity(stepped.max(OPACITY_STEP));
    }

    /// Base size times the tool's multiplier, in logical pixels.
    pub fn effective_size(&self) -> f32 {
        self.size as f32 * self.tool.params().size_multiplier
    }

    pub fn effective_opacity(&self) -> f32 {
        self.tool.params().opacity_override.unwrap_or(self.opacity)
    }

    pub fn paint(&self) -> Paint {
        let params = self.tool.params();
        let (color, opacity) = if self.tool == Tool::Eraser {
            (Color::BLACK, 1.0)
        } else {
            (self.color, self.effective_opacity())
        };
        Paint {
            color,
            opacity,
            width: self.effective_size(),
            cap: params.cap,
            blend: params.blend,
            blur: params.blur,
        }
    }
}
