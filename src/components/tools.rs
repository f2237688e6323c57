use image::Rgba;
use std::fmt;
use std::str::FromStr;

use crate::components::colors::{self, DEFAULT_COLOR};
use crate::ops::shapes::{Cell, ShapeKind};

/// Largest brush side the editor accepts, in cells.
pub const MAX_BRUSH_SIZE: u32 = 64;

// ============================================================================
// TOOLS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
    Fill,
    Line,
    Rect,
    Circle,
}

impl Tool {
    pub const ALL: [Tool; 6] = [
        Tool::Brush,
        Tool::Eraser,
        Tool::Fill,
        Tool::Line,
        Tool::Rect,
        Tool::Circle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Tool::Brush => "brush",
            Tool::Eraser => "eraser",
            Tool::Fill => "fill",
            Tool::Line => "line",
            Tool::Rect => "rect",
            Tool::Circle => "circle",
        }
    }

    /// Label used for history entries.
    pub fn action_label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush",
            Tool::Eraser => "Eraser",
            Tool::Fill => "Fill",
            Tool::Line => "Line",
            Tool::Rect => "Rectangle",
            Tool::Circle => "Circle",
        }
    }

    pub fn hotkey(&self) -> char {
        match self {
            Tool::Brush => 'b',
            Tool::Eraser => 'e',
            Tool::Fill => 'f',
            Tool::Line => 'l',
            Tool::Rect => 'r',
            Tool::Circle => 'c',
        }
    }

    pub fn from_hotkey(key: char) -> Option<Tool> {
        let key = key.to_ascii_lowercase();
        Tool::ALL.into_iter().find(|t| t.hotkey() == key)
    }

    /// Shape rasterizer for drag-to-place tools.
    pub fn shape(&self) -> Option<ShapeKind> {
        match self {
            Tool::Line => Some(ShapeKind::Line),
            Tool::Rect => Some(ShapeKind::Rectangle),
            Tool::Circle => Some(ShapeKind::Ellipse),
            _ => None,
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "ellipse" => return Ok(Tool::Circle),
            "rectangle" => return Ok(Tool::Rect),
            "bucket" => return Ok(Tool::Fill),
            _ => {}
        }
        Tool::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| format!("unknown tool '{}'", s))
    }
}

// ============================================================================
// TOOL SETTINGS
// ============================================================================

/// Current tool, brush size and color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToolSettings {
    pub tool: Tool,
    brush_size: u32,
    color: Rgba<u8>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            brush_size: 1,
            color: DEFAULT_COLOR,
        }
    }
}

impl ToolSettings {
    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(1, MAX_BRUSH_SIZE);
    }

    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    pub fn color_hex(&self) -> String {
        colors::to_hex(self.color)
    }

    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.color = color;
    }
}

// ============================================================================
// GESTURES: what a held pointer is doing
// ============================================================================

/// In-progress pointer interaction.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum Gesture {
    #[default]
    Idle,
    /// Brush or eraser held down; `last` is the previous stamp position.
    Stroke { last: Cell, erase: bool },
    /// Shape drag from `start` to the current pointer cell.
    Shape {
        kind: ShapeKind,
        start: Cell,
        current: Cell,
    },
    /// Pan-mode drag; `last` is the previous screen position.
    Pan { last: egui::Pos2 },
}

impl Gesture {
    pub fn is_active(&self) -> bool {
        !matches!(self, Gesture::Idle)
    }
}

/// Cells drawn over the committed raster while a shape is being dragged.
///
/// Never written into the canvas; only the render path composites it.
#[derive(Clone, Debug, PartialEq)]
pub struct PreviewOverlay {
    pub cells: Vec<Cell>,
    pub color: Rgba<u8>,
}
