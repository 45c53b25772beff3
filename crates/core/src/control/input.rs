use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    geometry::Point,
    render::{Measures, Viewport},
    SearchspaceError,
};

/// Grid the pointer snaps to while the grid overlay is shown.
pub const SNAP_GRID: f64 = 0.1;

/// Keyboard key identifier, as far as the scene cares.
///
/// Serialized as `"Shift"`, `"Digit3"` or a single character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    Digit(u8),
    Shift,
    /// Printable key, stored lowercase.
    Char(char),
}

impl FromStr for Key {
    type Err = SearchspaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Shift" {
            return Ok(Key::Shift);
        }
        if let Some(digit) = s.strip_prefix("Digit") {
            return digit
                .parse::<u8>()
                .ok()
                .filter(|d| *d <= 9)
                .map(Key::Digit)
                .ok_or_else(|| SearchspaceError::InvalidInput(format!("unknown key `{s}`")));
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Key::Char(c.to_ascii_lowercase())),
            _ => Err(SearchspaceError::InvalidInput(format!("unknown key `{s}`"))),
        }
    }
}

impl TryFrom<String> for Key {
    type Error = SearchspaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Key> for String {
    fn from(value: Key) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Digit(d) => write!(f, "Digit{d}"),
            Key::Shift => f.write_str("Shift"),
            Key::Char(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Touch {
    pub x: f64,
    pub y: f64,
    /// Pressure reported by the device, 0 when unknown.
    #[serde(default)]
    pub force: f64,
}

/// Input delivered to the scene. Positions are client coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    PointerMove {
        x: f64,
        y: f64,
    },
    Click {
        x: f64,
        y: f64,
    },
    Touch {
        touches: Vec<Touch>,
    },
    KeyDown {
        key: Key,
        /// The key went to a text field and must not trigger shortcuts.
        #[serde(default)]
        text_target: bool,
    },
    KeyUp {
        key: Key,
        #[serde(default)]
        text_target: bool,
    },
}

/// Placement of the drawing surface in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceRect {
    /// Surface at the client origin, one client unit per pixel.
    pub fn from_viewport(viewport: &Viewport) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: f64::from(viewport.width),
            height: f64::from(viewport.height),
        }
    }
}

fn snap(v: f64) -> f64 {
    (v / SNAP_GRID + 0.5).floor() * SNAP_GRID
}

/// Maps a client position onto world coordinates, y pointing up.
pub fn pointer_to_world(
    rect: &SurfaceRect,
    measures: &Measures,
    snap_to_grid: bool,
    x: f64,
    y: f64,
) -> Point {
    let pixel_x = (x - rect.left) / rect.width * measures.width;
    let pixel_y = (y - rect.top) / rect.height * measures.height;
    let half_w = measures.width * 0.5;
    let half_h = measures.height * 0.5;
    let world = Point::new(
        (pixel_x - half_w) / half_w * measures.max_x,
        -(pixel_y - half_h) / half_h * measures.max_y,
    );
    if snap_to_grid {
        Point::new(snap(world.x), snap(world.y))
    } else {
        world
    }
}

/// Force weighted mean of all touches. Without force data the positions are
/// summed.
pub fn touch_to_world(
    rect: &SurfaceRect,
    measures: &Measures,
    snap_to_grid: bool,
    touches: &[Touch],
) -> Point {
    let total: f64 = touches.iter().map(|t| t.force).sum();
    let weighted = total > 0.0;
    let (x, y) = touches.iter().fold((0.0, 0.0), |(x, y), t| {
        let w = if weighted { t.force } else { 1.0 };
        (x + t.x * w, y + t.y * w)
    });
    let (x, y) = if weighted {
        (x / total, y / total)
    } else {
        (x, y)
    };
    pointer_to_world(rect, measures, snap_to_grid, x, y)
}
