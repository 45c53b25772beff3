use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Metric, Point},
    record::RecordingSettings,
    render::Viewport,
    Result, SearchspaceError,
};

/// Names accepted by [`SceneSettings::preset`].
pub const PRESETS: [&str; 3] = ["default", "l1-l2", "adjusted-dot"];

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scene: SceneSettings,
    pub viewport: ViewportConfig,
    pub recording: RecordingSettings,
}

impl AppConfig {
    /// Reads a JSON config. Missing sections and fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(?path, "loaded config");
        Ok(config)
    }

    pub fn with_preset(name: &str) -> Result<Self> {
        Ok(Self {
            scene: SceneSettings::preset(name)?,
            ..Self::default()
        })
    }
}

/// What the scene offers and how it starts out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneSettings {
    pub title: String,
    pub unit_circle: bool,
    pub allow_unit_circle: bool,
    pub convex_hull: bool,
    pub allow_convex_hull: bool,
    pub distance_fn: Metric,
    /// Metrics offered to the user, in selection order.
    pub metrics: Vec<Metric>,
    pub points: Vec<Point>,
    pub init_ref_pos: Point,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            title: "Visualization of Various Similarity Measures".to_string(),
            unit_circle: true,
            allow_unit_circle: true,
            convex_hull: true,
            allow_convex_hull: true,
            distance_fn: Metric::L2,
            metrics: vec![Metric::L1, Metric::L2, Metric::Cosine, Metric::Dot],
            points: vec![
                Point::new(0.4, 0.2),
                Point::new(-0.5, 0.8),
                Point::new(-0.8, -0.4),
                Point::new(0.2, -0.6),
                Point::new(0.3, 0.3),
                Point::new(-0.4, 0.2),
            ],
            init_ref_pos: Point::new(0.01, 0.01),
        }
    }
}

impl SceneSettings {
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "default" => Ok(Self::default()),
            "l1-l2" => Ok(Self {
                title: "L2 and L1 Distance Functions".to_string(),
                unit_circle: false,
                allow_unit_circle: false,
                convex_hull: false,
                allow_convex_hull: false,
                distance_fn: Metric::L2,
                metrics: vec![Metric::L1, Metric::L2],
                ..Self::default()
            }),
            "adjusted-dot" => Ok(Self {
                title: "Adjusted Dot Product".to_string(),
                distance_fn: Metric::AdjustedDot,
                metrics: vec![Metric::Dot, Metric::AdjustedDot],
                points: vec![
                    Point::new(-1.1, 0.6),
                    Point::new(-1.3, 0.7),
                    Point::new(-1.4, 0.8),
                    Point::new(-1.4, 1.0),
                    Point::new(-1.0, 0.9),
                    Point::new(-1.0, 0.8),
                ],
                init_ref_pos: Point::new(-1.2, 0.8),
                ..Self::default()
            }),
            other => Err(SearchspaceError::InvalidInput(format!(
                "unknown preset `{other}`, expected one of {}",
                PRESETS.join(", ")
            ))),
        }
    }
}

/// Surface size and the range of the view control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    pub max_y: f64,
    pub view_min: f64,
    pub view_max: f64,
    pub view_step: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            max_y: 1.1,
            view_min: 1.0,
            view_max: 10.0,
            view_step: 0.1,
        }
    }
}

impl ViewportConfig {
    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
            max_y: self.max_y,
        }
    }
}
