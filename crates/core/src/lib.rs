//! Core library for the Searchspace similarity visualisation.
//!
//! Each module owns one subsystem: planar geometry and the distance metrics,
//! the typed value store, the backend contract, the redraw scheduler,
//! recording, widget bindings and the scene that ties them together. The
//! scheduler is single threaded; hosts drive it by feeding input and calling
//! `tick` once per animation frame.

pub mod config;
pub mod control;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod record;
pub mod render;
pub mod scene;
pub mod schedule;
pub mod values;

pub use config::{AppConfig, SceneSettings, ViewportConfig, PRESETS};
pub use control::{ControlInput, ControlPanel, InputEvent, Key, SurfaceRect};
pub use diagnostics::Diagnostics;
pub use error::{Result, SearchspaceError};
pub use geometry::{closest_point, convex_hull, distance, hull_normalization, Metric, Point};
pub use record::{Artifact, Recorder, RecordingSettings, RecordingState};
pub use render::{HeadlessBackend, ImageData, RenderBackend, Viewport};
pub use scene::Searchspace;
pub use schedule::{Phase, RenderLoop, SchedulerState, Visibility};
pub use values::{RenderValues, Value, ValueKind, ValueStore, ValueUpdate};
