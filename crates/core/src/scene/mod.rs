//! The searchspace scene: reference position, user points, the active metric
//! and the overlays derived from them.

use std::{cell::RefCell, rc::Rc, time::Duration};

use crate::{
    config::{AppConfig, SceneSettings, ViewportConfig},
    control::{
        pointer_to_world, touch_to_world, ControlAction, ControlInput, ControlOptions,
        ControlPanel, InputEvent, Key, SurfaceRect,
    },
    diagnostics::Diagnostics,
    geometry::{
        closest_point, convex_hull, hull_normalization, Closest, HullFrame, Metric, Point, PointSet,
    },
    record::{Artifact, RecordingState},
    render::{ImageData, Measures, RenderBackend},
    schedule::{Phase, RenderLoop, Setup},
    values::{RenderValues, ValueKind, ValueUpdate},
    Result,
};

const STATUS_DIGITS: usize = 5;
const DEFAULT_CORRECTION: f64 = 2.5;

/// Formats `value` with `digits` decimals. Non-negative numbers get a leading
/// non-breaking space so columns line up with negative ones.
pub fn precision(value: f64, digits: usize) -> String {
    // -0.0 would print its sign
    let value = if value == 0.0 { 0.0 } else { value };
    let pad = if value >= 0.0 { "\u{a0}" } else { "" };
    format!("{pad}{value:.digits$}")
}

fn metric_of(values: &RenderValues) -> Option<Metric> {
    values.index("distanceFn").and_then(Metric::from_index)
}

fn hull_frame(values: &RenderValues) -> HullFrame {
    let defaults = HullFrame::default();
    HullFrame {
        centroid: values.vector("outlineCenter").unwrap_or(defaults.centroid),
        scale: values.scalar("outlineScale").unwrap_or(defaults.scale),
    }
}

/// Closest user point to `query` under the active metric.
fn closest_to(values: &RenderValues, query: Point) -> Closest {
    let Some(metric) = metric_of(values) else {
        return Closest::NONE;
    };
    let points = values.points("points").unwrap_or_default();
    closest_point(metric, points, query, &hull_frame(values))
}

fn status_line(values: &RenderValues) -> String {
    let pos = values.vector("refPosition").unwrap_or(Point::ORIGIN);
    let closest = closest_to(values, pos);
    let correction = values.scalar("correction").unwrap_or(DEFAULT_CORRECTION);
    format!(
        "Dist:{} Pos: {} {}",
        precision(closest.distance * correction, STATUS_DIGITS),
        precision(pos.x, STATUS_DIGITS),
        precision(pos.y, STATUS_DIGITS)
    )
}

fn derive_outline(mut values: RenderValues) -> RenderValues {
    let outline = convex_hull(values.points("points").unwrap_or_default());
    let frame = hull_normalization(&outline);
    values.set("outline", outline);
    values.set("outlineCenter", frame.centroid);
    values.set("outlineScale", frame.scale);
    values
}

fn cursor_while_recording(mut values: RenderValues) -> RenderValues {
    if values.is_recording() {
        let area = values.bool("areaMode").unwrap_or(false);
        values.set("showCursor", area);
    }
    values
}

fn register_scene(
    setup: &mut Setup<'_>,
    settings: &SceneSettings,
    view: &ViewportConfig,
    panel: &Rc<RefCell<ControlPanel>>,
) -> Result<()> {
    setup.add_value("areaMode", "uAreaMode", ValueKind::Boolean, false);
    setup.add_value("showGrid", "uShowGrid", ValueKind::Boolean, false);
    setup.add_value("showCursor", "uShowCursor", ValueKind::Boolean, false);
    setup.add_value("unitCircle", "uUnitCircle", ValueKind::Boolean, settings.unit_circle);
    setup.add_value("convexHull", "uConvexHull", ValueKind::Boolean, settings.convex_hull);
    setup.add_value("refPosition", "uRefPosition", ValueKind::Vector2, settings.init_ref_pos);
    setup.add_value(
        "distanceFn",
        "uDistanceFn",
        ValueKind::EnumIndex,
        settings.distance_fn.index(),
    );
    setup.add_value("correction", "uCorrection", ValueKind::ScalarRange, DEFAULT_CORRECTION);
    setup.add_value(
        "points",
        "uPoints",
        ValueKind::PointArray,
        PointSet::from(settings.points.clone()),
    );
    setup.add_value("outline", "uOutline", ValueKind::PointArray, Vec::<Point>::new());
    setup.add_value("outlineCenter", "uOutlineCenter", ValueKind::Vector2, Point::ORIGIN);
    setup.add_value("outlineScale", "uOutlineScale", ValueKind::Scalar, 1.0);

    setup.add_prerender_hook(derive_outline);

    {
        let mut controls = panel.borrow_mut();
        let store = setup.store();
        if settings.metrics.len() > 1 {
            let options = settings
                .metrics
                .iter()
                .fold(ControlOptions::new(), |options, metric| {
                    options.option(metric.label(), metric.index())
                });
            controls.bind(store, "distanceFn", "Metric:", options.monitor("distanceFn"))?;
        }
        controls.bind(
            store,
            "areaMode",
            "Show Nearest:",
            ControlOptions::new().monitor("areaMode"),
        )?;
        if settings.allow_unit_circle {
            controls.bind(store, "unitCircle", "Unit Circle:", ControlOptions::new())?;
        }
        if settings.allow_convex_hull {
            controls.bind(store, "convexHull", "Convex Hull:", ControlOptions::new())?;
        }
        controls.divider();
        controls.bind(
            store,
            "correction",
            "Correction:",
            ControlOptions::new().range(0.01, 10.0, 0.01),
        )?;
        controls.bind_viewport(
            "View:",
            setup.viewport().max_y,
            view.view_min,
            view.view_max,
            view.view_step,
        )?;
        controls.bind(store, "showGrid", "Grid:", ControlOptions::new())?;
    }

    setup.add_prerender_hook(cursor_while_recording);
    setup.add_status(status_line);

    let monitored = Rc::clone(panel);
    setup.add_postrender_hook(move |values| monitored.borrow_mut().sync(values));
    Ok(())
}

/// Interactive scene on top of a [`RenderLoop`].
pub struct Searchspace<B: RenderBackend> {
    render: RenderLoop<B>,
    panel: Rc<RefCell<ControlPanel>>,
    settings: SceneSettings,
    surface: Option<SurfaceRect>,
}

impl<B: RenderBackend + 'static> Searchspace<B> {
    /// Wires the scene into a new render loop. Nothing is drawn until
    /// [`Searchspace::start`].
    pub fn new(backend: B, config: AppConfig, watermark: ImageData) -> Result<Self> {
        let AppConfig {
            scene: settings,
            viewport: view,
            recording,
        } = config;
        let mut render = RenderLoop::new(backend, view.viewport(), recording);
        let panel = Rc::new(RefCell::new(ControlPanel::new()));

        let hook_settings = settings.clone();
        let hook_panel = Rc::clone(&panel);
        render.on_setup(Phase::BeforeSurface, move |setup| {
            register_scene(setup, &hook_settings, &view, &hook_panel)
        })?;
        render.on_setup(Phase::AfterSurface, move |setup| {
            setup.add_value("wm", "uWM", ValueKind::Image, watermark);
            Ok(())
        })?;

        tracing::info!(title = %settings.title, metric = %settings.distance_fn, "scene created");
        Ok(Self {
            render,
            panel,
            settings,
            surface: None,
        })
    }

    /// Initialises the loop and draws the first frame.
    pub fn start(&mut self) {
        self.render.repaint(None);
    }

    /// Places the surface in client coordinates. Until this is called,
    /// pointer and touch positions are taken relative to the surface origin.
    pub fn set_surface_rect(&mut self, rect: SurfaceRect) {
        self.surface = Some(rect);
    }

    pub fn settings(&self) -> &SceneSettings {
        &self.settings
    }

    pub fn render(&self) -> &RenderLoop<B> {
        &self.render
    }

    pub fn render_mut(&mut self) -> &mut RenderLoop<B> {
        &mut self.render
    }

    pub fn panel(&self) -> std::cell::Ref<'_, ControlPanel> {
        self.panel.borrow()
    }

    pub fn status(&self) -> &[String] {
        self.render.status()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.render.diagnostics()
    }

    pub fn recording_state(&self) -> RecordingState {
        self.render.recording_state()
    }

    pub fn take_artifacts(&mut self) -> Vec<Artifact> {
        self.render.take_artifacts()
    }

    pub fn tick(&mut self, dt: Duration) {
        self.render.tick(dt);
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.render.set_hidden(hidden);
    }

    pub fn snapshot(&mut self) {
        self.render.snapshot();
    }

    /// Record button: stops a running recording, otherwise starts the
    /// countdown when idle.
    pub fn toggle_recording(&mut self) {
        match self.render.recording_state() {
            RecordingState::IsRecording => {
                self.render.stop_recording();
            }
            RecordingState::NoRecording => {
                self.render.start_recording();
            }
            RecordingState::CountDown(_) => {}
        }
    }

    /// Closest user point to the current reference position.
    pub fn closest(&self) -> Closest {
        let values = self.render.render_values();
        let pos = values.vector("refPosition").unwrap_or(Point::ORIGIN);
        closest_to(&values, pos)
    }

    /// Applies a widget interaction.
    pub fn interact(&mut self, id: &str, input: ControlInput) -> Result<()> {
        let action = self.panel.borrow_mut().interact(id, input)?;
        match action {
            Some(ControlAction::Update(update)) => self.render.update(update),
            Some(ControlAction::Viewport(max_y)) => self.render.set_max_y(max_y),
            None => {}
        }
        Ok(())
    }

    pub fn handle(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerMove { x, y } => {
                let pos = self.to_world(|rect, measures, snap| {
                    pointer_to_world(rect, measures, snap, x, y)
                });
                self.render.update(ValueUpdate::single("refPosition", pos));
            }
            InputEvent::Touch { touches } => {
                let pos = self.to_world(|rect, measures, snap| {
                    touch_to_world(rect, measures, snap, &touches)
                });
                self.render.update(ValueUpdate::single("refPosition", pos));
            }
            InputEvent::Click { x, y } => {
                let pos = self.to_world(|rect, measures, snap| {
                    pointer_to_world(rect, measures, snap, x, y)
                });
                self.click(pos);
            }
            InputEvent::KeyDown { text_target: true, .. }
            | InputEvent::KeyUp { text_target: true, .. } => {}
            InputEvent::KeyDown { key, .. } => self.key_down(key),
            InputEvent::KeyUp { key: Key::Shift, .. } => {
                self.render.update(ValueUpdate::single("areaMode", false));
            }
            InputEvent::KeyUp { .. } => {}
        }
    }

    fn to_world(
        &self,
        convert: impl FnOnce(&SurfaceRect, &Measures, bool) -> Point,
    ) -> Point {
        let snap = self
            .render
            .render_values()
            .bool("showGrid")
            .unwrap_or(false);
        let rect = self
            .surface
            .unwrap_or_else(|| SurfaceRect::from_viewport(&self.render.viewport()));
        convert(&rect, &self.render.measures(), snap)
    }

    /// Adds a point at `pos`, or in area mode removes the point closest to it.
    fn click(&mut self, pos: Point) {
        let values = self.render.render_values();
        let mut points = PointSet::from(values.points("points").unwrap_or_default().to_vec());
        if values.bool("areaMode").unwrap_or(false) {
            if let Some(ix) = closest_to(&values, pos).index {
                points.remove(ix);
            }
        } else if !points.try_push(pos) {
            tracing::debug!("point limit reached");
        }
        self.render.update(
            ValueUpdate::new()
                .set("points", points)
                .set("refPosition", pos),
        );
    }

    fn key_down(&mut self, key: Key) {
        match key {
            Key::Digit(ix) => {
                let ix = usize::from(ix);
                if (1..=self.settings.metrics.len()).contains(&ix) {
                    let metric = self.settings.metrics[ix - 1];
                    self.render
                        .update(ValueUpdate::single("distanceFn", metric.index()));
                }
            }
            Key::Shift => self.render.update(ValueUpdate::single("areaMode", true)),
            Key::Char('s') => self.render.snapshot(),
            Key::Char('j') => {
                self.render.start_recording();
            }
            Key::Char('k') => {
                self.render.stop_recording();
            }
            Key::Char(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        control::{WidgetState, VIEWPORT_CONTROL},
        render::HeadlessBackend,
    };

    fn scene(settings: SceneSettings) -> Searchspace<HeadlessBackend> {
        let config = AppConfig {
            scene: settings,
            ..AppConfig::default()
        };
        let mut scene = Searchspace::new(
            HeadlessBackend::new(),
            config,
            ImageData::filled(2, 2, [255; 4]),
        )
        .unwrap();
        scene.start();
        scene
    }

    fn key(key: Key) -> InputEvent {
        InputEvent::KeyDown {
            key,
            text_target: false,
        }
    }

    fn values(scene: &Searchspace<HeadlessBackend>) -> RenderValues {
        scene.render().render_values()
    }

    #[test]
    fn precision_pads_non_negative_numbers() {
        assert_eq!(precision(1.5, 2), "\u{a0}1.50");
        assert_eq!(precision(-0.25, 3), "-0.250");
        assert_eq!(precision(-0.0, 1), "\u{a0}0.0");
    }

    #[test]
    fn start_registers_values_and_reports_status() {
        let scene = scene(SceneSettings::default());
        assert_eq!(scene.render().frames_drawn(), 1);
        assert_eq!(scene.render().store().defs().len(), 13);
        assert!(scene.diagnostics().is_empty());
        assert_eq!(
            scene.status(),
            &["Dist:\u{a0}1.02530 Pos: \u{a0}0.01000 \u{a0}0.01000".to_string()]
        );

        let drawn = scene.render().last_values().unwrap();
        assert_eq!(drawn.points("outline").map(<[Point]>::len), Some(5));
        assert!(drawn.scalar("outlineScale").unwrap() > 0.0);
    }

    #[test]
    fn digit_keys_pick_offered_metrics() {
        let mut scene = scene(SceneSettings::preset("adjusted-dot").unwrap());
        scene.handle(key(Key::Digit(1)));
        assert_eq!(values(&scene).index("distanceFn"), Some(Metric::Dot.index()));

        let drawn = scene.render().frames_drawn();
        scene.handle(key(Key::Digit(3)));
        scene.handle(key(Key::Digit(0)));
        scene.handle(InputEvent::KeyDown {
            key: Key::Digit(2),
            text_target: true,
        });
        assert_eq!(scene.render().frames_drawn(), drawn);
        assert_eq!(values(&scene).index("distanceFn"), Some(Metric::Dot.index()));
    }

    #[test]
    fn shift_toggles_area_mode_and_monitored_control() {
        let mut scene = scene(SceneSettings::default());
        scene.handle(key(Key::Shift));
        assert_eq!(values(&scene).bool("areaMode"), Some(true));
        assert_eq!(
            scene.panel().control("value_areaMode").unwrap().state(),
            &WidgetState::Toggle(true)
        );
        scene.handle(InputEvent::KeyUp {
            key: Key::Shift,
            text_target: false,
        });
        assert_eq!(values(&scene).bool("areaMode"), Some(false));
    }

    #[test]
    fn clicks_add_then_remove_points() {
        let mut scene = scene(SceneSettings::default());
        scene.handle(InputEvent::Click { x: 400.0, y: 300.0 });
        let points = values(&scene).points("points").unwrap().to_vec();
        assert_eq!(points.len(), 7);
        assert_eq!(points[6], Point::ORIGIN);
        assert_eq!(values(&scene).vector("refPosition"), Some(Point::ORIGIN));

        scene.handle(key(Key::Shift));
        scene.handle(InputEvent::Click { x: 400.0, y: 300.0 });
        let points = values(&scene).points("points").unwrap().to_vec();
        assert_eq!(points, SceneSettings::default().points);
    }

    #[test]
    fn clicks_stop_adding_at_capacity() {
        let settings = SceneSettings {
            points: (0..36).map(|ix| Point::new(ix as f64 * 0.01, 0.5)).collect(),
            ..SceneSettings::default()
        };
        let mut scene = scene(settings);
        scene.handle(InputEvent::Click { x: 10.0, y: 10.0 });
        assert_eq!(values(&scene).points("points").map(<[Point]>::len), Some(36));
    }

    #[test]
    fn grid_toggle_snaps_pointer() {
        let mut scene = scene(SceneSettings::default());
        scene
            .interact("value_showGrid", ControlInput::Toggle(true))
            .unwrap();
        scene.handle(InputEvent::PointerMove { x: 418.0, y: 286.0 });
        let pos = values(&scene).vector("refPosition").unwrap();
        assert!((pos.x - 0.1).abs() < 1e-9 && (pos.y - 0.1).abs() < 1e-9);
    }

    #[test]
    fn pointer_positions_are_relative_to_the_surface_rect() {
        let mut scene = scene(SceneSettings::default());
        scene.set_surface_rect(SurfaceRect {
            left: 100.0,
            top: 50.0,
            width: 400.0,
            height: 300.0,
        });
        scene.handle(InputEvent::Click { x: 300.0, y: 200.0 });
        assert_eq!(values(&scene).vector("refPosition"), Some(Point::ORIGIN));

        scene.handle(InputEvent::PointerMove { x: 100.0, y: 50.0 });
        let corner = values(&scene).vector("refPosition").unwrap();
        let measures = scene.render().measures();
        assert!((corner.x + measures.max_x).abs() < 1e-9);
        assert!((corner.y - measures.max_y).abs() < 1e-9);
    }

    #[test]
    fn view_control_reinitialises_loop() {
        let mut scene = scene(SceneSettings::default());
        scene
            .interact(VIEWPORT_CONTROL, ControlInput::Slide(2.0))
            .unwrap();
        assert_eq!(scene.render().viewport().max_y, 2.0);
        assert_eq!(scene.render().measures().max_y, 2.0);
        assert_eq!(scene.render().frames_drawn(), 2);
    }

    #[test]
    fn overlay_controls_follow_settings() {
        let scene = scene(SceneSettings::preset("l1-l2").unwrap());
        let panel = scene.panel();
        assert!(panel.control("value_distanceFn").is_some());
        assert!(panel.control("value_unitCircle").is_none());
        assert!(panel.control("value_convexHull").is_none());
        drop(panel);

        let single = scene_with_single_metric();
        assert!(single.panel().control("value_distanceFn").is_none());
    }

    fn scene_with_single_metric() -> Searchspace<HeadlessBackend> {
        scene(SceneSettings {
            metrics: vec![Metric::L2],
            ..SceneSettings::default()
        })
    }

    #[test]
    fn recording_shows_cursor_in_area_mode() {
        let mut scene = scene(SceneSettings::default());
        scene.handle(key(Key::Shift));
        scene.handle(key(Key::Char('j')));
        assert_eq!(scene.recording_state(), RecordingState::CountDown(3));
        scene.tick(Duration::from_secs(3));
        assert_eq!(scene.recording_state(), RecordingState::IsRecording);

        let drawn = scene.render().last_values().unwrap();
        assert_eq!(drawn.bool("showCursor"), Some(true));
        assert_eq!(values(&scene).bool("showCursor"), Some(true));
        assert_eq!(
            scene.render().store().get("showCursor"),
            Some(&crate::values::Value::Bool(false))
        );

        scene.toggle_recording();
        assert!(matches!(
            scene.take_artifacts().as_slice(),
            [Artifact::Recording(recording)] if !recording.frames.is_empty()
        ));
    }

    #[test]
    fn save_key_queues_snapshot() {
        let mut scene = scene(SceneSettings::default());
        scene.handle(key(Key::Char('s')));
        assert!(matches!(
            scene.take_artifacts().as_slice(),
            [Artifact::Snapshot(frame)] if frame.width == 800
        ));
    }

    #[test]
    fn adjusted_dot_uses_hull_frame() {
        let scene = scene(SceneSettings::preset("adjusted-dot").unwrap());
        let values = values(&scene);
        let frame = hull_frame(&values);
        assert_ne!(frame.centroid, Point::ORIGIN);
        let closest = scene.closest();
        assert!(closest.index.is_some());
        assert_eq!(scene.status().len(), 1);
    }
}
