//! Redraw scheduling.
//!
//! [`RenderLoop`] owns everything a redraw touches: the value store, the
//! backend, the lifecycle progress, the coalescing flags, the recorder and the
//! diagnostics surface. Hosts feed it value updates and call [`RenderLoop::tick`]
//! once per animation frame.
//!
//! At most one draw is in flight. A draw stays in flight across ticks while the
//! backend program is still compiling; requests that arrive meanwhile collapse
//! into a single trailing redraw on a later tick.

mod lifecycle;

use std::time::Duration;

use crate::{
    diagnostics::Diagnostics,
    record::{Artifact, Recorder, RecordingSettings, RecordingState},
    render::{upload_for, Measures, ProgramStatus, RenderBackend, Viewport},
    values::{RenderValues, Value, ValueKind, ValueStore, ValueUpdate},
    Result, SearchspaceError,
};

pub use lifecycle::{Phase, Setup, SetupHook};

use lifecycle::Lifecycle;

/// Observation hook run after every draw.
pub type PostrenderHook = Box<dyn FnMut(&RenderValues)>;

/// Status line producer run after every draw.
pub type StatusHook = Box<dyn Fn(&RenderValues) -> String>;

/// Completion callback passed to [`RenderLoop::repaint`].
pub type OnDone<B> = Box<dyn FnOnce(&mut DrawContext<'_, B>) -> Result<()>>;

/// Coarse view of the scheduling flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Drawing,
    DrawingWithPendingRepaint,
    DrawingWithPendingFullRepaint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Everything registered by setup hooks: the store and the observers.
#[derive(Default)]
pub struct Registry {
    pub(crate) store: ValueStore,
    postrender: Vec<PostrenderHook>,
    status: Vec<StatusHook>,
}

impl Registry {
    pub fn store(&self) -> &ValueStore {
        &self.store
    }

    pub fn add_value(
        &mut self,
        name: impl Into<String>,
        binding: impl Into<String>,
        kind: ValueKind,
        initial: impl Into<Value>,
    ) {
        self.store.register(name, binding, kind, initial);
    }

    pub fn add_prerender_hook(&mut self, hook: impl Fn(RenderValues) -> RenderValues + 'static) {
        self.store.add_prerender_hook(hook);
    }

    pub fn add_postrender_hook(&mut self, hook: impl FnMut(&RenderValues) + 'static) {
        self.postrender.push(Box::new(hook));
    }

    pub fn add_status(&mut self, hook: impl Fn(&RenderValues) -> String + 'static) {
        self.status.push(Box::new(hook));
    }
}

/// Requests raised from inside a draw. They are applied once the draw has
/// finished but before the loop leaves the drawing state, so they always
/// coalesce into the next tick.
#[derive(Debug, Default)]
struct Requests {
    updates: Vec<ValueUpdate>,
    repaint: bool,
}

/// Access granted to a completion callback.
pub struct DrawContext<'a, B> {
    backend: &'a mut B,
    recorder: &'a mut Recorder,
    artifacts: &'a mut Vec<Artifact>,
    requests: &'a mut Requests,
    values: &'a RenderValues,
}

impl<B: RenderBackend> DrawContext<'_, B> {
    pub fn backend(&mut self) -> &mut B {
        self.backend
    }

    /// Render values of the frame that was just drawn.
    pub fn values(&self) -> &RenderValues {
        self.values
    }

    /// Reads back the drawn frame and queues it as a still image.
    pub fn capture_snapshot(&mut self) -> Result<()> {
        let frame = self.backend.read_frame()?;
        self.artifacts.push(Artifact::Snapshot(frame));
        Ok(())
    }

    /// Flushes the running recording, if any, into the artifact queue.
    pub fn finish_recording(&mut self) {
        if let Some(recording) = self.recorder.finish() {
            self.artifacts.push(Artifact::Recording(recording));
        }
    }

    pub fn request_update(&mut self, update: ValueUpdate) {
        self.requests.updates.push(update);
    }

    pub fn request_repaint(&mut self) {
        self.requests.repaint = true;
    }
}

enum Scheduled<B> {
    Repaint(Option<OnDone<B>>),
    FullRepaint(Option<OnDone<B>>),
    Clear,
}

#[derive(Debug, Default)]
struct Flags {
    drawing: bool,
    pending_repaint: bool,
    pending_full_repaint: bool,
    pending_clear: bool,
}

pub struct RenderLoop<B: RenderBackend> {
    backend: B,
    registry: Registry,
    lifecycle: Lifecycle,
    flags: Flags,
    visibility: Visibility,
    viewport: Viewport,
    measures: Option<Measures>,
    scheduled: Vec<Scheduled<B>>,
    /// Completion callback of a draw waiting for initialisation.
    in_flight: Option<Option<OnDone<B>>>,
    recorder: Recorder,
    diagnostics: Diagnostics,
    status: Vec<String>,
    last_values: Option<RenderValues>,
    artifacts: Vec<Artifact>,
    frames_drawn: u64,
}

impl<B: RenderBackend + 'static> RenderLoop<B> {
    pub fn new(backend: B, viewport: Viewport, recording: RecordingSettings) -> Self {
        Self {
            backend,
            registry: Registry::default(),
            lifecycle: Lifecycle::default(),
            flags: Flags::default(),
            visibility: Visibility::Visible,
            viewport,
            measures: None,
            scheduled: Vec::new(),
            in_flight: None,
            recorder: Recorder::new(recording),
            diagnostics: Diagnostics::new(),
            status: Vec::new(),
            last_values: None,
            artifacts: Vec::new(),
            frames_drawn: 0,
        }
    }

    /// Registers the hook for a lifecycle phase that accepts one.
    pub fn on_setup(
        &mut self,
        phase: Phase,
        hook: impl FnOnce(&mut Setup<'_>) -> Result<()> + 'static,
    ) -> Result<()> {
        self.lifecycle.register(phase, Box::new(hook))
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn store(&self) -> &ValueStore {
        &self.registry.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Status lines produced by the last draw.
    pub fn status(&self) -> &[String] {
        &self.status
    }

    /// Render values of the last draw.
    pub fn last_values(&self) -> Option<&RenderValues> {
        self.last_values.as_ref()
    }

    /// Fresh render copy of the current store.
    pub fn render_values(&self) -> RenderValues {
        self.registry.store.snapshot(self.recorder.is_recording())
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Measures of the current program, or derived from the viewport when no
    /// program exists yet.
    pub fn measures(&self) -> Measures {
        self.measures
            .unwrap_or_else(|| Measures::compute(&self.viewport))
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn is_drawing(&self) -> bool {
        self.flags.drawing
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        if !self.flags.drawing {
            SchedulerState::Idle
        } else if self.flags.pending_full_repaint {
            SchedulerState::DrawingWithPendingFullRepaint
        } else if self.flags.pending_repaint {
            SchedulerState::DrawingWithPendingRepaint
        } else {
            SchedulerState::Drawing
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn recording_state(&self) -> RecordingState {
        self.recorder.state()
    }

    pub fn recording_overlay(&self) -> Option<String> {
        self.recorder.overlay_text()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn take_artifacts(&mut self) -> Vec<Artifact> {
        std::mem::take(&mut self.artifacts)
    }

    /// Reports a problem on the diagnostics surface.
    pub fn report(&mut self, message: impl std::fmt::Display) {
        self.diagnostics.report(message);
    }

    /// Merges `update` into the store and requests one redraw.
    pub fn update(&mut self, update: ValueUpdate) {
        tracing::trace!(keys = ?update.keys().collect::<Vec<_>>(), "value update");
        for key in self.registry.store.update(update) {
            self.diagnostics.report(format!("unknown value key: {key}"));
        }
        self.repaint(None);
    }

    /// Requests a redraw.
    ///
    /// Dropped while hidden. While a draw is in flight the request is
    /// coalesced into one redraw on a later tick, except that every request
    /// carrying `on_done` is kept so its callback runs.
    pub fn repaint(&mut self, on_done: Option<OnDone<B>>) {
        if self.visibility == Visibility::Hidden {
            tracing::debug!("repaint dropped while hidden");
            return;
        }
        if self.flags.drawing {
            if !self.flags.pending_repaint || on_done.is_some() {
                self.scheduled.push(Scheduled::Repaint(on_done));
                self.flags.pending_repaint = true;
            }
            return;
        }
        if self.lifecycle.program_failed() {
            tracing::debug!("repaint skipped, program failed to initialize");
            return;
        }

        self.flags.drawing = true;
        if self.lifecycle.is_ready() {
            let result = self.draw_frame(on_done);
            self.finish(result);
        } else {
            self.in_flight = Some(on_done);
            self.advance_init();
        }
    }

    /// Discards the program and derived measures, then redraws from scratch.
    pub fn full_repaint(&mut self, on_done: Option<OnDone<B>>) {
        if self.flags.drawing {
            if !self.flags.pending_full_repaint || on_done.is_some() {
                self.scheduled.push(Scheduled::FullRepaint(on_done));
                self.flags.pending_full_repaint = true;
            }
            return;
        }
        self.discard_program();
        self.repaint(on_done);
    }

    /// Changes the visible world extent and reinitialises.
    pub fn set_max_y(&mut self, max_y: f64) {
        self.viewport.max_y = max_y;
        self.full_repaint(None);
    }

    /// Hiding releases GPU resources; becoming visible redraws once.
    pub fn set_hidden(&mut self, hidden: bool) {
        let visibility = if hidden {
            Visibility::Hidden
        } else {
            Visibility::Visible
        };
        if self.visibility == visibility {
            return;
        }
        self.visibility = visibility;
        tracing::debug!(?visibility, "visibility changed");
        match visibility {
            Visibility::Hidden => self.clear(),
            Visibility::Visible => self.repaint(None),
        }
    }

    fn clear(&mut self) {
        if self.flags.drawing {
            if !self.flags.pending_clear {
                self.scheduled.push(Scheduled::Clear);
                self.flags.pending_clear = true;
            }
            return;
        }
        self.discard_program();
    }

    /// Draws once and queues the frame as a still image.
    pub fn snapshot(&mut self) {
        self.repaint(Some(Box::new(|ctx: &mut DrawContext<'_, B>| {
            ctx.capture_snapshot()
        })));
    }

    /// Starts the recording countdown. Ignored unless idle.
    pub fn start_recording(&mut self) -> bool {
        if !self.recorder.start() {
            return false;
        }
        tracing::info!(state = ?self.recorder.state(), "recording requested");
        if self.recorder.is_recording() {
            self.repaint(None);
        }
        true
    }

    /// Stops a running recording after one final frame. Ignored unless
    /// recording.
    pub fn stop_recording(&mut self) -> bool {
        if !self.recorder.is_recording() {
            return false;
        }
        if self.visibility == Visibility::Hidden || self.lifecycle.program_failed() {
            if let Some(recording) = self.recorder.finish() {
                self.artifacts.push(Artifact::Recording(recording));
            }
        } else {
            self.repaint(Some(Box::new(|ctx: &mut DrawContext<'_, B>| {
                ctx.finish_recording();
                Ok(())
            })));
        }
        true
    }

    /// Advances time by `dt` and runs one animation tick: recording countdown,
    /// pending initialisation, then every request deferred before this tick.
    pub fn tick(&mut self, dt: Duration) {
        let due = std::mem::take(&mut self.scheduled);
        if self.recorder.advance(dt) {
            self.repaint(None);
        }
        if self.in_flight.is_some() {
            self.advance_init();
        }
        for task in due {
            match task {
                Scheduled::Repaint(on_done) => {
                    self.flags.pending_repaint = false;
                    self.repaint(on_done);
                }
                Scheduled::FullRepaint(on_done) => {
                    self.flags.pending_full_repaint = false;
                    self.full_repaint(on_done);
                }
                Scheduled::Clear => {
                    self.flags.pending_clear = false;
                    self.clear();
                }
            }
        }
    }

    fn discard_program(&mut self) {
        if self.lifecycle.has_program() {
            self.backend.release();
        }
        self.lifecycle.reset_program();
        self.measures = None;
    }

    fn advance_init(&mut self) {
        match self.run_init() {
            Ok(ProgramStatus::Pending) => {
                tracing::debug!("waiting for backend program");
            }
            Ok(ProgramStatus::Ready) => {
                let on_done = self.in_flight.take().flatten();
                let result = self.draw_frame(on_done);
                self.finish(result);
            }
            Err(err) => {
                self.in_flight = None;
                self.finish(Err(err));
            }
        }
    }

    /// Walks the initialisation phases that have not completed yet.
    fn run_init(&mut self) -> Result<ProgramStatus> {
        for phase in Phase::INIT {
            if self.lifecycle.is_done(phase) {
                continue;
            }
            match phase {
                Phase::BeforeSurface | Phase::AfterSurface => {
                    if let Some(hook) = self.lifecycle.take_hook(phase)? {
                        let mut setup = Setup::new(&mut self.registry, &self.viewport);
                        hook(&mut setup)?;
                    }
                }
                Phase::AcquireSurface => self.backend.acquire_surface(&self.viewport)?,
                Phase::InitProgram => match self.backend.poll_program() {
                    Ok(ProgramStatus::Pending) => return Ok(ProgramStatus::Pending),
                    Ok(ProgramStatus::Ready) => {
                        self.measures = Some(Measures::compute(&self.viewport));
                        tracing::info!("backend program ready");
                    }
                    Err(err) => {
                        self.lifecycle.mark_program_failed();
                        return Err(err);
                    }
                },
                Phase::SetupScene => self.backend.bind_values(self.registry.store.defs())?,
                Phase::Draw => {}
            }
            self.lifecycle.mark_done(phase);
        }
        Ok(ProgramStatus::Ready)
    }

    fn draw_frame(&mut self, on_done: Option<OnDone<B>>) -> Result<()> {
        let measures = self
            .measures
            .ok_or_else(|| SearchspaceError::Lifecycle("measures are not initialized".into()))?;
        let values = self.render_values();

        self.backend.begin_frame(&measures)?;
        for def in self.registry.store.defs() {
            let Some(value) = values.get(&def.name) else {
                self.diagnostics
                    .report(format!("no content for value {}", def.name));
                continue;
            };
            match upload_for(def, value) {
                Some(upload) => self.backend.upload(&def.binding, upload)?,
                None => {
                    self.diagnostics.report(format!(
                        "unsupported content for {} value {}",
                        def.kind.label(),
                        def.name
                    ));
                }
            }
        }
        self.backend.draw()?;
        self.frames_drawn += 1;

        if self.recorder.is_recording() {
            let frame = self.backend.read_frame()?;
            self.recorder.capture(frame);
        }
        for hook in &mut self.registry.postrender {
            hook(&values);
        }
        self.status = self.registry.status.iter().map(|hook| hook(&values)).collect();

        let mut requests = Requests::default();
        let outcome = match on_done {
            Some(on_done) => {
                let mut ctx = DrawContext {
                    backend: &mut self.backend,
                    recorder: &mut self.recorder,
                    artifacts: &mut self.artifacts,
                    requests: &mut requests,
                    values: &values,
                };
                on_done(&mut ctx)
            }
            None => Ok(()),
        };
        self.last_values = Some(values);

        for update in requests.updates {
            self.update(update);
        }
        if requests.repaint {
            self.repaint(None);
        }
        outcome
    }

    fn finish(&mut self, result: Result<()>) {
        self.flags.drawing = false;
        if let Err(err) = result {
            tracing::error!(%err, "draw failed");
            self.diagnostics.report(err);
        }
    }
}

impl<B: RenderBackend + std::fmt::Debug + 'static> std::fmt::Debug for RenderLoop<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderLoop")
            .field("backend", &self.backend)
            .field("store", &self.registry.store)
            .field("state", &self.scheduler_state())
            .field("visibility", &self.visibility)
            .field("recording", &self.recorder.state())
            .field("frames_drawn", &self.frames_drawn)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;
    use crate::{
        geometry::Point,
        render::{BackendCall, HeadlessBackend, RecordedUpload},
    };

    type Loop = RenderLoop<HeadlessBackend>;

    fn frame() -> Duration {
        Duration::from_millis(16)
    }

    fn build(backend: HeadlessBackend) -> Loop {
        let mut render = RenderLoop::new(
            backend,
            Viewport {
                width: 8,
                height: 6,
                max_y: 1.0,
            },
            RecordingSettings::default(),
        );
        render
            .on_setup(Phase::BeforeSurface, |setup| {
                setup.add_value("flag", "uFlag", ValueKind::Boolean, false);
                setup.add_value(
                    "points",
                    "uPoints",
                    ValueKind::PointArray,
                    vec![Point::new(0.5, 0.5)],
                );
                setup.add_prerender_hook(|mut values| {
                    let recording = values.is_recording();
                    values.set("recording", recording);
                    values
                });
                Ok(())
            })
            .unwrap();
        render
    }

    fn polls(render: &Loop) -> usize {
        render
            .backend()
            .calls()
            .iter()
            .filter(|call| matches!(call, BackendCall::PollProgram(_)))
            .count()
    }

    #[test]
    fn first_repaint_walks_the_lifecycle() {
        let mut render = build(HeadlessBackend::new());
        render.repaint(None);

        assert_eq!(render.frames_drawn(), 1);
        assert_eq!(render.scheduler_state(), SchedulerState::Idle);
        assert_eq!(
            render.backend().calls(),
            &[
                BackendCall::AcquireSurface,
                BackendCall::PollProgram(ProgramStatus::Ready),
                BackendCall::BindValues(2),
                BackendCall::BeginFrame,
                BackendCall::Upload("uFlag".into()),
                BackendCall::Upload("uPoints".into()),
                BackendCall::Draw,
            ]
        );
        assert_eq!(
            render.backend().last_upload("uPoints"),
            Some(&RecordedUpload::Points { side: 1, count: 1 })
        );
        assert!(render.diagnostics().is_empty());
    }

    #[test]
    fn missing_required_hook_is_reported() {
        let mut render = RenderLoop::new(
            HeadlessBackend::new(),
            Viewport {
                width: 1,
                height: 1,
                max_y: 1.0,
            },
            RecordingSettings::default(),
        );
        render.repaint(None);

        assert_eq!(render.frames_drawn(), 0);
        assert!(!render.is_drawing());
        assert_eq!(render.diagnostics().count_matching("before-surface"), 1);
    }

    #[test]
    fn setup_hooks_are_validated_on_registration() {
        let mut render = build(HeadlessBackend::new());
        assert!(render.on_setup(Phase::BeforeSurface, |_| Ok(())).is_err());
        assert!(render.on_setup(Phase::InitProgram, |_| Ok(())).is_err());
        assert!(render.on_setup(Phase::AfterSurface, |_| Ok(())).is_ok());
    }

    #[test]
    fn after_surface_hook_runs_once_program_is_ready() {
        let mut render = build(HeadlessBackend::new().with_compile_latency(1));
        render
            .on_setup(Phase::AfterSurface, |setup| {
                setup.add_value("late", "uLate", ValueKind::Scalar, 2.0);
                Ok(())
            })
            .unwrap();

        render.repaint(None);
        assert!(!render.store().is_registered("late"));
        render.tick(frame());
        assert!(render.store().is_registered("late"));
        assert_eq!(
            render.backend().last_upload("uLate"),
            Some(&RecordedUpload::Float(2.0))
        );
    }

    #[test]
    fn repaints_during_initialisation_coalesce() {
        let mut render = build(HeadlessBackend::new().with_compile_latency(2));
        render.repaint(None);
        assert!(render.is_drawing());

        render.repaint(None);
        render.repaint(None);
        assert_eq!(
            render.scheduler_state(),
            SchedulerState::DrawingWithPendingRepaint
        );

        for _ in 0..5 {
            render.tick(frame());
        }
        assert_eq!(render.frames_drawn(), 2);
        assert_eq!(render.backend().draws(), 2);
        assert_eq!(render.scheduler_state(), SchedulerState::Idle);
    }

    #[test]
    fn updates_during_initialisation_keep_last_write() {
        let mut render = build(HeadlessBackend::new().with_compile_latency(1));
        render.repaint(None);
        for ix in 0..4 {
            render.update(ValueUpdate::single("flag", ix % 2 == 0));
        }
        for _ in 0..3 {
            render.tick(frame());
        }
        assert_eq!(render.frames_drawn(), 2);
        assert_eq!(render.store().get("flag"), Some(&Value::Bool(false)));
        assert_eq!(
            render.backend().last_upload("uFlag"),
            Some(&RecordedUpload::Int(0))
        );
    }

    #[test]
    fn repaints_requested_inside_a_draw_add_one_redraw() {
        let mut render = build(HeadlessBackend::new());
        render.repaint(None);
        assert_eq!(render.frames_drawn(), 1);

        render.repaint(Some(Box::new(|ctx: &mut DrawContext<'_, HeadlessBackend>| {
            ctx.request_repaint();
            ctx.request_update(ValueUpdate::single("flag", true));
            Ok(())
        })));
        assert_eq!(render.frames_drawn(), 2);
        assert_eq!(render.scheduler_state(), SchedulerState::Idle);

        render.tick(frame());
        render.tick(frame());
        assert_eq!(render.frames_drawn(), 3);
        assert_eq!(render.store().get("flag"), Some(&Value::Bool(true)));
    }

    #[test]
    fn every_completion_callback_fires() {
        let mut render = build(HeadlessBackend::new().with_compile_latency(1));
        let fired = Rc::new(Cell::new(0));
        render.repaint(None);
        for _ in 0..2 {
            let fired = Rc::clone(&fired);
            render.repaint(Some(Box::new(
                move |_: &mut DrawContext<'_, HeadlessBackend>| {
                    fired.set(fired.get() + 1);
                    Ok(())
                },
            )));
        }
        render.tick(frame());
        assert_eq!(fired.get(), 2);
        assert_eq!(render.frames_drawn(), 3);
    }

    #[test]
    fn hidden_updates_collapse_into_one_redraw() {
        let mut render = build(HeadlessBackend::new());
        render.repaint(None);
        render.set_hidden(true);
        assert_eq!(render.visibility(), Visibility::Hidden);
        assert!(render.backend().calls().contains(&BackendCall::Release));

        for _ in 0..5 {
            render.update(ValueUpdate::single("flag", true));
            render.tick(frame());
        }
        assert_eq!(render.frames_drawn(), 1);

        render.set_hidden(false);
        render.tick(frame());
        render.tick(frame());
        assert_eq!(render.frames_drawn(), 2);
        assert_eq!(polls(&render), 2);
        assert_eq!(
            render.backend().last_upload("uFlag"),
            Some(&RecordedUpload::Int(1))
        );
    }

    #[test]
    fn unknown_keys_warn_then_write() {
        let mut render = build(HeadlessBackend::new());
        render.repaint(None);
        render.update(ValueUpdate::single("bogus", 1.0));

        assert_eq!(render.diagnostics().count_matching("unknown value key: bogus"), 1);
        assert_eq!(render.store().get("bogus"), Some(&Value::Scalar(1.0)));
        assert_eq!(render.frames_drawn(), 2);
        assert_eq!(
            render.last_values().and_then(|values| values.scalar("bogus")),
            Some(1.0)
        );
    }

    #[test]
    fn link_failure_blocks_drawing_until_reinitialised() {
        let mut render = build(HeadlessBackend::new().with_link_error("ERROR: 0:12 syntax error"));
        render.repaint(None);

        assert_eq!(render.frames_drawn(), 0);
        assert!(!render.is_drawing());
        assert_eq!(render.diagnostics().count_matching("ERROR: 0:12 syntax error"), 1);

        render.repaint(None);
        render.update(ValueUpdate::single("flag", true));
        assert_eq!(render.frames_drawn(), 0);
        assert_eq!(render.diagnostics().lines().len(), 2);

        render.backend_mut().clear_link_error();
        render.full_repaint(None);
        assert_eq!(render.frames_drawn(), 1);
    }

    #[test]
    fn missing_surface_returns_early() {
        let mut render = build(HeadlessBackend::new().without_surface());
        render.repaint(None);
        assert_eq!(render.frames_drawn(), 0);
        assert!(!render.is_drawing());
        assert_eq!(
            render
                .diagnostics()
                .count_matching("unable to acquire rendering surface"),
            1
        );
    }

    #[test]
    fn full_repaint_rebuilds_program_and_measures() {
        let mut render = build(HeadlessBackend::new());
        render.repaint(None);
        render.set_max_y(2.5);

        assert_eq!(render.frames_drawn(), 2);
        assert_eq!(polls(&render), 2);
        assert!(render.backend().calls().contains(&BackendCall::Release));
        assert_eq!(render.measures().max_y, 2.5);
    }

    #[test]
    fn full_repaints_during_initialisation_coalesce() {
        let mut render = build(HeadlessBackend::new().with_compile_latency(1));
        render.repaint(None);
        render.full_repaint(None);
        render.full_repaint(None);
        assert_eq!(
            render.scheduler_state(),
            SchedulerState::DrawingWithPendingFullRepaint
        );

        for _ in 0..4 {
            render.tick(frame());
        }
        assert_eq!(render.frames_drawn(), 2);
    }

    #[test]
    fn snapshot_queues_a_still_frame() {
        let mut render = build(HeadlessBackend::new());
        render.snapshot();
        let artifacts = render.take_artifacts();
        assert_eq!(artifacts.len(), 1);
        match &artifacts[0] {
            Artifact::Snapshot(frame) => assert_eq!((frame.width, frame.height), (8, 6)),
            other => panic!("unexpected artifact {other:?}"),
        }
    }

    #[test]
    fn recording_counts_down_captures_and_flushes() {
        let mut render = build(HeadlessBackend::new());
        render.repaint(None);
        assert!(!render.stop_recording());

        assert!(render.start_recording());
        assert!(!render.start_recording());
        assert_eq!(render.recording_state(), RecordingState::CountDown(3));
        assert_eq!(render.recording_overlay().as_deref(), Some("3"));

        render.tick(Duration::from_secs(1));
        render.tick(Duration::from_secs(1));
        assert_eq!(render.recording_state(), RecordingState::CountDown(1));
        render.tick(Duration::from_secs(1));
        assert!(render.is_recording());
        assert_eq!(render.last_values().and_then(|v| v.bool("recording")), Some(true));

        render.update(ValueUpdate::single("flag", true));
        assert!(render.stop_recording());
        assert_eq!(render.recording_state(), RecordingState::NoRecording);

        let artifacts = render.take_artifacts();
        match artifacts.as_slice() {
            [Artifact::Recording(recording)] => assert_eq!(recording.frames.len(), 3),
            other => panic!("unexpected artifacts {other:?}"),
        }
    }

    #[test]
    fn stopping_while_hidden_flushes_immediately() {
        let mut render = build(HeadlessBackend::new());
        render.start_recording();
        render.tick(Duration::from_secs(3));
        assert!(render.is_recording());

        render.set_hidden(true);
        assert!(render.stop_recording());
        assert!(matches!(
            render.take_artifacts().as_slice(),
            [Artifact::Recording(_)]
        ));
    }

    #[test]
    fn observers_run_after_each_draw() {
        let mut render = build(HeadlessBackend::new());
        let seen = Rc::new(Cell::new(0));
        let observed = Rc::clone(&seen);
        let registry = render.registry_mut();
        registry.add_postrender_hook(move |_| observed.set(observed.get() + 1));
        registry.add_status(|values| format!("flag={:?}", values.bool("flag")));

        render.repaint(None);
        render.update(ValueUpdate::single("flag", true));
        assert_eq!(seen.get(), 2);
        assert_eq!(render.status(), &["flag=Some(true)".to_string()]);
    }
}
