use std::ops::{Deref, DerefMut};

use super::Registry;
use crate::{render::Viewport, Result, SearchspaceError};

/// Ordered phases a redraw walks through. Phases that completed once are
/// skipped until something invalidates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Registers values, hooks and controls. A hook is required.
    BeforeSurface,
    AcquireSurface,
    /// Compiles and links the backend program; may take several ticks.
    InitProgram,
    /// Registers anything that needs the surface. The hook is optional.
    AfterSurface,
    /// Resolves binding locations for the registered values.
    SetupScene,
    Draw,
}

impl Phase {
    /// Phases that run before the first draw, in order.
    pub const INIT: [Phase; 5] = [
        Phase::BeforeSurface,
        Phase::AcquireSurface,
        Phase::InitProgram,
        Phase::AfterSurface,
        Phase::SetupScene,
    ];

    pub fn accepts_hook(self) -> bool {
        matches!(self, Phase::BeforeSurface | Phase::AfterSurface)
    }

    pub fn requires_hook(self) -> bool {
        matches!(self, Phase::BeforeSurface)
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::BeforeSurface => "before-surface",
            Phase::AcquireSurface => "acquire-surface",
            Phase::InitProgram => "init-program",
            Phase::AfterSurface => "after-surface",
            Phase::SetupScene => "setup-scene",
            Phase::Draw => "draw",
        }
    }
}

/// One-shot setup callback bound to a phase.
pub type SetupHook = Box<dyn FnOnce(&mut Setup<'_>) -> Result<()>>;

/// Handle given to setup hooks. Dereferences to the loop's [`Registry`].
pub struct Setup<'a> {
    registry: &'a mut Registry,
    viewport: Viewport,
}

impl<'a> Setup<'a> {
    pub(super) fn new(registry: &'a mut Registry, viewport: &Viewport) -> Self {
        Self {
            registry,
            viewport: *viewport,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }
}

impl Deref for Setup<'_> {
    type Target = Registry;

    fn deref(&self) -> &Registry {
        self.registry
    }
}

impl DerefMut for Setup<'_> {
    fn deref_mut(&mut self) -> &mut Registry {
        self.registry
    }
}

#[derive(Default)]
pub(super) struct Lifecycle {
    done: Vec<Phase>,
    hooks: Vec<(Phase, SetupHook)>,
    program_failed: bool,
}

impl Lifecycle {
    pub(super) fn register(&mut self, phase: Phase, hook: SetupHook) -> Result<()> {
        if !phase.accepts_hook() {
            return Err(SearchspaceError::Lifecycle(format!(
                "the {} phase does not take a setup hook",
                phase.label()
            )));
        }
        if self.is_done(phase) || self.hooks.iter().any(|(p, _)| *p == phase) {
            return Err(SearchspaceError::Lifecycle(format!(
                "a setup hook for the {} phase is already registered",
                phase.label()
            )));
        }
        self.hooks.push((phase, hook));
        Ok(())
    }

    /// Removes the hook for `phase`; a missing required hook is an error.
    pub(super) fn take_hook(&mut self, phase: Phase) -> Result<Option<SetupHook>> {
        let hook = self
            .hooks
            .iter()
            .position(|(p, _)| *p == phase)
            .map(|ix| self.hooks.remove(ix).1);
        if hook.is_none() && phase.requires_hook() {
            return Err(SearchspaceError::Lifecycle(format!(
                "no setup hook registered for the {} phase",
                phase.label()
            )));
        }
        Ok(hook)
    }

    pub(super) fn is_done(&self, phase: Phase) -> bool {
        self.done.contains(&phase)
    }

    pub(super) fn mark_done(&mut self, phase: Phase) {
        if !self.is_done(phase) {
            self.done.push(phase);
        }
    }

    pub(super) fn is_ready(&self) -> bool {
        Phase::INIT.iter().all(|phase| self.is_done(*phase))
    }

    pub(super) fn has_program(&self) -> bool {
        self.is_done(Phase::InitProgram)
    }

    pub(super) fn program_failed(&self) -> bool {
        self.program_failed
    }

    pub(super) fn mark_program_failed(&mut self) {
        self.program_failed = true;
    }

    /// Forgets the program so the next redraw compiles and binds again.
    pub(super) fn reset_program(&mut self) {
        self.done
            .retain(|phase| !matches!(phase, Phase::InitProgram | Phase::SetupScene));
        self.program_failed = false;
    }
}
