use std::collections::HashMap;

use super::{ImageData, Measures, ProgramStatus, RenderBackend, Upload, Viewport};
use crate::{values::ValueDef, Result, SearchspaceError};

const CLEAR_PIXEL: [u8; 4] = [0, 0, 0, 255];

/// Call log entry kept by [`HeadlessBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    AcquireSurface,
    PollProgram(ProgramStatus),
    BindValues(usize),
    BeginFrame,
    Upload(String),
    Draw,
    Release,
    ReadFrame,
}

/// Owned summary of the last upload made for a binding.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUpload {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Points { side: u32, count: u32 },
    Image { size: [f32; 2] },
}

impl From<&Upload<'_>> for RecordedUpload {
    fn from(value: &Upload<'_>) -> Self {
        match value {
            Upload::Int(v) => Self::Int(*v),
            Upload::Float(v) => Self::Float(*v),
            Upload::Vec2(v) => Self::Vec2(*v),
            Upload::Points(packed) => Self::Points {
                side: packed.side,
                count: packed.count,
            },
            Upload::Image { size, .. } => Self::Image { size: *size },
        }
    }
}

/// Backend without a GPU.
///
/// Frames are always the cleared background. Program compilation can be made
/// to take several polls or to fail, which lets the scheduler's slow path be
/// exercised without a graphics stack.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    calls: Vec<BackendCall>,
    uploads: HashMap<String, RecordedUpload>,
    surface: Option<Viewport>,
    program_ready: bool,
    compile_latency: u32,
    polls_left: u32,
    link_error: Option<String>,
    missing_surface: bool,
    draws: usize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program compilation reports `Pending` for `polls` passes before it
    /// becomes ready.
    pub fn with_compile_latency(mut self, polls: u32) -> Self {
        self.compile_latency = polls;
        self.polls_left = polls;
        self
    }

    /// Every link attempt fails with `log`.
    pub fn with_link_error(mut self, log: impl Into<String>) -> Self {
        self.link_error = Some(log.into());
        self
    }

    /// Surface acquisition fails as if the host container did not exist.
    pub fn without_surface(mut self) -> Self {
        self.missing_surface = true;
        self
    }

    pub fn clear_link_error(&mut self) {
        self.link_error = None;
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn draws(&self) -> usize {
        self.draws
    }

    pub fn is_program_ready(&self) -> bool {
        self.program_ready
    }

    pub fn last_upload(&self, binding: &str) -> Option<&RecordedUpload> {
        self.uploads.get(binding)
    }
}

impl RenderBackend for HeadlessBackend {
    fn acquire_surface(&mut self, viewport: &Viewport) -> Result<()> {
        self.calls.push(BackendCall::AcquireSurface);
        if self.missing_surface {
            return Err(SearchspaceError::SurfaceUnavailable(
                "no container for the canvas".to_string(),
            ));
        }
        self.surface = Some(*viewport);
        Ok(())
    }

    fn poll_program(&mut self) -> Result<ProgramStatus> {
        if let Some(log) = &self.link_error {
            return Err(SearchspaceError::ProgramLink(log.clone()));
        }
        let status = if self.program_ready || self.polls_left == 0 {
            self.program_ready = true;
            ProgramStatus::Ready
        } else {
            self.polls_left -= 1;
            ProgramStatus::Pending
        };
        self.calls.push(BackendCall::PollProgram(status));
        Ok(status)
    }

    fn bind_values(&mut self, defs: &[ValueDef]) -> Result<()> {
        self.calls.push(BackendCall::BindValues(defs.len()));
        Ok(())
    }

    fn begin_frame(&mut self, _measures: &Measures) -> Result<()> {
        if !self.program_ready {
            return Err(SearchspaceError::msg("shader not initialized!"));
        }
        self.calls.push(BackendCall::BeginFrame);
        Ok(())
    }

    fn upload(&mut self, binding: &str, upload: Upload<'_>) -> Result<()> {
        self.calls.push(BackendCall::Upload(binding.to_string()));
        self.uploads
            .insert(binding.to_string(), RecordedUpload::from(&upload));
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        self.calls.push(BackendCall::Draw);
        self.draws += 1;
        tracing::trace!(draws = self.draws, "headless draw");
        Ok(())
    }

    fn release(&mut self) {
        self.calls.push(BackendCall::Release);
        self.program_ready = false;
        self.polls_left = self.compile_latency;
        self.uploads.clear();
    }

    fn read_frame(&mut self) -> Result<ImageData> {
        self.calls.push(BackendCall::ReadFrame);
        let viewport = self
            .surface
            .ok_or_else(|| SearchspaceError::msg("canvas is not initialized"))?;
        Ok(ImageData::filled(viewport.width, viewport.height, CLEAR_PIXEL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_latency_restarts_after_release() {
        let mut backend = HeadlessBackend::new().with_compile_latency(1);
        assert_eq!(backend.poll_program().unwrap(), ProgramStatus::Pending);
        assert_eq!(backend.poll_program().unwrap(), ProgramStatus::Ready);
        backend.release();
        assert!(!backend.is_program_ready());
        assert_eq!(backend.poll_program().unwrap(), ProgramStatus::Pending);
    }

    #[test]
    fn reads_cleared_frames_of_surface_size() {
        let mut backend = HeadlessBackend::new();
        assert!(backend.read_frame().is_err());
        backend
            .acquire_surface(&Viewport {
                width: 4,
                height: 2,
                max_y: 1.0,
            })
            .unwrap();
        let frame = backend.read_frame().unwrap();
        assert_eq!(frame.rgba.len(), 4 * 2 * 4);
        assert_eq!(&frame.rgba[..4], &CLEAR_PIXEL);
    }

    #[test]
    fn missing_surface_is_reported() {
        let mut backend = HeadlessBackend::new().without_surface();
        let err = backend
            .acquire_surface(&Viewport {
                width: 1,
                height: 1,
                max_y: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, SearchspaceError::SurfaceUnavailable(_)));
    }
}
