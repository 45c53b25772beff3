use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{render::ImageData, Result};

/// Configuration options for the recording subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Number of countdown units before capturing starts.
    pub countdown: u32,
    /// Length of one countdown unit in milliseconds.
    pub countdown_step_ms: u64,
    /// Nominal frame rate written to the manifest.
    pub fps: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            countdown: 3,
            countdown_step_ms: 1000,
            fps: 60,
        }
    }
}

impl RecordingSettings {
    fn step(&self) -> Duration {
        Duration::from_millis(self.countdown_step_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    NoRecording,
    CountDown(u32),
    IsRecording,
}

/// Countdown and frame accumulation for video capture.
#[derive(Debug)]
pub struct Recorder {
    settings: RecordingSettings,
    state: RecordingState,
    elapsed: Duration,
    frames: Vec<ImageData>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecordingSettings::default())
    }
}

impl Recorder {
    pub fn new(settings: RecordingSettings) -> Self {
        Self {
            settings,
            state: RecordingState::NoRecording,
            elapsed: Duration::ZERO,
            frames: Vec::new(),
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecordingState::IsRecording
    }

    /// Starts the countdown. Ignored unless idle.
    pub fn start(&mut self) -> bool {
        if self.state != RecordingState::NoRecording {
            return false;
        }
        self.elapsed = Duration::ZERO;
        self.frames.clear();
        self.state = if self.settings.countdown == 0 {
            RecordingState::IsRecording
        } else {
            RecordingState::CountDown(self.settings.countdown)
        };
        true
    }

    /// Advances the countdown by `dt`. Returns `true` on the call that moves
    /// the recorder into [`RecordingState::IsRecording`].
    pub fn advance(&mut self, dt: Duration) -> bool {
        let RecordingState::CountDown(mut remaining) = self.state else {
            return false;
        };
        let step = self.settings.step();
        self.elapsed += dt;
        while remaining > 0 && self.elapsed >= step {
            self.elapsed -= step;
            remaining -= 1;
        }
        if remaining == 0 {
            self.elapsed = Duration::ZERO;
            self.state = RecordingState::IsRecording;
            tracing::info!("recording started");
            true
        } else {
            self.state = RecordingState::CountDown(remaining);
            false
        }
    }

    /// Text for the countdown overlay, if one should be shown.
    pub fn overlay_text(&self) -> Option<String> {
        match self.state {
            RecordingState::CountDown(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn capture(&mut self, frame: ImageData) {
        if self.is_recording() {
            self.frames.push(frame);
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Stops recording and flushes the captured frames. Ignored unless
    /// recording.
    pub fn finish(&mut self) -> Option<RecordingArtifact> {
        if !self.is_recording() {
            return None;
        }
        self.state = RecordingState::NoRecording;
        let frames = std::mem::take(&mut self.frames);
        tracing::info!(frames = frames.len(), "recording stopped");
        Some(RecordingArtifact {
            fps: self.settings.fps,
            frames,
        })
    }
}

/// Frames accumulated between start and stop.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingArtifact {
    pub fps: u32,
    pub frames: Vec<ImageData>,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    fps: u32,
    frames: Vec<&'a str>,
}

impl RecordingArtifact {
    /// Writes the frames as a numbered PNG sequence plus `manifest.json` into
    /// `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let names: Vec<String> = (0..self.frames.len())
            .map(|ix| format!("frame_{ix:05}.png"))
            .collect();
        for (frame, name) in self.frames.iter().zip(&names) {
            frame.save_png(&dir.join(name))?;
        }
        let manifest = Manifest {
            fps: self.fps,
            frames: names.iter().map(String::as_str).collect(),
        };
        let path = dir.join("manifest.json");
        std::fs::write(&path, serde_json::to_vec_pretty(&manifest)?)?;
        Ok(path)
    }
}

/// Output of the capture triggers, queued until the host collects it.
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Snapshot(ImageData),
    Recording(RecordingArtifact),
}

impl Artifact {
    /// Writes the artifact below `dir`, numbering it with `index`.
    pub fn write_to(&self, dir: &Path, index: usize) -> Result<PathBuf> {
        match self {
            Artifact::Snapshot(frame) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("screen_{index:03}.png"));
                frame.save_png(&path)?;
                Ok(path)
            }
            Artifact::Recording(recording) => {
                recording.write_to(&dir.join(format!("video_{index:03}")))
            }
        }
    }
}
