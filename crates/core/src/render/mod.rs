//! Rendering backend contract.
//!
//! The scheduler never talks to a GPU directly. It drives an implementation of
//! [`RenderBackend`] through surface acquisition, program compilation, value
//! binding, per-value uploads and the final draw call.

mod headless;

use serde::{Deserialize, Serialize};

use crate::{
    geometry::Point,
    values::{Value, ValueDef, ValueKind},
    Result, SearchspaceError,
};

pub use headless::{BackendCall, HeadlessBackend, RecordedUpload};

/// Channels written per packed point: `x, y, 1, 1`.
pub const TEXEL_CHANNELS: usize = 4;

const SUPER_SAMPLING: f64 = 4.0;

/// Size of the drawing surface and the visible world extent along y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub max_y: f64,
}

/// Quantities derived from the viewport every time the program is
/// (re)initialised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measures {
    pub width: f64,
    pub height: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub unit_x: f64,
    pub unit_y: f64,
    pub size_x: f64,
    pub size_y: f64,
    pub block_x: f64,
    pub block_y: f64,
}

impl Measures {
    pub fn compute(viewport: &Viewport) -> Self {
        let width = f64::from(viewport.width);
        let height = f64::from(viewport.height);
        let max_y = viewport.max_y;
        let unit_y = (max_y * 2.0) / height / SUPER_SAMPLING;
        let max_x = (max_y / height) * width;
        let unit_x = (unit_y / height) * width;
        let size_x = max_x / unit_x;
        let size_y = max_y / unit_y;
        Self {
            width,
            height,
            max_x,
            max_y,
            unit_x,
            unit_y,
            size_x,
            size_y,
            block_x: size_x / max_x,
            block_y: size_y / max_y,
        }
    }
}

/// Straight RGBA8 pixels. Used for image values and captured frames alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl ImageData {
    pub fn filled(width: u32, height: u32, pixel: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            rgba: pixel.repeat(count),
        }
    }

    pub fn size(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }

    /// Encodes the pixels as a PNG file.
    pub fn save_png(&self, path: &std::path::Path) -> Result<()> {
        let buffer = image::RgbaImage::from_raw(self.width, self.height, self.rgba.clone())
            .ok_or_else(|| {
                SearchspaceError::InvalidInput(format!(
                    "pixel buffer of {} bytes does not match {}x{}",
                    self.rgba.len(),
                    self.width,
                    self.height
                ))
            })?;
        buffer.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Points packed into a square float texture.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedPoints {
    /// Texture side length, `ceil(sqrt(count))`.
    pub side: u32,
    pub count: u32,
    /// `side * side * 4` floats, unused texels zeroed.
    pub texels: Vec<f32>,
}

pub fn pack_points(points: &[Point]) -> PackedPoints {
    let count = points.len();
    let side = (count as f64).sqrt().ceil() as usize;
    let mut texels = vec![0.0_f32; side * side * TEXEL_CHANNELS];
    for (texel, point) in texels.chunks_exact_mut(TEXEL_CHANNELS).zip(points) {
        texel.copy_from_slice(&[point.x as f32, point.y as f32, 1.0, 1.0]);
    }
    PackedPoints {
        side: side as u32,
        count: count as u32,
        texels,
    }
}

/// One typed upload for a registered value.
#[derive(Debug, Clone, PartialEq)]
pub enum Upload<'a> {
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    /// Point texture plus its size and count scalars.
    Points(PackedPoints),
    /// Bound texture plus its pixel-size vector.
    Image { image: &'a ImageData, size: [f32; 2] },
}

/// Chooses the upload for `value` from the kind declared in `def`.
///
/// Returns `None` when the stored content does not fit the declared kind.
pub fn upload_for<'a>(def: &ValueDef, value: &'a Value) -> Option<Upload<'a>> {
    match (def.kind, value) {
        (ValueKind::Boolean, Value::Bool(flag)) => Some(Upload::Int(i32::from(*flag))),
        (ValueKind::EnumIndex, Value::Index(index)) => {
            i32::try_from(*index).ok().map(Upload::Int)
        }
        (ValueKind::Scalar | ValueKind::ScalarRange, Value::Scalar(v)) => {
            Some(Upload::Float(*v as f32))
        }
        (ValueKind::Vector2, Value::Vector(p)) => Some(Upload::Vec2([p.x as f32, p.y as f32])),
        (ValueKind::PointArray, Value::Points(points)) => Some(Upload::Points(pack_points(points))),
        (ValueKind::Image, Value::Image(image)) => Some(Upload::Image {
            image,
            size: image.size(),
        }),
        (
            ValueKind::Boolean
            | ValueKind::EnumIndex
            | ValueKind::Scalar
            | ValueKind::ScalarRange
            | ValueKind::Vector2
            | ValueKind::PointArray
            | ValueKind::Image,
            _,
        ) => None,
    }
}

/// Progress of backend program compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramStatus {
    Pending,
    Ready,
}

/// Implemented by whatever actually puts pixels on screen.
pub trait RenderBackend {
    /// Creates or re-uses the drawing surface. Fails with
    /// [`SearchspaceError::SurfaceUnavailable`] when the host container is
    /// missing.
    fn acquire_surface(&mut self, viewport: &Viewport) -> Result<()>;

    /// Drives compilation and linking of the program. Called once per
    /// scheduler pass until it reports [`ProgramStatus::Ready`].
    fn poll_program(&mut self) -> Result<ProgramStatus>;

    /// Resolves binding locations for every registered value.
    fn bind_values(&mut self, defs: &[ValueDef]) -> Result<()>;

    /// Clears the target and sets the projection for `measures`.
    fn begin_frame(&mut self, measures: &Measures) -> Result<()>;

    fn upload(&mut self, binding: &str, upload: Upload<'_>) -> Result<()>;

    fn draw(&mut self) -> Result<()>;

    /// Discards the program and all GPU buffers. The surface itself survives.
    fn release(&mut self);

    /// Reads back the most recently drawn frame.
    fn read_frame(&mut self) -> Result<ImageData>;
}
