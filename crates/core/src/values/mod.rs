//! Named, typed values that drive the scene.
//!
//! [`ValueStore`] owns the registry of [`ValueDef`]s and their current
//! contents. Every draw works on a [`RenderValues`] copy that has been passed
//! through the prerender chain; the copy is never written back.

use std::{collections::HashMap, sync::Arc};

use crate::{
    geometry::{Point, PointSet},
    render::ImageData,
};

/// How a value is uploaded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Boolean,
    Scalar,
    /// Scalar edited through a bounded range control.
    ScalarRange,
    Vector2,
    EnumIndex,
    PointArray,
    Image,
}

impl ValueKind {
    pub fn label(self) -> &'static str {
        match self {
            ValueKind::Boolean => "bool",
            ValueKind::Scalar => "float",
            ValueKind::ScalarRange => "range",
            ValueKind::Vector2 => "2d",
            ValueKind::EnumIndex => "enum",
            ValueKind::PointArray => "array2d",
            ValueKind::Image => "image",
        }
    }
}

/// Content of a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Scalar(f64),
    Vector(Point),
    Index(usize),
    Points(Vec<Point>),
    Image(Arc<ImageData>),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value)
    }
}

impl From<Point> for Value {
    fn from(value: Point) -> Self {
        Value::Vector(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Index(value)
    }
}

impl From<Vec<Point>> for Value {
    fn from(value: Vec<Point>) -> Self {
        Value::Points(value)
    }
}

impl From<PointSet> for Value {
    fn from(value: PointSet) -> Self {
        Value::Points(value.into_vec())
    }
}

impl From<ImageData> for Value {
    fn from(value: ImageData) -> Self {
        Value::Image(Arc::new(value))
    }
}

/// Registration record. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDef {
    pub name: String,
    /// Name the backend binds the value under.
    pub binding: String,
    pub kind: ValueKind,
}

/// Partial assignment handed to [`ValueStore::update`]. Entries apply in
/// insertion order, so a repeated key ends up with its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueUpdate {
    entries: Vec<(String, Value)>,
}

impl ValueUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().set(name, value)
    }

    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

/// Pure derivation run on the render copy before each draw.
pub type PrerenderHook = Box<dyn Fn(RenderValues) -> RenderValues>;

/// Registry plus current contents.
#[derive(Default)]
pub struct ValueStore {
    defs: Vec<ValueDef>,
    values: HashMap<String, Value>,
    prerender: Vec<PrerenderHook>,
}

impl ValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a value and seeds its content. Names must be unique; the
    /// store does not check.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        binding: impl Into<String>,
        kind: ValueKind,
        initial: impl Into<Value>,
    ) {
        let name = name.into();
        self.values.insert(name.clone(), initial.into());
        self.defs.push(ValueDef {
            name,
            binding: binding.into(),
            kind,
        });
    }

    pub fn add_prerender_hook(&mut self, hook: impl Fn(RenderValues) -> RenderValues + 'static) {
        self.prerender.push(Box::new(hook));
    }

    pub fn defs(&self) -> &[ValueDef] {
        &self.defs
    }

    pub fn def(&self, name: &str) -> Option<&ValueDef> {
        self.defs.iter().find(|def| def.name == name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.def(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Merges `update` into the store.
    ///
    /// Keys without a registration are still written, and returned so the
    /// caller can report them. Contents are not checked against the declared
    /// kind.
    pub fn update(&mut self, update: ValueUpdate) -> Vec<String> {
        let mut unknown = Vec::new();
        for (name, value) in update.entries {
            if !self.is_registered(&name) && !unknown.contains(&name) {
                unknown.push(name.clone());
            }
            self.values.insert(name, value);
        }
        unknown
    }

    /// Copies the current contents and runs the prerender chain over them.
    pub fn snapshot(&self, recording: bool) -> RenderValues {
        let base = RenderValues {
            values: self.values.clone(),
            recording,
        };
        self.prerender.iter().fold(base, |values, hook| hook(values))
    }
}

impl std::fmt::Debug for ValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueStore")
            .field("defs", &self.defs)
            .field("values", &self.values.len())
            .field("prerender", &self.prerender.len())
            .finish()
    }
}

/// Ephemeral per-draw copy of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderValues {
    values: HashMap<String, Value>,
    recording: bool,
}

impl RenderValues {
    /// Whether a recording is running while this copy is drawn.
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn vector(&self, name: &str) -> Option<Point> {
        match self.get(name)? {
            Value::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn index(&self, name: &str) -> Option<usize> {
        match self.get(name)? {
            Value::Index(v) => Some(*v),
            _ => None,
        }
    }

    pub fn points(&self, name: &str) -> Option<&[Point]> {
        match self.get(name)? {
            Value::Points(v) => Some(v),
            _ => None,
        }
    }
}
