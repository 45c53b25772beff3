//! Widgets bound to values and the input events that drive the scene.
//!
//! A [`ControlPanel`] holds the widget state only. Interacting with a widget
//! yields a [`ControlAction`] the host applies to the render loop; monitored
//! widgets are refreshed from the render values after each draw.

mod input;

use serde::{Deserialize, Serialize};

use crate::{
    values::{RenderValues, Value, ValueKind, ValueStore, ValueUpdate},
    Result, SearchspaceError,
};

pub use input::{
    pointer_to_world, touch_to_world, InputEvent, Key, SurfaceRect, Touch, SNAP_GRID,
};

/// Id of the viewport control.
pub const VIEWPORT_CONTROL: &str = "maxY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub text: String,
    pub value: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControlKind {
    Toggle,
    Select { options: Vec<SelectOption> },
    Range { min: f64, max: f64, step: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlTarget {
    Value(String),
    /// The visible world extent; changing it reinitialises the loop.
    Viewport,
}

/// What a widget currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetState {
    Toggle(bool),
    Select(usize),
    Range {
        slider: f64,
        edit: String,
        /// The edit field holds text that is not a finite number.
        invalid: bool,
    },
}

/// User interaction with a single widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ControlInput {
    Toggle(bool),
    Select(usize),
    Slide(f64),
    Edit(String),
}

/// Effect of an interaction, applied by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlAction {
    Update(ValueUpdate),
    Viewport(f64),
}

/// Optional settings for [`ControlPanel::bind`].
#[derive(Debug, Clone, Default)]
pub struct ControlOptions {
    options: Vec<SelectOption>,
    range: Option<(f64, f64, f64)>,
    monitor: Option<String>,
}

impl ControlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn option(mut self, text: impl Into<String>, value: usize) -> Self {
        self.options.push(SelectOption {
            text: text.into(),
            value,
        });
        self
    }

    pub fn range(mut self, min: f64, max: f64, step: f64) -> Self {
        self.range = Some((min, max, step));
        self
    }

    /// Refresh the widget from `name` after every draw.
    pub fn monitor(mut self, name: impl Into<String>) -> Self {
        self.monitor = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Control {
    pub id: String,
    pub label: String,
    pub target: ControlTarget,
    pub kind: ControlKind,
    pub monitor: Option<String>,
    state: WidgetState,
}

impl Control {
    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    fn apply(&mut self, input: ControlInput) -> Result<Option<Value>> {
        match (&self.kind, &mut self.state, input) {
            (ControlKind::Toggle, WidgetState::Toggle(checked), ControlInput::Toggle(on)) => {
                *checked = on;
                Ok(Some(Value::Bool(on)))
            }
            (ControlKind::Select { options }, WidgetState::Select(selected), ControlInput::Select(v)) => {
                if !options.iter().any(|option| option.value == v) {
                    return Err(SearchspaceError::InvalidInput(format!(
                        "{v} is not an option of {}",
                        self.id
                    )));
                }
                *selected = v;
                Ok(Some(Value::Index(v)))
            }
            (
                ControlKind::Range { min, max, step },
                WidgetState::Range {
                    slider,
                    edit,
                    invalid,
                },
                ControlInput::Slide(v),
            ) => {
                let v = snap_to_step(v, *min, *max, *step);
                if parse_edit(edit) == Some(v) {
                    return Ok(None);
                }
                *slider = v;
                *edit = v.to_string();
                *invalid = false;
                Ok(Some(Value::Scalar(v)))
            }
            (
                ControlKind::Range { min, max, .. },
                WidgetState::Range {
                    slider,
                    edit,
                    invalid,
                },
                ControlInput::Edit(text),
            ) => {
                *edit = text;
                match parse_edit(edit) {
                    Some(v) => {
                        *slider = v.clamp(*min, *max);
                        *invalid = false;
                        Ok(Some(Value::Scalar(v)))
                    }
                    None => {
                        *invalid = true;
                        Ok(None)
                    }
                }
            }
            (_, _, input) => Err(SearchspaceError::InvalidInput(format!(
                "control {} does not accept {input:?}",
                self.id
            ))),
        }
    }

    fn sync(&mut self, value: &Value) {
        match (&mut self.state, value) {
            (WidgetState::Toggle(checked), Value::Bool(v)) => *checked = *v,
            (WidgetState::Select(selected), Value::Index(v)) => *selected = *v,
            (WidgetState::Range { slider, edit, invalid }, Value::Scalar(v)) => {
                *slider = *v;
                *edit = v.to_string();
                *invalid = false;
            }
            _ => {}
        }
    }
}

fn parse_edit(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn snap_to_step(v: f64, min: f64, max: f64, step: f64) -> f64 {
    let v = v.clamp(min, max);
    if step <= 0.0 {
        return v;
    }
    let snapped = min + ((v - min) / step).round() * step;
    // Trim the float noise the step multiplication leaves behind.
    let snapped = (snapped * 1e9).round() / 1e9;
    snapped.min(max)
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelItem {
    Control(Control),
    Divider,
}

/// Ordered widgets of the top bar.
#[derive(Debug, Clone, Default)]
pub struct ControlPanel {
    items: Vec<PanelItem>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a widget for the registered value `name`. The widget type follows
    /// the value kind: enum values get a select, booleans a toggle and range
    /// values a slider with a text edit.
    pub fn bind(
        &mut self,
        store: &ValueStore,
        name: &str,
        label: impl Into<String>,
        options: ControlOptions,
    ) -> Result<()> {
        let label = label.into();
        let id = format!("value_{name}");
        let def = store.def(name).ok_or_else(|| {
            SearchspaceError::InvalidInput(format!("no value {name} to bind {label} to"))
        })?;
        let current = store.get(name);
        let (kind, state) = match def.kind {
            ValueKind::EnumIndex => {
                let selected = match current {
                    Some(Value::Index(ix)) => *ix,
                    _ => 0,
                };
                (
                    ControlKind::Select {
                        options: options.options,
                    },
                    WidgetState::Select(selected),
                )
            }
            ValueKind::Boolean => {
                let checked = matches!(current, Some(Value::Bool(true)));
                (ControlKind::Toggle, WidgetState::Toggle(checked))
            }
            ValueKind::ScalarRange => {
                let value = match current {
                    Some(Value::Scalar(v)) => *v,
                    _ => 0.0,
                };
                range_parts(&id, &label, options.range, value)?
            }
            ValueKind::Scalar
            | ValueKind::Vector2
            | ValueKind::PointArray
            | ValueKind::Image => {
                return Err(SearchspaceError::InvalidInput(format!(
                    "unsupported type {} for {id} ({label})",
                    def.kind.label()
                )));
            }
        };
        self.push(Control {
            id,
            label,
            target: ControlTarget::Value(name.to_string()),
            kind,
            monitor: options.monitor,
            state,
        });
        Ok(())
    }

    /// Adds the range widget controlling the visible world extent.
    pub fn bind_viewport(
        &mut self,
        label: impl Into<String>,
        max_y: f64,
        min: f64,
        max: f64,
        step: f64,
    ) -> Result<()> {
        let label = label.into();
        let (kind, state) = range_parts(VIEWPORT_CONTROL, &label, Some((min, max, step)), max_y)?;
        self.push(Control {
            id: VIEWPORT_CONTROL.to_string(),
            label,
            target: ControlTarget::Viewport,
            kind,
            monitor: None,
            state,
        });
        Ok(())
    }

    pub fn divider(&mut self) {
        self.items.push(PanelItem::Divider);
    }

    fn push(&mut self, control: Control) {
        tracing::debug!(id = %control.id, "control added");
        self.items.push(PanelItem::Control(control));
    }

    pub fn items(&self) -> &[PanelItem] {
        &self.items
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.items.iter().filter_map(|item| match item {
            PanelItem::Control(control) => Some(control),
            PanelItem::Divider => None,
        })
    }

    pub fn control(&self, id: &str) -> Option<&Control> {
        self.controls().find(|control| control.id == id)
    }

    /// Applies `input` to the widget `id`. Returns the action to perform, if
    /// the interaction changed anything.
    pub fn interact(&mut self, id: &str, input: ControlInput) -> Result<Option<ControlAction>> {
        let control = self
            .items
            .iter_mut()
            .find_map(|item| match item {
                PanelItem::Control(control) if control.id == id => Some(control),
                _ => None,
            })
            .ok_or_else(|| SearchspaceError::InvalidInput(format!("no control {id}")))?;
        let Some(value) = control.apply(input)? else {
            return Ok(None);
        };
        Ok(Some(match (&control.target, value) {
            (ControlTarget::Viewport, Value::Scalar(max_y)) => ControlAction::Viewport(max_y),
            (ControlTarget::Viewport, other) => {
                return Err(SearchspaceError::InvalidInput(format!(
                    "viewport control produced {other:?}"
                )))
            }
            (ControlTarget::Value(name), value) => {
                ControlAction::Update(ValueUpdate::single(name.clone(), value))
            }
        }))
    }

    /// Refreshes monitored widgets from the values of the last draw.
    pub fn sync(&mut self, values: &RenderValues) {
        for item in &mut self.items {
            if let PanelItem::Control(control) = item {
                let Some(name) = control.monitor.clone() else {
                    continue;
                };
                if let Some(value) = values.get(&name) {
                    control.sync(value);
                }
            }
        }
    }
}

fn range_parts(
    id: &str,
    label: &str,
    range: Option<(f64, f64, f64)>,
    value: f64,
) -> Result<(ControlKind, WidgetState)> {
    let (min, max, step) = range.ok_or_else(|| {
        SearchspaceError::InvalidInput(format!("range control {id} ({label}) needs bounds"))
    })?;
    Ok((
        ControlKind::Range { min, max, step },
        WidgetState::Range {
            slider: value.clamp(min, max),
            edit: value.to_string(),
            invalid: false,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ValueStore {
        let mut store = ValueStore::new();
        store.register("flag", "uFlag", ValueKind::Boolean, true);
        store.register("metric", "uMetric", ValueKind::EnumIndex, 1_usize);
        store.register("correction", "uCorrection", ValueKind::ScalarRange, 2.5);
        store.register("scale", "uScale", ValueKind::Scalar, 1.0);
        store
    }

    fn panel() -> ControlPanel {
        let store = store();
        let mut panel = ControlPanel::new();
        panel
            .bind(&store, "flag", "Flag:", ControlOptions::new().monitor("flag"))
            .unwrap();
        panel
            .bind(
                &store,
                "metric",
                "Metric:",
                ControlOptions::new().option("L1", 0).option("L2", 1),
            )
            .unwrap();
        panel.divider();
        panel
            .bind(
                &store,
                "correction",
                "Correction:",
                ControlOptions::new().range(0.01, 10.0, 0.01),
            )
            .unwrap();
        panel.bind_viewport("View:", 1.1, 1.0, 10.0, 0.1).unwrap();
        panel
    }

    #[test]
    fn widget_type_follows_value_kind() {
        let panel = panel();
        assert_eq!(panel.items().len(), 5);
        assert_eq!(
            panel.control("value_flag").unwrap().state(),
            &WidgetState::Toggle(true)
        );
        assert_eq!(
            panel.control("value_metric").unwrap().state(),
            &WidgetState::Select(1)
        );

        let mut panel = ControlPanel::new();
        assert!(panel
            .bind(&store(), "scale", "Scale:", ControlOptions::new())
            .is_err());
        assert!(panel
            .bind(&store(), "correction", "Correction:", ControlOptions::new())
            .is_err());
        assert!(panel
            .bind(&store(), "missing", "Missing:", ControlOptions::new())
            .is_err());
    }

    #[test]
    fn interactions_produce_updates() {
        let mut panel = panel();
        let action = panel
            .interact("value_flag", ControlInput::Toggle(false))
            .unwrap();
        assert_eq!(
            action,
            Some(ControlAction::Update(ValueUpdate::single("flag", false)))
        );
        assert!(panel
            .interact("value_metric", ControlInput::Select(7))
            .is_err());
        assert!(panel
            .interact("value_flag", ControlInput::Slide(1.0))
            .is_err());
        assert_eq!(
            panel.interact("maxY", ControlInput::Slide(2.0)).unwrap(),
            Some(ControlAction::Viewport(2.0))
        );
    }

    #[test]
    fn invalid_edit_marks_widget_without_update() {
        let mut panel = panel();
        let action = panel
            .interact("value_correction", ControlInput::Edit("abc".into()))
            .unwrap();
        assert_eq!(action, None);
        assert!(matches!(
            panel.control("value_correction").unwrap().state(),
            WidgetState::Range { invalid: true, .. }
        ));

        let action = panel
            .interact("value_correction", ControlInput::Edit(" 4 ".into()))
            .unwrap();
        assert_eq!(
            action,
            Some(ControlAction::Update(ValueUpdate::single("correction", 4.0)))
        );
        assert!(matches!(
            panel.control("value_correction").unwrap().state(),
            WidgetState::Range { invalid: false, slider, .. } if *slider == 4.0
        ));
    }

    #[test]
    fn slide_to_the_edited_value_is_ignored() {
        let mut panel = panel();
        panel
            .interact("value_correction", ControlInput::Edit("3".into()))
            .unwrap();
        assert_eq!(
            panel
                .interact("value_correction", ControlInput::Slide(3.0))
                .unwrap(),
            None
        );
        assert_eq!(
            panel
                .interact("value_correction", ControlInput::Slide(42.0))
                .unwrap(),
            Some(ControlAction::Update(ValueUpdate::single("correction", 10.0)))
        );
    }

    #[test]
    fn monitored_widgets_follow_render_values() {
        let mut panel = panel();
        let mut values = store().snapshot(false);
        values.set("flag", false);
        values.set("metric", 0_usize);
        panel.sync(&values);
        assert_eq!(
            panel.control("value_flag").unwrap().state(),
            &WidgetState::Toggle(false)
        );
        // not monitored
        assert_eq!(
            panel.control("value_metric").unwrap().state(),
            &WidgetState::Select(1)
        );
    }
}
