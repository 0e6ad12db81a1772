//! The typed attribute bag every component carries.

pub mod expr;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use expr::{Expr, ExprContext};

/// A callable registered as a `Function` property value. Takes positional
/// arguments, returns a value.
pub type FunctionCallback = Arc<dyn Fn(&[PropertyValue]) -> Result<PropertyValue> + Send + Sync>;
/// A callable registered as a `Procedure` property value. Takes positional
/// arguments, returns nothing.
pub type ProcedureCallback = Arc<dyn Fn(&[PropertyValue]) -> Result<()> + Send + Sync>;

/// A unit attached to a numeric property or data descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub symbol: String,
    pub name: String,
    pub quantity: String,
}

/// A rational number, used for tick resolution and the `Ratio` value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratio {
    pub numerator: i64,
    pub denominator: i64,
}

/// The value held by a property or carried inline in an expression.
///
/// `Object` wraps a nested [`PropertyObject`]; `Struct` is a named,
/// fixed-shape variant of the same thing distinguished only by the
/// descriptor's declared type name.
#[derive(Clone)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<PropertyValue>),
    Dict(HashMap<String, PropertyValue>),
    Ratio(Ratio),
    Struct(Arc<PropertyObject>),
    Enumeration { type_name: String, value: String },
    Object(Arc<PropertyObject>),
    Function(FunctionCallback),
    Procedure(ProcedureCallback),
    /// Stores the unevaluated expression text; resolved on read via
    /// [`PropertyObject::get_property_value`].
    Reference(String),
    /// Index into the owning descriptor's `suggested_values`.
    Selection(i64),
}

impl std::fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "Bool({v})"),
            PropertyValue::Int(v) => write!(f, "Int({v})"),
            PropertyValue::Float(v) => write!(f, "Float({v})"),
            PropertyValue::String(v) => write!(f, "String({v:?})"),
            PropertyValue::List(v) => write!(f, "List({v:?})"),
            PropertyValue::Dict(v) => write!(f, "Dict({v:?})"),
            PropertyValue::Ratio(v) => write!(f, "Ratio({}/{})", v.numerator, v.denominator),
            PropertyValue::Struct(_) => write!(f, "Struct(..)"),
            PropertyValue::Enumeration { type_name, value } => {
                write!(f, "Enumeration({type_name}::{value})")
            }
            PropertyValue::Object(_) => write!(f, "Object(..)"),
            PropertyValue::Function(_) => write!(f, "Function(..)"),
            PropertyValue::Procedure(_) => write!(f, "Procedure(..)"),
            PropertyValue::Reference(e) => write!(f, "Reference({e:?})"),
            PropertyValue::Selection(i) => write!(f, "Selection({i})"),
        }
    }
}

/// Discriminant-only view of [`PropertyValue`], used to check a new value
/// is assignment-compatible with a property's declared kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyValueKind {
    Bool,
    Int,
    Float,
    String,
    List,
    Dict,
    Ratio,
    Struct,
    Enumeration,
    Object,
    Function,
    Procedure,
    Reference,
    Selection,
}

impl PropertyValue {
    #[must_use]
    pub fn kind(&self) -> PropertyValueKind {
        match self {
            PropertyValue::Bool(_) => PropertyValueKind::Bool,
            PropertyValue::Int(_) => PropertyValueKind::Int,
            PropertyValue::Float(_) => PropertyValueKind::Float,
            PropertyValue::String(_) => PropertyValueKind::String,
            PropertyValue::List(_) => PropertyValueKind::List,
            PropertyValue::Dict(_) => PropertyValueKind::Dict,
            PropertyValue::Ratio(_) => PropertyValueKind::Ratio,
            PropertyValue::Struct(_) => PropertyValueKind::Struct,
            PropertyValue::Enumeration { .. } => PropertyValueKind::Enumeration,
            PropertyValue::Object(_) => PropertyValueKind::Object,
            PropertyValue::Function(_) => PropertyValueKind::Function,
            PropertyValue::Procedure(_) => PropertyValueKind::Procedure,
            PropertyValue::Reference(_) => PropertyValueKind::Reference,
            PropertyValue::Selection(_) => PropertyValueKind::Selection,
        }
    }

    /// Attempt a numeric coercion `Int -> Float` when the target kind
    /// needs it; otherwise returns self unchanged. Surfaces overflow as
    /// [`Error::InvalidValue`].
    fn coerce_to(self, target: PropertyValueKind, property: &str) -> Result<Self> {
        match (&self, target) {
            (PropertyValue::Int(v), PropertyValueKind::Float) => Ok(PropertyValue::Float(*v as f64)),
            (PropertyValue::Float(v), PropertyValueKind::Int) => {
                if v.fract() != 0.0 || *v > i64::MAX as f64 || *v < i64::MIN as f64 {
                    Err(Error::InvalidValue {
                        property: property.to_string(),
                        reason: "float does not fit losslessly into Int".to_string(),
                    })
                } else {
                    Ok(PropertyValue::Int(*v as i64))
                }
            }
            _ => Ok(self),
        }
    }
}

/// Callable-info attached to Function/Procedure property descriptors:
/// the argument kinds and, for Function, the return kind.
#[derive(Debug, Clone)]
pub struct CallableInfo {
    pub arg_kinds: Vec<PropertyValueKind>,
    pub return_kind: Option<PropertyValueKind>,
}

/// An immutable property descriptor. Once added to a [`PropertyObject`]
/// via [`PropertyObject::add_property`] it never changes; only the
/// associated value does.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub value_kind: PropertyValueKind,
    pub default_value: PropertyValue,
    pub unit: Option<Unit>,
    pub min: Option<PropertyValue>,
    pub max: Option<PropertyValue>,
    pub suggested_values: Option<Vec<PropertyValue>>,
    pub visible: Option<Expr>,
    pub read_only: Option<Expr>,
    pub validator: Option<Expr>,
    pub coercer: Option<Expr>,
    pub callable_info: Option<CallableInfo>,
}

impl PropertyDescriptor {
    /// Start building a descriptor for `name` with `default_value`.
    #[must_use]
    pub fn new(name: impl Into<String>, default_value: PropertyValue) -> Self {
        let value_kind = default_value.kind();
        Self {
            name: name.into(),
            value_kind,
            default_value,
            unit: None,
            min: None,
            max: None,
            suggested_values: None,
            visible: None,
            read_only: None,
            validator: None,
            coercer: None,
            callable_info: None,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    #[must_use]
    pub fn with_range(mut self, min: PropertyValue, max: PropertyValue) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    #[must_use]
    pub fn with_suggested_values(mut self, values: Vec<PropertyValue>) -> Self {
        self.suggested_values = Some(values);
        self
    }

    /// Attach a read-only predicate expression.
    pub fn with_read_only_expr(mut self, expr: &str) -> Result<Self> {
        self.read_only = Some(Expr::parse(expr)?);
        Ok(self)
    }

    /// Attach a validator expression.
    pub fn with_validator(mut self, expr: &str) -> Result<Self> {
        self.validator = Some(Expr::parse(expr)?);
        Ok(self)
    }

    /// Attach a coercer expression.
    pub fn with_coercer(mut self, expr: &str) -> Result<Self> {
        self.coercer = Some(Expr::parse(expr)?);
        Ok(self)
    }

    /// Mark statically read-only (no expression, always read-only).
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = Some(Expr::parse("true").expect("`true` always parses"));
        self
    }
}

type ChangeCallback = Box<dyn Fn(&str, &PropertyValue) + Send + Sync>;

/// The typed attribute bag shared by every component.
///
/// Property descriptors are immutable once added; values are mutable
/// unless the property is read-only.
pub struct PropertyObject {
    descriptors: RwLock<Vec<PropertyDescriptor>>,
    values: RwLock<HashMap<String, PropertyValue>>,
    on_change: RwLock<HashMap<String, ChangeCallback>>,
    update_depth: RwLock<u32>,
    pending: RwLock<Vec<(String, PropertyValue)>>,
}

impl Default for PropertyObject {
    fn default() -> Self {
        Self::new()
    }
}

impl PropertyObject {
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptors: RwLock::new(Vec::new()),
            values: RwLock::new(HashMap::new()),
            on_change: RwLock::new(HashMap::new()),
            update_depth: RwLock::new(0),
            pending: RwLock::new(Vec::new()),
        }
    }

    /// Append `descriptor` to the ordered list; fails with
    /// [`Error::DuplicateItem`] if the name is already present.
    pub fn add_property(&self, descriptor: PropertyDescriptor) -> Result<()> {
        let mut descriptors = self.descriptors.write();
        if descriptors.iter().any(|d| d.name == descriptor.name) {
            return Err(Error::DuplicateItem(descriptor.name));
        }
        let default = descriptor.default_value.clone();
        let name = descriptor.name.clone();
        descriptors.push(descriptor);
        drop(descriptors);
        self.values.write().insert(name, default);
        Ok(())
    }

    /// Remove a property descriptor and its value.
    pub fn remove_property(&self, name: &str) -> Result<()> {
        let mut descriptors = self.descriptors.write();
        let idx = descriptors
            .iter()
            .position(|d| d.name == name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        descriptors.remove(idx);
        drop(descriptors);
        self.values.write().remove(name);
        Ok(())
    }

    /// List property descriptors in declaration order.
    #[must_use]
    pub fn properties(&self) -> Vec<PropertyDescriptor> {
        self.descriptors.read().clone()
    }

    fn find_descriptor(&self, name: &str) -> Result<PropertyDescriptor> {
        self.descriptors
            .read()
            .iter()
            .find(|d| d.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn is_read_only(&self, descriptor: &PropertyDescriptor) -> Result<bool> {
        match &descriptor.read_only {
            Some(expr) => match expr.eval(self)? {
                PropertyValue::Bool(b) => Ok(b),
                _ => Ok(false),
            },
            None => Ok(false),
        }
    }

    /// Set a property value through the normal (non-Protected) path.
    /// Fails [`Error::AccessDenied`] for a read-only property.
    pub fn set_property_value(&self, name: &str, value: PropertyValue) -> Result<()> {
        self.set_property_value_inner(name, value, false)
    }

    /// Set a property value bypassing the read-only predicate (the
    /// "Protected path").
    pub fn set_property_value_protected(&self, name: &str, value: PropertyValue) -> Result<()> {
        self.set_property_value_inner(name, value, true)
    }

    fn set_property_value_inner(&self, name: &str, value: PropertyValue, protected: bool) -> Result<()> {
        let descriptor = self.find_descriptor(name)?;
        if !protected && self.is_read_only(&descriptor)? {
            return Err(Error::AccessDenied(name.to_string()));
        }
        let coerced = match &descriptor.coercer {
            Some(expr) => {
                // Coercer expressions resolve `$value` to the candidate value.
                let scratch = ScratchContext {
                    base: self,
                    value: Some(value.clone()),
                };
                expr.eval(&scratch)?
            }
            None => value.coerce_to(descriptor.value_kind, name)?,
        };
        if coerced.kind() != descriptor.value_kind {
            return Err(Error::InvalidValue {
                property: name.to_string(),
                reason: format!(
                    "expected {:?}, got {:?}",
                    descriptor.value_kind,
                    coerced.kind()
                ),
            });
        }
        if let Some(validator) = &descriptor.validator {
            let scratch = ScratchContext {
                base: self,
                value: Some(coerced.clone()),
            };
            match validator.eval(&scratch)? {
                PropertyValue::Bool(true) => {}
                _ => {
                    return Err(Error::InvalidValue {
                        property: name.to_string(),
                        reason: "validator rejected value".to_string(),
                    })
                }
            }
        }
        self.values.write().insert(name.to_string(), coerced.clone());
        if *self.update_depth.read() > 0 {
            self.pending.write().push((name.to_string(), coerced));
        } else if let Some(cb) = self.on_change.read().get(name) {
            cb(name, &coerced);
        }
        Ok(())
    }

    /// Read a property's current value, resolving `Reference` and
    /// `Selection` kinds against this object.
    pub fn get_property_value(&self, name: &str) -> Result<PropertyValue> {
        let descriptor = self.find_descriptor(name)?;
        let raw = self
            .values
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        match raw {
            PropertyValue::Reference(expr_source) => {
                let expr = Expr::parse(&expr_source)?;
                expr.eval(self)
            }
            PropertyValue::Selection(idx) => {
                let suggested = descriptor.suggested_values.as_ref().ok_or_else(|| {
                    Error::InvalidValue {
                        property: name.to_string(),
                        reason: "Selection property has no suggested_values".to_string(),
                    }
                })?;
                suggested
                    .get(usize::try_from(idx).map_err(|_| Error::InvalidValue {
                        property: name.to_string(),
                        reason: "negative selection index".to_string(),
                    })?)
                    .cloned()
                    .ok_or_else(|| Error::InvalidValue {
                        property: name.to_string(),
                        reason: "selection index out of range".to_string(),
                    })
            }
            other => Ok(other),
        }
    }

    /// Register a synchronous change callback, invoked on the calling
    /// thread immediately after a successful `set_property_value`,
    /// unless a batch update is in progress.
    pub fn on_property_value_changed<F>(&self, name: &str, callback: F)
    where
        F: Fn(&str, &PropertyValue) + Send + Sync + 'static,
    {
        self.on_change.write().insert(name.to_string(), Box::new(callback));
    }

    /// Begin a batched update: subsequent `set_property_value` calls are
    /// suppressed from firing individual change callbacks until
    /// `end_update`, which fires one `PropertyObjectUpdateEnd` instead.
    pub fn begin_update(&self) {
        *self.update_depth.write() += 1;
    }

    /// End a batched update. Returns the batch of `(name, value)` pairs
    /// that changed since `begin_update`, for the caller to turn into a
    /// single `PropertyObjectUpdateEnd` core event.
    pub fn end_update(&self) -> Vec<(String, PropertyValue)> {
        let mut depth = self.update_depth.write();
        if *depth == 0 {
            return Vec::new();
        }
        *depth -= 1;
        if *depth > 0 {
            return Vec::new();
        }
        drop(depth);
        std::mem::take(&mut *self.pending.write())
    }
}

impl ExprContext for PropertyObject {
    fn resolve(&self, name: &str) -> Result<PropertyValue> {
        self.get_property_value(name)
    }
}

/// Context used while evaluating a coercer/validator: resolves `value`
/// to the candidate value being written, everything else to the base
/// object's current values.
struct ScratchContext<'a> {
    base: &'a PropertyObject,
    value: Option<PropertyValue>,
}

impl ExprContext for ScratchContext<'_> {
    fn resolve(&self, name: &str) -> Result<PropertyValue> {
        if name == "value" {
            if let Some(v) = &self.value {
                return Ok(v.clone());
            }
        }
        self.base.resolve(name)
    }
}

/// Convert to the subset of JSON the wire protocol and persisted state
/// both use: scalars and lists round-trip; everything else degrades to
/// `Null` since it has no JSON-native shape.
#[must_use]
pub fn to_json(value: &PropertyValue) -> serde_json::Value {
    match value {
        PropertyValue::Bool(b) => serde_json::json!(b),
        PropertyValue::Int(i) => serde_json::json!(i),
        PropertyValue::Float(f) => serde_json::json!(f),
        PropertyValue::String(s) => serde_json::json!(s),
        PropertyValue::List(items) => serde_json::Value::Array(items.iter().map(to_json).collect()),
        _ => serde_json::Value::Null,
    }
}

/// Inverse of [`to_json`] over the same subset.
#[must_use]
pub fn from_json(value: &serde_json::Value) -> PropertyValue {
    match value {
        serde_json::Value::Bool(b) => PropertyValue::Bool(*b),
        serde_json::Value::Number(n) if n.is_i64() => PropertyValue::Int(n.as_i64().unwrap_or_default()),
        serde_json::Value::Number(n) => PropertyValue::Float(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => PropertyValue::String(s.clone()),
        serde_json::Value::Array(items) => PropertyValue::List(items.iter().map(from_json).collect()),
        _ => PropertyValue::String(value.to_string()),
    }
}
