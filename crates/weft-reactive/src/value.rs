#![forbid(unsafe_code)]

//! The dynamic value model that the reactive layer instruments.
//!
//! [`Object`] and [`Array`] are shared handles: cloning one clones the
//! handle, not the contents, and identity is pointer identity. Scalars are
//! plain values. [`Value::Opaque`] carries host data (description nodes,
//! component instances) that is never observed or traversed.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::observer::Observer;
use crate::property::Property;
use crate::warning::{self, ReactiveWarning};

/// A user-supplied property getter.
pub type Getter = Rc<dyn Fn() -> Value>;
/// A user-supplied property setter.
pub type Setter = Rc<dyn Fn(Value)>;

// ─── Value ───────────────────────────────────────────────────────────────────

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Object(Object),
    Array(Array),
    Opaque(Rc<dyn Any>),
}

impl Value {
    /// Strict equality with one exception: NaN equals NaN.
    ///
    /// Containers and opaque values compare by identity, strings by content.
    #[must_use]
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }

    /// Wrap arbitrary host data as an opaque value.
    #[must_use]
    pub fn opaque<T: Any>(value: T) -> Self {
        Self::Opaque(Rc::new(value))
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Whether this is an object or an array.
    #[must_use]
    pub fn is_container(&self) -> bool {
        matches!(self, Self::Object(_) | Self::Array(_))
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The observer attached to this container, if any.
    #[must_use]
    pub fn observer(&self) -> Option<Rc<Observer>> {
        match self {
            Self::Object(o) => o.observer(),
            Self::Array(a) => a.observer(),
            _ => None,
        }
    }

    /// Whether the container is frozen. Scalars report `false`.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        match self {
            Self::Object(o) => o.is_frozen(),
            Self::Array(a) => a.is_frozen(),
            _ => false,
        }
    }

    /// Short type label used in diagnostics.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::Str(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Opaque(_) => "opaque",
        }
    }

    /// String conversion used by diagnostics and the default array sort.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".into(),
            Self::Null => "null".into(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) if n.is_nan() => "NaN".into(),
            Self::Number(n) if n.is_infinite() => {
                if *n > 0.0 { "Infinity" } else { "-Infinity" }.into()
            }
            Self::Number(n) => n.to_string(),
            Self::Str(s) => s.to_string(),
            Self::Object(_) => "[object Object]".into(),
            Self::Array(a) => a
                .to_vec()
                .iter()
                .map(|v| match v {
                    Self::Undefined | Self::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Opaque(_) => "[opaque]".into(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Number(n) => write!(f, "Number({n})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Object(o) => o.fmt(f),
            Self::Array(a) => a.fmt(f),
            Self::Opaque(_) => f.write_str("Opaque"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Object> for Value {
    fn from(o: Object) -> Self {
        Self::Object(o)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Self::Array(a)
    }
}

// ─── Key ─────────────────────────────────────────────────────────────────────

/// A property name or sequence index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Index(usize),
    Name(Rc<str>),
}

impl Key {
    /// The key as a sequence index, if it is one.
    #[must_use]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => Some(*i),
            Self::Name(name) => name.parse().ok(),
        }
    }

    /// The key as a property name.
    #[must_use]
    pub fn to_name(&self) -> Rc<str> {
        match self {
            Self::Index(i) => Rc::from(i.to_string()),
            Self::Name(name) => Rc::clone(name),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Self::Index(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self::Name(Rc::from(s))
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self::Name(Rc::from(s))
    }
}

impl From<Rc<str>> for Key {
    fn from(s: Rc<str>) -> Self {
        Self::Name(s)
    }
}

// ─── Property descriptors ────────────────────────────────────────────────────

/// A raw (non-reactive) own-property definition.
#[derive(Clone)]
pub enum PropertyDescriptor {
    Data {
        value: Value,
        configurable: bool,
        enumerable: bool,
    },
    Accessor {
        get: Option<Getter>,
        set: Option<Setter>,
        configurable: bool,
        enumerable: bool,
    },
}

impl PropertyDescriptor {
    /// A configurable, enumerable data property.
    #[must_use]
    pub fn data(value: impl Into<Value>) -> Self {
        Self::Data {
            value: value.into(),
            configurable: true,
            enumerable: true,
        }
    }

    /// A configurable, enumerable accessor property.
    #[must_use]
    pub fn accessor(get: Option<Getter>, set: Option<Setter>) -> Self {
        Self::Accessor {
            get,
            set,
            configurable: true,
            enumerable: true,
        }
    }

    /// Make the property non-configurable (cannot be redefined or deleted).
    #[must_use]
    pub fn locked(mut self) -> Self {
        match &mut self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => {
                *configurable = false;
            }
        }
        self
    }

    /// Hide the property from key enumeration.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        match &mut self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => {
                *enumerable = false;
            }
        }
        self
    }

    #[must_use]
    pub fn is_configurable(&self) -> bool {
        match self {
            Self::Data { configurable, .. } | Self::Accessor { configurable, .. } => *configurable,
        }
    }

    #[must_use]
    pub fn is_enumerable(&self) -> bool {
        match self {
            Self::Data { enumerable, .. } | Self::Accessor { enumerable, .. } => *enumerable,
        }
    }
}

/// What currently occupies an own-property slot.
#[derive(Clone)]
pub(crate) enum Slot {
    Plain(PropertyDescriptor),
    Reactive(Rc<Property<Value>>),
}

impl Slot {
    fn is_enumerable(&self) -> bool {
        match self {
            Self::Plain(desc) => desc.is_enumerable(),
            Self::Reactive(_) => true,
        }
    }

    pub(crate) fn is_configurable(&self) -> bool {
        match self {
            Self::Plain(desc) => desc.is_configurable(),
            Self::Reactive(_) => true,
        }
    }
}

// ─── Object ──────────────────────────────────────────────────────────────────

struct ObjectInner {
    props: IndexMap<Rc<str>, Slot>,
    observer: Option<Rc<Observer>>,
    extensible: bool,
    frozen: bool,
    managed: bool,
}

/// A shared, keyed container.
#[derive(Clone)]
pub struct Object {
    inner: Rc<RefCell<ObjectInner>>,
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Object")
            .field("keys", &inner.props.keys().collect::<Vec<_>>())
            .field("observed", &inner.observer.is_some())
            .finish()
    }
}

impl Object {
    /// An empty, extensible object.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObjectInner {
                props: IndexMap::new(),
                observer: None,
                extensible: true,
                frozen: false,
                managed: false,
            })),
        }
    }

    /// An object with plain data properties in iteration order.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let obj = Self::new();
        {
            let mut inner = obj.inner.borrow_mut();
            for (k, v) in pairs {
                inner
                    .props
                    .insert(k.into(), Slot::Plain(PropertyDescriptor::data(v)));
            }
        }
        obj
    }

    /// Whether two handles refer to the same object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read `key`, running its getter (and thus dependency collection).
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        let slot = self.slot(key);
        match slot {
            None => Value::Undefined,
            Some(Slot::Reactive(prop)) => prop.get(),
            Some(Slot::Plain(PropertyDescriptor::Data { value, .. })) => value,
            Some(Slot::Plain(PropertyDescriptor::Accessor { get, .. })) => {
                get.map_or(Value::Undefined, |g| g())
            }
        }
    }

    /// Assign `key`, running its setter if it has one.
    ///
    /// Adding a key that does not exist yet creates a plain data property
    /// with no reactivity; use [`set`](crate::set) to add a reactive one.
    pub fn put(&self, key: &str, value: Value) {
        match self.slot(key) {
            Some(Slot::Reactive(prop)) => prop.set(value),
            Some(Slot::Plain(PropertyDescriptor::Accessor { set, .. })) => {
                if let Some(set) = set {
                    set(value);
                }
            }
            Some(Slot::Plain(PropertyDescriptor::Data { .. })) => {
                let mut inner = self.inner.borrow_mut();
                if inner.frozen {
                    return;
                }
                if let Some(Slot::Plain(PropertyDescriptor::Data { value: slot, .. })) =
                    inner.props.get_mut(key)
                {
                    *slot = value;
                }
            }
            None => {
                let mut inner = self.inner.borrow_mut();
                if !inner.extensible {
                    drop(inner);
                    warning::emit(ReactiveWarning::NonExtensible { key: key.into() });
                    return;
                }
                inner
                    .props
                    .insert(Rc::from(key), Slot::Plain(PropertyDescriptor::data(value)));
            }
        }
    }

    /// Define (or redefine) a raw property. Returns `false` if the existing
    /// property is non-configurable or the object cannot grow.
    pub fn define_property(&self, key: &str, desc: PropertyDescriptor) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.props.get(key) {
            Some(existing) if !existing.is_configurable() => false,
            None if !inner.extensible => false,
            _ => {
                inner.props.insert(Rc::from(key), Slot::Plain(desc));
                true
            }
        }
    }

    /// Remove an own property. Returns `false` if it is non-configurable or
    /// the object is frozen; deleting a missing key succeeds.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        match inner.props.get(key) {
            None => true,
            Some(slot) if !slot.is_configurable() || inner.frozen => false,
            Some(_) => {
                inner.props.shift_remove(key);
                true
            }
        }
    }

    #[must_use]
    pub fn has_own(&self, key: &str) -> bool {
        self.inner.borrow().props.contains_key(key)
    }

    /// Own enumerable keys in definition order.
    #[must_use]
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.inner
            .borrow()
            .props
            .iter()
            .filter(|(_, slot)| slot.is_enumerable())
            .map(|(k, _)| Rc::clone(k))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().props.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is currently backed by a reactive accessor.
    #[must_use]
    pub fn is_reactive(&self, key: &str) -> bool {
        matches!(self.slot(key), Some(Slot::Reactive(_)))
    }

    /// The `Dep` of a reactive property, for inspection.
    #[must_use]
    pub fn property_dep(&self, key: &str) -> Option<crate::Dep> {
        match self.slot(key) {
            Some(Slot::Reactive(prop)) => Some(prop.dep().clone()),
            _ => None,
        }
    }

    /// Forbid new properties, existing-value writes, and deletion.
    pub fn freeze(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.frozen = true;
        inner.extensible = false;
    }

    /// Forbid new properties.
    pub fn prevent_extensions(&self) {
        self.inner.borrow_mut().extensible = false;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.borrow().frozen
    }

    #[must_use]
    pub fn is_extensible(&self) -> bool {
        self.inner.borrow().extensible
    }

    /// Flag this object as a framework-managed instance. Managed objects are
    /// never observed, and `set`/`del` on them warn.
    pub fn mark_managed(&self) {
        self.inner.borrow_mut().managed = true;
    }

    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.inner.borrow().managed
    }

    /// The observer stamped on this object, if observed.
    #[must_use]
    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.inner.borrow().observer.clone()
    }

    pub(crate) fn set_observer(&self, observer: Rc<Observer>) {
        self.inner.borrow_mut().observer = Some(observer);
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<()>() as usize
    }

    pub(crate) fn slot(&self, key: &str) -> Option<Slot> {
        self.inner.borrow().props.get(key).cloned()
    }

    pub(crate) fn install_reactive(&self, key: &str, prop: Rc<Property<Value>>) {
        self.inner
            .borrow_mut()
            .props
            .insert(Rc::from(key), Slot::Reactive(prop));
    }
}

// ─── Array ───────────────────────────────────────────────────────────────────

/// Longest length a raw write may grow an [`Array`] to. Valid indices are
/// below it.
pub const MAX_ARRAY_LENGTH: usize = u32::MAX as usize;

pub(crate) struct ArrayInner {
    pub(crate) items: Vec<Value>,
    observer: Option<Rc<Observer>>,
    frozen: bool,
}

/// A shared sequence container.
///
/// Index reads and [`set_raw`](Array::set_raw) are invisible to the
/// reactive layer. The seven mutating methods in [`crate::array`] are
/// intercepted once the array is observed.
#[derive(Clone)]
pub struct Array {
    pub(crate) inner: Rc<RefCell<ArrayInner>>,
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Array")
            .field("len", &inner.items.len())
            .field("observed", &inner.observer.is_some())
            .finish()
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().map(Into::into).collect())
    }
}

impl Array {
    #[must_use]
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    #[must_use]
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ArrayInner {
                items,
                observer: None,
                frozen: false,
            })),
        }
    }

    /// Whether two handles refer to the same array.
    #[must_use]
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`, or `Undefined`. Not a dependency registration.
    #[must_use]
    pub fn get(&self, index: usize) -> Value {
        self.inner
            .borrow()
            .items
            .get(index)
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of the current elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.borrow().items.clone()
    }

    /// Direct index assignment, growing with `Undefined` as needed.
    ///
    /// This path is not observable; use [`set`](crate::set) to notify.
    ///
    /// # Errors
    ///
    /// [`ReactiveWarning::LengthOutOfRange`] when `index + 1` would exceed
    /// [`MAX_ARRAY_LENGTH`]. The array is left unchanged.
    pub fn set_raw(&self, index: usize, value: Value) -> Result<(), ReactiveWarning> {
        let needed = index
            .checked_add(1)
            .filter(|&len| len <= MAX_ARRAY_LENGTH)
            .ok_or_else(|| ReactiveWarning::LengthOutOfRange {
                length: index.to_string(),
            })?;
        let mut inner = self.inner.borrow_mut();
        if inner.frozen {
            return Ok(());
        }
        if needed > inner.items.len() {
            inner.items.resize(needed, Value::Undefined);
        }
        inner.items[index] = value;
        Ok(())
    }

    /// Direct length assignment. Not observable.
    ///
    /// # Errors
    ///
    /// [`ReactiveWarning::LengthOutOfRange`] when `len` exceeds
    /// [`MAX_ARRAY_LENGTH`]. The array is left unchanged.
    pub fn set_len_raw(&self, len: usize) -> Result<(), ReactiveWarning> {
        if len > MAX_ARRAY_LENGTH {
            return Err(ReactiveWarning::LengthOutOfRange {
                length: len.to_string(),
            });
        }
        let mut inner = self.inner.borrow_mut();
        if !inner.frozen {
            inner.items.resize(len, Value::Undefined);
        }
        Ok(())
    }

    pub fn freeze(&self) {
        self.inner.borrow_mut().frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.borrow().frozen
    }

    /// The observer stamped on this array, if observed.
    #[must_use]
    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.inner.borrow().observer.clone()
    }

    pub(crate) fn set_observer(&self, observer: Rc<Observer>) {
        self.inner.borrow_mut().observer = Some(observer);
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<()>() as usize
    }
}
