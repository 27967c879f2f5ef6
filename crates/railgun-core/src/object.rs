//! Generic object property machinery
//!
//! [`JsObject`] is the capability set every object kind builds on:
//! own-property lookup, `DefineOwnProperty` validation (ES5.1 §8.12.9),
//! deletion, and insertion-ordered enumeration. Exotic objects (arrays)
//! compose a `JsObject` and intercept the keys they care about.

use indexmap::IndexMap;
use railgun_gc::object::tags;
use railgun_gc::{GcHeader, GcRef, GcTraceable};

use crate::error::{VmError, VmResult};
use crate::object_cell::ObjectCell;
use crate::string::JsString;
use crate::value::Value;

/// `"length"` as code units, for sentinel-key detection without allocating.
const LENGTH_UNITS: &[u16] = &[0x6C, 0x65, 0x6E, 0x67, 0x74, 0x68];

/// A property name: either an interned-style string or an array index.
///
/// Array indices are the integer keys `0 ≤ i < 2^32 − 1`; canonical numeric
/// strings are classified at construction so every property access can
/// branch on the variant alone.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// String-named property
    String(GcRef<JsString>),
    /// Array-index property
    Index(u32),
}

impl PropertyKey {
    /// Maximum array index (2^32 − 2); 2^32 − 1 is reserved for `length`.
    pub const MAX_INDEX: u32 = u32::MAX - 1;

    /// Create an array-index key.
    pub fn index(index: u32) -> Self {
        debug_assert!(index <= Self::MAX_INDEX);
        Self::Index(index)
    }

    /// Create a string key without numeric classification.
    pub fn name(name: &str) -> Self {
        Self::String(JsString::alloc(name))
    }

    /// Create a key from a string, classifying canonical array indices.
    pub fn from_string(name: &str) -> Self {
        if let Some(index) = parse_array_index(name) {
            return Self::Index(index);
        }
        Self::name(name)
    }

    /// The array index, if this key is one.
    pub fn array_index(&self) -> Option<u32> {
        match self {
            Self::Index(index) => Some(*index),
            Self::String(_) => None,
        }
    }

    /// Whether this key is the `length` sentinel.
    pub fn is_length(&self) -> bool {
        matches!(self, Self::String(s) if s.as_units() == LENGTH_UNITS)
    }
}

impl std::fmt::Debug for PropertyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{:?}", s.to_string_lossy()),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Parse a canonical array-index string: digits only, no leading zero
/// (except `"0"` itself), value below 2^32 − 1.
fn parse_array_index(name: &str) -> Option<u32> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value: u64 = name.parse().ok()?;
    if value < u64::from(u32::MAX) {
        Some(value as u32)
    } else {
        None
    }
}

/// An ES5 property descriptor with absent-field tracking.
///
/// Stored table entries are always *complete* (no absent fields); incoming
/// descriptors from `Object.defineProperty`-style callers may leave any
/// field absent.
#[derive(Debug, Clone, Default)]
pub struct PropertyDescriptor {
    value: Option<Value>,
    writable: Option<bool>,
    get: Option<Value>,
    set: Option<Value>,
    enumerable: Option<bool>,
    configurable: Option<bool>,
}

impl PropertyDescriptor {
    /// A fully-default data descriptor: writable, enumerable, configurable.
    pub fn data(value: Value) -> Self {
        Self {
            value: Some(value),
            writable: Some(true),
            get: None,
            set: None,
            enumerable: Some(true),
            configurable: Some(true),
        }
    }

    /// A data descriptor with explicit attributes.
    pub fn data_with(value: Value, writable: bool, enumerable: bool, configurable: bool) -> Self {
        Self {
            value: Some(value),
            writable: Some(writable),
            get: None,
            set: None,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    /// An accessor descriptor with explicit attributes.
    pub fn accessor(
        get: Option<Value>,
        set: Option<Value>,
        enumerable: bool,
        configurable: bool,
    ) -> Self {
        Self {
            value: None,
            writable: None,
            get,
            set,
            enumerable: Some(enumerable),
            configurable: Some(configurable),
        }
    }

    /// A descriptor with every field absent.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the `[[Value]]` field
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the `[[Writable]]` field
    pub fn with_writable(mut self, writable: bool) -> Self {
        self.writable = Some(writable);
        self
    }

    /// Set the `[[Enumerable]]` field
    pub fn with_enumerable(mut self, enumerable: bool) -> Self {
        self.enumerable = Some(enumerable);
        self
    }

    /// Set the `[[Configurable]]` field
    pub fn with_configurable(mut self, configurable: bool) -> Self {
        self.configurable = Some(configurable);
        self
    }

    /// `[[Value]]`, if present
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// `[[Writable]]`, if present
    pub fn writable(&self) -> Option<bool> {
        self.writable
    }

    /// `[[Get]]`, if present
    pub fn getter(&self) -> Option<&Value> {
        self.get.as_ref()
    }

    /// `[[Set]]`, if present
    pub fn setter(&self) -> Option<&Value> {
        self.set.as_ref()
    }

    /// `[[Enumerable]]`, if present
    pub fn enumerable(&self) -> Option<bool> {
        self.enumerable
    }

    /// `[[Configurable]]`, if present
    pub fn configurable(&self) -> Option<bool> {
        self.configurable
    }

    /// IsDataDescriptor (ES5.1 §8.10.2)
    pub fn is_data_descriptor(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }

    /// IsAccessorDescriptor (ES5.1 §8.10.1)
    pub fn is_accessor_descriptor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    /// IsGenericDescriptor (ES5.1 §8.10.3)
    pub fn is_generic_descriptor(&self) -> bool {
        !self.is_data_descriptor() && !self.is_accessor_descriptor()
    }

    /// Whether every field is absent
    pub fn is_empty_descriptor(&self) -> bool {
        self.value.is_none()
            && self.writable.is_none()
            && self.get.is_none()
            && self.set.is_none()
            && self.enumerable.is_none()
            && self.configurable.is_none()
    }

    /// The shape taken by plain assignment: an enumerable, configurable,
    /// writable data descriptor.
    pub fn is_default(&self) -> bool {
        self.enumerable == Some(true)
            && self.configurable == Some(true)
            && !self.is_accessor_descriptor()
            && self.writable == Some(true)
    }

    /// Whether every present field is compatible with the default shape:
    /// no field is explicitly `false` and no accessor is given.
    pub fn is_absent(&self) -> bool {
        self.enumerable != Some(false)
            && self.configurable != Some(false)
            && !self.is_accessor_descriptor()
            && self.writable != Some(false)
    }

    /// Complete this descriptor for insertion as a new property
    /// (ES5.1 §8.12.9 step 4).
    pub fn complete(&self) -> Self {
        if self.is_accessor_descriptor() {
            Self {
                value: None,
                writable: None,
                get: Some(self.get.unwrap_or_else(Value::undefined)),
                set: Some(self.set.unwrap_or_else(Value::undefined)),
                enumerable: Some(self.enumerable.unwrap_or(false)),
                configurable: Some(self.configurable.unwrap_or(false)),
            }
        } else {
            Self {
                value: Some(self.value.unwrap_or_else(Value::undefined)),
                writable: Some(self.writable.unwrap_or(false)),
                get: None,
                set: None,
                enumerable: Some(self.enumerable.unwrap_or(false)),
                configurable: Some(self.configurable.unwrap_or(false)),
            }
        }
    }

    /// Apply this (validated) descriptor over `current`, converting between
    /// data and accessor kinds when necessary (ES5.1 §8.12.9 steps 9–12).
    pub fn merge_over(&self, current: &Self) -> Self {
        let enumerable = Some(self.enumerable.or(current.enumerable).unwrap_or(false));
        let configurable = Some(self.configurable.or(current.configurable).unwrap_or(false));
        if self.is_accessor_descriptor() {
            Self {
                value: None,
                writable: None,
                get: Some(
                    self.get
                        .or(if current.is_accessor_descriptor() {
                            current.get
                        } else {
                            None
                        })
                        .unwrap_or_else(Value::undefined),
                ),
                set: Some(
                    self.set
                        .or(if current.is_accessor_descriptor() {
                            current.set
                        } else {
                            None
                        })
                        .unwrap_or_else(Value::undefined),
                ),
                enumerable,
                configurable,
            }
        } else if self.is_data_descriptor() || current.is_data_descriptor() {
            Self {
                value: Some(
                    self.value
                        .or(if current.is_data_descriptor() {
                            current.value
                        } else {
                            None
                        })
                        .unwrap_or_else(Value::undefined),
                ),
                writable: Some(
                    self.writable
                        .or(if current.is_data_descriptor() {
                            current.writable
                        } else {
                            None
                        })
                        .unwrap_or(false),
                ),
                get: None,
                set: None,
                enumerable,
                configurable,
            }
        } else {
            // Generic descriptor over an accessor property.
            Self {
                value: None,
                writable: None,
                get: current.get.or(Some(Value::undefined())),
                set: current.set.or(Some(Value::undefined())),
                enumerable,
                configurable,
            }
        }
    }

    /// Report cell-bearing fields to a GC tracer.
    pub fn trace(&self, tracer: &mut dyn FnMut(*const GcHeader)) {
        if let Some(value) = &self.value {
            value.trace(tracer);
        }
        if let Some(get) = &self.get {
            get.trace(tracer);
        }
        if let Some(set) = &self.set {
            set.trace(tracer);
        }
    }
}

/// Whether every field present in `desc` is already present and identical
/// in `current` (ES5.1 §8.12.9 step 6).
fn descriptor_unchanged(desc: &PropertyDescriptor, current: &PropertyDescriptor) -> bool {
    let value_same = match (&desc.value, &current.value) {
        (Some(d), Some(c)) => d.same_value(c),
        (Some(_), None) => false,
        (None, _) => true,
    };
    let accessor_same = |d: &Option<Value>, c: &Option<Value>| match (d, c) {
        (Some(d), Some(c)) => d.same_value(c),
        (Some(_), None) => false,
        (None, _) => true,
    };
    value_same
        && accessor_same(&desc.get, &current.get)
        && accessor_same(&desc.set, &current.set)
        && desc.writable.is_none_or(|w| current.writable == Some(w))
        && desc.enumerable.is_none_or(|e| current.enumerable == Some(e))
        && desc
            .configurable
            .is_none_or(|c| current.configurable == Some(c))
}

/// Reject a property operation: throw when `throwable`, report `false`
/// otherwise.
pub(crate) fn reject(throwable: bool, msg: &str) -> VmResult<bool> {
    if throwable {
        Err(VmError::type_error(msg))
    } else {
        Ok(false)
    }
}

/// Own-property enumeration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationMode {
    /// Enumerable properties only
    Default,
    /// Every own property
    IncludeNotEnumerable,
}

type PropertyTable = IndexMap<PropertyKey, PropertyDescriptor, rustc_hash::FxBuildHasher>;

/// A plain JavaScript object: an insertion-ordered property table plus a
/// prototype link and the extensible flag.
pub struct JsObject {
    properties: ObjectCell<PropertyTable>,
    prototype: ObjectCell<Option<GcRef<JsObject>>>,
    extensible: ObjectCell<bool>,
}

impl JsObject {
    /// Create an empty extensible object with no prototype.
    pub fn new() -> Self {
        Self {
            properties: ObjectCell::new(PropertyTable::default()),
            prototype: ObjectCell::new(None),
            extensible: ObjectCell::new(true),
        }
    }

    /// Create an empty object with the given prototype.
    pub fn with_prototype(prototype: GcRef<JsObject>) -> Self {
        let object = Self::new();
        *object.prototype.borrow_mut() = Some(prototype);
        object
    }

    /// The prototype link
    pub fn prototype(&self) -> Option<GcRef<JsObject>> {
        *self.prototype.borrow()
    }

    /// Replace the prototype link
    pub fn set_prototype(&self, prototype: Option<GcRef<JsObject>>) {
        *self.prototype.borrow_mut() = prototype;
    }

    /// Whether new properties may be added
    pub fn extensible(&self) -> bool {
        *self.extensible.borrow()
    }

    /// Forbid adding new properties
    pub fn prevent_extensions(&self) {
        *self.extensible.borrow_mut() = false;
    }

    /// `[[GetOwnProperty]]` (ES5.1 §8.12.1)
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        self.properties.borrow().get(key).cloned()
    }

    /// Whether an own property exists for `key`
    pub fn has_own(&self, key: &PropertyKey) -> bool {
        self.properties.borrow().contains_key(key)
    }

    /// `[[Get]]` for data properties, walking the prototype chain.
    pub fn get(&self, key: &PropertyKey) -> Option<Value> {
        if let Some(desc) = self.get_own_property(key) {
            return desc.value().copied();
        }
        let proto = self.prototype()?;
        proto.get(key)
    }

    /// Simplified `[[Put]]`: update an own writable data property or create
    /// a default data property.
    pub fn set(&self, key: PropertyKey, value: Value) -> bool {
        if let Some(current) = self.get_own_property(&key) {
            if !current.is_data_descriptor() || current.writable() != Some(true) {
                return false;
            }
            let merged = PropertyDescriptor::empty().with_value(value).merge_over(&current);
            self.properties.borrow_mut().insert(key, merged);
            return true;
        }
        if !self.extensible() {
            return false;
        }
        self.properties
            .borrow_mut()
            .insert(key, PropertyDescriptor::data(value));
        true
    }

    /// `[[DefineOwnProperty]]` (ES5.1 §8.12.9)
    pub fn define_own_property(
        &self,
        key: PropertyKey,
        desc: PropertyDescriptor,
        throwable: bool,
    ) -> VmResult<bool> {
        let Some(current) = self.get_own_property(&key) else {
            if !self.extensible() {
                return reject(throwable, "object is not extensible");
            }
            self.properties.borrow_mut().insert(key, desc.complete());
            return Ok(true);
        };

        if desc.is_empty_descriptor() || descriptor_unchanged(&desc, &current) {
            return Ok(true);
        }

        if current.configurable() != Some(true) {
            if desc.configurable() == Some(true) {
                return reject(throwable, "property is not configurable");
            }
            if let Some(enumerable) = desc.enumerable() {
                if Some(enumerable) != current.enumerable() {
                    return reject(throwable, "property is not configurable");
                }
            }
        }

        if desc.is_generic_descriptor() {
            // Attribute-only change; validated above.
        } else if current.is_data_descriptor() != desc.is_data_descriptor() {
            if current.configurable() != Some(true) {
                return reject(throwable, "property is not configurable");
            }
        } else if current.is_data_descriptor() {
            if current.configurable() != Some(true) && current.writable() != Some(true) {
                if desc.writable() == Some(true) {
                    return reject(throwable, "property is not writable");
                }
                if let Some(value) = desc.value() {
                    let unchanged = current.value().is_some_and(|c| c.same_value(value));
                    if !unchanged {
                        return reject(throwable, "property is not writable");
                    }
                }
            }
        } else if current.configurable() != Some(true) {
            let same = |d: Option<&Value>, c: Option<&Value>| match (d, c) {
                (Some(d), Some(c)) => d.same_value(c),
                (None, _) => true,
                (Some(_), None) => false,
            };
            if !same(desc.getter(), current.getter()) || !same(desc.setter(), current.setter()) {
                return reject(throwable, "property is not configurable");
            }
        }

        let merged = desc.merge_over(&current);
        self.properties.borrow_mut().insert(key, merged);
        Ok(true)
    }

    /// `[[Delete]]` (ES5.1 §8.12.7)
    pub fn delete(&self, key: &PropertyKey, throwable: bool) -> VmResult<bool> {
        let Some(current) = self.get_own_property(key) else {
            return Ok(true);
        };
        if current.configurable() == Some(true) {
            self.properties.borrow_mut().shift_remove(key);
            return Ok(true);
        }
        reject(throwable, "delete failed")
    }

    /// Own property keys in insertion order.
    pub fn own_property_names(&self, mode: EnumerationMode) -> Vec<PropertyKey> {
        self.properties
            .borrow()
            .iter()
            .filter(|(_, desc)| {
                mode == EnumerationMode::IncludeNotEnumerable || desc.enumerable() == Some(true)
            })
            .map(|(key, _)| *key)
            .collect()
    }

    /// Report every cell reachable from this object to a GC tracer.
    pub fn trace_contents(&self, tracer: &mut dyn FnMut(*const GcHeader)) {
        for (key, desc) in self.properties.borrow().iter() {
            if let PropertyKey::String(name) = key {
                tracer(name.header() as *const _);
            }
            desc.trace(tracer);
        }
        if let Some(proto) = *self.prototype.borrow() {
            tracer(proto.header() as *const _);
        }
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

impl GcTraceable for JsObject {
    const NEEDS_TRACE: bool = true;
    const TYPE_ID: u8 = tags::OBJECT;

    fn trace(&self, tracer: &mut dyn FnMut(*const GcHeader)) {
        self.trace_contents(tracer);
    }
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsObject")
            .field("properties", &self.properties.borrow().len())
            .field("extensible", &self.extensible())
            .finish()
    }
}
