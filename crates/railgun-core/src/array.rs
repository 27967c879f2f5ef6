//! Array exotic objects
//!
//! `JsArray` keeps array-index properties out of the generic property table
//! for as long as possible: indices below [`JsArray::MAX_VECTOR_SIZE`] live
//! in a plain vector (holes marked by the storage sentinel), higher indices
//! in a lazily-allocated sparse map. The array stays *dense* until an index
//! receives a non-default descriptor; from then on the generic table
//! shadows the flat storage. `length` is a descriptor slot of its own with
//! the full ES5.1 §15.4.5.1 semantics, including truncation rollback when a
//! non-configurable element refuses to die.

use std::collections::BTreeSet;

use railgun_gc::object::tags;
use railgun_gc::{GcHeader, GcRef, GcTraceable};
use rustc_hash::FxHashMap;

use crate::conversions;
use crate::error::{VmError, VmResult};
use crate::object::{reject, EnumerationMode, JsObject, PropertyDescriptor, PropertyKey};
use crate::object_cell::ObjectCell;
use crate::value::Value;

/// The `length` slot: a uint32 data property whose enumerable and
/// configurable attributes are permanently false.
#[derive(Debug, Clone, Copy)]
struct LengthSlot {
    value: u32,
    writable: bool,
}

type SparseMap = FxHashMap<u32, Value>;

/// An array exotic object composed of a generic [`JsObject`] and flat
/// index storage.
pub struct JsArray {
    object: JsObject,
    vector: ObjectCell<Vec<Value>>,
    map: ObjectCell<Option<SparseMap>>,
    dense: ObjectCell<bool>,
    length: ObjectCell<LengthSlot>,
}

impl JsArray {
    /// Largest index stored in the flat vector; higher indices go to the
    /// sparse map.
    pub const MAX_VECTOR_SIZE: u32 = 10_000;

    /// Create an empty array.
    pub fn new() -> Self {
        Self::with_length(0)
    }

    /// Create an array with `length` pre-set and storage seeded with holes.
    pub fn with_length(length: u32) -> Self {
        let seed = if length <= Self::MAX_VECTOR_SIZE {
            length as usize
        } else {
            4
        };
        Self {
            object: JsObject::new(),
            vector: ObjectCell::new(vec![Value::hole(); seed]),
            map: ObjectCell::new(None),
            dense: ObjectCell::new(true),
            length: ObjectCell::new(LengthSlot {
                value: length,
                writable: true,
            }),
        }
    }

    /// Allocate an array cell.
    pub fn alloc() -> GcRef<Self> {
        GcRef::new(Self::new())
    }

    /// Current `length` value.
    pub fn length(&self) -> u32 {
        self.length.borrow().value
    }

    /// Whether every array-index property still lives in flat storage.
    pub fn is_dense(&self) -> bool {
        *self.dense.borrow()
    }

    /// Pre-allocate the sparse map when a known length exceeds the vector
    /// limit. VM fast path for array literals.
    pub fn reserve(&self, length: u32) {
        if length > Self::MAX_VECTOR_SIZE {
            let mut map = self.map.borrow_mut();
            if map.is_none() {
                *map = Some(SparseMap::default());
            }
        }
    }

    /// Direct vector write below [`Self::MAX_VECTOR_SIZE`]. VM fast path;
    /// the slot must already exist.
    pub fn set_to_vector(&self, index: u32, value: Value) {
        debug_assert!(index < Self::MAX_VECTOR_SIZE);
        self.vector.borrow_mut()[index as usize] = value;
    }

    /// Direct map write at or above [`Self::MAX_VECTOR_SIZE`]. VM fast
    /// path; [`Self::reserve`] must have run.
    pub fn set_to_map(&self, index: u32, value: Value) {
        debug_assert!(index >= Self::MAX_VECTOR_SIZE);
        let mut map = self.map.borrow_mut();
        map.as_mut()
            .expect("reserve() precedes set_to_map()")
            .insert(index, value);
    }

    /// `[[GetOwnProperty]]` with the array-index and `length` intercepts.
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<PropertyDescriptor> {
        if let Some(index) = key.array_index() {
            if !self.is_dense() {
                if let Some(desc) = self.object.get_own_property(key) {
                    return Some(desc);
                }
            }
            if index < Self::MAX_VECTOR_SIZE {
                let vector = self.vector.borrow();
                if let Some(value) = vector.get(index as usize) {
                    if !value.is_hole() {
                        return Some(PropertyDescriptor::data(*value));
                    }
                }
            } else {
                let map = self.map.borrow();
                if let Some(value) = map.as_ref().and_then(|entries| entries.get(&index)) {
                    return Some(PropertyDescriptor::data(*value));
                }
            }
            return None;
        }
        if key.is_length() {
            let length = *self.length.borrow();
            return Some(PropertyDescriptor::data_with(
                Value::uint32(length.value),
                length.writable,
                false,
                false,
            ));
        }
        self.object.get_own_property(key)
    }

    /// `[[DefineOwnProperty]]` (ES5.1 §15.4.5.1).
    pub fn define_own_property(
        &self,
        key: PropertyKey,
        desc: PropertyDescriptor,
        throwable: bool,
    ) -> VmResult<bool> {
        if let Some(index) = key.array_index() {
            // 15.4.5.1 step 4
            self.define_array_index(key, index, desc, throwable)
        } else if key.is_length() {
            // 15.4.5.1 step 3
            self.define_length(desc, throwable)
        } else {
            // 15.4.5.1 step 5
            self.object.define_own_property(key, desc, throwable)
        }
    }

    /// `[[Delete]]` with the array-index and `length` intercepts.
    pub fn delete(&self, key: &PropertyKey, throwable: bool) -> VmResult<bool> {
        if let Some(index) = key.array_index() {
            return self.delete_index(index, throwable);
        }
        if key.is_length() {
            return reject(throwable, "delete failed");
        }
        self.object.delete(key, throwable)
    }

    /// Own property keys: `length` (when requested), live vector indices
    /// ascending, sparse indices ascending, then generic names.
    pub fn own_property_names(&self, mode: EnumerationMode) -> Vec<PropertyKey> {
        let mut names = Vec::new();
        if mode == EnumerationMode::IncludeNotEnumerable {
            names.push(PropertyKey::name("length"));
        }
        {
            let vector = self.vector.borrow();
            for (index, value) in vector.iter().enumerate() {
                if !value.is_hole() {
                    names.push(PropertyKey::index(index as u32));
                }
            }
        }
        {
            let map = self.map.borrow();
            if let Some(entries) = map.as_ref() {
                let mut indices: Vec<u32> = entries.keys().copied().collect();
                indices.sort_unstable();
                for index in indices {
                    names.push(PropertyKey::index(index));
                }
            }
        }
        for key in self.object.own_property_names(mode) {
            if !names.contains(&key) {
                names.push(key);
            }
        }
        names
    }

    /// Convenience read: the value at `index`, `None` for holes and absent
    /// indices. Accessor properties report their stored descriptor value.
    pub fn get(&self, index: u32) -> Option<Value> {
        self.get_own_property(&PropertyKey::index(index))
            .and_then(|desc| desc.value().copied())
    }

    /// Convenience write: define `index` with the default data descriptor.
    pub fn set(&self, index: u32, value: Value) -> VmResult<bool> {
        self.define_own_property(
            PropertyKey::index(index),
            PropertyDescriptor::data(value),
            false,
        )
    }

    // 15.4.5.1 step 4
    fn define_array_index(
        &self,
        key: PropertyKey,
        index: u32,
        desc: PropertyDescriptor,
        throwable: bool,
    ) -> VmResult<bool> {
        let old_len = self.length.borrow().value;
        // step 4-b
        if index >= old_len && !self.length.borrow().writable {
            return reject(
                throwable,
                "adding an element to the array which length is not writable is rejected",
            );
        }

        let is_default = desc.is_default();
        let is_absent = desc.is_absent();
        let shadowed = !self.is_dense() && self.object.get_own_property(&key).is_some();
        if (is_default || (index < old_len && is_absent)) && !shadowed {
            if index < Self::MAX_VECTOR_SIZE {
                let mut vector = self.vector.borrow_mut();
                if vector.len() > index as usize {
                    if vector[index as usize].is_hole() {
                        if is_default {
                            vector[index as usize] =
                                desc.value().copied().unwrap_or_else(Value::undefined);
                            drop(vector);
                            return Ok(self.fix_up_length(old_len, index));
                        }
                        // A hole with an absent descriptor creates a fresh
                        // generic property below.
                    } else {
                        if desc.is_data_descriptor() {
                            if let Some(value) = desc.value() {
                                vector[index as usize] = *value;
                            }
                        }
                        drop(vector);
                        return Ok(self.fix_up_length(old_len, index));
                    }
                } else if is_default {
                    vector.resize(index as usize + 1, Value::hole());
                    vector[index as usize] = desc.value().copied().unwrap_or_else(Value::undefined);
                    drop(vector);
                    return Ok(self.fix_up_length(old_len, index));
                }
            } else {
                let mut map = self.map.borrow_mut();
                match map.as_mut() {
                    None => {
                        if is_default {
                            let mut fresh = SparseMap::default();
                            fresh
                                .insert(index, desc.value().copied().unwrap_or_else(Value::undefined));
                            *map = Some(fresh);
                            drop(map);
                            return Ok(self.fix_up_length(old_len, index));
                        }
                    }
                    Some(entries) => {
                        if entries.contains_key(&index) {
                            if desc.is_data_descriptor() {
                                if let Some(value) = desc.value() {
                                    entries.insert(index, *value);
                                }
                            }
                            drop(map);
                            return Ok(self.fix_up_length(old_len, index));
                        } else if is_default {
                            entries
                                .insert(index, desc.value().copied().unwrap_or_else(Value::undefined));
                            drop(map);
                            return Ok(self.fix_up_length(old_len, index));
                        }
                    }
                }
            }
        }

        // 15.4.5.1 step 4-c
        let succeeded = self.object.define_own_property(key, desc, false)?;
        // step 4-d
        if !succeeded {
            return reject(throwable, "define own property failed");
        }

        // The index now lives in the generic table; drop the stale flat
        // entry so it cannot shadow the descriptor.
        *self.dense.borrow_mut() = false;
        if index < Self::MAX_VECTOR_SIZE {
            let mut vector = self.vector.borrow_mut();
            if vector.len() > index as usize {
                vector[index as usize] = Value::hole();
            }
        } else {
            let mut map = self.map.borrow_mut();
            if let Some(entries) = map.as_mut() {
                entries.remove(&index);
                if entries.is_empty() {
                    *map = None;
                }
            }
        }
        // step 4-e, 4-f
        Ok(self.fix_up_length(old_len, index))
    }

    // 15.4.5.1 step 3
    fn define_length(&self, desc: PropertyDescriptor, throwable: bool) -> VmResult<bool> {
        if !desc.is_data_descriptor() {
            // length is not configurable, so the value never changes here.
            return self.length_define_accepted(&desc, throwable);
        }

        let Some(new_value) = desc.value().copied() else {
            // Attribute-only change ([[Writable]] flips).
            let accepted = self.length_define_accepted(&desc, throwable)?;
            if accepted {
                if let Some(writable) = desc.writable() {
                    self.length.borrow_mut().writable = writable;
                }
            }
            return Ok(accepted);
        };

        let number = conversions::value_to_number(&new_value);
        let new_len = conversions::to_uint32(number);
        if f64::from(new_len) != number {
            return Err(VmError::range_error("invalid array length"));
        }
        let new_len_desc = desc.clone().with_value(Value::uint32(new_len));
        let old_len = self.length.borrow().value;

        if new_len >= old_len {
            let accepted = self.length_define_accepted(&new_len_desc, throwable)?;
            if accepted {
                self.commit_length(new_len, new_len_desc.writable());
            }
            return Ok(accepted);
        }

        if !self.length.borrow().writable {
            return reject(throwable, "\"length\" not writable");
        }

        // 15.4.5.1 step 3-i: defer clearing [[Writable]] until the
        // truncation below has finished.
        let new_writable = new_len_desc.writable() != Some(false);
        let deferred = if new_writable {
            new_len_desc
        } else {
            new_len_desc.with_writable(true)
        };
        let accepted = self.length_define_accepted(&deferred, throwable)?;
        if !accepted {
            return Ok(false);
        }
        self.commit_length(new_len, deferred.writable());

        if self.is_dense() {
            self.compaction_to_length(new_len);
        } else if old_len - new_len < (1 << 24) {
            let mut cursor = old_len;
            while new_len < cursor {
                cursor -= 1;
                let deleted = self.delete_index(cursor, false)?;
                if !deleted {
                    // Rollback: length lands just above the survivor and
                    // the requested writability is restored.
                    self.commit_length(cursor + 1, Some(new_writable));
                    return reject(throwable, "shrink array failed");
                }
            }
        } else {
            // Bulk shrink: enumerate the generic table once instead of
            // probing up to 2^32 indices.
            let mut indices: BTreeSet<u32> = BTreeSet::new();
            for key in self
                .object
                .own_property_names(EnumerationMode::IncludeNotEnumerable)
            {
                if let Some(index) = key.array_index() {
                    indices.insert(index);
                }
            }
            for &index in indices.iter().rev() {
                if index < new_len {
                    break;
                }
                let deleted = self.delete_index(index, false)?;
                if !deleted {
                    let survivor_len = index + 1;
                    self.compaction_to_length(survivor_len);
                    self.commit_length(survivor_len, Some(new_writable));
                    return reject(throwable, "shrink array failed");
                }
            }
            self.compaction_to_length(new_len);
        }

        if !new_writable {
            self.length.borrow_mut().writable = false;
        }
        Ok(true)
    }

    /// ES5.1 §8.12.9 validation specialized for the `length` slot: a data
    /// property that is never enumerable or configurable.
    fn length_define_accepted(
        &self,
        desc: &PropertyDescriptor,
        throwable: bool,
    ) -> VmResult<bool> {
        let current = *self.length.borrow();
        if desc.configurable() == Some(true) {
            return reject(throwable, "\"length\" is not configurable");
        }
        if desc.enumerable() == Some(true) {
            return reject(throwable, "\"length\" is not configurable");
        }
        if desc.is_accessor_descriptor() {
            return reject(throwable, "\"length\" is not configurable");
        }
        if !current.writable {
            if desc.writable() == Some(true) {
                return reject(throwable, "\"length\" not writable");
            }
            if let Some(value) = desc.value() {
                let requested = conversions::to_uint32(conversions::value_to_number(value));
                if requested != current.value {
                    return reject(throwable, "\"length\" not writable");
                }
            }
        }
        Ok(true)
    }

    fn commit_length(&self, value: u32, writable: Option<bool>) {
        let mut length = self.length.borrow_mut();
        length.value = value;
        if let Some(writable) = writable {
            length.writable = writable;
        }
    }

    /// Drop all flat storage at or above `length`.
    fn compaction_to_length(&self, length: u32) {
        if length > Self::MAX_VECTOR_SIZE {
            let mut map = self.map.borrow_mut();
            if let Some(entries) = map.as_mut() {
                entries.retain(|&index, _| index < length);
                if entries.is_empty() {
                    *map = None;
                }
            }
        } else {
            *self.map.borrow_mut() = None;
            let mut vector = self.vector.borrow_mut();
            if vector.len() > length as usize {
                vector.truncate(length as usize);
            }
        }
    }

    fn delete_index(&self, index: u32, throwable: bool) -> VmResult<bool> {
        if index < Self::MAX_VECTOR_SIZE {
            let mut vector = self.vector.borrow_mut();
            if vector.len() > index as usize {
                if !vector[index as usize].is_hole() {
                    vector[index as usize] = Value::hole();
                    return Ok(true);
                } else if self.is_dense() {
                    // Deleting an absent index of a dense array is a no-op
                    // success.
                    return Ok(true);
                }
            } else if self.is_dense() {
                return Ok(true);
            }
        } else {
            let mut map = self.map.borrow_mut();
            match map.as_mut() {
                Some(entries) => {
                    if entries.remove(&index).is_some() {
                        if entries.is_empty() {
                            *map = None;
                        }
                        return Ok(true);
                    } else if self.is_dense() {
                        return Ok(true);
                    }
                }
                None => {
                    if self.is_dense() {
                        return Ok(true);
                    }
                }
            }
        }
        self.object.delete(&PropertyKey::index(index), throwable)
    }

    // 15.4.5.1 steps 4-e and 4-f
    fn fix_up_length(&self, old_len: u32, index: u32) -> bool {
        if index >= old_len {
            self.length.borrow_mut().value = index + 1;
        }
        true
    }
}

impl Default for JsArray {
    fn default() -> Self {
        Self::new()
    }
}

impl GcTraceable for JsArray {
    const NEEDS_TRACE: bool = true;
    const TYPE_ID: u8 = tags::ARRAY;

    fn trace(&self, tracer: &mut dyn FnMut(*const GcHeader)) {
        for value in self.vector.borrow().iter() {
            value.trace(tracer);
        }
        let map = self.map.borrow();
        if let Some(entries) = map.as_ref() {
            for value in entries.values() {
                value.trace(tracer);
            }
        }
        self.object.trace_contents(tracer);
    }
}

impl std::fmt::Debug for JsArray {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsArray")
            .field("length", &self.length())
            .field("dense", &self.is_dense())
            .finish()
    }
}
