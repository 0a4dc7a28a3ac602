/*
 * Copyright 2026 Oxide Computer Company
 */

//! Attribute lists: the typed, named key-value container used for every
//! exchange between discovery, instantiation and their consumers.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttrType {
    Bool,
    U32,
    U64,
    String,
    U32Array,
    U64Array,
    StringArray,
    ListArray,
}

impl fmt::Display for AttrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttrType::Bool => "bool",
            AttrType::U32 => "u32",
            AttrType::U64 => "u64",
            AttrType::String => "string",
            AttrType::U32Array => "u32[]",
            AttrType::U64Array => "u64[]",
            AttrType::StringArray => "string[]",
            AttrType::ListArray => "list[]",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    String(String),
    U32Array(Vec<u32>),
    U64Array(Vec<u64>),
    StringArray(Vec<String>),
    ListArray(Vec<AttrList>),
}

impl AttrValue {
    pub fn attr_type(&self) -> AttrType {
        match self {
            AttrValue::Bool(_) => AttrType::Bool,
            AttrValue::U32(_) => AttrType::U32,
            AttrValue::U64(_) => AttrType::U64,
            AttrValue::String(_) => AttrType::String,
            AttrValue::U32Array(_) => AttrType::U32Array,
            AttrValue::U64Array(_) => AttrType::U64Array,
            AttrValue::StringArray(_) => AttrType::StringArray,
            AttrValue::ListArray(_) => AttrType::ListArray,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AttrError {
    #[error("attribute \"{0}\" already exists")]
    Exists(String),

    #[error("attribute \"{0}\" not found")]
    NotFound(String),

    #[error("attribute \"{name}\" is {actual}, not {wanted}")]
    WrongType { name: String, wanted: AttrType, actual: AttrType },
}

/**
 * Turn a missing attribute into None, leaving other failures in place.
 */
pub trait Optional<T> {
    fn optional(self) -> Result<Option<T>, AttrError>;
}

impl<T> Optional<T> for Result<T, AttrError> {
    fn optional(self) -> Result<Option<T>, AttrError> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(AttrError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pair {
    name: String,
    value: AttrValue,
}

impl Pair {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &AttrValue {
        &self.value
    }

    pub fn attr_type(&self) -> AttrType {
        self.value.attr_type()
    }
}

/**
 * A uniquely keyed list of attributes.  Iteration follows insertion order, and
 * nested lists (in a list array) are owned by their parent.
 */
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttrList {
    pairs: Vec<Pair>,
}

impl AttrList {
    pub fn new() -> AttrList {
        AttrList::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pair> {
        self.pairs.iter()
    }

    pub fn has(&self, name: &str) -> bool {
        self.pairs.iter().any(|p| p.name == name)
    }

    pub fn lookup(&self, name: &str) -> Option<&AttrValue> {
        self.pairs.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    pub fn add(&mut self, name: &str, value: AttrValue) -> Result<(), AttrError> {
        if self.has(name) {
            return Err(AttrError::Exists(name.to_string()));
        }
        self.pairs.push(Pair { name: name.to_string(), value });
        Ok(())
    }

    /**
     * Insert or replace an attribute.  A replaced attribute keeps its
     * position in the iteration order.
     */
    pub fn set(&mut self, name: &str, value: AttrValue) {
        match self.pairs.iter_mut().find(|p| p.name == name) {
            Some(p) => p.value = value,
            None => self.pairs.push(Pair { name: name.to_string(), value }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        let idx = self.pairs.iter().position(|p| p.name == name)?;
        Some(self.pairs.remove(idx).value)
    }

    pub fn add_bool(&mut self, name: &str, v: bool) -> Result<(), AttrError> {
        self.add(name, AttrValue::Bool(v))
    }

    pub fn add_u32(&mut self, name: &str, v: u32) -> Result<(), AttrError> {
        self.add(name, AttrValue::U32(v))
    }

    pub fn add_u64(&mut self, name: &str, v: u64) -> Result<(), AttrError> {
        self.add(name, AttrValue::U64(v))
    }

    pub fn add_string(&mut self, name: &str, v: &str) -> Result<(), AttrError> {
        self.add(name, AttrValue::String(v.to_string()))
    }

    pub fn add_u32_array(
        &mut self,
        name: &str,
        v: &[u32],
    ) -> Result<(), AttrError> {
        self.add(name, AttrValue::U32Array(v.to_vec()))
    }

    pub fn add_u64_array(
        &mut self,
        name: &str,
        v: &[u64],
    ) -> Result<(), AttrError> {
        self.add(name, AttrValue::U64Array(v.to_vec()))
    }

    pub fn add_string_array<S: AsRef<str>>(
        &mut self,
        name: &str,
        v: &[S],
    ) -> Result<(), AttrError> {
        let v = v.iter().map(|s| s.as_ref().to_string()).collect();
        self.add(name, AttrValue::StringArray(v))
    }

    pub fn add_list_array(
        &mut self,
        name: &str,
        v: Vec<AttrList>,
    ) -> Result<(), AttrError> {
        self.add(name, AttrValue::ListArray(v))
    }

    fn get(&self, name: &str) -> Result<&AttrValue, AttrError> {
        self.lookup(name).ok_or_else(|| AttrError::NotFound(name.to_string()))
    }

    fn wrong(name: &str, wanted: AttrType, actual: &AttrValue) -> AttrError {
        AttrError::WrongType {
            name: name.to_string(),
            wanted,
            actual: actual.attr_type(),
        }
    }

    pub fn lookup_bool(&self, name: &str) -> Result<bool, AttrError> {
        match self.get(name)? {
            AttrValue::Bool(v) => Ok(*v),
            v => Err(Self::wrong(name, AttrType::Bool, v)),
        }
    }

    pub fn lookup_u32(&self, name: &str) -> Result<u32, AttrError> {
        match self.get(name)? {
            AttrValue::U32(v) => Ok(*v),
            v => Err(Self::wrong(name, AttrType::U32, v)),
        }
    }

    pub fn lookup_u64(&self, name: &str) -> Result<u64, AttrError> {
        match self.get(name)? {
            AttrValue::U64(v) => Ok(*v),
            v => Err(Self::wrong(name, AttrType::U64, v)),
        }
    }

    pub fn lookup_string(&self, name: &str) -> Result<&str, AttrError> {
        match self.get(name)? {
            AttrValue::String(v) => Ok(v.as_str()),
            v => Err(Self::wrong(name, AttrType::String, v)),
        }
    }

    pub fn lookup_u32_array(&self, name: &str) -> Result<&[u32], AttrError> {
        match self.get(name)? {
            AttrValue::U32Array(v) => Ok(v.as_slice()),
            v => Err(Self::wrong(name, AttrType::U32Array, v)),
        }
    }

    pub fn lookup_u64_array(&self, name: &str) -> Result<&[u64], AttrError> {
        match self.get(name)? {
            AttrValue::U64Array(v) => Ok(v.as_slice()),
            v => Err(Self::wrong(name, AttrType::U64Array, v)),
        }
    }

    pub fn lookup_string_array(
        &self,
        name: &str,
    ) -> Result<&[String], AttrError> {
        match self.get(name)? {
            AttrValue::StringArray(v) => Ok(v.as_slice()),
            v => Err(Self::wrong(name, AttrType::StringArray, v)),
        }
    }

    pub fn lookup_list_array(
        &self,
        name: &str,
    ) -> Result<&[AttrList], AttrError> {
        match self.get(name)? {
            AttrValue::ListArray(v) => Ok(v.as_slice()),
            v => Err(Self::wrong(name, AttrType::ListArray, v)),
        }
    }
}

impl<'a> IntoIterator for &'a AttrList {
    type Item = &'a Pair;
    type IntoIter = std::slice::Iter<'a, Pair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

impl Serialize for AttrList {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for p in &self.pairs {
            map.serialize_entry(&p.name, &p.value)?;
        }
        map.end()
    }
}
