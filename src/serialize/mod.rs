//! Conversion between raw tree values and typed field values.
//!
//! Two layers cooperate here:
//! - [`FieldType`] is implemented by every type a field can have. Built-in
//!   scalars and containers convert structurally; other types delegate to
//!   the registry (see [`registered_type!`](crate::registered_type)).
//! - [`SerializerRegistry`] maps a concrete type to a [`Serializer`] that
//!   converts it to and from a raw value.
//!
//! Decoding is always partial: a raw value of the wrong shape yields `None`,
//! never an error or a panic.

mod composite;
mod registry;
mod types;

pub use composite::{Composite, CompositeBuilder, PropertyValues};
pub use registry::SerializerRegistry;
pub use types::{FieldType, MapKey, ScalarKind, TypeDescriptor, TypeKind};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

/// Converter between a raw value and a final (domain) value.
pub trait Serializer<T>: Send + Sync {
    /// Partial: `None` when `raw` does not have the expected shape.
    fn raw_to_final(&self, raw: &Value) -> Option<T>;

    /// Expected to succeed for well-formed values.
    fn final_to_raw(&self, value: &T) -> Option<Value>;
}

/// Serializer built from a pair of closures.
pub struct FnSerializer<T, D, E> {
    decode: D,
    encode: E,
    _marker: PhantomData<fn() -> T>,
}

impl<T, D, E> FnSerializer<T, D, E>
where
    D: Fn(&Value) -> Option<T> + Send + Sync,
    E: Fn(&T) -> Option<Value> + Send + Sync,
{
    pub fn new(decode: D, encode: E) -> Self {
        Self {
            decode,
            encode,
            _marker: PhantomData,
        }
    }
}

impl<T, D, E> Serializer<T> for FnSerializer<T, D, E>
where
    D: Fn(&Value) -> Option<T> + Send + Sync,
    E: Fn(&T) -> Option<Value> + Send + Sync,
{
    fn raw_to_final(&self, raw: &Value) -> Option<T> {
        (self.decode)(raw)
    }

    fn final_to_raw(&self, value: &T) -> Option<Value> {
        (self.encode)(value)
    }
}

/// Serializer for any serde-enabled type.
pub struct SerdeSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SerdeSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Serializer<T> for SerdeSerializer<T>
where
    T: Serialize + DeserializeOwned,
{
    fn raw_to_final(&self, raw: &Value) -> Option<T> {
        serde_json::from_value(raw.clone()).ok()
    }

    fn final_to_raw(&self, value: &T) -> Option<Value> {
        serde_json::to_value(value).ok().filter(|v| !v.is_null())
    }
}
