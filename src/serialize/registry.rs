//! Type-keyed serializer registry.
//!
//! Lookup is by exact `TypeId` of the final type, never by a supertype or
//! trait, so a given type always converts the same way. The first
//! registration for a type wins; later ones are rejected with a warning.

use super::{Composite, FnSerializer, SerdeSerializer, Serializer};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

static EMPTY: LazyLock<SerializerRegistry> = LazyLock::new(SerializerRegistry::new);

#[derive(Clone)]
struct Entry {
    type_name: &'static str,
    /// Always an `Arc<dyn Serializer<T>>` for the entry's type.
    serializer: Arc<dyn Any + Send + Sync>,
}

/// Explicit registry instance passed to the binder; there is no global
/// mutable state.
#[derive(Clone, Default)]
pub struct SerializerRegistry {
    entries: HashMap<TypeId, Entry>,
}

impl SerializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared registry with no entries. Only built-in field types resolve
    /// against it.
    pub fn empty() -> &'static SerializerRegistry {
        &EMPTY
    }

    /// Register `serializer` for `T`. Returns `false` and keeps the existing
    /// entry when `T` is already registered.
    pub fn register<T, S>(&mut self, serializer: S) -> bool
    where
        T: 'static,
        S: Serializer<T> + 'static,
    {
        self.register_arc::<T>(Arc::new(serializer))
    }

    pub fn register_arc<T: 'static>(&mut self, serializer: Arc<dyn Serializer<T>>) -> bool {
        let type_id = TypeId::of::<T>();
        if let Some(existing) = self.entries.get(&type_id) {
            warn!(
                type_name = existing.type_name,
                "Serializer already registered, keeping the first registration"
            );
            return false;
        }
        debug!(type_name = type_name::<T>(), "Registered serializer");
        self.entries.insert(
            type_id,
            Entry {
                type_name: type_name::<T>(),
                serializer: Arc::new(serializer),
            },
        );
        true
    }

    /// Register a serializer built from two closures.
    pub fn register_fn<T, D, E>(&mut self, decode: D, encode: E) -> bool
    where
        T: 'static,
        D: Fn(&Value) -> Option<T> + Send + Sync + 'static,
        E: Fn(&T) -> Option<Value> + Send + Sync + 'static,
    {
        self.register::<T, _>(FnSerializer::new(decode, encode))
    }

    /// Register serde-based conversion for `T`.
    pub fn register_serde<T>(&mut self) -> bool
    where
        T: Serialize + DeserializeOwned + 'static,
    {
        self.register::<T, _>(SerdeSerializer::<T>::new())
    }

    pub fn register_composite<T: 'static>(&mut self, composite: Composite<T>) -> bool {
        self.register::<T, _>(composite)
    }

    pub fn get<T: 'static>(&self) -> Option<&dyn Serializer<T>> {
        let entry = self.entries.get(&TypeId::of::<T>())?;
        entry
            .serializer
            .downcast_ref::<Arc<dyn Serializer<T>>>()
            .map(|serializer| serializer.as_ref())
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.contains_type(TypeId::of::<T>())
    }

    pub fn contains_type(&self, type_id: TypeId) -> bool {
        self.entries.contains_key(&type_id)
    }

    /// Convert through the registered serializer. `None` when `T` has no
    /// serializer or the raw shape does not match.
    pub fn decode<T: 'static>(&self, raw: &Value) -> Option<T> {
        self.get::<T>()?.raw_to_final(raw)
    }

    pub fn encode<T: 'static>(&self, value: &T) -> Option<Value> {
        self.get::<T>()?.final_to_raw(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.entries.values().map(|e| e.type_name).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for SerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Celsius(f64);

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Limits {
        min: u32,
        max: u32,
    }

    #[test]
    fn test_register_and_convert() {
        let mut registry = SerializerRegistry::new();
        assert!(registry.register_fn(
            |raw: &Value| raw.as_f64().map(Celsius),
            |c: &Celsius| serde_json::Number::from_f64(c.0).map(Value::Number),
        ));
        assert!(registry.contains::<Celsius>());
        assert_eq!(registry.decode::<Celsius>(&json!(21.5)), Some(Celsius(21.5)));
        assert_eq!(registry.decode::<Celsius>(&json!("warm")), None);
        assert_eq!(registry.encode(&Celsius(3.0)), Some(json!(3.0)));
    }

    #[test]
    fn test_first_registration_wins() {
        let mut registry = SerializerRegistry::new();
        assert!(registry.register_fn(|_: &Value| Some(Celsius(1.0)), |_: &Celsius| Some(json!(1))));
        assert!(!registry.register_fn(|_: &Value| Some(Celsius(2.0)), |_: &Celsius| Some(json!(2))));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.decode::<Celsius>(&json!(null)), Some(Celsius(1.0)));
    }

    #[test]
    fn test_lookup_is_by_exact_type() {
        let mut registry = SerializerRegistry::new();
        registry.register_serde::<Limits>();
        assert!(registry.get::<Limits>().is_some());
        assert!(registry.get::<Box<Limits>>().is_none());
        assert_eq!(registry.decode::<String>(&json!("x")), None);
    }

    #[test]
    fn test_serde_registration() {
        let mut registry = SerializerRegistry::new();
        registry.register_serde::<Limits>();
        let raw = json!({"min": 1, "max": 5});
        assert_eq!(registry.decode::<Limits>(&raw), Some(Limits { min: 1, max: 5 }));
        assert_eq!(registry.decode::<Limits>(&json!({"min": "1"})), None);
        assert_eq!(registry.encode(&Limits { min: 0, max: 2 }), Some(json!({"min": 0, "max": 2})));
    }

    #[test]
    fn test_empty_registry_is_shared() {
        assert!(SerializerRegistry::empty().is_empty());
        assert!(std::ptr::eq(SerializerRegistry::empty(), SerializerRegistry::empty()));
    }

    #[test]
    fn test_type_names_sorted() {
        let mut registry = SerializerRegistry::new();
        registry.register_serde::<Limits>();
        registry.register_fn(|raw: &Value| raw.as_f64().map(Celsius), |_: &Celsius| None);
        let names = registry.type_names();
        assert_eq!(names.len(), 2);
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(format!("{:?}", registry).contains("Limits"));
    }
}
