//! Bindable field types and their descriptors.
//!
//! A [`TypeDescriptor`] is resolved once per bound type and tells the loader
//! chain what kind of value a field holds without any runtime inspection of
//! the value itself.

use super::SerializerRegistry;
use serde_json::{Map, Number, Value};
use std::any::{TypeId, type_name};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::path::PathBuf;

/// Scalar flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    Integer,
    Float,
    Char,
    String,
    Path,
}

/// Capability tag of a bindable type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    /// A single scalar value.
    Scalar(ScalarKind),
    /// Any raw value, stored as is.
    Raw,
    /// Homogeneous ordered sequence.
    Sequence(Box<TypeDescriptor>),
    /// Map with scalar keys and homogeneous values.
    Map {
        key: ScalarKind,
        value: Box<TypeDescriptor>,
    },
    /// Nested holder whose own fields bind into a child section.
    Section,
    /// Converted by a serializer from the registry.
    Custom,
}

/// Type token plus capability tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_id: TypeId,
    pub type_name: &'static str,
    pub kind: TypeKind,
}

impl TypeDescriptor {
    pub fn of<T: 'static>(kind: TypeKind) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            kind,
        }
    }

    pub fn custom<T: 'static>() -> Self {
        Self::of::<T>(TypeKind::Custom)
    }

    pub fn section<T: 'static>() -> Self {
        Self::of::<T>(TypeKind::Section)
    }

    /// Whether every custom type reachable from this descriptor has a
    /// serializer in `registry`.
    pub fn is_resolvable(&self, registry: &SerializerRegistry) -> bool {
        match &self.kind {
            TypeKind::Custom => registry.contains_type(self.type_id),
            TypeKind::Sequence(element) => element.is_resolvable(registry),
            TypeKind::Map { value, .. } => value.is_resolvable(registry),
            TypeKind::Scalar(_) | TypeKind::Raw | TypeKind::Section => true,
        }
    }
}

/// A type that a bound field can have.
pub trait FieldType: Sized + 'static {
    fn descriptor() -> TypeDescriptor;

    /// Convert a raw value. `None` when the shape does not match; for
    /// containers a single bad element fails the whole conversion.
    fn decode(raw: &Value, registry: &SerializerRegistry) -> Option<Self>;

    fn encode(&self, registry: &SerializerRegistry) -> Option<Value>;

    /// Whether the field currently holds a value. Only `Option` can be
    /// absent.
    fn is_present(&self) -> bool {
        true
    }
}

impl FieldType for bool {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<bool>(TypeKind::Scalar(ScalarKind::Bool))
    }

    fn decode(raw: &Value, _registry: &SerializerRegistry) -> Option<Self> {
        raw.as_bool()
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        Some(Value::Bool(*self))
    }
}

macro_rules! integer_field_types {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldType for $ty {
                fn descriptor() -> TypeDescriptor {
                    TypeDescriptor::of::<$ty>(TypeKind::Scalar(ScalarKind::Integer))
                }

                fn decode(raw: &Value, _registry: &SerializerRegistry) -> Option<Self> {
                    let Value::Number(number) = raw else {
                        return None;
                    };
                    if let Some(n) = number.as_i64() {
                        <$ty>::try_from(n).ok()
                    } else {
                        number.as_u64().and_then(|n| <$ty>::try_from(n).ok())
                    }
                }

                fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
                    Some(Value::from(*self))
                }
            }
        )*
    };
}

integer_field_types!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FieldType for f64 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<f64>(TypeKind::Scalar(ScalarKind::Float))
    }

    fn decode(raw: &Value, _registry: &SerializerRegistry) -> Option<Self> {
        raw.as_f64()
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        Number::from_f64(*self).map(Value::Number)
    }
}

impl FieldType for f32 {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<f32>(TypeKind::Scalar(ScalarKind::Float))
    }

    fn decode(raw: &Value, _registry: &SerializerRegistry) -> Option<Self> {
        let value = raw.as_f64()?;
        let narrowed = value as f32;
        narrowed.is_finite().then_some(narrowed)
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        Number::from_f64(f64::from(*self)).map(Value::Number)
    }
}

impl FieldType for char {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<char>(TypeKind::Scalar(ScalarKind::Char))
    }

    fn decode(raw: &Value, _registry: &SerializerRegistry) -> Option<Self> {
        let mut chars = raw.as_str()?.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        Some(Value::String(self.to_string()))
    }
}

impl FieldType for String {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<String>(TypeKind::Scalar(ScalarKind::String))
    }

    fn decode(raw: &Value, _registry: &SerializerRegistry) -> Option<Self> {
        raw.as_str().map(str::to_string)
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        Some(Value::String(self.clone()))
    }
}

impl FieldType for PathBuf {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<PathBuf>(TypeKind::Scalar(ScalarKind::Path))
    }

    fn decode(raw: &Value, _registry: &SerializerRegistry) -> Option<Self> {
        raw.as_str().map(PathBuf::from)
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        self.to_str().map(|s| Value::String(s.to_string()))
    }
}

impl FieldType for Value {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<Value>(TypeKind::Raw)
    }

    fn decode(raw: &Value, _registry: &SerializerRegistry) -> Option<Self> {
        (!raw.is_null()).then(|| raw.clone())
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        (!self.is_null()).then(|| self.clone())
    }

    fn is_present(&self) -> bool {
        !self.is_null()
    }
}

impl<T: FieldType> FieldType for Option<T> {
    fn descriptor() -> TypeDescriptor {
        T::descriptor()
    }

    fn decode(raw: &Value, registry: &SerializerRegistry) -> Option<Self> {
        T::decode(raw, registry).map(Some)
    }

    fn encode(&self, registry: &SerializerRegistry) -> Option<Value> {
        self.as_ref()?.encode(registry)
    }

    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(FieldType::is_present)
    }
}

impl<T: FieldType> FieldType for Vec<T> {
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<Vec<T>>(TypeKind::Sequence(Box::new(T::descriptor())))
    }

    fn decode(raw: &Value, registry: &SerializerRegistry) -> Option<Self> {
        raw.as_array()?
            .iter()
            .map(|item| T::decode(item, registry))
            .collect()
    }

    fn encode(&self, registry: &SerializerRegistry) -> Option<Value> {
        self.iter()
            .map(|item| item.encode(registry))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array)
    }
}

/// Types usable as map keys. Keys are stored as strings.
pub trait MapKey: Sized + 'static {
    fn key_kind() -> ScalarKind;
    fn from_key(key: &str) -> Option<Self>;
    fn to_key(&self) -> String;
}

impl MapKey for String {
    fn key_kind() -> ScalarKind {
        ScalarKind::String
    }

    fn from_key(key: &str) -> Option<Self> {
        Some(key.to_string())
    }

    fn to_key(&self) -> String {
        self.clone()
    }
}

impl MapKey for bool {
    fn key_kind() -> ScalarKind {
        ScalarKind::Bool
    }

    fn from_key(key: &str) -> Option<Self> {
        key.parse().ok()
    }

    fn to_key(&self) -> String {
        self.to_string()
    }
}

impl MapKey for char {
    fn key_kind() -> ScalarKind {
        ScalarKind::Char
    }

    fn from_key(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }

    fn to_key(&self) -> String {
        self.to_string()
    }
}

macro_rules! integer_map_keys {
    ($($ty:ty),* $(,)?) => {
        $(
            impl MapKey for $ty {
                fn key_kind() -> ScalarKind {
                    ScalarKind::Integer
                }

                fn from_key(key: &str) -> Option<Self> {
                    key.parse().ok()
                }

                fn to_key(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

integer_map_keys!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

fn decode_entries<K, V>(
    raw: &Value,
    registry: &SerializerRegistry,
) -> Option<impl Iterator<Item = Option<(K, V)>>>
where
    K: MapKey,
    V: FieldType,
{
    let map = raw.as_object()?;
    Some(
        map.iter()
            .map(move |(k, v)| Some((K::from_key(k)?, V::decode(v, registry)?))),
    )
}

fn encode_entries<'a, K, V>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
    registry: &SerializerRegistry,
) -> Option<Map<String, Value>>
where
    K: MapKey,
    V: FieldType,
{
    entries
        .map(|(k, v)| Some((k.to_key(), v.encode(registry)?)))
        .collect()
}

impl<K, V> FieldType for HashMap<K, V>
where
    K: MapKey + Eq + Hash,
    V: FieldType,
{
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<HashMap<K, V>>(TypeKind::Map {
            key: K::key_kind(),
            value: Box::new(V::descriptor()),
        })
    }

    fn decode(raw: &Value, registry: &SerializerRegistry) -> Option<Self> {
        decode_entries(raw, registry)?.collect()
    }

    /// Entries are written sorted by key so saved files are stable.
    fn encode(&self, registry: &SerializerRegistry) -> Option<Value> {
        let mut entries: Vec<(&K, &V)> = self.iter().collect();
        entries.sort_by_key(|(k, _)| k.to_key());
        encode_entries(entries.into_iter(), registry).map(Value::Object)
    }
}

impl<K, V> FieldType for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: FieldType,
{
    fn descriptor() -> TypeDescriptor {
        TypeDescriptor::of::<BTreeMap<K, V>>(TypeKind::Map {
            key: K::key_kind(),
            value: Box::new(V::descriptor()),
        })
    }

    fn decode(raw: &Value, registry: &SerializerRegistry) -> Option<Self> {
        decode_entries(raw, registry)?.collect()
    }

    fn encode(&self, registry: &SerializerRegistry) -> Option<Value> {
        encode_entries(self.iter(), registry).map(Value::Object)
    }
}

/// Implement [`FieldType`] for types converted by a registered serializer.
///
/// ```
/// use config_tree::registered_type;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Color(u8, u8, u8);
///
/// registered_type!(Color);
/// ```
#[macro_export]
macro_rules! registered_type {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::serialize::FieldType for $ty {
                fn descriptor() -> $crate::serialize::TypeDescriptor {
                    $crate::serialize::TypeDescriptor::custom::<$ty>()
                }

                fn decode(
                    raw: &$crate::Value,
                    registry: &$crate::serialize::SerializerRegistry,
                ) -> ::std::option::Option<Self> {
                    registry.decode::<$ty>(raw)
                }

                fn encode(
                    &self,
                    registry: &$crate::serialize::SerializerRegistry,
                ) -> ::std::option::Option<$crate::Value> {
                    registry.encode::<$ty>(self)
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode<T: FieldType>(raw: Value) -> Option<T> {
        T::decode(&raw, &SerializerRegistry::new())
    }

    #[test]
    fn test_integers_are_strict() {
        assert_eq!(decode::<i32>(json!(3)), Some(3));
        assert_eq!(decode::<i32>(json!("ten")), None);
        assert_eq!(decode::<i32>(json!("3")), None);
        assert_eq!(decode::<i32>(json!(3.5)), None);
        assert_eq!(decode::<u8>(json!(300)), None);
        assert_eq!(decode::<u8>(json!(-1)), None);
        assert_eq!(decode::<u64>(json!(u64::MAX)), Some(u64::MAX));
    }

    #[test]
    fn test_floats_accept_integers() {
        assert_eq!(decode::<f64>(json!(2)), Some(2.0));
        assert_eq!(decode::<f32>(json!(0.5)), Some(0.5));
        assert_eq!(decode::<f64>(json!("0.5")), None);
        assert_eq!(f64::NAN.encode(&SerializerRegistry::new()), None);
    }

    #[test]
    fn test_strings_and_chars() {
        assert_eq!(decode::<String>(json!("x")), Some("x".to_string()));
        assert_eq!(decode::<String>(json!(1)), None);
        assert_eq!(decode::<char>(json!("x")), Some('x'));
        assert_eq!(decode::<char>(json!("xy")), None);
        assert_eq!(decode::<bool>(json!("true")), None);
    }

    #[test]
    fn test_sequence_fails_on_single_bad_element() {
        assert_eq!(decode::<Vec<String>>(json!(["a", "b"])), Some(vec!["a".into(), "b".into()]));
        assert_eq!(decode::<Vec<String>>(json!(["a", 2])), None);
        assert_eq!(decode::<Vec<String>>(json!([1, 2, 3])), None);
        assert_eq!(decode::<Vec<String>>(json!([])), Some(Vec::new()));
        assert_eq!(decode::<Vec<String>>(json!("a")), None);
    }

    #[test]
    fn test_maps_check_keys_and_values() {
        let decoded: BTreeMap<u16, bool> = decode(json!({"1": true, "2": false})).unwrap();
        assert_eq!(decoded.get(&2), Some(&false));
        assert_eq!(decode::<BTreeMap<u16, bool>>(json!({"x": true})), None);
        assert_eq!(decode::<HashMap<String, i64>>(json!({"a": 1, "b": "2"})), None);
        assert_eq!(decode::<HashMap<String, i64>>(json!({})), Some(HashMap::new()));
    }

    #[test]
    fn test_hash_map_encodes_sorted() {
        let mut map = HashMap::new();
        map.insert("b".to_string(), 2);
        map.insert("a".to_string(), 1);
        let encoded = map.encode(&SerializerRegistry::new()).unwrap();
        let keys: Vec<&String> = encoded.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn test_option_presence() {
        assert!(!None::<i32>.is_present());
        assert!(Some(1).is_present());
        assert_eq!(None::<i32>.encode(&SerializerRegistry::new()), None);
        assert_eq!(decode::<Option<i32>>(json!(4)), Some(Some(4)));
        assert_eq!(Option::<i32>::descriptor().kind, i32::descriptor().kind);
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(
            Vec::<String>::descriptor().kind,
            TypeKind::Sequence(Box::new(String::descriptor()))
        );
        let map = BTreeMap::<i32, Vec<bool>>::descriptor();
        match map.kind {
            TypeKind::Map { key, value } => {
                assert_eq!(key, ScalarKind::Integer);
                assert!(matches!(value.kind, TypeKind::Sequence(_)));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(Value::descriptor().kind, TypeKind::Raw);
    }

    #[test]
    fn test_unregistered_custom_is_not_resolvable() {
        struct Widget;
        let registry = SerializerRegistry::new();
        let descriptor = Vec::<Option<bool>>::descriptor();
        assert!(descriptor.is_resolvable(&registry));
        let custom = TypeDescriptor::of::<Vec<Widget>>(TypeKind::Sequence(Box::new(
            TypeDescriptor::custom::<Widget>(),
        )));
        assert!(!custom.is_resolvable(&registry));
    }
}
