//! Declared-property composites.
//!
//! A composite describes a simple value object as a fixed, ordered list of
//! named properties plus a constructor taking exactly that many values. Its
//! raw form is a map of property name to raw property value, in declaration
//! order.
//!
//! ```
//! use config_tree::serialize::{Composite, Serializer};
//! use serde_json::json;
//!
//! #[derive(Debug, PartialEq)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//! }
//!
//! let point = Composite::<Point>::builder()
//!     .property("x", |p: &Point| p.x)
//!     .property("y", |p: &Point| p.y)
//!     .constructor(2, |values| Some(Point { x: values.get("x")?, y: values.get("y")? }))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(point.raw_to_final(&json!({"x": 1, "y": 2})), Some(Point { x: 1, y: 2 }));
//! assert_eq!(point.final_to_raw(&Point { x: 3, y: 4 }), Some(json!({"x": 3, "y": 4})));
//! ```

use super::{FieldType, Serializer, SerializerRegistry, TypeDescriptor};
use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::any::type_name;
use std::collections::HashSet;

type Getter<T> = Box<dyn Fn(&T) -> Option<Value> + Send + Sync>;
type Constructor<T> = Box<dyn Fn(&PropertyValues<'_>) -> Option<T> + Send + Sync>;

struct Property<T> {
    name: String,
    descriptor: TypeDescriptor,
    getter: Getter<T>,
}

/// Raw property values handed to a composite constructor, in declaration
/// order. Missing properties read as `None`.
#[derive(Debug)]
pub struct PropertyValues<'a> {
    entries: Vec<(&'a str, Option<&'a Value>)>,
}

impl<'a> PropertyValues<'a> {
    /// Decode the property `name`. Property values are converted with the
    /// built-in field types only.
    pub fn get<P: FieldType>(&self, name: &str) -> Option<P> {
        P::decode(self.raw(name)?, SerializerRegistry::empty())
    }

    /// Decode the property at declaration position `index`.
    pub fn at<P: FieldType>(&self, index: usize) -> Option<P> {
        let (_, raw) = self.entries.get(index)?;
        P::decode((*raw)?, SerializerRegistry::empty())
    }

    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .and_then(|(_, raw)| *raw)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serializer for a declared-property composite.
pub struct Composite<T> {
    type_name: &'static str,
    properties: Vec<Property<T>>,
    constructor: Constructor<T>,
}

impl<T: 'static> Composite<T> {
    pub fn builder() -> CompositeBuilder<T> {
        CompositeBuilder {
            type_name: type_name::<T>(),
            properties: Vec::new(),
            constructor: None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }

    /// Descriptor of each property, in declaration order.
    pub fn property_descriptors(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.properties
            .iter()
            .map(|p| (p.name.as_str(), &p.descriptor))
    }
}

impl<T: 'static> Serializer<T> for Composite<T> {
    fn raw_to_final(&self, raw: &Value) -> Option<T> {
        let map = raw.as_object()?;
        let values = PropertyValues {
            entries: self
                .properties
                .iter()
                .map(|p| (p.name.as_str(), map.get(&p.name)))
                .collect(),
        };
        (self.constructor)(&values)
    }

    /// Properties whose getter yields no value are left out of the map.
    fn final_to_raw(&self, value: &T) -> Option<Value> {
        let mut map = Map::new();
        for property in &self.properties {
            if let Some(raw) = (property.getter)(value) {
                map.insert(property.name.clone(), raw);
            }
        }
        Some(Value::Object(map))
    }
}

/// Builder for [`Composite`].
pub struct CompositeBuilder<T> {
    type_name: &'static str,
    properties: Vec<Property<T>>,
    constructor: Option<(usize, Constructor<T>)>,
}

impl<T: 'static> CompositeBuilder<T> {
    /// Declare the next property and how to read it from a value.
    pub fn property<P, F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        P: FieldType,
        F: Fn(&T) -> P + Send + Sync + 'static,
    {
        self.properties.push(Property {
            name: name.into(),
            descriptor: P::descriptor(),
            getter: Box::new(move |value: &T| {
                let property = getter(value);
                if property.is_present() {
                    property.encode(SerializerRegistry::empty())
                } else {
                    None
                }
            }),
        });
        self
    }

    /// Declare the constructor and the number of values it takes.
    pub fn constructor<F>(mut self, arity: usize, constructor: F) -> Self
    where
        F: Fn(&PropertyValues<'_>) -> Option<T> + Send + Sync + 'static,
    {
        let constructor: Constructor<T> = Box::new(constructor);
        self.constructor = Some((arity, constructor));
        self
    }

    /// Fails with `ConstructorMismatch` when no constructor is declared or
    /// its arity differs from the property count, and with `DuplicatePath`
    /// when a property name repeats.
    pub fn build(self) -> ConfigResult<Composite<T>> {
        {
            let mut seen = HashSet::new();
            for property in &self.properties {
                if !seen.insert(property.name.as_str()) {
                    return Err(ConfigError::duplicate_path(&property.name)
                        .with_details(format!("declared twice on {}", self.type_name)));
                }
            }
        }

        let count = self.properties.len();
        let constructor = match self.constructor {
            Some((arity, constructor)) if arity == count => constructor,
            Some((arity, _)) => {
                return Err(ConfigError::constructor_mismatch(
                    self.type_name,
                    count,
                    Some(arity),
                ));
            }
            None => return Err(ConfigError::constructor_mismatch(self.type_name, count, None)),
        };

        Ok(Composite {
            type_name: self.type_name,
            properties: self.properties,
            constructor,
        })
    }
}
