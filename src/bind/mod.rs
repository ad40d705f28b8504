//! Field binding: keeping plain struct fields and tree values in sync.
//!
//! A type opts in by implementing [`Configurable`] and listing its fields in
//! [`Configurable::bind_fields`]. The list is plain data (name, path
//! override, comment, exclude flag and a mutable handle to the field) that
//! [`ConfigBinder`] walks once per load pass:
//!
//! ```
//! use config_tree::bind::{ConfigBinder, Configurable, Fields};
//! use config_tree::tree::{ConfigSection, Configuration};
//!
//! struct Settings {
//!     retries: i32,
//!     names: Vec<String>,
//! }
//!
//! impl Configurable for Settings {
//!     fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>) {
//!         fields.field("retries", &mut self.retries).comment("Attempts before giving up");
//!         fields.field("names", &mut self.names);
//!     }
//! }
//!
//! let mut settings = Settings { retries: 3, names: Vec::new() };
//! let mut config = Configuration::new();
//! let report = ConfigBinder::default().load(&mut settings, &mut config).unwrap();
//!
//! assert_eq!(config.get_i64("retries"), Some(3));
//! assert!(report.is_dirty());
//! ```

mod dispatcher;
mod loader;

pub use dispatcher::{ConfigBinder, DEFAULT_MAX_DEPTH, LoadReport};
pub use loader::{
    FieldLoader, FieldSite, LoaderChain, MapLoader, Outcome, ScalarLoader, SectionLoader,
    SequenceLoader, SerializerLoader, reconcile_value,
};

use crate::serialize::{FieldType, Serializer, SerializerRegistry, TypeDescriptor};
use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase};
use serde_json::Value;
use std::sync::Arc;

/// A type whose fields bind to a configuration section.
pub trait Configurable {
    /// Declare every bound field. Called once per load or store pass.
    fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>);
}

/// Type-erased handle to one bound field.
pub trait BoundField {
    fn descriptor(&self) -> TypeDescriptor;

    /// False only for fields that hold no value (an empty `Option`).
    fn is_present(&self) -> bool;

    /// Raw form of the current value.
    fn encode(&self, registry: &SerializerRegistry) -> Option<Value>;

    /// Convert `raw` and store it in the field. Returns `false`, leaving the
    /// field untouched, when the conversion misses.
    fn assign(&mut self, raw: &Value, registry: &SerializerRegistry) -> bool;

    /// True when the field carries its own serializer.
    fn has_serializer_override(&self) -> bool {
        false
    }

    /// The nested holder, for fields bound with [`Fields::section`].
    fn as_holder(&mut self) -> Option<&mut dyn Configurable> {
        None
    }
}

struct Slot<'a, T> {
    value: &'a mut T,
}

impl<T: FieldType> BoundField for Slot<'_, T> {
    fn descriptor(&self) -> TypeDescriptor {
        T::descriptor()
    }

    fn is_present(&self) -> bool {
        self.value.is_present()
    }

    fn encode(&self, registry: &SerializerRegistry) -> Option<Value> {
        self.value.encode(registry)
    }

    fn assign(&mut self, raw: &Value, registry: &SerializerRegistry) -> bool {
        match T::decode(raw, registry) {
            Some(value) => {
                *self.value = value;
                true
            }
            None => false,
        }
    }
}

struct OverrideSlot<'a, T> {
    value: &'a mut T,
    serializer: Arc<dyn Serializer<T>>,
}

impl<T: 'static> BoundField for OverrideSlot<'_, T> {
    fn descriptor(&self) -> TypeDescriptor {
        TypeDescriptor::custom::<T>()
    }

    fn is_present(&self) -> bool {
        true
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        self.serializer.final_to_raw(&*self.value)
    }

    fn assign(&mut self, raw: &Value, _registry: &SerializerRegistry) -> bool {
        match self.serializer.raw_to_final(raw) {
            Some(value) => {
                *self.value = value;
                true
            }
            None => false,
        }
    }

    fn has_serializer_override(&self) -> bool {
        true
    }
}

struct HolderSlot<'a> {
    holder: &'a mut dyn Configurable,
    descriptor: TypeDescriptor,
}

impl BoundField for HolderSlot<'_> {
    fn descriptor(&self) -> TypeDescriptor {
        self.descriptor.clone()
    }

    fn is_present(&self) -> bool {
        true
    }

    fn encode(&self, _registry: &SerializerRegistry) -> Option<Value> {
        None
    }

    fn assign(&mut self, _raw: &Value, _registry: &SerializerRegistry) -> bool {
        false
    }

    fn as_holder(&mut self) -> Option<&mut dyn Configurable> {
        let holder: &mut dyn Configurable = &mut *self.holder;
        Some(holder)
    }
}

/// One declared field.
pub(crate) struct Binding<'a> {
    pub(crate) name: String,
    pub(crate) path: Option<String>,
    pub(crate) comment: Option<String>,
    pub(crate) exclude: bool,
    pub(crate) field: Box<dyn BoundField + 'a>,
}

/// Collector passed to [`Configurable::bind_fields`].
#[derive(Default)]
pub struct Fields<'a> {
    bindings: Vec<Binding<'a>>,
}

impl<'a> Fields<'a> {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Bind a field converted by its [`FieldType`] implementation.
    pub fn field<T: FieldType>(
        &mut self,
        name: impl Into<String>,
        value: &'a mut T,
    ) -> FieldOptions<'_, 'a> {
        self.bind(name, Box::new(Slot { value }))
    }

    /// Bind a field converted by `serializer` instead of its type's default
    /// conversion. The type does not need a [`FieldType`] implementation.
    pub fn field_with<T, S>(
        &mut self,
        name: impl Into<String>,
        value: &'a mut T,
        serializer: S,
    ) -> FieldOptions<'_, 'a>
    where
        T: 'static,
        S: Serializer<T> + 'static,
    {
        self.bind(
            name,
            Box::new(OverrideSlot {
                value,
                serializer: Arc::new(serializer),
            }),
        )
    }

    /// Bind a nested holder. Its own fields bind into a child section named
    /// after this field.
    pub fn section<H: Configurable + 'static>(
        &mut self,
        name: impl Into<String>,
        holder: &'a mut H,
    ) -> FieldOptions<'_, 'a> {
        self.bind(
            name,
            Box::new(HolderSlot {
                holder,
                descriptor: TypeDescriptor::section::<H>(),
            }),
        )
    }

    /// Bind an arbitrary [`BoundField`] implementation.
    pub fn bind(
        &mut self,
        name: impl Into<String>,
        field: Box<dyn BoundField + 'a>,
    ) -> FieldOptions<'_, 'a> {
        self.bindings.push(Binding {
            name: name.into(),
            path: None,
            comment: None,
            exclude: false,
            field,
        });
        let index = self.bindings.len() - 1;
        FieldOptions {
            binding: &mut self.bindings[index],
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub(crate) fn into_bindings(self) -> Vec<Binding<'a>> {
        self.bindings
    }
}

/// Per-field metadata, set right after declaring the field.
pub struct FieldOptions<'f, 'a> {
    binding: &'f mut Binding<'a>,
}

impl FieldOptions<'_, '_> {
    /// Bind at `path` (relative to the owning section) instead of the field
    /// name. The path is used verbatim, without key styling.
    pub fn path(self, path: impl Into<String>) -> Self {
        self.binding.path = Some(path.into());
        self
    }

    /// Comment written above the value when the tree is saved.
    pub fn comment(self, comment: impl Into<String>) -> Self {
        self.binding.comment = Some(comment.into());
        self
    }

    /// Skip this field entirely.
    pub fn exclude(self) -> Self {
        self.binding.exclude = true;
        self
    }
}

/// How a field name becomes a path segment when no path override is given.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStyle {
    #[default]
    AsIs,
    KebabCase,
    SnakeCase,
    CamelCase,
}

impl KeyStyle {
    pub fn apply(&self, name: &str) -> String {
        match self {
            KeyStyle::AsIs => name.to_string(),
            KeyStyle::KebabCase => name.to_kebab_case(),
            KeyStyle::SnakeCase => name.to_snake_case(),
            KeyStyle::CamelCase => name.to_lower_camel_case(),
        }
    }
}

impl std::str::FromStr for KeyStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "as-is" | "asis" | "none" => Ok(KeyStyle::AsIs),
            "kebab" | "kebab-case" => Ok(KeyStyle::KebabCase),
            "snake" | "snake_case" => Ok(KeyStyle::SnakeCase),
            "camel" | "camelcase" => Ok(KeyStyle::CamelCase),
            _ => Err(format!("Unknown key style: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::{FnSerializer, TypeKind};
    use serde_json::json;

    struct Inner {
        flag: bool,
    }

    impl Configurable for Inner {
        fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields.field("flag", &mut self.flag);
        }
    }

    struct Outer {
        count: u32,
        inner: Inner,
        skipped: String,
    }

    impl Configurable for Outer {
        fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields.field("count", &mut self.count).comment("how many");
            fields.section("inner", &mut self.inner).path("nested.inner");
            fields.field("skipped", &mut self.skipped).exclude();
        }
    }

    #[test]
    fn test_fields_collect_metadata() {
        let mut outer = Outer {
            count: 1,
            inner: Inner { flag: false },
            skipped: String::new(),
        };
        let mut fields = Fields::new();
        outer.bind_fields(&mut fields);
        assert_eq!(fields.len(), 3);

        let bindings = fields.into_bindings();
        assert_eq!(bindings[0].name, "count");
        assert_eq!(bindings[0].comment.as_deref(), Some("how many"));
        assert_eq!(bindings[1].path.as_deref(), Some("nested.inner"));
        assert_eq!(bindings[1].field.descriptor().kind, TypeKind::Section);
        assert!(bindings[2].exclude);
    }

    #[test]
    fn test_slot_assign_leaves_field_on_miss() {
        let mut value = 3i32;
        let registry = SerializerRegistry::new();
        {
            let mut slot = Slot { value: &mut value };
            assert!(!slot.assign(&json!("ten"), &registry));
            assert!(slot.assign(&json!(7), &registry));
            assert_eq!(slot.encode(&registry), Some(json!(7)));
        }
        assert_eq!(value, 7);
    }

    #[test]
    fn test_override_slot_uses_its_serializer() {
        let mut value = 8080u16;
        let registry = SerializerRegistry::new();
        let serializer = FnSerializer::new(
            |raw: &Value| raw.as_str()?.parse::<u16>().ok(),
            |port: &u16| Some(Value::String(port.to_string())),
        );
        {
            let mut slot = OverrideSlot {
                value: &mut value,
                serializer: Arc::new(serializer),
            };
            assert!(slot.has_serializer_override());
            assert_eq!(slot.encode(&registry), Some(json!("8080")));
            assert!(!slot.assign(&json!(9090), &registry));
            assert!(slot.assign(&json!("9090"), &registry));
        }
        assert_eq!(value, 9090);
    }

    #[test]
    fn test_key_styles() {
        assert_eq!(KeyStyle::AsIs.apply("max_retries"), "max_retries");
        assert_eq!(KeyStyle::KebabCase.apply("max_retries"), "max-retries");
        assert_eq!(KeyStyle::CamelCase.apply("max_retries"), "maxRetries");
        assert_eq!(KeyStyle::SnakeCase.apply("maxRetries"), "max_retries");
        assert_eq!("kebab".parse::<KeyStyle>(), Ok(KeyStyle::KebabCase));
        assert!("shouting".parse::<KeyStyle>().is_err());
    }
}
