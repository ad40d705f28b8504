//! Config Tree Library
//!
//! Hierarchical, path-addressed configuration with a defaults overlay,
//! pluggable value serializers and a field binder that reconciles program
//! fields against the stored tree.
//!
//! ```
//! use config_tree::bind::{ConfigBinder, Configurable, Fields};
//! use config_tree::tree::{ConfigSection, ConfigSectionMut, Configuration};
//!
//! #[derive(Default)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl Configurable for Server {
//!     fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>) {
//!         fields.field("host", &mut self.host);
//!         fields.field("port", &mut self.port);
//!     }
//! }
//!
//! let mut config = Configuration::new();
//! config.set("port", 8080).unwrap();
//!
//! let mut server = Server { host: "localhost".into(), port: 80 };
//! ConfigBinder::default().load(&mut server, &mut config).unwrap();
//!
//! assert_eq!(server.port, 8080);
//! assert_eq!(config.get_string("host").as_deref(), Some("localhost"));
//! ```

pub mod bind;
pub mod cli;
pub mod error;
pub mod file;
pub mod format;
pub mod logging;
pub mod path;
pub mod serialize;
pub mod tree;
pub mod watcher;

pub use bind::{ConfigBinder, Configurable, Fields, LoadReport};
pub use error::{ConfigError, ConfigResult, ErrorCode};
pub use file::ConfigFile;
pub use format::Format;
pub use path::PathKey;
pub use serde_json::{Map, Value};
pub use serialize::{Serializer, SerializerRegistry};
pub use tree::{ConfigOptions, ConfigSection, ConfigSectionMut, Configuration};
