//! Configuration, storage, and text helpers shared by the schemaform crates.

pub mod config;
pub mod html;
pub mod names;
pub mod path_processing;
pub mod storage;

pub use config::{ConfigError, FormsConfig, UnionStyle};
pub use html::escape_html;
pub use names::{ROOT_MODEL_PREFIX, reference_name_variants};
pub use path_processing::{default_config_dir, expand_tilde};
pub use storage::{FormStorage, InMemoryStorage, JsonFileStorage, StorageError, StoredForms};
