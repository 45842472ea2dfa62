pub mod buffer;
pub mod builtin;
pub mod config;
pub mod error;
pub mod generation;
pub mod matcher;
pub mod measurements;
pub mod models;
pub mod registry;
pub mod session;
pub mod storage;
pub mod substitution;
pub mod templates;

// Re-export common items for convenience
pub use buffer::{ReportStats, TextBuffer};
pub use config::{get_config_dir, EditorConfig, TRIGGER_SENTINEL};
pub use error::{RadtextError, Result};
pub use generation::{CommandGenerator, Generation, GenerationAction, OfflineGenerator, TextGenerator};
pub use matcher::{ChangeOutcome, Expansion, ExpansionMatcher, KeyInput, KeyOutcome, SeparatorPolicy};
pub use measurements::{Measurement, MeasurementLog};
pub use models::{FieldValue, Modality, Scalar, Template, TemplateType, TriggerDefinition, TriggerInput};
pub use registry::TriggerRegistry;
pub use session::EditorSession;
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
pub use substitution::{resolve, FieldValueMap};
pub use templates::{TemplateFilter, TemplateStore};
