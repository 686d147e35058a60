pub mod cancel;
pub mod config;
pub mod dates;
pub mod engine;
pub mod error;
pub mod flatten;
pub mod llm;
pub mod profile;
pub mod read;
pub mod report;
pub mod rules;
pub mod value;

// Re-export key types for convenience
pub use cancel::CancelToken;
pub use engine::{ScanMode, ScanOptions, Scanner};
pub use error::{FieldLensError, Result};
pub use report::ScanReport;
pub use rules::loader::RuleLoader;
pub use rules::registry::FnRegistry;
pub use rules::RuleSet;
pub use value::{Record, Value};
