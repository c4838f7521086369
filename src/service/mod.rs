//! Analysis engine layer
//! - traits.rs: LanguageService trait implemented by every analysis engine
//! - registry.rs: language id -> engine lookup with a default engine
//! - types.rs: Settings and custom data types shared by engines
//! - context.rs: Relative reference resolution against workspace folders
//! - fs.rs: Filesystem stat provider used to resolve imports
//! - paths.rs: File name completion inside url() and import strings
//! - custom_data.rs: Loading of custom data files
//! - stylesheet.rs: Built-in tree-sitter based engine

pub mod context;
pub mod custom_data;
pub mod error;
pub mod fs;
pub mod paths;
pub mod registry;
pub mod stylesheet;
pub mod traits;
pub mod types;

pub use context::DocumentContext;
pub use error::ServiceError;
pub use paths::complete_paths;
pub use registry::LanguageServices;
pub use stylesheet::{Stylesheet, StylesheetService};
pub use traits::LanguageService;
pub use types::{LanguageSettings, LintLevel};
