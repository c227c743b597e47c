//! # tixi-rs
//!
//! Rust binding for the TiXI XML library. The native library is loaded at runtime and
//! does all XML parsing, XPath evaluation and schema validation; this crate marshals
//! arguments across the C ABI and translates the integer status codes TiXI returns.
//!
//! ```no_run
//! use tixi_rs::{OpenMode, StatusCode, TixiDocument};
//!
//! let mut document = TixiDocument::new()?;
//! if document.open("aircraft.xml", OpenMode::Recursive) {
//!     let span = document.get_double_element("/cpacs/vehicles/aircraft/model/reference/length");
//!     if document.last_error() == StatusCode::Success {
//!         println!("reference length: {}", span);
//!     }
//!     document.close();
//! }
//! # Ok::<(), tixi_rs::TixiError>(())
//! ```

pub mod cli;
pub mod config;
pub mod document;
pub mod error;
pub mod native;
pub mod status;

pub use cli::{Cli, Command};
pub use config::{Config, ConfigManager, LibraryConfig, LoggingConfig};
pub use document::TixiDocument;
pub use error::{ConfigError, ConfigResult, TixiError, TixiResult};
pub use native::{
    DocumentHandle, NativeResult, NativeTixi, OpenMode, SaveMode, SchemaKind, SchemaSource,
    TixiBackend, version,
};
pub use status::StatusCode;
