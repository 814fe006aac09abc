//! Logging setup.
//!
//! The database logs through `tracing` macros and never installs a
//! subscriber itself. Applications and tests that want the output call
//! [`init_tracing`] once.
//!
//! Format is controlled via `IDMAIN_LOG_FORMAT`:
//! - `json` - Structured JSON output
//! - `pretty` - Human-readable multi-line output (default for a TTY)
//! - `compact` - Single-line output (default otherwise)
//!
//! # Example
//!
//! ```no_run
//! use idmain_core::observability::{LogFormat, TracingConfig, init_tracing};
//!
//! let config = TracingConfig::builder()
//!     .log_format(LogFormat::Json)
//!     .log_filter("idmain_core=debug")
//!     .build();
//! init_tracing(config)?;
//! # Ok::<(), idmain_core::MainError>(())
//! ```

mod config;
mod setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use setup::init_tracing;
