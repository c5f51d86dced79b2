//! Command-line interface.
//!
//! ```ignore
//! use benchscope::cli::{parse_args, CliCommand};
//!
//! match parse_args(std::env::args()) {
//!     CliCommand::Version => benchscope::cli::handle_version_command(),
//!     CliCommand::Invalid(message) => eprintln!("Error: {}", message),
//!     CliCommand::Watch(options) => { /* stream */ }
//! }
//! ```

pub mod args;
pub mod version;

pub use args::{parse_args, CliCommand, WatchOptions};
pub use version::{handle_version_command, VERSION};
