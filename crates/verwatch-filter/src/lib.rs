//! verwatch filter pipeline
//!
//! Pure transforms from raw query output to a candidate version:
//! - url_commands (regex, regex_submatch, split, replace)
//! - Version-format and content requirements with miss counting
//! - Release-feed candidate preparation and selection
//! - Lenient semantic-version parsing and the "not older" gate
//! - `{{ version }}` / `{{ service_id }}` templating

#![warn(unreachable_pub)]

pub mod error;
pub mod pipeline;
pub mod release;
pub mod require;
pub mod semantic;
pub mod template;
pub mod url_command;

pub use error::FilterError;
pub use pipeline::Pipeline;
pub use release::{Asset, Release};
pub use require::{ContentTarget, Require};
pub use semantic::check_progression;
pub use template::{render, TemplateContext};
pub use url_command::{UrlCommand, UrlCommandKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
