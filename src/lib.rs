pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::{CliConfig, Command};

pub use crate::adapters::local::LocalDirectory;
pub use crate::adapters::webservice::{CodecVersion, WebserviceClient};
pub use crate::app::LabelService;
pub use crate::config::TomlConfig;
pub use crate::core::{CatalogStore, LabelPipeline};
pub use crate::utils::error::{PipelineError, Result};
