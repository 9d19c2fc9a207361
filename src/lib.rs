pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use adapters::storage::LocalStorage;
pub use app::pipelines::{CastSheetPipeline, ComparisonPipeline, ConvertPipeline, MappingPipeline};
pub use config::{CliConfig, Command, ToolConfig};
pub use core::etl::EtlEngine;
pub use utils::error::{CtdError, Result};
