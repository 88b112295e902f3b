pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, JobSettings, SettingsOverrides};

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::{
    engine::CertificateEngine, overlay::OverlayRenderer, placeholder::ColumnMapping,
    placeholder::ColumnSchema, substitution::SubstitutionRenderer,
};
pub use domain::model::{BatchReport, Placeholder, PlacementTable, RendererKind};
pub use utils::error::{CertError, Result};
