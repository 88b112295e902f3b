pub mod csv_reader;
pub mod engine;
pub mod output;
pub mod overlay;
pub mod placeholder;
pub mod substitution;

pub use crate::domain::model::{ParticipantRow, PlaceholderMap, TemplateDocument};
pub use crate::domain::ports::{ConfigProvider, Renderer, Storage};
pub use crate::utils::error::Result;
