pub mod settings;

pub use settings::{AppConfig, LeagueSettings, ServerSettings};
