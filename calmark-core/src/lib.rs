pub mod classify;
pub mod config;
pub mod dom;
pub mod duration;
pub mod messages;
pub mod observer;
pub mod orchestrator;
pub mod parse_times;
pub mod render;
pub mod selectors;
pub mod settings;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use dom::Document;
pub use orchestrator::Orchestrator;
pub use settings::{Settings, SettingsStore};
