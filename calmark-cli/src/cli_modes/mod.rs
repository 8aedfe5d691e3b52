mod annotate_mode;
mod cli_mode;
mod parse_mode;
mod settings_mode;
mod use_color;

pub use annotate_mode::annotate_mode;
pub use cli_mode::CliModeResult;
pub use parse_mode::parse_mode;
pub use settings_mode::{settings_mode, settings_store};
pub use use_color::use_color;
