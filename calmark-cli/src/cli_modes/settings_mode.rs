use super::CliModeResult;
use crate::{
    cli::{Cli, Command, SettingsAction},
    render::Renderer,
};
use anyhow::Result;
use calmark_core::{Config, Settings, SettingsStore, settings::FileSettingsStore};

/// `--settings-file` wins over the configured location.
pub fn settings_store(cli: &Cli, config: &Config) -> FileSettingsStore {
    match &cli.settings_file {
        Some(path) => FileSettingsStore::new(path.clone()),
        None => config.settings_store(),
    }
}

pub fn settings_mode(cli: &Cli, renderer: &Renderer, config: &Config) -> Result<CliModeResult> {
    let Some(Command::Settings { action }) = &cli.command else {
        return Ok(CliModeResult::NothingToDo);
    };
    let mut store = settings_store(cli, config);

    let show_duration = match action.unwrap_or(SettingsAction::Show) {
        SettingsAction::Show => {
            let settings = store.get(config.defaults())?;
            renderer.print_settings(settings, store.path());
            return Ok(CliModeResult::Finish);
        }
        SettingsAction::Enable => true,
        SettingsAction::Disable => false,
    };
    let change = store.set(Settings { show_duration })?;
    renderer.print_change(&change);
    Ok(CliModeResult::Finish)
}
