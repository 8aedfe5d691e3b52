mod cli;
mod cli_modes;
mod render;

use anyhow::Result;
use calmark_core::Config;
use clap::CommandFactory;
use cli::Cli;
use cli_modes::{
    CliModeResult, annotate_mode, parse_mode, settings_mode, settings_store, use_color,
};
use env_logger::Env;
use render::Renderer;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("calmark: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::new();
    let renderer = Renderer::new(use_color(&cli));

    let config = Config::load()?;

    if cli.path {
        let store = settings_store(&cli, &config);
        renderer.print_paths(Config::config_file().as_deref(), store.path());
        return Ok(());
    }

    if parse_mode(&cli, &renderer)? == CliModeResult::Finish {
        return Ok(());
    }

    if annotate_mode(&cli, &renderer, &config)? == CliModeResult::Finish {
        return Ok(());
    }

    if settings_mode(&cli, &renderer, &config)? == CliModeResult::Finish {
        return Ok(());
    }

    Cli::command().print_help()?;
    Ok(())
}
