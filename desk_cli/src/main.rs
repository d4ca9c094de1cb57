//! `desk` — closed-loop height controller for a motorized desk.

mod cli;
mod error_fmt;
mod serve;
mod server;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::WrapErr;
use std::path::Path;

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(err) = run(&cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}

fn run(cli: &Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let had_config_file = cli.config.exists();
    let cfg = load_config(&cli.config)?;
    init_logging(cli.json, &cli.log_level, &cfg.logging);
    if !had_config_file {
        tracing::info!(path = %cli.config.display(), "config not found, using reference defaults");
    }

    match &cli.cmd {
        Commands::Serve {
            bind,
            simulate,
            cycle_hz,
        } => serve::run_serve(&cfg, bind.clone(), *simulate, *cycle_hz),
        Commands::SelfCheck { simulate } => serve::run_self_check(&cfg, *simulate),
    }
}

fn load_config(path: &Path) -> eyre::Result<desk_config::Config> {
    let cfg = if path.exists() {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("read config {}", path.display()))?;
        desk_config::load_toml(&text)
            .map_err(|e| eyre::eyre!("parse config {}: {e}", path.display()))?
    } else {
        desk_config::Config::default()
    };
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn init_logging(json: bool, cli_level: &str, logcfg: &desk_config::Logging) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer, fmt};

    // The CLI flag wins when explicitly set; otherwise the config may
    // raise the level.
    let level = if cli_level != "info" {
        cli_level
    } else {
        logcfg.level.as_deref().unwrap_or("info")
    };
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let console = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    let file = logcfg.file.as_deref().map(|path| {
        let p = Path::new(path);
        let dir = match p.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let name = p
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("desk.log"));
        let appender = match logcfg.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
}
