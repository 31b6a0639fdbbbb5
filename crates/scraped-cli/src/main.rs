// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use runtime::GatewayRuntime;
use scraped_app::Session;
use scraped_gateway::Client;
use std::env;
use std::path::PathBuf;
use tracing::info;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let invocation = parse_invocation(env::args().skip(1), Config::default_path()?)?;
    let query = match invocation.mode {
        Mode::Help => {
            print_help();
            return Ok(());
        }
        Mode::PrintConfigPath => {
            println!("{}", invocation.config_path.display());
            return Ok(());
        }
        Mode::PrintExampleConfig => {
            print!("{}", Config::example_config(&invocation.config_path));
            return Ok(());
        }
        Mode::Check => None,
        Mode::Interactive { query } => Some(query),
    };

    let config = Config::load(&invocation.config_path).with_context(|| {
        format!(
            "load config {}; run `scraped --print-example-config` to generate a template",
            invocation.config_path.display()
        )
    })?;

    if config.log_enabled() {
        let log_path = config.log_path()?;
        logging::init_file_logging(&log_path, &config.log_filter())?;
    }

    let client = Client::new(&config.api_base_url(), Some(config.api_timeout()?)).with_context(
        || {
            format!(
                "invalid [api] config in {}; fix base_url/timeout or {}",
                invocation.config_path.display(),
                config::API_URL_ENV
            )
        },
    )?;
    info!(base_url = client.base_url(), "client configured");

    let Some(initial_query) = query else {
        client.health().with_context(|| {
            format!(
                "health check against {} failed -- is the backend running?",
                client.base_url()
            )
        })?;
        println!("{} ok", client.base_url());
        return Ok(());
    };

    let mut session = Session::default();
    let mut runtime = GatewayRuntime::new(client, config.export_dir());
    scraped_tui::run_app(&mut session, &mut runtime, initial_query)
}

/// What a single invocation does. Only one mode may be requested.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Interactive { query: Option<String> },
    Check,
    PrintConfigPath,
    PrintExampleConfig,
    Help,
}

impl Mode {
    fn flag(&self) -> &'static str {
        match self {
            Self::Interactive { .. } => "--query",
            Self::Check => "--check",
            Self::PrintConfigPath => "--print-config-path",
            Self::PrintExampleConfig => "--print-example-config",
            Self::Help => "--help",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    config_path: PathBuf,
    mode: Mode,
}

const FLAGS: [(&str, &str); 6] = [
    ("-c, --config <path>", "read settings from <path>"),
    ("-q, --query <text>", "open the UI and search <text> right away"),
    ("--check", "load config and probe the backend's /health"),
    ("--print-config-path", "show where the config file is looked up"),
    ("--print-example-config", "print a commented config template"),
    ("-h, --help", "show this help"),
];

/// Accepts `--flag value` and `--flag=value` for the options taking a value.
fn parse_invocation<I, S>(args: I, default_config_path: PathBuf) -> Result<Invocation>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut config_path = default_config_path;
    let mut mode: Option<Mode> = None;
    let mut help = false;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        let (name, inline) = match arg.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value.to_owned())),
            _ => (arg, None),
        };
        let mut value = |what: &str| -> Result<String> {
            match inline.clone() {
                Some(value) => Ok(value),
                None => args
                    .next()
                    .map(|value| value.as_ref().to_owned())
                    .ok_or_else(|| anyhow!("{name} expects {what}")),
            }
        };

        let requested = match name {
            "-c" | "--config" => {
                let path = value("a file path")?;
                if path.trim().is_empty() {
                    bail!("{name} expects a non-empty file path");
                }
                config_path = PathBuf::from(path);
                continue;
            }
            "-q" | "--query" => {
                let query = value("the text to search")?;
                if query.trim().is_empty() {
                    bail!("{name} expects non-blank search text");
                }
                Mode::Interactive { query: Some(query) }
            }
            "--check" => Mode::Check,
            "--print-config-path" => Mode::PrintConfigPath,
            "--print-example-config" => Mode::PrintExampleConfig,
            "-h" | "--help" => {
                help = true;
                continue;
            }
            other => bail!("unrecognized argument {other:?}; see `scraped --help`"),
        };
        if inline.is_some() && !matches!(requested, Mode::Interactive { .. }) {
            bail!("{name} does not take a value");
        }

        if let Some(previous) = &mode
            && previous != &requested
        {
            bail!(
                "{} cannot be combined with {}",
                requested.flag(),
                previous.flag()
            );
        }
        mode = Some(requested);
    }

    let mode = if help {
        Mode::Help
    } else {
        mode.unwrap_or(Mode::Interactive { query: None })
    };
    Ok(Invocation { config_path, mode })
}

fn print_help() {
    println!("scraped {}", env!("CARGO_PKG_VERSION"));
    println!("Terminal client for the Scraped Cloud lookup service.");
    println!();
    println!("usage: scraped [options]");
    println!();
    for (flag, about) in FLAGS {
        println!("  {flag:<26}{about}");
    }
    println!();
    println!("environment:");
    println!("  {:<26}backend address, overrides [api].base_url", config::API_URL_ENV);
    println!("  {:<26}config file location", config::CONFIG_PATH_ENV);
    println!("  {:<26}log filter directive, default scraped=info", config::LOG_FILTER_ENV);
}
