// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use ereg_app::{AppState, FetchQuery};
use ereg_client::{AccountsApi, Client};
use ereg_testkit::MemoryAccounts;
use runtime::ServiceRuntime;
use std::env;
use std::path::PathBuf;
use tracing::info;

const DEMO_SEED: u64 = 20_240_630;
const DEMO_ROWS: usize = 25;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `ereg --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    if options.print_log_path {
        println!("{}", config.log_path()?.display());
        return Ok(());
    }

    let log_path = logging::init_logging(&config)?;
    info!(log = %log_path.display(), demo = options.demo, "starting ereg");

    let mut state = AppState::default();
    if options.demo {
        let api = MemoryAccounts::seeded(DEMO_SEED, DEMO_ROWS);
        if options.check_only {
            return check(&api, "demo data");
        }
        let mut runtime = ServiceRuntime::new(api);
        return ereg_tui::run_app(&mut state, &mut runtime);
    }

    let base_url = config.base_url(options.base_url.as_deref());
    let client = Client::new(&base_url, config.timeout()?).with_context(|| {
        format!(
            "invalid service settings in {}; fix [server].base_url/timeout or pass --base-url",
            options.config_path.display()
        )
    })?;
    info!(base_url = client.base_url(), timeout = ?client.timeout(), "accounts service");
    if options.check_only {
        return check(&client, client.base_url());
    }

    let mut runtime = ServiceRuntime::new(client);
    ereg_tui::run_app(&mut state, &mut runtime)
}

/// One default fetch, so `--check` proves the service answers and decodes.
fn check<A: AccountsApi>(api: &A, source: &str) -> Result<()> {
    let rows = api
        .list_accounts(&FetchQuery::default())
        .with_context(|| format!("check accounts from {source}"))?;
    info!(rows = rows.len(), source, "check passed");
    println!("ok: {} accounts from {source}", rows.len());
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    base_url: Option<String>,
    print_config_path: bool,
    print_log_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        base_url: None,
        print_config_path: false,
        print_log_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--base-url" => {
                let value = iter.next().ok_or_else(|| {
                    anyhow::anyhow!("--base-url requires a URL, for example http://localhost:8000")
                })?;
                options.base_url = Some(value.as_ref().to_owned());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-log-path" => {
                options.print_log_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("ereg - E-Reg account provisioning tracker");
    println!("  --config <path>          Use a specific config path");
    println!("  --base-url <url>         Accounts service URL (overrides config and EREG_BASE_URL)");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-log-path         Print resolved log file path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Launch against seeded in-memory accounts");
    println!("  --check                  Validate config and fetch accounts once, then exit");
    println!("  --help                   Show this help");
}
