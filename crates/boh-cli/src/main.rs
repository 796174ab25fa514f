// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result, bail};
use boh_app::{AppState, TabKind};
use boh_client::Client;
use boh_db::Store;
use boh_server::{ApiServer, ServerOptions};
use config::Config;
use logging::LogTarget;
use runtime::{DbRuntime, HttpRuntime};
use std::env;
use std::path::PathBuf;
use std::rc::Rc;

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
            "load config {}; run `boh --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let log_target = if options.serve {
        LogTarget::Stderr
    } else {
        LogTarget::File(config.log_file()?)
    };
    logging::init(config.log_level(), &log_target)?;

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or BOH_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;
    if options.demo && store.seed_demo_data()? {
        tracing::info!("seeded demo kitchen");
    }

    let remote_url = options
        .remote
        .as_deref()
        .or_else(|| config.remote_base_url());
    let client = match remote_url {
        Some(url) => Some(
            Client::new(url, config.remote_timeout()?).with_context(|| {
                format!(
                    "invalid [remote] config in {}; fix base_url/timeout values",
                    options.config_path.display()
                )
            })?,
        ),
        None => None,
    };
    if options.check_only {
        return Ok(());
    }

    if options.serve {
        let address = options
            .bind
            .clone()
            .unwrap_or_else(|| config.bind_address().to_owned());
        return serve(store, &config, &address);
    }

    let mut state = AppState::default();
    if !config.show_dashboard() {
        state.active_tab = TabKind::Ingredients;
    }

    // Column layouts always persist in the local database.
    let store = Rc::new(store);
    match client {
        Some(client) => {
            tracing::info!(remote = client.base_url(), "starting tui against remote api");
            let mut runtime = HttpRuntime::new(client);
            boh_tui::run_app(&mut state, &mut runtime, store)
        }
        None => {
            tracing::info!(db = %db_path.display(), "starting tui");
            let mut runtime = DbRuntime::new(Rc::clone(&store));
            boh_tui::run_app(&mut state, &mut runtime, store)
        }
    }
}

fn serve(store: Store, config: &Config, address: &str) -> Result<()> {
    let listener = ApiServer::bind(address)?;
    let api = ApiServer::new(
        store,
        ServerOptions {
            require_csrf: config.require_csrf(),
            ..ServerOptions::default()
        },
    );
    tracing::info!(
        address = %listener.server_addr(),
        require_csrf = config.require_csrf(),
        "serving api"
    );
    eprintln!("boh api listening on http://{}", listener.server_addr());
    api.run(&listener)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    serve: bool,
    bind: Option<String>,
    remote: Option<String>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        serve: false,
        bind: None,
        remote: None,
        show_help: false,
    };

    let mut iter = args.into_iter().peekable();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
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
            "--serve" => {
                options.serve = true;
                if iter
                    .peek()
                    .is_some_and(|next| !next.as_ref().starts_with('-'))
                {
                    options.bind = iter.next().map(|value| value.as_ref().to_owned());
                }
            }
            "--remote" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--remote requires a base URL"))?;
                options.remote = Some(value.as_ref().to_owned());
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

    if options.serve && options.remote.is_some() {
        bail!("--serve and --remote cannot be combined; serve the local database or point at a remote one");
    }

    Ok(options)
}

fn print_help() {
    println!("boh - back of house");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a config template");
    println!("  --demo                   Launch with seeded demo data (in-memory)");
    println!("  --check                  Validate config + DB + remote settings");
    println!("  --serve [addr]           Serve the JSON API instead of the TUI");
    println!("  --remote <url>           Run the TUI against a `boh --serve` instance");
    println!("  --help                   Show this help");
}
