// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod commands;
mod config;
mod screens;
mod tracing_setup;

use anyhow::{Context, Result, anyhow, bail};
use commands::{Action, Request};
use config::Config;
use koperasi_api::{CredentialHolder, HttpFetcher};
use koperasi_app::{Screen, Values};
use screens::{ConsoleNotifier, SCREEN_NAMES};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_setup::Verbosity;

const DEFAULT_SCREEN: &str = "savings";

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

    if options.list_screens {
        for name in SCREEN_NAMES {
            println!("{name}");
        }
        return Ok(());
    }

    tracing_setup::init_subscriber(Verbosity::from_flags(options.verbose, options.quiet));

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `koperasi --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let entry = screens::catalog_entry(&options.screen, &config)?;
    let credentials = CredentialHolder::new(config.api_token());
    let fetcher = HttpFetcher::new(config.api_base_url(), config.api_timeout()?, credentials)
        .with_context(|| {
            format!(
                "invalid [api] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;
    if options.check_only {
        return Ok(());
    }

    let mut screen = Screen::new(
        entry.config.clone(),
        Arc::new(fetcher),
        Arc::new(ConsoleNotifier),
    )?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(commands::run_request(&mut screen, &options.request))?;

    print!("{}", commands::render_page(&entry, &screen));
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    list_screens: bool,
    check_only: bool,
    show_help: bool,
    verbose: bool,
    quiet: bool,
    screen: String,
    request: Request,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        list_screens: false,
        check_only: false,
        show_help: false,
        verbose: false,
        quiet: false,
        screen: DEFAULT_SCREEN.to_owned(),
        request: Request::default(),
    };
    let mut actions = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--screen" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--screen requires a name; see --list-screens"))?;
                options.screen = value.as_ref().to_owned();
            }
            "--page" => {
                options.request.page = Some(positive_number("--page", iter.next())?);
            }
            "--page-size" => {
                options.request.page_size = Some(positive_number("--page-size", iter.next())?);
            }
            "--filter" => {
                insert_pair("--filter", iter.next(), &mut options.request.filters)?;
            }
            "--set" => {
                insert_pair("--set", iter.next(), &mut options.request.fields)?;
            }
            "--add" => {
                actions.push(Action::Add);
            }
            "--update" => {
                let id = iter
                    .next()
                    .ok_or_else(|| anyhow!("--update requires a record id"))?;
                actions.push(Action::Update(id.as_ref().to_owned()));
            }
            "--delete" => {
                let id = iter
                    .next()
                    .ok_or_else(|| anyhow!("--delete requires a record id"))?;
                actions.push(Action::Delete(id.as_ref().to_owned()));
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--list-screens" => {
                options.list_screens = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--verbose" | "-v" => {
                options.verbose = true;
            }
            "--quiet" | "-q" => {
                options.quiet = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options");
            }
        }
    }

    if actions.len() > 1 {
        bail!("choose only one of --add, --update, --delete");
    }
    if let Some(action) = actions.pop() {
        options.request.action = action;
    }
    if !options.request.fields.is_empty()
        && matches!(options.request.action, Action::List | Action::Delete(_))
    {
        bail!("--set only applies to --add or --update");
    }

    Ok(options)
}

fn positive_number<S: AsRef<str>>(flag: &str, value: Option<S>) -> Result<u32> {
    let value = value.ok_or_else(|| anyhow!("{flag} requires a number"))?;
    let raw = value.as_ref();
    match raw.parse::<u32>() {
        Ok(number) if number > 0 => Ok(number),
        _ => bail!("{flag} expects a positive number, got {raw:?}"),
    }
}

fn insert_pair<S: AsRef<str>>(flag: &str, value: Option<S>, into: &mut Values) -> Result<()> {
    let value = value.ok_or_else(|| anyhow!("{flag} requires key=value"))?;
    let raw = value.as_ref();
    let Some((key, field_value)) = raw.split_once('=') else {
        bail!("{flag} expects key=value, got {raw:?}");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("{flag} expects key=value, got {raw:?}");
    }
    into.insert(key.to_owned(), field_value.to_owned());
    Ok(())
}

fn print_help() {
    println!("koperasi");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --list-screens           Print the available screens");
    println!("  --screen <name>          Screen to open (default: {DEFAULT_SCREEN})");
    println!("  --page <n>               Page to show");
    println!("  --page-size <n>          Rows per page (one of [list].page_sizes)");
    println!("  --filter <key=value>     Filter value; YYYY-MM months expand to a range");
    println!("  --add                    Submit a new record built from --set values");
    println!("  --update <id>            Submit changes to a record using --set values");
    println!("  --delete <id>            Delete a record");
    println!("  --set <key=value>        Form field value for --add/--update (file fields take a path)");
    println!("  --check                  Validate config and API settings");
    println!("  -v, --verbose            Debug logging (KOPERASI_LOG overrides)");
    println!("  -q, --quiet              Errors only");
    println!("  --help                   Show this help");
}
