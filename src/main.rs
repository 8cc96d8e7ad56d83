use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use document_manager::api::ApiClient;
use document_manager::cache::QueryCache;
use document_manager::cli::commands::App;
use document_manager::cli::{Cli, Commands, ShellLine};
use document_manager::config::Config;
use document_manager::error::{ApiError, ErrorDisposition, ErrorSurface, UploadError};
use document_manager::repository::{HttpRepository, MockRepository, Repository};
use document_manager::services::QueryClient;
use document_manager::utils::validation::ValidationConfig;
use document_manager::view::{JsonFileStore, PreferenceStore, ViewState};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut cfg = Config::from_env()?;
    if let Some(url) = cli.api_url {
        cfg.api_url = url.trim_end_matches('/').to_string();
    }

    let cache = Arc::new(QueryCache::new(cfg.cache_stale_time));
    let view = ViewState::load(JsonFileStore::open(&cfg.state_file));
    let rules = ValidationConfig::default().with_max_count(cfg.max_upload_count);

    if cli.mock {
        info!("Using the in-memory document service");
        let repo = Arc::new(MockRepository::with_demo_user());
        let app = App::new(QueryClient::new(repo, cache).with_rules(rules), view);
        run(app, cli.command).await
    } else {
        info!("Using {}", cfg.api_url);
        let client = ApiClient::new(&cfg.api_url, cfg.request_timeout)?;
        let repo = Arc::new(HttpRepository::new(client));
        let app = App::new(QueryClient::new(repo, cache).with_rules(rules), view);
        run(app, cli.command).await
    }
}

async fn run<R, S>(mut app: App<R, S>, command: Commands) -> Result<()>
where
    R: Repository + 'static,
    S: PreferenceStore,
{
    app.restore_session().await;
    match command {
        Commands::Shell => shell(app).await,
        command => {
            if let Err(e) = app.handle(command).await {
                report(&e);
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn shell<R, S>(mut app: App<R, S>) -> Result<()>
where
    R: Repository + 'static,
    S: PreferenceStore,
{
    let mut rl = DefaultEditor::new()?;
    println!("Welcome to the document manager shell!");
    println!("Type 'help' for available commands, 'exit' to quit.");

    loop {
        match rl.readline("docs> ") {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                let args = split_args(&line);
                match args.first().map(String::as_str) {
                    None => continue,
                    Some("exit") | Some("quit") => break,
                    _ => {}
                }
                match ShellLine::try_parse_from(&args) {
                    Ok(ShellLine { command: Commands::Shell }) => println!("Already in the shell."),
                    Ok(ShellLine { command }) => {
                        if let Err(e) = app.handle(command).await {
                            report(&e);
                        }
                    }
                    // Also covers `help` and `--help`.
                    Err(e) => {
                        let _ = e.print();
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                error!("Error reading line: {:?}", e);
                break;
            }
        }
    }
    Ok(())
}

fn report(err: &anyhow::Error) {
    let api = err
        .downcast_ref::<ApiError>()
        .or_else(|| match err.downcast_ref::<UploadError>() {
            Some(UploadError::Api(api)) => Some(api),
            _ => None,
        });
    match api.map(|api| (api, ErrorDisposition::of(api, ErrorSurface::Inline))) {
        Some((_, ErrorDisposition::RedirectToLogin)) => {
            eprintln!("Please login first: login --user <id> --password <password>")
        }
        Some((api, ErrorDisposition::Retry)) => eprintln!("Error: {} (try again)", api.user_message()),
        Some((api, ErrorDisposition::Fatal)) => eprintln!("Error: {}", api.user_message()),
        None => eprintln!("Error: {:#}", err),
    }
}

/// Whitespace separated words; double quotes group words.
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;
    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}
