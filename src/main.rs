use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use translation_generator::cli::{Cli, Commands};
use translation_generator::config::Config;
use translation_generator::language::Language;
use translation_generator::store::{JobStore, SqliteJobStore};
use translation_generator::validate::JobRequest;
use translation_generator::{cleanup, output, server, utils, TranslationPipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Serve { host, port } => {
            warn_missing_dependencies().await;
            let mut config = Config::load().await?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }

            let store = SqliteJobStore::connect(&config.database_url).await?;
            let pipeline = TranslationPipeline::from_config(&config, Arc::new(store))?;
            server::serve(&config, Arc::new(pipeline)).await?;
        }
        Commands::Generate {
            link,
            target_language,
            api_key,
            output,
            format,
        } => {
            warn_missing_dependencies().await;
            let config = Config::load().await?;

            let credential = api_key
                .or_else(|| config.services.openai_api_key.clone())
                .unwrap_or_default();
            let request = JobRequest::new(&link, &credential, Some(&target_language))?;

            let store = SqliteJobStore::connect(&config.database_url).await?;
            let pipeline = TranslationPipeline::from_config(&config, Arc::new(store))?;

            let progress = ProgressBar::new_spinner();
            progress.set_style(
                ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
            );
            progress.set_message(format!("Generating lyrics in {}...", request.target_language.name()));
            progress.enable_steady_tick(Duration::from_millis(120));

            let outcome = pipeline.run(&request).await;
            progress.finish_and_clear();
            let result = outcome?;

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format).await?;
                    println!("Lyrics saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, &format)?;
                }
            }
        }
        Commands::Cleanup { max_age_hours, dry_run } => {
            let config = Config::load().await?;
            let max_age = max_age_hours
                .map(cleanup::hours)
                .unwrap_or_else(|| config.retention());

            let report = cleanup::sweep(&config.media.root, max_age, dry_run).await?;
            if dry_run {
                println!("Dry run: {}", report.summary());
            } else {
                println!("{}", report.summary());
            }
        }
        Commands::History { limit } => {
            let config = Config::load().await?;
            let store = SqliteJobStore::connect(&config.database_url).await?;
            let records = store.recent(limit).await?;

            if records.is_empty() {
                println!("No translations saved yet.");
            } else {
                println!("{}", output::format_history(&records));
            }
        }
        Commands::Languages => {
            println!("Supported target languages:");
            for language in Language::ALL {
                println!("  {}  {}", style(language.code()).bold().green(), language.name());
            }
        }
        Commands::Config { show } => {
            let config = Config::load().await?;
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose {
        "translation_generator=debug,tower_http=debug"
    } else {
        "translation_generator=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

/// yt-dlp and ffmpeg are resolved at download time; a missing one only warns here
async fn warn_missing_dependencies() {
    let missing_deps = utils::check_dependencies().await;
    if !missing_deps.is_empty() {
        eprintln!("⚠️  Dependency check warnings:");
        for dep in missing_deps {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Continuing anyway - tools may be available)");
    }
}
