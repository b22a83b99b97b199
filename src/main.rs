use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod auth;
mod authenticator;
mod capability;
mod config;
mod containers;
mod error;
mod image;
mod prompt;
mod registry;
mod report;
mod resolver;
mod store;
mod version;

use authenticator::CredentialAuthenticator;
use capability::RegistryCapabilities;
use config::Config;
use containers::{running_containers, ImageSource};
use error::CheckError;
use image::{validate_tag, ImageReference};
use prompt::TerminalCollector;
use registry::RegistryClient;
use report::{check_images_for_newer_versions, print_reports};
use resolver::TagResolver;
use store::ClassificationStore;
use version::CompareMode;

fn cli() -> Command {
    Command::new("docker-newer")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Check the images of running containers for newer versions in their registries")
        .args_conflicts_with_subcommands(true)
        .arg(
            Arg::new("image")
                .num_args(1..)
                .help("Images to check instead of the running containers (e.g. nginx:1.25 ghcr.io/org/app:2.1)"),
        )
        .arg(
            Arg::new("all")
                .short('a')
                .long("all")
                .env("DOCKER_NEWER_ALL")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print all newer versions"),
        )
        .arg(
            Arg::new("insecure")
                .short('k')
                .long("insecure")
                .env("DOCKER_NEWER_INSECURE")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Disable TLS certificates validation"),
        )
        .arg(
            Arg::new("timeout")
                .short('t')
                .long("timeout")
                .env("DOCKER_NEWER_TIMEOUT")
                .global(true)
                .value_parser(clap::value_parser!(u64))
                .help("Timeout for HTTP requests in seconds [default: 5]"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .env("DOCKER_NEWER_VERBOSE")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Include additional logs"),
        )
        .subcommand(
            Command::new("config")
                .about("Configuration management")
                .subcommand(Command::new("show").about("Show the effective configuration"))
                .subcommand(
                    Command::new("save").about("Save the effective configuration as the new defaults"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().try_get_matches().unwrap_or_else(|e| e.exit());

    if let Some(config_matches) = matches.subcommand_matches("config") {
        handle_config(config_matches).await?;
    } else {
        handle_check(&matches).await?;
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "docker_newer=debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn handle_check(matches: &ArgMatches) -> Result<()> {
    let config = Config::load().await?.merge_matches(matches);
    init_logging(config.verbose);
    debug!(?config, "effective configuration");

    let sources: Vec<ImageSource> = match matches.get_many::<String>("image") {
        Some(images) => images.map(|image| ImageSource::from_argument(image)).collect(),
        None => running_containers()?,
    };

    if sources.is_empty() {
        println!("No running containers");
        return Ok(());
    }

    let client = RegistryClient::new(config.timeout(), config.insecure)?;
    let mut resolver = TagResolver::new(client, RegistryCapabilities::new());
    let mut store = ClassificationStore::new();

    check_sources(&mut resolver, &mut store, &sources).await;

    if !store.pending().is_empty() {
        CredentialAuthenticator::new(resolver.client())
            .run(&mut store, &mut TerminalCollector)
            .await;
    }

    println!();
    let reports = check_images_for_newer_versions(store.resolved(), CompareMode::from_all_flag(config.all));
    print_reports(&reports);

    Ok(())
}

async fn check_sources(resolver: &mut TagResolver, store: &mut ClassificationStore, sources: &[ImageSource]) {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.blue} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));

    for (idx, source) in sources.iter().enumerate() {
        let label = match &source.container {
            Some(container) => format!("{} [{}]", source.image, container),
            None => source.image.clone(),
        };
        pb.suspend(|| println!("{} Checking {}", "🔍".blue(), label.cyan()));
        pb.set_message(format!("[{}/{}] {}", idx + 1, sources.len(), label));

        if let Err(reason) = check_source(resolver, store, &source.image).await {
            pb.suspend(|| println!("{} Ignoring {} due to {}", "⚠️".yellow(), source.image, reason));
        }
    }

    pb.finish_and_clear();
}

async fn check_source(
    resolver: &mut TagResolver,
    store: &mut ClassificationStore,
    raw_image: &str,
) -> std::result::Result<(), CheckError> {
    let image = ImageReference::parse(raw_image)?;
    validate_tag(&image.tag)?;
    resolver.classify(image, store).await
}

async fn handle_config(matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", sub_matches)) => {
            let config = Config::load().await.unwrap_or_default().merge_matches(sub_matches);

            println!("{}", "📋 Current configuration:".blue());
            println!("  File:     {}", Config::config_path()?.display().to_string().cyan());
            println!("  All:      {}", config.all);
            println!("  Insecure: {}", config.insecure);
            println!("  Timeout:  {}s", config.timeout);
            println!("  Verbose:  {}", config.verbose);
            Ok(())
        }
        Some(("save", sub_matches)) => {
            let config = Config::load().await.unwrap_or_default().merge_matches(sub_matches);
            config.save().await?;

            println!(
                "{} Configuration saved to {}",
                "✅".green(),
                Config::config_path()?.display().to_string().cyan()
            );
            Ok(())
        }
        _ => {
            println!("Available config commands:");
            println!("  show  - Show the effective configuration");
            println!("  save  - Save flags and environment values as defaults");
            println!();
            println!("Example:");
            println!("  docker-newer config save --all --timeout 10");
            Ok(())
        }
    }
}
