//! navPlace resolver CLI
//!
//! Resolves a IIIF / Web Annotation URI (or a viewer URL carrying
//! `?iiif-content=`) and prints the features as a GeoJSON FeatureCollection.

use anyhow::{Context, Result};
use clap::Parser;
use navplace_resolver::{NavPlaceResolver, ResolverConfig, RootRequest};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "navplace-resolve", about = "Collect navPlace geometry from a IIIF resource")]
struct Args {
    /// Resource URI or viewer URL with an iiif-content / data-uri parameter
    input: String,

    /// Do not dereference referenced resources or geometry
    #[arg(long)]
    no_resolve: bool,

    /// Only inspect the root and its immediate children
    #[arg(long)]
    shallow: bool,

    /// Maximum network fetches
    #[arg(long, env = "NAVPLACE_MAX_FETCHES")]
    max_fetches: Option<usize>,

    /// Maximum visited nodes plus harvested results
    #[arg(long, env = "NAVPLACE_MAX_VISITS")]
    max_visits: Option<usize>,

    /// YAML configuration file
    #[arg(long, env = "NAVPLACE_CONFIG")]
    config: Option<PathBuf>,

    /// Pretty-print the output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Diagnostics go to stderr so stdout stays valid GeoJSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navplace_resolver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ResolverConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ResolverConfig::default(),
    };
    let mut config = config
        .with_env_overrides()
        .context("Invalid NAVPLACE_* environment override")?;

    let request = RootRequest::from_viewer_url(&args.input)
        .context("No resource URI given")?;
    config = request.apply_to(config);

    if args.no_resolve {
        config.resolve_references = false;
    }
    if args.shallow {
        config.deep_traversal = false;
    }
    if let Some(max) = args.max_fetches {
        config.max_fetches = max;
    }
    if let Some(max) = args.max_visits {
        config.max_visits = max;
    }
    config.validate().context("Invalid resolver configuration")?;

    tracing::info!(uri = %request.uri, "Resolving");

    let resolver = NavPlaceResolver::http(config).context("Failed to create HTTP client")?;
    let resolution = resolver.resolve_uri(&request.uri).await;

    let output = resolution.to_feature_collection();
    let rendered = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);

    Ok(())
}
