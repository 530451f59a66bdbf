//! Ignition render tool
//!
//! Resolves the coder VM's config and secret values, renders the boot
//! template and writes the resulting Ignition document to stdout. Logs go to
//! stderr so the output can be piped straight into provisioning.

mod config;
mod error;

use anyhow::Context;
use config::{Settings, StoreSettings};
use config_store::{ConfigStore, FileConfigStore, HttpConfigStore};
use ignition::{BootTemplate, IgnitionPipeline};
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

async fn build_store(settings: &StoreSettings) -> anyhow::Result<Arc<dyn ConfigStore>> {
    match settings {
        StoreSettings::Http { url, token } => {
            let store = HttpConfigStore::new(url.clone(), token.clone())
                .context("failed to create config store client")?;
            Ok(Arc::new(store))
        }
        StoreSettings::File { path, project } => {
            let store = FileConfigStore::load(path)
                .await
                .with_context(|| format!("failed to load stack config {}", path.display()))?;
            let store = match project {
                Some(project) => store.with_project(project.clone()),
                None => store,
            };
            Ok(Arc::new(store))
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let settings = Settings::from_env()?;

    info!("Configuration:");
    info!("  Template: {}", settings.template.display());
    info!("  Host: {}", settings.host.fqdn());
    info!("  Config store: {}", settings.store);
    info!("  Strict: {}", settings.strict);

    let store = build_store(&settings.store).await?;
    let template = BootTemplate::load(&settings.template, settings.files_dir.clone())
        .with_context(|| format!("failed to load template {}", settings.template.display()))?;

    let document = IgnitionPipeline::new(&template)
        .strict(settings.strict)
        .pretty(settings.pretty)
        .generate(store.as_ref(), &settings.host)
        .await
        .with_context(|| format!("failed to generate boot document for {}", settings.host.fqdn()))?;

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", document.as_str()).context("failed to write boot document")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
