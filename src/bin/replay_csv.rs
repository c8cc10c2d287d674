use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use gestodtw::report::replay_csvs;
use gestodtw::{GestureClassifier, ModelArtifact};

/// Reproduce grabaciones CSV contra un modelo ya construido
#[derive(Parser)]
#[command(name = "replay_csv", version)]
struct ReplayOptions {
    /// Artefacto generado con `gestodtw build-model`
    #[arg(long, default_value = "data/model/action_model.json")]
    model: PathBuf,
    /// Vecinos mostrados por archivo
    #[arg(long, default_value_t = 5)]
    top: usize,
    /// Ignora los umbrales guardados (solo margen)
    #[arg(long)]
    disable_reject: bool,
    #[arg(required = true)]
    csv: Vec<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = ReplayOptions::parse();
    let mut artifact = ModelArtifact::load(&opts.model)
        .with_context(|| format!("No se pudo cargar el modelo {:?}", opts.model))?;
    if opts.disable_reject {
        artifact.thresholds.clear();
    }
    let classifier = GestureClassifier::from_artifact(&artifact)?;
    println!(
        "modelo: {} ({} referencias, etiquetas={:?})",
        opts.model.display(),
        artifact.references.len(),
        artifact.labels
    );

    let summary = replay_csvs(&classifier, &opts.csv, opts.top);
    print!("{}", summary.report);
    for (path, e) in &summary.failed {
        warn!("No se pudo clasificar {:?}: {:#}", path, e);
    }

    println!(
        "\nresumen: {} archivos, {} rechazados, {} fallidos",
        summary.files,
        summary.rejected,
        summary.failed.len()
    );
    if !summary.failed.is_empty() {
        bail!(
            "{} de {} archivos no se pudieron clasificar",
            summary.failed.len(),
            summary.files
        );
    }
    Ok(())
}
