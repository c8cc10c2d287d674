/*
Reconocimiento de gestos IMU por plantillas (DTW + correlación cruzada)

Subcomandos:
  evaluate     partición estratificada + k-NN sobre distancias DTW
  classify     clasifica un CSV contra las referencias del manifiesto
  build-model  calibra umbrales y guarda el artefacto JSON

Ejemplos:
     ./target/release/gestodtw evaluate --session s1 --k 3
     ./target/release/gestodtw classify --csv data/raw/s1/swipe_left_r03.csv
     ./target/release/gestodtw build-model --model-out data/model/action_model.json

Nivel de log con RUST_LOG (por defecto info).
*/

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use gestodtw::evaluate::evaluate;
use gestodtw::manifest::{load_labeled_sequences, parse_label_filter, read_manifest};
use gestodtw::report::{format_classification, format_evaluation};
use gestodtw::{
    EvalParams, GestureClassifier, LabeledSequence, MatcherParams, ModelArtifact, ReferencePool,
    ScoreMode,
};

#[derive(Parser)]
#[command(name = "gestodtw", version, about = "Clasificación de gestos IMU con DTW")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluación con partición estratificada sobre el manifiesto
    Evaluate {
        #[command(flatten)]
        data: DataArgs,
        /// K del k-NN sobre distancias DTW
        #[arg(long, default_value_t = 1)]
        k: usize,
        /// Fracción de test por etiqueta
        #[arg(long, default_value_t = 0.3)]
        test_ratio: f64,
        /// Semilla del barajado
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
    /// Clasifica un CSV usando el manifiesto como referencias
    Classify {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        matcher: MatcherArgs,
        /// CSV a clasificar
        #[arg(long)]
        csv: PathBuf,
        /// Vecinos mostrados en el informe
        #[arg(long, default_value_t = 1)]
        k: usize,
        /// Desactiva el rechazo por umbral calibrado
        #[arg(long)]
        disable_reject: bool,
    },
    /// Calibra una vez y guarda el modelo para el clasificador en línea
    BuildModel {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        matcher: MatcherArgs,
        #[arg(long, default_value = "data/model/action_model.json")]
        model_out: PathBuf,
    },
}

/// Selección y preparación de las grabaciones
#[derive(Args)]
struct DataArgs {
    #[arg(long, default_value = "data/labels/manifest.jsonl")]
    manifest: PathBuf,
    /// Filtro opcional por session_id
    #[arg(long, default_value = "")]
    session: String,
    /// Filtro opcional de etiquetas separadas por comas (p.ej. swipe_left,idle)
    #[arg(long, default_value = "")]
    labels: String,
    /// Puntos máximos tras el remuestreo
    #[arg(long, default_value_t = 180)]
    max_points: i64,
    /// Banda Sakoe-Chiba como fracción (0 = matriz completa)
    #[arg(long, default_value_t = 0.2)]
    window_frac: f64,
    /// Desactiva la z-normalización por canal
    #[arg(long)]
    no_znorm: bool,
}

#[derive(Args)]
struct MatcherArgs {
    /// Vecinos promediados dentro de cada etiqueta
    #[arg(long, default_value_t = 3)]
    per_label_k: usize,
    /// Modo de puntuación: dtw, xcorr o hybrid
    #[arg(long, default_value_t = ScoreMode::Hybrid)]
    score_mode: ScoreMode,
    #[arg(long, default_value_t = 0.35)]
    hybrid_alpha: f64,
    #[arg(long, default_value_t = 0.15)]
    xcorr_max_lag_frac: f64,
    #[arg(long, default_value_t = 0.50)]
    xcorr_min_overlap_frac: f64,
    /// Cuantil de las autopuntuaciones por etiqueta
    #[arg(long, default_value_t = 1.0)]
    reject_quantile: f64,
    /// Escala del umbral (mayor = menos estricto)
    #[arg(long, default_value_t = 1.10)]
    reject_scale: f64,
    /// Razón mínima segundo/mejor
    #[arg(long, default_value_t = 1.03)]
    reject_margin: f64,
    /// Holgura sobre el umbral calibrado
    #[arg(long, default_value_t = 1.03)]
    reject_threshold_grace: f64,
    #[arg(long, default_value = "unknown")]
    unknown_label: String,
}

impl MatcherArgs {
    fn to_params(&self, data: &DataArgs) -> MatcherParams {
        MatcherParams {
            max_points: data.max_points,
            use_znorm: !data.no_znorm,
            window_frac: data.window_frac,
            per_label_k: self.per_label_k,
            score_mode: self.score_mode,
            hybrid_alpha: self.hybrid_alpha,
            xcorr_max_lag_frac: self.xcorr_max_lag_frac,
            xcorr_min_overlap_frac: self.xcorr_min_overlap_frac,
            reject_quantile: self.reject_quantile,
            reject_scale: self.reject_scale,
            reject_margin: self.reject_margin,
            reject_threshold_grace: self.reject_threshold_grace,
            unknown_label: self.unknown_label.clone(),
        }
    }
}

fn load_items(data: &DataArgs) -> Result<Vec<LabeledSequence>> {
    let labels = parse_label_filter(&data.labels);
    let rows = read_manifest(&data.manifest, &data.session, &labels)?;
    load_labeled_sequences(&rows, data.max_points, !data.no_znorm)
}

fn run_evaluate(data: &DataArgs, k: usize, test_ratio: f64, seed: u64) -> Result<()> {
    let params = EvalParams {
        k,
        test_ratio,
        seed,
        window_frac: data.window_frac,
    };
    params.validate()?;

    let items = load_items(data)?;
    let label_set: BTreeSet<&str> = items.iter().map(|x| x.label.as_str()).collect();
    println!("loaded {} samples, labels={:?}", items.len(), label_set);
    if label_set.len() < 2 {
        println!("warning: only one label found; evaluation is not discriminative yet.");
    }

    let report = evaluate(&items, &params)?;
    println!(
        "train={} test={} k={}",
        report.train_size, report.test_size, params.k
    );
    print!("{}", format_evaluation(&report));
    Ok(())
}

fn run_classify(
    data: &DataArgs,
    matcher: &MatcherArgs,
    csv: &Path,
    k: usize,
    disable_reject: bool,
) -> Result<()> {
    if k == 0 {
        bail!("--k debe ser > 0");
    }
    let params = matcher.to_params(data);
    params.validate()?;

    let pool = ReferencePool::new(load_items(data)?)?;
    let classifier = GestureClassifier::calibrated(pool, params, !disable_reject)?;
    let outcome = classifier.classify_csv(csv)?;

    print!(
        "{}",
        format_classification(&outcome, classifier.params().score_mode, k)
    );
    Ok(())
}

fn run_build_model(data: &DataArgs, matcher: &MatcherArgs, model_out: &Path) -> Result<()> {
    let params = matcher.to_params(data);
    params.validate()?;

    let t0 = Instant::now();
    let pool = ReferencePool::new(load_items(data)?)?;
    let artifact = ModelArtifact::build(&pool, &params, true)?;
    let elapsed = t0.elapsed();

    artifact.save(model_out)?;
    println!("saved model: {}", model_out.display());
    println!(
        "labels={:?} refs={}",
        artifact.labels,
        artifact.references.len()
    );
    println!("thresholds={:?}", artifact.thresholds);
    println!("build_seconds={:.3}", elapsed.as_secs_f64());
    Ok(())
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

    let cli = Cli::parse();
    match &cli.command {
        Command::Evaluate {
            data,
            k,
            test_ratio,
            seed,
        } => run_evaluate(data, *k, *test_ratio, *seed),
        Command::Classify {
            data,
            matcher,
            csv,
            k,
            disable_reject,
        } => run_classify(data, matcher, csv, *k, *disable_reject),
        Command::BuildModel {
            data,
            matcher,
            model_out,
        } => run_build_model(data, matcher, model_out),
    }
}
