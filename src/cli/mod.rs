//! VinoVeritas CLI Module
//!
//! Command-line interface for training, prediction, EDA and serving.

use clap::{Parser, Subcommand};
use colored::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifacts::{self, ArtifactPaths, ArtifactWriter};
use crate::config::{EstimatorKind, TrainingConfig};
use crate::data::{DatasetLoader, DatasetSource};
use crate::eda::EdaReport;
use crate::inference::{ArtifactCache, Predictor};
use crate::training::TrainEngine;

// ─── Styling helpers ───────────────────────────────────────────────────────────

const W: usize = 58; // box inner width

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(190, 80, 110) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn line_box_top()    { println!("  {}", dim("┌─────────────────────────────────────────────────────────┐")); }
fn line_box_bottom() { println!("  {}", dim("└─────────────────────────────────────────────────────────┘")); }
fn line_box_sep()    { println!("  {}", dim("├─────────────────────────────────────────────────────────┤")); }

fn line_box(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let pad = W.saturating_sub(visible_len);
    println!("  {}  {}{} {}", dim("│"), content, " ".repeat(pad), dim("│"));
}

fn line_box_center(content: &str) {
    let visible_len = strip_ansi(content).chars().count();
    let total_pad = W.saturating_sub(visible_len);
    let left = total_pad / 2;
    let right = total_pad - left;
    println!("  {}  {}{}{} {}", dim("│"), " ".repeat(left), content, " ".repeat(right), dim("│"));
}

fn line_box_empty() { line_box(""); }

fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' { in_escape = true; continue; }
        if in_escape { if c == 'm' { in_escape = false; } continue; }
        out.push(c);
    }
    out
}

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn step_missing(msg: &str) {
    println!("  {} {}", "✗".yellow(), msg);
}

fn step_run(msg: &str) {
    println!("  {} {}...", accent("›"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vinoveritas")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wine-quality estimator: tuned gradient boosting with a small serving layer")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tune, evaluate and persist a model
    Train {
        /// JSON training configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,

        /// Local CSV instead of the UCI download
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Field separator of --data
        #[arg(long, default_value = ";")]
        separator: char,

        /// Estimator kind (hist, classic)
        #[arg(short, long)]
        estimator: Option<EstimatorKind>,

        /// Number of sampled configurations
        #[arg(long)]
        n_iter: Option<usize>,

        /// Cross-validation folds
        #[arg(long)]
        cv: Option<usize>,

        /// Held-out test fraction
        #[arg(long)]
        test_size: Option<f64>,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads for the search
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Artifact directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score one wine from FEATURE=VALUE pairs
    Predict {
        /// Artifact directory
        #[arg(short, long, default_value = ".")]
        artifacts: PathBuf,

        /// Feature values, e.g. alcohol=12.5
        #[arg(required = true)]
        features: Vec<String>,
    },

    /// Write EDA chart data
    Eda {
        /// Local CSV instead of the UCI download
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Field separator of --data
        #[arg(long, default_value = ";")]
        separator: char,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Start the web server
    Serve {
        /// Server port
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Artifact directory
        #[arg(short, long, default_value = ".")]
        artifacts: PathBuf,
    },

    /// Show artifact status
    Info {
        /// Artifact directory
        #[arg(short, long, default_value = ".")]
        artifacts: PathBuf,
    },
}

/// Overrides taken from `train` flags
#[derive(Debug, Default)]
pub struct TrainArgs {
    pub config: Option<PathBuf>,
    pub data: Option<PathBuf>,
    pub separator: char,
    pub estimator: Option<EstimatorKind>,
    pub n_iter: Option<usize>,
    pub cv: Option<usize>,
    pub test_size: Option<f64>,
    pub seed: Option<u64>,
    pub jobs: Option<usize>,
    pub output: Option<PathBuf>,
}

impl TrainArgs {
    /// Merge flags over the config file (or defaults)
    pub fn resolve(&self) -> anyhow::Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_json_file(path)?,
            None => TrainingConfig::default(),
        };
        if let Some(path) = &self.data {
            config = config.with_source(csv_source(path, self.separator));
        }
        if let Some(estimator) = self.estimator {
            config = config.with_estimator(estimator);
        }
        if let Some(n) = self.n_iter {
            config = config.with_n_iter(n);
        }
        if let Some(k) = self.cv {
            config = config.with_cv_folds(k);
        }
        if let Some(f) = self.test_size {
            config = config.with_test_size(f);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if self.jobs.is_some() {
            config = config.with_n_jobs(self.jobs);
        }
        if let Some(dir) = &self.output {
            config = config.with_artifact_dir(dir);
        }
        config.validate()?;
        Ok(config)
    }
}

fn csv_source(path: &Path, separator: char) -> DatasetSource {
    DatasetSource::Csv {
        path: path.to_path_buf(),
        separator,
    }
}

/// Parse `name=value` pairs into a feature map
pub fn parse_assignments(pairs: &[String]) -> anyhow::Result<HashMap<String, f64>> {
    pairs
        .iter()
        .map(|pair| {
            let (name, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("Expected FEATURE=VALUE, got `{}`", pair))?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Value for `{}` is not a number: `{}`", name, value))?;
            if !value.is_finite() {
                anyhow::bail!("Value for `{}` must be finite", name);
            }
            Ok((name.trim().to_string(), value))
        })
        .collect()
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_train(args: TrainArgs) -> anyhow::Result<()> {
    section("Train");
    let config = args.resolve()?;

    println!("  {:<16} {}", muted("Source"), config.source);
    println!("  {:<16} {}", muted("Estimator"), config.estimator.to_string().cyan());
    println!(
        "  {:<16} {} trials × {} folds",
        muted("Search"),
        config.n_iter,
        config.cv_folds
    );
    println!();

    step_run("Loading data, searching and evaluating");
    let start = Instant::now();
    let engine = TrainEngine::new(config);
    let report = engine.run().await?;
    step_ok(&format!(
        "{} train / {} test rows in {:.1}s",
        report.n_train,
        report.n_test,
        start.elapsed().as_secs_f64()
    ));

    section("Best configuration");
    for (name, value) in report.outcome.best_params.iter() {
        println!("  {:<20} {}", muted(name), value.to_string().white());
    }
    println!();
    println!("  {:<20} {}", muted("CV weighted MAE"), format!("{:.4}", report.outcome.best_score).white().bold());

    section("Held-out metrics");
    println!("  {:<16} {}", muted("RMSE"), format!("{:.4}", report.metrics.rmse).white().bold());
    println!("  {:<16} {}", muted("MAE"), format!("{:.4}", report.metrics.mae).white().bold());
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", report.metrics.r2).white().bold());

    section("Top candidates");
    println!(
        "  {:>4} {:>6} {:>10} {:>8}  {}",
        muted("rank"),
        muted("trial"),
        muted("mean"),
        muted("std"),
        muted("params")
    );
    for trial in report.outcome.top(artifacts::SUMMARY_TOP_N) {
        println!(
            "  {:>4} {:>6} {:>10.4} {:>8.4}  {}",
            trial.rank,
            trial.trial_id,
            trial.mean_score,
            trial.std_score,
            dim(&trial.params.to_string())
        );
    }

    let paths = ArtifactPaths::new(&engine.config().artifact_dir);
    section("Artifacts");
    for path in [paths.model(), paths.features(), paths.metrics(), paths.search_summary()] {
        step_ok(&path.display().to_string());
    }
    println!();
    Ok(())
}

pub async fn cmd_predict(artifact_dir: &Path, pairs: &[String]) -> anyhow::Result<()> {
    section("Predict");
    let input = parse_assignments(pairs)?;

    let cache = ArtifactCache::new(ArtifactPaths::new(artifact_dir));
    let predictor = Predictor::from_cache(&cache).await?.ok_or_else(|| {
        anyhow::anyhow!(
            "Model artifacts not found in {}. Run `vinoveritas train` first.",
            artifact_dir.display()
        )
    })?;

    let result = predictor.predict(&input)?;
    if !result.unknown.is_empty() {
        println!("  {} {}", "ignored:".yellow(), result.unknown.join(", "));
    }
    if !result.missing.is_empty() {
        println!("  {} {}", dim("defaulted to 0:"), dim(&result.missing.join(", ")));
    }

    let p = &result.prediction;
    println!();
    println!("  {:<10} {}", muted("Score"), format!("{:.1}", p.score).white().bold());
    println!("  {:<10} {}", muted("Verdict"), accent(&p.verdict).bold());
    println!("  {:<10} {}", muted("Advice"), p.advice);
    println!();
    Ok(())
}

pub async fn cmd_eda(data: Option<&Path>, separator: char, output: &Path) -> anyhow::Result<()> {
    section("EDA");

    let source = data.map(|p| csv_source(p, separator)).unwrap_or_default();
    step_run(&format!("Loading {}", source));
    let dataset = DatasetLoader::new(source).fetch().await?;
    step_ok(&format!("{} rows × {} features", dataset.n_samples(), dataset.n_features()));

    let report = EdaReport::compute(&dataset)?;
    report.write(&ArtifactWriter::new(output))?;
    for name in crate::eda::EDA_OUTPUTS {
        step_ok(&output.join(crate::eda::file_name(name)).display().to_string());
    }
    println!();
    Ok(())
}

pub fn cmd_info(artifact_dir: &Path) -> anyhow::Result<()> {
    section("Artifacts");
    let paths = ArtifactPaths::new(artifact_dir);

    println!("  {:<12} {}", muted("Directory"), artifact_dir.display());
    println!();
    for (label, path) in [
        ("model", paths.model()),
        ("features", paths.features()),
        ("metrics", paths.metrics()),
        ("search", paths.search_summary()),
        ("report", paths.report()),
    ] {
        let name = format!("{:<10} {}", label, dim(&path.display().to_string()));
        if path.exists() {
            step_ok(&name);
        } else {
            step_missing(&name);
        }
    }

    if paths.features().exists() {
        section("Features");
        for (i, name) in artifacts::read_feature_names(&paths)?.iter().enumerate() {
            println!("  {:>3}  {}", dim(&i.to_string()), name);
        }
    }

    if paths.metrics().exists() {
        let metrics = artifacts::read_metrics(&paths)?;
        section("Metrics");
        println!("  {:<8} {:.4}", muted("RMSE"), metrics.rmse);
        println!("  {:<8} {:.4}", muted("MAE"), metrics.mae);
        println!("  {:<8} {:.4}", muted("R²"), metrics.r2);
    }
    println!();
    Ok(())
}

// ─── Serve ─────────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: &str, port: u16, artifact_dir: &Path) -> anyhow::Result<()> {
    use crate::server::{run_server, ServerConfig};

    println!();
    line_box_top();
    line_box_empty();
    line_box_center(&format!("{}", "VinoVeritas".white().bold()));
    line_box_center(&format!("{}", dim(&format!("v{}", env!("CARGO_PKG_VERSION")))));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box(&kv("Dashboard", &format!("http://{}:{}", host, port)));
    line_box(&kv("Health   ", &format!("http://{}:{}/health", host, port)));
    line_box(&kv("Artifacts", &artifact_dir.display().to_string()));
    line_box_empty();
    line_box_sep();
    line_box_empty();
    line_box_center(&format!("{}", dim("ctrl+c to stop")));
    line_box_empty();
    line_box_bottom();
    println!();

    let config = ServerConfig::default()
        .with_host(host)
        .with_port(port)
        .with_artifact_dir(artifact_dir);
    run_server(config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assignments() {
        let pairs = vec!["alcohol=12.5".to_string(), " pH = 3.2".to_string()];
        let map = parse_assignments(&pairs).unwrap();
        assert_eq!(map["alcohol"], 12.5);
        assert_eq!(map["pH"], 3.2);
    }

    #[test]
    fn test_parse_assignments_rejects_garbage() {
        assert!(parse_assignments(&["alcohol".to_string()]).is_err());
        assert!(parse_assignments(&["alcohol=strong".to_string()]).is_err());
        assert!(parse_assignments(&["alcohol=NaN".to_string()]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        std::fs::write(&path, r#"{"n_iter": 7, "cv_folds": 3, "estimator": "classic"}"#).unwrap();

        let args = TrainArgs {
            config: Some(path),
            n_iter: Some(12),
            separator: ';',
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.n_iter, 12);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.estimator, EstimatorKind::Classic);
    }

    #[test]
    fn test_strip_ansi() {
        let s = format!("{}", "hi".red());
        assert_eq!(strip_ansi(&s), "hi");
    }

    #[test]
    fn test_cli_parses_predict() {
        let cli = Cli::parse_from(["vinoveritas", "predict", "-a", "out", "alcohol=11"]);
        match cli.command {
            Some(Commands::Predict { artifacts, features }) => {
                assert_eq!(artifacts, PathBuf::from("out"));
                assert_eq!(features, vec!["alcohol=11".to_string()]);
            }
            _ => panic!("expected predict"),
        }
    }
}
