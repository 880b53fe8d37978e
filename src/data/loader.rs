//! Dataset loading
//!
//! The canonical source is the UCI Wine Quality collection (dataset id 186),
//! published as two semicolon-separated tables, one for red and one for white
//! vinho verde. Both are fetched and stacked, red first.

use crate::error::{Result, VinoError};
use ndarray::{concatenate, Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::Dataset;

/// Canonical feature order. Every consumer reindexes its inputs to this order.
pub const FEATURE_NAMES: [&str; 11] = [
    "fixed_acidity",
    "volatile_acidity",
    "citric_acid",
    "residual_sugar",
    "chlorides",
    "free_sulfur_dioxide",
    "total_sulfur_dioxide",
    "density",
    "pH",
    "sulphates",
    "alcohol",
];

/// Target column name
pub const TARGET_COLUMN: &str = "quality";

/// Base URL of the UCI archive directory holding the wine-quality tables
pub const UCI_BASE_URL: &str = "https://archive.ics.uci.edu/ml/machine-learning-databases/wine-quality";

const UCI_TABLES: [&str; 2] = ["winequality-red.csv", "winequality-white.csv"];

/// Where the raw table comes from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DatasetSource {
    /// UCI archive (red + white tables)
    Uci { base_url: String },
    /// Local delimited file with the same columns
    Csv { path: PathBuf, separator: char },
}

impl Default for DatasetSource {
    fn default() -> Self {
        DatasetSource::Uci {
            base_url: UCI_BASE_URL.to_string(),
        }
    }
}

impl std::fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetSource::Uci { base_url } => write!(f, "UCI wine-quality ({})", base_url),
            DatasetSource::Csv { path, .. } => write!(f, "CSV ({})", path.display()),
        }
    }
}

/// Fetches the raw dataset and normalizes it into a [`Dataset`]
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    source: DatasetSource,
    timeout_secs: u64,
}

impl DatasetLoader {
    pub fn new(source: DatasetSource) -> Self {
        Self {
            source,
            timeout_secs: 60,
        }
    }

    /// Set the HTTP timeout for remote sources
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn source(&self) -> &DatasetSource {
        &self.source
    }

    /// Fetch and normalize the dataset. A single failure aborts; there is no retry.
    pub async fn fetch(&self) -> Result<Dataset> {
        let start = Instant::now();
        info!(source = %self.source, "Loading dataset");

        let dataset = match &self.source {
            DatasetSource::Uci { base_url } => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(self.timeout_secs))
                    .build()
                    .map_err(|e| VinoError::DataUnavailable(format!("Failed to create HTTP client: {}", e)))?;

                let mut parts = Vec::with_capacity(UCI_TABLES.len());
                for table in UCI_TABLES {
                    let url = format!("{}/{}", base_url.trim_end_matches('/'), table);
                    let bytes = download(&client, &url).await?;
                    debug!(url = %url, bytes = bytes.len(), "Downloaded table");
                    parts.push(Self::parse_csv(&bytes, b';')?);
                }
                Self::concat(parts)?
            }
            DatasetSource::Csv { path, separator } => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    VinoError::DataUnavailable(format!("Cannot read {}: {}", path.display(), e))
                })?;
                let separator = u8::try_from(*separator).map_err(|_| {
                    VinoError::invalid_parameter("separator", separator, "must be a single-byte character")
                })?;
                Self::parse_csv(&bytes, separator)?
            }
        };

        info!(
            rows = dataset.n_samples(),
            features = dataset.n_features(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Parse a delimited table holding the canonical feature columns and the
    /// `quality` target. Extra columns are ignored.
    ///
    /// Every column is read as text and cast to `f64` afterwards, so an
    /// integral prefix never fixes a column's dtype.
    pub fn parse_csv(bytes: &[u8], separator: u8) -> Result<Dataset> {
        let parse_opts = CsvParseOptions::default().with_separator(separator);

        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
            .finish()
            .map_err(|e| VinoError::DataUnavailable(format!("Malformed table: {}", e)))?;

        if df.height() == 0 {
            return Err(VinoError::DataUnavailable("Table has no rows".to_string()));
        }

        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let resolve = |wanted: &str| -> Result<String> {
            columns
                .iter()
                .find(|c| normalize_header(c) == wanted.to_lowercase())
                .cloned()
                .ok_or_else(|| VinoError::DataUnavailable(format!("Missing column: {}", wanted)))
        };

        let col_data: Vec<Vec<f64>> = FEATURE_NAMES
            .iter()
            .map(|name| column_values(&df, &resolve(name)?))
            .collect::<Result<Vec<_>>>()?;
        let targets = Array1::from_vec(column_values(&df, &resolve(TARGET_COLUMN)?)?);

        let n_rows = df.height();
        let features = Array2::from_shape_fn((n_rows, FEATURE_NAMES.len()), |(r, c)| col_data[c][r]);

        Dataset::new(
            features,
            targets,
            FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn concat(parts: Vec<Dataset>) -> Result<Dataset> {
        let feature_names = parts
            .first()
            .map(|d| d.feature_names.clone())
            .ok_or_else(|| VinoError::DataUnavailable("No tables fetched".to_string()))?;
        let x_views: Vec<_> = parts.iter().map(|d| d.features.view()).collect();
        let y_views: Vec<_> = parts.iter().map(|d| d.targets.view()).collect();
        let features = concatenate(Axis(0), &x_views)?;
        let targets = concatenate(Axis(0), &y_views)?;
        Dataset::new(features, targets, feature_names)
    }
}

async fn download(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| VinoError::DataUnavailable(format!("GET {} failed: {}", url, e)))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| VinoError::DataUnavailable(format!("Reading {} failed: {}", url, e)))?;
    Ok(bytes.to_vec())
}

/// `"Fixed Acidity"` -> `fixed_acidity`
fn normalize_header(raw: &str) -> String {
    raw.trim()
        .trim_matches('"')
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = df
        .column(name)
        .map_err(|_| VinoError::DataUnavailable(format!("Missing column: {}", name)))?;
    let series_f64 = series
        .cast(&DataType::Float64)
        .map_err(|e| VinoError::DataUnavailable(format!("Column {} is not numeric: {}", name, e)))?;
    series_f64
        .f64()
        .map_err(|e| VinoError::DataUnavailable(e.to_string()))?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.filter(|x| x.is_finite()).ok_or_else(|| {
                VinoError::DataUnavailable(format!("Column {} has a missing or non-numeric value at row {}", name, row))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED_SAMPLE: &str = "\"fixed acidity\";\"volatile acidity\";\"citric acid\";\"residual sugar\";\"chlorides\";\"free sulfur dioxide\";\"total sulfur dioxide\";\"density\";\"pH\";\"sulphates\";\"alcohol\";\"quality\"
7.4;0.7;0;1.9;0.076;11;34;0.9978;3.51;0.56;9.4;5
7.8;0.88;0;2.6;0.098;25;67;0.9968;3.2;0.68;9.8;5
11.2;0.28;0.56;1.9;0.075;17;60;0.998;3.16;0.58;9.8;6
";

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("\"fixed acidity\""), "fixed_acidity");
        assert_eq!(normalize_header("  Free  Sulfur Dioxide "), "free_sulfur_dioxide");
        assert_eq!(normalize_header("pH"), "ph");
    }

    #[test]
    fn test_parse_uci_table() {
        let ds = DatasetLoader::parse_csv(RED_SAMPLE.as_bytes(), b';').unwrap();
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.n_features(), 11);
        assert_eq!(ds.feature_names[8], "pH");
        assert_eq!(ds.features[[0, 0]], 7.4);
        assert_eq!(ds.features[[2, 10]], 9.8);
        assert_eq!(ds.targets.to_vec(), vec![5.0, 5.0, 6.0]);
    }

    #[test]
    fn test_parse_reorders_columns() {
        let mut header: Vec<String> = FEATURE_NAMES.iter().rev().map(|s| s.to_string()).collect();
        header.push("quality".to_string());
        let row: Vec<String> = (0..11).rev().map(|i| i.to_string()).chain(["7".to_string()]).collect();
        let csv = format!("{}\n{}\n", header.join(","), row.join(","));

        let ds = DatasetLoader::parse_csv(csv.as_bytes(), b',').unwrap();
        let expected: Vec<f64> = (0..11).map(|i| i as f64).collect();
        assert_eq!(ds.features.row(0).to_vec(), expected);
    }

    #[test]
    fn test_missing_target_is_unavailable() {
        let csv = "fixed_acidity,alcohol\n1.0,2.0\n";
        let err = DatasetLoader::parse_csv(csv.as_bytes(), b',').unwrap_err();
        assert!(matches!(err, VinoError::DataUnavailable(_)));
    }

    fn table_with_row(cells: &[&str]) -> String {
        let mut header: Vec<&str> = FEATURE_NAMES.to_vec();
        header.push(TARGET_COLUMN);
        let good = vec!["1"; 12].join(",");
        format!("{}\n{}\n{}\n", header.join(","), good, cells.join(","))
    }

    #[test]
    fn test_late_decimal_in_integer_column() {
        let mut csv = String::from(RED_SAMPLE.lines().next().unwrap());
        csv.push('\n');
        for i in 0..1100 {
            let free_so2 = if i == 1050 { "5.5".to_string() } else { (i % 40).to_string() };
            csv.push_str(&format!("7.4;0.7;0;1.9;0.076;{};34;0.9978;3.51;0.56;9.4;5\n", free_so2));
        }

        let ds = DatasetLoader::parse_csv(csv.as_bytes(), b';').unwrap();
        assert_eq!(ds.n_samples(), 1100);
        assert_eq!(ds.features[[1050, 5]], 5.5);
        assert_eq!(ds.features[[1049, 5]], 9.0);
    }

    #[test]
    fn test_non_numeric_cell_is_unavailable() {
        let mut cells = vec!["1"; 12];
        cells[3] = "sweet";
        let csv = table_with_row(&cells);
        let err = DatasetLoader::parse_csv(csv.as_bytes(), b',').unwrap_err();
        assert!(matches!(err, VinoError::DataUnavailable(_)));
    }

    #[test]
    fn test_empty_cell_is_unavailable() {
        let mut cells = vec!["1"; 12];
        cells[7] = "";
        let csv = table_with_row(&cells);
        let err = DatasetLoader::parse_csv(csv.as_bytes(), b',').unwrap_err();
        assert!(matches!(err, VinoError::DataUnavailable(_)));
    }

    #[test]
    fn test_non_finite_cell_is_unavailable() {
        for bad in ["inf", "NaN"] {
            let mut cells = vec!["1"; 12];
            cells[10] = bad;
            let csv = table_with_row(&cells);
            let err = DatasetLoader::parse_csv(csv.as_bytes(), b',').unwrap_err();
            assert!(matches!(err, VinoError::DataUnavailable(_)), "{} accepted", bad);
        }
    }

    #[test]
    fn test_concat_stacks_rows() {
        let a = DatasetLoader::parse_csv(RED_SAMPLE.as_bytes(), b';').unwrap();
        let b = a.clone();
        let all = DatasetLoader::concat(vec![a, b]).unwrap();
        assert_eq!(all.n_samples(), 6);
        assert_eq!(all.targets[5], 6.0);
    }

    #[tokio::test]
    async fn test_fetch_missing_file() {
        let loader = DatasetLoader::new(DatasetSource::Csv {
            path: PathBuf::from("/definitely/not/here.csv"),
            separator: ',',
        });
        assert!(matches!(loader.fetch().await, Err(VinoError::DataUnavailable(_))));
    }
}
