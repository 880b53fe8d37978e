//! Exploratory chart data
//!
//! Reads the dataset independently of training and writes three JSON chart
//! files next to the artifacts. The dashboard draws them client-side.

use crate::artifacts::ArtifactWriter;
use crate::data::{Dataset, TARGET_COLUMN};
use crate::error::{Result, VinoError};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

pub const HISTOGRAM_BINS: usize = 20;

pub const EDA_HISTOGRAMS: &str = "eda_histograms";
pub const EDA_CORRELATION: &str = "eda_correlation";
pub const EDA_QUALITY_DIST: &str = "eda_quality_dist";

/// Names the server is allowed to expose under `/eda/:name`
pub const EDA_OUTPUTS: [&str; 3] = [EDA_HISTOGRAMS, EDA_CORRELATION, EDA_QUALITY_DIST];

pub fn file_name(output: &str) -> String {
    format!("{}.json", output)
}

/// Equal-width histogram; the last bin is closed on the right
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub column: String,
    pub bin_edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn compute(column: &str, values: ArrayView1<f64>, n_bins: usize) -> Result<Self> {
        if values.is_empty() || n_bins == 0 {
            return Err(VinoError::InvalidInput(format!("Cannot bin column {}", column)));
        }
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        // a constant column gets a unit-wide range around its value
        let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
        let width = (hi - lo) / n_bins as f64;

        let bin_edges: Vec<f64> = (0..=n_bins).map(|i| lo + width * i as f64).collect();
        let mut counts = vec![0usize; n_bins];
        for &v in values.iter() {
            let idx = (((v - lo) / width).floor() as usize).min(n_bins - 1);
            counts[idx] += 1;
        }
        Ok(Self {
            column: column.to_string(),
            bin_edges,
            counts,
        })
    }
}

/// Pearson correlations over the features and the target.
/// Entries involving a constant column are `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

pub fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
    let n = a.len() as f64;
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (ma, mb) = (a.sum() / n, b.sum() / n);
    let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
    for (&x, &y) in a.iter().zip(b.iter()) {
        cov += (x - ma) * (y - mb);
        va += (x - ma).powi(2);
        vb += (y - mb).powi(2);
    }
    (va > 0.0 && vb > 0.0).then(|| (cov / (va.sqrt() * vb.sqrt())).clamp(-1.0, 1.0))
}

impl CorrelationMatrix {
    pub fn compute(dataset: &Dataset) -> Self {
        let mut columns = dataset.feature_names.clone();
        columns.push(TARGET_COLUMN.to_string());
        let series: Vec<Array1<f64>> = dataset
            .features
            .columns()
            .into_iter()
            .map(|c| c.to_owned())
            .chain(std::iter::once(dataset.targets.clone()))
            .collect();

        let values = series
            .iter()
            .map(|a| series.iter().map(|b| pearson(a.view(), b.view())).collect())
            .collect();
        Self { columns, values }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityCount {
    pub quality: i64,
    pub count: usize,
}

/// Count of samples per quality score, ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityDistribution {
    pub counts: Vec<QualityCount>,
}

impl QualityDistribution {
    pub fn compute(targets: &Array1<f64>) -> Self {
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for &y in targets.iter() {
            *counts.entry(y.round() as i64).or_insert(0) += 1;
        }
        Self {
            counts: counts
                .into_iter()
                .map(|(quality, count)| QualityCount { quality, count })
                .collect(),
        }
    }
}

/// All three chart datasets
#[derive(Debug, Clone)]
pub struct EdaReport {
    pub histograms: Vec<Histogram>,
    pub correlation: CorrelationMatrix,
    pub quality: QualityDistribution,
}

impl EdaReport {
    pub fn compute(dataset: &Dataset) -> Result<Self> {
        let mut histograms = dataset
            .feature_names
            .iter()
            .zip(dataset.features.columns())
            .map(|(name, col)| Histogram::compute(name, col, HISTOGRAM_BINS))
            .collect::<Result<Vec<_>>>()?;
        histograms.push(Histogram::compute(TARGET_COLUMN, dataset.targets.view(), HISTOGRAM_BINS)?);

        Ok(Self {
            histograms,
            correlation: CorrelationMatrix::compute(dataset),
            quality: QualityDistribution::compute(&dataset.targets),
        })
    }

    pub fn write(&self, writer: &ArtifactWriter) -> Result<()> {
        writer.write_json("histograms", &file_name(EDA_HISTOGRAMS), &self.histograms)?;
        writer.write_json("correlation", &file_name(EDA_CORRELATION), &self.correlation)?;
        writer.write_json("quality distribution", &file_name(EDA_QUALITY_DIST), &self.quality)?;
        info!(dir = %writer.paths().dir().display(), "EDA chart data written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_histogram_counts() {
        let values = array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let h = Histogram::compute("x", values.view(), 5).unwrap();
        assert_eq!(h.bin_edges.len(), 6);
        assert_eq!(h.counts, vec![2, 2, 2, 2, 3]);
        assert_eq!(h.counts.iter().sum::<usize>(), 11);
    }

    #[test]
    fn test_histogram_constant_column() {
        let values = array![3.0, 3.0, 3.0];
        let h = Histogram::compute("x", values.view(), HISTOGRAM_BINS).unwrap();
        assert_eq!(h.counts.iter().sum::<usize>(), 3);
        assert_relative_eq!(h.bin_edges[0], 2.5);
    }

    #[test]
    fn test_pearson() {
        let a = array![1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(pearson(a.view(), (&a * 2.0).view()).unwrap(), 1.0);
        assert_relative_eq!(pearson(a.view(), (-&a).view()).unwrap(), -1.0);
        assert_eq!(pearson(a.view(), array![1.0, 1.0, 1.0, 1.0].view()), None);
    }

    #[test]
    fn test_quality_distribution() {
        let d = QualityDistribution::compute(&array![6.0, 5.0, 6.0, 8.0]);
        assert_eq!(
            d.counts,
            vec![
                QualityCount { quality: 5, count: 1 },
                QualityCount { quality: 6, count: 2 },
                QualityCount { quality: 8, count: 1 },
            ]
        );
    }

    #[test]
    fn test_report_writes_three_files() {
        let x = ndarray::Array2::from_shape_fn((10, 2), |(i, j)| (i * (j + 1)) as f64);
        let y = Array1::from_iter((0..10).map(|i| 5.0 + (i % 3) as f64));
        let ds = Dataset::new(x, y, vec!["a".to_string(), "b".to_string()]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let report = EdaReport::compute(&ds).unwrap();
        assert_eq!(report.histograms.len(), 3);
        assert_eq!(report.correlation.columns.len(), 3);
        report.write(&ArtifactWriter::new(dir.path())).unwrap();
        for name in EDA_OUTPUTS {
            assert!(dir.path().join(file_name(name)).exists());
        }
    }
}
