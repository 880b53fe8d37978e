//! Mapping free-form feature inputs onto the trained column order

use ndarray::Array2;
use std::collections::HashMap;

/// One input row in the canonical feature order
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    values: Vec<f64>,
}

/// Result of canonicalizing a named input
#[derive(Debug, Clone, PartialEq)]
pub struct Canonicalized {
    pub row: FeatureRow,
    /// Expected names absent from the input, filled with 0.0
    pub missing: Vec<String>,
    /// Input names not in the feature list, sorted; they are ignored
    pub unknown: Vec<String>,
}

impl FeatureRow {
    /// Reindex `input` against `names`
    pub fn canonicalize(names: &[String], input: &HashMap<String, f64>) -> Canonicalized {
        let mut missing = Vec::new();
        let values = names
            .iter()
            .map(|name| {
                input.get(name).copied().unwrap_or_else(|| {
                    missing.push(name.clone());
                    0.0
                })
            })
            .collect();

        let mut unknown: Vec<String> = input.keys().filter(|k| !names.contains(k)).cloned().collect();
        unknown.sort();

        Canonicalized {
            row: FeatureRow { values },
            missing,
            unknown,
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// A 1 × n matrix for the model
    pub fn to_matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((1, self.values.len()), |(_, j)| self.values[j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["alcohol".to_string(), "pH".to_string(), "density".to_string()]
    }

    #[test]
    fn test_reorders_and_fills() {
        let input = HashMap::from([("density".to_string(), 0.99), ("alcohol".to_string(), 12.5)]);
        let c = FeatureRow::canonicalize(&names(), &input);
        assert_eq!(c.row.values(), &[12.5, 0.0, 0.99]);
        assert_eq!(c.missing, vec!["pH".to_string()]);
        assert!(c.unknown.is_empty());
    }

    #[test]
    fn test_unknown_keys_reported() {
        let input = HashMap::from([
            ("alcohol".to_string(), 10.0),
            ("color".to_string(), 1.0),
            ("age".to_string(), 3.0),
        ]);
        let c = FeatureRow::canonicalize(&names(), &input);
        assert_eq!(c.unknown, vec!["age".to_string(), "color".to_string()]);
        assert_eq!(c.row.to_matrix().dim(), (1, 3));
    }
}
