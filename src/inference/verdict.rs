//! Score rounding and verdict banding

use serde::{Deserialize, Serialize};

/// Lowest rounded score rated "Exceptional Vintage"
pub const EXCEPTIONAL_THRESHOLD: f64 = 7.5;

/// Lowest rounded score rated "Fine Table Wine"
pub const FINE_THRESHOLD: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    ExceptionalVintage,
    FineTableWine,
    BelowAverage,
}

impl Verdict {
    /// Band a score that has already been rounded to one decimal
    pub fn from_score(score: f64) -> Self {
        if score >= EXCEPTIONAL_THRESHOLD {
            Verdict::ExceptionalVintage
        } else if score >= FINE_THRESHOLD {
            Verdict::FineTableWine
        } else {
            Verdict::BelowAverage
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::ExceptionalVintage => "Exceptional Vintage",
            Verdict::FineTableWine => "Fine Table Wine",
            Verdict::BelowAverage => "Below Average",
        }
    }

    pub fn advice(&self) -> &'static str {
        match self {
            Verdict::ExceptionalVintage => {
                "This wine shows outstanding complexity and balance. A truly superior choice suitable for aging."
            }
            Verdict::FineTableWine => {
                "A solid, enjoyable wine with good character. Perfect for daily consumption or casual dining."
            }
            Verdict::BelowAverage => {
                "This wine may have noticeable flaws or lacks balance. Might be best used for cooking or sangria."
            }
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Round to one decimal place
pub fn round_score(raw: f64) -> f64 {
    (raw * 10.0).round() / 10.0
}

/// Body of a `/predict` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub score: f64,
    pub verdict: String,
    pub advice: String,
}

impl Prediction {
    pub fn from_raw(raw: f64) -> Self {
        let score = round_score(raw);
        let verdict = Verdict::from_score(score);
        Self {
            score,
            verdict: verdict.label().to_string(),
            advice: verdict.advice().to_string(),
        }
    }
}
