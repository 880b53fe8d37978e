//! Binary model envelope with format detection and integrity check

use crate::error::{Result, VinoError};
use crate::training::ModelPipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Descriptive fields stored beside the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub created_at: DateTime<Utc>,
    pub crate_version: String,
    pub estimator: String,
    pub n_features: usize,
}

/// Serializable model wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedModel {
    /// Magic bytes for format detection
    pub magic: [u8; 4],
    pub format_version: u32,
    pub metadata: ModelMetadata,
    /// bincode-encoded [`ModelPipeline`]
    pub payload: Vec<u8>,
    /// FNV-1a of the payload
    pub checksum: u64,
}

impl SerializedModel {
    pub const MAGIC: [u8; 4] = *b"VVMD";
    pub const VERSION: u32 = 1;

    pub fn wrap(model: &ModelPipeline) -> Result<Self> {
        let payload = bincode::serialize(model)?;
        let metadata = ModelMetadata {
            created_at: Utc::now(),
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
            estimator: model.kind().map(|k| k.to_string()).unwrap_or_default(),
            n_features: model.n_features_in().unwrap_or(0),
        };
        Ok(Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            checksum: fnv1a(&payload),
            payload,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode an envelope, checking magic, version and checksum
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 || bytes[..4] != Self::MAGIC {
            return Err(VinoError::SerializationError("Not a model artifact (bad magic)".to_string()));
        }
        let envelope: SerializedModel = bincode::deserialize(bytes)?;
        if envelope.format_version != Self::VERSION {
            return Err(VinoError::SerializationError(format!(
                "Unsupported model format version {} (expected {})",
                envelope.format_version,
                Self::VERSION
            )));
        }
        if !envelope.verify_checksum() {
            return Err(VinoError::SerializationError(
                "Checksum verification failed - file may be corrupted".to_string(),
            ));
        }
        Ok(envelope)
    }

    pub fn verify_checksum(&self) -> bool {
        fnv1a(&self.payload) == self.checksum
    }

    pub fn unwrap_model(&self) -> Result<ModelPipeline> {
        Ok(bincode::deserialize(&self.payload)?)
    }
}

fn fnv1a(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 14695981039346656037;
    const FNV_PRIME: u64 = 1099511628211;

    data.iter().fold(FNV_OFFSET, |hash, &byte| (hash ^ byte as u64).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EstimatorKind;
    use crate::training::Estimator;
    use ndarray::{Array1, Array2};

    fn fitted() -> ModelPipeline {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i + j) as f64);
        let y = Array1::from_iter((0..40).map(|i| 5.0 + (i % 3) as f64));
        let mut model = ModelPipeline::for_estimator(EstimatorKind::Classic, 1);
        model.fit(&x, &y).unwrap();
        model
    }

    #[test]
    fn test_fnv1a_known_value() {
        assert_eq!(fnv1a(b""), 14695981039346656037);
        assert_eq!(fnv1a(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn test_envelope_roundtrip() {
        let model = fitted();
        let bytes = SerializedModel::wrap(&model).unwrap().to_bytes().unwrap();
        assert_eq!(&bytes[..4], b"VVMD");

        let envelope = SerializedModel::from_bytes(&bytes).unwrap();
        assert_eq!(envelope.metadata.estimator, "classic");
        assert_eq!(envelope.metadata.n_features, 2);

        let restored = envelope.unwrap_model().unwrap();
        let probe = Array2::from_shape_fn((3, 2), |(i, j)| (i * 7 + j) as f64);
        assert_eq!(model.predict(&probe).unwrap(), restored.predict(&probe).unwrap());
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = SerializedModel::wrap(&fitted()).unwrap().to_bytes().unwrap();
        let last = bytes.len() - 9; // inside the payload, before the checksum
        bytes[last] ^= 0xFF;
        assert!(SerializedModel::from_bytes(&bytes).is_err());

        assert!(matches!(
            SerializedModel::from_bytes(b"JUNKJUNK"),
            Err(VinoError::SerializationError(_))
        ));
    }
}
