//! Model artifact persistence.
//!
//! One artifact is a single file: a header line carrying the format marker,
//! the format version, and a SHA-256 checksum of the payload, followed by a
//! JSON payload of the fitted model (schema plus ordered fitted steps). The
//! artifact is self-describing; loading needs no access to the original
//! pipeline spec.
//!
//! Writes go to a temporary sibling file that is flushed and atomically
//! renamed into place, so a reader never observes a partially written
//! artifact.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use log::{debug, info};
use sha2::{Digest, Sha256};

use crate::error::{PipelineError, Result};
use crate::pipeline::FittedModel;

const FORMAT_MARKER: &str = "itemcat-model";
/// Newest artifact format version this build can read.
pub const FORMAT_VERSION: u32 = 1;

/// Saves and loads fitted models.
pub struct ModelStore;

impl ModelStore {
    /// Default directory for model artifacts.
    pub fn default_models_dir() -> std::path::PathBuf {
        // 1. Check environment variable
        if let Ok(path) = std::env::var("ITEMCAT_CACHE") {
            return std::path::PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("itemcat").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("itemcat").join("models");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        std::env::temp_dir().join("itemcat").join("models")
    }

    /// Serializes `model` to `dest` atomically.
    pub fn save(model: &FittedModel, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let payload = serde_json::to_vec(model)?;
        let checksum = hex_digest(&payload);
        let header = format!("{FORMAT_MARKER} v{FORMAT_VERSION} sha256:{checksum}\n");

        let tmp = dest.with_extension("tmp");
        let result = (|| -> Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(header.as_bytes())?;
            file.write_all(&payload)?;
            file.flush()?;
            file.sync_all()?;
            fs::rename(&tmp, dest)?;
            Ok(())
        })();
        if result.is_err() {
            // Never leave a partial artifact behind.
            let _ = fs::remove_file(&tmp);
        }
        result?;

        info!(
            "Saved model artifact to {} ({} payload bytes)",
            dest.display(),
            payload.len()
        );
        Ok(())
    }

    /// Loads a fitted model from `src`, verifying marker, version, and
    /// checksum before deserializing.
    pub fn load(src: impl AsRef<Path>) -> Result<FittedModel> {
        let src = src.as_ref();
        let bytes = fs::read(src)?;

        let split = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| PipelineError::ArtifactCorrupt("missing header line".to_string()))?;
        let header = std::str::from_utf8(&bytes[..split])
            .map_err(|_| PipelineError::ArtifactCorrupt("header is not UTF-8".to_string()))?;
        let payload = &bytes[split + 1..];

        let mut parts = header.split_whitespace();
        let marker = parts.next().unwrap_or_default();
        if marker != FORMAT_MARKER {
            return Err(PipelineError::ArtifactCorrupt(format!(
                "unrecognized format marker '{marker}'"
            )));
        }
        let version: u32 = parts
            .next()
            .and_then(|v| v.strip_prefix('v'))
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| PipelineError::ArtifactCorrupt("unreadable version".to_string()))?;
        if version > FORMAT_VERSION {
            return Err(PipelineError::ArtifactVersion {
                found: version,
                supported: FORMAT_VERSION,
            });
        }
        let expected = parts
            .next()
            .and_then(|c| c.strip_prefix("sha256:"))
            .ok_or_else(|| PipelineError::ArtifactCorrupt("missing checksum".to_string()))?;

        let actual = hex_digest(payload);
        if actual != expected {
            return Err(PipelineError::ArtifactCorrupt(format!(
                "checksum mismatch: expected {expected}, got {actual}"
            )));
        }
        debug!("Verified artifact {} (v{version})", src.display());

        let model: FittedModel = serde_json::from_slice(payload)
            .map_err(|e| PipelineError::ArtifactCorrupt(format!("unreadable payload: {e}")))?;
        Ok(model)
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetReader;
    use crate::pipeline::{PipelineExecutor, PipelineSpec, TrainerStrategy};
    use crate::schema::item_schema;
    use std::io::Write as _;

    fn fitted_model() -> FittedModel {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1001\tSony Blu-Ray Player\tBlu-Ray player from Sony black").unwrap();
        writeln!(file, "2002\tCotton T-Shirt\tPlain white cotton t-shirt").unwrap();
        let reader = DatasetReader::open(file.path(), item_schema()).unwrap();
        let spec = PipelineSpec::for_schema(&item_schema(), TrainerStrategy::default());
        PipelineExecutor::fit(&spec, &reader).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let model = fitted_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        ModelStore::save(&model, &path).unwrap();
        let loaded = ModelStore::load(&path).unwrap();
        assert_eq!(model, loaded);
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let model = fitted_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        ModelStore::save(&model, &path).unwrap();
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_artifact_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        fs::write(&path, b"corrupted data").unwrap();
        let err = ModelStore::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactCorrupt(_)));
    }

    #[test]
    fn test_tampered_payload_fails_checksum() {
        let model = fitted_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        ModelStore::save(&model, &path).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, &bytes).unwrap();

        let err = ModelStore::load(&path).unwrap_err();
        assert!(matches!(err, PipelineError::ArtifactCorrupt(_)));
    }

    #[test]
    fn test_future_version_rejected() {
        let model = fitted_model();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        ModelStore::save(&model, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let bumped = contents.replacen("v1", "v2", 1);
        fs::write(&path, bumped).unwrap();

        let err = ModelStore::load(&path).unwrap_err();
        match err {
            PipelineError::ArtifactVersion { found, supported } => {
                assert_eq!(found, 2);
                assert_eq!(supported, FORMAT_VERSION);
            }
            other => panic!("expected ArtifactVersion, got {other:?}"),
        }
    }
}
