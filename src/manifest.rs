use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FixtureError, Result};
use crate::fixture::FixtureConfig;
use crate::tensor::Tensor;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

/// Description of one raw dump: enough for a reader to reinterpret the bytes
/// and to notice if they changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub shape: Vec<usize>,
    pub numel: usize,
    pub len_bytes: usize,
    pub blake3: String,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl FileEntry {
    pub fn describe(name: impl Into<String>, tensor: &Tensor) -> Self {
        let bytes = tensor.storage().to_le_bytes();
        let range = tensor.min_max();
        Self {
            name: name.into(),
            shape: tensor.shape().to_vec(),
            numel: tensor.numel(),
            len_bytes: bytes.len(),
            blake3: digest_hex(&bytes),
            min: range.map(|(lo, _)| lo),
            max: range.map(|(_, hi)| hi),
        }
    }
}

/// Sidecar written next to the raw dumps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureManifest {
    pub version: u32,
    pub config: FixtureConfig,
    pub files: Vec<FileEntry>,
}

impl FixtureManifest {
    pub fn entry(&self, name: &str) -> Option<&FileEntry> {
        self.files.iter().find(|entry| entry.name == name)
    }
}

pub fn digest_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

pub fn write_manifest(dir: &Path, manifest: &FixtureManifest) -> Result<PathBuf> {
    let path = dir.join(MANIFEST_FILE);
    let json = serde_json::to_vec_pretty(manifest).map_err(|err| FixtureError::Format {
        op: "write_manifest",
        msg: format!("manifest serialization failed: {err}"),
    })?;
    fs::write(&path, json).map_err(|err| FixtureError::io("write_manifest", &path, err))?;
    Ok(path)
}

/// `Ok(None)` when the directory has no manifest.
pub fn read_manifest(dir: &Path) -> Result<Option<FixtureManifest>> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(|err| FixtureError::io("read_manifest", &path, err))?;
    let manifest: FixtureManifest =
        serde_json::from_slice(&bytes).map_err(|err| FixtureError::Format {
            op: "read_manifest",
            msg: format!("manifest parse failed: {err}"),
        })?;
    if manifest.version != MANIFEST_VERSION {
        return Err(FixtureError::Format {
            op: "read_manifest",
            msg: format!(
                "unsupported manifest version {} (expected {MANIFEST_VERSION})",
                manifest.version
            ),
        });
    }
    Ok(Some(manifest))
}
