use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::data::FixtureRng;
use crate::error::{FixtureError, Result};
use crate::manifest::{
    digest_hex, read_manifest, write_manifest, FileEntry, FixtureManifest, MANIFEST_FILE,
    MANIFEST_VERSION,
};
use crate::models::{Conv2d, Conv2dConfig};
use crate::ops::{self, ConvAlgorithm};
use crate::rawdata::{read_raw_f32, write_raw_f32};
use crate::tensor::{checked_numel, Tensor};

pub const WEIGHT_FILE: &str = "weight.data";
pub const BIAS_FILE: &str = "bias.data";
pub const INPUT_FILE: &str = "input.data";
pub const OUTPUT_FILE: &str = "output.data";

fn default_seed() -> u64 {
    1
}

/// Everything that determines the bytes of a fixture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    pub batch: usize,
    pub input_height: usize,
    pub input_width: usize,
    pub conv: Conv2dConfig,
    #[serde(default)]
    pub algorithm: ConvAlgorithm,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            batch: 1,
            input_height: 2,
            input_width: 40,
            conv: Conv2dConfig::default(),
            algorithm: ConvAlgorithm::Direct,
        }
    }
}

impl FixtureConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|err| FixtureError::io("fixture_config.load", path, err))?;
        let config: Self = serde_json::from_slice(&bytes).map_err(|err| FixtureError::Format {
            op: "fixture_config.load",
            msg: format!("{}: {err}", path.display()),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch == 0 || self.input_height == 0 || self.input_width == 0 {
            return Err(FixtureError::InvalidArgument {
                op: "fixture_config",
                msg: "batch, input_height and input_width must be > 0".to_string(),
            });
        }
        self.conv.validate()?;
        checked_numel(&self.input_shape(), "fixture_config")?;
        checked_numel(&self.output_shape()?, "fixture_config")?;
        Ok(())
    }

    pub fn input_shape(&self) -> [usize; 4] {
        [
            self.batch,
            self.conv.in_channels,
            self.input_height,
            self.input_width,
        ]
    }

    pub fn output_shape(&self) -> Result<[usize; 4]> {
        self.conv.output_shape(&self.input_shape())
    }

    /// File name and expected shape of each dump, in write order.
    pub fn file_shapes(&self) -> Result<[(&'static str, Vec<usize>); 4]> {
        Ok([
            (WEIGHT_FILE, self.conv.weight_shape().to_vec()),
            (BIAS_FILE, self.conv.bias_shape().to_vec()),
            (INPUT_FILE, self.input_shape().to_vec()),
            (OUTPUT_FILE, self.output_shape()?.to_vec()),
        ])
    }
}

/// The four tensors of one fixture plus the config that produced them.
#[derive(Debug, Clone)]
pub struct FixtureSet {
    config: FixtureConfig,
    weight: Tensor,
    bias: Tensor,
    input: Tensor,
    output: Tensor,
}

#[derive(Debug, Clone, Serialize)]
pub struct WrittenFile {
    pub name: String,
    pub path: PathBuf,
    pub len_bytes: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FixtureReport {
    pub dir: PathBuf,
    pub files: Vec<WrittenFile>,
    pub manifest_path: PathBuf,
    pub input_range: Option<(f32, f32)>,
    pub output_range: Option<(f32, f32)>,
}

impl FixtureSet {
    /// Seed, initialize the layer, draw the input and run the forward pass.
    ///
    /// Random draws happen in a fixed order: weight, bias, input.
    pub fn build(config: FixtureConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = FixtureRng::seed_from_u64(config.seed);
        let layer = Conv2d::new(config.conv, &mut rng)?;
        let input = rng.randn(&config.input_shape())?;
        let output = layer.forward_with(&input, config.algorithm)?;
        debug!(
            "built fixture seed={} input={:?} output={:?}",
            config.seed,
            input.shape(),
            output.shape()
        );
        Ok(Self {
            weight: layer.weight().clone(),
            bias: layer.bias().clone(),
            config,
            input,
            output,
        })
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    pub fn input(&self) -> &Tensor {
        &self.input
    }

    pub fn output(&self) -> &Tensor {
        &self.output
    }

    pub fn tensors(&self) -> [(&'static str, &Tensor); 4] {
        [
            (WEIGHT_FILE, &self.weight),
            (BIAS_FILE, &self.bias),
            (INPUT_FILE, &self.input),
            (OUTPUT_FILE, &self.output),
        ]
    }

    pub fn manifest(&self) -> FixtureManifest {
        FixtureManifest {
            version: MANIFEST_VERSION,
            config: self.config.clone(),
            files: self
                .tensors()
                .iter()
                .map(|(name, tensor)| FileEntry::describe(*name, tensor))
                .collect(),
        }
    }

    /// Dump every tensor into `dir` (created if missing) and write the manifest.
    pub fn write<P: AsRef<Path>>(&self, dir: P) -> Result<FixtureReport> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|err| FixtureError::io("fixture.write", dir, err))?;
        let mut files = Vec::with_capacity(4);
        for (name, tensor) in self.tensors() {
            let path = dir.join(name);
            let len_bytes = write_raw_f32(&path, tensor)?;
            debug!("wrote {} ({len_bytes} bytes)", path.display());
            files.push(WrittenFile {
                name: name.to_string(),
                path,
                len_bytes,
            });
        }
        let manifest_path = write_manifest(dir, &self.manifest())?;
        info!("fixture written to {}", dir.display());
        Ok(FixtureReport {
            dir: dir.to_path_buf(),
            files,
            manifest_path,
            input_range: self.input.min_max(),
            output_range: self.output.min_max(),
        })
    }
}

/// Knobs for [`verify_dir`].
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    pub tolerance: f32,
    pub algorithm: ConvAlgorithm,
    /// Check digests and regenerate from the manifest when one is present.
    pub use_manifest: bool,
    /// Shape contract used when no manifest is read. A manifest's own config
    /// takes precedence; `None` means [`FixtureConfig::default`].
    pub config: Option<FixtureConfig>,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            algorithm: ConvAlgorithm::Direct,
            use_manifest: true,
            config: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub dir: PathBuf,
    pub algorithm: ConvAlgorithm,
    pub reference_range: Option<(f32, f32)>,
    pub max_abs_diff: f32,
    pub digests_checked: usize,
    pub regenerated: bool,
}

/// Read a fixture directory back, recompute the output and compare.
pub fn verify_dir<P: AsRef<Path>>(dir: P, options: &VerifyOptions) -> Result<VerificationReport> {
    let dir = dir.as_ref();
    if !options.tolerance.is_finite() || options.tolerance < 0.0 {
        return Err(FixtureError::InvalidArgument {
            op: "verify",
            msg: format!("tolerance must be finite and >= 0, got {}", options.tolerance),
        });
    }
    let manifest = if options.use_manifest {
        read_manifest(dir)?
    } else {
        None
    };
    let config = match (&manifest, &options.config) {
        (Some(manifest), Some(requested)) => {
            if *requested != manifest.config {
                warn!(
                    "{}: ignoring requested config, {MANIFEST_FILE} takes precedence",
                    dir.display()
                );
            }
            manifest.config.clone()
        }
        (Some(manifest), None) => manifest.config.clone(),
        (None, requested) => requested.clone().unwrap_or_default(),
    };
    config.validate()?;

    let [weight, bias, input, output] = config
        .file_shapes()?
        .map(|(name, shape)| read_raw_f32(dir.join(name), &shape));
    let (weight, bias, input, output) = (weight?, bias?, input?, output?);

    let layer = Conv2d::from_parts(config.conv, weight.clone(), bias.clone())?;
    let recomputed = layer.forward_with(&input, options.algorithm)?;
    let max_abs_diff = ops::max_abs_diff(recomputed.data(), output.data())?;
    let reference_range = output.min_max();
    info!(
        "{}: range {:?}, max abs diff {max_abs_diff} ({})",
        dir.display(),
        reference_range,
        options.algorithm
    );
    // NaN fails this comparison as well.
    if !(max_abs_diff <= options.tolerance) {
        return Err(FixtureError::Verification {
            op: "verify",
            msg: format!(
                "max abs diff {max_abs_diff} exceeds tolerance {}",
                options.tolerance
            ),
        });
    }

    let mut digests_checked = 0;
    let mut regenerated = false;
    if let Some(manifest) = manifest {
        let loaded = [
            (WEIGHT_FILE, &weight),
            (BIAS_FILE, &bias),
            (INPUT_FILE, &input),
            (OUTPUT_FILE, &output),
        ];
        for (name, tensor) in loaded {
            let entry = manifest.entry(name).ok_or_else(|| FixtureError::Verification {
                op: "verify",
                msg: format!("manifest has no entry for {name}"),
            })?;
            let digest = digest_hex(&tensor.storage().to_le_bytes());
            if digest != entry.blake3 {
                return Err(FixtureError::Verification {
                    op: "verify",
                    msg: format!("{name} digest {digest} does not match manifest {}", entry.blake3),
                });
            }
            digests_checked += 1;
        }

        let rebuilt = FixtureSet::build(config)?.manifest();
        for entry in &rebuilt.files {
            let recorded = manifest.entry(&entry.name).map(|e| e.blake3.as_str());
            if recorded != Some(entry.blake3.as_str()) {
                return Err(FixtureError::Verification {
                    op: "verify",
                    msg: format!(
                        "regenerating seed {} does not reproduce {}",
                        rebuilt.config.seed, entry.name
                    ),
                });
            }
        }
        regenerated = true;
    }

    Ok(VerificationReport {
        dir: dir.to_path_buf(),
        algorithm: options.algorithm,
        reference_range,
        max_abs_diff,
        digests_checked,
        regenerated,
    })
}
