pub mod api;
pub mod data;
pub mod error;
pub mod fixture;
pub mod manifest;
pub mod models;
pub mod ops;
pub mod rawdata;
pub mod storage;
pub mod telemetry;
pub mod tensor;

pub use api::FixtureService;
pub use data::FixtureRng;
pub use error::{FixtureError, Result};
pub use fixture::{
    verify_dir, FixtureConfig, FixtureReport, FixtureSet, VerificationReport, VerifyOptions,
    BIAS_FILE, INPUT_FILE, OUTPUT_FILE, WEIGHT_FILE,
};
pub use manifest::{FileEntry, FixtureManifest};
pub use models::{Conv2d, Conv2dConfig};
pub use ops::{ConvAlgorithm, Conv2dOptions};
pub use rawdata::{read_raw_f32, write_raw_f32};
pub use tensor::Tensor;
