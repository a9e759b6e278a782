use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::fixture::{
    verify_dir, FixtureConfig, FixtureReport, FixtureSet, VerificationReport, VerifyOptions,
};
use crate::telemetry::Telemetry;

/// Entry point for generating and checking a fixture directory.
#[derive(Debug)]
pub struct FixtureService {
    root: PathBuf,
    telemetry: Telemetry,
}

impl FixtureService {
    /// Service rooted at the fixture directory `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            telemetry: Telemetry::disabled(),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Build the fixture in memory, then write the raw dumps and manifest.
    pub fn generate(&self, config: FixtureConfig) -> Result<FixtureReport> {
        let tags = [
            ("seed", config.seed.to_string()),
            ("algorithm", config.algorithm.to_string()),
        ];
        let fixture = self
            .telemetry
            .time("fixture.build", &tags, || FixtureSet::build(config))?;
        self.telemetry
            .time("fixture.write", &tags, || fixture.write(&self.root))
    }

    pub fn verify(&self, options: &VerifyOptions) -> Result<VerificationReport> {
        let tags = [("algorithm", options.algorithm.to_string())];
        self.telemetry
            .time("fixture.verify", &tags, || verify_dir(&self.root, options))
    }
}
