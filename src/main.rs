use std::env;

use convfixture::telemetry::{Telemetry, TELEMETRY_ENV};
use convfixture::{
    ConvAlgorithm, FixtureConfig, FixtureError, FixtureService, Result, VerifyOptions,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() == 1 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "generate" => run_generate(&args[2..]),
        "verify" => run_verify(&args[2..]),
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        command => Err(FixtureError::InvalidArgument {
            op: "cli",
            msg: format!("unknown command {command}"),
        }),
    }
}

fn run_generate(args: &[String]) -> Result<()> {
    let parser = ArgParser::new(args);
    let out_dir = parser
        .get("out-dir")?
        .unwrap_or_else(|| "convdata".to_string());
    let mut config = match parser.get("config")? {
        Some(path) => FixtureConfig::from_json_file(path)?,
        None => FixtureConfig::default(),
    };
    if let Some(seed) = parser.get_u64("seed")? {
        config.seed = seed;
    }
    if let Some(algorithm) = parser.get("algorithm")? {
        config.algorithm = algorithm.parse::<ConvAlgorithm>()?;
    }

    let service = FixtureService::new(&out_dir).with_telemetry(init_telemetry());
    let report = service.generate(config)?;
    print_range("input", report.input_range);
    print_range("output", report.output_range);
    for file in &report.files {
        println!("{} ({} bytes)", file.path.display(), file.len_bytes);
    }
    println!("{}", report.manifest_path.display());
    Ok(())
}

fn run_verify(args: &[String]) -> Result<()> {
    let parser = ArgParser::new(args);
    let data_dir = parser
        .get("data-dir")?
        .unwrap_or_else(|| "convdata".to_string());
    let mut options = VerifyOptions::default();
    if let Some(tolerance) = parser.get_f32("tolerance")? {
        options.tolerance = tolerance;
    }
    if let Some(algorithm) = parser.get("algorithm")? {
        options.algorithm = algorithm.parse::<ConvAlgorithm>()?;
    }
    if parser.has_flag("no-manifest") {
        options.use_manifest = false;
    }
    if let Some(path) = parser.get("config")? {
        options.config = Some(FixtureConfig::from_json_file(path)?);
    }

    let service = FixtureService::new(&data_dir).with_telemetry(init_telemetry());
    let report = service.verify(&options)?;
    print_range("range", report.reference_range);
    println!("max abs diff: {} ({})", report.max_abs_diff, report.algorithm);
    if report.regenerated {
        println!(
            "manifest: {} digests match, regeneration is byte-identical",
            report.digests_checked
        );
    }
    Ok(())
}

fn print_range(label: &str, range: Option<(f32, f32)>) {
    match range {
        Some((min, max)) => println!("{label}: {min}, {max}"),
        None => println!("{label}: empty"),
    }
}

fn init_telemetry() -> Telemetry {
    match Telemetry::from_env(TELEMETRY_ENV) {
        Ok(telemetry) => telemetry,
        Err(err) => {
            eprintln!("telemetry disabled: {err:?}");
            Telemetry::disabled()
        }
    }
}

fn print_usage() {
    println!(
        "convfixture\n\nUSAGE:\n  convfixture generate [options]\n  convfixture verify [options]\n\nOPTIONS (generate):\n  --out-dir <path>         Fixture directory (default: convdata)\n  --seed <n>               RNG seed (default: 1)\n  --config <path>          JSON fixture config (default: 48->48 conv, kernel 2x3, padding 0x1, input 1x48x2x40)\n  --algorithm <name>       Kernel for the reference output: direct|im2col (default: direct)\n\nOPTIONS (verify):\n  --data-dir <path>        Fixture directory (default: convdata)\n  --tolerance <f>          Max allowed abs diff (default: 1e-4)\n  --algorithm <name>       Kernel used to recompute the output: direct|im2col (default: direct)\n  --config <path>          Shape contract when no manifest is used (manifest.json wins when present)\n  --no-manifest            Skip digest and regeneration checks\n\nENVIRONMENT:\n  {TELEMETRY_ENV}=<path>  Append JSONL stage timings to path (created if missing)\n  -h, --help               Print this help text\n"
    );
}

struct ArgParser {
    args: Vec<String>,
}

impl ArgParser {
    fn new(args: &[String]) -> Self {
        Self {
            args: args.to_vec(),
        }
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let flag = format!("--{key}");
        match self.args.iter().position(|value| value == &flag) {
            Some(idx) => match self.args.get(idx + 1) {
                Some(value) if !value.starts_with("--") => Ok(Some(value.clone())),
                _ => Err(FixtureError::InvalidArgument {
                    op: "cli",
                    msg: format!("{flag} expects a value"),
                }),
            },
            None => Ok(None),
        }
    }

    fn has_flag(&self, key: &str) -> bool {
        let flag = format!("--{key}");
        self.args.iter().any(|value| value == &flag)
    }

    fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        match self.get(key)? {
            Some(value) => value
                .parse::<u64>()
                .map(Some)
                .map_err(|_| FixtureError::InvalidArgument {
                    op: "cli",
                    msg: format!("--{key} expects u64, got '{value}'"),
                }),
            None => Ok(None),
        }
    }

    fn get_f32(&self, key: &str) -> Result<Option<f32>> {
        match self.get(key)? {
            Some(value) => value
                .parse::<f32>()
                .map(Some)
                .map_err(|_| FixtureError::InvalidArgument {
                    op: "cli",
                    msg: format!("--{key} expects f32, got '{value}'"),
                }),
            None => Ok(None),
        }
    }
}
