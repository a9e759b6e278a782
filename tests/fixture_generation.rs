mod common;

use std::fs;

use convfixture::manifest::{read_manifest, MANIFEST_FILE};
use convfixture::{
    read_raw_f32, FixtureConfig, FixtureService, FixtureSet, BIAS_FILE, INPUT_FILE, OUTPUT_FILE,
    WEIGHT_FILE,
};

use common::{assert_approx_eq, reference_conv2d, temp_fixture_dir};

#[test]
fn default_fixture_has_expected_file_sizes() {
    let dir = temp_fixture_dir();
    let report = FixtureService::new(&dir)
        .generate(FixtureConfig::default())
        .expect("generate should succeed");

    let expected = [
        (WEIGHT_FILE, 13824usize),
        (BIAS_FILE, 48),
        (INPUT_FILE, 3840),
        (OUTPUT_FILE, 1920),
    ];
    assert_eq!(report.files.len(), expected.len());
    for ((name, numel), written) in expected.iter().zip(report.files.iter()) {
        assert_eq!(written.name, *name);
        assert_eq!(written.len_bytes, numel * 4);
        let on_disk = fs::metadata(dir.join(name)).expect("metadata").len();
        assert_eq!(on_disk as usize, numel * 4, "{name}");
    }
    assert!(dir.join(MANIFEST_FILE).exists());

    fs::remove_dir_all(dir).ok();
}

#[test]
fn regenerating_same_seed_is_byte_identical() {
    let first = temp_fixture_dir();
    let second = temp_fixture_dir();
    FixtureService::new(&first)
        .generate(FixtureConfig::default())
        .expect("first generate");
    FixtureService::new(&second)
        .generate(FixtureConfig::default())
        .expect("second generate");

    for name in [WEIGHT_FILE, BIAS_FILE, INPUT_FILE, OUTPUT_FILE, MANIFEST_FILE] {
        let a = fs::read(first.join(name)).expect("read first");
        let b = fs::read(second.join(name)).expect("read second");
        assert_eq!(a, b, "{name} differs between runs");
    }

    fs::remove_dir_all(first).ok();
    fs::remove_dir_all(second).ok();
}

#[test]
fn different_seed_changes_every_file() {
    let a = FixtureSet::build(FixtureConfig::default()).expect("seed 1");
    let b = FixtureSet::build(FixtureConfig {
        seed: 2,
        ..FixtureConfig::default()
    })
    .expect("seed 2");
    for ((name, x), (_, y)) in a.tensors().iter().zip(b.tensors().iter()) {
        assert_ne!(x.data(), y.data(), "{name} did not change with the seed");
    }
}

#[test]
fn output_on_disk_is_cross_correlation_of_inputs_on_disk() {
    let dir = temp_fixture_dir();
    FixtureService::new(&dir)
        .generate(FixtureConfig::default())
        .expect("generate");

    let weight = read_raw_f32(dir.join(WEIGHT_FILE), &[48, 48, 2, 3]).expect("weight");
    let bias = read_raw_f32(dir.join(BIAS_FILE), &[48]).expect("bias");
    let input = read_raw_f32(dir.join(INPUT_FILE), &[1, 48, 2, 40]).expect("input");
    let output = read_raw_f32(dir.join(OUTPUT_FILE), &[1, 48, 1, 40]).expect("output");

    let (expected, shape) = reference_conv2d(
        input.data(),
        [1, 48, 2, 40],
        weight.data(),
        [48, 48, 2, 3],
        bias.data(),
        [0, 1],
    );
    assert_eq!(output.shape(), &shape);
    assert_approx_eq(output.data(), &expected, 1e-6);

    fs::remove_dir_all(dir).ok();
}

#[test]
fn value_ranges_are_plausible() {
    let fixture = FixtureSet::build(FixtureConfig::default()).expect("build");
    let bound = fixture.config().conv.init_bound().expect("bound");

    let (w_min, w_max) = fixture.weight().min_max().expect("weight range");
    assert!(w_min >= -bound && w_max <= bound);
    let (b_min, b_max) = fixture.bias().min_max().expect("bias range");
    assert!(b_min >= -bound && b_max <= bound);

    let (x_min, x_max) = fixture.input().min_max().expect("input range");
    assert!(x_min < 0.0 && x_max > 0.0);
    assert!(x_min > -6.0 && x_max < 6.0, "input range {x_min}..{x_max}");

    let (y_min, y_max) = fixture.output().min_max().expect("output range");
    assert!(y_min < y_max);
    assert!(y_min > -5.0 && y_max < 5.0, "output range {y_min}..{y_max}");
}

#[test]
fn manifest_describes_written_files() {
    let dir = temp_fixture_dir();
    let config = FixtureConfig {
        seed: 9,
        ..FixtureConfig::default()
    };
    FixtureService::new(&dir).generate(config.clone()).expect("generate");

    let manifest = read_manifest(&dir).expect("read").expect("manifest present");
    assert_eq!(manifest.config, config);
    let output = manifest.entry(OUTPUT_FILE).expect("output entry");
    assert_eq!(output.shape, vec![1, 48, 1, 40]);
    assert_eq!(output.len_bytes, 7680);
    let bytes = fs::read(dir.join(OUTPUT_FILE)).expect("read output");
    assert_eq!(output.blake3, blake3::hash(&bytes).to_hex().to_string());

    fs::remove_dir_all(dir).ok();
}

#[test]
fn generate_creates_missing_nested_directory() {
    let dir = temp_fixture_dir().join("nested").join("convdata");
    FixtureService::new(&dir)
        .generate(FixtureConfig::default())
        .expect("generate into nested dir");
    assert!(dir.join(INPUT_FILE).exists());
    if let Some(root) = dir.parent().and_then(|p| p.parent()) {
        fs::remove_dir_all(root).ok();
    }
}

#[test]
fn config_file_overrides_shapes() {
    let dir = temp_fixture_dir();
    fs::create_dir_all(&dir).expect("mkdir");
    let config_path = dir.join("fixture.json");
    fs::write(
        &config_path,
        r#"{
            "seed": 3,
            "batch": 2,
            "input_height": 5,
            "input_width": 5,
            "conv": {"in_channels": 3, "out_channels": 4, "kernel_size": [3, 3], "padding": [1, 1]},
            "algorithm": "im2col"
        }"#,
    )
    .expect("write config");

    let config = FixtureConfig::from_json_file(&config_path).expect("load config");
    assert_eq!(config.output_shape().expect("shape"), [2, 4, 5, 5]);
    let fixture = FixtureSet::build(config).expect("build");
    assert_eq!(fixture.output().shape(), &[2, 4, 5, 5]);

    fs::remove_dir_all(dir).ok();
}

// Digests of the default seed-1 fixture. Any change here means previously
// published fixtures can no longer be regenerated.
const SEED_1_DIGESTS: [(&str, &str); 4] = [
    (
        WEIGHT_FILE,
        "9ffb613c2f3c8ac21d39520ef27dc16f6d56cf04fb88c6784a3f88fe7833c772",
    ),
    (
        BIAS_FILE,
        "9ccea9b4f7936e42ca020d229299b86ebb9e0efbf72c6c2f0f80d63d609aa088",
    ),
    (
        INPUT_FILE,
        "a2f87051b82a15c4e3a9486ae6585025fef3c595a24d3d1786c1a19396a9a970",
    ),
    (
        OUTPUT_FILE,
        "6062ecfdb3d695ae8cfa04897f3e8c24f51b6d33c0d51c34b99351bd9a4a69ee",
    ),
];

#[test]
fn default_fixture_matches_recorded_digests() {
    let manifest = FixtureSet::build(FixtureConfig::default())
        .expect("build")
        .manifest();
    for (name, digest) in SEED_1_DIGESTS {
        let entry = manifest.entry(name).expect("manifest entry");
        assert_eq!(entry.blake3, digest, "{name}");
    }
}
