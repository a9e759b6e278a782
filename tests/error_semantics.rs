use convfixture::ops::{self, ConvAlgorithm, Conv2dOptions};
use convfixture::{Conv2dConfig, FixtureConfig, FixtureError, Tensor};

fn conv(
    input: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    options: &Conv2dOptions,
) -> FixtureError {
    ops::try_conv2d(input, weight, bias, options, ConvAlgorithm::Direct).unwrap_err()
}

#[test]
fn conv2d_rejects_non_4d_input() {
    let input = Tensor::zeros(&[48, 2, 40]);
    let weight = Tensor::zeros(&[48, 48, 2, 3]);
    let err = conv(&input, &weight, None, &Conv2dOptions::default());
    assert!(matches!(err, FixtureError::InvalidArgument { .. }));
}

#[test]
fn conv2d_rejects_channel_mismatch() {
    let input = Tensor::zeros(&[1, 4, 3, 3]);
    let weight = Tensor::zeros(&[2, 3, 1, 1]);
    let err = conv(&input, &weight, None, &Conv2dOptions::default());
    assert!(matches!(err, FixtureError::InvalidArgument { .. }));
}

#[test]
fn conv2d_rejects_wrong_bias_length() {
    let input = Tensor::zeros(&[1, 1, 3, 3]);
    let weight = Tensor::zeros(&[2, 1, 1, 1]);
    let bias = Tensor::zeros(&[3]);
    let err = conv(&input, &weight, Some(&bias), &Conv2dOptions::default());
    assert!(matches!(err, FixtureError::ShapeMismatch { .. }));
}

#[test]
fn conv2d_rejects_zero_stride() {
    let input = Tensor::zeros(&[1, 1, 3, 3]);
    let weight = Tensor::zeros(&[1, 1, 1, 1]);
    let options = Conv2dOptions {
        stride: [1, 0],
        ..Conv2dOptions::default()
    };
    let err = conv(&input, &weight, None, &options);
    assert!(matches!(err, FixtureError::InvalidArgument { .. }));
}

#[test]
fn conv2d_rejects_kernel_larger_than_padded_input() {
    let input = Tensor::zeros(&[1, 1, 2, 2]);
    let weight = Tensor::zeros(&[1, 1, 3, 3]);
    let err = conv(&input, &weight, None, &Conv2dOptions::default());
    assert!(matches!(err, FixtureError::InvalidArgument { .. }));
}

#[test]
fn fixture_config_rejects_zero_channels() {
    let config = FixtureConfig {
        conv: Conv2dConfig {
            in_channels: 0,
            ..Conv2dConfig::default()
        },
        ..FixtureConfig::default()
    };
    assert!(matches!(
        config.validate().unwrap_err(),
        FixtureError::InvalidArgument { .. }
    ));
}

#[test]
fn unknown_algorithm_name_is_rejected() {
    let err = "winograd".parse::<ConvAlgorithm>().unwrap_err();
    assert!(matches!(err, FixtureError::InvalidArgument { .. }));
    assert_eq!("IM2COL".parse::<ConvAlgorithm>().expect("parse"), ConvAlgorithm::Im2col);
}

#[test]
fn output_dims_report_overflowing_padding() {
    let options = Conv2dOptions {
        padding: [0, usize::MAX / 2 + 1],
        ..Conv2dOptions::default()
    };
    let err = ops::conv2d_output_dims([2, 40], [2, 3], &options).unwrap_err();
    match err {
        FixtureError::InvalidArgument { op, msg } => {
            assert_eq!(op, "conv2d");
            assert!(msg.contains("overflows"), "{msg}");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn fixture_config_reports_overflowing_dilation() {
    let json = r#"{
        "batch": 1,
        "input_height": 2,
        "input_width": 40,
        "conv": {
            "in_channels": 48,
            "out_channels": 48,
            "kernel_size": [2, 3],
            "padding": [0, 1],
            "dilation": [1, 9223372036854775808]
        }
    }"#;
    let config: FixtureConfig = serde_json::from_str(json).expect("parse");
    assert!(matches!(
        config.validate().unwrap_err(),
        FixtureError::InvalidArgument { .. }
    ));
}

#[test]
fn conv2d_config_reports_overflowing_fan_in() {
    let config = Conv2dConfig {
        in_channels: usize::MAX / 2,
        kernel_size: [2, 3],
        ..Conv2dConfig::default()
    };
    assert!(matches!(
        config.fan_in().unwrap_err(),
        FixtureError::InvalidArgument { .. }
    ));
    assert!(config.validate().is_err());
}
