use serde::{Deserialize, Serialize};

use crate::data::FixtureRng;
use crate::error::{FixtureError, Result};
use crate::ops::{self, ConvAlgorithm, Conv2dOptions};
use crate::tensor::{checked_numel, Tensor};

fn unit_pair() -> [usize; 2] {
    [1, 1]
}

/// Hyperparameters of a 2D convolution layer (groups = 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conv2dConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    /// `[height, width]`
    pub kernel_size: [usize; 2],
    #[serde(default)]
    pub padding: [usize; 2],
    #[serde(default = "unit_pair")]
    pub stride: [usize; 2],
    #[serde(default = "unit_pair")]
    pub dilation: [usize; 2],
}

impl Default for Conv2dConfig {
    fn default() -> Self {
        Self {
            in_channels: 48,
            out_channels: 48,
            kernel_size: [2, 3],
            padding: [0, 1],
            stride: [1, 1],
            dilation: [1, 1],
        }
    }
}

impl Conv2dConfig {
    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 || self.out_channels == 0 {
            return Err(FixtureError::InvalidArgument {
                op: "conv2d_config",
                msg: "in_channels and out_channels must be > 0".to_string(),
            });
        }
        if self.kernel_size.contains(&0) {
            return Err(FixtureError::InvalidArgument {
                op: "conv2d_config",
                msg: format!("kernel_size must be > 0, got {:?}", self.kernel_size),
            });
        }
        if self.stride.contains(&0) || self.dilation.contains(&0) {
            return Err(FixtureError::InvalidArgument {
                op: "conv2d_config",
                msg: format!(
                    "stride and dilation must be > 0, got {:?} / {:?}",
                    self.stride, self.dilation
                ),
            });
        }
        checked_numel(&self.weight_shape(), "conv2d_config")?;
        Ok(())
    }

    pub fn options(&self) -> Conv2dOptions {
        Conv2dOptions {
            padding: self.padding,
            stride: self.stride,
            dilation: self.dilation,
        }
    }

    pub fn weight_shape(&self) -> [usize; 4] {
        [
            self.out_channels,
            self.in_channels,
            self.kernel_size[0],
            self.kernel_size[1],
        ]
    }

    pub fn bias_shape(&self) -> [usize; 1] {
        [self.out_channels]
    }

    pub fn fan_in(&self) -> Result<usize> {
        checked_numel(
            &[self.in_channels, self.kernel_size[0], self.kernel_size[1]],
            "conv2d_config.fan_in",
        )
    }

    /// Kaiming-uniform with `a = sqrt(5)` collapses to `1 / sqrt(fan_in)`,
    /// which is also the bias bound.
    pub fn init_bound(&self) -> Result<f32> {
        Ok((1.0 / (self.fan_in()? as f64).sqrt()) as f32)
    }

    /// `[N, out_channels, H_out, W_out]` for an `[N, in_channels, H, W]` input.
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<[usize; 4]> {
        let [batch, channels, h, w] = <[usize; 4]>::try_from(input_shape).map_err(|_| {
            FixtureError::InvalidArgument {
                op: "conv2d_config.output_shape",
                msg: format!("input must be 4D [N, C, H, W], got {input_shape:?}"),
            }
        })?;
        if channels != self.in_channels {
            return Err(FixtureError::InvalidArgument {
                op: "conv2d_config.output_shape",
                msg: format!(
                    "input has {channels} channels, layer expects {}",
                    self.in_channels
                ),
            });
        }
        let [out_h, out_w] = ops::conv2d_output_dims([h, w], self.kernel_size, &self.options())?;
        Ok([batch, self.out_channels, out_h, out_w])
    }
}

/// 2D convolution layer with a bias term.
#[derive(Debug, Clone)]
pub struct Conv2d {
    config: Conv2dConfig,
    weight: Tensor,
    bias: Tensor,
}

impl Conv2d {
    /// Initialize weight then bias from `rng`, both from `U(-b, b)` with
    /// `b = 1 / sqrt(fan_in)`.
    pub fn new(config: Conv2dConfig, rng: &mut FixtureRng) -> Result<Self> {
        config.validate()?;
        let bound = config.init_bound()?;
        let weight = rng.uniform(&config.weight_shape(), bound)?;
        let bias = rng.uniform(&config.bias_shape(), bound)?;
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    /// Rebuild a layer from stored parameters.
    pub fn from_parts(config: Conv2dConfig, weight: Tensor, bias: Tensor) -> Result<Self> {
        config.validate()?;
        weight.validate_layout("conv2d.from_parts")?;
        bias.validate_layout("conv2d.from_parts")?;
        weight.expect_shape(&config.weight_shape(), "conv2d.from_parts.weight")?;
        bias.expect_shape(&config.bias_shape(), "conv2d.from_parts.bias")?;
        Ok(Self {
            config,
            weight,
            bias,
        })
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.forward_with(input, ConvAlgorithm::Direct)
    }

    pub fn forward_with(&self, input: &Tensor, algorithm: ConvAlgorithm) -> Result<Tensor> {
        self.config.output_shape(input.shape())?;
        ops::try_conv2d(
            input,
            &self.weight,
            Some(&self.bias),
            &self.config.options(),
            algorithm,
        )
    }

    pub fn config(&self) -> &Conv2dConfig {
        &self.config
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }
}
