pub mod kernels;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FixtureError, Result};
use crate::tensor::Tensor;
use kernels::{conv2d_direct_kernel, conv2d_im2col_kernel, ConvGeometry};

/// Which kernel computes the convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConvAlgorithm {
    /// Nested-loop reference with f64 accumulation.
    #[default]
    Direct,
    /// Unfold patches into columns, then a single GEMM per batch item.
    Im2col,
}

impl fmt::Display for ConvAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvAlgorithm::Direct => write!(f, "direct"),
            ConvAlgorithm::Im2col => write!(f, "im2col"),
        }
    }
}

impl FromStr for ConvAlgorithm {
    type Err = FixtureError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "direct" => Ok(ConvAlgorithm::Direct),
            "im2col" => Ok(ConvAlgorithm::Im2col),
            other => Err(FixtureError::InvalidArgument {
                op: "conv_algorithm.parse",
                msg: format!("unknown algorithm '{other}' (expected direct|im2col)"),
            }),
        }
    }
}

/// Per-axis `[height, width]` hyperparameters of a 2D convolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conv2dOptions {
    pub padding: [usize; 2],
    pub stride: [usize; 2],
    pub dilation: [usize; 2],
}

impl Default for Conv2dOptions {
    fn default() -> Self {
        Self {
            padding: [0, 0],
            stride: [1, 1],
            dilation: [1, 1],
        }
    }
}

/// Output `[height, width]` for an input plane and kernel size.
pub fn conv2d_output_dims(
    input: [usize; 2],
    kernel: [usize; 2],
    options: &Conv2dOptions,
) -> Result<[usize; 2]> {
    let mut out = [0usize; 2];
    for axis in 0..2 {
        let (stride, dilation) = (options.stride[axis], options.dilation[axis]);
        if stride == 0 || dilation == 0 {
            return Err(FixtureError::InvalidArgument {
                op: "conv2d",
                msg: format!("stride and dilation must be > 0 (got {stride}, {dilation})"),
            });
        }
        if kernel[axis] == 0 {
            return Err(FixtureError::InvalidArgument {
                op: "conv2d",
                msg: "kernel dimensions must be > 0".to_string(),
            });
        }
        let overflow = |what: &str| FixtureError::InvalidArgument {
            op: "conv2d",
            msg: format!("{what} overflows usize on axis {axis}"),
        };
        let padded = options.padding[axis]
            .checked_mul(2)
            .and_then(|pad| pad.checked_add(input[axis]))
            .ok_or_else(|| overflow("padded input"))?;
        let span = dilation
            .checked_mul(kernel[axis] - 1)
            .and_then(|extent| extent.checked_add(1))
            .ok_or_else(|| overflow("dilated kernel extent"))?;
        if span > padded {
            return Err(FixtureError::InvalidArgument {
                op: "conv2d",
                msg: format!(
                    "kernel extent {span} exceeds padded input {padded} on axis {axis}"
                ),
            });
        }
        out[axis] = (padded - span) / stride + 1;
    }
    Ok(out)
}

pub fn conv2d(
    input: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    options: &Conv2dOptions,
) -> Tensor {
    try_conv2d(input, weight, bias, options, ConvAlgorithm::Direct)
        .expect("conv2d: invalid arguments")
}

/// NCHW cross-correlation of `input` `[N, C, H, W]` with `weight` `[O, C, KH, KW]`,
/// plus `bias` `[O]` broadcast over every output position.
pub fn try_conv2d(
    input: &Tensor,
    weight: &Tensor,
    bias: Option<&Tensor>,
    options: &Conv2dOptions,
    algorithm: ConvAlgorithm,
) -> Result<Tensor> {
    input.validate_layout("conv2d")?;
    weight.validate_layout("conv2d")?;
    let geom = conv_geometry(input.shape(), weight.shape(), options)?;
    let bias = match bias {
        Some(bias) => {
            bias.validate_layout("conv2d")?;
            bias.expect_shape(&[geom.out_channels], "conv2d.bias")?;
            Some(bias.data())
        }
        None => None,
    };

    let out = match algorithm {
        ConvAlgorithm::Direct => conv2d_direct_kernel(input.data(), weight.data(), bias, &geom),
        ConvAlgorithm::Im2col => conv2d_im2col_kernel(input.data(), weight.data(), bias, &geom),
    };
    Tensor::try_from_vec_f32(out, &[geom.batch, geom.out_channels, geom.out_h, geom.out_w])
}

fn conv_geometry(
    input: &[usize],
    weight: &[usize],
    options: &Conv2dOptions,
) -> Result<ConvGeometry> {
    let [batch, in_channels, in_h, in_w] = <[usize; 4]>::try_from(input).map_err(|_| {
        FixtureError::InvalidArgument {
            op: "conv2d",
            msg: format!("input must be 4D [N, C, H, W], got {input:?}"),
        }
    })?;
    let [out_channels, weight_in, kernel_h, kernel_w] = <[usize; 4]>::try_from(weight)
        .map_err(|_| FixtureError::InvalidArgument {
            op: "conv2d",
            msg: format!("weight must be 4D [O, C, KH, KW], got {weight:?}"),
        })?;
    if weight_in != in_channels {
        return Err(FixtureError::InvalidArgument {
            op: "conv2d",
            msg: format!("input has {in_channels} channels but weight expects {weight_in}"),
        });
    }
    let [out_h, out_w] = conv2d_output_dims([in_h, in_w], [kernel_h, kernel_w], options)?;
    Ok(ConvGeometry {
        batch,
        in_channels,
        in_h,
        in_w,
        out_channels,
        kernel_h,
        kernel_w,
        pad_h: options.padding[0],
        pad_w: options.padding[1],
        stride_h: options.stride[0],
        stride_w: options.stride[1],
        dilation_h: options.dilation[0],
        dilation_w: options.dilation[1],
        out_h,
        out_w,
    })
}

pub fn min_max(values: &[f32]) -> Option<(f32, f32)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
    )
}

/// Largest `|a[i] - b[i]|`. A NaN on either side makes the result NaN.
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(FixtureError::ShapeMismatch {
            op: "max_abs_diff",
            expected: vec![a.len()],
            actual: vec![b.len()],
        });
    }
    let mut diff = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = (x - y).abs();
        if d.is_nan() {
            return Ok(f32::NAN);
        }
        diff = diff.max(d);
    }
    Ok(diff)
}
