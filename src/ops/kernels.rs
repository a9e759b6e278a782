/// Spatial bookkeeping for one NCHW convolution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvGeometry {
    pub batch: usize,
    pub in_channels: usize,
    pub in_h: usize,
    pub in_w: usize,
    pub out_channels: usize,
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub pad_h: usize,
    pub pad_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub dilation_h: usize,
    pub dilation_w: usize,
    pub out_h: usize,
    pub out_w: usize,
}

impl ConvGeometry {
    pub fn patch_len(&self) -> usize {
        self.in_channels * self.kernel_h * self.kernel_w
    }

    pub fn out_plane(&self) -> usize {
        self.out_h * self.out_w
    }

    pub fn in_plane(&self) -> usize {
        self.in_h * self.in_w
    }

    /// Input coordinate hit by output `(oh, ow)` and kernel tap `(kh, kw)`,
    /// `None` when it lands in the zero padding.
    #[inline]
    fn source(&self, oh: usize, ow: usize, kh: usize, kw: usize) -> Option<(usize, usize)> {
        let ih = (oh * self.stride_h + kh * self.dilation_h).checked_sub(self.pad_h)?;
        let iw = (ow * self.stride_w + kw * self.dilation_w).checked_sub(self.pad_w)?;
        if ih < self.in_h && iw < self.in_w {
            Some((ih, iw))
        } else {
            None
        }
    }
}

/// Reference cross-correlation. Accumulates in f64 and rounds once per output.
pub fn conv2d_direct_kernel(
    input: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    geom: &ConvGeometry,
) -> Vec<f32> {
    let mut out = vec![0.0f32; geom.batch * geom.out_channels * geom.out_plane()];
    let kernel_plane = geom.kernel_h * geom.kernel_w;
    for n in 0..geom.batch {
        let in_batch = &input[n * geom.in_channels * geom.in_plane()..];
        for oc in 0..geom.out_channels {
            let w_oc = &weight[oc * geom.patch_len()..(oc + 1) * geom.patch_len()];
            let b = bias.map(|b| b[oc] as f64).unwrap_or(0.0);
            for oh in 0..geom.out_h {
                for ow in 0..geom.out_w {
                    let mut acc = 0.0f64;
                    for ic in 0..geom.in_channels {
                        let plane = &in_batch[ic * geom.in_plane()..(ic + 1) * geom.in_plane()];
                        for kh in 0..geom.kernel_h {
                            for kw in 0..geom.kernel_w {
                                if let Some((ih, iw)) = geom.source(oh, ow, kh, kw) {
                                    let w = w_oc[ic * kernel_plane + kh * geom.kernel_w + kw];
                                    acc += plane[ih * geom.in_w + iw] as f64 * w as f64;
                                }
                            }
                        }
                    }
                    let out_idx = ((n * geom.out_channels + oc) * geom.out_h + oh) * geom.out_w + ow;
                    out[out_idx] = (acc + b) as f32;
                }
            }
        }
    }
    out
}

/// Unfold one batch item into a `[patch_len, out_h * out_w]` column matrix.
pub fn im2col_kernel(input: &[f32], geom: &ConvGeometry) -> Vec<f32> {
    let cols = geom.out_plane();
    let mut out = vec![0.0f32; geom.patch_len() * cols];
    for ic in 0..geom.in_channels {
        let plane = &input[ic * geom.in_plane()..(ic + 1) * geom.in_plane()];
        for kh in 0..geom.kernel_h {
            for kw in 0..geom.kernel_w {
                let row = (ic * geom.kernel_h + kh) * geom.kernel_w + kw;
                for oh in 0..geom.out_h {
                    for ow in 0..geom.out_w {
                        if let Some((ih, iw)) = geom.source(oh, ow, kh, kw) {
                            out[row * cols + oh * geom.out_w + ow] = plane[ih * geom.in_w + iw];
                        }
                    }
                }
            }
        }
    }
    out
}

pub fn matmul_kernel(a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; m * n];
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0;
            for p in 0..k {
                acc += a[i * k + p] * b[p * n + j];
            }
            out[i * n + j] = acc;
        }
    }
    out
}

/// Im2col + GEMM. Weight is already `[out_channels, patch_len]` in row-major order.
pub fn conv2d_im2col_kernel(
    input: &[f32],
    weight: &[f32],
    bias: Option<&[f32]>,
    geom: &ConvGeometry,
) -> Vec<f32> {
    let batch_in = geom.in_channels * geom.in_plane();
    let batch_out = geom.out_channels * geom.out_plane();
    let mut out = Vec::with_capacity(geom.batch * batch_out);
    for n in 0..geom.batch {
        let cols = im2col_kernel(&input[n * batch_in..(n + 1) * batch_in], geom);
        let mut product = matmul_kernel(
            weight,
            &cols,
            geom.out_channels,
            geom.patch_len(),
            geom.out_plane(),
        );
        if let Some(bias) = bias {
            for (oc, row) in product.chunks_exact_mut(geom.out_plane()).enumerate() {
                row.iter_mut().for_each(|v| *v += bias[oc]);
            }
        }
        out.extend_from_slice(&product);
    }
    out
}
