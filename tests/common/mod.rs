#![allow(dead_code)]

use std::path::PathBuf;

use rand::Rng;

pub fn assert_approx_eq(actual: &[f32], expected: &[f32], tol: f32) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Length mismatch: actual={} expected={}",
        actual.len(),
        expected.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (*a - *e).abs() <= tol,
            "Mismatch at index {}: actual={} expected={} with tol={}",
            i,
            a,
            e,
            tol
        );
    }
}

pub fn temp_fixture_dir() -> PathBuf {
    let mut rng = rand::thread_rng();
    let suffix: u64 = rng.gen();
    std::env::temp_dir().join(format!("convfixture_{suffix}"))
}

/// Textbook cross-correlation over signed coordinates, written independently
/// of the crate's kernels.
pub fn reference_conv2d(
    input: &[f32],
    input_shape: [usize; 4],
    weight: &[f32],
    weight_shape: [usize; 4],
    bias: &[f32],
    padding: [usize; 2],
) -> (Vec<f32>, [usize; 4]) {
    let [n, c, h, w] = input_shape;
    let [o, wc, kh, kw] = weight_shape;
    assert_eq!(c, wc);
    let out_h = h + 2 * padding[0] - kh + 1;
    let out_w = w + 2 * padding[1] - kw + 1;
    let mut out = Vec::with_capacity(n * o * out_h * out_w);
    for b in 0..n {
        for oc in 0..o {
            for y in 0..out_h {
                for x in 0..out_w {
                    let mut acc = bias[oc] as f64;
                    for ic in 0..c {
                        for dy in 0..kh {
                            for dx in 0..kw {
                                let iy = (y + dy) as isize - padding[0] as isize;
                                let ix = (x + dx) as isize - padding[1] as isize;
                                if iy < 0 || ix < 0 || iy >= h as isize || ix >= w as isize {
                                    continue;
                                }
                                let v = input[((b * c + ic) * h + iy as usize) * w + ix as usize];
                                let k = weight[((oc * c + ic) * kh + dy) * kw + dx];
                                acc += v as f64 * k as f64;
                            }
                        }
                    }
                    out.push(acc as f32);
                }
            }
        }
    }
    (out, [n, o, out_h, out_w])
}
