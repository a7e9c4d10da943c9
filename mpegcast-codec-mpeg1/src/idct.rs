// mpegcast-codec-mpeg1
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 8x8 inverse discrete cosine transform.
//!
//! Implemented as the direct separable formula rather than a fixed-point butterfly network:
//! correctness is easy to check by inspection, and the only contract the surrounding decoder
//! relies on is that output differs from the true inverse transform by no more than the
//! quantization step, which a straightforward float implementation satisfies exactly.

use std::f64::consts::PI;
use std::sync::OnceLock;

const SIZE: usize = 8;

fn cos_table() -> &'static [[f64; SIZE]; SIZE] {
    static TABLE: OnceLock<[[f64; SIZE]; SIZE]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [[0.0; SIZE]; SIZE];
        for (x, row) in table.iter_mut().enumerate() {
            for (u, cell) in row.iter_mut().enumerate() {
                *cell = ((2 * x + 1) as f64 * u as f64 * PI / 16.0).cos();
            }
        }
        table
    })
}

fn c(u: usize) -> f64 {
    if u == 0 {
        std::f64::consts::FRAC_1_SQRT_2
    }
    else {
        1.0
    }
}

/// Runs the inverse transform on a row-major 8x8 block of dequantized coefficients, returning
/// spatial-domain residual/sample values (not yet clamped to 0..255: callers decide whether the
/// result is a full sample (intra) or an additive residual (inter)).
pub fn idct_8x8(coeffs: &[i32; 64]) -> [i32; 64] {
    let cos = cos_table();
    let mut freq = [[0.0f64; SIZE]; SIZE];
    for v in 0..SIZE {
        for u in 0..SIZE {
            freq[v][u] = coeffs[v * SIZE + u] as f64;
        }
    }

    let mut out = [0i32; 64];
    for y in 0..SIZE {
        for x in 0..SIZE {
            let mut sum = 0.0;
            for v in 0..SIZE {
                let cv = c(v);
                for u in 0..SIZE {
                    sum += c(u) * cv * freq[v][u] * cos[x][u] * cos[y][v];
                }
            }
            out[y * SIZE + x] = (sum / 4.0).round() as i32;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_only_block_produces_flat_output() {
        let mut coeffs = [0i32; 64];
        coeffs[0] = 1024; // predictor 128, scaled by 8 per the DC reconstruction rule
        let out = idct_8x8(&coeffs);
        for v in out {
            assert!((v - 128).abs() <= 1, "expected ~128, got {v}");
        }
    }

    #[test]
    fn all_zero_block_is_all_zero() {
        let coeffs = [0i32; 64];
        assert_eq!(idct_8x8(&coeffs), [0i32; 64]);
    }
}
