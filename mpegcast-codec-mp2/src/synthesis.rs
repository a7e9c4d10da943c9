// mpegcast-codec-mp2
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 32-subband polyphase synthesis filter bank: turns one sample slot (32 dequantized
//! subband samples) into 32 time-domain PCM samples per channel.

use std::sync::OnceLock;

use crate::tables::synthesis_window;

/// `cos_matrix()[i][k] = cos((16 + i) * (2k + 1) * pi / 64)` for `i` in `0..64`, `k` in `0..32`;
/// the analysis-inverting matrix transform at the heart of polyphase synthesis.
fn cos_matrix() -> &'static [[f64; 32]; 64] {
    static MATRIX: OnceLock<[[f64; 32]; 64]> = OnceLock::new();
    MATRIX.get_or_init(|| {
        let mut matrix = [[0.0f64; 32]; 64];
        for (i, row) in matrix.iter_mut().enumerate() {
            for (k, cell) in row.iter_mut().enumerate() {
                let angle =
                    (16.0 + i as f64) * (2.0 * k as f64 + 1.0) * std::f64::consts::PI / 64.0;
                *cell = angle.cos();
            }
        }
        matrix
    })
}

/// The final normalization: takes out the requantizer's 2^16 and the window table's 2^15 fixed
/// point scale, leaving samples in `[-1, 1]`.
const OUTPUT_SCALE: f64 = 2147418112.0;

/// Per-channel synthesis state: a 1024-sample ring of matrixed vectors, rotated by 64 samples
/// every time a new sample slot is synthesized.
pub struct SynthesisBank {
    v: [f64; 1024],
    v_pos: usize,
}

impl SynthesisBank {
    pub fn new() -> Self {
        SynthesisBank { v: [0.0; 1024], v_pos: 0 }
    }

    /// Synthesizes one sample slot (32 dequantized subband samples) into 32 PCM samples,
    /// appending them to `out`.
    pub fn synthesize_part(&mut self, subband_samples: &[f64; 32], out: &mut Vec<f32>) {
        self.v_pos = (self.v_pos + 1024 - 64) % 1024;
        let matrix = cos_matrix();
        for i in 0..64 {
            let mut acc = 0.0;
            for k in 0..32 {
                acc += matrix[i][k] * subband_samples[k];
            }
            self.v[(self.v_pos + i) % 1024] = acc;
        }

        // Gather the window's input vector from the ring: each 128-sample span of V contributes
        // its first and its fourth quarter.
        let mut u = [0.0f64; 512];
        for i in 0..8 {
            for j in 0..32 {
                u[i * 64 + j] = self.v[(self.v_pos + i * 128 + j) % 1024];
                u[i * 64 + 32 + j] = self.v[(self.v_pos + i * 128 + 96 + j) % 1024];
            }
        }

        let window = synthesis_window();
        for j in 0..32 {
            let mut acc = 0.0;
            for i in 0..16 {
                acc += window[j + 32 * i] * u[j + 32 * i];
            }
            out.push((acc / OUTPUT_SCALE) as f32);
        }
    }
}

impl Default for SynthesisBank {
    fn default() -> Self {
        Self::new()
    }
}
