// mpegcast-codec-mp2
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Constant tables for MPEG-1 Audio Layer II: bit rates, sample rates, the quantizer-selection
//! lookups of ISO/IEC 11172-3 Tables 3-B.2a-d, scale-factor bases, and the synthesis window.

use std::sync::OnceLock;

pub const SYNC_WORD: u32 = 0x7FF;
pub const LAYER_II: u32 = 0b10;

/// kbps for bitrate index 1..=14; index 0 and 15 are reserved/free and rejected by the header
/// parser before this table is consulted.
pub const BIT_RATES_KBPS: [u32; 15] =
    [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];

pub const SAMPLE_RATES_MPEG1: [u32; 3] = [44100, 48000, 32000];
pub const SAMPLE_RATES_MPEG2_LSR: [u32; 3] = [22050, 24000, 16000];

pub const SUBBANDS: usize = 32;
pub const GRANULES: usize = 4;
pub const PARTS: usize = 3;
pub const SAMPLES_PER_FRAME: usize = SUBBANDS * GRANULES * PARTS;

/// One of the 17 quantizer classes of ISO/IEC 11172-3 Table 3-B.4.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QuantizerSpec {
    pub levels: u32,
    /// Three samples share one codeword, decomposed base-`levels`.
    pub grouped: bool,
    /// Codeword width in bits: per group when `grouped`, per sample otherwise.
    pub bits: u32,
}

const fn q(levels: u32, grouped: bool, bits: u32) -> QuantizerSpec {
    QuantizerSpec { levels, grouped, bits }
}

pub const QUANT_CLASSES: [QuantizerSpec; 17] = [
    q(3, true, 5),
    q(5, true, 7),
    q(7, false, 3),
    q(9, true, 10),
    q(15, false, 4),
    q(31, false, 5),
    q(63, false, 6),
    q(127, false, 7),
    q(255, false, 8),
    q(511, false, 9),
    q(1023, false, 10),
    q(2047, false, 11),
    q(4095, false, 12),
    q(8191, false, 13),
    q(16383, false, 14),
    q(32767, false, 15),
    q(65535, false, 16),
];

/// Quantizer lookup, step 1: per-channel bitrate class, indexed by `[mono? 0 : 1]` and
/// `bitrate_index - 1`.
pub const QUANT_LUT_STEP_1: [[u8; 14]; 2] = [
    // 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384 kbps
    [0, 0, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2],
    // halved per channel for two-channel modes
    [0, 0, 0, 0, 0, 0, 1, 1, 1, 2, 2, 2, 2, 2],
];

/// Packed table selectors: low 6 bits = subband limit, bit 6 selects the high-rate row of
/// [`QUANT_LUT_STEP_3`].
pub const QUANT_TAB_A: u8 = 27 | 64;
pub const QUANT_TAB_B: u8 = 30 | 64;
pub const QUANT_TAB_C: u8 = 8;
pub const QUANT_TAB_D: u8 = 12;

/// Quantizer lookup, step 2: indexed by the step-1 class and the sample-rate index.
pub const QUANT_LUT_STEP_2: [[u8; 3]; 3] = [
    //  44.1 kHz      48 kHz        32 kHz
    [QUANT_TAB_C, QUANT_TAB_C, QUANT_TAB_D], // 32 - 48 kbps per channel
    [QUANT_TAB_A, QUANT_TAB_A, QUANT_TAB_A], // 56 - 80 kbps per channel
    [QUANT_TAB_B, QUANT_TAB_A, QUANT_TAB_B], // 96+ kbps per channel
];

/// Quantizer lookup, step 3: per-subband allocation descriptors. High nibble = allocation code
/// width in bits, low nibble = row of [`QUANT_LUT_STEP_4`].
pub const QUANT_LUT_STEP_3: [&[u8]; 3] = [
    // Low rates (Tables 3-B.2c and 3-B.2d)
    &[
        0x44, 0x44, //
        0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34,
    ],
    // High rates (Tables 3-B.2a and 3-B.2b)
    &[
        0x43, 0x43, 0x43, //
        0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, 0x42, //
        0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, 0x31, //
        0x20, 0x20, 0x20, 0x20, 0x20, 0x20, 0x20,
    ],
    // MPEG-2 low sample rates (ISO/IEC 13818-3 Table B.1)
    &[
        0x45, 0x45, 0x45, 0x45, //
        0x34, 0x34, 0x34, 0x34, 0x34, 0x34, 0x34, //
        0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24, //
        0x24, 0x24, 0x24, 0x24, 0x24, 0x24, 0x24,
    ],
];

/// Quantizer lookup, step 4: allocation code to 1-based index into [`QUANT_CLASSES`];
/// 0 means the subband carries no samples.
pub const QUANT_LUT_STEP_4: [[u8; 16]; 6] = [
    [0, 1, 2, 17, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 1, 2, 3, 4, 5, 6, 17, 0, 0, 0, 0, 0, 0, 0, 0],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 17],
    [0, 1, 3, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17],
    [0, 1, 2, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 17],
    [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
];

/// Scale-factor reconstruction bases for codes 0..=2, at 2^25 full scale; every further triple
/// of codes halves the value (the shift in [`scale_factor`]).
pub const SCALEFACTOR_BASE: [i32; 3] = [0x0200_0000, 0x0196_5FEA, 0x0142_8A30];

/// Reconstructs a 6-bit scale-factor code into its 2^25 full-scale fixed-point value. Code 63
/// is the reserved "silent" value.
pub fn scale_factor(code: u8) -> i32 {
    if code == 63 {
        return 0;
    }
    let shift = u32::from(code / 3);
    (SCALEFACTOR_BASE[(code % 3) as usize] + ((1i32 << shift) >> 1)) >> shift
}

/// Synthesis window D[i], defined in Table B.3 of ISO/IEC 11172-3, at the table's printed
/// precision.
#[rustfmt::skip]
const SYNTHESIS_D: [f64; 512] = [
     0.000000000, -0.000015259, -0.000015259, -0.000015259,
    -0.000015259, -0.000015259, -0.000015259, -0.000030518,
    -0.000030518, -0.000030518, -0.000030518, -0.000045776,
    -0.000045776, -0.000061035, -0.000061035, -0.000076294,
    -0.000076294, -0.000091553, -0.000106812, -0.000106812,
    -0.000122070, -0.000137329, -0.000152588, -0.000167847,
    -0.000198364, -0.000213623, -0.000244141, -0.000259399,
    -0.000289917, -0.000320435, -0.000366211, -0.000396729,
    -0.000442505, -0.000473022, -0.000534058, -0.000579834,
    -0.000625610, -0.000686646, -0.000747681, -0.000808716,
    -0.000885010, -0.000961304, -0.001037598, -0.001113892,
    -0.001205444, -0.001296997, -0.001388550, -0.001480103,
    -0.001586914, -0.001693726, -0.001785278, -0.001907349,
    -0.002014160, -0.002120972, -0.002243042, -0.002349854,
    -0.002456665, -0.002578735, -0.002685547, -0.002792358,
    -0.002899170, -0.002990723, -0.003082275, -0.003173828,
     0.003250122,  0.003326416,  0.003387451,  0.003433228,
     0.003463745,  0.003479004,  0.003479004,  0.003463745,
     0.003417969,  0.003372192,  0.003280640,  0.003173828,
     0.003051758,  0.002883911,  0.002700806,  0.002487183,
     0.002227783,  0.001937866,  0.001617432,  0.001266479,
     0.000869751,  0.000442505, -0.000030518, -0.000549316,
    -0.001098633, -0.001693726, -0.002334595, -0.003005981,
    -0.003723145, -0.004486084, -0.005294800, -0.006118774,
    -0.007003784, -0.007919312, -0.008865356, -0.009841919,
    -0.010848999, -0.011886597, -0.012939453, -0.014022827,
    -0.015121460, -0.016235352, -0.017349243, -0.018463135,
    -0.019577026, -0.020690918, -0.021789551, -0.022857666,
    -0.023910522, -0.024932861, -0.025909424, -0.026840210,
    -0.027725220, -0.028533936, -0.029281616, -0.029937744,
    -0.030532837, -0.031005859, -0.031387329, -0.031661987,
    -0.031814575, -0.031845093, -0.031738281, -0.031478882,
     0.031082153,  0.030517578,  0.029785156,  0.028884888,
     0.027801514,  0.026535034,  0.025085449,  0.023422241,
     0.021575928,  0.019531250,  0.017257690,  0.014801025,
     0.012115479,  0.009231567,  0.006134033,  0.002822876,
    -0.000686646, -0.004394531, -0.008316040, -0.012420654,
    -0.016708374, -0.021179199, -0.025817871, -0.030609131,
    -0.035552979, -0.040634155, -0.045837402, -0.051132202,
    -0.056533813, -0.061996460, -0.067520142, -0.073059082,
    -0.078628540, -0.084182739, -0.089706421, -0.095169067,
    -0.100540161, -0.105819702, -0.110946655, -0.115921021,
    -0.120697021, -0.125259399, -0.129562378, -0.133590698,
    -0.137298584, -0.140670776, -0.143676758, -0.146255493,
    -0.148422241, -0.150115967, -0.151306152, -0.151962280,
    -0.152069092, -0.151596069, -0.150497437, -0.148773193,
    -0.146362305, -0.143264771, -0.139450073, -0.134887695,
    -0.129577637, -0.123474121, -0.116577148, -0.108856201,
     0.100311279,  0.090927124,  0.080688477,  0.069595337,
     0.057617187,  0.044784546,  0.031082153,  0.016510010,
     0.001068115, -0.015228271, -0.032379150, -0.050354004,
    -0.069168091, -0.088775635, -0.109161377, -0.130310059,
    -0.152206421, -0.174789429, -0.198059082, -0.221984863,
    -0.246505737, -0.271591187, -0.297210693, -0.323318481,
    -0.349868774, -0.376800537, -0.404083252, -0.431655884,
    -0.459472656, -0.487472534, -0.515609741, -0.543823242,
    -0.572036743, -0.600219727, -0.628295898, -0.656219482,
    -0.683914185, -0.711318970, -0.738372803, -0.765029907,
    -0.791213989, -0.816864014, -0.841949463, -0.866363525,
    -0.890090942, -0.913055420, -0.935195923, -0.956481934,
    -0.976852417, -0.996246338, -1.014617920, -1.031936646,
    -1.048156738, -1.063217163, -1.077117920, -1.089782715,
    -1.101211548, -1.111373901, -1.120223999, -1.127746582,
    -1.133926392, -1.138763428, -1.142211914, -1.144287109,
     1.144989014,  1.144287109,  1.142211914,  1.138763428,
     1.133926392,  1.127746582,  1.120223999,  1.111373901,
     1.101211548,  1.089782715,  1.077117920,  1.063217163,
     1.048156738,  1.031936646,  1.014617920,  0.996246338,
     0.976852417,  0.956481934,  0.935195923,  0.913055420,
     0.890090942,  0.866363525,  0.841949463,  0.816864014,
     0.791213989,  0.765029907,  0.738372803,  0.711318970,
     0.683914185,  0.656219482,  0.628295898,  0.600219727,
     0.572036743,  0.543823242,  0.515609741,  0.487472534,
     0.459472656,  0.431655884,  0.404083252,  0.376800537,
     0.349868774,  0.323318481,  0.297210693,  0.271591187,
     0.246505737,  0.221984863,  0.198059082,  0.174789429,
     0.152206421,  0.130310059,  0.109161377,  0.088775635,
     0.069168091,  0.050354004,  0.032379150,  0.015228271,
    -0.001068115, -0.016510010, -0.031082153, -0.044784546,
    -0.057617187, -0.069595337, -0.080688477, -0.090927124,
     0.100311279,  0.108856201,  0.116577148,  0.123474121,
     0.129577637,  0.134887695,  0.139450073,  0.143264771,
     0.146362305,  0.148773193,  0.150497437,  0.151596069,
     0.152069092,  0.151962280,  0.151306152,  0.150115967,
     0.148422241,  0.146255493,  0.143676758,  0.140670776,
     0.137298584,  0.133590698,  0.129562378,  0.125259399,
     0.120697021,  0.115921021,  0.110946655,  0.105819702,
     0.100540161,  0.095169067,  0.089706421,  0.084182739,
     0.078628540,  0.073059082,  0.067520142,  0.061996460,
     0.056533813,  0.051132202,  0.045837402,  0.040634155,
     0.035552979,  0.030609131,  0.025817871,  0.021179199,
     0.016708374,  0.012420654,  0.008316040,  0.004394531,
     0.000686646, -0.002822876, -0.006134033, -0.009231567,
    -0.012115479, -0.014801025, -0.017257690, -0.019531250,
    -0.021575928, -0.023422241, -0.025085449, -0.026535034,
    -0.027801514, -0.028884888, -0.029785156, -0.030517578,
     0.031082153,  0.031478882,  0.031738281,  0.031845093,
     0.031814575,  0.031661987,  0.031387329,  0.031005859,
     0.030532837,  0.029937744,  0.029281616,  0.028533936,
     0.027725220,  0.026840210,  0.025909424,  0.024932861,
     0.023910522,  0.022857666,  0.021789551,  0.020690918,
     0.019577026,  0.018463135,  0.017349243,  0.016235352,
     0.015121460,  0.014022827,  0.012939453,  0.011886597,
     0.010848999,  0.009841919,  0.008865356,  0.007919312,
     0.007003784,  0.006118774,  0.005294800,  0.004486084,
     0.003723145,  0.003005981,  0.002334595,  0.001693726,
     0.001098633,  0.000549316,  0.000030518, -0.000442505,
    -0.000869751, -0.001266479, -0.001617432, -0.001937866,
    -0.002227783, -0.002487183, -0.002700806, -0.002883911,
    -0.003051758, -0.003173828, -0.003280640, -0.003372192,
    -0.003417969, -0.003463745, -0.003479004, -0.003479004,
    -0.003463745, -0.003433228, -0.003387451, -0.003326416,
     0.003250122,  0.003173828,  0.003082275,  0.002990723,
     0.002899170,  0.002792358,  0.002685547,  0.002578735,
     0.002456665,  0.002349854,  0.002243042,  0.002120972,
     0.002014160,  0.001907349,  0.001785278,  0.001693726,
     0.001586914,  0.001480103,  0.001388550,  0.001296997,
     0.001205444,  0.001113892,  0.001037598,  0.000961304,
     0.000885010,  0.000808716,  0.000747681,  0.000686646,
     0.000625610,  0.000579834,  0.000534058,  0.000473022,
     0.000442505,  0.000396729,  0.000366211,  0.000320435,
     0.000289917,  0.000259399,  0.000244141,  0.000213623,
     0.000198364,  0.000167847,  0.000152588,  0.000137329,
     0.000122070,  0.000106812,  0.000106812,  0.000091553,
     0.000076294,  0.000076294,  0.000061035,  0.000061035,
     0.000045776,  0.000045776,  0.000030518,  0.000030518,
     0.000030518,  0.000030518,  0.000015259,  0.000015259,
     0.000015259,  0.000015259,  0.000015259,  0.000015259,
];

/// [`SYNTHESIS_D`] scaled by 2^15 to match the 2^16 full-scale samples the requantizer
/// produces; the synthesis filter's final division by 2147418112 takes both scale factors back
/// out.
pub fn synthesis_window() -> &'static [f64; 512] {
    static WINDOW: OnceLock<[f64; 512]> = OnceLock::new();
    WINDOW.get_or_init(|| {
        let mut window = [0.0f64; 512];
        for (slot, &d) in window.iter_mut().zip(SYNTHESIS_D.iter()) {
            *slot = d * 32768.0;
        }
        window
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_factor_bases_and_halving() {
        assert_eq!(scale_factor(0), 0x0200_0000);
        assert_eq!(scale_factor(63), 0);
        // Codes three apart are one octave apart (within the rounding the shift introduces).
        for code in 0..60u8 {
            let a = scale_factor(code);
            let b = scale_factor(code + 3);
            assert!((a - 2 * b).abs() <= 1, "code {code}: {a} vs {b}");
        }
    }

    #[test]
    fn step3_rows_cover_their_subband_limits() {
        assert!(QUANT_LUT_STEP_3[0].len() >= (QUANT_TAB_D & 63) as usize);
        assert!(QUANT_LUT_STEP_3[1].len() >= (QUANT_TAB_B & 63) as usize);
        assert!(QUANT_LUT_STEP_3[2].len() >= 30);
    }

    #[test]
    fn step3_descriptors_reference_valid_rows_and_widths() {
        for row in QUANT_LUT_STEP_3 {
            for &desc in row {
                let width = desc >> 4;
                let step4_row = desc & 15;
                assert!(width >= 2 && width <= 4, "width {width}");
                assert!((step4_row as usize) < QUANT_LUT_STEP_4.len());
                // Every code expressible in `width` bits must map somewhere in the row.
                for code in 0..(1u16 << width) {
                    let class = QUANT_LUT_STEP_4[step4_row as usize][code as usize];
                    assert!(class as usize <= QUANT_CLASSES.len());
                }
            }
        }
    }

    #[test]
    fn synthesis_window_carries_the_fixed_point_scale() {
        let window = synthesis_window();
        assert_eq!(window[0], 0.0);
        // D[1] = -0.000015259 is -0.5 at 2^15 scale.
        assert!((window[1] + 0.5).abs() < 1e-4);
        // The window peaks at its center tap.
        let peak = window.iter().fold(0.0f64, |acc, &v| acc.max(v.abs()));
        assert_eq!(peak, window[256].abs());
    }

    #[test]
    fn grouped_classes_pack_three_samples() {
        for class in QUANT_CLASSES {
            if class.grouped {
                // The group codeword must be able to express levels^3 combinations.
                assert!(1u64 << class.bits >= u64::from(class.levels).pow(3));
            }
            else {
                assert!(1u64 << class.bits >= u64::from(class.levels));
            }
        }
    }
}
