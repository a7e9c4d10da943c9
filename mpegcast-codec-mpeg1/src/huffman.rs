// mpegcast-codec-mpeg1
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Variable-length code tables for the macroblock and block layers, transcribed from
//! ISO/IEC 11172-2 Annex B. Each entry is `(symbol, code, code length)` with the standard's
//! literal bit patterns; decoding walks the stream one bit at a time until the accumulated
//! bits match an entry.

use mpegcast_core::BitBuffer;

pub struct VlcTable {
    entries: &'static [(i32, u32, u8)],
}

impl VlcTable {
    pub const fn new(entries: &'static [(i32, u32, u8)]) -> Self {
        VlcTable { entries }
    }

    /// Reads bits one at a time until they match a code, returning its symbol. Returns `None`
    /// if the buffer runs out, or if the accumulated bits exceed every code length without
    /// matching (a non-conformant stream).
    pub fn decode(&self, bits: &mut BitBuffer) -> Option<i32> {
        let max_len = self.entries.iter().map(|&(_, _, len)| len).max().unwrap_or(0);

        let mut acc = 0u32;
        let mut len = 0u8;
        while len < max_len {
            if !bits.has(1) {
                return None;
            }
            acc = (acc << 1) | bits.read(1);
            len += 1;
            if let Some(&(symbol, _, _)) =
                self.entries.iter().find(|&&(_, code, l)| l == len && code == acc)
            {
                return Some(symbol);
            }
        }
        None
    }
}

pub const MACROBLOCK_STUFFING: i32 = 34;
pub const MACROBLOCK_ESCAPE: i32 = 35;

/// `macroblock_address_increment` (Table B.1). Symbols 1..=33 are literal increments; 34 is
/// `macroblock_stuffing` (discard, read another code); 35 is `macroblock_escape` (add 33 and
/// read another code).
pub static MACROBLOCK_ADDRESS_INCREMENT: VlcTable = VlcTable::new(&[
    (1, 0b1, 1),
    (2, 0b011, 3),
    (3, 0b010, 3),
    (4, 0b0011, 4),
    (5, 0b0010, 4),
    (6, 0b0001_1, 5),
    (7, 0b0001_0, 5),
    (8, 0b0000_111, 7),
    (9, 0b0000_110, 7),
    (10, 0b0000_1011, 8),
    (11, 0b0000_1010, 8),
    (12, 0b0000_1001, 8),
    (13, 0b0000_1000, 8),
    (14, 0b0000_0111, 8),
    (15, 0b0000_0110, 8),
    (16, 0b0000_0101_11, 10),
    (17, 0b0000_0101_10, 10),
    (18, 0b0000_0101_01, 10),
    (19, 0b0000_0101_00, 10),
    (20, 0b0000_0100_11, 10),
    (21, 0b0000_0100_10, 10),
    (22, 0b0000_0100_011, 11),
    (23, 0b0000_0100_010, 11),
    (24, 0b0000_0100_001, 11),
    (25, 0b0000_0100_000, 11),
    (26, 0b0000_0011_111, 11),
    (27, 0b0000_0011_110, 11),
    (28, 0b0000_0011_101, 11),
    (29, 0b0000_0011_100, 11),
    (30, 0b0000_0011_011, 11),
    (31, 0b0000_0011_010, 11),
    (32, 0b0000_0011_001, 11),
    (33, 0b0000_0011_000, 11),
    (MACROBLOCK_STUFFING, 0b0000_0001_111, 11),
    (MACROBLOCK_ESCAPE, 0b0000_0001_000, 11),
]);

bitflags::bitflags! {
    /// Decoded `macroblock_type` flags, shared across picture types.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MacroblockType: u8 {
        const INTRA            = 0b0000_0001;
        const PATTERN           = 0b0000_0010;
        const MOTION_BACKWARD   = 0b0000_0100;
        const MOTION_FORWARD    = 0b0000_1000;
        const QUANT             = 0b0001_0000;
    }
}

const INTRA: i32 = MacroblockType::INTRA.bits() as i32;
const PATTERN: i32 = MacroblockType::PATTERN.bits() as i32;
const MOTION_FORWARD: i32 = MacroblockType::MOTION_FORWARD.bits() as i32;
const QUANT: i32 = MacroblockType::QUANT.bits() as i32;

/// `macroblock_type` for I pictures (Table B.2a).
pub static MACROBLOCK_TYPE_I: VlcTable =
    VlcTable::new(&[(INTRA, 0b1, 1), (INTRA | QUANT, 0b01, 2)]);

/// `macroblock_type` for P pictures (Table B.2b).
pub static MACROBLOCK_TYPE_P: VlcTable = VlcTable::new(&[
    (MOTION_FORWARD | PATTERN, 0b1, 1),
    (PATTERN, 0b01, 2),
    (MOTION_FORWARD, 0b001, 3),
    (INTRA, 0b0001_1, 5),
    (QUANT | MOTION_FORWARD | PATTERN, 0b0001_0, 5),
    (QUANT | PATTERN, 0b0000_1, 5),
    (QUANT | INTRA, 0b0000_01, 6),
]);

/// `motion_code` (Table B.4): signed displacement in the range -16..=16, combined with `r`
/// residual bits when `f_code` is not 1.
pub static MOTION_CODE: VlcTable = VlcTable::new(&[
    (0, 0b1, 1),
    (1, 0b010, 3),
    (-1, 0b011, 3),
    (2, 0b0010, 4),
    (-2, 0b0011, 4),
    (3, 0b0001_0, 5),
    (-3, 0b0001_1, 5),
    (4, 0b0000_110, 7),
    (-4, 0b0000_111, 7),
    (5, 0b0000_1010, 8),
    (-5, 0b0000_1011, 8),
    (6, 0b0000_1000, 8),
    (-6, 0b0000_1001, 8),
    (7, 0b0000_0110, 8),
    (-7, 0b0000_0111, 8),
    (8, 0b0000_0101_10, 10),
    (-8, 0b0000_0101_11, 10),
    (9, 0b0000_0101_00, 10),
    (-9, 0b0000_0101_01, 10),
    (10, 0b0000_0100_10, 10),
    (-10, 0b0000_0100_11, 10),
    (11, 0b0000_0100_010, 11),
    (-11, 0b0000_0100_011, 11),
    (12, 0b0000_0100_000, 11),
    (-12, 0b0000_0100_001, 11),
    (13, 0b0000_0011_110, 11),
    (-13, 0b0000_0011_111, 11),
    (14, 0b0000_0011_100, 11),
    (-14, 0b0000_0011_101, 11),
    (15, 0b0000_0011_010, 11),
    (-15, 0b0000_0011_011, 11),
    (16, 0b0000_0011_000, 11),
    (-16, 0b0000_0011_001, 11),
]);

/// `coded_block_pattern` (Table B.3): one of the 63 non-zero 6-bit patterns indicating which
/// of the 6 blocks in a macroblock carry coded coefficients.
pub static CODED_BLOCK_PATTERN: VlcTable = VlcTable::new(&[
    (60, 0b111, 3),
    (4, 0b1101, 4),
    (8, 0b1100, 4),
    (16, 0b1011, 4),
    (32, 0b1010, 4),
    (12, 0b1001_1, 5),
    (48, 0b1001_0, 5),
    (20, 0b1000_1, 5),
    (40, 0b1000_0, 5),
    (28, 0b0111_1, 5),
    (44, 0b0111_0, 5),
    (52, 0b0110_1, 5),
    (56, 0b0110_0, 5),
    (1, 0b0101_1, 5),
    (61, 0b0101_0, 5),
    (2, 0b0100_1, 5),
    (62, 0b0100_0, 5),
    (24, 0b0011_11, 6),
    (36, 0b0011_10, 6),
    (3, 0b0011_01, 6),
    (63, 0b0011_00, 6),
    (5, 0b0010_111, 7),
    (9, 0b0010_110, 7),
    (17, 0b0010_101, 7),
    (33, 0b0010_100, 7),
    (6, 0b0010_011, 7),
    (10, 0b0010_010, 7),
    (18, 0b0010_001, 7),
    (34, 0b0010_000, 7),
    (7, 0b0001_1111, 8),
    (11, 0b0001_1110, 8),
    (19, 0b0001_1101, 8),
    (35, 0b0001_1100, 8),
    (13, 0b0001_1011, 8),
    (49, 0b0001_1010, 8),
    (21, 0b0001_1001, 8),
    (41, 0b0001_1000, 8),
    (14, 0b0001_0111, 8),
    (50, 0b0001_0110, 8),
    (22, 0b0001_0101, 8),
    (42, 0b0001_0100, 8),
    (15, 0b0001_0011, 8),
    (51, 0b0001_0010, 8),
    (23, 0b0001_0001, 8),
    (43, 0b0001_0000, 8),
    (25, 0b0000_1111, 8),
    (37, 0b0000_1110, 8),
    (26, 0b0000_1101, 8),
    (38, 0b0000_1100, 8),
    (29, 0b0000_1011, 8),
    (45, 0b0000_1010, 8),
    (53, 0b0000_1001, 8),
    (57, 0b0000_1000, 8),
    (30, 0b0000_0111, 8),
    (46, 0b0000_0110, 8),
    (54, 0b0000_0101, 8),
    (58, 0b0000_0100, 8),
    (31, 0b0000_0011_1, 9),
    (47, 0b0000_0011_0, 9),
    (55, 0b0000_0010_1, 9),
    (59, 0b0000_0010_0, 9),
    (27, 0b0000_0001_1, 9),
    (39, 0b0000_0001_0, 9),
]);

/// `dct_dc_size_luminance` (Table B.5a).
pub static DCT_DC_SIZE_LUMINANCE: VlcTable = VlcTable::new(&[
    (1, 0b00, 2),
    (2, 0b01, 2),
    (0, 0b100, 3),
    (3, 0b101, 3),
    (4, 0b110, 3),
    (5, 0b1110, 4),
    (6, 0b1111_0, 5),
    (7, 0b1111_10, 6),
    (8, 0b1111_110, 7),
]);

/// `dct_dc_size_chrominance` (Table B.5b).
pub static DCT_DC_SIZE_CHROMINANCE: VlcTable = VlcTable::new(&[
    (0, 0b00, 2),
    (1, 0b01, 2),
    (2, 0b10, 2),
    (3, 0b110, 3),
    (4, 0b1110, 4),
    (5, 0b1111_0, 5),
    (6, 0b1111_10, 6),
    (7, 0b1111_110, 7),
    (8, 0b1111_1110, 8),
]);

/// Sentinel returned by [`DCT_COEFF`] for the ambiguous one-bit code: as the first coefficient
/// of a block it is (run 0, level 1); afterwards the following bit distinguishes end-of-block
/// (0) from (run 0, level 1) (1).
pub const DCT_COEFF_FIRST_OR_EOB: i32 = pack(0, 1);
/// Sentinel returned by [`DCT_COEFF`] for the escape code: a literal 6-bit run and 8-bit level
/// follow.
pub const DCT_COEFF_ESCAPE: i32 = 0xFFFF;

/// `dct_coeff_first` / `dct_coeff_next` (Tables B.5c and B.5d): packs `run` into the high byte
/// and `level` magnitude into the low byte. Every non-escape code is followed by one sign bit,
/// read by the caller; run/level combinations outside this table are transmitted through the
/// escape code.
pub static DCT_COEFF: VlcTable = VlcTable::new(&[
    (DCT_COEFF_FIRST_OR_EOB, 0b1, 1),
    (pack(1, 1), 0b011, 3),
    (pack(0, 2), 0b0100, 4),
    (pack(2, 1), 0b0101, 4),
    (pack(0, 3), 0b0010_1, 5),
    (pack(3, 1), 0b0011_1, 5),
    (pack(4, 1), 0b0011_0, 5),
    (DCT_COEFF_ESCAPE, 0b0000_01, 6),
    (pack(1, 2), 0b0001_10, 6),
    (pack(5, 1), 0b0001_11, 6),
    (pack(6, 1), 0b0001_01, 6),
    (pack(7, 1), 0b0001_00, 6),
    (pack(0, 4), 0b0000_110, 7),
    (pack(2, 2), 0b0000_100, 7),
    (pack(8, 1), 0b0000_111, 7),
    (pack(9, 1), 0b0000_101, 7),
    (pack(0, 5), 0b0010_0110, 8),
    (pack(0, 6), 0b0010_0001, 8),
    (pack(1, 3), 0b0010_0101, 8),
    (pack(3, 2), 0b0010_0100, 8),
    (pack(10, 1), 0b0010_0111, 8),
    (pack(11, 1), 0b0010_0011, 8),
    (pack(12, 1), 0b0010_0010, 8),
    (pack(13, 1), 0b0010_0000, 8),
    (pack(0, 7), 0b0000_0010_10, 10),
    (pack(1, 4), 0b0000_0011_00, 10),
    (pack(2, 3), 0b0000_0010_11, 10),
    (pack(4, 2), 0b0000_0011_11, 10),
    (pack(5, 2), 0b0000_0010_01, 10),
    (pack(14, 1), 0b0000_0011_10, 10),
    (pack(15, 1), 0b0000_0011_01, 10),
    (pack(16, 1), 0b0000_0010_00, 10),
    (pack(0, 8), 0b0000_0001_1101, 12),
    (pack(0, 9), 0b0000_0001_1000, 12),
    (pack(0, 10), 0b0000_0001_0011, 12),
    (pack(0, 11), 0b0000_0001_0000, 12),
    (pack(1, 5), 0b0000_0001_1011, 12),
    (pack(2, 4), 0b0000_0001_0100, 12),
    (pack(3, 3), 0b0000_0001_1100, 12),
    (pack(4, 3), 0b0000_0001_0010, 12),
    (pack(6, 2), 0b0000_0001_1110, 12),
    (pack(7, 2), 0b0000_0001_0101, 12),
    (pack(8, 2), 0b0000_0001_0001, 12),
    (pack(17, 1), 0b0000_0001_1111, 12),
    (pack(18, 1), 0b0000_0001_1010, 12),
    (pack(19, 1), 0b0000_0001_1001, 12),
    (pack(20, 1), 0b0000_0001_0111, 12),
    (pack(21, 1), 0b0000_0001_0110, 12),
    (pack(0, 12), 0b0000_0000_1101_0, 13),
    (pack(0, 13), 0b0000_0000_1100_1, 13),
    (pack(0, 14), 0b0000_0000_1100_0, 13),
    (pack(0, 15), 0b0000_0000_1011_1, 13),
    (pack(1, 6), 0b0000_0000_1011_0, 13),
    (pack(1, 7), 0b0000_0000_1010_1, 13),
    (pack(2, 5), 0b0000_0000_1010_0, 13),
    (pack(3, 4), 0b0000_0000_1001_1, 13),
    (pack(5, 3), 0b0000_0000_1001_0, 13),
    (pack(9, 2), 0b0000_0000_1000_1, 13),
    (pack(10, 2), 0b0000_0000_1000_0, 13),
    (pack(22, 1), 0b0000_0000_1111_1, 13),
    (pack(23, 1), 0b0000_0000_1111_0, 13),
    (pack(24, 1), 0b0000_0000_1110_1, 13),
    (pack(25, 1), 0b0000_0000_1110_0, 13),
    (pack(26, 1), 0b0000_0000_1101_1, 13),
    (pack(0, 16), 0b0000_0000_0111_11, 14),
    (pack(0, 17), 0b0000_0000_0111_10, 14),
    (pack(0, 18), 0b0000_0000_0111_01, 14),
    (pack(0, 19), 0b0000_0000_0111_00, 14),
    (pack(0, 20), 0b0000_0000_0110_11, 14),
    (pack(0, 21), 0b0000_0000_0110_10, 14),
    (pack(0, 22), 0b0000_0000_0110_01, 14),
    (pack(0, 23), 0b0000_0000_0110_00, 14),
    (pack(0, 24), 0b0000_0000_0101_11, 14),
    (pack(0, 25), 0b0000_0000_0101_10, 14),
    (pack(0, 26), 0b0000_0000_0101_01, 14),
    (pack(0, 27), 0b0000_0000_0101_00, 14),
    (pack(0, 28), 0b0000_0000_0100_11, 14),
    (pack(0, 29), 0b0000_0000_0100_10, 14),
    (pack(0, 30), 0b0000_0000_0100_01, 14),
    (pack(0, 31), 0b0000_0000_0100_00, 14),
    (pack(0, 32), 0b0000_0000_0011_000, 15),
    (pack(0, 33), 0b0000_0000_0010_111, 15),
    (pack(0, 34), 0b0000_0000_0010_110, 15),
    (pack(0, 35), 0b0000_0000_0010_101, 15),
    (pack(0, 36), 0b0000_0000_0010_100, 15),
    (pack(0, 37), 0b0000_0000_0010_011, 15),
    (pack(0, 38), 0b0000_0000_0010_010, 15),
    (pack(0, 39), 0b0000_0000_0010_001, 15),
    (pack(0, 40), 0b0000_0000_0010_000, 15),
    (pack(1, 8), 0b0000_0000_0011_111, 15),
    (pack(1, 9), 0b0000_0000_0011_110, 15),
    (pack(1, 10), 0b0000_0000_0011_101, 15),
    (pack(1, 11), 0b0000_0000_0011_100, 15),
    (pack(1, 12), 0b0000_0000_0011_011, 15),
    (pack(1, 13), 0b0000_0000_0011_010, 15),
    (pack(1, 14), 0b0000_0000_0011_001, 15),
    (pack(1, 15), 0b0000_0000_0001_0011, 16),
    (pack(1, 16), 0b0000_0000_0001_0010, 16),
    (pack(1, 17), 0b0000_0000_0001_0001, 16),
    (pack(1, 18), 0b0000_0000_0001_0000, 16),
    (pack(6, 3), 0b0000_0000_0001_0100, 16),
    (pack(11, 2), 0b0000_0000_0001_1010, 16),
    (pack(12, 2), 0b0000_0000_0001_1001, 16),
    (pack(13, 2), 0b0000_0000_0001_1000, 16),
    (pack(14, 2), 0b0000_0000_0001_0111, 16),
    (pack(15, 2), 0b0000_0000_0001_0110, 16),
    (pack(16, 2), 0b0000_0000_0001_0101, 16),
    (pack(27, 1), 0b0000_0000_0001_1111, 16),
    (pack(28, 1), 0b0000_0000_0001_1110, 16),
    (pack(29, 1), 0b0000_0000_0001_1101, 16),
    (pack(30, 1), 0b0000_0000_0001_1100, 16),
    (pack(31, 1), 0b0000_0000_0001_1011, 16),
]);

pub const fn pack(run: u8, level: u8) -> i32 {
    ((run as i32) << 8) | level as i32
}

pub fn unpack(symbol: i32) -> (u32, i32) {
    ((symbol >> 8) as u32, symbol & 0xFF)
}

#[cfg(test)]
impl VlcTable {
    /// Reverse lookup for the hand-rolled bitstream writers in this crate's tests.
    pub(crate) fn code_for(&self, symbol: i32) -> (u32, u8) {
        let &(_, code, len) = self
            .entries
            .iter()
            .find(|&&(s, _, _)| s == symbol)
            .unwrap_or_else(|| panic!("symbol {symbol} not in table"));
        (code, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mpegcast_core::{BitBuffer, BufferMode};

    fn decode_bits(table: &VlcTable, bytes: &[u8]) -> Option<i32> {
        let mut bits = BitBuffer::new(BufferMode::Expand);
        bits.write(bytes).unwrap();
        table.decode(&mut bits)
    }

    #[test]
    fn known_codewords_decode_to_their_symbols() {
        // '1' -> increment 1, '011' -> increment 2, '0000 0001 000' -> escape.
        assert_eq!(decode_bits(&MACROBLOCK_ADDRESS_INCREMENT, &[0b1000_0000]), Some(1));
        assert_eq!(decode_bits(&MACROBLOCK_ADDRESS_INCREMENT, &[0b0110_0000]), Some(2));
        assert_eq!(
            decode_bits(&MACROBLOCK_ADDRESS_INCREMENT, &[0b0000_0001, 0b0000_0000]),
            Some(MACROBLOCK_ESCAPE)
        );

        // '100' -> dc size 0, '00' -> dc size 1 (luminance).
        assert_eq!(decode_bits(&DCT_DC_SIZE_LUMINANCE, &[0b1000_0000]), Some(0));
        assert_eq!(decode_bits(&DCT_DC_SIZE_LUMINANCE, &[0b0000_0000]), Some(1));

        // '011' -> (run 1, level 1), '0000 01' -> escape.
        assert_eq!(decode_bits(&DCT_COEFF, &[0b0110_0000]), Some(pack(1, 1)));
        assert_eq!(decode_bits(&DCT_COEFF, &[0b0000_0100]), Some(DCT_COEFF_ESCAPE));

        // '111' -> all six blocks coded.
        assert_eq!(decode_bits(&CODED_BLOCK_PATTERN, &[0b1110_0000]), Some(60));
        assert_eq!(decode_bits(&CODED_BLOCK_PATTERN, &[0b0011_0000]), Some(63));

        // '011' -> motion code -1.
        assert_eq!(decode_bits(&MOTION_CODE, &[0b0110_0000]), Some(-1));
    }

    #[test]
    fn every_table_is_prefix_free() {
        for table in [
            &MACROBLOCK_ADDRESS_INCREMENT,
            &MACROBLOCK_TYPE_I,
            &MACROBLOCK_TYPE_P,
            &MOTION_CODE,
            &CODED_BLOCK_PATTERN,
            &DCT_DC_SIZE_LUMINANCE,
            &DCT_DC_SIZE_CHROMINANCE,
            &DCT_COEFF,
        ] {
            for &(sym_a, code_a, len_a) in table.entries {
                for &(sym_b, code_b, len_b) in table.entries {
                    if sym_a == sym_b && len_a == len_b && code_a == code_b {
                        continue;
                    }
                    let (short, long, short_len, long_len) = if len_a <= len_b {
                        (code_a, code_b, len_a, len_b)
                    }
                    else {
                        (code_b, code_a, len_b, len_a)
                    };
                    assert_ne!(
                        short,
                        long >> (long_len - short_len),
                        "{sym_a}/{sym_b} codes collide"
                    );
                }
            }
        }
    }
}
