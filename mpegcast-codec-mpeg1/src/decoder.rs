// mpegcast-codec-mpeg1
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Sequence, picture, and slice layer parsing: the top of the bitstream state machine.

use log::{debug, trace};
use mpegcast_core::{decode_error, BitBuffer, BufferMode, Result};
use mpegcast_demux_ts::PesSink;

use crate::planes::PlaneSet;
use crate::tables::{
    PictureType, DEFAULT_INTRA_QUANT_MATRIX, DEFAULT_NON_INTRA_QUANT_MATRIX, EXTENSION_START_CODE,
    FRAME_RATE_TABLE, GROUP_START_CODE, PICTURE_START_CODE, SEQUENCE_END_CODE,
    SEQUENCE_HEADER_CODE, SLICE_START_CODE_MAX, SLICE_START_CODE_MIN, ZIG_ZAG,
};

/// Per-macroblock decode state, reset at the start of every slice.
pub(crate) struct SliceState {
    pub quantizer_scale: u8,
    pub dc_predictor_y: i32,
    pub dc_predictor_cb: i32,
    pub dc_predictor_cr: i32,
    pub pmv_forward_x: i32,
    pub pmv_forward_y: i32,
    pub mb_address: i32,
}

impl SliceState {
    fn new(mb_row: usize, mb_width: usize) -> Self {
        SliceState {
            quantizer_scale: 1,
            dc_predictor_y: 128,
            dc_predictor_cb: 128,
            dc_predictor_cr: 128,
            pmv_forward_x: 0,
            pmv_forward_y: 0,
            mb_address: (mb_row * mb_width) as i32 - 1,
        }
    }
}

/// Decodes an MPEG-1 video elementary stream into successive 4:2:0 frames.
///
/// Implements the forward-predicted subset of ISO/IEC 11172-2: I and P pictures are fully
/// reconstructed; B and D pictures are scanned past (their slice data never affects a displayed
/// frame, and display reordering is out of scope) without decoding their macroblocks.
pub struct Mpeg1Decoder {
    bits: BitBuffer,
    have_sequence_header: bool,
    width: usize,
    height: usize,
    mb_width: usize,
    mb_height: usize,
    pub frame_rate: f64,
    intra_quant_matrix: [u8; 64],
    non_intra_quant_matrix: [u8; 64],
    current: Option<PlaneSet>,
    forward: Option<PlaneSet>,
    last_frame: Option<(f64, PlaneSet)>,
    picture_type: PictureType,
    forward_f_code: u8,
    full_pel_forward: bool,
    pending_pts: Option<f64>,
    current_picture_pts: Option<f64>,
    start_time: Option<f64>,
    decoded_time: f64,
    pub(crate) slice: SliceState,
}

/// Default bit-buffer capacity for a video elementary stream.
pub const DEFAULT_VIDEO_BUFFER_SIZE: usize = 512 * 1024;

impl Mpeg1Decoder {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_VIDEO_BUFFER_SIZE, BufferMode::Expand)
    }

    /// Creates a decoder with an explicit bit-buffer capacity and growth mode. Streaming players
    /// use [`BufferMode::Evict`] so the buffer never grows past `capacity`.
    pub fn with_buffer(capacity: usize, mode: BufferMode) -> Self {
        Mpeg1Decoder {
            bits: BitBuffer::with_capacity(capacity, mode),
            have_sequence_header: false,
            width: 0,
            height: 0,
            mb_width: 0,
            mb_height: 0,
            frame_rate: 0.0,
            intra_quant_matrix: DEFAULT_INTRA_QUANT_MATRIX,
            non_intra_quant_matrix: DEFAULT_NON_INTRA_QUANT_MATRIX,
            current: None,
            forward: None,
            last_frame: None,
            picture_type: PictureType::Intra,
            forward_f_code: 1,
            full_pel_forward: false,
            pending_pts: None,
            current_picture_pts: None,
            start_time: None,
            decoded_time: 0.0,
            slice: SliceState::new(0, 0),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// The presentation time of the first PES packet delivered to this decoder, or `None` if no
    /// timestamped packet has arrived yet.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// The presentation time the decoder has advanced to: the PTS of the last decoded picture,
    /// plus one frame period per untimestamped picture since.
    pub fn current_time(&self) -> f64 {
        self.decoded_time
    }

    /// Repositions the bit-buffer read index to the highest recorded timestamp at or before
    /// `time_seconds`, and truncates the timestamp records the lookup consumed. A target earlier
    /// than every recorded timestamp rewinds to the start of the buffer and resets the playhead
    /// to the stream's start time.
    pub fn seek(&mut self, time_seconds: f64) {
        let index = self.bits.bit_index_for_time(time_seconds);
        self.bits.set_read_index_bits(index);
        self.decoded_time = self.bits.time_at(index).or(self.start_time).unwrap_or(0.0);
        self.bits.clear_timestamps();
        self.pending_pts = None;
    }

    /// The most recently completed frame's planes and its Presentation Timestamp, if one was
    /// delivered with the PES packet that produced it.
    pub fn frame(&self) -> Option<(f64, &PlaneSet)> {
        self.last_frame.as_ref().map(|(pts, planes)| (*pts, planes))
    }

    /// Attempts to decode one displayable picture from buffered bitstream data. Returns `Ok(true)`
    /// if a frame was produced (retrievable via [`Self::frame`]), `Ok(false)` if the buffer was
    /// exhausted before one could be.
    pub fn decode(&mut self) -> Result<bool> {
        loop {
            let code = self.bits.find_next_start_code();
            if code < 0 {
                return Ok(false);
            }
            match code as u8 {
                SEQUENCE_HEADER_CODE => self.decode_sequence_header()?,
                PICTURE_START_CODE => {
                    self.decode_picture_header()?;
                    let discard = matches!(self.picture_type, PictureType::Bidirectional | PictureType::Dc);
                    self.decode_slices(discard)?;
                    if !discard {
                        self.finish_picture();
                        return Ok(true);
                    }
                }
                SEQUENCE_END_CODE => return Ok(false),
                GROUP_START_CODE | EXTENSION_START_CODE => {
                    trace!("mpeg1: skipping group/extension header");
                }
                other if (SLICE_START_CODE_MIN..=SLICE_START_CODE_MAX).contains(&other) => {
                    // A slice with no picture header yet buffered; drop it, we cannot place it.
                    debug!("mpeg1: slice start code before any picture header, ignoring");
                }
                _ => {}
            }
        }
    }

    fn decode_sequence_header(&mut self) -> Result<()> {
        let width = self.bits.read(12) as usize;
        let height = self.bits.read(12) as usize;
        self.bits.skip(4); // pixel_aspect_ratio
        let frame_rate_code = self.bits.read(4) as usize;
        self.bits.skip(18); // bit_rate (18 bits)
        self.bits.skip(1); // marker_bit
        self.bits.skip(10); // vbv_buffer_size
        self.bits.skip(1); // constrained_parameters_flag

        if width == 0 || height == 0 {
            return decode_error("mpeg1: sequence header has zero dimensions");
        }

        self.width = width;
        self.height = height;
        self.mb_width = (width + 15) / 16;
        self.mb_height = (height + 15) / 16;
        self.frame_rate = FRAME_RATE_TABLE[frame_rate_code];

        if self.bits.read(1) != 0 {
            self.intra_quant_matrix = self.read_quant_matrix();
        }
        else {
            self.intra_quant_matrix = DEFAULT_INTRA_QUANT_MATRIX;
        }
        if self.bits.read(1) != 0 {
            self.non_intra_quant_matrix = self.read_quant_matrix();
        }
        else {
            self.non_intra_quant_matrix = DEFAULT_NON_INTRA_QUANT_MATRIX;
        }

        let coded_w = self.mb_width * 16;
        let coded_h = self.mb_height * 16;
        self.current = Some(PlaneSet::new(coded_w, coded_h));
        self.forward = Some(PlaneSet::new(coded_w, coded_h));
        self.have_sequence_header = true;

        debug!("mpeg1: sequence {}x{} @ {:.3}fps", width, height, self.frame_rate);
        Ok(())
    }

    /// Reads a 64-byte quantization matrix. The stream transmits it in zig-zag scan order; it
    /// is stored in raster order, like the default matrices, so block decode can index it by
    /// raster position directly.
    fn read_quant_matrix(&mut self) -> [u8; 64] {
        let mut matrix = [0u8; 64];
        for &raster in ZIG_ZAG.iter() {
            matrix[raster] = self.bits.read(8) as u8;
        }
        matrix
    }

    fn decode_picture_header(&mut self) -> Result<()> {
        if !self.have_sequence_header {
            return decode_error("mpeg1: picture header before sequence header");
        }

        self.bits.skip(10); // temporal_reference
        let picture_type = self.bits.read(3);
        self.picture_type = match PictureType::from_code(picture_type) {
            Some(pt) => pt,
            None => return decode_error("mpeg1: invalid picture_coding_type"),
        };
        self.bits.skip(16); // vbv_delay

        if matches!(self.picture_type, PictureType::Predicted | PictureType::Bidirectional) {
            self.full_pel_forward = self.bits.read(1) != 0;
            let f_code = self.bits.read(3) as u8;
            if f_code == 0 && self.picture_type == PictureType::Predicted {
                return decode_error("mpeg1: forward_f_code of zero");
            }
            self.forward_f_code = f_code.max(1);
        }
        if self.picture_type == PictureType::Bidirectional {
            self.bits.skip(1); // full_pel_backward_vector
            self.bits.skip(3); // backward_f_code
        }

        self.current_picture_pts = self.pending_pts.take();
        Ok(())
    }

    fn decode_slices(&mut self, discard: bool) -> Result<()> {
        loop {
            let code = self.bits.find_next_start_code();
            if code < 0 {
                return Ok(());
            }
            let code = code as u8;
            if !(SLICE_START_CODE_MIN..=SLICE_START_CODE_MAX).contains(&code) {
                self.bits.rewind(32); // give the byte back to the outer loop
                return Ok(());
            }

            let mb_row = (code - SLICE_START_CODE_MIN) as usize;
            self.slice = SliceState::new(mb_row, self.mb_width);
            self.slice.quantizer_scale = self.bits.read(5) as u8;
            while self.bits.read(1) != 0 {
                self.bits.skip(8); // extra_information_slice
            }

            if discard {
                continue; // the next find_next_start_code call skips straight past this slice's data
            }

            self.decode_macroblocks_in_slice()?;
        }
    }

    fn finish_picture(&mut self) {
        // Only reference pictures (I and P) reach here; B and D pictures were discarded before
        // their slices were reconstructed.
        match self.current_picture_pts.take() {
            Some(pts) => self.decoded_time = pts,
            None if self.frame_rate > 0.0 => self.decoded_time += 1.0 / self.frame_rate,
            None => {}
        }

        let Some(current) = self.current.take()
        else {
            return;
        };

        let (width, height) = (current.width, current.height);
        self.last_frame = Some((self.decoded_time, current.clone()));
        self.forward = Some(current);
        // Every macroblock in a conformant picture is fully written (intra decode or
        // motion-compensated copy), so the next picture can start from a fresh buffer.
        self.current = Some(PlaneSet::new(width, height));
    }

    pub(crate) fn current_mut(&mut self) -> &mut PlaneSet {
        self.current.as_mut().expect("picture decode started before sequence header")
    }

    /// Disjoint-field borrow of the in-progress picture and its forward reference, needed
    /// together for motion compensation.
    pub(crate) fn current_and_forward(&mut self) -> (&mut PlaneSet, &PlaneSet) {
        (
            self.current.as_mut().expect("picture decode started before sequence header"),
            self.forward.as_ref().expect("picture decode started before sequence header"),
        )
    }

    pub(crate) fn intra_quant_matrix(&self) -> &[u8; 64] {
        &self.intra_quant_matrix
    }

    pub(crate) fn non_intra_quant_matrix(&self) -> &[u8; 64] {
        &self.non_intra_quant_matrix
    }

    pub(crate) fn mb_width(&self) -> usize {
        self.mb_width
    }

    pub(crate) fn mb_height(&self) -> usize {
        self.mb_height
    }

    pub(crate) fn picture_type(&self) -> PictureType {
        self.picture_type
    }

    pub(crate) fn forward_f_code(&self) -> u8 {
        self.forward_f_code
    }

    pub(crate) fn full_pel_forward(&self) -> bool {
        self.full_pel_forward
    }
}

impl Default for Mpeg1Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PesSink for Mpeg1Decoder {
    fn write_pes(&mut self, pts: Option<f64>, payload: &[u8]) -> Result<()> {
        if let Some(seconds) = pts {
            if self.start_time.is_none() {
                self.start_time = Some(seconds);
            }
            self.bits.record_timestamp(seconds);
            self.pending_pts = Some(seconds);
        }
        self.bits.write(payload)?;
        Ok(())
    }
}

impl Mpeg1Decoder {
    pub(crate) fn bits_mut(&mut self) -> &mut BitBuffer {
        &mut self.bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-packs a sequence header payload (the bits following the start code) for tests; the
    /// production decoder has no need for a bit-level writer, so this exists only here.
    fn sequence_header_bits(width: u32, height: u32) -> Vec<u8> {
        let mut acc: u64 = 0;
        let mut nbits = 0u32;
        let mut out = Vec::new();
        let mut push = |val: u32, n: u32, acc: &mut u64, nbits: &mut u32, out: &mut Vec<u8>| {
            *acc = (*acc << n) | u64::from(val);
            *nbits += n;
            while *nbits >= 8 {
                *nbits -= 8;
                out.push(((*acc >> *nbits) & 0xFF) as u8);
            }
        };
        push(width, 12, &mut acc, &mut nbits, &mut out);
        push(height, 12, &mut acc, &mut nbits, &mut out);
        push(1, 4, &mut acc, &mut nbits, &mut out); // aspect ratio
        push(3, 4, &mut acc, &mut nbits, &mut out); // frame_rate_code = 25fps
        push(0x3FFFF, 18, &mut acc, &mut nbits, &mut out); // bit_rate
        push(1, 1, &mut acc, &mut nbits, &mut out); // marker
        push(0, 10, &mut acc, &mut nbits, &mut out); // vbv buffer
        push(0, 1, &mut acc, &mut nbits, &mut out); // constrained params
        push(0, 1, &mut acc, &mut nbits, &mut out); // load intra matrix
        push(0, 1, &mut acc, &mut nbits, &mut out); // load non-intra matrix
        if nbits > 0 {
            out.push(((acc << (8 - nbits)) & 0xFF) as u8);
        }
        out
    }

    #[test]
    fn sequence_header_sets_dimensions_and_frame_rate() {
        let mut decoder = Mpeg1Decoder::new();
        let mut stream = vec![0x00, 0x00, 0x01, SEQUENCE_HEADER_CODE];
        stream.extend_from_slice(&sequence_header_bits(352, 288));
        decoder.write_pes(None, &stream).unwrap();
        decoder.decode().unwrap();
        assert_eq!(decoder.width(), 352);
        assert_eq!(decoder.height(), 288);
        assert!((decoder.frame_rate - 25.0).abs() < 1e-9);
    }

    /// A bit-granular writer used by the tests below to hand-encode tiny conformant streams.
    struct BitWriter {
        out: Vec<u8>,
        acc: u64,
        nbits: u32,
    }

    impl BitWriter {
        fn new() -> Self {
            BitWriter { out: Vec::new(), acc: 0, nbits: 0 }
        }

        fn push(&mut self, value: u32, n: u32) {
            self.acc = (self.acc << n) | u64::from(value);
            self.nbits += n;
            while self.nbits >= 8 {
                self.nbits -= 8;
                self.out.push(((self.acc >> self.nbits) & 0xFF) as u8);
            }
        }

        fn push_code(&mut self, (code, len): (u32, u8)) {
            self.push(code, u32::from(len));
        }

        fn align(&mut self) {
            if self.nbits > 0 {
                self.push(0, 8 - self.nbits);
            }
        }

        fn start_code(&mut self, code: u8) {
            self.align();
            self.out.extend_from_slice(&[0x00, 0x00, 0x01, code]);
        }

        fn finish(mut self) -> Vec<u8> {
            self.align();
            self.out
        }
    }

    use crate::huffman::{
        DCT_COEFF, DCT_COEFF_FIRST_OR_EOB, DCT_DC_SIZE_CHROMINANCE, DCT_DC_SIZE_LUMINANCE,
        MACROBLOCK_ADDRESS_INCREMENT, MACROBLOCK_TYPE_I, MACROBLOCK_TYPE_P, MOTION_CODE,
        MacroblockType,
    };

    /// One flat intra macroblock: DC differentials of zero leave every sample at the slice's
    /// initial predictor value of 128.
    fn write_flat_intra_macroblock(w: &mut BitWriter) {
        w.push_code(MACROBLOCK_ADDRESS_INCREMENT.code_for(1));
        w.push_code(MACROBLOCK_TYPE_I.code_for(MacroblockType::INTRA.bits() as i32));
        for block in 0..6 {
            let size_table =
                if block < 4 { &DCT_DC_SIZE_LUMINANCE } else { &DCT_DC_SIZE_CHROMINANCE };
            w.push_code(size_table.code_for(0));
            // End of block: the ambiguous two-bit code plus the 0 discriminator bit.
            w.push_code(DCT_COEFF.code_for(DCT_COEFF_FIRST_OR_EOB));
            w.push(0, 1);
        }
    }

    /// One P macroblock predicted with a zero forward vector and no coded residual.
    fn write_copy_macroblock(w: &mut BitWriter) {
        w.push_code(MACROBLOCK_ADDRESS_INCREMENT.code_for(1));
        w.push_code(MACROBLOCK_TYPE_P.code_for(MacroblockType::MOTION_FORWARD.bits() as i32));
        w.push_code(MOTION_CODE.code_for(0)); // horizontal
        w.push_code(MOTION_CODE.code_for(0)); // vertical
    }

    fn write_picture_header(w: &mut BitWriter, picture_type: u32) {
        w.start_code(PICTURE_START_CODE);
        w.push(0, 10); // temporal_reference
        w.push(picture_type, 3);
        w.push(0, 16); // vbv_delay
        if picture_type == 2 {
            w.push(0, 1); // full_pel_forward_vector
            w.push(1, 3); // forward_f_code
        }
    }

    fn write_slice(w: &mut BitWriter, macroblocks: usize, write_mb: fn(&mut BitWriter)) {
        w.start_code(SLICE_START_CODE_MIN);
        w.push(8, 5); // quantizer_scale
        w.push(0, 1); // no extra_information_slice
        for _ in 0..macroblocks {
            write_mb(w);
        }
    }

    /// Encodes a 32x32 I picture followed by `p_frames` copy-everything P pictures and checks
    /// that every decoded frame is identical to the first and that the playhead advances by one
    /// frame period per picture.
    #[test]
    fn static_clip_decodes_to_identical_frames() {
        let mut w = BitWriter::new();
        w.start_code(SEQUENCE_HEADER_CODE);
        w.out.extend_from_slice(&sequence_header_bits(32, 32));

        let p_frames = 4;
        write_picture_header(&mut w, 1);
        write_slice(&mut w, 4, write_flat_intra_macroblock);
        for _ in 0..p_frames {
            write_picture_header(&mut w, 2);
            write_slice(&mut w, 4, write_copy_macroblock);
        }
        w.start_code(SEQUENCE_END_CODE);

        let mut decoder = Mpeg1Decoder::new();
        decoder.write_pes(Some(0.0), &w.finish()).unwrap();

        let mut reference_y: Option<Vec<u8>> = None;
        for frame_index in 0..=p_frames {
            assert!(decoder.decode().unwrap(), "frame {frame_index} missing");
            let (_, planes) = decoder.frame().expect("frame not emitted");
            assert!(planes.y.iter().all(|&v| (v as i32 - 128).abs() <= 1));
            match &reference_y {
                Some(reference) => assert_eq!(&planes.y, reference, "frame {frame_index} drifted"),
                None => reference_y = Some(planes.y.clone()),
            }
        }

        assert!(!decoder.decode().unwrap());
        // One I picture with the PES timestamp, then four P pictures of 1/25s each.
        assert!((decoder.current_time() - 4.0 / 25.0).abs() < 1e-9);
    }

    #[test]
    fn seek_before_first_timestamp_rewinds_to_start() {
        let mut decoder = Mpeg1Decoder::new();
        let mut stream = vec![0x00, 0x00, 0x01, SEQUENCE_HEADER_CODE];
        stream.extend_from_slice(&sequence_header_bits(32, 32));
        decoder.write_pes(Some(5.0), &stream).unwrap();
        assert_eq!(decoder.start_time(), Some(5.0));

        decoder.seek(1.0);
        assert_eq!(decoder.current_time(), 5.0);
    }
}
