// mpegcast-codec-mp2
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use log::debug;
use mpegcast_core::{BitBuffer, BufferMode, Result};
use mpegcast_demux_ts::PesSink;

use crate::synthesis::SynthesisBank;
use crate::tables::{
    scale_factor, QuantizerSpec, BIT_RATES_KBPS, GRANULES, LAYER_II, PARTS, QUANT_CLASSES,
    QUANT_LUT_STEP_1, QUANT_LUT_STEP_2, QUANT_LUT_STEP_3, QUANT_LUT_STEP_4, SAMPLES_PER_FRAME,
    SAMPLE_RATES_MPEG1, SAMPLE_RATES_MPEG2_LSR, SUBBANDS, SYNC_WORD,
};

/// A decoded frame of 1152 interleaved-free stereo samples, one `Vec<f32>` per channel. Mono
/// streams populate only `left`.
#[derive(Clone, Debug, Default)]
pub struct AudioFrame {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
    pub pts: Option<f64>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    fn from_bits(bits: u32) -> Self {
        match bits {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        }
    }

    fn channel_count(self) -> usize {
        if self == ChannelMode::Mono {
            1
        } else {
            2
        }
    }
}

struct FrameHeader {
    is_mpeg1: bool,
    sample_rate: u32,
    sample_rate_index: u32,
    bitrate_index: u32,
    bitrate_kbps: u32,
    padding: bool,
    channel_mode: ChannelMode,
    stereo_bound: usize,
}

impl FrameHeader {
    /// Total frame length in bytes, header included: `144000 * bitrate / sample_rate` plus one
    /// padding byte when the padding bit is set.
    fn frame_bytes(&self) -> u64 {
        u64::from(144_000 * self.bitrate_kbps / self.sample_rate) + u64::from(self.padding)
    }

    /// Resolves the quantizer-selection lookups: which row of the step-3 table applies, and how
    /// many subbands actually carry data at this bitrate and sample rate.
    fn quant_table_and_limit(&self) -> (usize, usize) {
        if self.is_mpeg1 {
            let tab1 = if self.channel_mode == ChannelMode::Mono { 0 } else { 1 };
            let tab2 = QUANT_LUT_STEP_1[tab1][(self.bitrate_index - 1) as usize];
            let tab3 = QUANT_LUT_STEP_2[tab2 as usize][self.sample_rate_index as usize];
            ((tab3 >> 6) as usize, (tab3 & 63) as usize)
        } else {
            // MPEG-2 low sample rates use one fixed table with 30 active subbands.
            (2, 30)
        }
    }
}

/// Default bit-buffer capacity for an audio elementary stream.
pub const DEFAULT_AUDIO_BUFFER_SIZE: usize = 128 * 1024;

/// A pure Rust MPEG-1 Audio Layer II decoder. One instance decodes one elementary stream end to
/// end, re-synchronizing on the next valid frame header whenever it encounters garbage.
pub struct Mp2Decoder {
    bits: BitBuffer,
    pending_pts: Option<f64>,
    synthesis: [SynthesisBank; 2],
    sample_rate: u32,
    start_time: Option<f64>,
    decoded_time: f64,
    pub(crate) last_frame: Option<AudioFrame>,
}

impl Mp2Decoder {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_AUDIO_BUFFER_SIZE, BufferMode::Expand)
    }

    /// Creates a decoder with an explicit bit-buffer capacity and growth mode. Streaming players
    /// use [`BufferMode::Evict`] so the buffer never grows past `capacity`.
    pub fn with_buffer(capacity: usize, mode: BufferMode) -> Self {
        Mp2Decoder {
            bits: BitBuffer::with_capacity(capacity, mode),
            pending_pts: None,
            synthesis: [SynthesisBank::new(), SynthesisBank::new()],
            sample_rate: 0,
            start_time: None,
            decoded_time: 0.0,
            last_frame: None,
        }
    }

    /// Takes the most recently decoded frame, if any.
    pub fn frame(&mut self) -> Option<AudioFrame> {
        self.last_frame.take()
    }

    /// The sample rate of the most recently decoded frame, or 0 before the first frame.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The presentation time of the first PES packet delivered to this decoder, or `None` if no
    /// timestamped packet has arrived yet.
    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    /// The presentation time the decoder has advanced to: the PTS of the last frame whose PES
    /// packet carried one, plus one frame duration per frame decoded since.
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

    /// Attempts to decode exactly one frame starting at the current read position. Returns
    /// `Ok(true)` if a frame was produced, `Ok(false)` if there was not enough data buffered yet.
    /// An invalid header is not an error: it is logged and the buffer realigns at the next byte,
    /// matching the "invalid header consumes nothing" contract translated to a byte-stream
    /// decoder (the player drops the frame and keeps going).
    pub fn decode(&mut self) -> Result<bool> {
        if !self.bits.has(32) {
            return Ok(false);
        }

        let start = self.bits.read_index_bits();
        let header = match self.read_header() {
            Some(h) => h,
            None => {
                debug!("mp2: invalid frame header, resyncing by one byte");
                self.bits.set_read_index_bits(start + 8);
                return Ok(true);
            }
        };

        let frame_end = start + header.frame_bytes() * 8;
        if !self.bits.has((frame_end - self.bits.read_index_bits()) as u32) {
            // The full frame has not arrived yet; back up so the next call re-reads the header.
            self.bits.set_read_index_bits(start);
            return Ok(false);
        }

        let channels = header.channel_mode.channel_count();
        let (table_row, subband_limit) = header.quant_table_and_limit();
        let bound = header.stereo_bound.min(subband_limit);

        // Bit allocation: independent per channel below the bound, shared at and above it.
        let mut allocation: [[Option<QuantizerSpec>; SUBBANDS]; 2] = [[None; SUBBANDS]; 2];
        for sb in 0..subband_limit {
            let desc = QUANT_LUT_STEP_3[table_row][sb];
            if channels == 1 || sb < bound {
                for alloc in allocation.iter_mut().take(channels) {
                    alloc[sb] = self.read_allocation(desc);
                }
            } else {
                let shared = self.read_allocation(desc);
                allocation[0][sb] = shared;
                allocation[1][sb] = shared;
            }
        }

        // Scale-factor selection information, then the scale factors themselves.
        let mut scalefactor_select = [[0u8; SUBBANDS]; 2];
        for sb in 0..subband_limit {
            for ch in 0..channels {
                if allocation[ch][sb].is_some() {
                    scalefactor_select[ch][sb] = self.bits.read(2) as u8;
                }
            }
        }

        let mut scalefactors = [[[0u8; 3]; SUBBANDS]; 2];
        for sb in 0..subband_limit {
            for ch in 0..channels {
                if allocation[ch][sb].is_some() {
                    scalefactors[ch][sb] = self.read_scalefactor_triplet(scalefactor_select[ch][sb]);
                }
            }
        }

        let mut frame = AudioFrame {
            sample_rate: header.sample_rate,
            left: Vec::with_capacity(SAMPLES_PER_FRAME),
            right: if channels == 2 { Vec::with_capacity(SAMPLES_PER_FRAME) } else { Vec::new() },
            pts: self.pending_pts.take(),
        };

        // Three parts of four granules each; each granule carries three samples per active
        // subband, read in subband order and synthesized sample-slot by sample-slot.
        for part in 0..PARTS {
            for _granule in 0..GRANULES {
                let mut raw = [[[0u32; 3]; SUBBANDS]; 2];
                for sb in 0..subband_limit {
                    // At and above the stereo bound, joint-stereo subbands carry one set of raw
                    // codes; each channel still applies its own scale factor below.
                    let shared = channels == 1 || sb >= bound;
                    let read_channels = if shared { 1 } else { channels };
                    for ch in 0..read_channels {
                        if let Some(quant) = allocation[ch][sb] {
                            raw[ch][sb] = self.read_granule_samples(&quant);
                        }
                    }
                    if shared && channels == 2 {
                        raw[1][sb] = raw[0][sb];
                    }
                }

                for s in 0..3 {
                    let mut subband_samples = [[0.0f64; SUBBANDS]; 2];
                    for sb in 0..subband_limit {
                        for ch in 0..channels {
                            if let Some(quant) = allocation[ch][sb] {
                                let sf = scale_factor(scalefactors[ch][sb][part]);
                                subband_samples[ch][sb] = requantize(raw[ch][sb][s], &quant, sf);
                            }
                        }
                    }

                    self.synthesis[0].synthesize_part(&subband_samples[0], &mut frame.left);
                    if channels == 2 {
                        self.synthesis[1].synthesize_part(&subband_samples[1], &mut frame.right);
                    }
                }
            }
        }

        // Whatever ancillary data remains in the frame is skipped so the next decode starts
        // exactly one frame length past this one.
        self.bits.set_read_index_bits(frame_end);

        if let Some(pts) = frame.pts {
            self.decoded_time = pts;
        }
        self.decoded_time += SAMPLES_PER_FRAME as f64 / f64::from(header.sample_rate);
        self.sample_rate = header.sample_rate;

        self.last_frame = Some(frame);
        Ok(true)
    }

    fn read_header(&mut self) -> Option<FrameHeader> {
        if self.bits.read(11) != SYNC_WORD {
            return None;
        }
        let version = self.bits.read(2);
        let is_mpeg1 = version == 0b11;
        let layer = self.bits.read(2);
        if layer != LAYER_II {
            return None;
        }
        // protection_bit: 0 means a CRC follows the header, 1 means none.
        let crc_present = self.bits.read(1) == 0;
        let bitrate_index = self.bits.read(4);
        let sample_rate_index = self.bits.read(2);
        let padding = self.bits.read(1) != 0;
        let _private = self.bits.read(1);
        let channel_mode = ChannelMode::from_bits(self.bits.read(2));

        if bitrate_index == 0 || bitrate_index == 15 || sample_rate_index == 3 {
            return None;
        }

        // mode_extension is a fixed 2-bit field present for every channel mode; it is only
        // meaningful (selecting the joint-stereo subband split) when mode is JointStereo.
        let mode_extension = self.bits.read(2);
        let stereo_bound = match channel_mode {
            ChannelMode::JointStereo => ((mode_extension + 1) << 2) as usize,
            ChannelMode::Mono => 0,
            _ => SUBBANDS,
        };

        self.bits.skip(4); // copyright, original, emphasis (1+1+2)
        if crc_present {
            self.bits.skip(16);
        }

        let sample_rate = if is_mpeg1 {
            SAMPLE_RATES_MPEG1[sample_rate_index as usize]
        } else {
            SAMPLE_RATES_MPEG2_LSR[sample_rate_index as usize]
        };

        Some(FrameHeader {
            is_mpeg1,
            sample_rate,
            sample_rate_index,
            bitrate_index,
            bitrate_kbps: BIT_RATES_KBPS[bitrate_index as usize],
            padding,
            channel_mode,
            stereo_bound,
        })
    }

    /// Reads one allocation code described by a step-3 descriptor (width in the high nibble,
    /// step-4 row in the low nibble) and resolves it to a quantizer class, or `None` for an
    /// unallocated subband.
    fn read_allocation(&mut self, descriptor: u8) -> Option<QuantizerSpec> {
        let code = self.bits.read(u32::from(descriptor >> 4)) as usize;
        let class = QUANT_LUT_STEP_4[(descriptor & 15) as usize][code];
        if class == 0 {
            None
        } else {
            Some(QUANT_CLASSES[(class - 1) as usize])
        }
    }

    fn read_scalefactor_triplet(&mut self, sfsi: u8) -> [u8; 3] {
        match sfsi {
            0 => [self.bits.read(6) as u8, self.bits.read(6) as u8, self.bits.read(6) as u8],
            1 => {
                let a = self.bits.read(6) as u8;
                let b = self.bits.read(6) as u8;
                [a, a, b]
            }
            2 => {
                let a = self.bits.read(6) as u8;
                [a, a, a]
            }
            _ => {
                let a = self.bits.read(6) as u8;
                let b = self.bits.read(6) as u8;
                [a, b, b]
            }
        }
    }

    /// Reads the three samples one (channel, subband) contributes to a granule: one packed
    /// codeword for grouped quantizers, three plain codes otherwise.
    fn read_granule_samples(&mut self, quant: &QuantizerSpec) -> [u32; 3] {
        if quant.grouped {
            let mut code = self.bits.read(quant.bits);
            let mut out = [0u32; 3];
            for slot in out.iter_mut() {
                *slot = code % quant.levels;
                code /= quant.levels;
            }
            out
        } else {
            [
                self.bits.read(quant.bits),
                self.bits.read(quant.bits),
                self.bits.read(quant.bits),
            ]
        }
    }
}

/// Centers a raw quantized code on zero and applies the reconstructed scale factor, using the
/// 12-bit split multiply that keeps every intermediate inside 32 bits. Full-scale output is
/// +/-2^16; the synthesis filter's final normalization divides that back out.
fn requantize(raw: u32, quant: &QuantizerSpec, sf: i32) -> f64 {
    let levels = quant.levels as i32;
    let scale = 65536 / (levels + 1);
    let adj = ((levels + 1) >> 1) - 1;
    let val = (adj - raw as i32) * scale;
    let sample = (val * (sf >> 12) + ((val * (sf & 4095) + 2048) >> 12)) >> 12;
    f64::from(sample)
}

impl Default for Mp2Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl PesSink for Mp2Decoder {
    fn write_pes(&mut self, pts: Option<f64>, payload: &[u8]) -> Result<()> {
        if let Some(seconds) = pts {
            if self.start_time.is_none() {
                self.start_time = Some(seconds);
            }
            self.bits.record_timestamp(seconds);
            if self.pending_pts.is_none() {
                self.pending_pts = Some(seconds);
            }
        }
        self.bits.write(payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_frame_header_44100() -> Vec<u8> {
        // sync(11)=0x7FF, version(2)=11 MPEG-1, layer(2)=10, crc(1)=1 (unprotected),
        // bitrate_index(4)=8 (128 kbps), sample_rate_index(2)=00 (44100), padding(1)=0,
        // private(1)=0, mode(2)=11 mono.
        vec![0xFF, 0xFD, 0x80, 0xC0]
    }

    #[test]
    fn invalid_header_resyncs_without_erroring() {
        let mut decoder = Mp2Decoder::new();
        decoder.bits.write(&[0x00, 0x00, 0x00, 0x00]).unwrap();
        let produced = decoder.decode().unwrap();
        assert!(produced);
        assert!(decoder.last_frame.is_none());
    }

    #[test]
    fn valid_header_parses_sample_rate_and_tables() {
        let mut decoder = Mp2Decoder::new();
        let mut bytes = mono_frame_header_44100();
        bytes.resize(bytes.len() + 512, 0);
        decoder.bits.write(&bytes).unwrap();
        let header = decoder.read_header().unwrap();
        assert_eq!(header.sample_rate, 44100);
        assert_eq!(header.channel_mode, ChannelMode::Mono);
        // 128 kbps mono at 44.1 kHz selects the 30-subband high-rate table.
        assert_eq!(header.quant_table_and_limit(), (1, 30));
    }

    /// 128 kbps at 44.1 kHz: 144000 * 128 / 44100 = 417 bytes, no padding.
    const STEREO_FRAME_BYTES: usize = 417;

    fn silent_stereo_frame() -> Vec<u8> {
        // sync, MPEG-1, Layer II, no CRC, bitrate index 8, 44.1 kHz, stereo, no padding. The
        // all-zero body allocates zero bits to every subband, i.e. digital silence.
        let mut bytes = vec![0xFF, 0xFD, 0x80, 0x04];
        bytes.resize(STEREO_FRAME_BYTES, 0);
        bytes
    }

    #[test]
    fn silent_stereo_frame_produces_1152_samples_per_channel() {
        let mut decoder = Mp2Decoder::new();
        decoder.write_pes(None, &silent_stereo_frame()).unwrap();

        assert!(decoder.decode().unwrap());
        let frame = decoder.frame().unwrap();
        assert_eq!(frame.sample_rate, 44100);
        assert_eq!(frame.left.len(), 1152);
        assert_eq!(frame.right.len(), 1152);
        assert!(frame.left.iter().chain(frame.right.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn decode_advances_exactly_one_frame_length() {
        let mut decoder = Mp2Decoder::new();
        decoder.write_pes(None, &silent_stereo_frame()).unwrap();
        decoder.write_pes(None, &silent_stereo_frame()).unwrap();

        assert!(decoder.decode().unwrap());
        assert_eq!(decoder.bits.read_index_bits(), (STEREO_FRAME_BYTES as u64) * 8);
        assert!(decoder.decode().unwrap());
        assert_eq!(decoder.bits.read_index_bits(), (STEREO_FRAME_BYTES as u64) * 2 * 8);
        assert!((decoder.current_time() - 2.0 * 1152.0 / 44100.0).abs() < 1e-9);
    }

    #[test]
    fn partial_frame_returns_false_and_rewinds() {
        let mut decoder = Mp2Decoder::new();
        decoder.write_pes(None, &silent_stereo_frame()[..32]).unwrap();
        assert!(!decoder.decode().unwrap());
        assert_eq!(decoder.bits.read_index_bits(), 0);
    }

    #[test]
    fn nonzero_samples_survive_requantization() {
        // A subband fed the largest code of a 15-level quantizer at the loudest scale factor
        // must come out of requantization with a clearly nonzero value.
        let quant = QUANT_CLASSES[4];
        assert_eq!(quant.levels, 15);
        let value = requantize(0, &quant, scale_factor(0));
        assert!(value.abs() > 10_000.0, "value {value}");
    }
}
