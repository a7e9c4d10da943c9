// mpegcast-demux-ts
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The MPEG-2 Transport Stream demuxer.

use std::collections::HashMap;

use log::debug;
use mpegcast_core::{BitBuffer, BufferMode, Result};

use crate::pes::{PesAccumulator, PesSink};

const PACKET_LEN: usize = 188;
const SYNC_BYTE: u8 = 0x47;

/// The PES stream id the video elementary stream is carried under.
pub const VIDEO_STREAM_ID: u8 = 0xE0;
/// The PES stream id the audio elementary stream is carried under.
pub const AUDIO_STREAM_ID: u8 = 0xC0;

#[derive(Default)]
struct StreamState {
    stream_id: Option<u8>,
    accumulator: Option<PesAccumulator>,
}

/// Parses 188-byte MPEG-2 Transport Stream packets, reassembles PES payloads per elementary
/// stream, and dispatches them with their Presentation Timestamp to the connected decoder.
pub struct TsDemuxer {
    buf: BitBuffer,
    streams: HashMap<u16, StreamState>,
    destinations: HashMap<u8, Box<dyn PesSink>>,
    /// Last Presentation Timestamp observed across any stream, in seconds.
    pub current_time: f64,
    /// The first Presentation Timestamp observed on any stream, in seconds. `None` until set.
    pub start_time: Option<f64>,
}

impl TsDemuxer {
    /// Creates a demuxer. `mode` should be [`BufferMode::Evict`] for a live/streaming source and
    /// [`BufferMode::Expand`] for a fully-buffered file.
    pub fn new(mode: BufferMode) -> Self {
        TsDemuxer {
            buf: BitBuffer::with_capacity(64 * PACKET_LEN, mode),
            streams: HashMap::new(),
            destinations: HashMap::new(),
            current_time: 0.0,
            start_time: None,
        }
    }

    /// Registers `decoder` as the destination for PES payloads carried under `stream_id`
    /// (e.g. [`VIDEO_STREAM_ID`] or [`AUDIO_STREAM_ID`]).
    pub fn connect(&mut self, stream_id: u8, decoder: Box<dyn PesSink>) {
        self.destinations.insert(stream_id, decoder);
    }

    /// Feeds raw transport-stream bytes in. Parses every complete 188-byte packet currently
    /// available and dispatches any PES payloads that become complete as a result. Bytes that do
    /// not yet form a complete packet are retained and prepended to the next call.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.write(bytes)?;

        loop {
            if !self.buf.has((PACKET_LEN * 8) as u32) {
                break;
            }

            if self.buf.peek(8) as u8 != SYNC_BYTE {
                if !self.buf.has((6 * PACKET_LEN * 8) as u32) {
                    // Not enough buffered to attempt resync confidently; wait for more data.
                    break;
                }
                self.resync();
                continue;
            }

            self.parse_packet()?;
        }

        // Parsed packets are never revisited; dropping them keeps the buffer at one packet's
        // worth of leftover bytes no matter how long the stream runs.
        self.buf.compact();

        Ok(())
    }

    /// Scans the first 187 byte offsets for a sync byte whose neighbors 188 bytes apart are also
    /// sync bytes, confirming true packet alignment rather than a coincidental 0x47 in the
    /// payload. On success, realigns to that byte; on failure, skips 187 bytes and lets the next
    /// call retry.
    fn resync(&mut self) {
        for k in 0..(PACKET_LEN - 1) as u64 {
            if self.buf.peek_at(k * 8, 8) as u8 != SYNC_BYTE {
                continue;
            }
            let confirmed = (1..=4u64).all(|m| {
                self.buf.peek_at((k + m * PACKET_LEN as u64) * 8, 8) as u8 == SYNC_BYTE
            });
            if confirmed {
                self.buf.skip((k * 8) as u32);
                return;
            }
        }

        debug!("ts demuxer: resync scan failed, skipping {} bytes", PACKET_LEN - 1);
        self.buf.skip(((PACKET_LEN - 1) * 8) as u32);
    }

    fn parse_packet(&mut self) -> Result<()> {
        let packet_start_bits = self.buf.read_index_bits();
        let packet_end_bits = packet_start_bits + (PACKET_LEN * 8) as u64;

        self.buf.skip(8); // sync byte, already confirmed by the caller
        let _transport_error = self.buf.read(1);
        let payload_start = self.buf.read(1) != 0;
        let _priority = self.buf.read(1);
        let pid = self.buf.read(13) as u16;
        let _scrambling = self.buf.read(2);
        let af_control = self.buf.read(2);
        let _continuity_counter = self.buf.read(4);

        let has_adaptation = af_control & 0b10 != 0;
        let has_payload = af_control & 0b01 != 0;

        if payload_start {
            if self.streams.get(&pid).map_or(false, |s| s.accumulator.is_some()) {
                self.flush_pid(pid)?;
            }
        }

        if has_adaptation {
            let af_len = self.buf.read(8) as u32;
            self.buf.skip(af_len * 8);
        }

        if !has_payload {
            self.buf.set_read_index_bits(packet_end_bits);
            return Ok(());
        }

        if payload_start && self.buf.next_bytes_are_start_code() {
            self.parse_pes_header(pid)?;
        }

        let remaining_bits = packet_end_bits.saturating_sub(self.buf.read_index_bits());
        let remaining_bytes = (remaining_bits / 8) as usize;
        let payload = self.buf.read_bytes(remaining_bytes);

        let is_video = self.streams.get(&pid).and_then(|s| s.stream_id) == Some(VIDEO_STREAM_ID);

        if let Some(state) = self.streams.get_mut(&pid) {
            if let Some(acc) = state.accumulator.as_mut() {
                acc.append(&payload);
            }
        }

        let adaptation_padded_continuation = is_video && !payload_start && has_adaptation;

        let should_flush = self
            .streams
            .get(&pid)
            .and_then(|s| s.accumulator.as_ref())
            .map(|acc| acc.is_complete())
            .unwrap_or(false)
            || adaptation_padded_continuation;

        if should_flush {
            self.flush_pid(pid)?;
        }

        self.buf.set_read_index_bits(packet_end_bits);

        Ok(())
    }

    fn parse_pes_header(&mut self, pid: u16) -> Result<()> {
        self.buf.skip(24); // 00 00 01 prefix
        let stream_id = self.buf.read(8) as u8;
        let packet_length = self.buf.read(16) as usize;
        self.buf.skip(8);
        let pts_dts_flag = self.buf.read(2);
        self.buf.skip(6);
        let header_data_length = self.buf.read(8) as u64;
        let optional_fields_start_bits = self.buf.read_index_bits();

        let pts = if pts_dts_flag & 0b10 != 0 {
            self.buf.skip(4);
            let top = u64::from(self.buf.read(3));
            self.buf.skip(1);
            let mid = u64::from(self.buf.read(15));
            self.buf.skip(1);
            let low = u64::from(self.buf.read(15));
            self.buf.skip(1);
            let ticks = (top << 30) | (mid << 15) | low;
            let seconds = mpegcast_core::units::pts_to_seconds(ticks);
            self.current_time = seconds;
            if self.start_time.is_none() {
                self.start_time = Some(seconds);
            }
            Some(seconds)
        }
        else {
            None
        };

        self.buf.set_read_index_bits(optional_fields_start_bits + header_data_length * 8);

        let pes_payload_len = if packet_length == 0 {
            0
        }
        else {
            packet_length.saturating_sub(header_data_length as usize).saturating_sub(3)
        };

        let state = self.streams.entry(pid).or_default();
        state.stream_id = Some(stream_id);
        state.accumulator = Some(PesAccumulator::new(pes_payload_len, pts));

        Ok(())
    }

    fn flush_pid(&mut self, pid: u16) -> Result<()> {
        let Some(state) = self.streams.get_mut(&pid)
        else {
            return Ok(());
        };
        let Some(acc) = state.accumulator.take()
        else {
            return Ok(());
        };
        let Some(stream_id) = state.stream_id
        else {
            return Ok(());
        };

        if let Some(dest) = self.destinations.get_mut(&stream_id) {
            dest.write_pes(acc.pts, &acc.payload)?;
        }

        Ok(())
    }
}
