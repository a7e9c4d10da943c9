// mpegcast-demux-ts
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PES payload assembly and the decoder-facing sink trait.

use mpegcast_core::Result;

/// A destination for assembled PES payloads, implemented by each decoder the demuxer is wired
/// to via [`crate::TsDemuxer::connect`].
pub trait PesSink {
    /// Delivers one complete elementary-stream payload (the concatenation of every TS packet
    /// payload slice contributed to it, in receive order) along with the Presentation Timestamp
    /// in effect when the PES packet started, if one was present.
    fn write_pes(&mut self, pts: Option<f64>, payload: &[u8]) -> Result<()>;
}

/// Per-PID state: the assembled bytes of the PES packet currently being received, plus enough
/// bookkeeping to know when it is complete.
#[derive(Default)]
pub(crate) struct PesAccumulator {
    /// Declared total payload length from the PES header; 0 means "unknown" (typically video).
    pub total_length: usize,
    /// Bytes contributed so far.
    pub current_length: usize,
    /// Presentation timestamp in effect for this PES packet, if any.
    pub pts: Option<f64>,
    /// Bytes contributed so far, in receive order.
    pub payload: Vec<u8>,
}

impl PesAccumulator {
    pub fn new(total_length: usize, pts: Option<f64>) -> Self {
        PesAccumulator { total_length, current_length: 0, pts, payload: Vec::new() }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        // When the PES header declared a payload length, trailing transport-packet stuffing
        // past that length is not elementary-stream data and must not reach the decoder.
        let take = if self.total_length != 0 {
            bytes.len().min(self.total_length.saturating_sub(self.current_length))
        }
        else {
            bytes.len()
        };
        self.payload.extend_from_slice(&bytes[..take]);
        self.current_length += take;
    }

    pub fn is_complete(&self) -> bool {
        self.total_length != 0 && self.current_length >= self.total_length
    }
}
