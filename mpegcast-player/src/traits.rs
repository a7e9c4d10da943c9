// mpegcast-player
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The collaborator interfaces the player drives: byte sources, video renderers, and audio
//! outputs. Concrete implementations (file, network, display) live outside this crate.

use std::cell::RefCell;
use std::rc::Rc;

use mpegcast_core::Result;

/// A byte source feeding the demuxer: a file, an HTTP download, a WebSocket, or a test fixture.
///
/// The player polls the source from its tick rather than the source pushing bytes, which keeps
/// the whole pipeline on one cooperative execution context.
pub trait Source {
    /// Begins fetching. Called once when playback is requested.
    fn start(&mut self) -> Result<()>;

    /// Returns bytes that have arrived since the last call, or `None` when nothing new is
    /// available. Bytes must be returned in stream order.
    fn poll(&mut self) -> Result<Option<Vec<u8>>>;

    /// Informs the source how many seconds of demuxed but not yet played data the player is
    /// holding, so it can decide whether to fetch more.
    fn resume(&mut self, headroom_seconds: f64) -> Result<()>;

    /// Aborts any in-flight I/O. The source will not be polled again.
    fn destroy(&mut self);

    /// True once enough data has arrived that decoding can begin.
    fn established(&self) -> bool;

    /// True once the entire stream has been delivered.
    fn completed(&self) -> bool;

    /// Delivery progress in `[0, 1]`. Live sources may stay at 0.
    fn progress(&self) -> f64;

    /// True if this source is live and unbounded (e.g. a WebSocket). Used to default the
    /// player's streaming mode.
    fn streaming(&self) -> bool {
        false
    }
}

/// One decoded video frame, borrowed from the video decoder for the duration of a render call.
pub struct VideoFrame<'a> {
    /// Coded width, rounded up to a multiple of 16.
    pub width: usize,
    /// Coded height, rounded up to a multiple of 16.
    pub height: usize,
    /// Luma plane, `width` bytes per row.
    pub y: &'a [u8],
    /// Blue-difference chroma plane, `width / 2` bytes per row.
    pub cb: &'a [u8],
    /// Red-difference chroma plane, `width / 2` bytes per row.
    pub cr: &'a [u8],
}

/// A video sink: a display surface, an encoder, or a test fixture.
pub trait Renderer {
    /// Presents one frame. Planes are valid only for the duration of the call.
    fn render(&mut self, frame: &VideoFrame<'_>) -> Result<()>;

    /// Reports source delivery progress before playback has started.
    fn render_progress(&mut self, progress: f64);

    /// Announces the coded frame dimensions, before the first `render` and again on any
    /// mid-stream change.
    fn resize(&mut self, width: usize, height: usize);

    fn enabled(&self) -> bool {
        true
    }
}

impl<T: Renderer> Renderer for Rc<RefCell<T>> {
    fn render(&mut self, frame: &VideoFrame<'_>) -> Result<()> {
        self.borrow_mut().render(frame)
    }

    fn render_progress(&mut self, progress: f64) {
        self.borrow_mut().render_progress(progress)
    }

    fn resize(&mut self, width: usize, height: usize) {
        self.borrow_mut().resize(width, height)
    }

    fn enabled(&self) -> bool {
        self.borrow().enabled()
    }
}

/// A PCM sink fed 32-bit float stereo frames.
pub trait AudioOutput {
    /// Enqueues one decoded frame. `right` is empty for mono streams.
    fn play(&mut self, sample_rate: u32, left: &[f32], right: &[f32]) -> Result<()>;

    /// Cuts everything currently enqueued.
    fn stop(&mut self);

    /// Seconds of audio enqueued but not yet played.
    fn enqueued_time(&self) -> f64;

    /// Zeroes the enqueued-time accounting after the player throttles the stream.
    fn reset_enqueued_time(&mut self);

    fn set_enabled(&mut self, enabled: bool);

    fn enabled(&self) -> bool;

    fn set_volume(&mut self, _volume: f32) {}

    /// Called when the platform requires a user gesture before audio may start. Outputs that
    /// are always unlocked keep the default no-op.
    fn unlock(&mut self) {}
}

impl<T: AudioOutput> AudioOutput for Rc<RefCell<T>> {
    fn play(&mut self, sample_rate: u32, left: &[f32], right: &[f32]) -> Result<()> {
        self.borrow_mut().play(sample_rate, left, right)
    }

    fn stop(&mut self) {
        self.borrow_mut().stop()
    }

    fn enqueued_time(&self) -> f64 {
        self.borrow().enqueued_time()
    }

    fn reset_enqueued_time(&mut self) {
        self.borrow_mut().reset_enqueued_time()
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.borrow_mut().set_enabled(enabled)
    }

    fn enabled(&self) -> bool {
        self.borrow().enabled()
    }

    fn set_volume(&mut self, volume: f32) {
        self.borrow_mut().set_volume(volume)
    }

    fn unlock(&mut self) {
        self.borrow_mut().unlock()
    }
}
