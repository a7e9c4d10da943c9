// mpegcast-player
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The cooperative playback loop.

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, warn};
use mpegcast_codec_mp2::Mp2Decoder;
use mpegcast_codec_mpeg1::Mpeg1Decoder;
use mpegcast_core::{BufferMode, CastError, Result};
use mpegcast_demux_ts::{PesSink, TsDemuxer, AUDIO_STREAM_ID, VIDEO_STREAM_ID};

use crate::config::PlayerConfig;
use crate::traits::{AudioOutput, Renderer, Source, VideoFrame};

/// Shares a decoder between the demuxer (which owns it as a `PesSink`) and the player (which
/// drives its `decode` calls). Single-threaded by construction, so `Rc<RefCell>` suffices.
struct SinkHandle<T>(Rc<RefCell<T>>);

impl<T: PesSink> PesSink for SinkHandle<T> {
    fn write_pes(&mut self, pts: Option<f64>, payload: &[u8]) -> Result<()> {
        self.0.borrow_mut().write_pes(pts, payload)
    }
}

/// How many seconds of decoded audio to keep ahead of the playhead in stored-file playback.
const AUDIO_LEAD_TARGET: f64 = 0.25;

/// Drives a [`Source`] through the demuxer and decoders to a [`Renderer`] and [`AudioOutput`].
///
/// All progress happens inside [`tick`](Self::tick); nothing runs between ticks. `now` is the
/// caller's monotonic clock in seconds; the player never samples a clock itself, which keeps
/// scheduling decisions deterministic and testable.
pub struct Player {
    config: PlayerConfig,
    streaming: bool,
    source: Box<dyn Source>,
    demuxer: TsDemuxer,
    video: Option<Rc<RefCell<Mpeg1Decoder>>>,
    audio: Option<Rc<RefCell<Mp2Decoder>>>,
    renderer: Box<dyn Renderer>,
    audio_out: Option<Box<dyn AudioOutput>>,
    wants_to_play: bool,
    is_playing: bool,
    autoplay_armed: bool,
    started: bool,
    first_frame_decoded: bool,
    start_time: f64,
    volume: f32,
    last_video_size: (usize, usize),
}

impl Player {
    pub fn new(
        source: Box<dyn Source>,
        renderer: Box<dyn Renderer>,
        audio_out: Option<Box<dyn AudioOutput>>,
        config: PlayerConfig,
    ) -> Self {
        let streaming = config.streaming || source.streaming();
        let mode = if streaming { BufferMode::Evict } else { BufferMode::Expand };

        let mut demuxer = TsDemuxer::new(mode);

        let video = config.video.then(|| {
            Rc::new(RefCell::new(Mpeg1Decoder::with_buffer(config.video_buffer_size, mode)))
        });
        if let Some(video) = &video {
            demuxer.connect(VIDEO_STREAM_ID, Box::new(SinkHandle(video.clone())));
        }

        let audio = (config.audio && audio_out.is_some()).then(|| {
            Rc::new(RefCell::new(Mp2Decoder::with_buffer(config.audio_buffer_size, mode)))
        });
        if let Some(audio) = &audio {
            demuxer.connect(AUDIO_STREAM_ID, Box::new(SinkHandle(audio.clone())));
        }

        let autoplay_armed = config.autoplay || streaming;

        Player {
            config,
            streaming,
            source,
            demuxer,
            video,
            audio,
            renderer,
            audio_out,
            wants_to_play: false,
            is_playing: false,
            autoplay_armed,
            started: false,
            first_frame_decoded: false,
            start_time: 0.0,
            volume: 1.0,
            last_video_size: (0, 0),
        }
    }

    pub fn wants_to_play(&self) -> bool {
        self.wants_to_play
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        if let Some(out) = self.audio_out.as_mut() {
            out.set_volume(volume);
        }
    }

    /// The playhead in seconds since the start of the stream: derived from the audio clock when
    /// audio is present, from the video decoder's progress otherwise.
    pub fn current_time(&self) -> f64 {
        if let Some(audio) = &self.audio {
            let enqueued =
                self.audio_out.as_ref().map(|out| out.enqueued_time()).unwrap_or(0.0);
            let audio = audio.borrow();
            (audio.current_time() - enqueued - audio.start_time().unwrap_or(0.0)).max(0.0)
        }
        else if let Some(video) = &self.video {
            let video = video.borrow();
            (video.current_time() - video.start_time().unwrap_or(0.0)).max(0.0)
        }
        else {
            0.0
        }
    }

    /// Requests playback. The source is started on the first call.
    pub fn play(&mut self) -> Result<()> {
        if !self.started {
            self.started = true;
            self.source.start()?;
        }
        self.wants_to_play = true;
        Ok(())
    }

    /// Stops playback, cuts enqueued audio, and re-aligns the decoders on the reported playhead
    /// so that resuming does not replay what was already heard.
    pub fn pause(&mut self, now: f64) {
        if !self.wants_to_play && !self.is_playing {
            return;
        }
        let playhead = self.current_time();
        self.wants_to_play = false;
        self.is_playing = false;
        if let Some(out) = self.audio_out.as_mut() {
            out.stop();
        }
        self.seek(playhead, now);
    }

    /// Moves the playhead to `time` seconds from the start of the stream.
    pub fn seek(&mut self, time: f64, now: f64) {
        if let Some(audio) = &self.audio {
            let mut audio = audio.borrow_mut();
            let target = time + audio.start_time().unwrap_or(0.0);
            audio.seek(target);
        }
        if let Some(video) = &self.video {
            let mut video = video.borrow_mut();
            let target = time + video.start_time().unwrap_or(0.0);
            video.seek(target);
        }
        if let Some(out) = self.audio_out.as_mut() {
            out.stop();
        }
        self.start_time = now - time;
    }

    /// Tears everything down, leaves first. The player must not be ticked afterwards.
    pub fn destroy(&mut self) {
        self.wants_to_play = false;
        self.is_playing = false;
        if let Some(out) = self.audio_out.as_mut() {
            out.stop();
        }
        self.source.destroy();
    }

    /// One scheduling step. Call on every frame-pacing event with the current monotonic time in
    /// seconds.
    pub fn tick(&mut self, now: f64) -> Result<()> {
        if self.autoplay_armed && !self.wants_to_play {
            self.autoplay_armed = false;
            self.play()?;
        }

        self.pump_source()?;

        if !self.wants_to_play {
            return Ok(());
        }

        if !self.source.established() {
            self.renderer.render_progress(self.source.progress());
            return Ok(());
        }

        if !self.is_playing {
            self.is_playing = true;
            self.start_time = now - self.current_time();
            debug!("playback started at t={:.3}", self.current_time());
        }

        if self.streaming {
            self.tick_streaming()?;
        }
        else {
            self.tick_stored(now)?;
        }

        Ok(())
    }

    /// Drains newly arrived source bytes into the demuxer, and decodes the poster frame once
    /// enough of the stream is buffered.
    fn pump_source(&mut self) -> Result<()> {
        while let Some(bytes) = self.source.poll()? {
            self.demuxer.write(&bytes)?;
        }

        if !self.first_frame_decoded && !self.is_playing && self.config.decode_first_frame {
            if let Some(video) = self.video.clone() {
                if decode_video_step(&video)? {
                    self.first_frame_decoded = true;
                    self.render_current_frame()?;
                }
            }
        }

        Ok(())
    }

    fn tick_streaming(&mut self) -> Result<()> {
        if let Some(video) = self.video.clone() {
            if decode_video_step(&video)? {
                self.render_current_frame()?;
            }
        }
        self.drain_audio()?;
        Ok(())
    }

    fn tick_stored(&mut self, now: f64) -> Result<()> {
        let mut underflow = false;

        if let Some(audio) = self.audio.clone() {
            underflow |= self.run_audio_ahead(&audio)?;

            if let Some(video) = self.video.clone() {
                let audio_time = audio.borrow().current_time();
                if video.borrow().current_time() < audio_time {
                    if decode_video_step(&video)? {
                        self.render_current_frame()?;
                    }
                    else {
                        underflow = true;
                    }
                }
            }
        }
        else if let Some(video) = self.video.clone() {
            underflow |= self.pace_video_against_clock(&video, now)?;
        }

        let headroom = self.demuxer.current_time - self.current_time();
        self.source.resume(headroom)?;

        if underflow && self.source.completed() {
            if self.config.loop_playback {
                debug!("end of stream, looping");
                self.seek(0.0, now);
            }
            else {
                debug!("end of stream, pausing");
                self.pause(now);
            }
        }

        Ok(())
    }

    /// Keeps the audio output supplied [`AUDIO_LEAD_TARGET`] seconds ahead of the playhead.
    /// Returns true on decoder underflow.
    fn run_audio_ahead(&mut self, audio: &Rc<RefCell<Mp2Decoder>>) -> Result<bool> {
        loop {
            let lead = audio.borrow().current_time()
                - audio.borrow().start_time().unwrap_or(0.0)
                - self.current_time();
            if lead >= AUDIO_LEAD_TARGET {
                return Ok(false);
            }
            if !decode_audio_step(audio)? {
                return Ok(true);
            }
            self.emit_audio_frame(audio)?;
        }
    }

    /// Streaming-mode audio: consume everything buffered, throttling the output when it has
    /// already been fed further ahead than the configured maximum lag.
    fn drain_audio(&mut self) -> Result<()> {
        let Some(audio) = self.audio.clone()
        else {
            return Ok(());
        };

        // Re-admit the output once the backlog from an earlier throttle has drained.
        if let Some(out) = self.audio_out.as_mut() {
            if !out.enabled() && out.enqueued_time() < self.config.max_audio_lag {
                out.set_enabled(true);
            }
        }

        loop {
            if let Some(out) = self.audio_out.as_mut() {
                if out.enabled() && out.enqueued_time() > self.config.max_audio_lag {
                    // The output is running ahead of the live edge; keep decoding to stay
                    // current but stop feeding it until the backlog drains.
                    debug!("audio enqueued past max lag, throttling output");
                    out.set_enabled(false);
                    out.reset_enqueued_time();
                }
            }

            if !decode_audio_step(&audio)? {
                return Ok(());
            }
            self.emit_audio_frame(&audio)?;
        }
    }

    fn emit_audio_frame(&mut self, audio: &Rc<RefCell<Mp2Decoder>>) -> Result<()> {
        let Some(frame) = audio.borrow_mut().frame()
        else {
            return Ok(());
        };
        if let Some(out) = self.audio_out.as_mut() {
            if out.enabled() {
                out.play(frame.sample_rate, &frame.left, &frame.right)?;
            }
        }
        Ok(())
    }

    /// Stored-file playback without audio: pace the video decoder against the wallclock.
    /// Returns true on decoder underflow.
    fn pace_video_against_clock(
        &mut self,
        video: &Rc<RefCell<Mpeg1Decoder>>,
        now: f64,
    ) -> Result<bool> {
        let (frame_rate, video_time, video_start) = {
            let video = video.borrow();
            (video.frame_rate, video.current_time(), video.start_time().unwrap_or(0.0))
        };

        let target = (now - self.start_time) + video_start;
        let late = target - video_time;
        if late <= 0.0 {
            return Ok(false);
        }

        let mut underflow = false;
        if decode_video_step(video)? {
            self.render_current_frame()?;
        }
        else {
            underflow = true;
        }

        // After a long stall, jump the clock forward instead of fast-forwarding through every
        // missed frame.
        if frame_rate > 0.0 && late > 2.0 / frame_rate {
            self.start_time += late;
        }

        Ok(underflow)
    }

    fn render_current_frame(&mut self) -> Result<()> {
        let Some(video) = &self.video
        else {
            return Ok(());
        };
        let video = video.borrow();
        let Some((_, planes)) = video.frame()
        else {
            return Ok(());
        };

        if self.last_video_size != (planes.width, planes.height) {
            self.last_video_size = (planes.width, planes.height);
            self.renderer.resize(planes.width, planes.height);
        }

        if self.renderer.enabled() {
            self.renderer.render(&VideoFrame {
                width: planes.width,
                height: planes.height,
                y: &planes.y,
                cb: &planes.cb,
                cr: &planes.cr,
            })?;
        }

        Ok(())
    }
}

/// Runs one video decode step, treating malformed-stream errors as a dropped picture rather
/// than a failure.
fn decode_video_step(video: &Rc<RefCell<Mpeg1Decoder>>) -> Result<bool> {
    match video.borrow_mut().decode() {
        Ok(produced) => Ok(produced),
        Err(CastError::Decode(msg)) | Err(CastError::Unsupported(msg)) => {
            warn!("video: dropping picture: {msg}");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn decode_audio_step(audio: &Rc<RefCell<Mp2Decoder>>) -> Result<bool> {
    match audio.borrow_mut().decode() {
        Ok(progressed) => Ok(progressed),
        Err(CastError::Decode(msg)) | Err(CastError::Unsupported(msg)) => {
            warn!("audio: dropping frame: {msg}");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}
