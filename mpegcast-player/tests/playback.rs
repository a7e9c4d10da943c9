// mpegcast-player
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end scheduling tests: an in-memory transport stream of silent Layer II audio frames
//! driven through the full source -> demuxer -> decoder -> output pipeline.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use mpegcast_core::Result;
use mpegcast_player::{AudioOutput, Player, PlayerConfig, Renderer, Source, VideoFrame};

// -- Stream fixtures ---------------------------------------------------------------------------

/// 128 kbps stereo at 44.1 kHz: 144000 * 128 / 44100 = 417 bytes per frame.
const FRAME_BYTES: usize = 417;
const SAMPLES_PER_FRAME: usize = 1152;
const FRAME_SECONDS: f64 = SAMPLES_PER_FRAME as f64 / 44100.0;

/// A silent MPEG-1 Layer II stereo frame: a valid header followed by all-zero bit allocations.
fn silent_mp2_frame() -> Vec<u8> {
    let mut frame = vec![0xFF, 0xFD, 0x80, 0x04];
    frame.resize(FRAME_BYTES, 0);
    frame
}

fn pes_bytes(stream_id: u8, pts_90k: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x01, stream_id];
    let header_data_len: usize = if pts_90k.is_some() { 5 } else { 0 };
    let packet_length = (3 + header_data_len + payload.len()) as u16;
    out.push((packet_length >> 8) as u8);
    out.push((packet_length & 0xFF) as u8);
    out.push(0x80);
    out.push(if pts_90k.is_some() { 0x80 } else { 0x00 });
    out.push(header_data_len as u8);
    if let Some(ticks) = pts_90k {
        let top = ((ticks >> 30) & 0x7) as u8;
        let mid = ((ticks >> 15) & 0x7FFF) as u16;
        let low = (ticks & 0x7FFF) as u16;
        out.push(0x21 | (top << 1));
        out.push((mid >> 7) as u8);
        out.push((((mid & 0x7F) << 1) | 1) as u8);
        out.push((low >> 7) as u8);
        out.push((((low & 0x7F) << 1) | 1) as u8);
    }
    out.extend_from_slice(payload);
    out
}

/// Wraps one PES packet into as many 188-byte transport packets as it needs.
fn ts_packets(pid: u16, pes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, chunk) in pes.chunks(184).enumerate() {
        let mut pkt = vec![0u8; 188];
        pkt[0] = 0x47;
        pkt[1] = (((i == 0) as u8) << 6) | ((pid >> 8) as u8 & 0x1F);
        pkt[2] = (pid & 0xFF) as u8;
        pkt[3] = 0x10 | ((i as u8) & 0x0F);
        pkt[4..4 + chunk.len()].copy_from_slice(chunk);
        out.extend_from_slice(&pkt);
    }
    out
}

/// A transport stream of `frames` silent audio frames on PID 0x100 / stream id 0xC0, with
/// consecutive presentation timestamps starting at zero.
fn silent_audio_ts(frames: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..frames {
        let pts = (i as f64 * FRAME_SECONDS * 90_000.0).round() as u64;
        let pes = pes_bytes(0xC0, Some(pts), &silent_mp2_frame());
        out.extend_from_slice(&ts_packets(0x100, &pes));
    }
    out
}

// -- Collaborator fakes ------------------------------------------------------------------------

#[derive(Default)]
struct SourceState {
    chunks: VecDeque<Vec<u8>>,
    established: bool,
    completed: bool,
    progress: f64,
    resume_headroom: Vec<f64>,
    destroyed: bool,
}

#[derive(Clone)]
struct FakeSource(Rc<RefCell<SourceState>>);

impl FakeSource {
    fn with_bytes(bytes: Vec<u8>, completed: bool) -> Self {
        let mut state = SourceState {
            established: true,
            completed,
            progress: 1.0,
            ..SourceState::default()
        };
        state.chunks.push_back(bytes);
        FakeSource(Rc::new(RefCell::new(state)))
    }

    fn unestablished(progress: f64) -> Self {
        let state = SourceState { progress, ..SourceState::default() };
        FakeSource(Rc::new(RefCell::new(state)))
    }
}

impl Source for FakeSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.0.borrow_mut().chunks.pop_front())
    }

    fn resume(&mut self, headroom_seconds: f64) -> Result<()> {
        self.0.borrow_mut().resume_headroom.push(headroom_seconds);
        Ok(())
    }

    fn destroy(&mut self) {
        self.0.borrow_mut().destroyed = true;
    }

    fn established(&self) -> bool {
        self.0.borrow().established
    }

    fn completed(&self) -> bool {
        self.0.borrow().completed
    }

    fn progress(&self) -> f64 {
        self.0.borrow().progress
    }
}

#[derive(Default)]
struct RendererState {
    progress_calls: Vec<f64>,
    frames: usize,
    size: Option<(usize, usize)>,
}

#[derive(Clone)]
struct FakeRenderer(Rc<RefCell<RendererState>>);

impl FakeRenderer {
    fn new() -> Self {
        FakeRenderer(Rc::new(RefCell::new(RendererState::default())))
    }
}

impl Renderer for FakeRenderer {
    fn render(&mut self, _frame: &VideoFrame<'_>) -> Result<()> {
        self.0.borrow_mut().frames += 1;
        Ok(())
    }

    fn render_progress(&mut self, progress: f64) {
        self.0.borrow_mut().progress_calls.push(progress);
    }

    fn resize(&mut self, width: usize, height: usize) {
        self.0.borrow_mut().size = Some((width, height));
    }
}

struct AudioOutState {
    enabled: bool,
    enqueued: f64,
    /// When non-zero, every `play` pretends to enqueue this many seconds regardless of the
    /// frame's real duration.
    enqueue_per_play: f64,
    plays: usize,
    samples: usize,
    resets: usize,
    stops: usize,
}

impl Default for AudioOutState {
    fn default() -> Self {
        AudioOutState {
            enabled: true,
            enqueued: 0.0,
            enqueue_per_play: 0.0,
            plays: 0,
            samples: 0,
            resets: 0,
            stops: 0,
        }
    }
}

#[derive(Clone)]
struct FakeAudioOut(Rc<RefCell<AudioOutState>>);

impl FakeAudioOut {
    fn new() -> Self {
        FakeAudioOut(Rc::new(RefCell::new(AudioOutState::default())))
    }

    fn with_enqueue_per_play(seconds: f64) -> Self {
        let out = Self::new();
        out.0.borrow_mut().enqueue_per_play = seconds;
        out
    }
}

impl AudioOutput for FakeAudioOut {
    fn play(&mut self, sample_rate: u32, left: &[f32], _right: &[f32]) -> Result<()> {
        let mut state = self.0.borrow_mut();
        state.plays += 1;
        state.samples += left.len();
        state.enqueued += if state.enqueue_per_play > 0.0 {
            state.enqueue_per_play
        }
        else {
            left.len() as f64 / f64::from(sample_rate)
        };
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = self.0.borrow_mut();
        state.stops += 1;
        state.enqueued = 0.0;
    }

    fn enqueued_time(&self) -> f64 {
        self.0.borrow().enqueued
    }

    fn reset_enqueued_time(&mut self) {
        let mut state = self.0.borrow_mut();
        state.enqueued = 0.0;
        state.resets += 1;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.0.borrow_mut().enabled = enabled;
    }

    fn enabled(&self) -> bool {
        self.0.borrow().enabled
    }
}

// -- Scenarios ---------------------------------------------------------------------------------

#[test]
fn unestablished_source_only_reports_progress() {
    let source = FakeSource::unestablished(0.3);
    let renderer = FakeRenderer::new();

    let mut player = Player::new(
        Box::new(source),
        Box::new(renderer.clone()),
        None,
        PlayerConfig::default(),
    );
    player.play().unwrap();
    player.tick(0.0).unwrap();

    let state = renderer.0.borrow();
    assert_eq!(state.progress_calls, vec![0.3]);
    assert_eq!(state.frames, 0);
    assert!(!player.is_playing());
}

#[test]
fn streaming_throttles_audio_output_past_max_lag() {
    let source = FakeSource::with_bytes(silent_audio_ts(3), false);
    let renderer = FakeRenderer::new();
    let audio_out = FakeAudioOut::with_enqueue_per_play(0.5);

    let config = PlayerConfig::default()
        .with_video(false)
        .with_streaming(true)
        .with_max_audio_lag(0.1);
    let mut player = Player::new(
        Box::new(source),
        Box::new(renderer),
        Some(Box::new(audio_out.clone())),
        config,
    );

    // Streaming forces autoplay; the first tick plays one frame, overshoots the lag budget,
    // then throttles the output while continuing to consume the remaining frames.
    player.tick(0.0).unwrap();
    {
        let state = audio_out.0.borrow();
        assert!(!state.enabled);
        assert_eq!(state.resets, 1);
        assert_eq!(state.plays, 1);
        assert_eq!(state.enqueued, 0.0);
    }

    // With the backlog drained the next tick re-admits the output.
    player.tick(0.1).unwrap();
    assert!(audio_out.0.borrow().enabled);
}

#[test]
fn stored_playback_loops_at_end_of_stream() {
    let frames = 3;
    let source = FakeSource::with_bytes(silent_audio_ts(frames), true);
    let renderer = FakeRenderer::new();
    let audio_out = FakeAudioOut::new();

    let config = PlayerConfig::default().with_video(false).with_loop(true);
    let mut player = Player::new(
        Box::new(source.clone()),
        Box::new(renderer),
        Some(Box::new(audio_out.clone())),
        config,
    );
    player.play().unwrap();

    player.tick(0.0).unwrap();
    assert_eq!(audio_out.0.borrow().samples, frames * SAMPLES_PER_FRAME);
    // End of stream with loop enabled: the player seeks back to zero and keeps going.
    assert!(player.wants_to_play());
    assert!(player.current_time() < FRAME_SECONDS);

    player.tick(0.1).unwrap();
    assert_eq!(audio_out.0.borrow().samples, 2 * frames * SAMPLES_PER_FRAME);
    assert!(player.wants_to_play());
}

#[test]
fn stored_playback_pauses_at_end_of_stream_without_loop() {
    let source = FakeSource::with_bytes(silent_audio_ts(2), true);
    let renderer = FakeRenderer::new();
    let audio_out = FakeAudioOut::new();

    let config = PlayerConfig::default().with_video(false).with_loop(false);
    let mut player = Player::new(
        Box::new(source),
        Box::new(renderer),
        Some(Box::new(audio_out.clone())),
        config,
    );
    player.play().unwrap();
    player.tick(0.0).unwrap();

    assert!(!player.wants_to_play());
    assert!(audio_out.0.borrow().stops > 0);
}

#[test]
fn resyncs_and_plays_through_leading_garbage() {
    let frames = 2;
    let mut bytes = vec![0xABu8; 200];
    bytes.extend_from_slice(&silent_audio_ts(frames));
    // Null packets give the resync scan enough confirmed sync bytes to lock on.
    for _ in 0..8 {
        bytes.extend_from_slice(&ts_packets(0x1FFF, &[0u8; 184]));
    }

    let source = FakeSource::with_bytes(bytes, false);
    let renderer = FakeRenderer::new();
    let audio_out = FakeAudioOut::new();

    let config = PlayerConfig::default().with_video(false).with_loop(false);
    let mut player = Player::new(
        Box::new(source),
        Box::new(renderer),
        Some(Box::new(audio_out.clone())),
        config,
    );
    player.play().unwrap();
    player.tick(0.0).unwrap();

    assert_eq!(audio_out.0.borrow().samples, frames * SAMPLES_PER_FRAME);
}

#[test]
fn source_receives_headroom_backpressure() {
    let source = FakeSource::with_bytes(silent_audio_ts(3), false);
    let renderer = FakeRenderer::new();
    let audio_out = FakeAudioOut::new();

    let config = PlayerConfig::default().with_video(false);
    let mut player = Player::new(
        Box::new(source.clone()),
        Box::new(renderer),
        Some(Box::new(audio_out)),
        config,
    );
    player.play().unwrap();
    player.tick(0.0).unwrap();

    assert!(!source.0.borrow().resume_headroom.is_empty());
}

#[test]
fn destroy_tears_down_the_source() {
    let source = FakeSource::with_bytes(Vec::new(), false);
    let renderer = FakeRenderer::new();

    let mut player =
        Player::new(Box::new(source.clone()), Box::new(renderer), None, PlayerConfig::default());
    player.destroy();

    assert!(source.0.borrow().destroyed);
}
