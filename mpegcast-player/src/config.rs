// mpegcast-player
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Player configuration.

use mpegcast_codec_mp2::DEFAULT_AUDIO_BUFFER_SIZE;
use mpegcast_codec_mpeg1::DEFAULT_VIDEO_BUFFER_SIZE;

/// Options controlling player wiring and scheduling.
///
/// The `Default` values suit playback of a fully stored file; streaming sources flip
/// [`streaming`](Self::streaming) (and with it the decoder buffers' eviction behavior and
/// autoplay).
#[derive(Clone, Debug)]
pub struct PlayerConfig {
    /// Decode and render video.
    pub video: bool,
    /// Decode and play audio.
    pub audio: bool,
    /// Treat the source as live: decoder bit-buffers evict instead of growing, and each tick
    /// decodes whatever has arrived rather than pacing against the clock.
    pub streaming: bool,
    /// Seek back to the start and keep playing when a stored file reaches its end.
    pub loop_playback: bool,
    /// Begin playback as soon as the source is established. Forced on when streaming.
    pub autoplay: bool,
    /// How far ahead, in seconds, the audio output may be enqueued before the player throttles
    /// it.
    pub max_audio_lag: f64,
    /// Capacity of the video decoder's bit buffer, in bytes.
    pub video_buffer_size: usize,
    /// Capacity of the audio decoder's bit buffer, in bytes.
    pub audio_buffer_size: usize,
    /// Decode and render the first video frame as soon as it is available, before playback
    /// starts, so a poster frame appears.
    pub decode_first_frame: bool,
    /// Preferred fetch size, in bytes, passed through to progressive sources.
    pub chunk_size: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            video: true,
            audio: true,
            streaming: false,
            loop_playback: true,
            autoplay: false,
            max_audio_lag: 0.25,
            video_buffer_size: DEFAULT_VIDEO_BUFFER_SIZE,
            audio_buffer_size: DEFAULT_AUDIO_BUFFER_SIZE,
            decode_first_frame: true,
            chunk_size: 1024 * 1024,
        }
    }
}

impl PlayerConfig {
    pub fn with_video(mut self, video: bool) -> Self {
        self.video = video;
        self
    }

    pub fn with_audio(mut self, audio: bool) -> Self {
        self.audio = audio;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_loop(mut self, loop_playback: bool) -> Self {
        self.loop_playback = loop_playback;
        self
    }

    pub fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    pub fn with_max_audio_lag(mut self, seconds: f64) -> Self {
        self.max_audio_lag = seconds;
        self
    }

    pub fn with_decode_first_frame(mut self, decode_first_frame: bool) -> Self {
        self.decode_first_frame = decode_first_frame;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PlayerConfig::default();
        assert!(config.video);
        assert!(config.audio);
        assert!(!config.streaming);
        assert!(config.loop_playback);
        assert!(!config.autoplay);
        assert_eq!(config.max_audio_lag, 0.25);
        assert_eq!(config.video_buffer_size, 512 * 1024);
        assert_eq!(config.audio_buffer_size, 128 * 1024);
        assert!(config.decode_first_frame);
        assert_eq!(config.chunk_size, 1024 * 1024);
    }
}
