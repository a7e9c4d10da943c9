// mpegcast Play Tool
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::{Arg, ArgAction};
use log::info;

use mpegcast::core::Result;
use mpegcast::player::{AudioOutput, Player, PlayerConfig, Renderer, Source, VideoFrame};

/// Simulated frame-pacing interval. The player is driven as fast as the decoders allow; this
/// only sets the granularity of the synthetic clock handed to `tick`.
const TICK_SECONDS: f64 = 1.0 / 60.0;

/// A fully buffered file presented as a chunked progressive source. Chunks are released one at
/// a time and the next one only when the player's readahead headroom calls for it, so the
/// scheduling matches what a ranged-HTTP source would see.
struct FileSource {
    data: Vec<u8>,
    offset: usize,
    chunk_size: usize,
    want_more: bool,
    /// Seconds the previous chunk took to arrive. Effectively zero for a local file, but kept
    /// in the readahead rule so it matches a networked chunk fetcher.
    last_load_time: f64,
}

impl FileSource {
    fn open(path: &Path, chunk_size: usize) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        if data.is_empty() {
            return Err(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "input file is empty"));
        }
        Ok(FileSource { data, offset: 0, chunk_size: chunk_size.max(1), want_more: true, last_load_time: 0.0 })
    }
}

impl Source for FileSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn poll(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.want_more || self.offset >= self.data.len() {
            return Ok(None);
        }
        self.want_more = false;
        let end = (self.offset + self.chunk_size).min(self.data.len());
        let chunk = self.data[self.offset..end].to_vec();
        self.offset = end;
        Ok(Some(chunk))
    }

    fn resume(&mut self, headroom_seconds: f64) -> Result<()> {
        let worst_case_loading_time = 8.0 * self.last_load_time + 2.0;
        if worst_case_loading_time > headroom_seconds {
            self.want_more = true;
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.data.clear();
        self.offset = 0;
    }

    fn established(&self) -> bool {
        self.offset > 0
    }

    fn completed(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn progress(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        }
        else {
            self.offset as f64 / self.data.len() as f64
        }
    }
}

/// Appends every rendered frame's planes to a raw planar YUV 4:2:0 file.
struct YuvFileRenderer {
    out: BufWriter<File>,
    frames: usize,
    size: (usize, usize),
}

impl YuvFileRenderer {
    fn create(path: &Path) -> std::io::Result<Self> {
        Ok(YuvFileRenderer { out: BufWriter::new(File::create(path)?), frames: 0, size: (0, 0) })
    }
}

impl Renderer for YuvFileRenderer {
    fn render(&mut self, frame: &VideoFrame<'_>) -> Result<()> {
        self.out.write_all(frame.y)?;
        self.out.write_all(frame.cb)?;
        self.out.write_all(frame.cr)?;
        self.frames += 1;
        Ok(())
    }

    fn render_progress(&mut self, progress: f64) {
        info!("loading: {:.0}%", progress * 100.0);
    }

    fn resize(&mut self, width: usize, height: usize) {
        info!("video: {}x{}", width, height);
        self.size = (width, height);
    }
}

/// Collects decoded PCM and writes it out as a 16-bit WAV file when playback finishes.
struct WavFileAudioOutput {
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
    enabled: bool,
}

impl WavFileAudioOutput {
    fn new() -> Self {
        WavFileAudioOutput { sample_rate: 0, channels: 2, samples: Vec::new(), enabled: true }
    }

    fn write_wav(&self, path: &Path) -> std::io::Result<()> {
        let mut out = BufWriter::new(File::create(path)?);
        let data_len = (self.samples.len() * 2) as u32;
        let sample_rate = self.sample_rate.max(1);
        let byte_rate = sample_rate * u32::from(self.channels) * 2;

        out.write_all(b"RIFF")?;
        out.write_all(&(36 + data_len).to_le_bytes())?;
        out.write_all(b"WAVE")?;
        out.write_all(b"fmt ")?;
        out.write_all(&16u32.to_le_bytes())?;
        out.write_all(&1u16.to_le_bytes())?; // PCM
        out.write_all(&self.channels.to_le_bytes())?;
        out.write_all(&sample_rate.to_le_bytes())?;
        out.write_all(&byte_rate.to_le_bytes())?;
        out.write_all(&(self.channels * 2).to_le_bytes())?; // block align
        out.write_all(&16u16.to_le_bytes())?; // bits per sample
        out.write_all(b"data")?;
        out.write_all(&data_len.to_le_bytes())?;
        for sample in &self.samples {
            out.write_all(&sample.to_le_bytes())?;
        }
        Ok(())
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

impl AudioOutput for WavFileAudioOutput {
    fn play(&mut self, sample_rate: u32, left: &[f32], right: &[f32]) -> Result<()> {
        self.sample_rate = sample_rate;
        if right.is_empty() {
            self.channels = 1;
            self.samples.extend(left.iter().copied().map(to_i16));
        }
        else {
            self.channels = 2;
            for (&l, &r) in left.iter().zip(right) {
                self.samples.push(to_i16(l));
                self.samples.push(to_i16(r));
            }
        }
        Ok(())
    }

    fn stop(&mut self) {}

    fn enqueued_time(&self) -> f64 {
        // A file sink plays instantly; the player will decode as fast as the source delivers.
        0.0
    }

    fn reset_enqueued_time(&mut self) {}

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn enabled(&self) -> bool {
        self.enabled
    }
}

struct PlayOptions {
    input: PathBuf,
    output_base: String,
    video: bool,
    audio: bool,
    loop_playback: bool,
    chunk_size: usize,
}

fn run(opts: &PlayOptions) -> Result<()> {
    let source = FileSource::open(&opts.input, opts.chunk_size)?;

    let renderer = Rc::new(RefCell::new(YuvFileRenderer::create(&PathBuf::from(format!(
        "{}.yuv",
        opts.output_base
    )))?));

    let audio_out = opts.audio.then(|| Rc::new(RefCell::new(WavFileAudioOutput::new())));

    let config = PlayerConfig::default()
        .with_video(opts.video)
        .with_audio(opts.audio)
        .with_loop(opts.loop_playback);

    let mut player = Player::new(
        Box::new(source),
        Box::new(renderer.clone()),
        audio_out.clone().map(|out| Box::new(out) as Box<dyn AudioOutput>),
        config,
    );

    player.play()?;
    let mut now = 0.0;
    while player.wants_to_play() {
        player.tick(now)?;
        now += TICK_SECONDS;
    }
    player.destroy();

    {
        let renderer = renderer.borrow();
        let (width, height) = renderer.size;
        println!("video: {} frames at {}x{} -> {}.yuv", renderer.frames, width, height, opts.output_base);
    }

    if let Some(out) = audio_out {
        let out = out.borrow();
        let seconds = if out.sample_rate > 0 {
            out.samples.len() as f64 / f64::from(out.channels) / f64::from(out.sample_rate)
        }
        else {
            0.0
        };
        let path = PathBuf::from(format!("{}.wav", opts.output_base));
        out.write_wav(&path)?;
        println!("audio: {:.2}s at {} Hz -> {}", seconds, out.sample_rate, path.display());
    }

    Ok(())
}

fn main() {
    pretty_env_logger::init();

    let matches = clap::Command::new("mpegcast Play")
        .version("0.1")
        .about("Decode an MPEG transport stream to raw YUV 4:2:0 and WAV files")
        .arg(Arg::new("no-video").long("no-video").action(ArgAction::SetTrue).help("Skip video decoding"))
        .arg(Arg::new("no-audio").long("no-audio").action(ArgAction::SetTrue).help("Skip audio decoding"))
        .arg(
            Arg::new("loop")
                .long("loop")
                .action(ArgAction::SetTrue)
                .help("Restart from the beginning at end of stream (stop with ctrl-c)"),
        )
        .arg(
            Arg::new("chunk-size")
                .long("chunk-size")
                .value_parser(clap::value_parser!(usize))
                .default_value("1048576")
                .help("Source chunk size in bytes"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .default_value("out")
                .help("Output base name; <name>.yuv and <name>.wav are written"),
        )
        .arg(Arg::new("INPUT").help("The input transport stream path").required(true).index(1))
        .get_matches();

    let opts = PlayOptions {
        input: PathBuf::from(matches.get_one::<String>("INPUT").unwrap()),
        output_base: matches.get_one::<String>("output").unwrap().clone(),
        video: !matches.get_flag("no-video"),
        audio: !matches.get_flag("no-audio"),
        loop_playback: matches.get_flag("loop"),
        chunk_size: *matches.get_one::<usize>("chunk-size").unwrap(),
    };

    if !opts.video && !opts.audio {
        eprintln!("nothing to do: both video and audio are disabled");
        process::exit(1);
    }

    if let Err(err) = run(&opts) {
        eprintln!("playback failed: {err}");
        process::exit(1);
    }
}
