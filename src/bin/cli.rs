//! famiplay CLI: real-time playback and WAV export of the demo song.
//!
//! Usage:
//!   fp-cli
//!   fp-cli --loop none --start-frame 16
//!   fp-cli --wav output.wav

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use fp_audio::{AudioSink, CpalSink};
use fp_ir::demo::demo_project;
use fp_master::{
    render_song, samples_to_wav, LoopMode, Player, PlayerConfig, Project, SoftApu, SAMPLE_RATE,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fp-cli", about = "Play the famiplay demo song")]
struct Args {
    /// Render to a WAV file instead of playing
    #[arg(long, value_name = "PATH")]
    wav: Option<PathBuf>,

    /// Loop behavior at the end of the song or pattern
    #[arg(long = "loop", value_enum, default_value_t = LoopArg::None)]
    loop_mode: LoopArg,

    /// Stop after this many frames (60.0988 per second)
    #[arg(long)]
    frames: Option<u32>,

    /// Song frame (note index) to start playback from
    #[arg(long, default_value_t = 0)]
    start_frame: u32,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoopArg {
    None,
    Song,
    Pattern,
}

impl From<LoopArg> for LoopMode {
    fn from(arg: LoopArg) -> Self {
        match arg {
            LoopArg::None => LoopMode::None,
            LoopArg::Song => LoopMode::Song,
            LoopArg::Pattern => LoopMode::Pattern,
        }
    }
}

/// Longest offline render, in frames (five minutes).
const MAX_RENDER_FRAMES: usize = 60 * 5 * 60;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let project = demo_project();

    let song = &project.songs[0];
    println!("Title:    {}", song.name);
    println!("Channels: {}", project.active_channel_count());
    println!("Patterns: {} x {} notes", song.length, song.pattern_length);
    println!("Tempo:    {}, Speed: {}", song.tempo, song.speed);
    println!("DPCM:     {} sample(s)", project.dpcm_samples.len());
    println!();

    match args.wav {
        Some(ref path) => render_to_wav(&project, path, args.frames),
        None => play_audio(&project, &args),
    }
}

fn play_audio(project: &Project, args: &Args) -> Result<()> {
    let config = PlayerConfig { loop_mode: args.loop_mode.into(), ..PlayerConfig::default() };
    let mut player = Player::new(SoftApu::new(), config);

    player
        .initialize(|config, fill| {
            let sink: Box<dyn AudioSink> = Box::new(CpalSink::open(config, fill)?);
            Ok(sink)
        })
        .context("failed to open audio output")?;

    player.play_from(project, 0, args.start_frame)?;
    info!(loop_mode = ?config.loop_mode, "playing");

    let song = &project.songs[0];
    while player.is_playing() {
        if let Some(frame) = player.current_frame() {
            if args.frames.is_some_and(|limit| frame >= args.start_frame + limit) {
                break;
            }
            let pattern_length = song.pattern_length.max(1) as u32;
            print!("\rPat: {:02} | Note: {:02}", frame / pattern_length, frame % pattern_length);
            let _ = std::io::stdout().flush();
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    // Let the sink drain what was queued before the song ended.
    if player.is_finished() {
        std::thread::sleep(Duration::from_millis(100));
    }
    player.shutdown();

    let stats = player.stats();
    println!("\rDone.                    ");
    info!(
        produced = stats.chunks_produced,
        consumed = stats.chunks_consumed,
        underruns = stats.underruns,
        "playback finished"
    );
    Ok(())
}

fn render_to_wav(project: &Project, path: &Path, frames: Option<u32>) -> Result<()> {
    let max_frames = frames.map_or(MAX_RENDER_FRAMES, |f| f as usize);
    println!("Rendering to {} at {} Hz...", path.display(), SAMPLE_RATE);

    let samples = render_song(project, 0, &mut SoftApu::new(), max_frames)?;
    let wav = samples_to_wav(&samples, SAMPLE_RATE);
    println!("Rendered {} samples ({} bytes)", samples.len(), wav.len());

    std::fs::write(path, &wav).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Done.");
    Ok(())
}
