//! drill: loop sections of an audio file for practice.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use drill_core::{
    Chunk, DEFAULT_CHUNK_SECONDS, DeviceBackend, EngineController, Notification, PlayerConfig,
    slice_chunks,
};
use tracing::{error, info, warn};

mod intent;

use intent::{HELP, Intent, parse_intent};

const POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(name = "drill")]
#[command(about = "Chunked repeat playback for practising along with a recording")]
#[command(version)]
struct Args {
    /// Audio file to play
    path: PathBuf,

    /// Chunk length in seconds
    #[arg(short, long)]
    chunk_seconds: Option<f64>,

    /// Repetitions of every chunk
    #[arg(short, long)]
    repeat: Option<u32>,

    /// Repetitions of the whole chunk list in play-all
    #[arg(short, long)]
    global_repeat: Option<u32>,

    /// Initial playback rate
    #[arg(long)]
    rate: Option<f64>,

    /// Config file to use instead of the user config directory
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> PlayerConfig {
        let base = match &self.config {
            Some(path) => PlayerConfig::from_path(path).unwrap_or_else(|err| {
                warn!(path = %path.display(), %err, "ignoring config file");
                PlayerConfig::default()
            }),
            None => PlayerConfig::load(),
        };
        PlayerConfig {
            chunk_seconds: self.chunk_seconds.unwrap_or(base.chunk_seconds),
            default_repeat: self.repeat.unwrap_or(base.default_repeat),
            global_repeat: self.global_repeat.unwrap_or(base.global_repeat),
            default_rate: self.rate.unwrap_or(base.default_rate),
            ..base
        }
        .sanitized()
    }
}

struct Player {
    controller: EngineController<DeviceBackend>,
    chunks: Vec<Chunk>,
    global_repeat: u32,
}

impl Player {
    /// Returns false once the user asked to quit.
    fn apply(&mut self, intent: Intent) -> bool {
        match intent {
            Intent::Toggle => self.controller.toggle_pause(),
            Intent::PlayChunk(n) => {
                if !self.controller.play_chunk_at(&self.chunks, n - 1) {
                    println!("no chunk {n}, there are {}", self.chunks.len());
                }
            }
            Intent::PlayAll => self.controller.play_all(&self.chunks, self.global_repeat),
            Intent::Pause => self.controller.pause(),
            Intent::Resume => self.controller.resume(),
            Intent::Stop => self.controller.stop(),
            Intent::Rate(rate) => self.controller.set_rate(rate),
            Intent::Repeat { chunk, count } => match self.chunks.get_mut(chunk - 1) {
                Some(slot) => {
                    *slot = slot.with_repeat(count);
                    println!("chunk {chunk} now plays {count}x");
                }
                None => println!("no chunk {chunk}, there are {}", self.chunks.len()),
            },
            Intent::GlobalRepeat(count) => {
                self.global_repeat = count;
                println!("play-all repeats the list {count}x");
            }
            Intent::List => self.list(),
            Intent::Status => println!("{}", self.controller.snapshot()),
            Intent::Help => println!("{HELP}"),
            Intent::Quit => {
                self.controller.stop();
                return false;
            }
        }
        true
    }

    fn list(&self) {
        for chunk in &self.chunks {
            println!(
                "{:>4}  {:>7.2}s - {:>7.2}s  x{}",
                chunk.index(),
                chunk.start(),
                chunk.end(),
                chunk.repeat()
            );
        }
        println!("global repeat x{}", self.global_repeat);
    }

    fn report(&mut self) {
        for notification in self.controller.drain_notifications() {
            match notification {
                Notification::StateChanged(snapshot) => info!("{snapshot}"),
                Notification::SegmentStarted { index, segment } => info!(
                    index,
                    chunk = segment.chunk,
                    "segment {:.2}s-{:.2}s",
                    segment.start,
                    segment.end
                ),
                Notification::Finished => println!("finished"),
                Notification::Error(err) => error!("{err}"),
            }
        }
    }
}

/// Forward stdin lines to the poll loop. The channel closes on EOF.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drill=info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.config();

    let (controller, audio) = EngineController::from_file(&args.path, &config)?;
    let chunks = slice_chunks(
        audio.duration_secs(),
        config.chunk_seconds,
        DEFAULT_CHUNK_SECONDS,
        config.default_repeat,
    );
    info!(
        path = %args.path.display(),
        chunks = chunks.len(),
        "ready, press h for help"
    );

    let mut player = Player {
        controller,
        chunks,
        global_repeat: config.global_repeat,
    };
    player.list();

    let input = spawn_stdin_reader();
    loop {
        match input.try_recv() {
            Ok(line) => match parse_intent(&line) {
                Ok(intent) => {
                    if !player.apply(intent) {
                        break;
                    }
                }
                Err(err) => println!("{err}"),
            },
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                player.controller.stop();
                break;
            }
        }

        player.controller.tick();
        player.report();
        thread::sleep(POLL_INTERVAL);
    }

    player.report();
    Ok(())
}
