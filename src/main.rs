use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::{info, warn};

use triggered_wav_player::audio::sink::list_output_devices;
use triggered_wav_player::audio::{AudioPlayer, CpalSink, OutputConfig, PlaybackEngine, WavDecoder};
use triggered_wav_player::config::ConfigManager;
use triggered_wav_player::error::{PlaybackError, PlayerError};
use triggered_wav_player::logging::AudioLogger;
use triggered_wav_player::storage::{BlockStorage, FsStorage};

/// Triggered WAV playback with ping-pong buffering
#[derive(Parser)]
#[command(name = "wavplay")]
#[command(about = "A triggered WAV playback engine with ping-pong buffering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Audio output device name (default device when omitted)
    #[arg(long, global = true)]
    device: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Play a WAV file to completion (Ctrl-C stops)
    Play {
        /// Path to a 16-bit PCM WAV file
        path: PathBuf,
    },
    /// Arm a WAV file and replay it on every Enter keypress
    Watch {
        /// Path to a 16-bit PCM WAV file
        path: PathBuf,
    },
    /// Decode and print a WAV file's header without playing it
    Info {
        /// Path to a WAV file
        path: PathBuf,
    },
    /// List available audio output devices
    Devices,
}

fn main() {
    // Default to quiet output; WAVPLAY_LOG_LEVEL overrides
    if std::env::var("WAVPLAY_LOG_LEVEL").is_err() {
        std::env::set_var("WAVPLAY_LOG_LEVEL", "warn");
    }
    if let Err(err) = AudioLogger::init() {
        eprintln!("Warning: failed to initialize logging: {}", err);
    }

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {}", err.user_message());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), PlayerError> {
    match cli.command {
        Commands::Play { path } => cmd_play(path, cli.device),
        Commands::Watch { path } => cmd_watch(path, cli.device),
        Commands::Info { path } => cmd_info(&path),
        Commands::Devices => cmd_devices(),
    }
}

/// Build the output sink from saved config plus command-line overrides.
fn open_sink(device_override: Option<String>) -> Result<(CpalSink, OutputConfig, usize), PlayerError> {
    let config_manager = ConfigManager::new()?;
    let config = config_manager.get_config();

    let output = OutputConfig {
        sample_rate: config.sample_rate,
        device: device_override.or_else(|| config.preferred_device.clone()),
    };
    let sink = CpalSink::open(&output)?;
    Ok((sink, output, config.slot_capacity))
}

fn cmd_play(path: PathBuf, device_override: Option<String>) -> Result<(), PlayerError> {
    let (sink, output, slot_capacity) = open_sink(device_override)?;

    let mut engine = PlaybackEngine::new(
        Box::new(FsStorage),
        Box::new(sink),
        slot_capacity,
        output.sample_rate,
    )?;

    // Ctrl-C reaches the engine through the interrupt-safe gateway path
    let gateway = engine.gateway();
    if let Err(err) = ctrlc::set_handler(move || gateway.request_stop()) {
        warn!("Could not install Ctrl-C handler: {}", err);
    }

    let logger = AudioLogger::new();
    logger.log_playback_started(&path.display().to_string());

    engine.play(&path)?;

    let underruns = engine.underruns();
    logger.log_playback_stopped(&path.display().to_string(), underruns);
    if underruns > 0 {
        logger.log_underruns(underruns);
        println!("Done (underruns: {})", underruns);
    } else {
        println!("Done");
    }
    Ok(())
}

fn cmd_watch(path: PathBuf, device_override: Option<String>) -> Result<(), PlayerError> {
    let (sink, output, slot_capacity) = open_sink(device_override)?;

    let mut player = AudioPlayer::new(
        Box::new(FsStorage),
        Box::new(sink),
        slot_capacity,
        output.sample_rate,
    )?;
    player.start().map_err(PlayerError::Playback)?;
    player.set_trigger_file(&path);

    // Ctrl-C stops the current playback without leaving watch mode
    let gateway = player.gateway();
    if let Err(err) = ctrlc::set_handler(move || gateway.request_stop()) {
        warn!("Could not install Ctrl-C handler: {}", err);
    }

    let logger = AudioLogger::new();
    println!("Armed: {}", path.display());
    println!("Press Enter to play, 'q' + Enter to quit.");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| PlayerError::Playback(PlaybackError::Io(e)))?;
        if line.trim() == "q" {
            break;
        }
        logger.log_trigger_received(&path.display().to_string());
        player.trigger_playback();
        print!("> ");
        let _ = io::stdout().flush();
    }

    player.shutdown();
    let underruns = player.underruns();
    if underruns > 0 {
        println!("Underruns this session: {}", underruns);
    }
    Ok(())
}

fn cmd_info(path: &PathBuf) -> Result<(), PlayerError> {
    let storage = FsStorage;
    let mut reader = storage.open(path).map_err(PlayerError::Playback)?;
    let format = WavDecoder::decode(reader.as_mut())
        .map_err(|e| PlayerError::Playback(PlaybackError::Decode(e)))?;

    info!("Decoded header of {}", path.display());
    println!("File:            {}", path.display());
    println!("Channels:        {}", format.channels);
    println!("Sample rate:     {} Hz", format.sample_rate);
    println!("Bits per sample: {}", format.bits_per_sample);
    println!("Block align:     {}", format.block_align);
    println!("Data size:       {} bytes", format.data_size);
    if format.byte_rate > 0 {
        let seconds = f64::from(format.data_size) / f64::from(format.byte_rate);
        println!("Duration:        {:.2} s", seconds);
    }
    Ok(())
}

fn cmd_devices() -> Result<(), PlayerError> {
    let devices = list_output_devices().map_err(PlayerError::Sink)?;
    if devices.is_empty() {
        println!("No output devices found.");
    } else {
        for name in devices {
            println!("{}", name);
        }
    }
    Ok(())
}
