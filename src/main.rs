use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rigo_avatar::voice::{
    AudioSink, AudioSource, HttpCloud, MicCapture, SAMPLE_RATE, SpeakerPlayback, VoiceCloud,
    container, rms,
};
use rigo_avatar::{Config, Daemon};

/// Rigo - animated avatar face with a voice assistant
#[derive(Parser)]
#[command(name = "rigo", version, about)]
struct Cli {
    /// Port for the control surface
    #[arg(long, env = "RIGO_PORT")]
    port: Option<u16>,

    /// Config file (default: ~/.config/rigo/avatar/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (for setups without audio hardware)
    #[arg(long)]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output through the configured endpoint
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,rigo_avatar=info",
        1 => "info,rigo_avatar=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref(), cli.disable_voice)?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }

    // Device tests block on audio I/O and the blocking HTTP client
    if let Some(cmd) = cli.command {
        return tokio::task::spawn_blocking(move || match cmd {
            Command::TestMic { duration } => test_mic(&config, duration),
            Command::TestSpeaker => test_speaker(&config),
            Command::TestTts { text } => test_tts(&config, &text),
        })
        .await?;
    }

    tracing::info!(
        port = config.api_server.port,
        voice = config.voice.enabled,
        "starting rigo avatar"
    );
    tracing::debug!(?config, "loaded configuration");

    Daemon::new(config).run().await?;

    Ok(())
}

/// Test microphone input
fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = MicCapture::open(config.voice.mic_gain)?;
    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    let mut second = vec![0i16; SAMPLE_RATE as usize];
    for i in 0..duration {
        capture.read_frame(&mut second)?;

        let energy = rms(&second);
        let peak = second
            .iter()
            .map(|s| f32::from(s.unsigned_abs()) / 32768.0)
            .fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!(
        "A wake word fires above RMS {:.4}.",
        config.voice.wake_word.threshold
    );

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker(config: &Config) -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = SpeakerPlayback::new(config.voice.speaker_gain)?;

    let sample_rate = 24_000_u32;
    let frequency = 440.0_f32;
    let num_samples = sample_rate as usize * 2;

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    let samples: Vec<i16> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            // 30% volume
            ((2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 * 32767.0) as i16
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);
    playback.play(&samples, sample_rate)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Test TTS output via the configured endpoint
fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let cloud = HttpCloud::from_config(&config.voice)?;

    println!("Synthesizing speech...");
    let bytes = cloud.synthesize(text)?;
    println!("Got {} bytes of audio data", bytes.len());

    let audio = container::decode(&bytes)?;
    println!(
        "Container: {} Hz, {} channel(s), {} payload bytes{}",
        audio.sample_rate,
        audio.channels,
        audio.pcm.len(),
        if audio.is_truncated() { " (truncated)" } else { "" }
    );

    println!("Playing audio...");
    let mut playback = SpeakerPlayback::new(config.voice.speaker_gain)?;
    playback.play(&audio.to_mono(), audio.sample_rate)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
