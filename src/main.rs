use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use voice_bridge::event::{self, EventSender};
use voice_bridge::speech::Unavailable;
use voice_bridge::voice::{
    AudioCapture, MicrophoneRecognizer, SpeakerSynthesizer, Synthesizer, Transcriber, decode_mp3,
    has_input_device, has_output_device, play_blocking,
};
use voice_bridge::{
    Attribution, Capabilities, Config, Coordinator, Event, Phase, Ports, Role, SpeechCapturePort,
    SpeechPlaybackPort, UserAction, WebSocketClient,
};

/// Voice Bridge - talk to a conversational agent by voice or text
#[derive(Parser)]
#[command(name = "voice-bridge", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Agent WebSocket endpoint
    #[arg(long, env = "VOICE_BRIDGE_WS_URL", global = true)]
    url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive conversation (default)
    Chat {
        /// Landing page URL whose utm_* parameters are forwarded
        #[arg(long, conflicts_with = "query")]
        landing_url: Option<String>,

        /// Raw query string whose utm_* parameters are forwarded
        #[arg(long)]
        query: Option<String>,

        /// Disable microphone and speaker
        #[arg(long)]
        text_only: bool,

        /// Emulate a platform user agent (e.g. an iPhone to require an unlock gesture)
        #[arg(long, env = "VOICE_BRIDGE_USER_AGENT")]
        user_agent: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,voice_bridge=info",
        1 => "info,voice_bridge=debug",
        2 => "debug",
        _ => "trace",
    };
    let filter = if cli.verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter))
    } else {
        EnvFilter::new(filter)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = cli.url {
        config.transport.ws_url = url;
    }

    match cli.command.unwrap_or(Command::Chat {
        landing_url: None,
        query: None,
        text_only: false,
        user_agent: None,
    }) {
        Command::Chat {
            landing_url,
            query,
            text_only,
            user_agent,
        } => {
            if let Some(user_agent) = user_agent {
                config.platform.user_agent = user_agent;
            }
            let attribution = match (landing_url, query) {
                (Some(url), _) => Attribution::from_url(&url)?,
                (None, Some(query)) => Attribution::from_query(&query),
                (None, None) => Attribution::default(),
            };
            chat(&config, attribution, text_only).await
        }
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestTts { text } => test_tts(&config, &text).await,
    }
}

type ChatCoordinator =
    Coordinator<Box<dyn SpeechCapturePort>, Box<dyn SpeechPlaybackPort>, WebSocketClient>;

#[allow(clippy::future_not_send)]
async fn chat(config: &Config, attribution: Attribution, text_only: bool) -> anyhow::Result<()> {
    let (tx, mut rx) = event::channel();

    let (capture, playback) = speech_ports(config, text_only, &tx)?;
    let capabilities = Capabilities::detect(
        &config.platform,
        capture.is_some(),
        playback.is_some(),
    );

    let ports = Ports {
        capture: capture.unwrap_or_else(|| Box::new(Unavailable) as Box<dyn SpeechCapturePort>),
        playback: playback.unwrap_or_else(|| Box::new(Unavailable) as Box<dyn SpeechPlaybackPort>),
        socket: WebSocketClient::new(tx.clone()),
    };
    let mut coordinator: ChatCoordinator =
        Coordinator::new(capabilities, config.conversation_settings(), ports, tx.clone());

    print_help(capabilities);
    tokio::spawn(read_commands(tx.clone()));
    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(UserAction::Close.into());
            }
        });
    }

    tx.send(UserAction::Open { attribution }.into())?;

    let mut view = TerminalView::default();
    while let Some(event) = rx.recv().await {
        let closing = matches!(event, Event::User(UserAction::Close));
        coordinator.handle(event);
        view.render(&coordinator);
        if closing && coordinator.phase() == Phase::Closed {
            break;
        }
    }

    Ok(())
}

/// Native speech ports, or `None` where the host lacks the capability
fn speech_ports(
    config: &Config,
    text_only: bool,
    tx: &EventSender,
) -> anyhow::Result<(
    Option<Box<dyn SpeechCapturePort>>,
    Option<Box<dyn SpeechPlaybackPort>>,
)> {
    if text_only {
        return Ok((None, None));
    }
    let Some(api_key) = config.speech_api_key() else {
        tracing::warn!("no OPENAI_API_KEY set, voice disabled");
        return Ok((None, None));
    };
    let audio = &config.audio;

    let capture: Option<Box<dyn SpeechCapturePort>> = if has_input_device() {
        let transcriber =
            Transcriber::new(&audio.api_base, api_key.to_string(), audio.stt_model.clone())?;
        Some(Box::new(MicrophoneRecognizer::new(transcriber, tx.clone())))
    } else {
        tracing::warn!("no microphone found, speech input disabled");
        None
    };

    let playback: Option<Box<dyn SpeechPlaybackPort>> = if has_output_device() {
        let synthesizer = Synthesizer::new(
            &audio.api_base,
            api_key.to_string(),
            audio.tts_model.clone(),
            audio.tts_voice.clone(),
            audio.tts_speed,
        )?;
        Some(Box::new(SpeakerSynthesizer::new(
            synthesizer,
            tx.clone(),
            config.speech.language.clone(),
        )))
    } else {
        tracing::warn!("no speaker found, speech output disabled");
        None
    };

    Ok((capture, playback))
}

/// Translate terminal input into user actions
async fn read_commands(tx: EventSender) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let action = match lines.next_line().await {
            Ok(Some(line)) => match parse_command(&line) {
                Some(action) => action,
                None => continue,
            },
            Ok(None) => UserAction::Close,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read stdin");
                UserAction::Close
            }
        };
        let done = action == UserAction::Close;
        if tx.send(action.into()).is_err() || done {
            break;
        }
    }
}

fn parse_command(line: &str) -> Option<UserAction> {
    let line = line.trim();
    if line.is_empty() {
        return Some(UserAction::MicTap);
    }

    let Some(command) = line.strip_prefix('/') else {
        return Some(UserAction::SendText(line.to_string()));
    };
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("replay") => {
            let number: usize = parts.next()?.parse().ok()?;
            number.checked_sub(1).map(UserAction::Replay)
        }
        Some("voice") => Some(UserAction::ToggleVoice),
        Some("unlock") => Some(UserAction::UnlockAudio),
        Some("quit" | "exit") => Some(UserAction::Close),
        _ => {
            println!("unknown command: /{command}");
            None
        }
    }
}

fn print_help(capabilities: Capabilities) {
    println!("voice-bridge: type a message and press Enter to send it");
    if capabilities.stt() {
        println!("  <Enter>       start / stop listening");
    }
    if capabilities.tts() {
        println!("  /replay N     replay (or stop) agent message N");
        println!("  /voice        toggle spoken responses");
    }
    if capabilities.requires_gesture() {
        println!("  /unlock       enable audio playback");
    }
    println!("  /quit         end the conversation");
    println!();
}

/// Prints conversation changes to the terminal
#[derive(Default)]
struct TerminalView {
    shown: usize,
    phase: Option<Phase>,
    booked: bool,
    voice_enabled: Option<bool>,
    interim: String,
}

impl TerminalView {
    fn render(&mut self, coordinator: &ChatCoordinator) {
        let phase = coordinator.phase();
        if self.phase != Some(phase) {
            if let Some(status) = phase_status(phase, coordinator) {
                println!("-- {status}");
            }
            self.phase = Some(phase);
        }
        if let Some(line) = self.interim_update(phase, coordinator.interim_transcript()) {
            println!("    ... {line}");
        }

        let messages = coordinator.messages();
        if messages.len() < self.shown {
            self.shown = 0;
        }
        for (index, message) in messages.iter().enumerate().skip(self.shown) {
            match message.role {
                Role::Assistant => println!("[{}] agent: {}", index + 1, message.text),
                Role::User => println!("    you: {}", message.text),
            }
        }
        self.shown = messages.len();

        if let Some(booking) = coordinator.booking().filter(|_| !self.booked) {
            println!(
                "-- appointment booked{}",
                booking
                    .appointment_time
                    .as_deref()
                    .map(|t| format!(" for {t}"))
                    .unwrap_or_default()
            );
            self.booked = true;
        }

        let voice_enabled = coordinator.voice_enabled();
        if self.voice_enabled.is_some_and(|v| v != voice_enabled) {
            println!("-- voice {}", if voice_enabled { "on" } else { "off" });
        }
        self.voice_enabled = Some(voice_enabled);
    }
}

impl TerminalView {
    /// Partial transcript worth printing, once per change while listening
    fn interim_update(&mut self, phase: Phase, interim: &str) -> Option<String> {
        if phase != Phase::Listening {
            self.interim.clear();
            return None;
        }
        let interim = interim.trim();
        if interim.is_empty() || interim == self.interim {
            return None;
        }
        self.interim = interim.to_string();
        Some(self.interim.clone())
    }
}

fn phase_status(phase: Phase, coordinator: &ChatCoordinator) -> Option<&'static str> {
    match phase {
        Phase::Connecting => Some("connecting..."),
        Phase::Listening => Some("listening (press Enter to stop)"),
        Phase::AwaitingResponse => Some("thinking..."),
        Phase::Disconnected => Some("disconnected"),
        Phase::Closed => Some("conversation closed"),
        Phase::Idle if coordinator.needs_unlock() => Some("ready (type /unlock to hear responses)"),
        Phase::Idle | Phase::Speaking => None,
    }
}

#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let capture = AudioCapture::start()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | [{meter}]", i + 1);
    }

    capture.stop();
    println!("\nIf the meter moved while you spoke, your mic is working.");
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    let audio = &config.audio;
    let api_key = config
        .speech_api_key()
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is not set"))?;
    let synthesizer = Synthesizer::new(
        &audio.api_base,
        api_key.to_string(),
        audio.tts_model.clone(),
        audio.tts_voice.clone(),
        audio.tts_speed,
    )?;

    println!("Synthesizing \"{text}\" with voice {}...", audio.tts_voice);
    let mp3 = synthesizer.synthesize(text, None, 1.0).await?;
    let decoded = decode_mp3(&mp3)?;
    println!(
        "Playing {:.1}s of audio at {} Hz...",
        decoded.duration().as_secs_f32(),
        decoded.sample_rate
    );

    tokio::task::spawn_blocking(move || play_blocking(decoded, 1.0, &AtomicBool::new(false)))
        .await??;

    println!("\nIf you heard the speech, TTS is working.");
    Ok(())
}
