mod join;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use roomwire::client::CodecPreferences;
use roomwire::sdp::{MediaKind, prefer_codec, set_start_bitrate};
use std::fs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cargo-roomwire")]
#[command(bin_name = "cargo-roomwire")]
enum Cli {
    Roomwire(RoomwireArgs),
}

#[derive(clap::Args)]
struct RoomwireArgs {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room and print signaling events until Ctrl-C.
    Join {
        #[arg(long, default_value = "https://appr.tc")]
        room_url: String,

        /// Random when omitted.
        #[arg(long)]
        room_id: Option<String>,

        #[arg(long)]
        loopback: bool,

        #[command(flatten)]
        codecs: CodecArgs,
    },

    /// Rewrite an SDP file and print the result.
    Sdp {
        #[command(subcommand)]
        command: SdpCommands,
    },
}

#[derive(clap::Args)]
struct CodecArgs {
    #[arg(long)]
    video_codec: Option<String>,

    #[arg(long)]
    audio_codec: Option<String>,

    /// Video start bitrate in kbps, 0 to leave unset.
    #[arg(long, default_value_t = 0)]
    video_bitrate: u32,

    /// Audio start bitrate in kbps, 0 to leave unset.
    #[arg(long, default_value_t = 0)]
    audio_bitrate: u32,
}

impl From<CodecArgs> for CodecPreferences {
    fn from(args: CodecArgs) -> Self {
        Self {
            preferred_audio_codec: args.audio_codec,
            preferred_video_codec: args.video_codec,
            video_start_bitrate_kbps: args.video_bitrate,
            audio_start_bitrate_kbps: args.audio_bitrate,
        }
    }
}

#[derive(Subcommand)]
enum SdpCommands {
    PreferCodec {
        #[arg(long)]
        codec: String,

        /// Rewrite the audio section instead of video.
        #[arg(long)]
        audio: bool,

        file: String,
    },
    StartBitrate {
        #[arg(long)]
        codec: String,

        #[arg(long)]
        kbps: u32,

        #[arg(long)]
        audio: bool,

        file: String,
    },
}

fn main() -> Result<()> {
    let Cli::Roomwire(args) = Cli::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Join {
            room_url,
            room_id,
            loopback,
            codecs,
        } => {
            let room_id = room_id.unwrap_or_else(random_room_id);
            let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
            runtime.block_on(join::run(room_url, room_id, loopback, codecs.into()))?;
        }

        Commands::Sdp { command } => {
            let rewritten = match command {
                SdpCommands::PreferCodec { codec, audio, file } => {
                    prefer_codec(&read_sdp(&file)?, &codec, media_kind(audio))
                }
                SdpCommands::StartBitrate {
                    codec,
                    kbps,
                    audio,
                    file,
                } => set_start_bitrate(&read_sdp(&file)?, &codec, media_kind(audio), kbps),
            };
            print!("{}", rewritten);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn random_room_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let room_id = id[..8].to_owned();
    println!("{} {}", "🎲 Using random room".cyan(), room_id.bold());
    room_id
}

fn media_kind(audio: bool) -> MediaKind {
    if audio { MediaKind::Audio } else { MediaKind::Video }
}

/// SDP lines end in CRLF; hand-edited files usually don't.
fn read_sdp(path: &str) -> Result<String> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?;
    Ok(text.replace("\r\n", "\n").replace('\n', "\r\n"))
}
