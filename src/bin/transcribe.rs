//! transcribe - upload an audio file to a speech-to-text endpoint
//!
//! Prints each line of the service's response to stdout. Credentials
//! come from the environment, never from source or the command line
//! history.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use contourcam::transcribe::{upload, SttConfig, DEFAULT_CONTENT_TYPE, DEFAULT_ENDPOINT};

#[derive(Parser, Debug)]
#[command(name = "transcribe", about = "Upload an audio file for transcription")]
struct Args {
    /// Audio file to upload.
    audio: PathBuf,

    /// Speech-to-text endpoint URL.
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    url: String,

    /// Content type of the audio file.
    #[arg(long, default_value = DEFAULT_CONTENT_TYPE)]
    content_type: String,

    /// Base64 credential for the Authorization: Basic header.
    #[arg(long, env = "CONTOURCAM_STT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = SttConfig {
        url: args.url,
        auth_token: args.token,
        content_type: args.content_type,
    };

    let mut stdout = std::io::stdout().lock();
    let lines = upload(&config, &args.audio, &mut stdout)?;
    log::info!("received {lines} response line(s)");
    Ok(())
}
