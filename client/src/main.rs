//! Chorus Client
//!
//! A command-line client for the Chorus server's HTTP control surface.
//!
//! Usage:
//!   # Speak a sentence, interrupting whatever is playing
//!   cargo run --release -p chorus-client -- speak "Hello world" --force
//!
//!   # Submit a batch from a JSON file
//!   cargo run --release -p chorus-client -- send batch.json
//!
//!   # List voices
//!   cargo run --release -p chorus-client -- voices

mod http;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use chorus_protocol::{routes, Command, CommandBatch, VoiceCollection, VoiceUpdate, DEFAULT_ADDR};

use http::{ChorusClient, Property};

#[derive(Parser, Debug)]
#[command(author, version, about = "Chorus speech engine client")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    server: String,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Speak plain text, or SSML with --ssml
    Speak {
        text: String,
        #[arg(long)]
        ssml: bool,
        /// Drop queued speech first
        #[arg(short, long)]
        force: bool,
    },
    /// Play a numbered sound
    Sound {
        index: i16,
        #[arg(short, long)]
        force: bool,
    },
    /// Queue a pause, in seconds
    Wait {
        seconds: f64,
        #[arg(short, long)]
        force: bool,
    },
    /// Submit a JSON command batch from a file
    Send {
        file: PathBuf,
        #[arg(short, long)]
        force: bool,
    },
    /// Start the engine
    Enable,
    /// Stop the engine
    Disable,
    /// Fade playback out
    Pause,
    /// Fade playback back in
    Restart,
    /// List installed voices
    Voices,
    /// Set properties of one voice
    SetVoice {
        #[arg(short, long)]
        index: i32,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        pitch: Option<f64>,
        #[arg(long)]
        volume: Option<f64>,
    },
    /// Shift a property of the default voice
    Adjust {
        #[arg(value_enum)]
        property: Property,
        #[arg(allow_negative_numbers = true)]
        diff: f64,
    },
    /// Change the default voice
    DefaultVoice { index: i32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("chorus_client=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    let args = Args::parse();
    let client = ChorusClient::new(&args.server);

    match args.action {
        Action::Speak { text, ssml, force } => {
            let command = if ssml {
                Command::speak_ssml(text)
            } else {
                Command::speak_text(text)
            };
            submit(&client, vec![command], force).await?;
        }
        Action::Sound { index, force } => {
            submit(&client, vec![Command::play_sound(index)], force).await?;
        }
        Action::Wait { seconds, force } => {
            submit(&client, vec![Command::wait(seconds)], force).await?;
        }
        Action::Send { file, force } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let batch: CommandBatch = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a command batch", file.display()))?;
            submit(&client, batch.commands, force).await?;
        }
        Action::Enable => {
            client.action(routes::AUDIO_ENABLE).await?;
            println!("Engine enabled");
        }
        Action::Disable => {
            client.action(routes::AUDIO_DISABLE).await?;
            println!("Engine disabled");
        }
        Action::Pause => {
            client.action(routes::AUDIO_PAUSE).await?;
            println!("Playback paused");
        }
        Action::Restart => {
            client.action(routes::AUDIO_RESTART).await?;
            println!("Playback restarted");
        }
        Action::Voices => {
            let collection = client.voices().await?;
            print_voices(&collection);
        }
        Action::SetVoice {
            index,
            rate,
            pitch,
            volume,
        } => {
            let update = VoiceUpdate {
                speaking_rate: rate,
                audio_pitch: pitch,
                audio_volume: volume,
            };
            client.update_voice(index, &update).await?;
            println!("Voice {} updated", index);
        }
        Action::Adjust { property, diff } => {
            client.adjust(property, diff).await?;
            println!("Default voice {:?} adjusted by {}", property, diff);
        }
        Action::DefaultVoice { index } => {
            client.set_default_voice(index).await?;
            println!("Default voice is now {}", index);
        }
    }

    Ok(())
}

async fn submit(client: &ChorusClient, commands: Vec<Command>, force: bool) -> Result<()> {
    let count = commands.len();
    client.command(&CommandBatch::new(commands), force).await?;
    info!("Submitted {} command(s){}", count, if force { " (forced)" } else { "" });
    Ok(())
}

fn print_voices(collection: &VoiceCollection) {
    if collection.voices.is_empty() {
        println!("No voices installed");
        return;
    }

    for (index, voice) in collection.voices.iter().enumerate() {
        let marker = if index as i32 == collection.default_voice_index {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:>2}  {:<40} {:<8} rate={:.2} pitch={:.2} volume={:.2}",
            marker,
            index,
            voice.display_name,
            voice.language,
            voice.speaking_rate,
            voice.audio_pitch,
            voice.audio_volume
        );
        println!("       {}", voice.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_accepts_negative_diff() {
        let args = Args::try_parse_from(["chorus-client", "adjust", "pitch", "-0.5"]).unwrap();
        match args.action {
            Action::Adjust { property, diff } => {
                assert_eq!(property, Property::Pitch);
                assert_eq!(diff, -0.5);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn set_voice_leaves_unset_fields_absent() {
        let args =
            Args::try_parse_from(["chorus-client", "set-voice", "--index", "1", "--pitch", "0.8"]).unwrap();
        match args.action {
            Action::SetVoice {
                index,
                rate,
                pitch,
                volume,
            } => {
                assert_eq!(index, 1);
                assert_eq!(rate, None);
                assert_eq!(pitch, Some(0.8));
                assert_eq!(volume, None);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn server_defaults_to_local_address() {
        let args = Args::try_parse_from(["chorus-client", "voices"]).unwrap();
        assert_eq!(args.server, DEFAULT_ADDR);
    }
}
