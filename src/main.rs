// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use codetyper::demo::{self, DemoSequencer};
use codetyper::document::Buffer;
use codetyper::export::{ExportJob, ExportOptions};
use codetyper::parser::parse_demo;
use codetyper::persona;
use codetyper::playback::{Outcome, PlaybackEngine, stop_on_ctrlc};
use codetyper::samples;
use codetyper::sink::SinkKind;
use codetyper::terminal::{KeyReader, TerminalEditor};
use codetyper::types::{Bitrate, Language, Resolution, Script, TypingConfig};

#[derive(Parser)]
#[command(name = "codetyper", version, about = "Realistic typing animations for source code")]
struct Cli {
    /// Log progress to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TypingArgs {
    /// junior, regular, senior or tenx
    #[arg(short, long)]
    persona: Option<String>,

    /// Speed multiplier, 0.5 to 2.5 (defaults to the persona's own)
    #[arg(short, long)]
    speed: Option<f64>,

    /// Seed for reproducible timing and typos
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Type a file (or a built-in sample) in the terminal
    Play {
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Sample to type when no file is given, or the highlighting language of the file
        #[arg(short, long)]
        language: Option<Language>,

        /// Steady typing without typos
        #[arg(long)]
        plain: bool,

        #[command(flatten)]
        typing: TypingArgs,
    },

    /// Run a guided demo step by step
    Demo {
        /// Built-in demo name or path to a demo script
        demo: String,

        #[command(flatten)]
        typing: TypingArgs,
    },

    /// Render the typing animation to a video
    Export {
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(short, long)]
        language: Option<Language>,

        /// 720p, 1080p, 2k or 4k
        #[arg(short, long, default_value_t = Resolution::default())]
        resolution: Resolution,

        /// low, medium, high or lossless
        #[arg(short, long, default_value_t = Bitrate::default())]
        bitrate: Bitrate,

        /// Output file, or directory with --frames
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TTF/OTF font for glyphs (block glyphs without one)
        #[arg(long)]
        font: Option<PathBuf>,

        /// Write a PNG sequence instead of encoding with ffmpeg
        #[arg(long)]
        frames: bool,

        #[arg(short, long)]
        persona: Option<String>,

        #[arg(short, long)]
        speed: Option<f64>,
    },

    /// List typing personas
    Personas,

    /// List built-in guided demos
    Demos,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn typing_config(persona_name: Option<&str>, speed: Option<f64>) -> Result<TypingConfig> {
    let profile = match persona_name {
        Some(name) => persona::lookup(name)?,
        None => persona::default_persona(),
    };
    let mut config = TypingConfig::for_persona(profile);
    if let Some(speed) = speed {
        config = config.with_speed(speed)?;
    }
    Ok(config)
}

fn load_script(file: Option<&Path>, language: Option<Language>) -> Result<(String, Language)> {
    match file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let language = language.unwrap_or_else(|| Language::detect(&text));
            Ok((text, language))
        }
        None => {
            let language = language.unwrap_or(Language::TypeScript);
            Ok((samples::sample(language).to_string(), language))
        }
    }
}

async fn play(
    file: Option<PathBuf>,
    language: Option<Language>,
    plain: bool,
    typing: TypingArgs,
) -> Result<()> {
    let (text, language) = load_script(file.as_deref(), language)?;
    let mut config = typing_config(typing.persona.as_deref(), typing.speed)?;
    if plain {
        config = config.plain();
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let mut engine = PlaybackEngine::new(config, rx);
    if let Some(seed) = typing.seed {
        engine = engine.with_seed(seed);
    }

    if std::io::stdout().is_terminal() {
        let mut editor = TerminalEditor::open(language.file_name())?;
        let _keys = KeyReader::spawn(tx.clone());
        let outcome = engine.play(Script::new(&text), &mut editor).await?;
        if outcome == Outcome::Completed {
            engine.hold(&mut editor, "Done. Press any key to exit.").await?;
        }
    } else {
        stop_on_ctrlc(tx.clone())?;
        let mut buffer = Buffer::new();
        engine.play(Script::new(&text), &mut buffer).await?;
        println!("{}", buffer.as_str());
    }
    Ok(())
}

async fn run_demo(name_or_path: &str, typing: TypingArgs) -> Result<()> {
    let path = Path::new(name_or_path);
    let guided = if path.is_file() {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        parse_demo(&text).with_context(|| format!("Invalid demo script {}", path.display()))?
    } else {
        demo::builtin(name_or_path)?
    };

    if !std::io::stdout().is_terminal() {
        bail!("guided demos need an interactive terminal");
    }

    let persona_name = typing.persona.as_deref().or(guided.persona.as_deref());
    let config = typing_config(persona_name, typing.speed.or(guided.speed))?;
    let file_name = guided.language.file_name();

    let mut sequencer = DemoSequencer::new(guided, config);
    if let Some(seed) = typing.seed {
        sequencer = sequencer.with_seed(seed);
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let mut engine = PlaybackEngine::new(config, rx);
    let mut editor = TerminalEditor::open(file_name)?;
    let _keys = KeyReader::spawn(tx.clone());
    engine.play_demo(&mut sequencer, &mut editor).await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn export(
    file: Option<PathBuf>,
    language: Option<Language>,
    resolution: Resolution,
    bitrate: Bitrate,
    output: Option<PathBuf>,
    font: Option<PathBuf>,
    frames: bool,
    persona: Option<String>,
    speed: Option<f64>,
) -> Result<()> {
    let (script, language) = load_script(file.as_deref(), language)?;
    let mut job = ExportJob::new(ExportOptions {
        persona: persona.unwrap_or_default(),
        speed,
        resolution,
        bitrate,
        script,
        language: Some(language),
        output,
        font,
        sink: if frames {
            SinkKind::PngSequence
        } else {
            SinkKind::Ffmpeg
        },
    })?;

    let mut renderer = job.open_renderer()?;
    let mut sink = job.open_sink();
    let mut stderr = std::io::stderr();
    let artifact = job.run(sink.as_mut(), &mut renderer, |p| {
        let _ = write!(stderr, "\rExporting... {p:>3.0}%");
        let _ = stderr.flush();
    })?;
    eprintln!();

    match artifact.path {
        Some(path) => println!("Wrote {} frames to {}", artifact.frames, path.display()),
        None => println!("Rendered {} frames", artifact.frames),
    }
    Ok(())
}

fn list_personas() {
    for p in persona::all() {
        println!(
            "{:<8} {:<18} typos {:>4.1}%  speed {:.1}x  {}",
            p.name,
            p.display_name,
            p.typo_chance * 100.0,
            p.speed_multiplier,
            p.description
        );
    }
}

fn list_demos() -> Result<()> {
    for name in demo::builtin_names() {
        let guided = demo::builtin(name)?;
        println!(
            "{:<16} {} ({}, {} steps)",
            name,
            guided.title,
            guided.language,
            guided.steps.len()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Play {
            file,
            language,
            plain,
            typing,
        } => play(file, language, plain, typing).await,
        Commands::Demo { demo, typing } => run_demo(&demo, typing).await,
        Commands::Export {
            file,
            language,
            resolution,
            bitrate,
            output,
            font,
            frames,
            persona,
            speed,
        } => export(
            file, language, resolution, bitrate, output, font, frames, persona, speed,
        ),
        Commands::Personas => {
            list_personas();
            Ok(())
        }
        Commands::Demos => list_demos(),
    }
}
