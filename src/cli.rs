use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Raw,
    Json,
    Srt,
}

#[derive(Parser)]
#[command(
    name = "ytprose",
    about = "Turn YouTube captions into readable prose",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Caption language code (exact match); defaults to the video's first track
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Output format: text (default), raw, json, srt
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write output to file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Prefix text output with title, channel and publish date
    #[arg(short, long)]
    pub metadata: bool,

    /// List available caption languages and exit
    #[arg(long)]
    pub list_languages: bool,

    /// Serve extension requests: one JSON request per stdin line, one JSON response per stdout line
    #[arg(long, conflicts_with_all = ["url", "list_languages"])]
    pub messages: bool,

    /// Show video details and the selected track on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
