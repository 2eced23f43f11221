use std::io::{self, BufRead};
use std::path::PathBuf;
use std::time::Duration;

use eyre::{Result, WrapErr, bail};
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use ytprose::envelope::{self, Request, Response};
use ytprose::{CoreError, FetchOptions, HttpClient, Transcript, format, youtube};

mod cli;

use cli::{Cli, OutputFormat};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytprose.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytprose")
        .join("logs")
}

fn build_after_help() -> String {
    let log_path = log_dir().join("ytprose.log");
    let config_path = ytprose::config::config_path();

    format!(
        "\nSUPPORTED INPUT:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  https://www.youtube.com/shorts/ID\n  <11-character video ID>\n\nConfig is read from: {}\nLogs are written to: {}",
        config_path.display(),
        log_path.display()
    )
}

/// Re-run the whole pipeline while it fails transiently, with exponential backoff
async fn retry<F, Fut, T>(extra_attempts: u32, operation: F) -> std::result::Result<T, CoreError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, CoreError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) if e.is_transient() && attempt < extra_attempts => {
                let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                debug!("Attempt {} failed: {e}, retrying in {delay:?}", attempt + 1);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn render(transcript: &Transcript, output: OutputFormat, with_metadata: bool) -> Result<String> {
    Ok(match output {
        OutputFormat::Text => format::render_text(transcript, with_metadata),
        OutputFormat::Raw => format::render_raw(transcript),
        OutputFormat::Json => format::render_json(transcript)?,
        OutputFormat::Srt => format::render_srt(transcript),
    })
}

/// Answer one JSON request per input line until EOF
async fn serve_messages<C, R, W>(client: &C, input: R, mut output: W) -> Result<()>
where
    C: HttpClient + ?Sized,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => envelope::handle_request(client, request).await,
            Err(e) => {
                warn!("Rejected malformed request: {e}");
                Response {
                    success: false,
                    data: None,
                    error: Some(format!("invalid request: {e}")),
                    kind: None,
                }
            }
        };

        let mut encoded = serde_json::to_string(&response)?;
        encoded.push('\n');
        output.write_all(encoded.as_bytes()).await?;
        output.flush().await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = ytprose::config::Config::load().unwrap_or_else(|e| {
        warn!("Ignoring invalid config file: {e}");
        ytprose::config::Config::default()
    });

    // CLI flags take priority over config
    let lang = cli.lang.clone().or_else(|| config.default_lang.clone());
    let output_format = match (cli.format, config.default_format.as_deref()) {
        (Some(f), _) => f,
        (None, Some(name)) => <OutputFormat as clap::ValueEnum>::from_str(name, true)
            .map_err(|e| eyre::eyre!("invalid default_format in config: {e}"))?,
        (None, None) => OutputFormat::Text,
    };
    let retries = config.retries.unwrap_or(0);

    if cli.verbose {
        let config_path = ytprose::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
    }

    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.timeout() {
        debug!("HTTP timeout: {timeout:?}");
        builder = builder.timeout(timeout);
    }
    let client = builder.build()?;

    if cli.messages {
        return serve_messages(&client, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await;
    }

    // Collect URLs: from arg or stdin
    let urls = if let Some(ref url) = cli.url {
        vec![url.clone()]
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    if urls.iter().all(|u| u.trim().is_empty()) {
        bail!("no URL or video ID provided\n\nUsage: ytprose <URL>\n       echo <URL> | ytprose");
    }

    let options = FetchOptions { lang };

    for url_input in &urls {
        let url_input = url_input.trim().to_string();
        if url_input.is_empty() {
            continue;
        }

        if cli.list_languages {
            let resolved = retry(retries, || {
                let client = &client;
                let url_input = &url_input;
                let options = &options;
                async move { youtube::resolve(client, url_input, options).await }
            })
            .await?;

            if resolved.manifest.tracks.is_empty() {
                eprintln!("No caption tracks for {}", resolved.video_id);
            }
            for track in &resolved.manifest.tracks {
                let generated = if track.is_generated { " (auto-generated)" } else { "" };
                println!(
                    "{}\t{}{generated}",
                    track.language_code,
                    track.name.as_deref().unwrap_or("")
                );
            }
            continue;
        }

        let transcript = retry(retries, || {
            let client = &client;
            let url_input = &url_input;
            let options = &options;
            async move { ytprose::fetch_transcript(client, url_input, options).await }
        })
        .await
        .wrap_err_with(|| format!("failed to fetch transcript for {url_input}"))?;

        if cli.verbose {
            eprintln!(
                "Video: {} ({})\nChannel: {}\nLanguage: {}\nSegments: {}",
                transcript.metadata.title.as_deref().unwrap_or("<untitled>"),
                transcript.video_id,
                transcript.metadata.channel.as_deref().unwrap_or("<unknown>"),
                transcript.language,
                transcript.segments.len(),
            );
        }

        let rendered = render(&transcript, output_format, cli.metadata)?;

        if let Some(ref path) = cli.output {
            std::fs::write(path, &rendered)?;
            if cli.verbose {
                eprintln!("Output written to: {}", path.display());
            }
        } else {
            println!("{rendered}");
        }
    }

    Ok(())
}
