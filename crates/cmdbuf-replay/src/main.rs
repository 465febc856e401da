use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cmdbuf_replay::{decode_stream, load_config, load_segment, read_stream, replay};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cmdbuf-replay", version, about = "Inspect and replay GPU command streams")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// List every command in a stream file without executing it.
    Decode {
        path: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Execute a stream file against a recording backend.
    Replay {
        path: PathBuf,
        /// Shared memory segment contents, repeatable.
        #[arg(long = "shm", value_name = "ID=PATH")]
        segments: Vec<String>,
        /// JSON decoder config. Without it, `CMDBUF_*` environment variables apply.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Enable ES3-only commands regardless of the config.
        #[arg(long)]
        es3: bool,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Cmd::Decode { path, json } => {
            let bytes = read_stream(&path)?;
            let commands = decode_stream(&bytes);
            if json {
                println!("{}", serde_json::to_string_pretty(&commands)?);
                return Ok(());
            }
            for cmd in &commands {
                let name = cmd.name.unwrap_or("?");
                print!(
                    "{:>8}  {name} (id {}, {} entries) args={:?}",
                    cmd.offset, cmd.id, cmd.size_entries, cmd.args
                );
                if cmd.immediate_bytes > 0 {
                    print!(" immediate={}B", cmd.immediate_bytes);
                }
                match &cmd.error {
                    Some(err) => println!("  error: {err}"),
                    None => println!(),
                }
            }
        }
        Cmd::Replay {
            path,
            segments,
            config,
            es3,
            json,
        } => {
            let bytes = read_stream(&path)?;
            let segments = segments
                .iter()
                .map(|spec| load_segment(spec))
                .collect::<Result<Vec<_>, _>>()?;
            let mut config = load_config(config.as_deref()).context("loading decoder config")?;
            config.unsafe_es3_apis_enabled |= es3;

            let report = replay(&bytes, segments, config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "{} commands, {} native calls, token {}",
                    report.commands,
                    report.calls.len(),
                    report.token
                );
                for failure in &report.failures {
                    println!(
                        "  offset {}: {} failed: {}",
                        failure.offset,
                        failure.command.unwrap_or("?"),
                        failure.error
                    );
                }
                if !report.gl_errors.is_empty() {
                    println!("  queued GL errors: {}", report.gl_errors.join(", "));
                }
                if report.open_traces > 0 {
                    println!("  {} trace(s) left open", report.open_traces);
                }
            }
            if let Some(offset) = report.stalled_at {
                bail!("replay stalled at byte {offset}");
            }
        }
    }
    Ok(())
}
