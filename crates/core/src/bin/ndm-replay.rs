use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ndm_tcp::config::{set_logger, ConfigArgs};
use ndm_tcp::replay::{read_trace, write_trace, Replay};
use ndm_tcp::synth::{NetworkPreset, TraceGenerator};
use ndm_tcp::TransportWindow;
use tracing::level_filters::LevelFilter;

/// Replay or synthesize congestion-control event traces.
#[derive(Parser, Debug)]
#[command(name = "ndm-replay", version, about)]
struct Cli {
    /// Log level when RUST_LOG is unset.
    #[arg(long, global = true, env = "NDM_LOG_LEVEL")]
    log_level: Option<LevelFilter>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a JSON-lines trace through a controller and print one record per event.
    Replay(ReplayCommand),
    /// Generate a JSON-lines trace for a network preset.
    Synth(SynthCommand),
}

#[derive(Args, Debug)]
struct ReplayCommand {
    /// Trace file; `-` reads stdin.
    #[arg(long, short)]
    trace: PathBuf,

    /// Initial congestion window (segments).
    #[arg(long, default_value_t = 10)]
    initial_window: u32,

    /// Initial ssthresh (segments); 0 means none.
    #[arg(long, default_value_t = 0)]
    initial_ssthresh: u32,

    /// Print only the final summary.
    #[arg(long)]
    summary_only: bool,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args, Debug)]
struct SynthCommand {
    #[arg(long, value_enum, default_value_t = NetworkPreset::default())]
    preset: NetworkPreset,

    /// Number of acknowledgments to generate.
    #[arg(long, default_value_t = 1000)]
    acks: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Output file; stdout when omitted.
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn run_replay(cmd: ReplayCommand) -> Result<()> {
    let config = cmd.config.build().context("invalid configuration")?;
    tracing::info!(
        algorithm = %config.algorithm,
        precision = %config.ndm.precision,
        "Starting replay"
    );

    let parsed = if cmd.trace.as_os_str() == "-" {
        read_trace(io::stdin().lock())
    } else {
        let file = File::open(&cmd.trace)
            .with_context(|| format!("failed to open trace {}", cmd.trace.display()))?;
        read_trace(BufReader::new(file))
    };
    let events = parsed.context("failed to read trace")?;

    let controller = config.build(cmd.initial_window, cmd.initial_ssthresh)?;
    let mut replay = Replay::new(
        controller,
        TransportWindow::new(cmd.initial_window, cmd.initial_ssthresh),
    );

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for event in events {
        let record = replay.step(event);
        if !cmd.summary_only {
            serde_json::to_writer(&mut out, &record)?;
            out.write_all(b"\n")?;
        }
    }

    let summary = replay.summary();
    if let Some(stats) = &summary.ndm {
        tracing::info!(%stats, "Replay finished");
    }
    serde_json::to_writer_pretty(&mut out, &summary)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn run_synth(cmd: SynthCommand) -> Result<()> {
    let events = TraceGenerator::new(cmd.preset.profile(), cmd.seed).generate(cmd.acks);
    tracing::info!(preset = ?cmd.preset, events = events.len(), "Generated trace");
    match cmd.output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_trace(BufWriter::new(file), &events)?;
        }
        None => write_trace(io::stdout().lock(), &events)?,
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    set_logger(cli.log_level);
    match cli.command {
        Command::Replay(cmd) => run_replay(cmd),
        Command::Synth(cmd) => run_synth(cmd),
    }
}
