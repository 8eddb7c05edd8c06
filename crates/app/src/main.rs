//! `segline`: inspect, copy and edit text files through the segment chain.

mod cli;
mod commands;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "segline=info,editor_state=info,editor_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = cli::Cli::parse();
    let mut config = editor_state::config::EditorConfig::from_env();

    if let Some(segment_bytes) = cli.segment_bytes {
        config.segment_bytes = segment_bytes.max(1);
    }

    if let Some(scratch_dir) = cli.scratch_dir {
        config.scratch_dir = Some(scratch_dir);
    }

    config.read_only |= cli.read_only;

    let workspace = editor_state::workspace::Workspace::new(config)?;
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        cli::Commands::Stat { file } => commands::stat(&workspace, &file, &mut stdout),
        cli::Commands::Print {
            file,
            from,
            to,
            number,
        } => commands::print(&workspace, &file, from, to, number, &mut stdout),
        cli::Commands::Copy { source, dest } => commands::copy(&workspace, &source, &dest),
        cli::Commands::Edit { file, ops, output } => {
            commands::edit(&workspace, &file, &ops, output.as_deref())
        }
    }
}
