use anyhow::Context;
use std::io::Write;
use std::path::Path;

use editor_state::workspace::Workspace;

use crate::cli::EditOp;

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub fn stat(workspace: &Workspace, path: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    let document = workspace
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let chain = document.buffer().chain();
    let mut bytes: u64 = chain.iter().map(|(_, segment)| segment.total_bytes()).sum();

    if !chain.final_separator() {
        bytes = bytes.saturating_sub(1);
    }

    writeln!(out, "path:          {}", path.display())?;
    writeln!(out, "lines:         {}", chain.line_count())?;
    writeln!(out, "segments:      {}", chain.segment_count())?;
    writeln!(out, "bytes:         {bytes}")?;
    writeln!(out, "final newline: {}", yes_no(chain.final_separator() || chain.is_empty()))?;
    writeln!(out, "writable:      {}", yes_no(document.buffer().is_writable()))?;

    Ok(())
}

/// Writes lines `from..=to` (1-based); `to` defaults to the last line and
/// is clamped to it.
pub fn print(
    workspace: &Workspace,
    path: &Path,
    from: usize,
    to: Option<usize>,
    number: bool,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let document = workspace
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let buffer = document.buffer();
    let total = buffer.total_line_count();
    let last = to.unwrap_or(total).min(total);

    for line in from.max(1)..=last {
        let content = buffer
            .read_line(line - 1)
            .with_context(|| format!("reading line {line}"))?;

        if number {
            write!(out, "{line:>6}  ")?;
        }

        out.write_all(&content)?;
        out.write_all(b"\n")?;
    }

    out.flush()?;

    Ok(())
}

pub fn copy(workspace: &Workspace, source: &Path, dest: &Path) -> anyhow::Result<()> {
    let mut document = workspace
        .open(source)
        .with_context(|| format!("opening {}", source.display()))?;
    let report = document
        .save_as(dest)
        .with_context(|| format!("writing {}", dest.display()))?;

    tracing::info!(
        source = %source.display(),
        dest = %dest.display(),
        bytes = report.bytes_written,
        segments = report.segments_written,
        "copied"
    );

    Ok(())
}

pub fn edit(
    workspace: &Workspace,
    path: &Path,
    ops: &[EditOp],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let mut document = workspace
        .open(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let buffer = document.buffer_mut();

    for op in ops {
        match op {
            EditOp::Set { line, text } => buffer.set_line(*line, text.as_bytes())?,
            EditOp::Insert { at, text } => buffer.insert_lines(*at, &[text])?,
            EditOp::Blank { at, count } => buffer.insert_blank_lines(*at, *count)?,
            EditOp::Delete { from, to } => {
                let removed = buffer.delete_lines(*from, *to)?;

                tracing::debug!(from, to, removed, "deleted lines");
            }
        }
    }

    let report = match output {
        Some(output) => document
            .save_as(output)
            .with_context(|| format!("writing {}", output.display()))?,
        None => document
            .save()
            .with_context(|| format!("saving {}", path.display()))?,
    };

    tracing::info!(
        path = %document.title(),
        edits = ops.len(),
        bytes = report.bytes_written,
        "saved"
    );

    Ok(())
}
