use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "segline",
    about = "Inspect, copy and edit text files line by line without loading them",
    version
)]
pub struct Cli {
    /// Close a segment once it holds this many bytes when loading a file
    /// [env: SEGLINE_SEGMENT_BYTES]
    #[arg(long, global = true)]
    pub segment_bytes: Option<u64>,

    /// Directory for the scratch file that holds edited lines
    /// [env: SEGLINE_SCRATCH_DIR]
    #[arg(long, global = true)]
    pub scratch_dir: Option<std::path::PathBuf>,

    /// Refuse to write any opened file back [env: SEGLINE_READ_ONLY]
    #[arg(long, global = true)]
    pub read_only: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show line, segment and byte counts for a file
    Stat { file: std::path::PathBuf },

    /// Print a range of lines (1-based, inclusive)
    Print {
        file: std::path::PathBuf,
        #[arg(long, default_value_t = 1)]
        from: usize,
        #[arg(long)]
        to: Option<usize>,
        /// Prefix each line with its number
        #[arg(short, long)]
        number: bool,
    },

    /// Load a file and write it out through the segment chain
    Copy {
        source: std::path::PathBuf,
        dest: std::path::PathBuf,
    },

    /// Apply edits in order and save the result
    Edit {
        file: std::path::PathBuf,
        /// `set LINE TEXT`, `insert LINE TEXT`, `blank LINE COUNT` or
        /// `delete FROM TO`; lines are 1-based
        #[arg(short = 'e', long = "op", value_parser = parse_edit_op, required = true)]
        ops: Vec<EditOp>,
        /// Save to this path instead of over the file
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
}

/// One edit from the command line, with line numbers already 0-based.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EditOp {
    Set { line: usize, text: String },
    Insert { at: usize, text: String },
    Blank { at: usize, count: usize },
    Delete { from: usize, to: usize },
}

fn parse_line_number(raw: Option<&str>) -> Result<usize, String> {
    let raw = raw.ok_or("missing line number")?;
    let line: usize = raw
        .parse()
        .map_err(|e| format!("invalid line number {raw:?}: {e}"))?;

    line.checked_sub(1)
        .ok_or_else(|| "line numbers start at 1".to_string())
}

pub fn parse_edit_op(value: &str) -> Result<EditOp, String> {
    let mut words = value.splitn(3, ' ');
    let verb = words.next().unwrap_or_default();
    let line = parse_line_number(words.next())?;
    let rest = words.next();

    match verb {
        "set" => Ok(EditOp::Set {
            line,
            text: rest.unwrap_or_default().to_string(),
        }),
        "insert" => Ok(EditOp::Insert {
            at: line,
            text: rest.unwrap_or_default().to_string(),
        }),
        "blank" => {
            let count = rest
                .unwrap_or("1")
                .trim()
                .parse()
                .map_err(|e| format!("invalid blank line count: {e}"))?;

            Ok(EditOp::Blank { at: line, count })
        }
        "delete" => {
            let to = match rest {
                Some(raw) => parse_line_number(Some(raw.trim()))?,
                None => line,
            };

            Ok(EditOp::Delete { from: line, to })
        }
        other => Err(format!(
            "unknown edit {other:?}; expected set, insert, blank or delete"
        )),
    }
}
