//! Property-based tests for the segment chain and the buffer built on it.
//!
//! Every run drives a `TextBuffer` and a plain `Vec<Vec<u8>>` model through
//! the same edits, then checks that reads, line counts and the written bytes
//! agree and that the chain's structure is still sound.

use editor_core::codec;
use editor_core::scratch::ScratchStore;
use editor_core::text::TextBuffer;
use proptest::prelude::*;
use std::io::Write;

// ============================================================================
// Model
// ============================================================================

#[derive(Clone, Debug)]
enum Op {
    SetLine(usize, String),
    InsertLines(usize, Vec<String>),
    InsertBlank(usize, usize),
    Delete(usize, usize),
    Flush,
}

#[derive(Debug)]
struct Model {
    lines: Vec<Vec<u8>>,
    /// Index of the source line that had no separator, while it survives.
    unterminated: Option<usize>,
}

impl Model {
    fn from_bytes(bytes: &[u8]) -> Self {
        let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        let lines: Vec<Vec<u8>> = if bytes.is_empty() {
            Vec::new()
        } else {
            body.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect()
        };
        let unterminated = (!bytes.is_empty() && !bytes.ends_with(b"\n")).then(|| lines.len() - 1);

        Self {
            lines,
            unterminated,
        }
    }

    fn pad_to(&mut self, len: usize) {
        if self.lines.len() < len {
            self.lines.resize(len, Vec::new());
        }
    }

    fn insert_at(&mut self, at: usize, new: Vec<Vec<u8>>) {
        if new.is_empty() {
            return;
        }

        self.pad_to(at);

        if let Some(tail) = self.unterminated.as_mut()
            && *tail >= at
        {
            *tail += new.len();
        }

        self.lines.splice(at..at, new);
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::SetLine(line, text) => {
                self.pad_to(line + 1);
                self.lines[*line] = text.as_bytes().to_vec();

                // A rewritten line is stored with its separator.
                if self.unterminated == Some(*line) {
                    self.unterminated = None;
                }
            }
            Op::InsertLines(at, texts) => {
                self.insert_at(*at, texts.iter().map(|t| t.as_bytes().to_vec()).collect());
            }
            Op::InsertBlank(at, count) => {
                self.insert_at(*at, vec![Vec::new(); *count]);
            }
            Op::Delete(from, to) => {
                if from > to || *from >= self.lines.len() {
                    return;
                }
                let to = (*to).min(self.lines.len() - 1);
                self.lines.drain(*from..=to);

                self.unterminated = match self.unterminated {
                    Some(tail) if (*from..=to).contains(&tail) => None,
                    Some(tail) if tail > to => Some(tail - (to - from + 1)),
                    other => other,
                };
            }
            Op::Flush => {}
        }

        if self.lines.is_empty() {
            self.unterminated = None;
        }
    }

    fn bytes(&self) -> Vec<u8> {
        if self.lines.is_empty() {
            return Vec::new();
        }

        let mut out = self.lines.join(&b'\n');

        if self.unterminated.is_none() {
            out.push(b'\n');
        }

        out
    }
}

fn apply(buffer: &mut TextBuffer, op: &Op) {
    match op {
        Op::SetLine(line, text) => buffer.set_line(*line, text.as_bytes()).unwrap(),
        Op::InsertLines(at, texts) => buffer.insert_lines(*at, texts).unwrap(),
        Op::InsertBlank(at, count) => buffer.insert_blank_lines(*at, *count).unwrap(),
        Op::Delete(from, to) => {
            buffer.delete_lines(*from, *to).unwrap();
        }
        Op::Flush => {
            buffer.flush().unwrap();
        }
    }
}

fn assert_matches(buffer: &TextBuffer, model: &Model) -> Result<(), TestCaseError> {
    prop_assert_eq!(buffer.total_line_count(), model.lines.len());

    for (idx, expected) in model.lines.iter().enumerate() {
        prop_assert_eq!(&buffer.read_line(idx).unwrap(), expected, "line {}", idx);
    }

    prop_assert!(buffer.read_line(model.lines.len()).is_err());

    Ok(())
}

fn loaded(bytes: &[u8], segment_bytes: u64) -> (TextBuffer, tempfile::NamedTempFile) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.as_file().sync_all().unwrap();

    let mapped = std::rc::Rc::new(io::mmap::MmapFile::open(file.path()).unwrap());
    let mut buffer = TextBuffer::new(ScratchStore::new().unwrap()).with_segment_bytes(segment_bytes);

    buffer.load_from_source(mapped).unwrap();

    (buffer, file)
}

// ============================================================================
// Strategies
// ============================================================================

fn line_strategy() -> impl Strategy<Value = String> {
    "[a-z ]{0,12}"
}

fn file_strategy() -> impl Strategy<Value = Vec<u8>> {
    (
        prop::collection::vec(line_strategy(), 0..40),
        any::<bool>(),
    )
        .prop_map(|(lines, terminated)| {
            let mut bytes = lines.join("\n").into_bytes();

            if terminated && !lines.is_empty() {
                bytes.push(b'\n');
            }

            bytes
        })
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..50, line_strategy()).prop_map(|(line, text)| Op::SetLine(line, text)),
        2 => (0usize..50, prop::collection::vec(line_strategy(), 0..6))
            .prop_map(|(at, texts)| Op::InsertLines(at, texts)),
        1 => (0usize..50, 0usize..200).prop_map(|(at, count)| Op::InsertBlank(at, count)),
        2 => (0usize..50, 0usize..50).prop_map(|(from, to)| Op::Delete(from, to)),
        1 => Just(Op::Flush),
    ]
}

// ============================================================================
// Codec Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Any run of lengths decodes back in order.
    #[test]
    fn codec_round_trips(lengths in prop::collection::vec(0u64..100_000, 0..64)) {
        let mut bytes = Vec::new();

        for &len in &lengths {
            codec::encode(len, &mut bytes);
        }

        let expected: usize = lengths.iter().map(|&len| codec::encoded_len(len)).sum();
        prop_assert_eq!(bytes.len(), expected);
        prop_assert_eq!(codec::LineLengths::new(&bytes).collect::<Vec<_>>(), lengths);
    }
}

// ============================================================================
// Buffer Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Loading then writing reproduces the file byte for byte, whatever the
    /// segment budget.
    #[test]
    fn load_then_write_is_identity(bytes in file_strategy(), budget in 1u64..64) {
        let (mut buffer, _file) = loaded(&bytes, budget);

        buffer.chain().validate().unwrap();

        let mut out = Vec::new();
        let report = buffer.write_all(&mut out).unwrap();

        prop_assert_eq!(&out, &bytes);
        prop_assert_eq!(report.bytes_written, bytes.len() as u64);
        prop_assert_eq!(report.segments_skipped, 0);
    }

    /// Random edits on a loaded file agree with the model line by line and
    /// in the bytes written out.
    #[test]
    fn edits_follow_the_model(
        bytes in file_strategy(),
        budget in 1u64..64,
        ops in prop::collection::vec(op_strategy(), 0..40),
    ) {
        let (mut buffer, _file) = loaded(&bytes, budget);
        let mut model = Model::from_bytes(&bytes);

        for op in &ops {
            apply(&mut buffer, op);
            model.apply(op);

            assert_matches(&buffer, &model)?;
        }

        let mut out = Vec::new();
        buffer.write_all(&mut out).unwrap();

        buffer.chain().validate().unwrap();
        prop_assert_eq!(buffer.chain().line_count(), model.lines.len());
        prop_assert_eq!(out, model.bytes());
    }

    /// Deleting the line that had no separator leaves the rest terminated.
    #[test]
    fn deleting_unterminated_tail_terminates_output(
        lines in prop::collection::vec(line_strategy(), 2..40),
        budget in 1u64..64,
    ) {
        let bytes = lines.join("\n").into_bytes();
        let (mut buffer, _file) = loaded(&bytes, budget);
        let last = lines.len() - 1;

        buffer.delete_lines(last, last).unwrap();

        let mut out = Vec::new();
        buffer.write_all(&mut out).unwrap();

        let mut expected = lines[..last].join("\n").into_bytes();
        expected.push(b'\n');

        prop_assert_eq!(out, expected);
    }

    /// A chain built only from scratch lines behaves the same way.
    #[test]
    fn edits_on_an_empty_buffer(ops in prop::collection::vec(op_strategy(), 0..40)) {
        let mut buffer = TextBuffer::new(ScratchStore::new().unwrap());
        let mut model = Model::from_bytes(b"");

        for op in &ops {
            apply(&mut buffer, op);
            model.apply(op);
        }

        assert_matches(&buffer, &model)?;

        let mut out = Vec::new();
        buffer.write_all(&mut out).unwrap();

        buffer.chain().validate().unwrap();
        prop_assert_eq!(out, model.bytes());
    }
}
