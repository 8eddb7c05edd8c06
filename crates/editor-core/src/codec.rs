//! Compact per-line length encoding.
//!
//! Lengths up to 127 take one byte. Longer lengths are written big-endian in
//! base 128, with the `0x80` bit set on every byte except the last, so 128 is
//! `[0x81, 0x00]` and anything up to 16383 fits in two bytes.

/// Largest length stored in a single byte.
pub const SHORT_MAX: u64 = 0x7F;

const CONTINUATION: u8 = 0x80;

/// Appends the encoding of `len` to `out`.
pub fn encode(len: u64, out: &mut Vec<u8>) {
    if len <= SHORT_MAX {
        out.push(len as u8);

        return;
    }

    let digits = encoded_len(len);

    for shift in (1..digits).rev() {
        out.push(CONTINUATION | ((len >> (7 * shift)) & 0x7F) as u8);
    }

    out.push((len & 0x7F) as u8);
}

/// Number of bytes [`encode`] produces for `len`.
#[inline]
#[must_use]
pub fn encoded_len(len: u64) -> usize {
    let mut digits = 1;
    let mut rest = len >> 7;

    while rest > 0 {
        digits += 1;
        rest >>= 7;
    }

    digits
}

/// Decodes one length starting at `cursor`, returning it with the cursor of
/// the next entry.
///
/// # Panics
///
/// If `bytes` ends in the middle of an entry. Encoded lengths are produced
/// only by [`encode`], so a truncated entry means the owning segment is
/// corrupted.
#[inline]
#[must_use]
pub fn decode(bytes: &[u8], mut cursor: usize) -> (u64, usize) {
    let mut len = 0u64;

    loop {
        let byte = bytes[cursor];

        cursor += 1;
        len = (len << 7) | u64::from(byte & 0x7F);

        if byte & CONTINUATION == 0 {
            return (len, cursor);
        }
    }
}

/// Iterator over the lengths stored in an encoded slice.
#[derive(Clone, Debug)]
pub struct LineLengths<'a> {
    bytes: &'a [u8],
    cursor: usize,
}

impl<'a> LineLengths<'a> {
    #[inline]
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0 }
    }

    /// Byte position of the next entry inside the encoded slice.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Iterator for LineLengths<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.bytes.len() {
            return None;
        }

        let (len, next) = decode(self.bytes, self.cursor);

        self.cursor = next;

        Some(len)
    }
}

#[cfg(test)]
mod codec_tests {
    use super::*;

    fn encoded(len: u64) -> Vec<u8> {
        let mut out = Vec::new();
        encode(len, &mut out);
        out
    }

    #[test]
    fn boundary_encodings() {
        assert_eq!(encoded(0), [0x00]);
        assert_eq!(encoded(1), [0x01]);
        assert_eq!(encoded(127), [0x7F]);
        assert_eq!(encoded(128), [0x81, 0x00]);
        assert_eq!(encoded(300), [0x82, 0x2C]);
        assert_eq!(encoded(16383), [0xFF, 0x7F]);
        assert_eq!(encoded(16384), [0x81, 0x80, 0x00]);
    }

    #[test]
    fn round_trip_small_lengths() {
        for len in 0..=300 {
            let bytes = encoded(len);

            assert_eq!(bytes.len(), encoded_len(len));
            assert_eq!(decode(&bytes, 0), (len, bytes.len()), "len {len}");
        }
    }

    #[test]
    fn iterator_walks_mixed_entries() {
        let mut bytes = Vec::new();

        for len in [1, 200, 5, 70_000, 127] {
            encode(len, &mut bytes);
        }

        let lengths: Vec<u64> = LineLengths::new(&bytes).collect();

        assert_eq!(lengths, vec![1, 200, 5, 70_000, 127]);
    }

    #[test]
    fn iterator_on_empty_slice_is_empty() {
        assert_eq!(LineLengths::new(&[]).count(), 0);
    }
}
