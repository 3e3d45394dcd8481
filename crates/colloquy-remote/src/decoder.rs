/// Incremental UTF-8 decoder for chunked bodies
///
/// A multi-byte character split across two reads is held back until the rest
/// of it arrives. Invalid sequences decode to U+FFFD. State lives for one
/// stream; create a new decoder per stream.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, returning only the text completed by it
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut rest = buf.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Bytes held back waiting for the rest of a character
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// End of stream. Returns how many dangling bytes were discarded.
    pub fn finish(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
