use std::io::{self, Read};

use log::{debug, warn};

// the size of the receive buffer to allocate, in bytes.
const BUFFER_SIZE: usize = 16 * 1024;
// a partial line longer than this is dropped, up to its line ending
const MAX_LINE_LEN: usize = 8 * 1024;

/// the reading half of a server connection. splits the byte stream into lines.
pub struct ServerIo {
    connection: Box<dyn Read + Send>,
    buffer: Box<[u8; BUFFER_SIZE]>,
    message_buffer: String,
    // sometimes, a UTF8 character can be split across the end of a buffer during a receive call.
    // when this happens, the remaining bytes of the character are copied to the start of the
    // buffer, and this value updated to reflect the index into the buffer that the next recv call
    // should start receiving at
    recv_idx: usize,
    closed: bool,
    // the rest of an oversized line is being skipped
    discarding: bool,
}

impl ServerIo {
    pub fn new(connection: Box<dyn Read + Send>) -> Self {
        Self {
            connection,
            buffer: Box::new([0_u8; BUFFER_SIZE]),
            message_buffer: String::new(),
            recv_idx: 0,
            closed: false,
            discarding: false,
        }
    }

    /// blocks until a full line has been received, returning it without its line ending. returns
    /// `Ok(None)` once the server has closed the connection.
    pub fn recv_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.take_line() {
                // clients should ignore 0 length messages
                if line.is_empty() {
                    continue;
                }
                debug!("-> {}", line);
                return Ok(Some(line));
            }
            if self.closed {
                return Ok(None);
            }
            if self.message_buffer.len() > MAX_LINE_LEN {
                if !self.discarding {
                    warn!("dropping a line longer than {} bytes", MAX_LINE_LEN);
                }
                self.message_buffer.clear();
                self.discarding = true;
            }
            self.fill()?;
        }
    }

    fn take_line(&mut self) -> Option<String> {
        // NOTE: some servers only send \n, so split there and trim the \r
        let idx = self.message_buffer.find('\n')?;
        let rest = self.message_buffer.split_off(idx + 1);
        let mut line = std::mem::replace(&mut self.message_buffer, rest);
        if self.discarding {
            self.discarding = false;
            return Some(String::new());
        }
        line.truncate(line.trim_end_matches(['\r', '\n']).len());
        Some(line)
    }

    fn fill(&mut self) -> io::Result<()> {
        let count = loop {
            match self.connection.read(&mut self.buffer[self.recv_idx..]) {
                // TCP streams return Ok(0) when they have been gracefully closed by the other side
                Ok(0) => {
                    self.closed = true;
                    if !self.message_buffer.is_empty() {
                        debug!("dropping partial line {:?}", self.message_buffer);
                        self.message_buffer.clear();
                    }
                    return Ok(());
                }
                Ok(count) => break count,
                // retry on Interrupted
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        let end = self.recv_idx + count;
        let (decoded, invalid) = from_utf8_lossy_split(&self.buffer[..end]);
        self.message_buffer.push_str(decoded.as_str());

        // copy the truncated bytes to the start of the buffer
        let invalid = invalid.to_vec();
        debug_assert!(invalid.len() < 4);
        self.buffer[..invalid.len()].copy_from_slice(invalid.as_slice());
        self.recv_idx = invalid.len();

        Ok(())
    }
}

// decodes a byte slice into a UTF8 string, but if the end of the slice is not valid UTF8,
// keep it to prepend to the next recv.
fn from_utf8_lossy_split(b: &[u8]) -> (String, &[u8]) {
    let mut s = String::new();
    let mut chunks = b.utf8_chunks().peekable();
    while let Some(chunk) = chunks.next() {
        s.push_str(chunk.valid());
        // if there's invalid data, either replace it if it's not at the end of the chunk,
        // or split it if it is
        if !chunk.invalid().is_empty() {
            // an incomplete character at the very end may be completed by the next recv
            if chunks.peek().is_none() && chunk.invalid().len() < 4 && is_truncated(chunk.invalid())
            {
                return (s, chunk.invalid());
            }
            // UTF8 replacement char
            s.push('\u{FFFD}');
        }
    }

    // no end of input errors were found
    (s, [].as_slice())
}

// whether the bytes are the start of a multi-byte UTF8 character that was cut off
fn is_truncated(bytes: &[u8]) -> bool {
    let Some(&lead) = bytes.first() else {
        return false;
    };
    let expected = match lead {
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return false,
    };
    bytes.len() < expected
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// hands out the input in fixed size pieces, to split lines and characters across reads
    struct Chunked {
        data: Vec<u8>,
        pos: usize,
        size: usize,
    }

    impl Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = (self.pos + self.size).min(self.data.len());
            let count = (end - self.pos).min(buf.len());
            buf[..count].copy_from_slice(&self.data[self.pos..self.pos + count]);
            self.pos += count;
            Ok(count)
        }
    }

    #[test]
    fn splits_lines() {
        let data = b"PING :a\r\n\r\n:srv 001 me :hi\nPART #c".to_vec();
        let mut io = ServerIo::new(Box::new(Cursor::new(data)));
        assert_eq!(io.recv_line().unwrap().as_deref(), Some("PING :a"));
        assert_eq!(io.recv_line().unwrap().as_deref(), Some(":srv 001 me :hi"));
        // the partial last line is dropped at EOF
        assert_eq!(io.recv_line().unwrap(), None);
        assert_eq!(io.recv_line().unwrap(), None);
    }

    #[test]
    fn characters_split_across_reads() {
        let data = "PRIVMSG #c :héllo ✓\r\n".as_bytes().to_vec();
        for size in 1..6 {
            let mut io = ServerIo::new(Box::new(Chunked {
                data: data.clone(),
                pos: 0,
                size,
            }));
            assert_eq!(
                io.recv_line().unwrap().as_deref(),
                Some("PRIVMSG #c :héllo ✓")
            );
        }
    }

    #[test]
    fn oversized_lines_are_dropped() {
        let mut data = vec![b'x'; 3 * MAX_LINE_LEN];
        data.extend_from_slice(b"\r\nPING :after\r\n");
        let mut io = ServerIo::new(Box::new(Chunked {
            data,
            pos: 0,
            size: 1000,
        }));
        assert_eq!(io.recv_line().unwrap().as_deref(), Some("PING :after"));
        assert!(io.message_buffer.is_empty());
        assert_eq!(io.recv_line().unwrap(), None);
    }

    #[test]
    fn invalid_bytes_are_replaced() {
        let (s, rest) = from_utf8_lossy_split(b"a\xFFb");
        assert_eq!(s, "a\u{FFFD}b");
        assert!(rest.is_empty());

        let (s, rest) = from_utf8_lossy_split(b"ok\xE2\x9C");
        assert_eq!(s, "ok");
        assert_eq!(rest, b"\xE2\x9C");
    }
}
