/// Docker Output Demultiplexer
///
/// **Core Responsibility:**
/// Split a container's output stream into stdout and stderr.
///
/// The daemon multiplexes both streams onto one connection when the
/// container has no TTY. Each record is framed as an 8-byte header
/// `[stream:1][\0\0\0][size:4 BE]` followed by `size` payload bytes;
/// stream type 1 is stdout, 2 is stderr.
///
/// Typed frames handed over by the client library route directly. Raw
/// byte chunks (daemons or proxies that do not pre-split the stream)
/// go through the frame parser, which tolerates headers and payloads
/// split across arbitrary chunk boundaries and stops cleanly on a
/// truncated trailing frame. A raw chunk that is not framed at all is
/// treated as plain stdout.
use bollard::container::LogOutput;

const HEADER_LEN: usize = 8;

const STREAM_STDOUT: u8 = 1;
const STREAM_STDERR: u8 = 2;

#[derive(Debug, Default)]
pub struct Demuxer {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    pending: Vec<u8>,
}

impl Demuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one frame from the attach stream.
    pub fn feed(&mut self, frame: LogOutput) {
        match frame {
            LogOutput::StdOut { message } => self.stdout.extend_from_slice(&message),
            LogOutput::StdErr { message } => self.stderr.extend_from_slice(&message),
            LogOutput::Console { message } => self.feed_raw(&message),
            LogOutput::StdIn { .. } => {}
        }
    }

    /// Consume a chunk of the raw multiplexed byte stream.
    pub fn feed_raw(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        self.drain_frames();
    }

    fn drain_frames(&mut self) {
        loop {
            if self.pending.len() < HEADER_LEN {
                return;
            }
            if !is_frame_header(&self.pending[..HEADER_LEN]) {
                // Not a multiplexed stream after all; pass through as stdout.
                self.stdout.append(&mut self.pending);
                return;
            }

            let size = u32::from_be_bytes([
                self.pending[4],
                self.pending[5],
                self.pending[6],
                self.pending[7],
            ]) as usize;

            if self.pending.len() < HEADER_LEN + size {
                // Incomplete payload; wait for the next chunk.
                return;
            }

            let payload = &self.pending[HEADER_LEN..HEADER_LEN + size];
            match self.pending[0] {
                STREAM_STDOUT => self.stdout.extend_from_slice(payload),
                STREAM_STDERR => self.stderr.extend_from_slice(payload),
                // Stream 0 (stdin echo) and unknown types are discarded.
                _ => {}
            }
            self.pending.drain(..HEADER_LEN + size);
        }
    }

    /// Finish the stream and take the captured output. A truncated
    /// trailing frame is dropped; trailing bytes that never looked like a
    /// frame are kept as stdout.
    pub fn finish(mut self) -> (String, String) {
        if !self.pending.is_empty() && !looks_like_header_prefix(&self.pending) {
            self.stdout.append(&mut self.pending);
        }
        (
            String::from_utf8_lossy(&self.stdout).into_owned(),
            String::from_utf8_lossy(&self.stderr).into_owned(),
        )
    }
}

fn is_frame_header(header: &[u8]) -> bool {
    header[0] <= STREAM_STDERR && header[1] == 0 && header[2] == 0 && header[3] == 0
}

fn looks_like_header_prefix(bytes: &[u8]) -> bool {
    match bytes.len() {
        0 => true,
        1 => bytes[0] <= STREAM_STDERR,
        _ => bytes[0] <= STREAM_STDERR && bytes[1..bytes.len().min(4)].iter().all(|b| *b == 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(stream: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![stream, 0, 0, 0];
        out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_single_stdout_frame() {
        let mut demux = Demuxer::new();
        demux.feed_raw(&frame(1, b"hello\n"));

        let (stdout, stderr) = demux.finish();
        assert_eq!(stdout, "hello\n");
        assert_eq!(stderr, "");
    }

    #[test]
    fn test_interleaved_streams() {
        let mut demux = Demuxer::new();
        demux.feed_raw(&frame(1, b"out1"));
        demux.feed_raw(&frame(2, b"err1"));
        demux.feed_raw(&frame(1, b"out2"));

        let (stdout, stderr) = demux.finish();
        assert_eq!(stdout, "out1out2");
        assert_eq!(stderr, "err1");
    }

    #[test]
    fn test_frames_split_across_chunks() {
        let bytes: Vec<u8> = [frame(1, b"abc"), frame(2, b"defgh")].concat();

        // Feed one byte at a time; header and payload boundaries land
        // everywhere.
        let mut demux = Demuxer::new();
        for b in &bytes {
            demux.feed_raw(std::slice::from_ref(b));
        }

        let (stdout, stderr) = demux.finish();
        assert_eq!(stdout, "abc");
        assert_eq!(stderr, "defgh");
    }

    #[test]
    fn test_truncated_trailing_frame_dropped() {
        let mut bytes = frame(1, b"kept");
        bytes.extend_from_slice(&[2, 0, 0, 0, 0, 0, 0, 10]); // promises 10 bytes
        bytes.extend_from_slice(b"only4");

        let mut demux = Demuxer::new();
        demux.feed_raw(&bytes);

        let (stdout, stderr) = demux.finish();
        assert_eq!(stdout, "kept");
        assert_eq!(stderr, "");
    }

    #[test]
    fn test_unknown_stream_type_discarded() {
        let mut demux = Demuxer::new();
        demux.feed_raw(&frame(0, b"stdin echo"));
        demux.feed_raw(&frame(1, b"real"));

        let (stdout, stderr) = demux.finish();
        assert_eq!(stdout, "real");
        assert_eq!(stderr, "");
    }

    #[test]
    fn test_unframed_chunk_is_stdout() {
        let mut demux = Demuxer::new();
        demux.feed_raw(b"plain tty-style output\n");

        let (stdout, stderr) = demux.finish();
        assert_eq!(stdout, "plain tty-style output\n");
        assert_eq!(stderr, "");
    }

    #[test]
    fn test_typed_frames_route_directly() {
        let mut demux = Demuxer::new();
        demux.feed(LogOutput::StdOut {
            message: bytes::Bytes::from_static(b"typed out"),
        });
        demux.feed(LogOutput::StdErr {
            message: bytes::Bytes::from_static(b"typed err"),
        });

        let (stdout, stderr) = demux.finish();
        assert_eq!(stdout, "typed out");
        assert_eq!(stderr, "typed err");
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut demux = Demuxer::new();
        demux.feed_raw(&frame(1, b""));
        demux.feed_raw(&frame(2, b"err"));

        let (stdout, stderr) = demux.finish();
        assert_eq!(stdout, "");
        assert_eq!(stderr, "err");
    }
}
