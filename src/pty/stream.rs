//! Background reader thread that turns the blocking PTY reader into a
//! channel of events the driver can wait on with a deadline.

use std::io::{self, Read};
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

const READ_BUFFER_SIZE: usize = 4096;

/// One observation from the PTY master
#[derive(Debug)]
pub enum StreamEvent {
    Data(Vec<u8>),
    /// Clean end-of-stream: empty read, or EIO once the slave side is gone
    Eof,
    Failed(io::Error),
}

/// Receiving end of the reader thread
pub struct OutputStream {
    events: flume::Receiver<StreamEvent>,
    reader_thread: Option<thread::JoinHandle<()>>,
}

impl OutputStream {
    /// Start the reader thread. It exits after forwarding `Eof` or `Failed`,
    /// or once this stream is dropped.
    pub fn spawn<R: Read + Send + 'static>(mut reader: R) -> io::Result<Self> {
        let (tx, rx) = flume::unbounded();
        let reader_thread = thread::Builder::new()
            .name("pty-reader".into())
            .spawn(move || {
                let mut buf = [0u8; READ_BUFFER_SIZE];
                loop {
                    let event = match reader.read(&mut buf) {
                        Ok(0) => StreamEvent::Eof,
                        Ok(n) => StreamEvent::Data(buf[..n].to_vec()),
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) if is_end_of_stream(&e) => {
                            debug!(error = %e, "pty closed by peer");
                            StreamEvent::Eof
                        }
                        Err(e) => StreamEvent::Failed(e),
                    };
                    let last = !matches!(event, StreamEvent::Data(_));
                    if tx.send(event).is_err() || last {
                        break;
                    }
                }
                trace!("pty reader thread exiting");
            })?;

        Ok(Self {
            events: rx,
            reader_thread: Some(reader_thread),
        })
    }

    /// Block until the next event. A finished reader keeps reporting `Eof`.
    pub fn recv(&self) -> StreamEvent {
        self.events.recv().unwrap_or(StreamEvent::Eof)
    }

    /// Wait up to `timeout` for the next event; `None` when nothing arrived.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<StreamEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(flume::RecvTimeoutError::Timeout) => None,
            Err(flume::RecvTimeoutError::Disconnected) => Some(StreamEvent::Eof),
        }
    }

    /// Wait for the reader thread after it has reported end-of-stream
    pub fn join(mut self) {
        if let Some(handle) = self.reader_thread.take() {
            if handle.join().is_err() {
                debug!("pty reader thread panicked");
            }
        }
    }
}

/// Linux reports EIO on the master once every slave descriptor is closed.
#[cfg(unix)]
fn is_end_of_stream(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EIO)
}

#[cfg(not(unix))]
fn is_end_of_stream(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::BrokenPipe
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[cfg(unix)]
    struct ClosedPtyReader;

    #[cfg(unix)]
    impl Read for ClosedPtyReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(libc::EIO))
        }
    }

    #[test]
    fn test_data_then_eof() {
        let stream = OutputStream::spawn(Cursor::new(b"hello".to_vec())).unwrap();
        match stream.recv() {
            StreamEvent::Data(bytes) => assert_eq!(bytes, b"hello"),
            other => panic!("expected data, got {other:?}"),
        }
        assert!(matches!(stream.recv(), StreamEvent::Eof));
        // Finished reader keeps reporting end-of-stream
        assert!(matches!(stream.recv(), StreamEvent::Eof));
        stream.join();
    }

    #[test]
    fn test_read_error_is_reported() {
        let stream = OutputStream::spawn(FailingReader).unwrap();
        match stream.recv() {
            StreamEvent::Failed(e) => assert_eq!(e.kind(), io::ErrorKind::PermissionDenied),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_eio_is_end_of_stream() {
        let stream = OutputStream::spawn(ClosedPtyReader).unwrap();
        assert!(matches!(stream.recv(), StreamEvent::Eof));
    }

    #[test]
    fn test_recv_timeout_when_idle() {
        let (_tx, rx) = flume::unbounded::<Vec<u8>>();
        let reader = ChannelReader(rx);
        let stream = OutputStream::spawn(reader).unwrap();
        assert!(stream.recv_timeout(Duration::from_millis(20)).is_none());
    }

    struct ChannelReader(flume::Receiver<Vec<u8>>);

    impl Read for ChannelReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(bytes) => {
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    Ok(n)
                }
                Err(_) => Ok(0),
            }
        }
    }
}
