//! Line input written to the PTY.

use std::io::{self, Write};

use crate::models::LineEnding;

/// Write `line` followed by its terminator as a single write, then flush.
pub fn write_line<W: Write + ?Sized>(writer: &mut W, line: &[u8], ending: LineEnding) -> io::Result<()> {
    let terminator = ending.as_bytes();
    let mut bytes = Vec::with_capacity(line.len() + terminator.len());
    bytes.extend_from_slice(line);
    bytes.extend_from_slice(terminator);
    writer.write_all(&bytes)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_gets_carriage_return() {
        let mut out = Vec::new();
        write_line(&mut out, b"docker image prune -a -f", LineEnding::CarriageReturn).unwrap();
        assert_eq!(out, b"docker image prune -a -f\r");
    }

    #[test]
    fn test_credential_gets_newline() {
        let mut out = Vec::new();
        write_line(&mut out, b"hunter2", LineEnding::Newline).unwrap();
        assert_eq!(out, b"hunter2\n");
    }

    #[test]
    fn test_boxed_writer() {
        let mut out: Box<dyn Write> = Box::new(Vec::new());
        assert!(write_line(out.as_mut(), b"ls", LineEnding::CarriageReturn).is_ok());
    }
}
