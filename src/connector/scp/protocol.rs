//! Receiving side of the remote-copy (`scp -f`) wire protocol.
//!
//! One file is exchanged as:
//!
//! ```text
//! local  -> remote   0x00                       ready
//! remote -> local    C<mode> <size> <name>\n    file header
//! local  -> remote   0x00                       header accepted
//! remote -> local    <size bytes>               content
//! remote -> local    0x00                       content complete
//! local  -> remote   0x00                       acknowledged
//! ```
//!
//! Instead of a header the remote may send `0x01<message>\n` (warning) or
//! `0x02<message>\n` (fatal); both end the transfer with
//! [`ConnectorError::Remote`]. The `<name>` field is parsed but never used to
//! choose the destination.

use std::io::{ErrorKind, Read, Write};

use tracing::{debug, trace};

use crate::connector::ConnectorError;
use crate::download::{DownloadError, SavedFile};

/// Upper bound on a header or error record line.
const MAX_RECORD_LEN: usize = 64 * 1024;

/// Parsed `C` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Permission bits (octal in the header).
    pub mode: u32,
    /// Exact content length in bytes.
    pub size: u64,
    /// File name as sent by the remote.
    pub name: String,
}

/// Parses the fields of a `C` record (everything after the `C`).
///
/// # Errors
///
/// Returns [`ConnectorError::Protocol`] unless there are exactly three
/// space-separated fields with an octal mode and a decimal size.
pub fn parse_header(remote_path: &str, fields: &str) -> Result<FileHeader, ConnectorError> {
    let parts: Vec<&str> = fields.trim_end_matches(['\n', '\r']).splitn(3, ' ').collect();
    let [mode, size, name] = parts.as_slice() else {
        return Err(ConnectorError::protocol(
            remote_path,
            format!(
                "malformed file header {fields:?}: expected 3 fields, got {}",
                parts.len()
            ),
        ));
    };

    let mode = u32::from_str_radix(mode, 8).map_err(|_| {
        ConnectorError::protocol(remote_path, format!("invalid mode {mode:?} in file header"))
    })?;
    let size = size.parse::<u64>().map_err(|_| {
        ConnectorError::protocol(remote_path, format!("invalid size {size:?} in file header"))
    })?;

    Ok(FileHeader {
        mode,
        size,
        name: (*name).to_string(),
    })
}

/// Receives one file over an established `scp -f` stream.
///
/// `sink` is handed the header and a reader limited to exactly `size` bytes;
/// it is only called once the header has been validated, so a malformed
/// header never touches the filesystem.
///
/// # Errors
///
/// - [`ConnectorError::Remote`] if the remote sends an error record
/// - [`ConnectorError::Protocol`] for malformed records or status bytes
/// - [`ConnectorError::Stream`] if the stream fails or ends early
/// - whatever `sink` returns, and [`DownloadError::Truncated`] if it consumed
///   fewer than `size` bytes
pub fn receive_file<S, F>(
    stream: &mut S,
    remote_path: &str,
    sink: F,
) -> Result<(FileHeader, SavedFile), ConnectorError>
where
    S: Read + Write + ?Sized,
    F: FnOnce(&FileHeader, &mut dyn Read) -> Result<SavedFile, ConnectorError>,
{
    send_ack(stream, remote_path, "send ready")?;

    let record = read_line(stream, remote_path)?;
    let header = match record.split_first() {
        Some((b'C', fields)) => parse_header(remote_path, &String::from_utf8_lossy(fields))?,
        Some((0x01 | 0x02, message)) => {
            return Err(ConnectorError::remote(
                remote_path,
                String::from_utf8_lossy(message).trim(),
            ));
        }
        Some((other, _)) => {
            return Err(ConnectorError::protocol(
                remote_path,
                format!("unexpected record type 0x{other:02x}"),
            ));
        }
        None => return Err(ConnectorError::protocol(remote_path, "empty record")),
    };
    debug!(
        remote = remote_path,
        mode = %format!("{:o}", header.mode),
        size = header.size,
        "file header"
    );

    send_ack(stream, remote_path, "accept header")?;

    let mut content = Read::take(&mut *stream, header.size);
    let saved = sink(&header, &mut content)?;
    if saved.bytes != header.size {
        return Err(DownloadError::truncated(&saved.path, header.size, saved.bytes).into());
    }

    match read_byte(stream, remote_path, "read completion status")? {
        0 => {}
        0x01 | 0x02 => {
            let message = read_line(stream, remote_path)?;
            return Err(ConnectorError::remote(
                remote_path,
                String::from_utf8_lossy(&message).trim(),
            ));
        }
        other => {
            return Err(ConnectorError::protocol(
                remote_path,
                format!("unexpected completion status 0x{other:02x}"),
            ));
        }
    }

    send_ack(stream, remote_path, "acknowledge")?;
    trace!(remote = remote_path, "transfer acknowledged");
    Ok((header, saved))
}

fn send_ack<S: Write + ?Sized>(
    stream: &mut S,
    remote_path: &str,
    operation: &'static str,
) -> Result<(), ConnectorError> {
    stream
        .write_all(&[0])
        .and_then(|()| stream.flush())
        .map_err(|source| ConnectorError::stream(operation, remote_path, source))
}

fn read_byte<S: Read + ?Sized>(
    stream: &mut S,
    remote_path: &str,
    operation: &'static str,
) -> Result<u8, ConnectorError> {
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte) {
            Ok(0) => {
                return Err(ConnectorError::stream(
                    operation,
                    remote_path,
                    ErrorKind::UnexpectedEof.into(),
                ));
            }
            Ok(_) => return Ok(byte[0]),
            Err(error) if error.kind() == ErrorKind::Interrupted => {}
            Err(error) => return Err(ConnectorError::stream(operation, remote_path, error)),
        }
    }
}

/// Reads bytes up to (not including) the next newline.
fn read_line<S: Read + ?Sized>(stream: &mut S, remote_path: &str) -> Result<Vec<u8>, ConnectorError> {
    let mut line = Vec::new();
    loop {
        match read_byte(stream, remote_path, "read record")? {
            b'\n' => return Ok(line),
            byte => {
                if line.len() >= MAX_RECORD_LEN {
                    return Err(ConnectorError::protocol(remote_path, "record line too long"));
                }
                line.push(byte);
            }
        }
    }
}
