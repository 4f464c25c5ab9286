//! Binary wire protocol shared by the client and the server handler.
//!
//! All integers are big-endian; file sizes in request heads travel as
//! IEEE-754 doubles like the manifest format.
//!
//! Session preamble (client to server): 16-byte zero-padded algorithm name.
//!
//! Requests are one tag byte followed by the body:
//! ```text
//! CHECK   (0x00): tag | size:8 | digest:N | path_len:2 | path
//! COPY    (0x01): tag | size:8 | digest:N | path_len:2 | path | payload:size
//! COMPARE (0x02): tag | count:8 | size:8 | digest:N
//! ```
//!
//! Replies are length-prefixed frames so the reader never depends on the
//! peer closing its write half:
//! ```text
//! frame_len:4 | code:4 | payload (frame_len - 4 bytes)
//! ```
//! Payload by code:
//! ```text
//! OK         (0): size:8 | digest:N | path_len:2 | path
//! DIGEST     (1): want:N | got:N | path_len:2 | path
//! SIZE       (2): want:8 | got:8 | path_len:2 | path
//! NOENT      (3): path_len:2 | path
//! UNEXPECTED (4): UTF-8 message
//! ```

use std::io::{self, Cursor, Read, Write};

use crate::entry::Coze;
use crate::error::{Error, Result};
use crate::wire;

/// Request tag bytes.
pub mod req {
    pub const CHECK: u8 = 0x00;
    pub const COPY: u8 = 0x01;
    pub const COMPARE: u8 = 0x02;
}

/// Reply codes.
pub mod code {
    pub const OK: u32 = 0;
    pub const DIGEST: u32 = 1;
    pub const SIZE: u32 = 2;
    pub const NOENT: u32 = 3;
    pub const UNEXPECTED: u32 = 4;
}

/// Width of the algorithm preamble.
pub const PREAMBLE_LEN: usize = 16;

/// Send the zero-padded algorithm name that opens a session.
pub fn write_preamble<W: Write>(w: &mut W, algorithm: &str) -> io::Result<()> {
    let mut buf = [0u8; PREAMBLE_LEN];
    let name = algorithm.as_bytes();
    let len = name.len().min(PREAMBLE_LEN);
    buf[..len].copy_from_slice(&name[..len]);
    w.write_all(&buf)
}

/// Read the session preamble and return the algorithm name.
pub fn read_preamble<R: Read>(r: &mut R) -> Result<String> {
    let mut buf = [0u8; PREAMBLE_LEN];
    r.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(PREAMBLE_LEN);
    std::str::from_utf8(&buf[..end])
        .map(str::to_string)
        .map_err(|_| Error::Protocol("algorithm preamble is not ASCII".into()))
}

/// Decoded head of a CHECK or COPY request.
#[derive(Debug)]
pub struct RequestHead {
    pub size: u64,
    pub digest: Vec<u8>,
    pub path: String,
}

/// Encode a CHECK or COPY head; a COPY's payload bytes follow separately.
pub fn write_request_head<W: Write>(
    w: &mut W,
    tag: u8,
    size: u64,
    digest: &[u8],
    path: &str,
) -> Result<()> {
    w.write_all(&[tag])?;
    wire::write_size(w, size)?;
    w.write_all(digest)?;
    wire::write_path(w, path)?;
    Ok(())
}

/// Decode the fields following a CHECK or COPY tag byte.
pub fn read_request_head<R: Read>(r: &mut R, width: usize) -> Result<RequestHead> {
    let size = wire::read_size(r)?;
    let digest = wire::read_vec(r, width)?;
    let path = wire::read_path(r)?;
    Ok(RequestHead { size, digest, path })
}

/// Decoded COMPARE request.
#[derive(Debug)]
pub struct CompareRequest {
    pub count: u64,
    pub size: u64,
    pub digest: Vec<u8>,
}

/// Encode a COMPARE request.
pub fn write_compare<W: Write>(w: &mut W, cz: &Coze, digest: &[u8]) -> io::Result<()> {
    w.write_all(&[req::COMPARE])?;
    w.write_all(&cz.count.to_be_bytes())?;
    wire::write_size(w, cz.size)?;
    w.write_all(digest)
}

/// Decode the fields following a COMPARE tag byte.
pub fn read_compare<R: Read>(r: &mut R, width: usize) -> Result<CompareRequest> {
    let count = wire::read_u64(r)?;
    let size = wire::read_size(r)?;
    let digest = wire::read_vec(r, width)?;
    Ok(CompareRequest {
        count,
        size,
        digest,
    })
}

/// A server reply, typed on both ends of the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok {
        size: u64,
        digest: Vec<u8>,
        path: String,
    },
    BadDigest {
        want: Vec<u8>,
        got: Vec<u8>,
        path: String,
    },
    BadSize {
        want: u64,
        got: u64,
        path: String,
    },
    NoEnt {
        path: String,
    },
    Unexpected {
        message: String,
    },
}

impl Reply {
    /// Encode as one length-prefixed frame and flush.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut payload = Vec::new();
        let code = match self {
            Reply::Ok { size, digest, path } => {
                payload.extend_from_slice(&size.to_be_bytes());
                payload.extend_from_slice(digest);
                wire::write_path(&mut payload, path)?;
                code::OK
            }
            Reply::BadDigest { want, got, path } => {
                payload.extend_from_slice(want);
                payload.extend_from_slice(got);
                wire::write_path(&mut payload, path)?;
                code::DIGEST
            }
            Reply::BadSize { want, got, path } => {
                payload.extend_from_slice(&want.to_be_bytes());
                payload.extend_from_slice(&got.to_be_bytes());
                wire::write_path(&mut payload, path)?;
                code::SIZE
            }
            Reply::NoEnt { path } => {
                wire::write_path(&mut payload, path)?;
                code::NOENT
            }
            Reply::Unexpected { message } => {
                payload.extend_from_slice(message.as_bytes());
                code::UNEXPECTED
            }
        };

        let frame_len = u32::try_from(4 + payload.len())
            .map_err(|_| Error::Protocol("reply frame too large".into()))?;
        w.write_all(&frame_len.to_be_bytes())?;
        w.write_all(&code.to_be_bytes())?;
        w.write_all(&payload)?;
        w.flush()?;
        Ok(())
    }

    /// Decode one frame. `width` is the session's digest width.
    pub fn read_from<R: Read>(r: &mut R, width: usize) -> Result<Reply> {
        let frame_len = wire::read_u32(r)? as usize;
        if frame_len < 4 {
            return Err(Error::Protocol("short reply frame".into()));
        }
        let code = wire::read_u32(r)?;
        let payload = wire::read_vec(r, frame_len - 4)?;
        let mut cur = Cursor::new(payload.as_slice());

        let reply = match code {
            code::OK => {
                let size = wire::read_u64(&mut cur)?;
                // The session-opening OK carries an empty digest.
                let digest = if payload.len() >= 8 + width + 2 {
                    wire::read_vec(&mut cur, width)?
                } else {
                    Vec::new()
                };
                let path = wire::read_path(&mut cur)?;
                Reply::Ok { size, digest, path }
            }
            code::DIGEST => Reply::BadDigest {
                want: wire::read_vec(&mut cur, width)?,
                got: wire::read_vec(&mut cur, width)?,
                path: wire::read_path(&mut cur)?,
            },
            code::SIZE => Reply::BadSize {
                want: wire::read_u64(&mut cur)?,
                got: wire::read_u64(&mut cur)?,
                path: wire::read_path(&mut cur)?,
            },
            code::NOENT => Reply::NoEnt {
                path: wire::read_path(&mut cur)?,
            },
            code::UNEXPECTED => Reply::Unexpected {
                message: String::from_utf8_lossy(&payload).into_owned(),
            },
            other => return Err(Error::Protocol(format!("unknown reply code {other}"))),
        };
        Ok(reply)
    }

    /// Map a decoded reply onto the error taxonomy.
    pub fn into_result(self) -> Result<()> {
        match self {
            Reply::Ok { .. } => Ok(()),
            Reply::BadDigest { want, got, path } => {
                Err(Error::ChecksumMismatch { path, want, got })
            }
            Reply::BadSize { want, got, path } => Err(Error::SizeMismatch { path, want, got }),
            Reply::NoEnt { path } => Err(Error::NoSuchFile { path }),
            Reply::Unexpected { message } => Err(Error::Unexpected(message)),
        }
    }
}
