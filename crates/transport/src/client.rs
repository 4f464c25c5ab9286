//! Client side of the protocol: one TCP connection, one session.

use std::fs::File;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use treesum_core::entry::{Coze, Entry};
use treesum_core::error::Result;
use treesum_core::protocol::{self, req, Reply};
use treesum_core::scanner::Peer;
use treesum_core::hash;

/// How long to wait for a reply frame before declaring the peer stuck.
const REPLY_TIMEOUT: Duration = Duration::from_secs(1);

/// A connected protocol session.
///
/// Requests are strictly serial: each one awaits its reply before the next
/// is sent.
pub struct Client {
    conn: TcpStream,
    width: usize,
}

impl Client {
    /// Dial `addr`, send the 16-byte algorithm preamble, and await the
    /// opening status.
    ///
    /// # Errors
    /// Fails on an unknown algorithm, connection errors, or a rejecting
    /// peer.
    pub fn connect<A: ToSocketAddrs>(addr: A, algorithm: &str) -> Result<Self> {
        let width = hash::size_of(algorithm)?;
        let conn = TcpStream::connect(addr)?;
        conn.set_read_timeout(Some(REPLY_TIMEOUT))?;

        let mut client = Self { conn, width };
        protocol::write_preamble(&mut client.conn, algorithm)?;
        client.conn.flush()?;
        client.reply()?;
        Ok(client)
    }

    fn reply(&mut self) -> Result<()> {
        Reply::read_from(&mut self.conn, self.width)?.into_result()
    }
}

impl Peer for Client {
    fn check(&mut self, entry: &Entry, digest: &[u8]) -> Result<()> {
        protocol::write_request_head(
            &mut self.conn,
            req::CHECK,
            entry.size,
            digest,
            &entry.path.to_string_lossy(),
        )?;
        self.reply()
    }

    fn copy(&mut self, source: &Path, entry: &Entry, digest: &[u8]) -> Result<()> {
        let mut file = File::open(source)?;
        protocol::write_request_head(
            &mut self.conn,
            req::COPY,
            entry.size,
            digest,
            &entry.path.to_string_lossy(),
        )?;
        io::copy(&mut file, &mut self.conn)?;
        self.reply()
    }

    fn compare(&mut self, cz: &Coze, digest: &[u8]) -> Result<()> {
        protocol::write_compare(&mut self.conn, cz, digest)?;
        self.reply()
    }
}
