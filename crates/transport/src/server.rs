//! Server side of the protocol: one handler per accepted connection.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use treesum_core::digest::Digest;
use treesum_core::entry::{self, Coze};
use treesum_core::error::Result;
use treesum_core::protocol::{self, req, Reply};

const COPY_BUF: usize = 64 * 1024;

/// Per-connection state machine.
///
/// CHECK and COPY feed the connection's running digest and counters, so a
/// final COMPARE can validate the whole session. The local digest is reset
/// before every request; the global one never is.
pub struct Handler<S: Read + Write> {
    stream: BufReader<S>,
    digest: Digest,
    cz: Coze,
    base: PathBuf,
}

impl<S: Read + Write> Handler<S> {
    /// Read the session preamble, build the digest, and send the opening
    /// status. A rejected algorithm is reported to the peer before failing.
    pub fn new(stream: S, base: PathBuf) -> Result<Self> {
        let mut stream = BufReader::new(stream);
        let algorithm = protocol::read_preamble(&mut stream)?;
        match Digest::new(&algorithm) {
            Ok(digest) => {
                let mut handler = Self {
                    stream,
                    digest,
                    cz: Coze::default(),
                    base,
                };
                handler.send(&Reply::Ok {
                    size: 0,
                    digest: Vec::new(),
                    path: String::new(),
                })?;
                Ok(handler)
            }
            Err(err) => {
                let refusal = Reply::Unexpected {
                    message: err.to_string(),
                };
                let _ = refusal.write_to(stream.get_mut());
                Err(err)
            }
        }
    }

    /// Serve requests until the peer disconnects.
    ///
    /// Semantic failures are replied and the connection stays open; a
    /// malformed request tears the connection down.
    pub fn run(&mut self) -> Result<()> {
        loop {
            let mut tag = [0u8; 1];
            if self.stream.read_exact(&mut tag).is_err() {
                return Ok(());
            }
            self.digest.reset();

            let reply = match tag[0] {
                req::CHECK => self.check(),
                req::COPY => self.copy(),
                req::COMPARE => self.compare(),
                other => {
                    debug!("unknown request tag {other:#04x}");
                    Ok(Reply::Unexpected {
                        message: format!("unsupported request {other:#04x}"),
                    })
                }
            };
            let reply = match reply {
                Ok(reply) => reply,
                Err(err) => {
                    let _ = self.send(&Reply::Unexpected {
                        message: err.to_string(),
                    });
                    return Err(err);
                }
            };

            if let Reply::Ok { size, .. } = &reply {
                self.cz.update(*size);
            }
            if self.send(&reply).is_err() {
                return Ok(());
            }
        }
    }

    fn send(&mut self, reply: &Reply) -> Result<()> {
        reply.write_to(self.stream.get_mut())
    }

    fn check(&mut self) -> Result<Reply> {
        let head = protocol::read_request_head(&mut self.stream, self.digest.size())?;
        let path = self.base.join(entry::relative(&head.path));

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(_) => return Ok(Reply::NoEnt { path: head.path }),
        };
        let got = match io::copy(&mut file, &mut self.digest) {
            Ok(got) => got,
            Err(err) => {
                return Ok(Reply::Unexpected {
                    message: err.to_string(),
                })
            }
        };

        if got != head.size {
            return Ok(Reply::BadSize {
                want: head.size,
                got,
                path: head.path,
            });
        }
        let local = self.digest.local();
        if local != head.digest {
            return Ok(Reply::BadDigest {
                want: head.digest,
                got: local,
                path: head.path,
            });
        }
        Ok(Reply::Ok {
            size: head.size,
            digest: local,
            path: head.path,
        })
    }

    fn copy(&mut self) -> Result<Reply> {
        let head = protocol::read_request_head(&mut self.stream, self.digest.size())?;
        let dest = self.base.join(entry::relative(&head.path));

        // The wire body is consumed in full even when the local side fails,
        // so the connection stays framed.
        let prepared = (|| -> io::Result<(PathBuf, File)> {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            let staging = part_path(&dest);
            let file = File::create(&staging)?;
            Ok((staging, file))
        })();
        let (staging, mut file) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.drain_body(head.size)?;
                return Ok(Reply::Unexpected {
                    message: err.to_string(),
                });
            }
        };

        let mut remaining = head.size;
        let mut got = 0u64;
        let mut buf = [0u8; COPY_BUF];
        let mut write_err = None;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = match self.stream.read(&mut buf[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    drop(file);
                    let _ = fs::remove_file(&staging);
                    return Err(err.into());
                }
            };
            self.digest.write_all(&buf[..n])?;
            if write_err.is_none() {
                if let Err(err) = file.write_all(&buf[..n]) {
                    write_err = Some(err);
                }
            }
            got += n as u64;
            remaining -= n as u64;
        }
        drop(file);

        let verdict = if let Some(err) = write_err {
            Reply::Unexpected {
                message: err.to_string(),
            }
        } else if got != head.size {
            Reply::BadSize {
                want: head.size,
                got,
                path: head.path,
            }
        } else {
            let local = self.digest.local();
            if local != head.digest {
                Reply::BadDigest {
                    want: head.digest,
                    got: local,
                    path: head.path,
                }
            } else {
                match fs::rename(&staging, &dest) {
                    Ok(()) => {
                        return Ok(Reply::Ok {
                            size: head.size,
                            digest: local,
                            path: head.path,
                        })
                    }
                    Err(err) => Reply::Unexpected {
                        message: err.to_string(),
                    },
                }
            }
        };

        // Verification failed: never leave a valid-looking file behind.
        let _ = fs::remove_file(&staging);
        Ok(verdict)
    }

    fn compare(&mut self) -> Result<Reply> {
        let req = protocol::read_compare(&mut self.stream, self.digest.size())?;

        if self.cz.count != req.count || self.cz.size != req.size {
            return Ok(Reply::Unexpected {
                message: format!(
                    "count/size mismatched ({}/{} != {}/{})",
                    self.cz.count, self.cz.size, req.count, req.size
                ),
            });
        }
        let global = self.digest.global();
        if global != req.digest {
            return Ok(Reply::BadDigest {
                want: req.digest,
                got: global,
                path: String::new(),
            });
        }
        Ok(Reply::Ok {
            size: req.size,
            digest: global,
            path: String::new(),
        })
    }

    fn drain_body(&mut self, size: u64) -> Result<()> {
        let mut remaining = size;
        let mut buf = [0u8; COPY_BUF];
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = self.stream.read(&mut buf[..want])?;
            if n == 0 {
                break;
            }
            self.digest.write_all(&buf[..n])?;
            remaining -= n as u64;
        }
        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}
