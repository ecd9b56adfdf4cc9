//! Unix-socket server for recursive build requests.
//!
//! Running scripts reach the scheduler by connecting to the socket named in
//! `REMAKE_SOCKET`.  A request is a 4-byte native-endian job id followed by
//! NUL-terminated target strings and a closing empty string (so the stream
//! ends with two consecutive NULs).  The reply is a single byte.

use crate::signal;
use std::io::Read;
use std::os::fd::AsRawFd;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct Server {
    listener: UnixListener,
    path: PathBuf,
    // Owns the socket's directory; dropping it unlinks the socket.
    _dir: tempfile::TempDir,
}

impl Server {
    /// Install SIGCHLD handling and bind the request socket under a fresh
    /// temporary directory.
    pub fn create() -> anyhow::Result<Server> {
        signal::install_sigchld()?;
        let dir = tempfile::Builder::new().prefix("remake-").tempdir()?;
        let path = dir.path().join("socket");
        let listener = UnixListener::bind(&path)?;
        debug!("listening on {}", path.display());
        Ok(Server {
            listener,
            path,
            _dir: dir,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.path
    }

    /// Sleep until the socket is readable or a signal arrives.  Returns
    /// whether a connection is waiting.  SIGCHLD is unblocked only for the
    /// duration of the wait, via pselect's empty signal mask.
    pub fn wait(&self) -> anyhow::Result<bool> {
        let fd = self.listener.as_raw_fd();
        // Safety: fd_set/sigset manipulation and pselect are libc calls; the
        // fd outlives the call.
        let ret = unsafe {
            let mut fds: libc::fd_set = std::mem::zeroed();
            libc::FD_ZERO(&mut fds);
            libc::FD_SET(fd, &mut fds);
            let mut empty: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut empty);
            libc::pselect(
                fd + 1,
                &mut fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null(),
                &empty,
            )
        };
        if ret < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(err.into());
        }
        Ok(ret > 0)
    }

    pub fn accept(&self) -> std::io::Result<UnixStream> {
        let (stream, _) = self.listener.accept()?;
        Ok(stream)
    }
}

/// Read one request frame: the requesting job id and the target list.
/// Any framing violation surfaces as an io::Error.
pub fn read_request(stream: &mut UnixStream) -> std::io::Result<(i32, Vec<String>)> {
    let mut id_buf = [0u8; 4];
    stream.read_exact(&mut id_buf)?;
    let job_id = i32::from_ne_bytes(id_buf);
    debug!("receiving request from job {}", job_id);

    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() >= 2 && buf[buf.len() - 1] == 0 && buf[buf.len() - 2] == 0 {
            break;
        }
    }

    let mut targets = Vec::new();
    for record in buf.split(|&b| b == 0) {
        if record.is_empty() {
            break;
        }
        targets.push(String::from_utf8_lossy(record).into_owned());
    }
    Ok((job_id, targets))
}
