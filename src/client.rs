//! Recursive-invocation mode.
//!
//! When a running script invokes the tool with `REMAKE_SOCKET` set, the
//! target list is forwarded to the parent build's server and the process
//! blocks until the reply byte arrives.  Under `sh -e` a failure reply makes
//! the calling script stop and cascade the error.

use anyhow::Context;
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use tracing::debug;

/// Send a build request for `targets` and wait for the verdict.  Returns the
/// process exit code.
pub fn request(socket_path: &OsStr, targets: &[String]) -> anyhow::Result<i32> {
    if targets.is_empty() {
        return Ok(0);
    }
    debug!("connecting to server at {:?}", socket_path);
    let mut stream =
        UnixStream::connect(socket_path).context("Failed to send targets to server")?;

    let job_id: i32 = std::env::var("REMAKE_JOB_ID")
        .ok()
        .and_then(|id| id.parse().ok())
        .unwrap_or(-1);
    stream
        .write_all(&job_id.to_ne_bytes())
        .context("Failed to send targets to server")?;

    for target in targets {
        debug!("requesting {}", target);
        stream
            .write_all(target.as_bytes())
            .context("Failed to send targets to server")?;
        stream
            .write_all(&[0])
            .context("Failed to send targets to server")?;
    }
    stream
        .write_all(&[0])
        .context("Failed to send targets to server")?;

    let mut reply = [0u8; 1];
    match stream.read_exact(&mut reply) {
        Ok(()) if reply[0] == 1 => Ok(0),
        _ => Ok(1),
    }
}
