//! Shared harness for the e2e tests.  Each test gets a scratch directory,
//! lays out a Remakefile plus input files, and runs the compiled binary
//! against it.

mod basic;
mod generic;

use std::path::PathBuf;
use std::process::{Command, Output};

/// Path of the remake binary that was built alongside the test executable
/// (the test runs from target/<profile>/deps, the binary sits one level up).
pub fn remake_binary() -> PathBuf {
    let exe = std::env::current_exe().expect("test binary path");
    exe.ancestors()
        .nth(2)
        .expect("target directory")
        .join("remake")
}

pub fn assert_stderr_contains(out: &Output, text: &str) {
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains(text),
        "stderr missing {:?}; full stderr:\n{}",
        text,
        stderr
    );
}

/// A scratch build tree for one test.
pub struct TestSpace {
    dir: tempfile::TempDir,
}

impl TestSpace {
    pub fn new() -> anyhow::Result<TestSpace> {
        Ok(TestSpace {
            dir: tempfile::tempdir()?,
        })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write(&self, name: &str, content: &str) -> std::io::Result<()> {
        std::fs::write(self.path(name), content)
    }

    pub fn read(&self, name: &str) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.path(name))
    }

    pub fn read_str(&self, name: &str) -> anyhow::Result<String> {
        Ok(String::from_utf8(self.read(name)?)?)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }

    pub fn remove(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path(name))
    }

    /// Push a file's mtime into the past so anything written later looks
    /// newer despite second-granularity timestamps.
    pub fn age(&self, name: &str) -> anyhow::Result<()> {
        let status = Command::new("touch")
            .arg("-d")
            .arg("2000-01-01T00:00:00")
            .arg(self.path(name))
            .status()?;
        anyhow::ensure!(status.success(), "touch failed");
        Ok(())
    }

    /// Run remake with `args` in the scratch directory.
    pub fn remake(&self, args: &[&str]) -> anyhow::Result<Output> {
        Ok(Command::new(remake_binary())
            .args(args)
            .current_dir(self.dir.path())
            .output()?)
    }

    /// Run remake and require it to succeed.  The error carries the process
    /// output so a failing build shows up in the test report.
    pub fn remake_ok(&self, args: &[&str]) -> anyhow::Result<Output> {
        let out = self.remake(args)?;
        if !out.status.success() {
            anyhow::bail!(
                "remake {:?} exited with {}\n--- stdout\n{}--- stderr\n{}",
                args,
                out.status,
                String::from_utf8_lossy(&out.stdout),
                String::from_utf8_lossy(&out.stderr),
            );
        }
        Ok(out)
    }
}
