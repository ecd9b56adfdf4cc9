//! The persistent dependency database, stored in `.remake`.
//!
//! One record per line: `target: dep dep …`.  Words containing special
//! characters are quoted and escaped; the escape round-trips through the
//! scanner's word reader.  Ordered containers keep saves deterministic.

use crate::scanner::Scanner;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use tracing::debug;

/// Map from targets to their known dependencies, static and dynamic.
pub type DepMap = BTreeMap<String, BTreeSet<String>>;

/// Quote and escape a word if it contains any character the word reader
/// treats specially, otherwise return it unchanged.
pub fn escape_word(word: &str) -> String {
    if !word.bytes().any(|b| matches!(b, b'"' | b' ' | b'\\' | b'$' | b'!')) {
        return word.to_string();
    }
    let mut out = String::with_capacity(word.len() + 2);
    out.push('"');
    for c in word.chars() {
        if matches!(c, '"' | ' ' | '\\' | '$' | '!') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn parse(buf: &[u8]) -> anyhow::Result<DepMap> {
    let mut scanner = Scanner::new(buf);
    let mut deps = DepMap::new();
    loop {
        let target = scanner.read_word();
        if target.is_empty() {
            return Ok(deps);
        }
        debug!("reading dependencies of target {}", target);
        if !scanner.skip(':') {
            anyhow::bail!("Failed to load database");
        }
        let set = deps.entry(target).or_default();
        scanner.skip_spaces();
        loop {
            let dep = scanner.read_word();
            if dep.is_empty() {
                break;
            }
            set.insert(dep);
            scanner.skip_spaces();
        }
        scanner.skip_eol();
    }
}

/// Load the dependency database.  An absent file is not an error.
pub fn load(path: &str) -> anyhow::Result<DepMap> {
    debug!("loading dependency database {}", path);
    let mut buf = match std::fs::read(path) {
        Ok(buf) => buf,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("no dependency database found");
            return Ok(DepMap::new());
        }
        Err(err) => return Err(err.into()),
    };
    buf.push(0);
    parse(&buf)
}

fn format(deps: &DepMap) -> String {
    let mut out = String::new();
    for (target, set) in deps {
        if set.is_empty() {
            continue;
        }
        out.push_str(&escape_word(target));
        out.push_str(": ");
        for dep in set {
            out.push_str(&escape_word(dep));
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

/// Write the dependency database, dropping targets with no recorded deps.
pub fn save(path: &str, deps: &DepMap) -> anyhow::Result<()> {
    debug!("saving dependency database {}", path);
    let mut file = std::fs::File::create(path)?;
    file.write_all(format(deps).as_bytes())?;
    Ok(())
}
