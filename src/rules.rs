//! Rule store and rule matching.
//!
//! Rules keep their declaration order: among otherwise equivalent matches the
//! earliest rule wins.  A non-generic rule naming the target always preempts
//! generic rules; among generic rules the shortest captured stem wins.

use crate::db::DepMap;
use crate::parse::{Parser, Rule};
use anyhow::anyhow;
use tracing::debug;

pub struct RuleSet {
    rules: Vec<Rule>,
}

/// Substitute the stem for `%` in a pattern.  Patterns without a placeholder
/// pass through unchanged.
fn substitute(pattern: &str, stem: &str) -> String {
    match pattern.find('%') {
        Some(pos) => format!("{}{}{}", &pattern[..pos], stem, &pattern[pos + 1..]),
        None => pattern.to_string(),
    }
}

impl RuleSet {
    /// Load rules from a rule file.  Static deps of non-generic rules are
    /// seeded into `deps` so they participate in obsolescence checks before
    /// the rule ever fires.
    pub fn load(path: &str, deps: &mut DepMap) -> anyhow::Result<RuleSet> {
        debug!("loading rules from {}", path);
        let mut buf = std::fs::read(path)
            .map_err(|_| anyhow!("Failed to load rules: no {} found", path))?;
        buf.push(0);
        let rules = Parser::new(&buf)
            .read_rules()
            .map_err(|err| anyhow!("Failed to load rules: syntax error at line {}", err.line))?;
        for rule in &rules {
            if rule.generic || rule.deps.is_empty() {
                continue;
            }
            for target in &rule.targets {
                debug!("seeding static deps of {}", target);
                deps.entry(target.clone())
                    .or_default()
                    .extend(rule.deps.iter().cloned());
            }
        }
        Ok(RuleSet { rules })
    }

    #[cfg(test)]
    fn from_rules(rules: Vec<Rule>) -> RuleSet {
        RuleSet { rules }
    }

    /// Find the rule for building `target`, with placeholders expanded.
    pub fn find(&self, target: &str) -> Option<Rule> {
        let tbytes = target.as_bytes();
        let tlen = tbytes.len();
        let mut best: Option<Rule> = None;
        let mut best_stem = usize::MAX;
        for rule in &self.rules {
            if !rule.generic {
                if rule.targets.iter().any(|t| t == target) {
                    return Some(rule.clone());
                }
                continue;
            }
            for pattern in &rule.targets {
                let pbytes = pattern.as_bytes();
                let plen = pbytes.len();
                if tlen + 1 < plen {
                    continue;
                }
                let stem_len = tlen - (plen - 1);
                if best_stem <= stem_len {
                    continue;
                }
                let pos = match pattern.find('%') {
                    Some(pos) => pos,
                    None => continue,
                };
                let suffix_len = plen - pos - 1;
                if tbytes[..pos] != pbytes[..pos]
                    || tbytes[tlen - suffix_len..] != pbytes[pos + 1..]
                {
                    continue;
                }
                // Prefix and suffix equality puts both slice bounds on
                // character boundaries.
                let stem = &target[pos..pos + stem_len];
                best_stem = stem_len;
                best = Some(Rule {
                    generic: false,
                    targets: rule.targets.iter().map(|t| substitute(t, stem)).collect(),
                    deps: rule.deps.iter().map(|d| substitute(d, stem)).collect(),
                    script: rule.script.clone(),
                });
                break;
            }
        }
        best
    }
}
