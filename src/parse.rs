//! Parser for `Remakefile` rule files.
//!
//! The grammar is line-oriented: a header of target words, a `:`, dep words,
//! then a script made of the maximal run of TAB-led lines that follows.

use crate::scanner::{ParseResult, Scanner};

/// A build rule.  `generic` is set when the filenames contain a `%`
/// placeholder; matching substitutes the captured stem into targets and deps.
#[derive(Clone, Debug, Default)]
pub struct Rule {
    pub generic: bool,
    pub targets: Vec<String>,
    pub deps: Vec<String>,
    pub script: String,
}

#[derive(Clone, Copy, PartialEq)]
enum State {
    Bof,
    Tgt,
    Dep,
    Script,
}

pub struct Parser<'a> {
    scanner: Scanner<'a>,
}

impl<'a> Parser<'a> {
    pub fn new(buf: &'a [u8]) -> Parser<'a> {
        Parser {
            scanner: Scanner::new(buf),
        }
    }

    /// Read all rules from the buffer.
    pub fn read_rules(&mut self) -> ParseResult<Vec<Rule>> {
        let mut rules = Vec::new();
        let mut current = Rule::default();
        let mut script: Vec<u8> = Vec::new();
        let mut state = State::Bof;
        loop {
            let c = self.scanner.peek();
            if c == '\0' {
                break;
            }
            if state == State::Script && c == '\t' {
                // Script line: strip the TAB, keep the rest verbatim.  The
                // newline is appended by the branch below.
                self.scanner.next();
                while !matches!(self.scanner.peek(), '\n' | '\0') {
                    script.push(self.scanner.read() as u8);
                }
            } else if state == State::Script && (c == '\r' || c == '\n') {
                script.push(c as u8);
                self.scanner.next();
            } else if state == State::Dep && c == '\n' {
                self.scanner.next();
                state = State::Script;
            } else if state == State::Tgt && c == ':' {
                self.scanner.next();
                self.scanner.skip_spaces();
                state = State::Dep;
            } else {
                if state == State::Script {
                    // A non-TAB line ends the script and starts a new header.
                    current.script = String::from_utf8_lossy(&std::mem::take(&mut script)).into_owned();
                    rules.push(std::mem::take(&mut current));
                }
                let word = self.scanner.read_word();
                if word.is_empty() {
                    return self.scanner.parse_error("syntax error");
                }
                self.scanner.skip_spaces();
                if word.contains('%') {
                    if matches!(state, State::Tgt | State::Dep) && !current.generic {
                        return self.scanner.parse_error("syntax error");
                    }
                    current.generic = true;
                } else if state == State::Tgt && current.generic {
                    return self.scanner.parse_error("syntax error");
                }
                if state != State::Dep {
                    current.targets.push(word);
                    state = State::Tgt;
                } else {
                    current.deps.push(word);
                }
            }
        }
        if state != State::Bof {
            current.script = String::from_utf8_lossy(&script).into_owned();
            rules.push(current);
        }
        Ok(rules)
    }
}
