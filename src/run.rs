//! Top-level mode selection and build orchestration.
//!
//! With `REMAKE_SOCKET` in the environment the process is a recursive client
//! and merely forwards its targets to the parent build.  Otherwise it is the
//! server: it loads the dependency database and the rules, regenerates the
//! rule file if a rule covers it, and drives the requested targets.

use crate::server::Server;
use crate::status::Status;
use crate::{client, db, rules, work};

const RULE_FILE: &str = "Remakefile";
const DB_FILE: &str = ".remake";

#[derive(argh::FromArgs)]
/// remake, a build system bridging make-style rules and dynamic dependencies
struct Opts {
    /// print lots of debugging information
    #[argh(switch, short = 'd')]
    debug: bool,

    /// allow N jobs at once; 0 for unbounded [default=1]
    #[argh(option, short = 'j', default = "1")]
    jobs: usize,

    /// targets to build
    #[argh(positional)]
    targets: Vec<String>,
}

fn build(opts: &Opts) -> anyhow::Result<i32> {
    let mut deps = db::load(DB_FILE)?;
    let rules = rules::RuleSet::load(RULE_FILE, &mut deps)?;
    let server = Server::create()?;
    let mut work = work::Work::new(rules, deps, opts.jobs, server.socket_path().to_path_buf());

    // A rule may cover the rule file itself; bring it up to date first and
    // reload, since the rules just used may have been stale.
    if work.check_status(RULE_FILE) == Status::Todo {
        work.seed_request(vec![RULE_FILE.to_string()]);
        work.run(&server)?;
        if !work.build_failed() {
            work.reload_rules(RULE_FILE)?;
        }
    }

    if !work.build_failed() {
        work.seed_request(opts.targets.clone());
        work.run(&server)?;
    }

    db::save(DB_FILE, work.deps())?;
    Ok(if work.build_failed() { 1 } else { 0 })
}

pub fn run() -> anyhow::Result<i32> {
    let opts: Opts = argh::from_env();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_max_level(if opts.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    if let Some(socket_path) = std::env::var_os("REMAKE_SOCKET") {
        return client::request(&socket_path, &opts.targets);
    }
    build(&opts)
}
