//! Build scheduler: drives client requests, starts jobs under the slot cap,
//! and records job results.
//!
//! A client is a pending build request.  Besides the original client seeded
//! from the command line there are real clients (scripts that connected over
//! the socket) and dependency clients (synthesized to bring a rule's static
//! deps up to date before its script runs).  The client list is kept
//! front-first and new clients are inserted at the front, so traversal is
//! depth-first.

use crate::db::DepMap;
use crate::parse::Rule;
use crate::process;
use crate::rules::RuleSet;
use crate::server::{self, Server};
use crate::signal;
use crate::status::{Status, StatusMap};
use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Write;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use tracing::debug;

struct Client {
    /// Reply stream for real clients.
    stream: Option<UnixStream>,
    /// Job whose script spawned the client; -1 for original clients.
    job_id: i32,
    /// Targets not yet started.
    pending: VecDeque<String>,
    /// Targets being built.
    running: HashSet<String>,
    /// For dependency clients, the rule whose script runs on completion.
    delayed: Option<Rule>,
}

impl Client {
    fn original(targets: Vec<String>) -> Client {
        Client {
            stream: None,
            job_id: -1,
            pending: targets.into(),
            running: HashSet::new(),
            delayed: None,
        }
    }

    fn real(stream: UnixStream, job_id: i32, targets: Vec<String>) -> Client {
        Client {
            stream: Some(stream),
            job_id,
            pending: targets.into(),
            running: HashSet::new(),
            delayed: None,
        }
    }

    fn dependency(job_id: i32, pending: VecDeque<String>, rule: Rule) -> Client {
        Client {
            stream: None,
            job_id,
            pending,
            running: HashSet::new(),
            delayed: Some(rule),
        }
    }
}

enum StartOutcome {
    /// No rule matches; the target is now Failed.
    NoRule,
    /// The script was spawned immediately.
    Spawned,
    /// A dependency client was inserted at the current list position; the
    /// requesting client moved one slot back.
    Deferred,
}

pub struct Work {
    rules: RuleSet,
    deps: DepMap,
    status: StatusMap,
    clients: Vec<Client>,
    job_targets: HashMap<i32, Vec<String>>,
    job_pids: HashMap<i32, i32>,
    job_counter: i32,
    /// Unreaped child processes.
    running_jobs: usize,
    /// Real clients whose reply has not been sent.  Their shells are parked
    /// on the socket, so they do not compete for job slots.
    waiting_jobs: usize,
    /// 0 means unbounded.
    max_active_jobs: usize,
    build_failure: bool,
    socket_path: PathBuf,
}

impl Work {
    pub fn new(rules: RuleSet, deps: DepMap, max_active_jobs: usize, socket_path: PathBuf) -> Work {
        Work {
            rules,
            deps,
            status: StatusMap::new(),
            clients: Vec::new(),
            job_targets: HashMap::new(),
            job_pids: HashMap::new(),
            job_counter: 0,
            running_jobs: 0,
            waiting_jobs: 0,
            max_active_jobs,
            build_failure: false,
            socket_path,
        }
    }

    pub fn build_failed(&self) -> bool {
        self.build_failure
    }

    pub fn deps(&self) -> &DepMap {
        &self.deps
    }

    /// Memoized status of `target` against the recorded dependencies.
    pub fn check_status(&mut self, target: &str) -> Status {
        self.status.check(target, &self.deps)
    }

    /// Replace the rule set, re-seeding static deps.  Used after a rule
    /// regenerated the rule file.
    pub fn reload_rules(&mut self, path: &str) -> anyhow::Result<()> {
        self.rules = RuleSet::load(path, &mut self.deps)?;
        Ok(())
    }

    /// Queue an original client for `targets`.
    pub fn seed_request(&mut self, targets: Vec<String>) {
        self.clients.push(Client::original(targets));
    }

    /// Loop until every queued request has completed.
    pub fn run(&mut self, server: &Server) -> anyhow::Result<()> {
        loop {
            self.update_clients();
            if self.running_jobs == 0 {
                debug_assert!(self.clients.is_empty());
                break;
            }
            if server.wait()? {
                self.accept_client(server);
            }
            if signal::take_sigchld() {
                for (pid, success) in process::reap() {
                    if let Some(job_id) = self.job_pids.remove(&pid) {
                        self.running_jobs -= 1;
                        self.complete_job(job_id, success);
                    }
                }
            }
        }
        Ok(())
    }

    fn has_free_slots(&self) -> bool {
        self.max_active_jobs == 0
            || self.running_jobs.saturating_sub(self.waiting_jobs) < self.max_active_jobs
    }

    /// Walk the client list front to back:
    /// - drop running targets that have finished,
    /// - start as many pending targets as the slot cap allows,
    /// - complete requests with nothing pending or running, and requests
    ///   that hit a failed target.
    fn update_clients(&mut self) {
        debug!("updating clients");
        let mut idx = 0;
        while idx < self.clients.len() && self.has_free_slots() {
            debug!("handling client of job {}", self.clients[idx].job_id);
            let mut failed = false;

            let mut finished = Vec::new();
            for target in &self.clients[idx].running {
                match self.status.get(target) {
                    Some(Status::Uptodate { .. }) | Some(Status::Remade) => {
                        finished.push(target.clone());
                    }
                    Some(Status::Failed) => {
                        failed = true;
                        break;
                    }
                    _ => {}
                }
            }
            for target in finished {
                self.clients[idx].running.remove(&target);
            }

            while !failed {
                let target = match self.clients[idx].pending.pop_front() {
                    Some(target) => target,
                    None => break,
                };
                match self.status.check(&target, &self.deps) {
                    Status::Failed => failed = true,
                    Status::Running => {
                        self.clients[idx].running.insert(target);
                    }
                    Status::Uptodate { .. } | Status::Remade => {}
                    Status::Todo => {
                        match self.start(&target, idx) {
                            StartOutcome::NoRule => failed = true,
                            StartOutcome::Spawned => {
                                self.clients[idx].running.insert(target);
                            }
                            StartOutcome::Deferred => {
                                // The new dependency client sits at idx, so
                                // the drain continues into the prerequisite
                                // subtree; its requester moved to idx + 1.
                                self.clients[idx + 1].running.insert(target);
                            }
                        }
                        if !failed && !self.has_free_slots() {
                            return;
                        }
                    }
                }
            }

            if failed {
                debug!("client of job {} failed", self.clients[idx].job_id);
                let client = self.clients.remove(idx);
                self.complete_request(client, false);
                continue;
            }

            // Completing a dependency client here is what launches its
            // deferred script.
            if self.clients[idx].running.is_empty() {
                let client = self.clients.remove(idx);
                self.complete_request(client, true);
            } else {
                idx += 1;
            }
        }
    }

    /// Create a job for `target`.  Marks every target of the matched rule as
    /// running and resets their dep sets to the rule's static deps.  A rule
    /// with static deps gets a dependency client inserted at `idx` instead of
    /// an immediate spawn.
    fn start(&mut self, target: &str, idx: usize) -> StartOutcome {
        debug!("starting job {} for {}", self.job_counter, target);
        let rule = match self.rules.find(target) {
            Some(rule) => rule,
            None => {
                self.status.set(target, Status::Failed);
                eprintln!("No rule for building {}", target);
                return StartOutcome::NoRule;
            }
        };
        for t in &rule.targets {
            self.status.set(t, Status::Running);
            let set = self.deps.entry(t.clone()).or_default();
            set.clear();
            set.extend(rule.deps.iter().cloned());
        }
        let job_id = self.job_counter;
        self.job_counter += 1;
        self.job_targets.insert(job_id, rule.targets.clone());
        if !rule.deps.is_empty() {
            let pending = rule.deps.iter().cloned().collect();
            self.clients
                .insert(idx, Client::dependency(job_id, pending, rule));
            StartOutcome::Deferred
        } else {
            self.run_script(job_id, &rule);
            StartOutcome::Spawned
        }
    }

    fn run_script(&mut self, job_id: i32, rule: &Rule) {
        match process::spawn_script(job_id, rule, &self.socket_path) {
            Ok(pid) => {
                self.running_jobs += 1;
                self.job_pids.insert(pid, job_id);
            }
            Err(err) => {
                debug!("spawn failed for job {}: {}", job_id, err);
                self.complete_job(job_id, false);
            }
        }
    }

    /// Transition every target of a finished job.  Failure removes the
    /// output files so a later run does not mistake them for up to date.
    fn complete_job(&mut self, job_id: i32, success: bool) {
        debug!("completing job {} success={}", job_id, success);
        let targets = match self.job_targets.remove(&job_id) {
            Some(targets) => targets,
            None => return,
        };
        if success {
            for target in &targets {
                self.status.set(target, Status::Remade);
            }
        } else {
            for target in &targets {
                self.status.set(target, Status::Failed);
                let _ = std::fs::remove_file(target);
            }
            eprintln!("Failed to build {}", targets.join(" "));
        }
    }

    /// Send the verdict to a finished client.  A dependency client runs its
    /// deferred script instead; an original client's failure marks the whole
    /// build as failed.
    fn complete_request(&mut self, client: Client, success: bool) {
        debug!(
            "completing request from client of job {} success={}",
            client.job_id, success
        );
        if let Some(rule) = client.delayed {
            if success {
                self.run_script(client.job_id, &rule);
            } else {
                self.complete_job(client.job_id, false);
            }
        } else if let Some(mut stream) = client.stream {
            // The peer may already be gone; nothing useful to do about it.
            let _ = stream.write_all(&[success as u8]);
            self.waiting_jobs -= 1;
        } else if !success {
            self.build_failure = true;
        }
    }

    /// Accept one connection and queue its request at the front of the
    /// client list.  The requested targets become dynamic deps of every
    /// target the requesting job produces.
    fn accept_client(&mut self, server: &Server) {
        let mut stream = match server.accept() {
            Ok(stream) => stream,
            Err(_) => return,
        };
        let (job_id, targets) = match server::read_request(&mut stream) {
            Ok(request) => request,
            Err(_) => {
                eprintln!("Received an ill-formed client message");
                return;
            }
        };
        let producing = match self.job_targets.get(&job_id) {
            Some(targets) => targets.clone(),
            None => {
                eprintln!("Received an ill-formed client message");
                return;
            }
        };
        for target in &targets {
            debug!("adding dependency {} to job {}", target, job_id);
            for produced in &producing {
                self.deps
                    .entry(produced.clone())
                    .or_default()
                    .insert(target.clone());
            }
        }
        self.clients.insert(0, Client::real(stream, job_id, targets));
        self.waiting_jobs += 1;
    }
}
