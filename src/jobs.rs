//! Server-side job table: outstanding, not-yet-verified assignments.
//!
//! Exactly one [`Job`] exists per open id.  A job is immutable after
//! creation and is consumed at most once — either by the verification step
//! or by the periodic expiry [`JobTable::sweep`], never both.  The table is
//! owned exclusively by the server's single thread of control; a concurrent
//! caller would have to serialise create/lookup/consume/sweep as one
//! logical unit (a lookup followed by a consume must observe a consistent
//! table).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::calc::Expected;

/// How long an unanswered job stays open before the sweep removes it.
pub const JOB_TTL: Duration = Duration::from_secs(10);

/// One outstanding assignment.
#[derive(Debug, Clone, Copy)]
pub struct Job {
    /// Non-zero identifier, unique among currently open jobs.
    pub id: u32,
    /// Address the hello came from; answers must come from the same peer.
    pub peer: SocketAddr,
    /// Expected result and its comparison rule.
    pub expected: Expected,
    /// Creation timestamp, used by the expiry sweep.
    pub created: Instant,
}

/// Mapping from assignment id to outstanding job.
pub struct JobTable {
    jobs: HashMap<u32, Job>,
    /// Id source.  Ids are opaque; randomness only has to avoid collision
    /// with live keys, which the create loop enforces.
    rng: StdRng,
}

impl JobTable {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic id sequence for tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            jobs: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Store a new job stamped `now` and return its id.
    ///
    /// The id is non-zero and never collides with a live id: zero and
    /// occupied draws are rejected and redrawn.
    pub fn create(&mut self, peer: SocketAddr, expected: Expected, now: Instant) -> u32 {
        let id = loop {
            let candidate: u32 = self.rng.random();
            if candidate != 0 && !self.jobs.contains_key(&candidate) {
                break candidate;
            }
        };
        self.jobs.insert(
            id,
            Job {
                id,
                peer,
                expected,
                created: now,
            },
        );
        id
    }

    pub fn lookup(&self, id: u32) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// Remove and return the job, if present.
    pub fn consume(&mut self, id: u32) -> Option<Job> {
        self.jobs.remove(&id)
    }

    /// Remove every job whose age at `now` is at least `ttl`; returns the
    /// removed ids so the caller can log them.
    pub fn sweep(&mut self, now: Instant, ttl: Duration) -> Vec<u32> {
        let expired: Vec<u32> = self
            .jobs
            .iter()
            .filter(|(_, job)| now.saturating_duration_since(job.created) >= ttl)
            .map(|(&id, _)| id)
            .collect();
        for id in &expired {
            self.jobs.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}
