//! Server side: negotiation/verification dispatch plus the receive loop.
//!
//! There is no connection concept.  Every datagram is self-contained and
//! handled by [`ServerContext::handle_datagram`], which is stateless per
//! datagram — all persistent state lives in the job table inside the
//! context (no ambient globals).  The loop in [`serve`] does one thing per
//! iteration: sweep expired jobs, check the idle deadline, then wait on
//! the socket bounded by a short poll timeout so expiry and idleness are
//! re-checked even with no traffic.
//!
//! Single-threaded by construction: one task owns the context, so the
//! table needs no locking.  Per-datagram work is O(1), which keeps one
//! slow client from stalling the rest in practice.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::addr::{self, AddrError};
use crate::calclib::CalcLib;
use crate::generator;
use crate::jobs::{JobTable, JOB_TTL};
use crate::socket::{Socket, SocketError};
use crate::wire::{self, magic, AssignmentRecord, Inbound, NegotiationMessage};

/// Upper bound on one socket wait, so sweep/idle checks keep running.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// No datagram for this long shuts the server down gracefully.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Addr(#[from] AddrError),
    #[error(transparent)]
    Socket(#[from] SocketError),
}

/// All server state: the job table, the problem source, and the
/// last-activity clock for idle shutdown.
pub struct ServerContext {
    pub jobs: JobTable,
    pub lib: CalcLib,
    last_activity: Instant,
}

impl ServerContext {
    pub fn new() -> Self {
        Self {
            jobs: JobTable::new(),
            lib: CalcLib::new(),
            last_activity: Instant::now(),
        }
    }

    /// Deterministic ids and problems for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            jobs: JobTable::from_seed(seed),
            lib: CalcLib::from_seed(seed),
            last_activity: Instant::now(),
        }
    }

    /// True once no datagram has arrived for [`IDLE_TIMEOUT`].
    pub fn idle_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) >= IDLE_TIMEOUT
    }

    /// Handle one inbound datagram and produce the reply bytes.
    ///
    /// UDP always supplies a source address, so every request gets an
    /// explicit reply — including a reject for well-formed-size but
    /// wrong-content hellos, which are never silently dropped.
    pub fn handle_datagram(&mut self, buf: &[u8], peer: SocketAddr, now: Instant) -> Vec<u8> {
        self.last_activity = now;

        match wire::classify(buf) {
            Inbound::Negotiation(msg) if msg.is_valid_hello() => {
                self.handle_hello(peer, now).encode().to_vec()
            }
            Inbound::Negotiation(msg) => {
                log::warn!(
                    "invalid hello from {peer}: type={} protocol={} version={}.{}",
                    msg.kind,
                    msg.protocol,
                    msg.major_version,
                    msg.minor_version
                );
                NegotiationMessage::reject().encode().to_vec()
            }
            Inbound::Assignment(rec) => self.handle_answer(rec, peer).encode().to_vec(),
            Inbound::Malformed(n) => {
                log::warn!("malformed datagram of {n} bytes from {peer}");
                NegotiationMessage::reject().encode().to_vec()
            }
        }
    }

    /// A valid hello: create a job and issue the assignment.
    ///
    /// A client that resends its hello before any reply arrives gets a
    /// second, independent job; the orphan is reaped by the expiry sweep.
    fn handle_hello(&mut self, peer: SocketAddr, now: Instant) -> AssignmentRecord {
        let problem = generator::generate(&mut self.lib);
        let id = self.jobs.create(peer, problem.expected, now);
        log::info!(
            "issued job {id} ({}) to {peer}, {} open",
            problem.op.name(),
            self.jobs.len()
        );
        generator::outbound_record(&problem, id)
    }

    /// An assignment-record sized datagram: verify a returned answer.
    fn handle_answer(&mut self, rec: AssignmentRecord, peer: SocketAddr) -> NegotiationMessage {
        if rec.kind != magic::TYPE_NOT_OK || !rec.version_supported() {
            log::warn!(
                "answer from {peer} with bad type/version: type={} version={}.{}",
                rec.kind,
                rec.major_version,
                rec.minor_version
            );
            return NegotiationMessage::reject();
        }

        let Some(&job) = self.jobs.lookup(rec.id) else {
            log::info!("answer from {peer} for unknown job {}", rec.id);
            return NegotiationMessage::reject();
        };

        // A third party must not be able to resolve someone else's job:
        // reject without consuming, so the requester can still answer.
        if job.peer != peer {
            log::warn!(
                "answer for job {} from {peer}, but it was issued to {}",
                rec.id,
                job.peer
            );
            return NegotiationMessage::reject();
        }

        // Consumed exactly once, pass or fail.
        self.jobs.consume(rec.id);

        let correct = job.expected.grade(rec.in_result, rec.fl_result);
        log::info!(
            "job {} from {peer}: {}",
            rec.id,
            if correct { "correct" } else { "incorrect" }
        );
        if correct {
            NegotiationMessage::accept()
        } else {
            NegotiationMessage::reject()
        }
    }
}

impl Default for ServerContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve `addr`, bind, and serve until idle shutdown or Ctrl-C.
pub async fn run(addr: &str) -> Result<(), ServerError> {
    let bind_addr = addr::resolve(addr).await?;
    let socket = Socket::bind(bind_addr).await?;
    log::info!("server listening on {}", socket.local_addr);
    serve(socket, ServerContext::new()).await;
    Ok(())
}

/// The receive loop: sweep, idle check, bounded wait, one datagram.
///
/// Split from [`run`] so tests can bind their own loopback socket (port 0)
/// and learn the assigned address before serving.
///
/// Only a failed startup bind is fatal to the server process.  Per-client
/// socket errors (an ICMP unreachable surfaced for an earlier reply, a
/// transient send failure) are isolated to that client's exchange: logged,
/// then the loop keeps serving everyone else.
pub async fn serve(socket: Socket, mut ctx: ServerContext) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let now = Instant::now();
        for id in ctx.jobs.sweep(now, JOB_TTL) {
            log::warn!("job {id} timed out and removed");
        }
        if ctx.idle_expired(now) {
            log::info!("no traffic for {IDLE_TIMEOUT:?}; shutting down");
            return;
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                log::info!("interrupted; shutting down");
                return;
            }
            // Bounded wait so the next iteration re-checks sweep/idle even
            // with no traffic.
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            result = socket.recv_from() => {
                let (buf, peer) = match result {
                    Ok(v) => v,
                    Err(e) => {
                        log::warn!("receive failed: {e}");
                        continue;
                    }
                };
                log::debug!("received {} bytes from {peer}", buf.len());
                let reply = ctx.handle_datagram(&buf, peer, Instant::now());
                if let Err(e) = socket.send_to(&reply, peer).await {
                    log::warn!("reply to {peer} failed: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{self, Expected, Op, EPSILON};
    use crate::wire::{MESSAGE_LEN, RECORD_LEN};

    fn peer() -> SocketAddr {
        "127.0.0.1:4000".parse().unwrap()
    }

    fn other_peer() -> SocketAddr {
        "127.0.0.1:4001".parse().unwrap()
    }

    /// Build the answer record a well-behaved client would send back.
    fn answer_for(assignment: &AssignmentRecord) -> AssignmentRecord {
        let mut ans = AssignmentRecord {
            kind: magic::TYPE_NOT_OK,
            ..*assignment
        };
        match Op::from_code(assignment.arith) {
            Some(op) if op.is_float() => {
                ans.fl_result = calc::eval_float(op, assignment.fl_value1, assignment.fl_value2);
            }
            Some(op) => {
                ans.in_result = calc::eval_int(op, assignment.in_value1, assignment.in_value2);
            }
            None => panic!("server issued unknown arith code {}", assignment.arith),
        }
        ans
    }

    fn decoded_verdict(reply: &[u8]) -> NegotiationMessage {
        assert_eq!(reply.len(), MESSAGE_LEN, "expected a negotiation message");
        NegotiationMessage::decode(reply).unwrap()
    }

    #[test]
    fn valid_hello_creates_job_and_issues_assignment() {
        let mut ctx = ServerContext::with_seed(1);
        let now = Instant::now();

        let reply = ctx.handle_datagram(&NegotiationMessage::hello().encode(), peer(), now);
        assert_eq!(reply.len(), RECORD_LEN);

        let rec = AssignmentRecord::decode(&reply).unwrap();
        assert_eq!(rec.kind, magic::TYPE_OK);
        assert!(rec.version_supported());
        assert_ne!(rec.id, 0);
        // The expected result is never revealed.
        assert_eq!(rec.in_result, 0);
        assert_eq!(rec.fl_result, 0.0);

        assert_eq!(ctx.jobs.len(), 1);
        assert_eq!(ctx.jobs.lookup(rec.id).unwrap().peer, peer());
    }

    #[test]
    fn full_exchange_passes_and_consumes_the_job() {
        let mut ctx = ServerContext::with_seed(2);
        let now = Instant::now();

        let reply = ctx.handle_datagram(&NegotiationMessage::hello().encode(), peer(), now);
        let assignment = AssignmentRecord::decode(&reply).unwrap();

        let verdict = ctx.handle_datagram(&answer_for(&assignment).encode(), peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_OK);
        assert!(ctx.jobs.is_empty());

        // A second verify attempt on the same id is unknown.
        let again = ctx.handle_datagram(&answer_for(&assignment).encode(), peer(), now);
        assert_eq!(decoded_verdict(&again).message, magic::MSG_NOT_OK);
    }

    #[test]
    fn integer_add_scenario() {
        let mut ctx = ServerContext::with_seed(3);
        let now = Instant::now();
        let id = ctx.jobs.create(peer(), Expected::Int(12), now);

        // Client got operands (5, 7) for add and returns 12.
        let ans = AssignmentRecord {
            kind: magic::TYPE_NOT_OK,
            id,
            arith: Op::Add.code(),
            in_value1: 5,
            in_value2: 7,
            in_result: 12,
            ..AssignmentRecord::empty()
        };
        let verdict = ctx.handle_datagram(&ans.encode(), peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_OK);
        assert!(ctx.jobs.lookup(id).is_none());
    }

    #[test]
    fn wrong_integer_answer_is_rejected_and_still_consumed() {
        let mut ctx = ServerContext::with_seed(4);
        let now = Instant::now();
        let id = ctx.jobs.create(peer(), Expected::Int(12), now);

        let ans = AssignmentRecord {
            kind: magic::TYPE_NOT_OK,
            id,
            in_result: 13,
            ..AssignmentRecord::empty()
        };
        let verdict = ctx.handle_datagram(&ans.encode(), peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_NOT_OK);
        // Consumed regardless of pass/fail.
        assert!(ctx.jobs.is_empty());
    }

    #[test]
    fn float_answer_graded_against_epsilon() {
        let mut ctx = ServerContext::with_seed(5);
        let now = Instant::now();

        let id = ctx.jobs.create(peer(), Expected::Float(2.5), now);
        let close = AssignmentRecord {
            kind: magic::TYPE_NOT_OK,
            id,
            fl_result: 2.5 + EPSILON / 10.0,
            ..AssignmentRecord::empty()
        };
        let verdict = ctx.handle_datagram(&close.encode(), peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_OK);

        let id = ctx.jobs.create(peer(), Expected::Float(2.5), now);
        let far = AssignmentRecord {
            kind: magic::TYPE_NOT_OK,
            id,
            fl_result: 2.5 + EPSILON * 10.0,
            ..AssignmentRecord::empty()
        };
        let verdict = ctx.handle_datagram(&far.encode(), peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_NOT_OK);
    }

    #[test]
    fn answer_from_wrong_address_rejected_without_consuming() {
        let mut ctx = ServerContext::with_seed(6);
        let now = Instant::now();
        let id = ctx.jobs.create(peer(), Expected::Int(7), now);

        let ans = AssignmentRecord {
            kind: magic::TYPE_NOT_OK,
            id,
            in_result: 7,
            ..AssignmentRecord::empty()
        };
        let verdict = ctx.handle_datagram(&ans.encode(), other_peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_NOT_OK);
        assert!(ctx.jobs.lookup(id).is_some(), "job must stay open");

        // The legitimate requester can still resolve it.
        let verdict = ctx.handle_datagram(&ans.encode(), peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_OK);
        assert!(ctx.jobs.is_empty());
    }

    #[test]
    fn malformed_hello_rejected_and_no_job_created() {
        let mut ctx = ServerContext::with_seed(7);
        let mut bad = NegotiationMessage::hello();
        bad.protocol = 18;

        let verdict = ctx.handle_datagram(&bad.encode(), peer(), Instant::now());
        assert_eq!(decoded_verdict(&verdict).kind, magic::TYPE_NOT_OK);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_NOT_OK);
        assert!(ctx.jobs.is_empty());
    }

    #[test]
    fn unknown_size_datagram_gets_a_reject() {
        let mut ctx = ServerContext::with_seed(8);
        let verdict = ctx.handle_datagram(&[0u8; 7], peer(), Instant::now());
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_NOT_OK);
        assert!(ctx.jobs.is_empty());
    }

    #[test]
    fn answer_with_wrong_type_or_version_rejected() {
        let mut ctx = ServerContext::with_seed(9);
        let now = Instant::now();
        let id = ctx.jobs.create(peer(), Expected::Int(0), now);

        let mut ans = AssignmentRecord {
            kind: magic::TYPE_OK, // should be TYPE_NOT_OK on an answer
            id,
            ..AssignmentRecord::empty()
        };
        let verdict = ctx.handle_datagram(&ans.encode(), peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_NOT_OK);

        ans.kind = magic::TYPE_NOT_OK;
        ans.major_version = 2;
        let verdict = ctx.handle_datagram(&ans.encode(), peer(), now);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_NOT_OK);
    }

    #[test]
    fn swept_job_is_unknown_afterwards() {
        let mut ctx = ServerContext::with_seed(10);
        let t0 = Instant::now();
        let id = ctx.jobs.create(peer(), Expected::Int(0), t0);

        let removed = ctx.jobs.sweep(t0 + JOB_TTL, JOB_TTL);
        assert_eq!(removed, vec![id]);

        let ans = AssignmentRecord {
            kind: magic::TYPE_NOT_OK,
            id,
            ..AssignmentRecord::empty()
        };
        let verdict = ctx.handle_datagram(&ans.encode(), peer(), t0);
        assert_eq!(decoded_verdict(&verdict).message, magic::MSG_NOT_OK);
    }

    #[test]
    fn resent_hello_creates_a_second_job() {
        // Documented race: a hello retried before any reply arrives opens a
        // second job; the orphan is only reclaimed by the expiry sweep.
        let mut ctx = ServerContext::with_seed(11);
        let now = Instant::now();
        let hello = NegotiationMessage::hello().encode();

        let first = ctx.handle_datagram(&hello, peer(), now);
        let second = ctx.handle_datagram(&hello, peer(), now);
        let a = AssignmentRecord::decode(&first).unwrap();
        let b = AssignmentRecord::decode(&second).unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(ctx.jobs.len(), 2);

        // Resolving one leaves the orphan for the sweep.
        ctx.handle_datagram(&answer_for(&b).encode(), peer(), now);
        assert_eq!(ctx.jobs.len(), 1);
        assert_eq!(ctx.jobs.sweep(now + JOB_TTL, JOB_TTL), vec![a.id]);
    }

    #[test]
    fn activity_resets_the_idle_clock() {
        let mut ctx = ServerContext::with_seed(12);
        let t0 = Instant::now();
        assert!(!ctx.idle_expired(t0));
        assert!(ctx.idle_expired(t0 + IDLE_TIMEOUT));

        ctx.handle_datagram(&[0u8; 3], peer(), t0 + IDLE_TIMEOUT);
        assert!(!ctx.idle_expired(t0 + IDLE_TIMEOUT + Duration::from_secs(1)));
    }
}
