//! Client side: one self-contained transaction per invocation.
//!
//! Three steps — negotiate, compute, submit — where steps 1 and 3 share a
//! single retrying-exchange primitive: send the request, wait a bounded
//! time for any reply, resend on timeout, give up after a fixed attempt
//! cap.  Transient loss is the only thing retried; a reply of the wrong
//! byte length and a version mismatch are protocol violations, fatal
//! immediately (resending cannot fix a structurally wrong peer).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::time::{timeout_at, Instant};

use crate::addr::{self, AddrError};
use crate::calc::{self, Op};
use crate::socket::{Socket, SocketError};
use crate::wire::{magic, AssignmentRecord, NegotiationMessage, WireError, MESSAGE_LEN, RECORD_LEN};

/// Attempts per protocol step before the transaction fails.
pub const MAX_ATTEMPTS: u32 = 3;

/// How long one attempt waits for a reply.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Addr(#[from] AddrError),
    #[error(transparent)]
    Socket(#[from] SocketError),
    #[error("no reply from server after {MAX_ATTEMPTS} attempts")]
    NoReply,
    #[error("reply had wrong size: {got} bytes, expected {expected}")]
    WrongSize { got: usize, expected: usize },
    #[error("malformed reply: {0}")]
    Malformed(#[from] WireError),
    #[error("server version {0}.{1} is unsupported")]
    VersionMismatch(u16, u16),
    #[error("server issued unknown arithmetic code {0}")]
    UnknownOp(u32),
    #[error("server rejected the answer")]
    Rejected,
}

/// Send `request` and await a reply of `expected_len` bytes.
///
/// Retries on timeout up to [`MAX_ATTEMPTS`]; a reply of any other length
/// fails immediately.  Both protocol steps go through here.
///
/// The exception to wrong-length-is-fatal is `stale_len`: a resent request
/// can leave a duplicate of the *previous* step's reply queued on the
/// socket, so replies of that length are discarded and the wait continues
/// within the same attempt's deadline.
async fn exchange(
    socket: &Socket,
    server: SocketAddr,
    request: &[u8],
    expected_len: usize,
    stale_len: Option<usize>,
) -> Result<Vec<u8>, ClientError> {
    for attempt in 1..=MAX_ATTEMPTS {
        socket.send_to(request, server).await?;
        let deadline = Instant::now() + ATTEMPT_TIMEOUT;

        loop {
            match timeout_at(deadline, socket.recv_from()).await {
                Ok(Ok((reply, _from))) => {
                    if reply.len() == expected_len {
                        return Ok(reply);
                    }
                    if Some(reply.len()) == stale_len {
                        log::debug!("ignoring stale {}-byte duplicate reply", reply.len());
                        continue;
                    }
                    return Err(ClientError::WrongSize {
                        got: reply.len(),
                        expected: expected_len,
                    });
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => break,
            }
        }

        if attempt < MAX_ATTEMPTS {
            log::warn!("no reply within {ATTEMPT_TIMEOUT:?}, retrying (attempt {attempt})");
        }
    }
    Err(ClientError::NoReply)
}

/// Run one full transaction against the server at `addr`.
pub async fn run(addr: &str) -> Result<(), ClientError> {
    let server = addr::resolve(addr).await?;

    // Match the socket family to the server so v6 peers are reachable.
    let bind = if server.is_ipv4() {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)
    } else {
        SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0)
    };
    let socket = Socket::bind(bind).await?;
    log::debug!("bound {} for server {server}", socket.local_addr);

    // Step 1: hello → assignment.
    let hello = NegotiationMessage::hello().encode();
    let reply = exchange(&socket, server, &hello, RECORD_LEN, None).await?;
    // exchange already guaranteed the length, so decode cannot fail here.
    let assignment = AssignmentRecord::decode(&reply)?;

    if !assignment.version_supported() {
        return Err(ClientError::VersionMismatch(
            assignment.major_version,
            assignment.minor_version,
        ));
    }

    let op = Op::from_code(assignment.arith).ok_or(ClientError::UnknownOp(assignment.arith))?;
    log::info!("assignment {}: {}", assignment.id, op.name());

    // Step 2: compute locally, same arithmetic as the server.
    let mut answer = AssignmentRecord {
        kind: magic::TYPE_NOT_OK,
        ..assignment
    };
    if op.is_float() {
        answer.fl_result = calc::eval_float(op, assignment.fl_value1, assignment.fl_value2);
        println!(
            "assignment: {} {} {} = {}",
            assignment.fl_value1,
            op.name(),
            assignment.fl_value2,
            answer.fl_result
        );
    } else {
        answer.in_result = calc::eval_int(op, assignment.in_value1, assignment.in_value2);
        println!(
            "assignment: {} {} {} = {}",
            assignment.in_value1,
            op.name(),
            assignment.in_value2,
            answer.in_result
        );
    }

    // Step 3: submit → terminal verdict.  A duplicate copy of the
    // assignment may still be queued if the hello was resent; it is stale,
    // not a violation.
    let reply = exchange(&socket, server, &answer.encode(), MESSAGE_LEN, Some(RECORD_LEN)).await?;
    let verdict = NegotiationMessage::decode(&reply)?;

    match verdict.message {
        magic::MSG_OK => {
            println!("OKed by server");
            Ok(())
        }
        _ => {
            log::warn!(
                "server verdict: type={} message={}",
                verdict.kind,
                verdict.message
            );
            Err(ClientError::Rejected)
        }
    }
}
