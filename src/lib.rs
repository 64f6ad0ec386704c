//! `calc-udp` — a stateful arithmetic-assignment protocol over UDP.
//!
//! A server hands out arithmetic assignments to clients over an unreliable
//! datagram transport; clients compute and return an answer, and the
//! server grades it.  Two fixed-size binary records make up the whole wire
//! protocol, and the server dispatches purely on received datagram length.
//!
//! # Architecture
//!
//! ```text
//!   Client                                  Server
//!   ──────                                  ──────
//!   hello (NegotiationMessage) ───────────▶ dispatch ── generator ──┐
//!                                               │                   │
//!   ◀─────────────── assignment (AssignmentRecord, result zeroed)   │
//!   compute answer (calc)                       │              job table
//!   answer (AssignmentRecord) ────────────▶ verify ── consume ──────┘
//!   ◀─────────────────── verdict (NegotiationMessage, pass/fail)
//! ```
//!
//! Each module has a single responsibility:
//! - [`wire`]      — wire format (serialise / deserialise / classify)
//! - [`calc`]      — shared arithmetic and result grading
//! - [`calclib`]   — the math-problem random source
//! - [`jobs`]      — server-side job table (create / lookup / consume / sweep)
//! - [`generator`] — assignment generation
//! - [`server`]    — per-datagram dispatch and the receive loop
//! - [`client`]    — the retrying three-step transaction
//! - [`addr`]      — host:port parsing and resolution
//! - [`socket`]    — async UDP socket abstraction

pub mod addr;
pub mod calc;
pub mod calclib;
pub mod client;
pub mod generator;
pub mod jobs;
pub mod server;
pub mod socket;
pub mod wire;
