//! Wire-format definitions for the two protocol records.
//!
//! Every datagram exchanged between client and server is either a
//! [`NegotiationMessage`] (handshake and terminal pass/fail notification)
//! or an [`AssignmentRecord`] (a generated problem, or the client's
//! computed answer).  This module is responsible for:
//! - Defining the on-wire binary layout of both records.
//! - Serialising a record into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a record, returning an error
//!   for input of the wrong length.
//!
//! No I/O happens here — this is pure data transformation.  No semantic
//! validation happens here either: magic fields (`protocol`, versions) are
//! passed through untouched and checked by the server dispatch / client.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.  The three `f64` fields are
//! copied byte-for-byte in native representation — both ends are assumed to
//! share IEEE-754 doubles and float endianness (explicit portability
//! non-goal inherited from the protocol definition).
//!
//! Negotiation message, [`MESSAGE_LEN`] = 12 bytes:
//!
//! ```text
//!  0               1               2               3
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |             type              |            message
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//!              (cont)             |           protocol            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         major_version         |         minor_version         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Assignment record, [`RECORD_LEN`] = 50 bytes:
//! type(2) + major(2) + minor(2) + id(4) + arith(4)
//! + in_value1(4) + in_value2(4) + in_result(4)
//! + fl_value1(8) + fl_value2(8) + fl_result(8)
//!
//! Record sizes are transport-critical: the server dispatches purely on the
//! received byte length, so the two lengths must never coincide.

/// Well-known field values.
pub mod magic {
    /// `protocol` field value: the application-layer "this is UDP" marker.
    pub const PROTOCOL_UDP: u16 = 17;
    /// Supported protocol version.
    pub const MAJOR_VERSION: u16 = 1;
    /// Supported protocol version.
    pub const MINOR_VERSION: u16 = 0;

    /// Negotiation `type`: client hello.
    pub const TYPE_HELLO: u16 = 22;
    /// Negotiation `type`: terminal accept.  Also the record `type` the
    /// server sets when issuing an assignment.
    pub const TYPE_OK: u16 = 1;
    /// Negotiation `type`: terminal reject / malformed-request notice.
    /// Also the record `type` the client sets when returning an answer.
    pub const TYPE_NOT_OK: u16 = 2;

    /// Negotiation `message` payload in a hello.
    pub const MSG_HELLO: u32 = 0;
    /// Negotiation `message` payload: answer correct.
    pub const MSG_OK: u32 = 1;
    /// Negotiation `message` payload: answer incorrect or request invalid.
    pub const MSG_NOT_OK: u32 = 2;
}

/// Byte length of a serialised [`NegotiationMessage`].
pub const MESSAGE_LEN: usize = 12;

/// Byte length of a serialised [`AssignmentRecord`].
pub const RECORD_LEN: usize = 50;

// Byte offsets within a serialised negotiation message.
const M_TYPE: usize = 0;
const M_MESSAGE: usize = 2;
const M_PROTOCOL: usize = 6;
const M_MAJOR: usize = 8;
const M_MINOR: usize = 10;

// Byte offsets within a serialised assignment record.
const R_TYPE: usize = 0;
const R_MAJOR: usize = 2;
const R_MINOR: usize = 4;
const R_ID: usize = 6;
const R_ARITH: usize = 10;
const R_IN_VALUE1: usize = 14;
const R_IN_VALUE2: usize = 18;
const R_IN_RESULT: usize = 22;
const R_FL_VALUE1: usize = 26;
const R_FL_VALUE2: usize = 34;
const R_FL_RESULT: usize = 42;

/// Handshake / terminal-notification record.
///
/// Fields are in host byte order; [`NegotiationMessage::encode`] converts
/// to big-endian on the wire and [`NegotiationMessage::decode`] converts
/// back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiationMessage {
    /// Message kind (see [`magic`]).
    pub kind: u16,
    /// Payload code: 0 in a hello, pass/fail verdict in a terminal message.
    pub message: u32,
    /// Application-layer protocol self-declaration; must be 17.
    pub protocol: u16,
    pub major_version: u16,
    pub minor_version: u16,
}

impl NegotiationMessage {
    /// The client's "I am ready for an assignment" message.
    pub fn hello() -> Self {
        Self {
            kind: magic::TYPE_HELLO,
            message: magic::MSG_HELLO,
            protocol: magic::PROTOCOL_UDP,
            major_version: magic::MAJOR_VERSION,
            minor_version: magic::MINOR_VERSION,
        }
    }

    /// Terminal accept: the submitted answer was correct.
    pub fn accept() -> Self {
        Self {
            kind: magic::TYPE_OK,
            message: magic::MSG_OK,
            ..Self::hello()
        }
    }

    /// Terminal reject: wrong answer, unknown job, or malformed request.
    pub fn reject() -> Self {
        Self {
            kind: magic::TYPE_NOT_OK,
            message: magic::MSG_NOT_OK,
            ..Self::hello()
        }
    }

    /// True iff this is a well-formed hello: correct kind, payload,
    /// protocol marker, and supported version.
    pub fn is_valid_hello(&self) -> bool {
        self.kind == magic::TYPE_HELLO
            && self.message == magic::MSG_HELLO
            && self.protocol == magic::PROTOCOL_UDP
            && self.major_version == magic::MAJOR_VERSION
            && self.minor_version == magic::MINOR_VERSION
    }

    /// Serialise into a fixed-size buffer.
    pub fn encode(&self) -> [u8; MESSAGE_LEN] {
        let mut buf = [0u8; MESSAGE_LEN];
        buf[M_TYPE..M_TYPE + 2].copy_from_slice(&self.kind.to_be_bytes());
        buf[M_MESSAGE..M_MESSAGE + 4].copy_from_slice(&self.message.to_be_bytes());
        buf[M_PROTOCOL..M_PROTOCOL + 2].copy_from_slice(&self.protocol.to_be_bytes());
        buf[M_MAJOR..M_MAJOR + 2].copy_from_slice(&self.major_version.to_be_bytes());
        buf[M_MINOR..M_MINOR + 2].copy_from_slice(&self.minor_version.to_be_bytes());
        buf
    }

    /// Parse from a raw byte slice.  Fails only on the wrong length.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() != MESSAGE_LEN {
            return Err(WireError::WrongLength(buf.len()));
        }
        Ok(Self {
            kind: u16::from_be_bytes(buf[M_TYPE..M_TYPE + 2].try_into().unwrap()),
            message: u32::from_be_bytes(buf[M_MESSAGE..M_MESSAGE + 4].try_into().unwrap()),
            protocol: u16::from_be_bytes(buf[M_PROTOCOL..M_PROTOCOL + 2].try_into().unwrap()),
            major_version: u16::from_be_bytes(buf[M_MAJOR..M_MAJOR + 2].try_into().unwrap()),
            minor_version: u16::from_be_bytes(buf[M_MINOR..M_MINOR + 2].try_into().unwrap()),
        })
    }
}

/// A generated problem (server → client) or a computed answer
/// (client → server).  Superset of both directions' fields; the unused
/// domain's fields are zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignmentRecord {
    /// 1 when the server issues an assignment, 2 when the client answers.
    pub kind: u16,
    pub major_version: u16,
    pub minor_version: u16,
    /// Opaque job identifier; non-zero and unique among open jobs.
    pub id: u32,
    /// Arithmetic code: 1=add 2=sub 3=mul 4=div, 5..=8 float variants.
    pub arith: u32,
    pub in_value1: i32,
    pub in_value2: i32,
    /// Zero on the way out; the client's integer result on the way back.
    pub in_result: i32,
    pub fl_value1: f64,
    pub fl_value2: f64,
    /// Zero on the way out; the client's float result on the way back.
    pub fl_result: f64,
}

impl AssignmentRecord {
    /// A zeroed record carrying the current protocol version.
    pub fn empty() -> Self {
        Self {
            kind: 0,
            major_version: magic::MAJOR_VERSION,
            minor_version: magic::MINOR_VERSION,
            id: 0,
            arith: 0,
            in_value1: 0,
            in_value2: 0,
            in_result: 0,
            fl_value1: 0.0,
            fl_value2: 0.0,
            fl_result: 0.0,
        }
    }

    pub fn version_supported(&self) -> bool {
        self.major_version == magic::MAJOR_VERSION && self.minor_version == magic::MINOR_VERSION
    }

    /// Serialise into a fixed-size buffer.  Integers go out big-endian;
    /// floats are copied in native representation.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[R_TYPE..R_TYPE + 2].copy_from_slice(&self.kind.to_be_bytes());
        buf[R_MAJOR..R_MAJOR + 2].copy_from_slice(&self.major_version.to_be_bytes());
        buf[R_MINOR..R_MINOR + 2].copy_from_slice(&self.minor_version.to_be_bytes());
        buf[R_ID..R_ID + 4].copy_from_slice(&self.id.to_be_bytes());
        buf[R_ARITH..R_ARITH + 4].copy_from_slice(&self.arith.to_be_bytes());
        buf[R_IN_VALUE1..R_IN_VALUE1 + 4].copy_from_slice(&self.in_value1.to_be_bytes());
        buf[R_IN_VALUE2..R_IN_VALUE2 + 4].copy_from_slice(&self.in_value2.to_be_bytes());
        buf[R_IN_RESULT..R_IN_RESULT + 4].copy_from_slice(&self.in_result.to_be_bytes());
        buf[R_FL_VALUE1..R_FL_VALUE1 + 8].copy_from_slice(&self.fl_value1.to_ne_bytes());
        buf[R_FL_VALUE2..R_FL_VALUE2 + 8].copy_from_slice(&self.fl_value2.to_ne_bytes());
        buf[R_FL_RESULT..R_FL_RESULT + 8].copy_from_slice(&self.fl_result.to_ne_bytes());
        buf
    }

    /// Parse from a raw byte slice.  Fails only on the wrong length.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() != RECORD_LEN {
            return Err(WireError::WrongLength(buf.len()));
        }
        Ok(Self {
            kind: u16::from_be_bytes(buf[R_TYPE..R_TYPE + 2].try_into().unwrap()),
            major_version: u16::from_be_bytes(buf[R_MAJOR..R_MAJOR + 2].try_into().unwrap()),
            minor_version: u16::from_be_bytes(buf[R_MINOR..R_MINOR + 2].try_into().unwrap()),
            id: u32::from_be_bytes(buf[R_ID..R_ID + 4].try_into().unwrap()),
            arith: u32::from_be_bytes(buf[R_ARITH..R_ARITH + 4].try_into().unwrap()),
            in_value1: i32::from_be_bytes(buf[R_IN_VALUE1..R_IN_VALUE1 + 4].try_into().unwrap()),
            in_value2: i32::from_be_bytes(buf[R_IN_VALUE2..R_IN_VALUE2 + 4].try_into().unwrap()),
            in_result: i32::from_be_bytes(buf[R_IN_RESULT..R_IN_RESULT + 4].try_into().unwrap()),
            fl_value1: f64::from_ne_bytes(buf[R_FL_VALUE1..R_FL_VALUE1 + 8].try_into().unwrap()),
            fl_value2: f64::from_ne_bytes(buf[R_FL_VALUE2..R_FL_VALUE2 + 8].try_into().unwrap()),
            fl_result: f64::from_ne_bytes(buf[R_FL_RESULT..R_FL_RESULT + 8].try_into().unwrap()),
        })
    }
}

/// An inbound datagram, classified by length.
///
/// This is the single entry point the server dispatch uses; there is no
/// size-based branching anywhere else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Inbound {
    /// Negotiation-message sized.  Content may still be an invalid hello.
    Negotiation(NegotiationMessage),
    /// Assignment-record sized.  Content may still fail verification.
    Assignment(AssignmentRecord),
    /// Neither known length; carries the observed length for logging.
    Malformed(usize),
}

/// Classify a raw datagram by its length and decode accordingly.
pub fn classify(buf: &[u8]) -> Inbound {
    match buf.len() {
        MESSAGE_LEN => match NegotiationMessage::decode(buf) {
            Ok(m) => Inbound::Negotiation(m),
            Err(_) => Inbound::Malformed(buf.len()),
        },
        RECORD_LEN => match AssignmentRecord::decode(buf) {
            Ok(r) => Inbound::Assignment(r),
            Err(_) => Inbound::Malformed(buf.len()),
        },
        n => Inbound::Malformed(n),
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, PartialEq, Eq)]
pub enum WireError {
    /// Byte length matches neither record size.
    WrongLength(usize),
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::WrongLength(n) => {
                write!(f, "datagram of {n} bytes matches no known record size")
            }
        }
    }
}

impl std::error::Error for WireError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_roundtrip() {
        let msg = NegotiationMessage::hello();
        let decoded = NegotiationMessage::decode(&msg.encode()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn message_bytes_roundtrip() {
        // encode(decode(bytes)) must reproduce the input exactly.
        let bytes = NegotiationMessage::accept().encode();
        let again = NegotiationMessage::decode(&bytes).unwrap().encode();
        assert_eq!(bytes, again);
    }

    #[test]
    fn record_roundtrip_boundary_values() {
        let rec = AssignmentRecord {
            kind: magic::TYPE_NOT_OK,
            id: u32::MAX,
            arith: 4,
            in_value1: i32::MIN,
            in_value2: 0, // divisor of zero must survive the wire untouched
            in_result: -1,
            fl_value1: -0.125,
            fl_value2: f64::MAX,
            fl_result: 1e-4,
            ..AssignmentRecord::empty()
        };
        let bytes = rec.encode();
        assert_eq!(bytes.len(), RECORD_LEN);
        let decoded = AssignmentRecord::decode(&bytes).unwrap();
        assert_eq!(decoded, rec);
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn integers_big_endian_on_wire() {
        let rec = AssignmentRecord {
            kind: 0x0102,
            id: 0x0304_0506,
            ..AssignmentRecord::empty()
        };
        let bytes = rec.encode();
        assert_eq!(&bytes[0..2], &[0x01, 0x02]);
        assert_eq!(&bytes[6..10], &[0x03, 0x04, 0x05, 0x06]);
    }

    #[test]
    fn hello_magic_values_on_wire() {
        let bytes = NegotiationMessage::hello().encode();
        assert_eq!(&bytes[0..2], &[0, 22]); // type
        assert_eq!(&bytes[2..6], &[0, 0, 0, 0]); // message
        assert_eq!(&bytes[6..8], &[0, 17]); // protocol
        assert_eq!(&bytes[8..10], &[0, 1]); // major
        assert_eq!(&bytes[10..12], &[0, 0]); // minor
    }

    #[test]
    fn decode_wrong_length_is_error_not_panic() {
        assert_eq!(
            NegotiationMessage::decode(&[0u8; 11]),
            Err(WireError::WrongLength(11))
        );
        assert_eq!(
            AssignmentRecord::decode(&[0u8; 51]),
            Err(WireError::WrongLength(51))
        );
        assert_eq!(AssignmentRecord::decode(&[]), Err(WireError::WrongLength(0)));
    }

    #[test]
    fn classify_dispatches_on_length() {
        let hello = NegotiationMessage::hello().encode();
        assert!(matches!(classify(&hello), Inbound::Negotiation(m) if m.is_valid_hello()));

        let rec = AssignmentRecord::empty().encode();
        assert!(matches!(classify(&rec), Inbound::Assignment(_)));

        assert_eq!(classify(&[0u8; 7]), Inbound::Malformed(7));
        assert_eq!(classify(&[]), Inbound::Malformed(0));
    }

    #[test]
    fn record_sizes_are_distinct() {
        // Length is the dispatch key; the two sizes colliding would make the
        // protocol ambiguous.
        assert_ne!(MESSAGE_LEN, RECORD_LEN);
        assert_eq!(MESSAGE_LEN, 12);
        assert_eq!(RECORD_LEN, 50);
    }

    #[test]
    fn invalid_hello_detected() {
        let mut msg = NegotiationMessage::hello();
        assert!(msg.is_valid_hello());
        msg.protocol = 18;
        assert!(!msg.is_valid_hello());
    }
}
