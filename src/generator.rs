//! Assignment generation: pick an operation, draw operands, precompute the
//! expected result.
//!
//! Pure data construction — no I/O and no table access.  The server's hello
//! handler calls [`generate`], stores the expected result in the job table,
//! and sends [`outbound_record`] (result fields zeroed) to the client.

use crate::calc::{self, Expected, Op};
use crate::calclib::CalcLib;
use crate::wire::{magic, AssignmentRecord};

/// Operands for one problem, in their domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operands {
    Int(i32, i32),
    Float(f64, f64),
}

/// A freshly generated problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Problem {
    pub op: Op,
    pub operands: Operands,
    /// Precomputed with the same evaluation the client performs.
    pub expected: Expected,
}

/// Draw a new problem from the collaborator library.
pub fn generate(lib: &mut CalcLib) -> Problem {
    // The collaborator only emits the eight known names; fall back to add
    // rather than crash if that contract is ever broken.
    let op = Op::from_name(lib.random_type()).unwrap_or(Op::Add);

    if op.is_float() {
        let (a, b) = (lib.random_float(), lib.random_float());
        Problem {
            op,
            operands: Operands::Float(a, b),
            expected: Expected::Float(calc::eval_float(op, a, b)),
        }
    } else {
        let (a, b) = (lib.random_int(), lib.random_int());
        Problem {
            op,
            operands: Operands::Int(a, b),
            expected: Expected::Int(calc::eval_int(op, a, b)),
        }
    }
}

/// Build the assignment record the server sends for `problem` under `id`.
///
/// The result fields stay zero — the expected result is never revealed.
pub fn outbound_record(problem: &Problem, id: u32) -> AssignmentRecord {
    let mut rec = AssignmentRecord {
        kind: magic::TYPE_OK,
        id,
        arith: problem.op.code(),
        ..AssignmentRecord::empty()
    };
    match problem.operands {
        Operands::Int(a, b) => {
            rec.in_value1 = a;
            rec.in_value2 = b;
        }
        Operands::Float(a, b) => {
            rec.fl_value1 = a;
            rec.fl_value2 = b;
        }
    }
    rec
}
