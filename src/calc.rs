//! Arithmetic domain shared by both ends of the protocol.
//!
//! The server computes the expected result with the same functions the
//! client uses to compute its answer, so independent computation on two
//! machines is reproducible for verification.  That includes the
//! divide-by-zero default: both domains define `x / 0 = 0` rather than
//! signalling an error.

/// Tolerance for comparing independently computed float results.
pub const EPSILON: f64 = 1e-4;

/// The eight assignment operations.  Codes 1..=4 are the integer domain,
/// 5..=8 the float domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Fadd,
    Fsub,
    Fmul,
    Fdiv,
}

impl Op {
    /// All operations, in code order.
    pub const ALL: [Op; 8] = [
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Fadd,
        Op::Fsub,
        Op::Fmul,
        Op::Fdiv,
    ];

    /// The wire code for this operation.
    pub fn code(self) -> u32 {
        match self {
            Op::Add => 1,
            Op::Sub => 2,
            Op::Mul => 3,
            Op::Div => 4,
            Op::Fadd => 5,
            Op::Fsub => 6,
            Op::Fmul => 7,
            Op::Fdiv => 8,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Op::ALL.into_iter().find(|op| op.code() == code)
    }

    /// The operation name as the math-problem library spells it.
    pub fn name(self) -> &'static str {
        match self {
            Op::Add => "add",
            Op::Sub => "sub",
            Op::Mul => "mul",
            Op::Div => "div",
            Op::Fadd => "fadd",
            Op::Fsub => "fsub",
            Op::Fmul => "fmul",
            Op::Fdiv => "fdiv",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Op::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Codes ≥ 5 select the floating-point domain.
    pub fn is_float(self) -> bool {
        self.code() >= 5
    }
}

/// Integer-domain evaluation.  Wrapping arithmetic so both ends agree even
/// on overflowing operand pairs; division by zero yields 0.
pub fn eval_int(op: Op, a: i32, b: i32) -> i32 {
    match op {
        Op::Add | Op::Fadd => a.wrapping_add(b),
        Op::Sub | Op::Fsub => a.wrapping_sub(b),
        Op::Mul | Op::Fmul => a.wrapping_mul(b),
        Op::Div | Op::Fdiv => {
            if b == 0 {
                0
            } else {
                a.wrapping_div(b)
            }
        }
    }
}

/// Float-domain evaluation.  Division by zero yields 0.0.
pub fn eval_float(op: Op, a: f64, b: f64) -> f64 {
    match op {
        Op::Add | Op::Fadd => a + b,
        Op::Sub | Op::Fsub => a - b,
        Op::Mul | Op::Fmul => a * b,
        Op::Div | Op::Fdiv => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
    }
}

/// A stored expected result together with its comparison rule: exact
/// equality in the integer domain, absolute difference below [`EPSILON`]
/// in the float domain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expected {
    Int(i32),
    Float(f64),
}

impl Expected {
    pub fn is_float(&self) -> bool {
        matches!(self, Expected::Float(_))
    }

    /// Grade a returned answer.  The caller passes both result fields from
    /// the record; only the field matching this domain is consulted.
    pub fn grade(&self, int_got: i32, float_got: f64) -> bool {
        match *self {
            Expected::Int(want) => int_got == want,
            Expected::Float(want) => (float_got - want).abs() < EPSILON,
        }
    }
}
