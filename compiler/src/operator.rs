// operator.rs — Supported signal operator table
//
// The closed vocabulary of object types the compiler accepts, with each
// kind's fixed inlet/outlet arity and which inlets take literal construction
// parameters. Adding a kind here forces every exhaustive match in graph and
// codegen to grow a case.

use std::fmt;

/// Value kind carried on an inlet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Continuous single-precision audio signal.
    Signal,
}

/// Every supported object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Dac,
    Phasor,
    Osc,
    Add,
    Sub,
    Mul,
    Div,
    Max,
    Min,
    Pow,
    Log,
    Abs,
    Exp,
    Wrap,
    Cos,
    Sig,
    Clip,
}

/// All kinds, in table order.
pub const ALL_OPS: [OpKind; 17] = [
    OpKind::Dac,
    OpKind::Phasor,
    OpKind::Osc,
    OpKind::Add,
    OpKind::Sub,
    OpKind::Mul,
    OpKind::Div,
    OpKind::Max,
    OpKind::Min,
    OpKind::Pow,
    OpKind::Log,
    OpKind::Abs,
    OpKind::Exp,
    OpKind::Wrap,
    OpKind::Cos,
    OpKind::Sig,
    OpKind::Clip,
];

impl OpKind {
    /// Object-type keyword as written in the patch.
    pub fn keyword(self) -> &'static str {
        match self {
            OpKind::Dac => "dac~",
            OpKind::Phasor => "phasor~",
            OpKind::Osc => "osc~",
            OpKind::Add => "+~",
            OpKind::Sub => "-~",
            OpKind::Mul => "*~",
            OpKind::Div => "/~",
            OpKind::Max => "max~",
            OpKind::Min => "min~",
            OpKind::Pow => "pow~",
            OpKind::Log => "log~",
            OpKind::Abs => "abs~",
            OpKind::Exp => "exp~",
            OpKind::Wrap => "wrap~",
            OpKind::Cos => "cos~",
            OpKind::Sig => "sig~",
            OpKind::Clip => "clip~",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<OpKind> {
        ALL_OPS.iter().copied().find(|op| op.keyword() == keyword)
    }

    /// Inlet names, left to right.
    pub fn inlet_names(self) -> &'static [&'static str] {
        match self {
            OpKind::Dac => &["left", "right"],
            OpKind::Phasor | OpKind::Osc => &["frequency", "ft1"],
            OpKind::Add
            | OpKind::Sub
            | OpKind::Mul
            | OpKind::Div
            | OpKind::Max
            | OpKind::Min
            | OpKind::Pow => &["in1", "in2"],
            OpKind::Log => &["in1", "base"],
            OpKind::Abs | OpKind::Exp | OpKind::Wrap | OpKind::Sig => &["in"],
            OpKind::Cos => &["in", "phase"],
            OpKind::Clip => &["in", "lo", "hi"],
        }
    }

    pub fn outlet_count(self) -> usize {
        match self {
            OpKind::Dac => 0,
            OpKind::Phasor
            | OpKind::Osc
            | OpKind::Add
            | OpKind::Sub
            | OpKind::Mul
            | OpKind::Div
            | OpKind::Max
            | OpKind::Min
            | OpKind::Pow
            | OpKind::Log
            | OpKind::Abs
            | OpKind::Exp
            | OpKind::Wrap
            | OpKind::Cos
            | OpKind::Sig
            | OpKind::Clip => 1,
        }
    }

    /// Inlet indices that literal parameters bind to, in parameter order.
    pub fn param_bindings(self) -> &'static [usize] {
        match self {
            OpKind::Phasor | OpKind::Osc | OpKind::Sig => &[0],
            OpKind::Add
            | OpKind::Sub
            | OpKind::Mul
            | OpKind::Div
            | OpKind::Max
            | OpKind::Min
            | OpKind::Pow
            | OpKind::Log => &[1],
            OpKind::Clip => &[1, 2],
            OpKind::Dac | OpKind::Abs | OpKind::Exp | OpKind::Wrap | OpKind::Cos => &[],
        }
    }

    pub fn is_sink(self) -> bool {
        self.outlet_count() == 0
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Comma-separated list of every supported keyword (for hints).
pub fn vocabulary() -> String {
    ALL_OPS
        .iter()
        .map(|op| op.keyword())
        .collect::<Vec<_>>()
        .join(", ")
}
