//! Operator tags shared by core and extended nodes.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Negate,
    /// Logical not on `Bool`, bitwise complement on `Int`.
    Not,
    /// `x + 1` without assignment.
    Increment,
    /// `x - 1` without assignment.
    Decrement,
    PreIncrementAssign,
    PreDecrementAssign,
    PostIncrementAssign,
    PostDecrementAssign,
    IsTrue,
    IsFalse,
}

impl UnaryOp {
    /// Operators that write their operand back.
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            UnaryOp::PreIncrementAssign
                | UnaryOp::PreDecrementAssign
                | UnaryOp::PostIncrementAssign
                | UnaryOp::PostDecrementAssign
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Negate => "neg",
            UnaryOp::Not => "not",
            UnaryOp::Increment => "inc",
            UnaryOp::Decrement => "dec",
            UnaryOp::PreIncrementAssign => "++pre",
            UnaryOp::PreDecrementAssign => "--pre",
            UnaryOp::PostIncrementAssign => "post++",
            UnaryOp::PostDecrementAssign => "post--",
            UnaryOp::IsTrue => "is-true",
            UnaryOp::IsFalse => "is-false",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AndAlso,
    OrElse,
    Coalesce,
}

impl BinaryOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
        )
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or | BinaryOp::Xor)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr)
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Equal | BinaryOp::NotEqual)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual
        )
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOp::AndAlso | BinaryOp::OrElse)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
            BinaryOp::Xor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::AndAlso => "&&",
            BinaryOp::OrElse => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// How a jump is spelled in the source. All kinds behave identically; the
/// tag survives for printing and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GotoKind {
    Goto,
    Break,
    Continue,
    Return,
}

impl GotoKind {
    pub fn name(self) -> &'static str {
        match self {
            GotoKind::Goto => "goto",
            GotoKind::Break => "break",
            GotoKind::Continue => "continue",
            GotoKind::Return => "return",
        }
    }
}

/// The operation of a compound assignment `target op= operand`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssignOp {
    /// Plain `=` on a target that needs lowering (indexer binding, from-end
    /// array element, dynamic member).
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    /// `??=`
    Coalesce,
}

impl AssignOp {
    /// The binary operator applied between the old value and the operand,
    /// `None` for `=` and `??=`.
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign | AssignOp::Coalesce => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
            AssignOp::And => Some(BinaryOp::And),
            AssignOp::Or => Some(BinaryOp::Or),
            AssignOp::Xor => Some(BinaryOp::Xor),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Coalesce => "??=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::And => "&=",
            AssignOp::Or => "|=",
            AssignOp::Xor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }
}

/// Increment/decrement that writes back to an arbitrary assignable target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryAssignOp {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
}

impl UnaryAssignOp {
    pub fn is_prefix(self) -> bool {
        matches!(self, UnaryAssignOp::PreIncrement | UnaryAssignOp::PreDecrement)
    }

    pub fn is_increment(self) -> bool {
        matches!(self, UnaryAssignOp::PreIncrement | UnaryAssignOp::PostIncrement)
    }

    /// The core operator for the variable-only form.
    pub fn core(self) -> UnaryOp {
        match self {
            UnaryAssignOp::PreIncrement => UnaryOp::PreIncrementAssign,
            UnaryAssignOp::PreDecrement => UnaryOp::PreDecrementAssign,
            UnaryAssignOp::PostIncrement => UnaryOp::PostIncrementAssign,
            UnaryAssignOp::PostDecrement => UnaryOp::PostDecrementAssign,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryAssignOp::PreIncrement => "++pre",
            UnaryAssignOp::PreDecrement => "--pre",
            UnaryAssignOp::PostIncrement => "post++",
            UnaryAssignOp::PostDecrement => "post--",
        }
    }
}
