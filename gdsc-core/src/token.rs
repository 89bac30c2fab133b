use strum::EnumString;

use crate::value::GdValue;

/// Symbolic token kinds of the compiled-script format.
///
/// The numeric wire id of a kind is *not* this enum's discriminant: every
/// bytecode revision carries its own ordered name table, and the active
/// [`BytecodeProvider`](crate::provider::BytecodeProvider) maps between
/// kind and wire id. The variant names here must therefore match the
/// names used by the descriptor records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString)]
pub enum TokenKind {
    Empty,
    Identifier,
    Constant,
    #[strum(serialize = "Self")]
    SelfKw,
    BuiltInType,
    BuiltInFunc,
    OpIn,
    OpEqual,
    OpNotEqual,
    OpLess,
    OpLessEqual,
    OpGreater,
    OpGreaterEqual,
    OpAnd,
    OpOr,
    OpNot,
    OpAdd,
    OpSub,
    OpMul,
    OpDiv,
    OpMod,
    OpShiftLeft,
    OpShiftRight,
    OpAssign,
    OpAssignAdd,
    OpAssignSub,
    OpAssignMul,
    OpAssignDiv,
    OpAssignMod,
    OpAssignShiftLeft,
    OpAssignShiftRight,
    OpAssignBitAnd,
    OpAssignBitOr,
    OpAssignBitXor,
    OpBitAnd,
    OpBitOr,
    OpBitXor,
    OpBitInvert,
    CfIf,
    CfElif,
    CfElse,
    CfFor,
    CfWhile,
    CfBreak,
    CfContinue,
    CfPass,
    CfReturn,
    CfMatch,
    PrFunction,
    PrClass,
    PrClassName,
    PrExtends,
    PrIs,
    PrOnready,
    PrTool,
    PrStatic,
    PrExport,
    PrSetget,
    PrConst,
    PrVar,
    PrAs,
    PrVoid,
    PrEnum,
    PrPreload,
    PrAssert,
    PrYield,
    PrSignal,
    PrBreakpoint,
    PrRemote,
    PrSync,
    PrMaster,
    PrSlave,
    PrPuppet,
    PrRemotesync,
    PrMastersync,
    PrPuppetsync,
    BracketOpen,
    BracketClose,
    CurlyBracketOpen,
    CurlyBracketClose,
    ParenthesisOpen,
    ParenthesisClose,
    Comma,
    Semicolon,
    Period,
    QuestionMark,
    Colon,
    Dollar,
    ForwardArrow,
    Newline,
    ConstPi,
    ConstTau,
    Wildcard,
    ConstInf,
    ConstNan,
    Error,
    Eof,
    Cursor,
    Max,
}

impl TokenKind {
    /// Kinds that always take the 4-byte wire form, even with payload 0.
    /// Their payload is meaningful (pool index, table index, indentation),
    /// so the short form would be ambiguous with "no payload".
    pub fn always_wide(self) -> bool {
        matches!(
            self,
            TokenKind::Identifier
                | TokenKind::Constant
                | TokenKind::BuiltInType
                | TokenKind::BuiltInFunc
                | TokenKind::Newline
        )
    }
}

/// Owned operand attached to a token before/after interning.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Identifier(String),
    Constant(GdValue),
}

/// One lexical unit of compiled script bytecode.
///
/// `data` is the 24-bit wire payload: a pool index for identifiers and
/// constants, a table index for built-in types/functions, and the
/// indentation depth for newlines.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub data: u32,
    pub operand: Option<Operand>,
}

impl Token {
    pub fn bare(kind: TokenKind) -> Self {
        Self {
            kind,
            data: 0,
            operand: None,
        }
    }

    pub fn with_data(kind: TokenKind, data: u32) -> Self {
        Self {
            kind,
            data,
            operand: None,
        }
    }

    pub fn with_operand(kind: TokenKind, operand: Operand) -> Self {
        Self {
            kind,
            data: 0,
            operand: Some(operand),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn kind_names_round_trip_through_descriptor_spelling() {
        assert_eq!(TokenKind::from_str("Self").unwrap(), TokenKind::SelfKw);
        assert_eq!(TokenKind::from_str("OpAssignShiftLeft").unwrap(), TokenKind::OpAssignShiftLeft);
        assert!(TokenKind::from_str("NotAToken").is_err());
    }

    #[test]
    fn operand_kinds_are_always_wide() {
        assert!(TokenKind::Identifier.always_wide());
        assert!(TokenKind::Newline.always_wide());
        assert!(!TokenKind::OpAdd.always_wide());
        assert!(!TokenKind::CfPass.always_wide());
    }
}
