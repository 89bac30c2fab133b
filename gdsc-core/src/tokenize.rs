//! Ordered matcher-list tokenizer for script source.
//!
//! Each matcher is a pure function over the reader position returning an
//! optional (consumed length, token); the first matcher that accepts
//! wins. The list order is load-bearing: keywords sit before
//! identifiers, longer literals before their prefixes ("remotesync"
//! before "remote", "<<=" before "<<" before "<"), and reordering
//! silently changes what the stream means.

use crate::error::{GdscError, Result};
use crate::provider::BytecodeProvider;
use crate::reader::SourceCodeReader;
use crate::token::{Operand, Token, TokenKind};
use crate::value::GdValue;

struct Match {
    consumed: usize,
    // None for whitespace, which is consumed but never emitted.
    token: Option<Token>,
}

enum Matcher {
    Whitespace,
    Newline,
    Keyword(TokenKind, &'static str),
    Punct(TokenKind, &'static str),
    Number,
    StringLit,
    NullLit,
    BuiltInType,
    BuiltInFunc,
    Identifier,
}

use Matcher::{Keyword, Punct};
use TokenKind::*;

static MATCHERS: &[Matcher] = &[
    Matcher::Whitespace,
    Matcher::Newline,
    Keyword(CfIf, "if"),
    Keyword(CfElif, "elif"),
    Keyword(CfElse, "else"),
    Keyword(CfFor, "for"),
    Keyword(CfWhile, "while"),
    Keyword(CfBreak, "break"),
    Keyword(CfContinue, "continue"),
    Keyword(CfPass, "pass"),
    Keyword(CfReturn, "return"),
    Keyword(CfMatch, "match"),
    Keyword(PrFunction, "func"),
    Keyword(PrClassName, "class_name"),
    Keyword(PrClass, "class"),
    Keyword(PrExtends, "extends"),
    Keyword(PrOnready, "onready"),
    Keyword(PrTool, "tool"),
    Keyword(PrStatic, "static"),
    Keyword(PrExport, "export"),
    Keyword(PrSetget, "setget"),
    Keyword(PrConst, "const"),
    Keyword(PrVar, "var"),
    Keyword(PrVoid, "void"),
    Keyword(PrEnum, "enum"),
    Keyword(PrPreload, "preload"),
    Keyword(PrAssert, "assert"),
    Keyword(PrYield, "yield"),
    Keyword(PrSignal, "signal"),
    Keyword(PrBreakpoint, "breakpoint"),
    Keyword(PrRemotesync, "remotesync"),
    Keyword(PrMastersync, "mastersync"),
    Keyword(PrPuppetsync, "puppetsync"),
    Keyword(PrRemote, "remote"),
    Keyword(PrSync, "sync"),
    Keyword(PrMaster, "master"),
    Keyword(PrSlave, "slave"),
    Keyword(PrPuppet, "puppet"),
    Keyword(PrAs, "as"),
    Keyword(PrIs, "is"),
    Keyword(SelfKw, "self"),
    Keyword(OpIn, "in"),
    Keyword(OpAnd, "and"),
    Keyword(OpOr, "or"),
    Keyword(OpNot, "not"),
    Keyword(ConstPi, "PI"),
    Keyword(ConstTau, "TAU"),
    Keyword(ConstInf, "INF"),
    Keyword(ConstNan, "NAN"),
    Punct(OpAssignShiftLeft, "<<="),
    Punct(OpAssignShiftRight, ">>="),
    Punct(ForwardArrow, "->"),
    Punct(OpAssignAdd, "+="),
    Punct(OpAssignSub, "-="),
    Punct(OpAssignMul, "*="),
    Punct(OpAssignDiv, "/="),
    Punct(OpAssignMod, "%="),
    Punct(OpAssignBitAnd, "&="),
    Punct(OpAssignBitOr, "|="),
    Punct(OpAssignBitXor, "^="),
    Punct(OpEqual, "=="),
    Punct(OpNotEqual, "!="),
    Punct(OpLessEqual, "<="),
    Punct(OpGreaterEqual, ">="),
    Punct(OpShiftLeft, "<<"),
    Punct(OpShiftRight, ">>"),
    Punct(Comma, ","),
    Punct(Semicolon, ";"),
    Punct(Period, "."),
    Punct(QuestionMark, "?"),
    Punct(Colon, ":"),
    Punct(Dollar, "$"),
    Punct(OpAdd, "+"),
    Punct(OpSub, "-"),
    Punct(OpMul, "*"),
    Punct(OpDiv, "/"),
    Punct(OpMod, "%"),
    Punct(OpLess, "<"),
    Punct(OpGreater, ">"),
    Punct(OpBitAnd, "&"),
    Punct(OpBitOr, "|"),
    Punct(OpBitXor, "^"),
    Punct(OpBitInvert, "!"),
    Punct(OpAssign, "="),
    Punct(BracketOpen, "["),
    Punct(BracketClose, "]"),
    Punct(CurlyBracketOpen, "{"),
    Punct(CurlyBracketClose, "}"),
    Punct(ParenthesisOpen, "("),
    Punct(ParenthesisClose, ")"),
    Matcher::Number,
    Matcher::StringLit,
    Matcher::NullLit,
    Matcher::BuiltInType,
    Matcher::BuiltInFunc,
    Matcher::Identifier,
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when the character at `offset` cannot extend a word ending there.
fn word_boundary_at(reader: &SourceCodeReader, offset: usize) -> bool {
    reader.char_at(offset).map_or(true, |c| !is_word_char(c))
}

impl Matcher {
    fn try_match(
        &self,
        reader: &SourceCodeReader,
        provider: &BytecodeProvider,
    ) -> Result<Option<Match>> {
        match self {
            Matcher::Whitespace => Ok(match reader.peek_char() {
                Some(' ') | Some('\t') => Some(Match {
                    consumed: 1,
                    token: None,
                }),
                _ => None,
            }),
            Matcher::Newline => match_newline(reader),
            Matcher::Keyword(kind, lit) => {
                if reader.starts_with(lit) && word_boundary_at(reader, lit.len()) {
                    Ok(Some(Match {
                        consumed: lit.len(),
                        token: Some(Token::bare(*kind)),
                    }))
                } else {
                    Ok(None)
                }
            }
            Matcher::Punct(kind, lit) => {
                if reader.starts_with(lit) {
                    Ok(Some(Match {
                        consumed: lit.len(),
                        token: Some(Token::bare(*kind)),
                    }))
                } else {
                    Ok(None)
                }
            }
            Matcher::Number => Ok(match_number(reader)),
            Matcher::StringLit => Ok(match_string(reader)),
            Matcher::NullLit => {
                if reader.starts_with("null") && word_boundary_at(reader, 4) {
                    Ok(Some(Match {
                        consumed: 4,
                        token: Some(Token::with_operand(
                            Constant,
                            Operand::Constant(GdValue::Nil),
                        )),
                    }))
                } else {
                    Ok(None)
                }
            }
            Matcher::BuiltInType => {
                Ok(match_table(reader, provider.type_names().iter().copied())
                    .map(|(index, len)| Match {
                        consumed: len,
                        token: Some(Token::with_data(BuiltInType, index)),
                    }))
            }
            Matcher::BuiltInFunc => Ok(match_table(
                reader,
                provider.function_names().iter().map(String::as_str),
            )
            .map(|(index, len)| Match {
                consumed: len,
                token: Some(Token::with_data(BuiltInFunc, index)),
            })),
            Matcher::Identifier => Ok(match_identifier(reader)),
        }
    }
}

fn match_newline(reader: &SourceCodeReader) -> Result<Option<Match>> {
    let nl_len = if reader.starts_with("\r\n") {
        2
    } else if reader.starts_with("\n") {
        1
    } else {
        return Ok(None);
    };

    let mut offset = nl_len;
    let mut indentation = 0u32;
    loop {
        match reader.char_at(offset) {
            Some(' ') => {
                return Err(GdscError::PolicyViolation {
                    line: reader.current_line() + 1,
                });
            }
            Some('\t') => {
                indentation += 1;
                offset += 1;
            }
            _ => break,
        }
    }

    Ok(Some(Match {
        consumed: offset,
        token: Some(Token::with_data(Newline, indentation)),
    }))
}

fn digit_in_base(c: char, base: u32) -> bool {
    c.is_digit(base)
}

fn match_number(reader: &SourceCodeReader) -> Option<Match> {
    let first = reader.peek_char()?;
    if !first.is_ascii_digit() {
        return None;
    }

    let mut base = 10;
    let mut offset = 0;
    if first == '0' {
        match reader.char_at(1) {
            Some('b') => {
                base = 2;
                offset = 2;
            }
            Some('x') => {
                base = 16;
                offset = 2;
            }
            _ => {}
        }
    }

    let mut digits = String::new();
    loop {
        match reader.char_at(offset) {
            Some('_') => offset += 1,
            Some('.') if base == 10 => {
                digits.push('.');
                offset += 1;
            }
            Some(c) if digit_in_base(c, base) => {
                digits.push(c);
                offset += 1;
            }
            _ => break,
        }
    }

    let value = if digits.contains('.') {
        let val: f64 = digits.parse().ok()?;
        // Keep the narrow representation only when widening back is exact.
        let narrow = val as f32;
        if f64::from(narrow) == val {
            GdValue::Float32(narrow)
        } else {
            GdValue::Float64(val)
        }
    } else {
        let val = u64::from_str_radix(&digits, base).ok()?;
        if val > i32::MAX as u64 {
            GdValue::Int64(val)
        } else {
            GdValue::Int32(val as u32)
        }
    };

    Some(Match {
        consumed: offset,
        token: Some(Token::with_operand(Constant, Operand::Constant(value))),
    })
}

fn match_string(reader: &SourceCodeReader) -> Option<Match> {
    if reader.peek_char() != Some('"') {
        return None;
    }

    let mut value = String::new();
    let mut offset = 1;
    loop {
        match reader.char_at(offset) {
            // Unterminated: reject and let the driver report the line.
            None => return None,
            Some('"') => {
                offset += 1;
                break;
            }
            Some('\\') if reader.char_at(offset + 1) == Some('"') => {
                value.push('"');
                offset += 2;
            }
            Some(c) => {
                value.push(c);
                offset += 1;
            }
        }
    }

    Some(Match {
        consumed: offset,
        token: Some(Token::with_operand(
            Constant,
            Operand::Constant(GdValue::Str(value)),
        )),
    })
}

/// Longest word-boundary-checked match of any table entry at the cursor.
fn match_table<'a>(
    reader: &SourceCodeReader,
    names: impl Iterator<Item = &'a str>,
) -> Option<(u32, usize)> {
    let mut best: Option<(u32, usize)> = None;
    for (index, name) in names.enumerate() {
        let len = name.chars().count();
        if reader.starts_with(name) && word_boundary_at(reader, len) {
            if best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((index as u32, len));
            }
        }
    }
    best
}

fn match_identifier(reader: &SourceCodeReader) -> Option<Match> {
    let first = reader.peek_char()?;
    if !first.is_alphabetic() && first != '_' {
        return None;
    }

    let mut name = String::new();
    name.push(first);
    let mut offset = 1;
    while let Some(c) = reader.char_at(offset) {
        if !is_word_char(c) {
            break;
        }
        name.push(c);
        offset += 1;
    }

    Some(Match {
        consumed: offset,
        token: Some(Token::with_operand(Identifier, Operand::Identifier(name))),
    })
}

/// Tokenize `source` into a raw token stream with literal operands.
/// Whitespace is consumed and discarded; identifier and constant tokens
/// carry their operand inline (interning happens at compile time).
pub fn tokenize(source: &str, provider: &BytecodeProvider) -> Result<Vec<Token>> {
    let mut reader = SourceCodeReader::new(source);
    let mut tokens = Vec::new();
    'outer: while reader.has_remaining() {
        for matcher in MATCHERS {
            if let Some(m) = matcher.try_match(&reader, provider)? {
                reader.advance(m.consumed);
                if let Some(token) = m.token {
                    tokens.push(token);
                }
                continue 'outer;
            }
        }
        return Err(GdscError::UnexpectedToken {
            line: reader.current_line(),
        });
    }
    Ok(tokens)
}
