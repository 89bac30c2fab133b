//! Bytecode-to-source decompiler: parses the compiled-unit layout,
//! resolves operands through the pools, and renders a best-effort
//! source reconstruction. Comments and exact spacing are gone for good;
//! the token stream is what survives.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::compile::{IDENTIFIER_MASK, MAGIC};
use crate::error::{GdscError, Result};
use crate::provider::BytecodeProvider;
use crate::token::{Operand, Token, TokenKind};
use crate::value::GdValue;

/// Fully parsed compiled unit with operands resolved by pool index.
#[derive(Debug)]
pub struct CompiledUnit {
    pub version: u32,
    pub identifiers: Vec<String>,
    pub constants: Vec<GdValue>,
    /// (token index, source line) pairs. Parsed but unused: the
    /// compiler never populates the map.
    pub line_map: Vec<(u32, u32)>,
    pub tokens: Vec<Token>,
}

impl CompiledUnit {
    pub fn parse(bytes: &[u8], provider: &BytecodeProvider) -> Result<Self> {
        let mut buf = Cursor::new(bytes);

        let mut magic = [0u8; 4];
        std::io::Read::read_exact(&mut buf, &mut magic)?;
        if &magic != MAGIC {
            return Err(GdscError::Format(
                "invalid compiled script: missing magic header".to_string(),
            ));
        }

        let version = buf.read_u32::<LittleEndian>()?;
        if version != provider.bytecode_version() {
            return Err(GdscError::Format(format!(
                "bytecode version mismatch: file has {version}, descriptor {} expects {}",
                provider.commit_hash(),
                provider.bytecode_version()
            )));
        }

        let identifier_count = buf.read_u32::<LittleEndian>()?;
        let constant_count = buf.read_u32::<LittleEndian>()?;
        let line_count = buf.read_u32::<LittleEndian>()?;
        let token_count = buf.read_u32::<LittleEndian>()?;

        let mut identifiers = Vec::with_capacity(identifier_count as usize);
        for _ in 0..identifier_count {
            let len = buf.read_u32::<LittleEndian>()? as usize;
            let mut masked = vec![0u8; len];
            std::io::Read::read_exact(&mut buf, &mut masked)?;
            for b in &mut masked {
                *b ^= IDENTIFIER_MASK;
            }
            // Engine-produced files pad identifiers with masked NULs and
            // include the padding in the length.
            masked.retain(|b| *b != 0);
            let ident = String::from_utf8(masked)
                .map_err(|e| GdscError::Format(format!("identifier is not UTF-8: {e}")))?;
            identifiers.push(ident);
        }

        let mut constants = Vec::with_capacity(constant_count as usize);
        for _ in 0..constant_count {
            constants.push(GdValue::deserialize(&mut buf, provider)?);
        }

        let mut line_map = Vec::with_capacity(line_count as usize);
        for _ in 0..line_count {
            let token_index = buf.read_u32::<LittleEndian>()?;
            let line = buf.read_u32::<LittleEndian>()?;
            line_map.push((token_index, line));
        }

        let mut tokens = Vec::with_capacity(token_count as usize);
        for _ in 0..token_count {
            tokens.push(read_token(&mut buf, provider, &identifiers, &constants)?);
        }

        Ok(Self {
            version,
            identifiers,
            constants,
            line_map,
            tokens,
        })
    }
}

fn read_token(
    buf: &mut Cursor<&[u8]>,
    provider: &BytecodeProvider,
    identifiers: &[String],
    constants: &[GdValue],
) -> Result<Token> {
    let first = buf.read_u8()?;
    let value = if first & 0x80 != 0 {
        let mut rest = [0u8; 3];
        std::io::Read::read_exact(buf, &mut rest)?;
        u32::from_le_bytes([first, rest[0], rest[1], rest[2]]) ^ 0x80
    } else {
        u32::from(first)
    };

    let kind = provider.token_kind(value & 0xFF)?;
    let data = value >> 8;

    let operand = match kind {
        TokenKind::Identifier => Some(Operand::Identifier(
            identifiers
                .get(data as usize)
                .ok_or_else(|| {
                    GdscError::Format(format!("identifier index {data} out of range"))
                })?
                .clone(),
        )),
        TokenKind::Constant => Some(Operand::Constant(
            constants
                .get(data as usize)
                .ok_or_else(|| GdscError::Format(format!("constant index {data} out of range")))?
                .clone(),
        )),
        _ => None,
    };

    Ok(Token {
        kind,
        data,
        operand,
    })
}

/// Accumulates rendered output while tracking indentation depth.
#[derive(Default)]
pub struct DecompileBuffer {
    text: String,
    indentation: u32,
}

impl DecompileBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(self) -> String {
        self.text
    }

    fn append(&mut self, val: &str) {
        self.text.push_str(val);
    }

    /// Operator form: exactly one space on each side, never doubling up
    /// with a space that is already there.
    fn append_op(&mut self, val: &str) {
        if !self.text.is_empty() && !self.text.ends_with(' ') {
            self.text.push(' ');
        }
        self.text.push_str(val);
        self.text.push(' ');
    }

    fn append_newline(&mut self) {
        self.text.push('\n');
        for _ in 0..self.indentation {
            self.text.push('\t');
        }
    }
}

/// Render the token stream of a parsed unit back to source text.
pub fn render(unit: &CompiledUnit, provider: &BytecodeProvider) -> Result<String> {
    let mut buf = DecompileBuffer::new();
    // Start-of-file behaves like the start of a line.
    let mut previous = TokenKind::Newline;
    for token in &unit.tokens {
        render_token(&mut buf, token, previous, provider)?;
        previous = token.kind;
    }
    Ok(buf.content())
}

/// Decompile a compiled-unit buffer to source text in one step.
pub fn decompile(bytes: &[u8], provider: &BytecodeProvider) -> Result<String> {
    let unit = CompiledUnit::parse(bytes, provider)?;
    render(&unit, provider)
}

fn render_token(
    buf: &mut DecompileBuffer,
    token: &Token,
    previous: TokenKind,
    provider: &BytecodeProvider,
) -> Result<()> {
    use TokenKind::*;
    match token.kind {
        Empty | Error | Eof | Cursor | Max => {}
        Identifier => match &token.operand {
            Some(Operand::Identifier(name)) => buf.append(name),
            _ => return Err(GdscError::Format("identifier token without operand".into())),
        },
        Constant => match &token.operand {
            Some(Operand::Constant(value)) => buf.append(&value.to_string()),
            _ => return Err(GdscError::Format("constant token without operand".into())),
        },
        SelfKw => buf.append("self"),
        BuiltInType => buf.append(provider.type_name(token.data)?),
        BuiltInFunc => buf.append(provider.builtin_func_name(token.data)?),
        OpIn => buf.append_op("in"),
        OpEqual => buf.append_op("=="),
        OpNotEqual => buf.append_op("!="),
        OpLess => buf.append_op("<"),
        OpLessEqual => buf.append_op("<="),
        OpGreater => buf.append_op(">"),
        OpGreaterEqual => buf.append_op(">="),
        OpAnd => buf.append_op("and"),
        OpOr => buf.append_op("or"),
        OpNot => buf.append_op("not"),
        OpAdd => buf.append_op("+"),
        OpSub => buf.append_op("-"),
        OpMul => buf.append_op("*"),
        OpDiv => buf.append_op("/"),
        OpMod => buf.append_op("%"),
        OpShiftLeft => buf.append_op("<<"),
        OpShiftRight => buf.append_op(">>"),
        OpAssign => buf.append_op("="),
        OpAssignAdd => buf.append_op("+="),
        OpAssignSub => buf.append_op("-="),
        OpAssignMul => buf.append_op("*="),
        OpAssignDiv => buf.append_op("/="),
        OpAssignMod => buf.append_op("%="),
        OpAssignShiftLeft => buf.append_op("<<="),
        OpAssignShiftRight => buf.append_op(">>="),
        OpAssignBitAnd => buf.append_op("&="),
        OpAssignBitOr => buf.append_op("|="),
        OpAssignBitXor => buf.append_op("^="),
        OpBitAnd => buf.append_op("&"),
        OpBitOr => buf.append_op("|"),
        OpBitXor => buf.append_op("^"),
        OpBitInvert => buf.append_op("!"),
        // `if`/`elif` open a statement at line start but sit inline in
        // ternary position; `else` mirrors that.
        CfIf => {
            if previous != Newline {
                buf.append_op("if");
            } else {
                buf.append("if ");
            }
        }
        CfElif => {
            if previous != Newline {
                buf.append_op("elif");
            } else {
                buf.append("elif ");
            }
        }
        CfElse => {
            if previous != Newline {
                buf.append_op("else");
            } else {
                buf.append("else");
            }
        }
        CfFor => buf.append("for "),
        CfWhile => buf.append("while "),
        CfBreak => buf.append("break"),
        CfContinue => buf.append("continue"),
        CfPass => buf.append("pass"),
        CfReturn => buf.append("return "),
        CfMatch => buf.append("match "),
        PrFunction => buf.append("func "),
        PrClass => buf.append("class "),
        PrClassName => buf.append("class_name "),
        PrExtends => buf.append("extends "),
        PrIs => buf.append_op("is"),
        PrOnready => buf.append("onready "),
        PrTool => buf.append("tool "),
        PrStatic => buf.append("static "),
        PrExport => buf.append("export "),
        PrSetget => buf.append_op("setget"),
        PrConst => buf.append("const "),
        PrVar => buf.append("var "),
        PrAs => buf.append_op("as"),
        PrVoid => buf.append("void "),
        PrEnum => buf.append("enum "),
        PrPreload => buf.append("preload"),
        PrAssert => buf.append("assert "),
        PrYield => buf.append("yield "),
        PrSignal => buf.append("signal "),
        PrBreakpoint => buf.append("breakpoint "),
        PrRemote => buf.append("remote "),
        PrSync => buf.append("sync "),
        PrMaster => buf.append("master "),
        PrSlave => buf.append("slave "),
        PrPuppet => buf.append("puppet "),
        PrRemotesync => buf.append("remotesync "),
        PrMastersync => buf.append("mastersync "),
        PrPuppetsync => buf.append("puppetsync "),
        BracketOpen => buf.append("["),
        BracketClose => buf.append("]"),
        CurlyBracketOpen => buf.append_op("{"),
        CurlyBracketClose => buf.append("}"),
        ParenthesisOpen => buf.append("("),
        ParenthesisClose => buf.append(")"),
        Comma => buf.append(", "),
        Semicolon => buf.append(";"),
        Period => buf.append("."),
        QuestionMark => buf.append("?"),
        Colon => buf.append(":"),
        Dollar => buf.append("$"),
        ForwardArrow => buf.append("->"),
        Newline => {
            buf.indentation = token.data;
            buf.append_newline();
        }
        ConstPi => buf.append("PI"),
        ConstTau => buf.append("TAU"),
        // A match-arm wildcard; rendered as the language spells it.
        Wildcard => buf.append("_"),
        ConstInf => buf.append("INF"),
        ConstNan => buf.append("NAN"),
    }
    Ok(())
}
