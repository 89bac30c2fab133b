//! Source-to-bytecode compiler: drives the tokenizer, interns
//! identifiers and constants, and serializes the compiled-unit layout.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::error::{GdscError, Result};
use crate::pool::Pool;
use crate::provider::BytecodeProvider;
use crate::token::{Operand, Token};
use crate::tokenize::tokenize;
use crate::value::GdValue;

/// Magic tag at the start of every compiled unit.
pub const MAGIC: &[u8; 4] = b"GDSC";

/// Byte mask applied to every identifier byte on the wire. Reversible
/// obfuscation, not encryption.
pub const IDENTIFIER_MASK: u8 = 0xB6;

/// Compile script source to a compiled-unit buffer under the symbol
/// tables of `provider`.
pub fn compile(source: &str, provider: &BytecodeProvider) -> Result<Vec<u8>> {
    let mut tokens = tokenize(source, provider)?;

    // Two interning passes: identifiers first, constants second, each in
    // first-occurrence order. Token payloads become pool indices.
    let mut identifiers: Pool<String> = Pool::new();
    for token in &mut tokens {
        if let Some(Operand::Identifier(name)) = &token.operand {
            token.data = identifiers.intern(name.clone());
        }
    }
    let mut constants: Pool<GdValue> = Pool::new();
    for token in &mut tokens {
        if let Some(Operand::Constant(value)) = &token.operand {
            token.data = constants.intern(value.clone());
        }
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(MAGIC);
    buf.write_u32::<LittleEndian>(provider.bytecode_version())?;
    buf.write_u32::<LittleEndian>(identifiers.len() as u32)?;
    buf.write_u32::<LittleEndian>(constants.len() as u32)?;
    // The token-to-line map is not populated; the count is still part of
    // the fixed header.
    buf.write_u32::<LittleEndian>(0)?;
    buf.write_u32::<LittleEndian>(tokens.len() as u32)?;

    for ident in identifiers.iter() {
        let bytes = ident.as_bytes();
        buf.write_u32::<LittleEndian>(bytes.len() as u32)?;
        buf.extend(bytes.iter().map(|b| b ^ IDENTIFIER_MASK));
    }

    for value in constants.iter() {
        value.serialize(&mut buf, provider)?;
    }

    for token in &tokens {
        write_token(&mut buf, token, provider)?;
    }

    Ok(buf)
}

/// Packed token form: one byte when the payload is zero and the kind
/// does not require it, else a u32 with the low byte's high bit set.
fn write_token(buf: &mut Vec<u8>, token: &Token, provider: &BytecodeProvider) -> Result<()> {
    let id = provider.token_id(token.kind)?;
    if id >= 0x80 {
        // Table indices stay below 128 in every known revision; a wider
        // id cannot be told apart from the wide-form marker.
        return Err(GdscError::Format(format!(
            "token id {id} does not fit the packed encoding"
        )));
    }
    if token.data == 0 && !token.kind.always_wide() {
        buf.push(id as u8);
    } else {
        if token.data > 0x00FF_FFFF {
            return Err(GdscError::Format(format!(
                "token payload {} exceeds 24 bits",
                token.data
            )));
        }
        buf.write_u32::<LittleEndian>(id | (token.data << 8) | 0x80)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use byteorder::{LittleEndian, ReadBytesExt};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::provider::test_provider;
    use crate::token::TokenKind;

    struct Header {
        version: u32,
        identifier_count: u32,
        constant_count: u32,
        line_count: u32,
        token_count: u32,
    }

    fn read_header(buf: &[u8]) -> Header {
        assert_eq!(&buf[0..4], MAGIC);
        let mut r = &buf[4..];
        Header {
            version: r.read_u32::<LittleEndian>().unwrap(),
            identifier_count: r.read_u32::<LittleEndian>().unwrap(),
            constant_count: r.read_u32::<LittleEndian>().unwrap(),
            line_count: r.read_u32::<LittleEndian>().unwrap(),
            token_count: r.read_u32::<LittleEndian>().unwrap(),
        }
    }

    #[test]
    fn header_carries_version_and_counts() {
        let provider = test_provider();
        let buf = compile("var x = 1\n", provider).unwrap();
        let header = read_header(&buf);
        assert_eq!(header.version, provider.bytecode_version());
        assert_eq!(header.identifier_count, 1);
        assert_eq!(header.constant_count, 1);
        assert_eq!(header.line_count, 0);
        // var, x, =, 1, newline
        assert_eq!(header.token_count, 5);
    }

    #[test]
    fn identifiers_are_masked_on_the_wire() {
        let buf = compile("var x = 1\n", test_provider()).unwrap();
        // Identifier table follows the 24-byte header.
        let len = u32::from_le_bytes(buf[24..28].try_into().unwrap());
        assert_eq!(len, 1);
        assert_eq!(buf[28], b'x' ^ IDENTIFIER_MASK);
    }

    #[test]
    fn repeated_identifiers_share_one_pool_entry() {
        let buf = compile("var foo = foo + foo\n", test_provider()).unwrap();
        assert_eq!(read_header(&buf).identifier_count, 1);
    }

    #[test]
    fn constants_are_interned_by_value() {
        let provider = test_provider();
        let buf = compile("var a = 1\nvar b = 1\n", provider).unwrap();
        assert_eq!(read_header(&buf).constant_count, 1);

        // Structurally distinct values stay distinct.
        let buf = compile("var a = 1\nvar b = 2\n", provider).unwrap();
        assert_eq!(read_header(&buf).constant_count, 2);
    }

    #[test]
    fn bare_tokens_take_one_byte_and_payloads_take_four() {
        let provider = test_provider();

        let mut buf = Vec::new();
        write_token(&mut buf, &Token::bare(TokenKind::CfPass), provider).unwrap();
        assert_eq!(buf.len(), 1);
        assert_eq!(buf[0] & 0x80, 0);

        // Newline is always wide even at depth zero.
        let mut buf = Vec::new();
        write_token(
            &mut buf,
            &Token::with_data(TokenKind::Newline, 0),
            provider,
        )
        .unwrap();
        assert_eq!(buf.len(), 4);

        let mut buf = Vec::new();
        write_token(
            &mut buf,
            &Token::with_data(TokenKind::Newline, 3),
            provider,
        )
        .unwrap();
        let raw = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let value = raw ^ 0x80;
        assert_eq!(
            value & 0xFF,
            provider.token_id(TokenKind::Newline).unwrap()
        );
        assert_eq!(value >> 8, 3);
    }

    #[test]
    fn oversized_payloads_are_rejected() {
        let err = write_token(
            &mut Vec::new(),
            &Token::with_data(TokenKind::Newline, 0x0100_0000),
            test_provider(),
        )
        .unwrap_err();
        assert!(matches!(err, GdscError::Format(_)));
    }
}
