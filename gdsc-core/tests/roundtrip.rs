use pretty_assertions::assert_eq;

use gdsc_core::compile::compile;
use gdsc_core::decompile::{decompile, CompiledUnit};
use gdsc_core::provider::Registry;
use gdsc_core::token::TokenKind;
use gdsc_core::value::GdValue;

const HASH_3_2: &str = "f5022b8aa3fe66be05acb17bb28b5d07a7c409e3";
const HASH_2_1: &str = "2fb6f2e91e975d106b2fb99c8d2c50d4f3c245c3";

const SAMPLE: &str = "\
extends Node\n\
\n\
const SPEED = 100.5\n\
var health = 20\n\
\n\
func _ready():\n\
\tvar dir = Vector2(1, 0)\n\
\tif health > 10 and health < 100:\n\
\t\thealth += 1\n\
\telif health == 10:\n\
\t\thealth = 0\n\
\telse:\n\
\t\tpass\n\
\tfor i in range(3):\n\
\t\tprint(\"tick\")\n\
\treturn sin(SPEED) * 2\n";

/// Decompiling a compiled unit and recompiling the output must
/// reproduce the token stream. Text round-trips are not promised
/// (comments and exact spacing are gone), token streams are.
#[test]
fn decompile_then_recompile_preserves_the_token_stream() {
    let registry = Registry::builtin().unwrap();
    let provider = registry.by_commit_hash(HASH_3_2).unwrap();

    let first = compile(SAMPLE, provider).unwrap();
    let source = decompile(&first, provider).unwrap();
    let second = compile(&source, provider).unwrap();

    let unit_a = CompiledUnit::parse(&first, provider).unwrap();
    let unit_b = CompiledUnit::parse(&second, provider).unwrap();
    assert_eq!(unit_a.tokens, unit_b.tokens);
    assert_eq!(unit_a.identifiers, unit_b.identifiers);
    assert_eq!(unit_a.constants, unit_b.constants);
}

#[test]
fn decompiled_output_is_stable() {
    let registry = Registry::builtin().unwrap();
    let provider = registry.by_commit_hash(HASH_3_2).unwrap();

    let bytes = compile(SAMPLE, provider).unwrap();
    let once = decompile(&bytes, provider).unwrap();
    let again = decompile(&compile(&once, provider).unwrap(), provider).unwrap();
    assert_eq!(once, again);
}

#[test]
fn end_to_end_var_statement() {
    let registry = Registry::builtin().unwrap();
    let provider = registry.by_commit_hash(HASH_3_2).unwrap();

    let bytes = compile("var x = 1\n", provider).unwrap();
    let unit = CompiledUnit::parse(&bytes, provider).unwrap();

    let kinds: Vec<TokenKind> = unit.tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::PrVar,
            TokenKind::Identifier,
            TokenKind::OpAssign,
            TokenKind::Constant,
            TokenKind::Newline,
        ]
    );
    assert_eq!(unit.identifiers, vec!["x".to_string()]);
    assert_eq!(unit.constants, vec![GdValue::Int32(1)]);
    assert_eq!(unit.tokens[4].data, 0);

    assert_eq!(decompile(&bytes, provider).unwrap(), "var x = 1\n");
}

#[test]
fn pools_deduplicate_across_the_whole_unit() {
    let registry = Registry::builtin().unwrap();
    let provider = registry.by_commit_hash(HASH_3_2).unwrap();

    let bytes = compile("var foo = 1\nfoo = foo + 1\n", provider).unwrap();
    let unit = CompiledUnit::parse(&bytes, provider).unwrap();
    assert_eq!(unit.identifiers, vec!["foo".to_string()]);
    assert_eq!(unit.constants, vec![GdValue::Int32(1)]);

    // All three identifier tokens reference pool slot 0.
    let slots: Vec<u32> = unit
        .tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Identifier)
        .map(|t| t.data)
        .collect();
    assert_eq!(slots, vec![0, 0, 0]);
}

#[test]
fn wide_and_narrow_numeric_constants_round_trip() {
    let registry = Registry::builtin().unwrap();
    let provider = registry.by_commit_hash(HASH_3_2).unwrap();

    let bytes = compile("var a = 5\nvar b = 2147483648\nvar c = 0.5\n", provider).unwrap();
    let unit = CompiledUnit::parse(&bytes, provider).unwrap();
    assert_eq!(
        unit.constants,
        vec![
            GdValue::Int32(5),
            GdValue::Int64(2147483648),
            GdValue::Float32(0.5),
        ]
    );
}

/// The 2.x descriptor uses a different token table and type table; the
/// same source must compile and decompile under it.
#[test]
fn legacy_descriptor_round_trips() {
    let registry = Registry::builtin().unwrap();
    let provider = registry.by_commit_hash(HASH_2_1).unwrap();

    let source = "var m = Matrix32(Vector2(1, 0), Vector2(0, 1), Vector2(0, 0))\n";
    let bytes = compile(source, provider).unwrap();
    assert_eq!(decompile(&bytes, provider).unwrap(), source);

    // A unit compiled for 2.1 must not decode under the 3.2 descriptor.
    let modern = registry.by_commit_hash(HASH_3_2).unwrap();
    assert!(decompile(&bytes, modern).is_err());
}

#[test]
fn match_statement_is_rejected_by_legacy_versions() {
    let registry = Registry::builtin().unwrap();
    let provider = registry.by_commit_hash(HASH_2_1).unwrap();
    // Tokenizes fine but cannot serialize: CfMatch has no wire id in 2.1.
    assert!(compile("match x:\n\tpass\n", provider).is_err());
}
