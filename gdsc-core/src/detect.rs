//! Bytecode version detection for engine binaries.
//!
//! Release builds embed their git commit hash as a NUL-terminated
//! 40-character lowercase hex string. Scanning for the exact gap of 41
//! bytes between NULs keeps false positives rare, and any candidate
//! still has to resolve through the commit histories to count.

use log::debug;

use crate::error::Result;
use crate::provider::{BytecodeProvider, Registry};

fn is_lower_hex(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(b))
}

/// Scan an engine binary for its commit hash and resolve the matching
/// descriptor, falling back to the nearest released ancestor for
/// unknown commits. Returns None when no candidate resolves.
pub fn detect<'a>(registry: &'a Registry, binary: &[u8]) -> Result<Option<&'a BytecodeProvider>> {
    let mut last_zero: usize = 0;
    for (i, byte) in binary.iter().enumerate() {
        if *byte != 0 {
            continue;
        }
        if i - last_zero == 41 {
            let candidate = &binary[last_zero + 1..i];
            if is_lower_hex(candidate) {
                // Guaranteed valid UTF-8: all bytes are ASCII hex.
                let hash = std::str::from_utf8(candidate).unwrap_or_default();
                debug!("candidate commit hash at offset {}: {hash}", last_zero + 1);
                if let Some(resolved) = registry.find_previous_major_version_hash(hash)? {
                    let resolved = resolved.to_string();
                    return registry.by_commit_hash(&resolved).map(Some);
                }
            }
        }
        last_zero = i;
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::provider::test_registry;

    fn binary_with(hash: &str) -> Vec<u8> {
        let mut bin = vec![0u8, 0x41, 0x42, 0, 0];
        bin.extend_from_slice(hash.as_bytes());
        bin.push(0);
        bin.extend_from_slice(b"trailing data");
        bin.push(0);
        bin
    }

    #[test]
    fn known_hash_resolves_directly() {
        let registry = test_registry();
        let bin = binary_with("f5022b8aa3fe66be05acb17bb28b5d07a7c409e3");
        let provider = detect(registry, &bin).unwrap().unwrap();
        assert_eq!(
            provider.commit_hash(),
            "f5022b8aa3fe66be05acb17bb28b5d07a7c409e3"
        );
    }

    #[test]
    fn newer_unknown_commit_falls_back_to_its_ancestor() {
        let registry = test_registry();
        let bin = binary_with("939e437bf9eeba734f25f9df3a32464951eb3019");
        let provider = detect(registry, &bin).unwrap().unwrap();
        assert_eq!(
            provider.commit_hash(),
            "f5022b8aa3fe66be05acb17bb28b5d07a7c409e3"
        );
    }

    #[test]
    fn uppercase_or_short_candidates_are_ignored() {
        let registry = test_registry();
        // Uppercase hex is not a git hash as the engine embeds it.
        let bin = binary_with("F5022B8AA3FE66BE05ACB17BB28B5D07A7C409E3");
        assert!(detect(registry, &bin).unwrap().is_none());

        let mut bin = vec![0u8];
        bin.extend_from_slice(b"f5022b8");
        bin.push(0);
        assert!(detect(registry, &bin).unwrap().is_none());
    }

    #[test]
    fn unrelated_binaries_detect_nothing() {
        let registry = test_registry();
        let bin = vec![1u8, 2, 3, 0, 5, 6, 0];
        assert!(detect(registry, &bin).unwrap().is_none());
    }
}
