//! Versioned symbol tables for the compiled-script format.
//!
//! Token ids, built-in function ids and constant type tags are all
//! indices into per-revision ordered name tables. Each supported engine
//! revision ships as an embedded YAML descriptor keyed by the engine's
//! git commit hash, plus a commit-history list per release branch so a
//! build from an unknown commit can fall back to its nearest known
//! ancestor.

use std::collections::HashMap;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::{GdscError, Result};
use crate::token::TokenKind;

/// Type name table shared by 3.x revisions.
pub const TYPE_NAMES_V3: &[&str] = &[
    "Nil", "bool", "int", "float", "String", "Vector2", "Rect2", "Vector3", "Transform2D",
    "Plane", "Quat", "AABB", "Basis", "Transform", "Color", "NodePath", "RID", "Object",
    "Dictionary", "Array", "PoolByteArray", "PoolIntArray", "PoolRealArray", "PoolStringArray",
    "PoolVector2Array", "PoolVector3Array", "PoolColorArray",
];

/// Type name table shared by 2.x revisions.
pub const TYPE_NAMES_V2: &[&str] = &[
    "Nil", "bool", "int", "float", "String", "Vector2", "Rect2", "Vector3", "Matrix32", "Plane",
    "Quat", "AABB", "Matrix3", "Transform", "Color", "Image", "NodePath", "RID", "Object",
    "InputEvent", "Dictionary", "Array", "RawArray", "IntArray", "FloatArray", "StringArray",
    "Vector2Array", "Vector3Array", "ColorArray",
];

/// One bytecode descriptor record, as stored in `data/providers/`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderData {
    pub commit_hash: String,
    pub type_name_version: u32,
    pub description: String,
    pub bytecode_version: u32,
    pub function_names: Vec<String>,
    pub tokens: Vec<String>,
}

/// Ordered commit list of one release branch, newest first, as stored
/// in `data/histories/`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommitHistory {
    pub branch: String,
    pub history: Vec<String>,
}

/// Symbol tables of one engine revision, with both lookup directions
/// precomputed.
#[derive(Debug)]
pub struct BytecodeProvider {
    data: ProviderData,
    type_names: &'static [&'static str],
    // None for descriptor token names this build does not know; hitting
    // one at decode time reports the wire id as unknown.
    kind_by_id: Vec<Option<TokenKind>>,
    id_by_kind: HashMap<TokenKind, u32>,
    func_id_by_name: HashMap<String, u32>,
}

impl BytecodeProvider {
    pub fn from_data(data: ProviderData) -> Result<Self> {
        let type_names: &'static [&'static str] = match data.type_name_version {
            3 => TYPE_NAMES_V3,
            2 => TYPE_NAMES_V2,
            other => {
                return Err(GdscError::Format(format!(
                    "invalid type name version: {other}"
                )));
            }
        };

        let kind_by_id: Vec<Option<TokenKind>> = data
            .tokens
            .iter()
            .map(|name| TokenKind::from_str(name).ok())
            .collect();
        let mut id_by_kind = HashMap::new();
        for (id, kind) in kind_by_id.iter().enumerate() {
            if let Some(kind) = kind {
                id_by_kind.entry(*kind).or_insert(id as u32);
            }
        }

        let func_id_by_name = data
            .function_names
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id as u32))
            .collect();

        Ok(Self {
            data,
            type_names,
            kind_by_id,
            id_by_kind,
            func_id_by_name,
        })
    }

    pub fn commit_hash(&self) -> &str {
        &self.data.commit_hash
    }

    pub fn description(&self) -> &str {
        &self.data.description
    }

    pub fn bytecode_version(&self) -> u32 {
        self.data.bytecode_version
    }

    pub fn type_names(&self) -> &'static [&'static str] {
        self.type_names
    }

    pub fn function_names(&self) -> &[String] {
        &self.data.function_names
    }

    pub fn type_name(&self, id: u32) -> Result<&'static str> {
        self.type_names
            .get(id as usize)
            .copied()
            .ok_or_else(|| GdscError::Format(format!("invalid constant type id: {id}")))
    }

    pub fn type_id(&self, name: &str) -> Result<u32> {
        self.type_names
            .iter()
            .position(|n| *n == name)
            .map(|id| id as u32)
            .ok_or_else(|| GdscError::UnsupportedInVersion(name.to_string()))
    }

    /// First of `names` present in this revision's type table. Lets the
    /// codec spell a type both ways across the 2.x/3.x renames.
    pub fn type_id_any(&self, names: &[&str]) -> Result<u32> {
        for name in names {
            if let Ok(id) = self.type_id(name) {
                return Ok(id);
            }
        }
        Err(GdscError::UnsupportedInVersion(names.join("/")))
    }

    pub fn token_kind(&self, id: u32) -> Result<TokenKind> {
        self.kind_by_id
            .get(id as usize)
            .copied()
            .flatten()
            .ok_or(GdscError::UnknownToken(id))
    }

    pub fn token_id(&self, kind: TokenKind) -> Result<u32> {
        self.id_by_kind
            .get(&kind)
            .copied()
            .ok_or_else(|| GdscError::UnsupportedInVersion(format!("{kind:?}")))
    }

    pub fn builtin_func_name(&self, id: u32) -> Result<&str> {
        self.data
            .function_names
            .get(id as usize)
            .map(String::as_str)
            .ok_or_else(|| GdscError::Format(format!("invalid built-in function id: {id}")))
    }

    pub fn builtin_func_id(&self, name: &str) -> Option<u32> {
        self.func_id_by_name.get(name).copied()
    }
}

// Descriptor/history pairs compiled into the binary. Adding support for
// a new engine revision is a data change here, not a code change.
const PROVIDER_SOURCES: &[&str] = &[
    include_str!("../data/providers/bytecode_3_2.yaml"),
    include_str!("../data/providers/bytecode_3_1.yaml"),
    include_str!("../data/providers/bytecode_2_1.yaml"),
];

const HISTORY_SOURCES: &[&str] = &[
    include_str!("../data/histories/history_3_2.yaml"),
    include_str!("../data/histories/history_3_1.yaml"),
    include_str!("../data/histories/history_2_1.yaml"),
];

/// All known bytecode descriptors and branch histories.
///
/// Constructed once at startup and passed by reference to every call
/// that needs version resolution. Tests can build minimal registries
/// from their own records via [`Registry::from_records`].
pub struct Registry {
    providers: HashMap<String, BytecodeProvider>,
    short_form: HashMap<String, String>,
    histories: Vec<CommitHistory>,
}

impl Registry {
    /// The registry of descriptors embedded in this build.
    pub fn builtin() -> Result<Self> {
        let mut records = Vec::with_capacity(PROVIDER_SOURCES.len());
        for source in PROVIDER_SOURCES {
            let data: ProviderData = serde_yaml::from_str(source).map_err(|e| {
                GdscError::Format(format!("embedded bytecode descriptor is malformed: {e}"))
            })?;
            records.push(data);
        }
        let mut histories = Vec::with_capacity(HISTORY_SOURCES.len());
        for source in HISTORY_SOURCES {
            let history: CommitHistory = serde_yaml::from_str(source).map_err(|e| {
                GdscError::Format(format!("embedded commit history is malformed: {e}"))
            })?;
            histories.push(history);
        }
        Self::from_records(records, histories)
    }

    pub fn from_records(
        records: Vec<ProviderData>,
        histories: Vec<CommitHistory>,
    ) -> Result<Self> {
        let mut providers = HashMap::new();
        let mut short_form = HashMap::new();
        for data in records {
            if data.commit_hash.len() != 40 {
                return Err(GdscError::Format(format!(
                    "descriptor commit hash must be 40 hex characters: {}",
                    data.commit_hash
                )));
            }
            let hash = data.commit_hash.clone();
            short_form.insert(hash[..7].to_string(), hash.clone());
            providers.insert(hash, BytecodeProvider::from_data(data)?);
        }
        Ok(Self {
            providers,
            short_form,
            histories,
        })
    }

    fn resolve_full_hash(&self, hash: &str) -> Result<Option<&str>> {
        match hash.len() {
            7 => Ok(self.short_form.get(hash).map(String::as_str)),
            40 => Ok(self.providers.get(hash).map(|p| p.commit_hash())),
            _ => Err(GdscError::Format(
                "commit hash must be either 7 (shortened form) or 40 (full form) hex characters"
                    .to_string(),
            )),
        }
    }

    /// Descriptor registered for `hash` (7 or 40 hex chars).
    pub fn by_commit_hash(&self, hash: &str) -> Result<&BytecodeProvider> {
        let full = self
            .resolve_full_hash(hash)?
            .ok_or_else(|| GdscError::UnknownVersion(hash.to_string()))?
            .to_string();
        Ok(&self.providers[&full])
    }

    pub fn has_provider_for_hash(&self, hash: &str) -> Result<bool> {
        Ok(self.resolve_full_hash(hash)?.is_some())
    }

    /// Walk the commit histories from `hash` toward older commits and
    /// return the first commit with a registered descriptor. Resolves a
    /// build from an unreleased or point-release commit to the closest
    /// released revision preceding it.
    pub fn find_previous_major_version_hash(&self, hash: &str) -> Result<Option<&str>> {
        if hash.len() < 7 {
            return Err(GdscError::Format(
                "commit hash must be 7 or more hex characters".to_string(),
            ));
        }
        for history in &self.histories {
            let mut seen_requested = false;
            for version in &history.history {
                if version.starts_with(hash) {
                    seen_requested = true;
                }
                if seen_requested {
                    if let Some(provider) = self.providers.get(version) {
                        return Ok(Some(provider.commit_hash()));
                    }
                }
            }
        }
        Ok(None)
    }

    /// All registered descriptors, in no particular order.
    pub fn providers(&self) -> impl Iterator<Item = &BytecodeProvider> {
        self.providers.values()
    }
}

#[cfg(test)]
pub(crate) fn test_registry() -> &'static Registry {
    use once_cell::sync::Lazy;
    static REGISTRY: Lazy<Registry> = Lazy::new(|| Registry::builtin().unwrap());
    &REGISTRY
}

#[cfg(test)]
pub(crate) fn test_provider() -> &'static BytecodeProvider {
    test_registry()
        .by_commit_hash("f5022b8aa3fe66be05acb17bb28b5d07a7c409e3")
        .unwrap()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn short_and_full_hashes_resolve_to_the_same_descriptor() {
        let registry = test_registry();
        let full = registry
            .by_commit_hash("f5022b8aa3fe66be05acb17bb28b5d07a7c409e3")
            .unwrap();
        let short = registry.by_commit_hash("f5022b8").unwrap();
        assert_eq!(full.commit_hash(), short.commit_hash());
        assert_eq!(full.bytecode_version(), 13);
    }

    #[test]
    fn malformed_hash_lengths_are_rejected() {
        let registry = test_registry();
        assert!(matches!(
            registry.by_commit_hash("abc123"),
            Err(GdscError::Format(_))
        ));
        assert!(matches!(
            registry.by_commit_hash("f5022b8aa"),
            Err(GdscError::Format(_))
        ));
    }

    #[test]
    fn unknown_hash_reports_unknown_version() {
        let registry = test_registry();
        assert!(matches!(
            registry.by_commit_hash("0000000000000000000000000000000000000000"),
            Err(GdscError::UnknownVersion(_))
        ));
        assert!(!registry.has_provider_for_hash("0000000").unwrap());
    }

    #[test]
    fn history_walk_finds_the_nearest_released_ancestor() {
        let registry = test_registry();

        // A commit newer than the latest release resolves back to it.
        let resolved = registry
            .find_previous_major_version_hash("939e437bf9eeba734f25f9df3a32464951eb3019")
            .unwrap()
            .unwrap();
        assert_eq!(resolved, "f5022b8aa3fe66be05acb17bb28b5d07a7c409e3");

        // A hash outside every history resolves to nothing.
        assert_eq!(
            registry
                .find_previous_major_version_hash("ffffffffffffffffffffffffffffffffffffffff")
                .unwrap(),
            None
        );
    }

    #[test]
    fn token_tables_map_both_directions() {
        let provider = test_provider();
        let id = provider.token_id(TokenKind::PrFunction).unwrap();
        assert_eq!(provider.token_kind(id).unwrap(), TokenKind::PrFunction);
        assert!(matches!(
            provider.token_kind(10_000),
            Err(GdscError::UnknownToken(10_000))
        ));
    }

    #[test]
    fn v2_descriptor_uses_the_older_type_table() {
        let provider = test_registry()
            .by_commit_hash("2fb6f2e91e975d106b2fb99c8d2c50d4f3c245c3")
            .unwrap();
        assert!(provider.type_id("Matrix32").is_ok());
        assert!(matches!(
            provider.type_id("Transform2D"),
            Err(GdscError::UnsupportedInVersion(_))
        ));
        // Match-statement support arrived after 2.1.
        assert!(matches!(
            provider.token_id(TokenKind::CfMatch),
            Err(GdscError::UnsupportedInVersion(_))
        ));
    }

    #[test]
    fn fixture_registries_can_be_built_from_records() {
        let record = ProviderData {
            commit_hash: "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            type_name_version: 3,
            description: "fixture".to_string(),
            bytecode_version: 1,
            function_names: vec!["sin".to_string()],
            tokens: vec!["Empty".to_string(), "Identifier".to_string()],
        };
        let registry = Registry::from_records(vec![record], Vec::new()).unwrap();
        let provider = registry.by_commit_hash("aaaaaaa").unwrap();
        assert_eq!(provider.token_id(TokenKind::Identifier).unwrap(), 1);
        assert_eq!(provider.builtin_func_id("sin"), Some(0));
    }
}
