//! gdsc-core
//!
//! Versioned codec for compiled GDScript ("GDSC") units and the engine
//! resource pack ("GDPC") container.
//!
//! Symbol tables differ per engine revision, so every compile/decompile
//! call runs against a [`provider::BytecodeProvider`] resolved from a
//! [`provider::Registry`] by the engine's git commit hash. Calls are
//! pure transforms over their own buffers; the registry is the only
//! shared state and is read-only after construction.

pub mod compile;
pub mod decompile;
pub mod detect;
pub mod error;
pub mod pck;
pub mod pool;
pub mod provider;
pub mod reader;
pub mod token;
pub mod tokenize;
pub mod value;

pub use compile::compile;
pub use decompile::{decompile, CompiledUnit};
pub use detect::detect;
pub use error::{GdscError, Result};
pub use provider::{BytecodeProvider, Registry};
