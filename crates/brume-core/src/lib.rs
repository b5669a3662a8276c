//! brume-core — Cœur du langage Brume
//!
//! Tout ce qu’il faut pour compiler et manipuler le bytecode Brume, sans la
//! façade ligne de commande (voir le crate `brumec`).
//!
//! ## Modules
//! - `bytecode` : format `Chunk`, pool de constantes, opcodes `Op`.
//! - `compile`  : lexer, parseur, générateur de code, service [`Compiler`].
//! - `dump`     : sorties binaire brute et source C.
//! - `eval`     : évaluateur léger (exécution optionnelle, tests).
//! - `config`   : limites de compilation, surcharge par l’environnement.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod bytecode;
pub mod compile;
pub mod config;
pub mod dump;
pub mod eval;

// ---------- Reexports de confort ----------
pub use bytecode::{Chunk, ChunkFlags, ChunkLoadError, ConstPool, ConstValue, Op};
pub use compile::{CompileOptions, Compiler};
pub use config::{Config, Limits};
pub use dump::{dump_binary, dump_c_source, DumpError};

// ---------- Version & bannières ----------

/// Version du crate (lisible, via Cargo).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Bannière de version (affichée par `-v` / `--version`).
pub fn version() -> String {
    format!("brume {VERSION}")
}

/// Bannière de copyright (affichée par `--copyright`).
pub fn copyright() -> String {
    "brume - Copyright (c) 2026 les développeurs de Brume".to_string()
}

// ---------- Erreurs & Résultat ----------

use thiserror::Error;

/// Erreur de haut niveau du cœur : chaque étape du pipeline garde son type
/// fin (position, contexte), et remonte ici via `From`.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Limites de compilation incohérentes (env `BRUME_*`).
    #[error("config: {0}")]
    Config(&'static str),

    #[error("{0}")]
    Lex(#[from] compile::LexError),

    #[error("{0}")]
    Parse(#[from] compile::ParseError),

    #[error("{0}")]
    Codegen(#[from] compile::CodegenError),

    /// Conteneur illisible (magie, version, intégrité).
    #[error("chunk: {0}")]
    Chunk(#[from] ChunkLoadError),

    /// Chunk produit ou chargé incohérent (références hors bornes).
    #[error("chunk invalide: {0}")]
    Invalid(String),

    #[error("exécution: {0}")]
    Eval(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------- Prelude ----------
pub mod prelude {
    pub use crate::{
        bytecode::{Chunk, ChunkFlags, ConstValue, Op},
        compile::{CompileOptions, Compiler},
        config::Config,
        dump::{dump_binary, dump_c_source, DumpError},
        version, Error, Result,
    };
}

/* ------------------------------- Tests ------------------------------- */
