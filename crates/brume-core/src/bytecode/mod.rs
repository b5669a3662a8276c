//! bytecode — Format binaire de Brume : instructions + conteneur.
//!
//! Deux sous-modules :
//! - [`op`] : le jeu d'instructions (`Op`) et ses helpers
//! - [`chunk`] : le conteneur sérialisable (`Chunk`, pool de constantes,
//!   table de lignes, infos debug, hash d'intégrité)

pub mod chunk;
pub mod op;

pub use chunk::{
    Chunk, ChunkFlags, ChunkLoadError, ConstPool, ConstValue, DebugInfo, LineTable,
    CHUNK_MAGIC, CHUNK_VERSION,
};
pub use op::{ConstIx, LocalIx, Op, RelOff};
