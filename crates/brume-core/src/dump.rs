//! dump.rs — Services de sortie d'un `Chunk` compilé.
//!
//! Deux formats :
//! - binaire brut : les octets du conteneur, tels que `Chunk::to_bytes`
//! - source C : un tableau `const uint8_t` prêt à être lié statiquement
//!
//! Dans les deux cas, `include_debug = false` écrit la variante strippée
//! (table de lignes et symboles retirés). La validation du nom de symbole C
//! appartient à ce module : rien n'est écrit si le nom est invalide.

use std::fmt::Write as _;
use std::io::{self, Write};

use thiserror::Error;

use crate::bytecode::Chunk;

#[derive(Debug, Error)]
pub enum DumpError {
    /// Le nom demandé n'est pas un identifiant C (`[A-Za-z_][A-Za-z0-9_]*`).
    #[error("{0}: nom de symbole C invalide")]
    InvalidSymbol(String),
    #[error("io: {0}")]
    Io(#[from] io::Error),
}

/// Écrit le conteneur binaire sur `w`.
pub fn dump_binary<W: Write>(
    chunk: &Chunk,
    include_debug: bool,
    w: &mut W,
) -> Result<(), DumpError> {
    let bytes = container_bytes(chunk, include_debug);
    w.write_all(&bytes)?;
    log::debug!("dump binaire: {} octets", bytes.len());
    Ok(())
}

/// Écrit le conteneur sous forme de source C définissant `symbol`.
///
/// Le symbole est validé avant toute écriture : un nom invalide laisse `w`
/// intact et remonte `DumpError::InvalidSymbol`.
pub fn dump_c_source<W: Write>(
    chunk: &Chunk,
    include_debug: bool,
    w: &mut W,
    symbol: &str,
) -> Result<(), DumpError> {
    if !is_valid_c_symbol(symbol) {
        return Err(DumpError::InvalidSymbol(symbol.to_string()));
    }
    let bytes = container_bytes(chunk, include_debug);

    let mut out = String::new();
    let _ = writeln!(out, "/* Bytecode Brume généré — ne pas éditer à la main. */");
    let _ = writeln!(out, "#include <stdint.h>");
    let _ = writeln!(out);
    let _ = writeln!(out, "const uint8_t {symbol}[] = {{");
    for row in bytes.chunks(16) {
        for b in row {
            let _ = write!(out, "0x{b:02x},");
        }
        out.push('\n');
    }
    let _ = writeln!(out, "}};");
    let _ = writeln!(out, "const uint32_t {symbol}_len = {};", bytes.len());

    w.write_all(out.as_bytes())?;
    log::debug!("dump C: {} octets de payload sous '{symbol}'", bytes.len());
    Ok(())
}

fn container_bytes(chunk: &Chunk, include_debug: bool) -> Vec<u8> {
    if include_debug {
        chunk.to_bytes()
    } else {
        chunk.strip().to_bytes()
    }
}

/// Identifiant C : `[A-Za-z_][A-Za-z0-9_]*`.
fn is_valid_c_symbol(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/* ───────────────────────── Tests ───────────────────────── */
