//! chunk.rs — Conteneur binaire d'un chunk de bytecode Brume.
//!
//! - Pool de constantes (null, bool, i64, f64, chaînes) avec dé-dupe des chaînes
//! - Table de lignes compacte (RLE)
//! - Infos debug optionnelles (fichier principal, noms des slots locaux)
//! - (Dé)sérialisation bincode (fixint, little-endian) + versionnage
//! - Hash d'intégrité FNV-1a 64 dans l'en-tête
//! - Désassemblage lisible (constantes résolues)
//!
//! Le format est **déterministe** : aucune date ni donnée d'environnement
//! n'entre dans l'en-tête. Sérialiser deux fois le même contenu produit
//! exactement les mêmes octets.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::ops::Range;

use bincode::Options as _;

use crate::bytecode::op::{ConstIx, LocalIx, Op};

/// Numéro de version du format de chunk.
/// Incrémente si la structure sérialisée change.
pub const CHUNK_VERSION: u16 = 1;

/// Magic en tête de fichier : b"BRBC"
pub const CHUNK_MAGIC: [u8; 4] = *b"BRBC";

/// Flags de chunk.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkFlags {
    /// Si vrai, le chunk est “stripped” (ni table de lignes, ni infos debug).
    pub stripped: bool,
}

/// Valeurs constantes embarquables dans un chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    /// Chaînes UTF-8 (internées côté pool).
    Str(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => f.write_str("null"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::I64(i) => write!(f, "{i}"),
            ConstValue::F64(x) => {
                if x.is_nan() {
                    f.write_str("NaN")
                } else if x.is_infinite() {
                    f.write_str(if x.is_sign_positive() { "+Inf" } else { "-Inf" })
                } else {
                    write!(f, "{x}")
                }
            }
            ConstValue::Str(s) => {
                f.write_char('"')?;
                for ch in s.chars() {
                    match ch {
                        '\\' => f.write_str("\\\\")?,
                        '"' => f.write_str("\\\"")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
                        c => f.write_char(c)?,
                    }
                }
                f.write_char('"')
            }
        }
    }
}

/// Pool de constantes avec dé-dupe basique des chaînes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstPool {
    pub(crate) values: Vec<ConstValue>,
    #[serde(skip)]
    str_index: ahash::AHashMap<String, ConstIx>,
}

impl ConstPool {
    pub fn new() -> Self {
        Self { values: Vec::new(), str_index: ahash::AHashMap::new() }
    }

    pub fn add(&mut self, v: ConstValue) -> ConstIx {
        match &v {
            ConstValue::Str(s) => {
                if let Some(&idx) = self.str_index.get(s) {
                    return idx;
                }
                let idx = self.push_raw(v);
                if let ConstValue::Str(s) = &self.values[idx as usize] {
                    self.str_index.insert(s.clone(), idx);
                }
                idx
            }
            _ => self.push_raw(v),
        }
    }

    fn push_raw(&mut self, v: ConstValue) -> ConstIx {
        let idx = self.values.len() as ConstIx;
        self.values.push(v);
        idx
    }

    pub fn get(&self, idx: ConstIx) -> Option<&ConstValue> {
        self.values.get(idx as usize)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstIx, &ConstValue)> {
        self.values.iter().enumerate().map(|(i, v)| (i as ConstIx, v))
    }
}

/// Entrée compressée de la table de lignes (RLE).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineRun {
    pub start_pc: u32,
    pub line: u32,
    pub len: u32,
}

/// Table des lignes : map PC -> ligne via segments RLE.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineTable {
    runs: Vec<LineRun>,
}

impl LineTable {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    pub fn push_line(&mut self, pc: u32, line: u32) {
        match self.runs.last_mut() {
            Some(last) if last.line == line && last.start_pc + last.len == pc => {
                last.len += 1;
            }
            _ => self.runs.push(LineRun { start_pc: pc, line, len: 1 }),
        }
    }

    pub fn line_for_pc(&self, pc: u32) -> Option<u32> {
        self.runs
            .iter()
            .find(|run| pc >= run.start_pc && pc < run.start_pc + run.len)
            .map(|run| run.line)
    }

    pub fn iter_ranges(&self) -> impl Iterator<Item = (Range<u32>, u32)> + '_ {
        self.runs.iter().map(|r| (r.start_pc..(r.start_pc + r.len), r.line))
    }

    pub fn clear(&mut self) {
        self.runs.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Informations de debug optionnelles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugInfo {
    /// Nom du fichier source principal (tel que fourni au compilateur).
    pub main_file: Option<String>,
    /// Noms des slots locaux, dans l'ordre de déclaration.
    pub locals: Vec<(String, LocalIx)>,
}

impl DebugInfo {
    pub fn is_empty(&self) -> bool {
        self.main_file.is_none() && self.locals.is_empty()
    }
}

/// En-tête de chunk, séparé pour contrôle d'intégrité.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChunkHeader {
    magic: [u8; 4],
    version: u16,
    flags: ChunkFlags,
    hash_fnv1a_64: u64,
}

/// Le chunk complet : ops + constantes + métadonnées.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    header: ChunkHeader,
    /// Nombre de slots locaux à réserver à l'exécution.
    pub local_slots: LocalIx,
    pub ops: Vec<Op>,
    pub consts: ConstPool,
    pub lines: LineTable,
    pub debug: DebugInfo,
}

impl Chunk {
    pub fn new(flags: ChunkFlags) -> Self {
        Self {
            header: ChunkHeader {
                magic: CHUNK_MAGIC,
                version: CHUNK_VERSION,
                flags,
                hash_fnv1a_64: 0,
            },
            local_slots: 0,
            ops: Vec::new(),
            consts: ConstPool::new(),
            lines: LineTable::new(),
            debug: DebugInfo::default(),
        }
    }

    pub fn version(&self) -> u16 {
        self.header.version
    }

    pub fn flags(&self) -> ChunkFlags {
        self.header.flags
    }

    pub fn push_op(&mut self, op: Op, line: Option<u32>) -> u32 {
        let pc = self.ops.len() as u32;
        self.ops.push(op);
        if let Some(l) = line {
            self.lines.push_line(pc, l);
        }
        pc
    }

    pub fn add_const(&mut self, v: ConstValue) -> ConstIx {
        self.consts.add(v)
    }

    pub fn const_at(&self, idx: ConstIx) -> Option<&ConstValue> {
        self.consts.get(idx)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Hash FNV-1a 64 du contenu (tout sauf l'en-tête lui-même).
    pub fn compute_hash(&self) -> u64 {
        fn feed_ser<T: serde::Serialize>(h: &mut Fnv1a64, v: &T) {
            let bytes = bincode::serialize(v).expect("serialize ok");
            h.write(&bytes);
        }
        let mut hasher = Fnv1a64::new();
        feed_ser(&mut hasher, &self.local_slots);
        feed_ser(&mut hasher, &self.ops);
        feed_ser(&mut hasher, &self.consts.values);
        feed_ser(&mut hasher, &self.lines);
        feed_ser(&mut hasher, &(&self.debug.main_file, &self.debug.locals));
        hasher.finish()
    }

    /// Sérialise le chunk (en-tête finalisé avec le hash du contenu).
    ///
    /// Déterministe : le même contenu donne toujours les mêmes octets.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.clone();
        out.header.hash_fnv1a_64 = out.compute_hash();
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_little_endian()
            .serialize(&out)
            .expect("serialize chunk")
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ChunkLoadError> {
        let mut chunk: Self = bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .with_little_endian()
            .deserialize(bytes)
            .map_err(ChunkLoadError::Bincode)?;

        if chunk.header.magic != CHUNK_MAGIC {
            return Err(ChunkLoadError::BadMagic(chunk.header.magic));
        }
        if chunk.header.version != CHUNK_VERSION {
            return Err(ChunkLoadError::BadVersion {
                expected: CHUNK_VERSION,
                found: chunk.header.version,
            });
        }

        chunk.rebuild_string_index();

        let expected = chunk.header.hash_fnv1a_64;
        let found = chunk.compute_hash();
        if expected != found {
            return Err(ChunkLoadError::BadHash { expected, found });
        }

        Ok(chunk)
    }

    fn rebuild_string_index(&mut self) {
        self.consts.str_index.clear();
        for (i, v) in self.consts.values.iter().enumerate() {
            if let ConstValue::Str(s) = v {
                self.consts.str_index.insert(s.clone(), i as ConstIx);
            }
        }
    }

    /// Copie sans table de lignes ni infos debug (flag `stripped` levé).
    pub fn strip(&self) -> Self {
        let mut out = self.clone();
        out.lines.clear();
        out.debug = DebugInfo::default();
        out.header.flags.stripped = true;
        out
    }

    /// Vérification structurelle : indices de constantes/slots/sauts valides.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.ops.len() as u32;
        for (pc, op) in self.ops.iter().enumerate() {
            let pc = pc as u32;
            match *op {
                Op::LoadConst(ix) => {
                    if self.consts.get(ix).is_none() {
                        return Err(format!("pc {pc}: const index {ix} hors pool"));
                    }
                }
                Op::LoadLocal(ix) | Op::StoreLocal(ix) => {
                    if ix >= self.local_slots {
                        return Err(format!("pc {pc}: slot local {ix} hors limites"));
                    }
                }
                Op::Jump(off) | Op::JumpIfFalse(off) => {
                    let dest = pc as i64 + 1 + off as i64;
                    if dest < 0 || dest > n as i64 {
                        return Err(format!("pc {pc}: saut vers {dest}, hors code"));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn disassemble(&self, title: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(&mut out, "== Disassemble: {title} ==");
        let _ = writeln!(
            &mut out,
            "version={} flags={:?} locals={} consts={} ops={}",
            self.header.version,
            self.header.flags,
            self.local_slots,
            self.consts.len(),
            self.ops.len()
        );

        if !self.consts.is_empty() {
            let _ = writeln!(&mut out, "\n# ConstPool");
            for (i, v) in self.consts.iter() {
                let _ = writeln!(&mut out, "  [{i}] = {v}");
            }
        }

        let _ = writeln!(&mut out, "\n# Code");
        for (pc, op) in self.ops.iter().enumerate() {
            let pc = pc as u32;
            let line = self.lines.line_for_pc(pc).unwrap_or(0);
            let _ = writeln!(&mut out, "{pc:05}  (ligne {line:>4})  {}", fmt_op(op, &self.consts));
        }

        if !self.lines.is_empty() {
            let _ = writeln!(&mut out, "\n# LineTable (RLE)");
            for (range, line) in self.lines.iter_ranges() {
                let _ = writeln!(&mut out, "  pc {}..{}  -> ligne {}", range.start, range.end, line);
            }
        }

        if !self.debug.is_empty() {
            let _ = writeln!(&mut out, "\n# DebugInfo");
            if let Some(main) = &self.debug.main_file {
                let _ = writeln!(&mut out, "  main_file: {main}");
            }
            for (name, slot) in &self.debug.locals {
                let _ = writeln!(&mut out, "  local {name} @ slot {slot}");
            }
        }

        out
    }
}

#[derive(Debug)]
pub enum ChunkLoadError {
    Bincode(bincode::Error),
    BadMagic([u8; 4]),
    BadVersion { expected: u16, found: u16 },
    BadHash { expected: u64, found: u64 },
}

impl fmt::Display for ChunkLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkLoadError::Bincode(e) => write!(f, "bincode: {e}"),
            ChunkLoadError::BadMagic(m) => write!(f, "mauvais magic: {m:?}"),
            ChunkLoadError::BadVersion { expected, found } => {
                write!(f, "mauvaise version: attendu {expected}, trouvé {found}")
            }
            ChunkLoadError::BadHash { expected, found } => {
                write!(f, "hash invalide: attendu 0x{expected:016x}, trouvé 0x{found:016x}")
            }
        }
    }
}
impl std::error::Error for ChunkLoadError {}

fn fmt_op(op: &Op, pool: &ConstPool) -> String {
    match *op {
        Op::LoadConst(ix) => match pool.get(ix) {
            Some(v) => format!("ldc {ix} /* {v} */"),
            None => format!("ldc {ix} /* ?? */"),
        },
        _ => op.to_string(),
    }
}

#[derive(Default)]
struct Fnv1a64(u64);
impl Fnv1a64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    fn new() -> Self { Self(Self::OFFSET_BASIS) }
    fn write(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(Self::PRIME);
        }
        self.0 = h;
    }
    fn finish(&self) -> u64 { self.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> Chunk {
        let mut c = Chunk::new(ChunkFlags { stripped: false });
        c.local_slots = 1;
        let k_hello = c.add_const(ConstValue::Str("hello".into()));
        let k_num = c.add_const(ConstValue::I64(42));
        c.push_op(Op::LoadConst(k_hello), Some(1));
        c.push_op(Op::StoreLocal(0), Some(1));
        c.push_op(Op::LoadConst(k_num), Some(2));
        c.push_op(Op::Print, Some(2));
        c.push_op(Op::Return, Some(3));
        c.debug.main_file = Some("sample.brm".into());
        c.debug.locals.push(("greeting".into(), 0));
        c
    }

    #[test]
    fn roundtrip() {
        let c = sample_chunk();
        let bytes = c.to_bytes();
        let loaded = Chunk::from_bytes(&bytes).expect("load ok");
        assert_eq!(loaded.ops.len(), 5);
        assert_eq!(loaded.consts.len(), 2);
        assert_eq!(loaded.local_slots, 1);
        assert_eq!(loaded.lines.line_for_pc(0), Some(1));
        assert_eq!(loaded.lines.line_for_pc(2), Some(2));
        assert_eq!(loaded.lines.line_for_pc(4), Some(3));
        assert_eq!(loaded.debug.main_file.as_deref(), Some("sample.brm"));
    }

    #[test]
    fn bytes_are_deterministic() {
        let c = sample_chunk();
        assert_eq!(c.to_bytes(), c.to_bytes());
        assert_eq!(sample_chunk().to_bytes(), c.to_bytes());
    }

    #[test]
    fn strings_are_deduped() {
        let mut c = Chunk::new(ChunkFlags::default());
        let a = c.add_const(ConstValue::Str("x".into()));
        let b = c.add_const(ConstValue::Str("x".into()));
        let d = c.add_const(ConstValue::Str("y".into()));
        assert_eq!(a, b);
        assert_ne!(a, d);
        assert_eq!(c.consts.len(), 2);
    }

    #[test]
    fn index_survives_reload() {
        let mut c = Chunk::new(ChunkFlags::default());
        c.add_const(ConstValue::Str("x".into()));
        let mut loaded = Chunk::from_bytes(&c.to_bytes()).expect("load ok");
        // la dé-dupe doit retrouver la chaîne après rechargement
        let idx = loaded.add_const(ConstValue::Str("x".into()));
        assert_eq!(idx, 0);
        assert_eq!(loaded.consts.len(), 1);
    }

    #[test]
    fn strip_clears_debug() {
        let c = sample_chunk();
        let s = c.strip();
        assert!(s.flags().stripped);
        assert!(s.lines.is_empty());
        assert!(s.debug.is_empty());
        assert_eq!(s.ops.len(), c.ops.len());
        assert_eq!(s.local_slots, c.local_slots);
        // le chunk stripped reste chargeable
        let loaded = Chunk::from_bytes(&s.to_bytes()).expect("load ok");
        assert!(loaded.flags().stripped);
    }

    #[test]
    fn corrupted_content_is_detected() {
        let c = sample_chunk();
        let mut bytes = c.to_bytes();
        // flip une lettre du "hello" embarqué (reste de l'UTF-8 valide)
        let pos = bytes
            .windows(5)
            .position(|w| w == b"hello")
            .expect("const string présente");
        bytes[pos] ^= 0x01;
        match Chunk::from_bytes(&bytes) {
            Err(ChunkLoadError::BadHash { .. }) => {}
            other => panic!("attendu BadHash, obtenu {other:?}"),
        }
    }

    #[test]
    fn bad_magic_is_detected() {
        let c = sample_chunk();
        let mut bytes = c.to_bytes();
        bytes[0] ^= 0xFF; // le magic est sérialisé en premier
        match Chunk::from_bytes(&bytes) {
            Err(ChunkLoadError::BadMagic(_)) => {}
            other => panic!("attendu BadMagic, obtenu {other:?}"),
        }
    }

    #[test]
    fn bad_version_is_detected() {
        let c = sample_chunk();
        let mut bytes = c.to_bytes();
        bytes[4] = CHUNK_VERSION as u8 + 1; // version u16 LE juste après le magic
        match Chunk::from_bytes(&bytes) {
            Err(ChunkLoadError::BadVersion { found, .. }) => {
                assert_eq!(found, CHUNK_VERSION + 1);
            }
            other => panic!("attendu BadVersion, obtenu {other:?}"),
        }
    }

    #[test]
    fn validate_catches_bad_refs() {
        let mut c = Chunk::new(ChunkFlags::default());
        c.push_op(Op::LoadConst(7), None);
        assert!(c.validate().is_err());

        let mut c = Chunk::new(ChunkFlags::default());
        c.push_op(Op::StoreLocal(0), None); // local_slots = 0
        assert!(c.validate().is_err());

        let mut c = Chunk::new(ChunkFlags::default());
        c.push_op(Op::Jump(5), None);
        assert!(c.validate().is_err());

        let mut c = Chunk::new(ChunkFlags::default());
        c.push_op(Op::Jump(-5), None);
        assert!(c.validate().is_err());

        let c = sample_chunk();
        assert!(c.validate().is_ok());
    }
}
