//! config.rs — Configuration du cœur compilateur Brume.
//!
//! Noyau volontairement minimal (pas de TOML ici, les outils amont peuvent
//! en rajouter) :
//! - Defaults sûrs (`Config::default()`)
//! - Lecture **ENV** (préfixe `BRUME_...`) via `Config::from_env()`
//! - Limites de sûreté (taille du code, du pool, nombre de locals…)
//! - `validate()` avant usage
//!
//! ENV supportés (tous facultatifs) :
//!   BRUME_MAX_OPS=<usize>
//!   BRUME_MAX_CONSTS=<usize>
//!   BRUME_MAX_LOCALS=<u16>
//!   BRUME_MAX_STRLEN=<usize>

/// Limites de sûreté pour la génération de chunks.
#[derive(Clone, Debug)]
pub struct Limits {
    /// Nombre maximal d'opcodes autorisé dans un chunk.
    pub max_ops: usize,
    /// Taille maximale du pool de constantes.
    pub max_consts: usize,
    /// Nombre maximal de slots locaux (`let`) d'un script.
    pub max_locals: u16,
    /// Longueur maximale d'une constante chaîne.
    pub max_string_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_ops: 1_000_000,
            max_consts: 65_536,
            max_locals: 4_096,
            max_string_len: 1_000_000,
        }
    }
}

/// Configuration complète du service de compilation.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub limits: Limits,
}

impl Config {
    /// Construit depuis les valeurs par défaut + ENV.
    pub fn from_env() -> Self {
        let mut c = Self::default();
        c.apply_env();
        c
    }

    /// Applique les variables d'environnement `BRUME_*`.
    pub fn apply_env(&mut self) {
        if let Some(v) = read_env("BRUME_MAX_OPS")    { if let Some(n) = parse_usize(&v) { self.limits.max_ops = n; } }
        if let Some(v) = read_env("BRUME_MAX_CONSTS") { if let Some(n) = parse_usize(&v) { self.limits.max_consts = n; } }
        if let Some(v) = read_env("BRUME_MAX_LOCALS") { if let Ok(n) = v.trim().parse::<u16>() { self.limits.max_locals = n; } }
        if let Some(v) = read_env("BRUME_MAX_STRLEN") { if let Some(n) = parse_usize(&v) { self.limits.max_string_len = n; } }
    }

    /// Validation de base (retourne `Err(&'static str)` si incohérence).
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.limits.max_ops == 0    { return Err("max_ops doit être > 0"); }
        if self.limits.max_consts == 0 { return Err("max_consts doit être > 0"); }
        if self.limits.max_locals == 0 { return Err("max_locals doit être > 0"); }
        Ok(())
    }
}

/* ────────────────────────── Parsing d'ENV ────────────────────────── */

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_usize(s: &str) -> Option<usize> {
    s.trim().parse::<usize>().ok()
}

/* ───────────────────────────── Tests ───────────────────────────── */
