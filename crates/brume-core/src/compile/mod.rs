//! compile — Pipeline de compilation : source -> tokens -> AST -> `Chunk`.
//!
//! Le point d'entrée est [`Compiler`], construit sur une [`Config`] : il
//! enchaîne lexer, parseur et générateur de code, valide le chunk produit,
//! et (sauf `no_exec`) l'exécute dans la foulée.

pub mod codegen;
pub mod lexer;
pub mod parser;

pub use codegen::{compile_program, CodegenError};
pub use lexer::{tokenize, LexError, Token, TokenKind};
pub use parser::{parse_program, ParseError, Stmt};

use std::io::Read;

use crate::bytecode::Chunk;
use crate::config::Config;
use crate::eval::{eval_chunk, EvalOptions};
use crate::{Error, Result};

/* ───────────────────────── Options ───────────────────────── */

/// Options d'une compilation unitaire.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Nom à afficher dans les dumps et à conserver dans les infos de debug
    /// (`"-"` pour l'entrée standard).
    pub source_name: Option<String>,
    /// Ne pas exécuter l'unité après compilation.
    pub no_exec: bool,
    /// Désassembler l'unité sur stderr une fois la compilation terminée.
    pub dump_unit: bool,
}

/* ───────────────────────── Service ───────────────────────── */

/// Le service de compilation. Un `Compiler` est bon marché à cloner et
/// réutilisable ; la config est figée à la construction.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    cfg: Config,
}

impl Compiler {
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    /// Construit le service depuis l'environnement (`BRUME_*`), en validant
    /// les limites obtenues.
    pub fn from_env() -> Result<Self> {
        let cfg = Config::from_env();
        cfg.validate().map_err(Error::Config)?;
        Ok(Self::new(cfg))
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Compile tout le contenu d'un lecteur (fichier, stdin, buffer de test).
    pub fn compile<R: Read>(&self, mut reader: R, opts: &CompileOptions) -> Result<Chunk> {
        let mut src = String::new();
        reader.read_to_string(&mut src)?;
        self.compile_str(&src, opts)
    }

    /// Compile une source déjà en mémoire.
    pub fn compile_str(&self, src: &str, opts: &CompileOptions) -> Result<Chunk> {
        let name = opts.source_name.as_deref().unwrap_or("<source>");
        log::debug!("compile: {name} ({} octets)", src.len());

        let toks = tokenize(src)?;
        let ast = parse_program(&toks)?;
        let mut chunk = compile_program(&ast, &self.cfg.limits)?;
        chunk.debug.main_file = opts.source_name.clone();
        chunk.validate().map_err(Error::Invalid)?;

        if opts.dump_unit {
            eprint!("{}", chunk.disassemble(name));
        }
        if !opts.no_exec {
            let out = eval_chunk(&chunk, EvalOptions { capture_stdout: false, ..EvalOptions::default() })
                .map_err(|e| Error::Eval(format!("{e:#}")))?;
            log::debug!("exécution: {} pas", out.steps);
        }
        Ok(chunk)
    }
}

/* ───────────────────────── Tests ───────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Op;

    fn check_only() -> CompileOptions {
        CompileOptions { no_exec: true, ..CompileOptions::default() }
    }

    #[test]
    fn full_pipeline_produces_a_valid_chunk() {
        let c = Compiler::default()
            .compile_str("let x = 2;\nprint x * 3;", &check_only())
            .expect("compile ok");
        assert_eq!(c.ops.last(), Some(&Op::Return));
        assert!(c.validate().is_ok());
        assert_eq!(c.local_slots, 1);
    }

    #[test]
    fn reader_input_works_like_str_input() {
        let src = "print 1 + 2;";
        let a = Compiler::default().compile_str(src, &check_only()).unwrap();
        let b = Compiler::default()
            .compile(src.as_bytes(), &check_only())
            .unwrap();
        assert_eq!(a.ops, b.ops);
    }

    #[test]
    fn source_name_lands_in_debug_info() {
        let opts = CompileOptions {
            source_name: Some("demo.brm".to_string()),
            no_exec: true,
            dump_unit: false,
        };
        let c = Compiler::default().compile_str("print 1;", &opts).unwrap();
        assert_eq!(c.debug.main_file.as_deref(), Some("demo.brm"));
    }

    #[test]
    fn lex_and_parse_errors_surface_typed() {
        let e = Compiler::default()
            .compile_str("let a = \"oops", &check_only())
            .unwrap_err();
        assert!(matches!(e, Error::Lex(_)), "{e}");

        let e = Compiler::default()
            .compile_str("let = 3;", &check_only())
            .unwrap_err();
        assert!(matches!(e, Error::Parse(_)), "{e}");
    }

    #[test]
    fn execution_errors_surface_when_not_suppressed() {
        // no_exec absent : le service exécute, et la division par zéro
        // remonte en Error::Eval avant toute écriture sur stdout
        let e = Compiler::default()
            .compile_str("print 1 / 0;", &CompileOptions::default())
            .unwrap_err();
        assert!(matches!(e, Error::Eval(_)), "{e}");
    }
}
