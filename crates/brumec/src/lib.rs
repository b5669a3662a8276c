//! brumec — façade bibliothèque du compilateur batch Brume.
//!
//! [`run`] réalise une invocation complète (analyse des arguments,
//! compilation, dump) et rend le code de sortie du processus ; le binaire ne
//! fait que l'appeler. Les diagnostics partent sur stderr préfixés par
//! `brumec:`, les bannières et la confirmation `Syntax OK` sur stdout,
//! l'artefact sur le flux choisi par l'analyse.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, unused_must_use)]

pub mod args;

use std::io::Write as _;

use thiserror::Error;

use brume_core::{dump_binary, dump_c_source, CompileOptions, Compiler, DumpError};

pub use args::{parse_args, ArgsError, InputStream, OutKind, OutputStream, Parsed, RunConfig};

/// Nom du programme dans les diagnostics.
const PROG: &str = "brumec";

/// Point d'entrée complet. `argv` exclut le nom du programme.
///
/// Enchaîne : analyse (qui ouvre les flux), compilation sans exécution,
/// embranchement `-c` / C / binaire, vidage, et rend 0 ou 1. Tout échec
/// d'analyse, ouverture des fichiers comprise, affiche le diagnostic puis le
/// rappel d'usage. Les handles se referment sur tous les chemins, y compris
/// celui du symbole C invalide.
pub fn run(argv: &[String]) -> i32 {
    let parsed = match args::parse_args(argv) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{PROG}: {e}");
            usage();
            return 1;
        }
    };

    let (config, input, output) = match parsed {
        Parsed::Exit => return 0,
        Parsed::Run { config, input, output } => (config, input, output),
    };

    match execute(&config, input, output) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{PROG}: {e}");
            1
        }
    }
}

/// Erreurs de la phase d'exécution (l'analyse a déjà réussi).
#[derive(Debug, Error)]
enum RunError {
    #[error("{0}")]
    Compile(#[from] brume_core::Error),

    #[error("{0}")]
    Dump(#[from] DumpError),

    #[error("écriture de la sortie: {0}")]
    Flush(#[from] std::io::Error),
}

fn execute(
    config: &RunConfig,
    input: InputStream,
    output: Option<OutputStream>,
) -> Result<(), RunError> {
    let compiler = Compiler::from_env()?;
    let opts = CompileOptions {
        source_name: Some(config.source.display_name()),
        no_exec: true,
        dump_unit: config.verbose,
    };
    // `input` est consommé ici : le handle d'entrée se referme au retour
    let chunk = compiler.compile(input, &opts)?;

    if config.check_syntax {
        println!("Syntax OK");
        return Ok(());
    }

    // l'analyse garantit une sortie ouverte hors mode -c
    let mut output = output.expect("sortie ouverte en mode émission");
    match &config.kind {
        OutKind::CSource { symbol } => {
            dump_c_source(&chunk, config.debug_info, &mut output, symbol)?;
        }
        OutKind::RawBinary => dump_binary(&chunk, config.debug_info, &mut output)?,
    }
    output.flush()?;
    Ok(())
}

/// Rappel de syntaxe, sur stderr.
fn usage() {
    eprintln!(
        "\
Usage: {PROG} [options] programme.brm
  -c            vérifie la syntaxe seulement (aucune sortie produite)
  -o<fichier>   chemin de sortie explicite (\"-\" = sortie standard)
  -v            affiche la version et active le mode verbeux
  -g            inclut les informations de debug dans la sortie
  -B<symbole>   émet une source C définissant le tableau <symbole>
  --verbose     active le mode verbeux sans bannière
  --version     affiche la version et termine (succès)
  --copyright   affiche le copyright et termine (succès)"
    );
}

/* ------------------------------- Tests ------------------------------- */
