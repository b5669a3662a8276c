//! args.rs — Analyse des arguments de brumec et résolution des fichiers.
//!
//! Le balayage est un curseur explicite gauche→droite sur `argv` (nom du
//! programme exclu), un argument consommé par tour :
//!
//! | argument      | effet |
//! |---------------|-------|
//! | `-` seul      | entrée standard ; **fin du balayage** |
//! | `-o<chemin>`  | sortie explicite (`-o-` = stdout) ; doublon = erreur |
//! | `-B<nom>`     | sortie source C définissant `<nom>` ; vide = erreur |
//! | `-c`          | vérification de syntaxe seulement |
//! | `-v`          | verbeux ; bannière de version à la première prise d'effet |
//! | `-g`          | inclure les infos de debug |
//! | `--verbose`   | verbeux, sans bannière |
//! | `--version`   | bannière puis sortie immédiate (succès) |
//! | `--copyright` | bannière puis sortie immédiate (succès) |
//! | autre `--x`   | erreur d'usage |
//! | autre `-x…`   | ignoré |
//! | chemin nu     | le premier est le programme, ouvert sur-le-champ ; les suivants sont ignorés |
//!
//! Après balayage : entrée obligatoire ; sauf `-c`, la sortie est choisie
//! (chemin explicite, stdout, ou dérivée du nom d'entrée) puis ouverte en
//! écriture. `-c` ne résout ni n'ouvre jamais de sortie.

use std::fs::File;
use std::io::{self, Read, Stdin, Stdout, Write};
use std::path::PathBuf;

use thiserror::Error;

/// Extension par défaut du bytecode binaire.
pub const BYTECODE_EXT: &str = ".brbc";
/// Extension par défaut de la sortie source C.
pub const CSOURCE_EXT: &str = ".c";

/* ───────────────────── Nommage du fichier de sortie ───────────────────── */

/// Dérive un nom de sortie : tout ce qui suit le **dernier** `.` du nom
/// d'entrée est remplacé par `ext` (ajouté s'il n'y a pas de point). Une
/// extension vide rend le nom inchangé. Pure manipulation de chaîne, aucun
/// accès disque.
pub fn outfile_name(infile: &str, ext: &str) -> String {
    if ext.is_empty() {
        return infile.to_string();
    }
    match infile.rfind('.') {
        Some(dot) => format!("{}{ext}", &infile[..dot]),
        None => format!("{infile}{ext}"),
    }
}

/* ───────────────────────── Modèle de données ───────────────────────── */

/// Origine du programme à compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    NamedFile(PathBuf),
    StandardStream,
}

impl Source {
    /// Nom affiché dans les diagnostics et les infos de debug (`-` = stdin).
    pub fn display_name(&self) -> String {
        match self {
            Source::NamedFile(p) => p.display().to_string(),
            Source::StandardStream => "-".to_string(),
        }
    }
}

/// Destination de l'artefact produit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    NamedFile(PathBuf),
    StandardStream,
}

/// Format de l'artefact produit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutKind {
    /// Conteneur binaire brut.
    RawBinary,
    /// Source C définissant le tableau `symbol`.
    CSource { symbol: String },
}

impl OutKind {
    pub fn default_ext(&self) -> &'static str {
        match self {
            OutKind::RawBinary => BYTECODE_EXT,
            OutKind::CSource { .. } => CSOURCE_EXT,
        }
    }
}

/// Configuration d'une invocation, figée une fois l'analyse terminée.
#[derive(Debug)]
pub struct RunConfig {
    pub source: Source,
    /// `None` uniquement en mode `-c` (aucune sortie résolue).
    pub sink: Option<Sink>,
    pub kind: OutKind,
    pub check_syntax: bool,
    pub debug_info: bool,
    pub verbose: bool,
}

/// Flux d'entrée déjà ouvert par l'analyseur.
#[derive(Debug)]
pub enum InputStream {
    File(File),
    Stdin(Stdin),
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            InputStream::File(f) => f.read(buf),
            InputStream::Stdin(s) => s.read(buf),
        }
    }
}

/// Flux de sortie déjà ouvert (mode binaire).
#[derive(Debug)]
pub enum OutputStream {
    File(File),
    Stdout(Stdout),
}

impl Write for OutputStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputStream::File(f) => f.write(buf),
            OutputStream::Stdout(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputStream::File(f) => f.flush(),
            OutputStream::Stdout(s) => s.flush(),
        }
    }
}

/// Résultat de l'analyse : une exécution à mener, ou une sortie immédiate
/// (bannières `--version` / `--copyright`, déjà affichées).
#[derive(Debug)]
pub enum Parsed {
    Exit,
    Run {
        config: RunConfig,
        input: InputStream,
        output: Option<OutputStream>,
    },
}

/* ───────────────────────── Erreurs ───────────────────────── */

/// Échecs d'analyse : usage invalide ou fichier inouvrable.
#[derive(Debug, Error)]
pub enum ArgsError {
    #[error("un fichier de sortie est déjà spécifié ({0})")]
    OutputAlreadySet(String),

    #[error("nom de symbole manquant (option -B)")]
    EmptySymbol,

    #[error("option inconnue {0}")]
    UnknownOption(String),

    #[error("aucun fichier programme fourni")]
    NoInput,

    #[error("impossible d'ouvrir {path}: {source}")]
    OpenInput { path: String, source: io::Error },

    #[error("impossible d'ouvrir {path} en écriture: {source}")]
    OpenOutput { path: String, source: io::Error },
}

/* ───────────────────────── Analyse ───────────────────────── */

/// Analyse `argv` et ouvre les flux. Voir le tableau en tête de module.
pub fn parse_args(argv: &[String]) -> Result<Parsed, ArgsError> {
    let mut input: Option<(Source, InputStream)> = None;
    let mut outfile: Option<String> = None;
    let mut symbol: Option<String> = None;
    let mut check_syntax = false;
    let mut debug_info = false;
    let mut verbose = false;

    let mut i = 0;
    while i < argv.len() {
        let arg = argv[i].as_str();
        i += 1;

        let Some(switch) = arg.strip_prefix('-') else {
            // chemin nu : le premier est ouvert immédiatement, les suivants
            // sont ignorés
            if input.is_none() {
                let f = File::open(arg).map_err(|e| ArgsError::OpenInput {
                    path: arg.to_string(),
                    source: e,
                })?;
                input = Some((Source::NamedFile(PathBuf::from(arg)), InputStream::File(f)));
            }
            continue;
        };

        if switch.is_empty() {
            // `-` seul : stdin, et fin du balayage
            input = Some((Source::StandardStream, InputStream::Stdin(io::stdin())));
            break;
        }

        match switch.as_bytes()[0] {
            b'o' => {
                if let Some(first) = &outfile {
                    return Err(ArgsError::OutputAlreadySet(first.clone()));
                }
                outfile = Some(switch[1..].to_string());
            }
            b'B' => {
                let name = &switch[1..];
                if name.is_empty() {
                    return Err(ArgsError::EmptySymbol);
                }
                symbol = Some(name.to_string());
            }
            b'c' => check_syntax = true,
            b'g' => debug_info = true,
            b'v' => {
                if !verbose {
                    println!("{}", brume_core::version());
                }
                verbose = true;
            }
            b'-' => match &switch[1..] {
                "verbose" => verbose = true,
                "version" => {
                    println!("{}", brume_core::version());
                    return Ok(Parsed::Exit);
                }
                "copyright" => {
                    println!("{}", brume_core::copyright());
                    return Ok(Parsed::Exit);
                }
                _ => return Err(ArgsError::UnknownOption(arg.to_string())),
            },
            _ => {} // option courte inconnue : ignorée
        }
    }

    /* ----- résolution post-balayage ----- */

    let (source, input) = input.ok_or(ArgsError::NoInput)?;

    let kind = match symbol {
        Some(symbol) => OutKind::CSource { symbol },
        None => OutKind::RawBinary,
    };

    let (sink, output) = if check_syntax {
        (None, None)
    } else {
        let sink = resolve_sink(&source, outfile.as_deref(), &kind);
        let output = open_sink(&sink)?;
        (Some(sink), Some(output))
    };

    let config = RunConfig { source, sink, kind, check_syntax, debug_info, verbose };
    log::debug!("config: {config:?}");
    Ok(Parsed::Run { config, input, output })
}

/// Choix du réceptacle : `-o-` et « stdin sans `-o` » vont sur stdout, un
/// `-o` explicite est pris tel quel, sinon le nom est dérivé de l'entrée
/// avec l'extension du format.
fn resolve_sink(source: &Source, outfile: Option<&str>, kind: &OutKind) -> Sink {
    match outfile {
        Some("-") => Sink::StandardStream,
        Some(path) => Sink::NamedFile(PathBuf::from(path)),
        None => match source {
            Source::StandardStream => Sink::StandardStream,
            Source::NamedFile(p) => Sink::NamedFile(PathBuf::from(outfile_name(
                &p.to_string_lossy(),
                kind.default_ext(),
            ))),
        },
    }
}

fn open_sink(sink: &Sink) -> Result<OutputStream, ArgsError> {
    match sink {
        Sink::NamedFile(path) => {
            let f = File::create(path).map_err(|e| ArgsError::OpenOutput {
                path: path.display().to_string(),
                source: e,
            })?;
            Ok(OutputStream::File(f))
        }
        Sink::StandardStream => Ok(OutputStream::Stdout(io::stdout())),
    }
}

/* ───────────────────────── Tests ───────────────────────── */
