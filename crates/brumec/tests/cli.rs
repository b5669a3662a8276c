// tests/cli.rs — parcours complets de brumec, pilotés par la façade `run`
// (et par le binaire quand l'assertion porte sur les flux réels).

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use brume_core::eval::{eval_chunk, EvalOptions};
use brume_core::Chunk;

fn run(args: &[&str]) -> i32 {
    brumec::run(&args.iter().map(|s| s.to_string()).collect::<Vec<_>>())
}

fn run_bin(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_brumec"))
        .args(args)
        .output()
        .expect("lancement du binaire")
}

fn write_src(dir: &Path, name: &str, body: &str) -> String {
    let p = dir.join(name);
    fs::write(&p, body).unwrap();
    p.display().to_string()
}

#[test]
fn compiles_to_a_loadable_stripped_container() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "calc.brm", "let a = 5;\nprint a + 3;\n");

    assert_eq!(run(&[&src]), 0);

    let out = dir.path().join("calc.brbc");
    let bytes = fs::read(&out).unwrap();
    let chunk = Chunk::from_bytes(&bytes).unwrap();
    // sans -g, l'artefact est strippé
    assert!(chunk.flags().stripped);
    assert!(chunk.debug.is_empty());
    assert!(chunk.lines.is_empty());

    // et il s'exécute
    let ev = eval_chunk(&chunk, EvalOptions::default()).unwrap();
    assert_eq!(ev.stdout, "8\n");
}

#[test]
fn debug_flag_keeps_line_and_symbol_info() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "calc.brm", "let a = 5;\nprint a;\n");

    assert_eq!(run(&["-g", &src]), 0);

    let bytes = fs::read(dir.path().join("calc.brbc")).unwrap();
    let chunk = Chunk::from_bytes(&bytes).unwrap();
    assert!(!chunk.flags().stripped);
    assert_eq!(chunk.debug.main_file.as_deref(), Some(src.as_str()));
    assert_eq!(chunk.lines.line_for_pc(0), Some(1));
    assert_eq!(chunk.debug.locals, vec![("a".to_string(), 0)]);
}

#[test]
fn check_syntax_produces_no_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "ok.brm", "print 1;\n");

    assert_eq!(run(&["-c", &src]), 0);
    assert!(!dir.path().join("ok.brbc").exists());

    // -c gagne même face à -B et -o
    let out = dir.path().join("jamais.bin");
    assert_eq!(run(&["-c", &format!("-o{}", out.display()), "-Bsym", &src]), 0);
    assert!(!out.exists());
}

#[test]
fn check_syntax_confirms_on_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "ok.brm", "print 1;\n");

    let out = run_bin(&["-c", &src]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&out.stdout), "Syntax OK\n");
}

#[test]
fn c_source_output_defines_the_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "mod.brm", "print 42;\n");

    assert_eq!(run(&["-Bbrume_mod", &src]), 0);

    let text = fs::read_to_string(dir.path().join("mod.c")).unwrap();
    assert!(text.contains("#include <stdint.h>"));
    assert!(text.contains("const uint8_t brume_mod[] = {"));
    assert!(text.contains("const uint32_t brume_mod_len = "));
}

#[test]
fn invalid_symbol_fails_after_opening_the_output() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "mod.brm", "print 42;\n");

    assert_eq!(run(&["-B1bad", &src]), 1);

    // la sortie a été ouverte à l'analyse, mais rien n'y a été écrit ;
    // le fichier partiel reste en place (comportement assumé)
    let out = dir.path().join("mod.c");
    assert!(out.exists());
    assert_eq!(fs::read(&out).unwrap().len(), 0);
}

#[test]
fn duplicate_output_fails_before_opening_anything() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "p.brm", "print 1;\n");
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");

    let code = run(&[
        &format!("-o{}", a.display()),
        &format!("-o{}", b.display()),
        &src,
    ]);
    assert_eq!(code, 1);
    assert!(!a.exists());
    assert!(!b.exists());
}

#[test]
fn compile_errors_exit_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "mauvais.brm", "let = ;\n");
    assert_eq!(run(&[&src]), 1);
}

#[test]
fn missing_input_file_exits_nonzero() {
    assert_eq!(run(&["nulle/part/fantome.brm"]), 1);
    assert_eq!(run(&["--frobnicate"]), 1);
}

#[test]
fn open_errors_show_the_usage_reminder() {
    // entrée inouvrable
    let out = run_bin(&["nulle/part/fantome.brm"]);
    assert_eq!(out.status.code(), Some(1));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("fantome.brm"), "{err}");
    assert!(err.contains("Usage:"), "{err}");

    // sortie inouvrable (répertoire absent)
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "p.brm", "print 1;\n");
    let sink = dir.path().join("absent").join("p.brbc");
    let out = run_bin(&[&format!("-o{}", sink.display()), &src]);
    assert_eq!(out.status.code(), Some(1));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("en écriture"), "{err}");
    assert!(err.contains("Usage:"), "{err}");
}

#[test]
fn verbose_run_still_produces_the_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "v.brm", "print 1;\n");

    assert_eq!(run(&["-v", &src]), 0);
    assert!(dir.path().join("v.brbc").exists());
}

#[test]
fn output_is_byte_identical_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(
        dir.path(),
        "idem.brm",
        "let x = 1;\nwhile x < 10 { x = x * 2; }\nprint x;\n",
    );
    let out = dir.path().join("idem.brbc");

    assert_eq!(run(&[&src]), 0);
    let first = fs::read(&out).unwrap();
    assert_eq!(run(&[&src]), 0);
    let second = fs::read(&out).unwrap();
    assert_eq!(first, second, "deux compilations identiques, deux artefacts identiques");

    // idem pour la forme C
    assert_eq!(run(&["-Bidem", &src]), 0);
    let c1 = fs::read(dir.path().join("idem.c")).unwrap();
    assert_eq!(run(&["-Bidem", &src]), 0);
    let c2 = fs::read(dir.path().join("idem.c")).unwrap();
    assert_eq!(c1, c2);
}

#[test]
fn explicit_output_path_is_respected() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_src(dir.path(), "p.brm", "print 1;\n");
    let out = dir.path().join("artefact.donnees");

    assert_eq!(run(&[&format!("-o{}", out.display()), &src]), 0);
    let chunk = Chunk::from_bytes(&fs::read(&out).unwrap()).unwrap();
    assert!(chunk.validate().is_ok());
    // le nom dérivé n'a pas été utilisé
    assert!(!dir.path().join("p.brbc").exists());
}
