//! main.rs — binaire brumec.
//!
//! Toute la logique vit dans la bibliothèque (`brumec::run`), ce qui la rend
//! pilotable par les tests d'intégration. `RUST_LOG=debug` active les traces.

use std::env;
use std::process;

fn main() {
    env_logger::init();
    let argv: Vec<String> = env::args().skip(1).collect();
    process::exit(brumec::run(&argv));
}
