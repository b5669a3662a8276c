//! eval.rs — Évaluateur de bytecode Brume.
//!
//! Mini machine à pile exécutant un `Chunk`, utilisée par le service de
//! compilation quand l'exécution n'est pas supprimée, et par les tests.
//!
//! Sémantique (stricte) :
//!   - Arith : entier ⊕ entier reste entier (division tronquée), promotion en
//!     flottant dès qu'un opérande est flottant ; `+` concatène deux chaînes
//!   - Débordement entier, division et modulo entiers par zéro : erreurs
//!     (les flottants suivent IEEE 754, `1.0 / 0.0` donne `inf`)
//!   - Comparaisons `< <= > >=` : nombres uniquement
//!   - `==`/`!=` : même type exigé pour être égaux, sinon `false`
//!   - `!` et les conditions (`jz`) : booléens uniquement
//!   - Garde-fou `max_steps` contre les boucles infinies
//!
//! API :
//!   - `eval_chunk(&Chunk, EvalOptions) -> Result<EvalOutput>`
//!   - `EvalOptions { capture_stdout, max_steps }`
//!   - `EvalOutput { stdout, steps }`

use std::fmt;

use anyhow::{anyhow, bail, Result};

use crate::bytecode::{Chunk, ConstValue, Op};

#[derive(Debug, Clone)]
pub struct EvalOptions {
    /// Capture `print` dans un buffer ; sinon, écrit sur le stdout réel.
    pub capture_stdout: bool,
    /// Limite d'instructions exécutées (boucles infinies).
    pub max_steps: Option<usize>,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self { capture_stdout: true, max_steps: Some(1_000_000) }
    }
}

#[derive(Debug, Default)]
pub struct EvalOutput {
    pub stdout: String,
    pub steps: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "booléen",
            Value::I64(_) => "entier",
            Value::F64(_) => "flottant",
            Value::Str(_) => "chaîne",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::I64(i) => write!(f, "{i}"),
            Value::F64(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Exécute un `Chunk` compilé. Le chunk est supposé passé par
/// `Chunk::validate` (indices de constantes/slots dans les bornes).
pub fn eval_chunk(chunk: &Chunk, opts: EvalOptions) -> Result<EvalOutput> {
    let mut ev = Evaluator::new(chunk, opts);
    ev.run(chunk)?;
    Ok(EvalOutput { stdout: ev.stdout, steps: ev.steps })
}

struct Evaluator {
    stack: Vec<Value>,
    locals: Vec<Value>,
    stdout: String,
    steps: usize,
    opts: EvalOptions,
}

impl Evaluator {
    fn new(chunk: &Chunk, opts: EvalOptions) -> Self {
        Self {
            stack: Vec::with_capacity(64),
            locals: vec![Value::Null; chunk.local_slots as usize],
            stdout: String::new(),
            steps: 0,
            opts,
        }
    }

    fn run(&mut self, chunk: &Chunk) -> Result<()> {
        let ops = &chunk.ops;
        let mut pc: isize = 0;

        while (pc as usize) < ops.len() {
            // garde-fou anti-boucle
            self.steps += 1;
            if let Some(limit) = self.opts.max_steps {
                if self.steps > limit {
                    bail!("limite d'instructions atteinte ({limit})");
                }
            }

            let op = ops[pc as usize];
            pc += 1;

            use Op::*;
            match op {
                // ---- Structure
                Nop => {}
                Return => break,

                // ---- Constantes & littéraux
                LoadTrue => self.push(Value::Bool(true)),
                LoadFalse => self.push(Value::Bool(false)),
                LoadNull => self.push(Value::Null),
                LoadConst(ix) => {
                    let c = chunk
                        .const_at(ix)
                        .ok_or_else(|| anyhow!("const index invalide {ix}"))?;
                    self.push(match c {
                        ConstValue::Null => Value::Null,
                        ConstValue::Bool(b) => Value::Bool(*b),
                        ConstValue::I64(i) => Value::I64(*i),
                        ConstValue::F64(x) => Value::F64(*x),
                        ConstValue::Str(s) => Value::Str(s.clone()),
                    });
                }

                // ---- Locals
                LoadLocal(ix) => {
                    let v = self
                        .locals
                        .get(ix as usize)
                        .cloned()
                        .ok_or_else(|| anyhow!("slot local invalide {ix}"))?;
                    self.push(v);
                }
                StoreLocal(ix) => {
                    let v = self.pop()?;
                    let slot = self
                        .locals
                        .get_mut(ix as usize)
                        .ok_or_else(|| anyhow!("slot local invalide {ix}"))?;
                    *slot = v;
                }

                // ---- Pile
                Pop => {
                    let _ = self.pop()?;
                }

                // ---- Arith
                Add | Sub | Mul | Div | Mod => self.bin_arith(op)?,
                Neg => {
                    let v = self.pop()?;
                    match v {
                        Value::I64(i) => {
                            let r = i.checked_neg().ok_or_else(|| anyhow!("débordement entier"))?;
                            self.push(Value::I64(r));
                        }
                        Value::F64(x) => self.push(Value::F64(-x)),
                        v => bail!("'-' unaire attend un nombre, pas un {}", v.type_name()),
                    }
                }
                Not => {
                    let v = self.pop()?;
                    match v {
                        Value::Bool(b) => self.push(Value::Bool(!b)),
                        v => bail!("'!' attend un booléen, pas un {}", v.type_name()),
                    }
                }

                // ---- Comparaisons
                Eq => self.cmp_eq()?,
                Ne => {
                    self.cmp_eq()?;
                    self.flip_bool()?;
                }
                Lt => self.bin_cmp("<", |a, b| a < b)?,
                Le => self.bin_cmp("<=", |a, b| a <= b)?,
                Gt => self.bin_cmp(">", |a, b| a > b)?,
                Ge => self.bin_cmp(">=", |a, b| a >= b)?,

                // ---- Contrôle
                Jump(off) => {
                    pc += off as isize;
                }
                JumpIfFalse(off) => {
                    let cond = self.pop()?;
                    match cond {
                        Value::Bool(true) => {}
                        Value::Bool(false) => pc += off as isize,
                        v => bail!("condition non booléenne ({})", v.type_name()),
                    }
                }

                // ---- I/O
                Print => {
                    let v = self.pop()?;
                    if self.opts.capture_stdout {
                        use std::fmt::Write;
                        let _ = writeln!(&mut self.stdout, "{v}");
                    } else {
                        println!("{v}");
                    }
                }
            }
        }

        Ok(())
    }

    // ---------- Helpers de pile ----------

    fn push(&mut self, v: Value) {
        self.stack.push(v)
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or_else(|| anyhow!("pile vide"))
    }

    fn bin_arith(&mut self, op: Op) -> Result<()> {
        use Value::*;
        let b = self.pop()?;
        let a = self.pop()?;
        let v = match (a, b) {
            (I64(x), I64(y)) => int_arith(op, x, y)?,
            (F64(x), F64(y)) => F64(float_arith(op, x, y)),
            (I64(x), F64(y)) => F64(float_arith(op, x as f64, y)),
            (F64(x), I64(y)) => F64(float_arith(op, x, y as f64)),
            (Str(x), Str(y)) if op == Op::Add => Str(x + &y),
            (a, b) => bail!(
                "types incompatibles pour '{}': {} et {}",
                op.mnemonic(),
                a.type_name(),
                b.type_name()
            ),
        };
        self.push(v);
        Ok(())
    }

    fn bin_cmp(&mut self, sym: &str, f: impl FnOnce(f64, f64) -> bool) -> Result<()> {
        use Value::*;
        let b = self.pop()?;
        let a = self.pop()?;
        let (x, y) = match (&a, &b) {
            (I64(x), I64(y)) => (*x as f64, *y as f64),
            (F64(x), F64(y)) => (*x, *y),
            (I64(x), F64(y)) => (*x as f64, *y),
            (F64(x), I64(y)) => (*x, *y as f64),
            _ => bail!(
                "'{sym}' compare des nombres, pas {} et {}",
                a.type_name(),
                b.type_name()
            ),
        };
        self.push(Bool(f(x, y)));
        Ok(())
    }

    fn cmp_eq(&mut self) -> Result<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        let r = match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::I64(x), Value::I64(y)) => x == y,
            (Value::F64(x), Value::F64(y)) => x == y,
            (Value::Str(x), Value::Str(y)) => x == y,
            _ => false, // types différents : jamais égaux
        };
        self.push(Value::Bool(r));
        Ok(())
    }

    fn flip_bool(&mut self) -> Result<()> {
        let v = self.pop()?;
        match v {
            Value::Bool(b) => self.push(Value::Bool(!b)),
            v => bail!("booléen attendu, pas un {}", v.type_name()),
        }
        Ok(())
    }
}

fn int_arith(op: Op, x: i64, y: i64) -> Result<Value> {
    let r = match op {
        Op::Add => x.checked_add(y),
        Op::Sub => x.checked_sub(y),
        Op::Mul => x.checked_mul(y),
        Op::Div => {
            if y == 0 {
                bail!("division entière par zéro");
            }
            x.checked_div(y)
        }
        Op::Mod => {
            if y == 0 {
                bail!("modulo par zéro");
            }
            x.checked_rem(y)
        }
        _ => unreachable!("bin_arith ne passe que des binaires"),
    };
    r.map(Value::I64).ok_or_else(|| anyhow!("débordement entier"))
}

fn float_arith(op: Op, x: f64, y: f64) -> f64 {
    match op {
        Op::Add => x + y,
        Op::Sub => x - y,
        Op::Mul => x * y,
        Op::Div => x / y,
        Op::Mod => x % y,
        _ => unreachable!("bin_arith ne passe que des binaires"),
    }
}

/* ───────────────────────── Tests ───────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{CompileOptions, Compiler};

    fn run_src(src: &str) -> EvalOutput {
        let opts = CompileOptions { no_exec: true, ..CompileOptions::default() };
        let chunk = Compiler::default().compile_str(src, &opts).expect("compile ok");
        eval_chunk(&chunk, EvalOptions::default()).expect("eval ok")
    }

    fn run_err(src: &str) -> String {
        let opts = CompileOptions { no_exec: true, ..CompileOptions::default() };
        let chunk = Compiler::default().compile_str(src, &opts).expect("compile ok");
        format!("{:#}", eval_chunk(&chunk, EvalOptions::default()).unwrap_err())
    }

    #[test]
    fn arithmetic_and_locals() {
        let out = run_src("let a = 2; let b = 3; print a * b + 1;");
        assert_eq!(out.stdout, "7\n");
    }

    #[test]
    fn integers_stay_integers() {
        assert_eq!(run_src("print 7 / 2;").stdout, "3\n");
        assert_eq!(run_src("print 7 % 2;").stdout, "1\n");
        assert_eq!(run_src("print 7.0 / 2;").stdout, "3.5\n");
        assert_eq!(run_src("print -7 / 2;").stdout, "-3\n");
    }

    #[test]
    fn strings_concatenate() {
        assert_eq!(run_src(r#"print "bru" + "me";"#).stdout, "brume\n");
    }

    #[test]
    fn loops_accumulate() {
        let src = "let i = 0; let s = 0; while i < 5 { s = s + i; i = i + 1; } print s;";
        let out = run_src(src);
        assert_eq!(out.stdout, "10\n");
        assert!(out.steps > 20, "steps = {}", out.steps);
    }

    #[test]
    fn logic_short_circuits_to_bools() {
        let out = run_src("print false && true; print true && true; print false || true;");
        assert_eq!(out.stdout, "false\ntrue\ntrue\n");
    }

    #[test]
    fn conditionals_pick_a_branch() {
        let src = r#"
            let n = 3;
            if n > 2 { print "grand"; } else { print "petit"; }
            if n == 0 { print "zéro"; }
        "#;
        assert_eq!(run_src(src).stdout, "grand\n");
    }

    #[test]
    fn null_and_equality() {
        assert_eq!(run_src("print null;").stdout, "null\n");
        assert_eq!(run_src("print null == null;").stdout, "true\n");
        assert_eq!(run_src("print 1 == 1.0;").stdout, "false\n");
        assert_eq!(run_src("print 1 != 2;").stdout, "true\n");
    }

    #[test]
    fn zero_division_is_an_error() {
        assert!(run_err("print 1 / 0;").contains("zéro"));
        assert!(run_err("print 1 % 0;").contains("zéro"));
        // en flottant, IEEE s'applique
        assert_eq!(run_src("print 1.0 / 0.0;").stdout, "inf\n");
    }

    #[test]
    fn overflow_is_an_error() {
        assert!(run_err("print 9223372036854775807 + 1;").contains("débordement"));
    }

    #[test]
    fn type_errors_are_reported() {
        assert!(run_err("print 1 + true;").contains("incompatibles"));
        assert!(run_err("if 1 { print 1; }").contains("booléenne"));
        assert!(run_err("print !3;").contains("booléen"));
        assert!(run_err(r#"print "a" < "b";"#).contains("nombres"));
    }

    #[test]
    fn step_limit_stops_infinite_loops() {
        let opts = CompileOptions { no_exec: true, ..CompileOptions::default() };
        let chunk = Compiler::default()
            .compile_str("while true { }", &opts)
            .expect("compile ok");
        let err = eval_chunk(&chunk, EvalOptions { capture_stdout: true, max_steps: Some(100) })
            .unwrap_err();
        assert!(format!("{err:#}").contains("limite"));
    }
}
