//! codegen.rs — Génération de bytecode : AST -> `Chunk`.
//!
//! - Allocation de slots pour les `let` (portées lexicales, shadowing permis,
//!   les slots ne sont pas recyclés : `local_slots` = total déclaré)
//! - Sauts relatifs patchés après coup (`if`/`while`/`&&`/`||`)
//! - Table de lignes alimentée instruction par instruction
//! - Noms de locals enregistrés dans `DebugInfo` (retirés au strip)
//! - Limites (`Limits`) appliquées pendant l'émission

use std::fmt;

use crate::bytecode::{Chunk, ChunkFlags, ConstValue, LocalIx, Op};
use crate::compile::parser::{BinOp, Expr, Stmt, UnOp};
use crate::config::Limits;

/* ───────────────────────── Erreur ───────────────────────── */

#[derive(Debug, Clone)]
pub struct CodegenError {
    pub line: u32,
    pub msg: String,
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ligne {})", self.msg, self.line)
    }
}
impl std::error::Error for CodegenError {}

/// Compile un programme complet en chunk exécutable.
pub fn compile_program(stmts: &[Stmt], limits: &Limits) -> Result<Chunk, CodegenError> {
    let mut e = Emitter {
        chunk: Chunk::new(ChunkFlags::default()),
        scopes: vec![Vec::new()],
        next_slot: 0,
        limits,
    };
    for s in stmts {
        e.stmt(s)?;
    }
    e.chunk.push_op(Op::Return, None);
    e.chunk.local_slots = e.next_slot;
    log::debug!(
        "codegen: {} ops, {} consts, {} slots",
        e.chunk.ops.len(),
        e.chunk.consts.len(),
        e.next_slot
    );
    Ok(e.chunk)
}

/* ───────────────────────── Émetteur ───────────────────────── */

struct Emitter<'a> {
    chunk: Chunk,
    /// Pile de portées : (nom, slot), la plus interne en dernier.
    scopes: Vec<Vec<(String, LocalIx)>>,
    next_slot: LocalIx,
    limits: &'a Limits,
}

impl Emitter<'_> {
    /* ----- instructions ----- */

    fn stmt(&mut self, s: &Stmt) -> Result<(), CodegenError> {
        match s {
            Stmt::Let { name, value, line } => {
                // la valeur est évaluée AVANT la déclaration :
                // `let x = x;` réfère au x extérieur (ou échoue)
                self.expr(value, *line)?;
                let slot = self.declare(name, *line)?;
                self.emit(Op::StoreLocal(slot), *line)?;
            }
            Stmt::Assign { name, value, line } => {
                self.expr(value, *line)?;
                let slot = self.lookup(name).ok_or_else(|| {
                    err(*line, format!("variable inconnue: {name}"))
                })?;
                self.emit(Op::StoreLocal(slot), *line)?;
            }
            Stmt::Print { value, line } => {
                self.expr(value, *line)?;
                self.emit(Op::Print, *line)?;
            }
            Stmt::Expr { value, line } => {
                self.expr(value, *line)?;
                self.emit(Op::Pop, *line)?;
            }
            Stmt::Block { body, .. } => {
                self.scoped(body)?;
            }
            Stmt::If { cond, then_body, else_body, line } => {
                self.expr(cond, *line)?;
                let jz = self.emit(Op::JumpIfFalse(0), *line)?;
                self.scoped(then_body)?;
                match else_body {
                    Some(else_body) => {
                        let jmp = self.emit(Op::Jump(0), *line)?;
                        self.patch_to_here(jz);
                        self.scoped(else_body)?;
                        self.patch_to_here(jmp);
                    }
                    None => self.patch_to_here(jz),
                }
            }
            Stmt::While { cond, body, line } => {
                let top = self.chunk.ops.len() as u32;
                self.expr(cond, *line)?;
                let jz = self.emit(Op::JumpIfFalse(0), *line)?;
                self.scoped(body)?;
                self.jump_back(top, *line)?;
                self.patch_to_here(jz);
            }
        }
        Ok(())
    }

    fn scoped(&mut self, body: &[Stmt]) -> Result<(), CodegenError> {
        self.scopes.push(Vec::new());
        let r = body.iter().try_for_each(|s| self.stmt(s));
        self.scopes.pop();
        r
    }

    /* ----- expressions ----- */

    fn expr(&mut self, e: &Expr, line: u32) -> Result<(), CodegenError> {
        match e {
            Expr::Null => {
                self.emit(Op::LoadNull, line)?;
            }
            Expr::Bool(true) => {
                self.emit(Op::LoadTrue, line)?;
            }
            Expr::Bool(false) => {
                self.emit(Op::LoadFalse, line)?;
            }
            Expr::Int(v) => {
                let k = self.konst(ConstValue::I64(*v), line)?;
                self.emit(Op::LoadConst(k), line)?;
            }
            Expr::Float(v) => {
                let k = self.konst(ConstValue::F64(*v), line)?;
                self.emit(Op::LoadConst(k), line)?;
            }
            Expr::Str(s) => {
                if s.len() > self.limits.max_string_len {
                    return Err(err(
                        line,
                        format!("chaîne trop longue ({} octets)", s.len()),
                    ));
                }
                let k = self.konst(ConstValue::Str(s.clone()), line)?;
                self.emit(Op::LoadConst(k), line)?;
            }
            Expr::Var { name, line: vline } => {
                let slot = self
                    .lookup(name)
                    .ok_or_else(|| err(*vline, format!("variable inconnue: {name}")))?;
                self.emit(Op::LoadLocal(slot), line)?;
            }
            Expr::Unary { op, rhs } => {
                self.expr(rhs, line)?;
                let op = match op {
                    UnOp::Neg => Op::Neg,
                    UnOp::Not => Op::Not,
                };
                self.emit(op, line)?;
            }
            Expr::Binary { op: BinOp::And, lhs, rhs } => {
                // a && b : si a est faux, le résultat est false sans évaluer b
                self.expr(lhs, line)?;
                let jz = self.emit(Op::JumpIfFalse(0), line)?;
                self.expr(rhs, line)?;
                let jmp = self.emit(Op::Jump(0), line)?;
                self.patch_to_here(jz);
                self.emit(Op::LoadFalse, line)?;
                self.patch_to_here(jmp);
            }
            Expr::Binary { op: BinOp::Or, lhs, rhs } => {
                // a || b : si a est vrai, le résultat est true sans évaluer b
                self.expr(lhs, line)?;
                let jz = self.emit(Op::JumpIfFalse(0), line)?;
                self.emit(Op::LoadTrue, line)?;
                let jmp = self.emit(Op::Jump(0), line)?;
                self.patch_to_here(jz);
                self.expr(rhs, line)?;
                self.patch_to_here(jmp);
            }
            Expr::Binary { op, lhs, rhs } => {
                self.expr(lhs, line)?;
                self.expr(rhs, line)?;
                let op = match op {
                    BinOp::Add => Op::Add,
                    BinOp::Sub => Op::Sub,
                    BinOp::Mul => Op::Mul,
                    BinOp::Div => Op::Div,
                    BinOp::Mod => Op::Mod,
                    BinOp::Eq => Op::Eq,
                    BinOp::Ne => Op::Ne,
                    BinOp::Lt => Op::Lt,
                    BinOp::Le => Op::Le,
                    BinOp::Gt => Op::Gt,
                    BinOp::Ge => Op::Ge,
                    BinOp::And | BinOp::Or => unreachable!("traités au-dessus"),
                };
                self.emit(op, line)?;
            }
        }
        Ok(())
    }

    /* ----- slots & portées ----- */

    fn declare(&mut self, name: &str, line: u32) -> Result<LocalIx, CodegenError> {
        if self.next_slot >= self.limits.max_locals {
            return Err(err(
                line,
                format!("trop de variables locales (max {})", self.limits.max_locals),
            ));
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        if let Some(scope) = self.scopes.last_mut() {
            scope.push((name.to_string(), slot));
        }
        self.chunk.debug.locals.push((name.to_string(), slot));
        Ok(slot)
    }

    fn lookup(&self, name: &str) -> Option<LocalIx> {
        for scope in self.scopes.iter().rev() {
            for (n, slot) in scope.iter().rev() {
                if n == name {
                    return Some(*slot);
                }
            }
        }
        None
    }

    /* ----- émission & patch ----- */

    fn emit(&mut self, op: Op, line: u32) -> Result<u32, CodegenError> {
        if self.chunk.ops.len() >= self.limits.max_ops {
            return Err(err(
                line,
                format!("programme trop long (max {} instructions)", self.limits.max_ops),
            ));
        }
        Ok(self.chunk.push_op(op, Some(line)))
    }

    fn konst(&mut self, v: ConstValue, line: u32) -> Result<u32, CodegenError> {
        let ix = self.chunk.add_const(v);
        if self.chunk.consts.len() > self.limits.max_consts {
            return Err(err(
                line,
                format!("trop de constantes (max {})", self.limits.max_consts),
            ));
        }
        Ok(ix)
    }

    /// Réécrit l'offset du saut émis en `at` pour pointer juste après la
    /// dernière instruction émise.
    fn patch_to_here(&mut self, at: u32) {
        let here = self.chunk.ops.len() as i64;
        let off = here - (at as i64 + 1);
        if let Op::Jump(slot) | Op::JumpIfFalse(slot) = &mut self.chunk.ops[at as usize] {
            *slot = off as i32;
        }
    }

    fn jump_back(&mut self, to: u32, line: u32) -> Result<(), CodegenError> {
        let at = self.chunk.ops.len() as i64;
        let off = to as i64 - (at + 1);
        self.emit(Op::Jump(off as i32), line)?;
        Ok(())
    }
}

fn err(line: u32, msg: String) -> CodegenError {
    CodegenError { line, msg }
}

/* ───────────────────────── Tests ───────────────────────── */
