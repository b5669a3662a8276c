//! op.rs — Jeu d'instructions de la machine à pile Brume.
//!
//! Objectifs :
//! - **Lisible** (mnémoniques courts, `Display` propre)
//! - **Stable** : l'encodage bincode des enums dépend **de l'ordre** des
//!   variantes. Pour ajouter un opcode, **ajoute-le en bas** et incrémente
//!   `CHUNK_VERSION` dans `chunk.rs` si la sémantique change.
//! - **Pratique** : helpers `mnemonic()`, `stack_delta()`, `is_jump()`,
//!   `jump_target(pc)`, `is_terminator()`.
//!
//! Convention de pile :
//! - les `Load*` poussent une valeur (+1)
//! - `StoreLocal`/`Pop`/`Print` consomment une valeur (−1)
//! - les binaires (Add..Ge) consomment 2, poussent 1 (−1)
//! - les unaires (Neg/Not) consomment 1, poussent 1 (0)
//! - `JumpIfFalse` **consomme** la condition (−1) ; `Jump` ne touche pas la pile
//! - les sauts sont relatifs à l'instruction suivante : `dest = pc + 1 + off`

use serde::{Deserialize, Serialize};

/// Index dans le pool de constantes d'un chunk.
pub type ConstIx = u32;
/// Index de slot local (variables `let` du script).
pub type LocalIx = u16;
/// Offset de saut relatif (peut être négatif pour les boucles).
pub type RelOff = i32;

/// Jeu d'instructions du bytecode Brume.
///
/// **Compat bincode : ne pas réordonner. Ajouter les nouvelles variantes en bas.**
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    // ----- Structure -----
    Nop,                        // no-op
    Return,                     // termine l'exécution du chunk

    // ----- Constantes & littéraux -----
    LoadConst(ConstIx),         // push const[idx]
    LoadTrue,                   // push true
    LoadFalse,                  // push false
    LoadNull,                   // push null

    // ----- Locals -----
    LoadLocal(LocalIx),         // push locals[idx]
    StoreLocal(LocalIx),        // pop  -> locals[idx]

    // ----- Arith / logique -----
    Add, Sub, Mul, Div, Mod,    // binaires            delta = -1
    Neg,                        // unaire (num)        delta =  0
    Not,                        // unaire (bool)       delta =  0

    // Comparaisons → bool
    Eq, Ne, Lt, Le, Gt, Ge,     // binaires            delta = -1

    // ----- Contrôle -----
    Jump(RelOff),               // pc = pc + 1 + off
    JumpIfFalse(RelOff),        // pop cond ; si false, saute
    Pop,                        // drop top

    // ----- I/O -----
    Print,                      // pop et affiche (instruction `print`)

    // ----- (Extensions futures — AJOUTER EN BAS) -----
}

impl Op {
    /// Mnémonique court (pour désassemblage, logs, messages d'erreur).
    pub fn mnemonic(&self) -> &'static str {
        use Op::*;
        match *self {
            Nop             => "nop",
            Return          => "ret",
            LoadConst(_)    => "ldc",
            LoadTrue        => "ldtrue",
            LoadFalse       => "ldfalse",
            LoadNull        => "ldnull",
            LoadLocal(_)    => "ldl",
            StoreLocal(_)   => "stl",
            Add             => "add",
            Sub             => "sub",
            Mul             => "mul",
            Div             => "div",
            Mod             => "mod",
            Neg             => "neg",
            Not             => "not",
            Eq              => "eq",
            Ne              => "ne",
            Lt              => "lt",
            Le              => "le",
            Gt              => "gt",
            Ge              => "ge",
            Jump(_)         => "jmp",
            JumpIfFalse(_)  => "jz",
            Pop             => "pop",
            Print           => "print",
        }
    }

    /// Variation statique de la profondeur de pile.
    pub fn stack_delta(&self) -> i32 {
        use Op::*;
        match *self {
            Nop | Jump(_)                       => 0,
            LoadConst(_) | LoadTrue | LoadFalse | LoadNull | LoadLocal(_)
                                                => 1,
            StoreLocal(_) | Pop | Print | JumpIfFalse(_)
                                                => -1,
            Add | Sub | Mul | Div | Mod | Eq | Ne | Lt | Le | Gt | Ge
                                                => -1,   // 2 -> 1
            Neg | Not                           => 0,    // 1 -> 1
            Return                              => 0,    // quitte le chunk
        }
    }

    /// L'instruction est-elle un saut (pc modifié) ?
    pub fn is_jump(&self) -> bool {
        matches!(self, Op::Jump(_) | Op::JumpIfFalse(_))
    }

    /// Retourne l'offset relatif si `self` est un saut.
    pub fn jump_offset(&self) -> Option<RelOff> {
        match *self {
            Op::Jump(off) | Op::JumpIfFalse(off) => Some(off),
            _ => None,
        }
    }

    /// Destination du saut pour un `pc` donné (`dest = pc + 1 + off`).
    /// Bornée à 0 si le calcul descend sous zéro.
    pub fn jump_target(&self, pc: u32) -> Option<u32> {
        self.jump_offset().map(|off| {
            let dest = pc as i64 + 1 + off as i64;
            if dest < 0 { 0 } else { dest as u32 }
        })
    }

    /// Est-ce un terminateur de chunk ?
    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Return)
    }
}

/* -------------------------- Affichage lisible -------------------------- */

impl core::fmt::Display for Op {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Op::LoadConst(ix)    => write!(f, "ldc {ix}"),
            Op::LoadLocal(ix)    => write!(f, "ldl {ix}"),
            Op::StoreLocal(ix)   => write!(f, "stl {ix}"),
            Op::Jump(off)        => write!(f, "jmp {off:+}"),
            Op::JumpIfFalse(off) => write!(f, "jz {off:+}"),
            _                    => f.write_str(self.mnemonic()),
        }
    }
}

/* ------------------------------- Tests ------------------------------- */
