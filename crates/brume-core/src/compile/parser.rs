//! parser.rs — Analyse syntaxique de Brume : tokens -> AST.
//!
//! Grammaire (descente récursive) :
//!
//! ```text
//! program   := stmt* EOF
//! stmt      := "let" IDENT "=" expr ";"
//!            | IDENT "=" expr ";"
//!            | "print" expr ";"
//!            | "if" expr block ("else" (block | if_stmt))?
//!            | "while" expr block
//!            | block
//!            | expr ";"
//! block     := "{" stmt* "}"
//! expr      := or
//! or        := and ("||" and)*
//! and       := equality ("&&" equality)*
//! equality  := comparison (("==" | "!=") comparison)*
//! comparison:= term (("<" | "<=" | ">" | ">=") term)*
//! term      := factor (("+" | "-") factor)*
//! factor    := unary (("*" | "/" | "%") unary)*
//! unary     := ("-" | "!") unary | primary
//! primary   := INT | FLOAT | STR | "true" | "false" | "null"
//!            | IDENT | "(" expr ")"
//! ```
//!
//! Chaque instruction retient sa ligne source (pour la table de lignes et
//! les diagnostics du codegen).

use std::fmt;

use crate::compile::lexer::{Pos, Token, TokenKind};

/* ───────────────────────── Erreur ───────────────────────── */

#[derive(Debug, Clone)]
pub struct ParseError {
    pub pos: Pos,
    pub msg: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ligne {}, col {})", self.msg, self.pos.line, self.pos.col)
    }
}
impl std::error::Error for ParseError {}

/* ───────────────────────── AST ───────────────────────── */

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, value: Expr, line: u32 },
    Assign { name: String, value: Expr, line: u32 },
    Print { value: Expr, line: u32 },
    If { cond: Expr, then_body: Vec<Stmt>, else_body: Option<Vec<Stmt>>, line: u32 },
    While { cond: Expr, body: Vec<Stmt>, line: u32 },
    Block { body: Vec<Stmt>, line: u32 },
    Expr { value: Expr, line: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add, Sub, Mul, Div, Mod,
    Eq, Ne, Lt, Le, Gt, Ge,
    And, Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Var { name: String, line: u32 },
    Unary { op: UnOp, rhs: Box<Expr> },
    Binary { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
}

/// Parse un programme complet (jusqu'à `Eof`).
pub fn parse_program(tokens: &[Token]) -> Result<Vec<Stmt>, ParseError> {
    // aucun token, pas même un Eof : programme vide, comme une source vide
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let mut p = Parser { toks: tokens, i: 0 };
    let mut stmts = Vec::new();
    while !p.at_eof() {
        stmts.push(p.stmt()?);
    }
    Ok(stmts)
}

/* ───────────────────────── Impl ───────────────────────── */

struct Parser<'a> {
    toks: &'a [Token],
    i: usize,
}

impl<'a> Parser<'a> {
    /* ----- curseur ----- */

    fn peek(&self) -> &Token {
        // toks non vide (garanti par parse_program) ; clampe sur le dernier
        // token, un Eof quand la liste vient de tokenize()
        self.toks.get(self.i).unwrap_or(&self.toks[self.toks.len() - 1])
    }

    fn peek2_is_assign(&self) -> bool {
        matches!(self.toks.get(self.i + 1).map(|t| &t.kind), Some(TokenKind::Assign))
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if !matches!(t.kind, TokenKind::Eof) {
            self.i += 1;
        }
        t
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, ctx: &str) -> Result<Token, ParseError> {
        if &self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.err_here(format!(
                "attendu {} {}, trouvé {}",
                kind.describe(),
                ctx,
                self.peek().kind.describe()
            )))
        }
    }

    fn err_here(&self, msg: impl Into<String>) -> ParseError {
        ParseError { pos: self.peek().pos, msg: msg.into() }
    }

    /* ----- instructions ----- */

    fn stmt(&mut self) -> Result<Stmt, ParseError> {
        let line = self.peek().pos.line;
        match self.peek().kind {
            TokenKind::KwLet => self.let_stmt(line),
            TokenKind::KwPrint => {
                self.advance();
                let value = self.expr()?;
                self.expect(&TokenKind::Semicolon, "après print")?;
                Ok(Stmt::Print { value, line })
            }
            TokenKind::KwIf => self.if_stmt(line),
            TokenKind::KwWhile => {
                self.advance();
                let cond = self.expr()?;
                let body = self.block()?;
                Ok(Stmt::While { cond, body, line })
            }
            TokenKind::LBrace => Ok(Stmt::Block { body: self.block()?, line }),
            TokenKind::KwElse => Err(self.err_here("'else' sans 'if'")),
            TokenKind::Ident(_) if self.peek2_is_assign() => self.assign_stmt(line),
            _ => {
                let value = self.expr()?;
                self.expect(&TokenKind::Semicolon, "après l'expression")?;
                Ok(Stmt::Expr { value, line })
            }
        }
    }

    fn let_stmt(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.advance(); // let
        let name = self.ident("après 'let'")?;
        self.expect(&TokenKind::Assign, "après le nom de variable")?;
        let value = self.expr()?;
        self.expect(&TokenKind::Semicolon, "après la déclaration")?;
        Ok(Stmt::Let { name, value, line })
    }

    fn assign_stmt(&mut self, line: u32) -> Result<Stmt, ParseError> {
        let name = self.ident("en début d'affectation")?;
        self.expect(&TokenKind::Assign, "dans l'affectation")?;
        let value = self.expr()?;
        self.expect(&TokenKind::Semicolon, "après l'affectation")?;
        Ok(Stmt::Assign { name, value, line })
    }

    fn if_stmt(&mut self, line: u32) -> Result<Stmt, ParseError> {
        self.advance(); // if
        let cond = self.expr()?;
        let then_body = self.block()?;
        let else_body = if self.eat(&TokenKind::KwElse) {
            if matches!(self.peek().kind, TokenKind::KwIf) {
                // else if … : sucre pour else { if … }
                let nested_line = self.peek().pos.line;
                Some(vec![self.if_stmt(nested_line)?])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Stmt::If { cond, then_body, else_body, line })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace, "pour ouvrir le bloc")?;
        let mut body = Vec::new();
        while !matches!(self.peek().kind, TokenKind::RBrace | TokenKind::Eof) {
            body.push(self.stmt()?);
        }
        self.expect(&TokenKind::RBrace, "pour fermer le bloc")?;
        Ok(body)
    }

    fn ident(&mut self, ctx: &str) -> Result<String, ParseError> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(self.err_here(format!(
                "attendu un identifiant {ctx}, trouvé {}",
                other.describe()
            ))),
        }
    }

    /* ----- expressions ----- */

    fn expr(&mut self) -> Result<Expr, ParseError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary { op: BinOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.equality()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.equality()?;
            lhs = Expr::Binary { op: BinOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.comparison()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.unary()?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Not => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let rhs = self.unary()?;
            return Ok(Expr::Unary { op, rhs: Box::new(rhs) });
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Int(v) => {
                self.advance();
                Ok(Expr::Int(v))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(Expr::Float(v))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::KwTrue => {
                self.advance();
                Ok(Expr::Bool(true))
            }
            TokenKind::KwFalse => {
                self.advance();
                Ok(Expr::Bool(false))
            }
            TokenKind::KwNull => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Var { name, line: tok.pos.line })
            }
            TokenKind::LParen => {
                self.advance();
                let e = self.expr()?;
                self.expect(&TokenKind::RParen, "pour fermer la parenthèse")?;
                Ok(e)
            }
            other => Err(self.err_here(format!(
                "expression attendue, trouvé {}",
                other.describe()
            ))),
        }
    }
}

/* ───────────────────────── Tests ───────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::lexer::tokenize;

    fn parse(src: &str) -> Vec<Stmt> {
        parse_program(&tokenize(src).expect("lex ok")).expect("parse ok")
    }

    fn parse_err(src: &str) -> ParseError {
        parse_program(&tokenize(src).expect("lex ok")).expect_err("erreur attendue")
    }

    #[test]
    fn precedence_mul_before_add() {
        let prog = parse("1 + 2 * 3;");
        let Stmt::Expr { value, .. } = &prog[0] else { panic!("expr attendue") };
        // (1 + (2 * 3))
        let Expr::Binary { op: BinOp::Add, rhs, .. } = value else { panic!("+ en tête") };
        assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn logic_binds_loosest() {
        let prog = parse("a == 1 && b < 2 || c;");
        let Stmt::Expr { value, .. } = &prog[0] else { panic!() };
        // ((a==1 && b<2) || c)
        let Expr::Binary { op: BinOp::Or, lhs, .. } = value else { panic!("|| en tête") };
        assert!(matches!(**lhs, Expr::Binary { op: BinOp::And, .. }));
    }

    #[test]
    fn let_vs_assign_vs_expr() {
        let prog = parse("let x = 1;\nx = x + 1;\nx;");
        assert!(matches!(prog[0], Stmt::Let { ref name, line: 1, .. } if name == "x"));
        assert!(matches!(prog[1], Stmt::Assign { ref name, line: 2, .. } if name == "x"));
        assert!(matches!(prog[2], Stmt::Expr { line: 3, .. }));
    }

    #[test]
    fn if_else_if_chain() {
        let prog = parse("if a { 1; } else if b { 2; } else { 3; }");
        let Stmt::If { else_body: Some(else_body), .. } = &prog[0] else { panic!() };
        // le else-if est re-sucré en bloc else contenant un if
        assert_eq!(else_body.len(), 1);
        assert!(matches!(else_body[0], Stmt::If { else_body: Some(_), .. }));
    }

    #[test]
    fn while_and_nested_blocks() {
        let prog = parse("while x > 0 { { print x; } x = x - 1; }");
        let Stmt::While { body, .. } = &prog[0] else { panic!() };
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0], Stmt::Block { .. }));
    }

    #[test]
    fn unary_chains() {
        let prog = parse("print !!ok;\nprint --1;");
        let Stmt::Print { value, .. } = &prog[0] else { panic!() };
        let Expr::Unary { op: UnOp::Not, rhs } = value else { panic!() };
        assert!(matches!(**rhs, Expr::Unary { op: UnOp::Not, .. }));
    }

    #[test]
    fn empty_token_slice_is_an_empty_program() {
        // même résultat qu'une source vide (un Eof seul)
        assert!(parse_program(&[]).expect("programme vide").is_empty());
        assert!(parse("").is_empty());
    }

    #[test]
    fn parse_errors_are_located() {
        let e = parse_err("let x 1;");
        assert!(e.msg.contains("'='"), "{}", e.msg);
        assert_eq!(e.pos.line, 1);

        let e = parse_err("print 1");
        assert!(e.msg.contains("';'"), "{}", e.msg);

        let e = parse_err("if x print 1;");
        assert!(e.msg.contains("'{'"), "{}", e.msg);

        let e = parse_err("else { 1; }");
        assert!(e.msg.contains("'else' sans 'if'"), "{}", e.msg);

        let e = parse_err("(1 + 2;");
        assert!(e.msg.contains("')'"), "{}", e.msg);
    }
}
