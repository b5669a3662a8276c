//! lexer.rs — Analyse lexicale du langage Brume (.brm)
//!
//! Objectifs :
//! - Zéro dépendance, lignes/colonnes précises (1-based).
//! - Commentaires : `// ...` et `/* ... */` **imbriqués**.
//! - Shebang `#!...` toléré en première ligne (scripts exécutables).
//! - Littéraux :
//!     - bool: `true`/`false` ; null: `null`
//!     - int: décimal ou hex `0x..`, underscores autorisés
//!     - float: `1.`, `1.0`, `1e+9`, `2.5e-3`
//!     - str: `"..."` échappes `\n \t \r \0 \\ \" \u{...}`
//! - Opérateurs : `+ - * / % ! = == != < <= > >= && ||` et ponctuation
//!   `( ) { } ;`
//!
//! API :
//!   let toks = tokenize(src)?;            // jusqu'à Eof inclus
//!   // ou : Lexer::new(src) + next_token() en flux

use std::fmt;

/* ───────────────────────── Positions ───────────────────────── */

/// Position 1-based (ligne/col).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    fn start() -> Self {
        Self { line: 1, col: 1 }
    }
}

/* ───────────────────────── Erreurs lexing ───────────────────────── */

#[derive(Debug, Clone)]
pub struct LexError {
    pub pos: Pos,
    pub msg: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (ligne {}, col {})", self.msg, self.pos.line, self.pos.col)
    }
}
impl std::error::Error for LexError {}

/* ───────────────────────── Tokens ───────────────────────── */

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Fin
    Eof,

    // Ident & mots-clés
    Ident(String),
    KwLet, KwPrint, KwIf, KwElse, KwWhile,
    KwTrue, KwFalse, KwNull,

    // Littéraux
    Int(i64),
    Float(f64),
    Str(String),

    // Ponctuation
    LParen, RParen, LBrace, RBrace, Semicolon,

    // Opérateurs
    Assign,
    Plus, Minus, Star, Slash, Percent,
    Not,
    EqEq, Ne, Lt, Le, Gt, Ge,
    AndAnd, OrOr,
}

impl TokenKind {
    /// Description courte pour les messages d'erreur du parseur.
    pub fn describe(&self) -> String {
        use TokenKind::*;
        match self {
            Eof => "fin de fichier".into(),
            Ident(s) => format!("identifiant '{s}'"),
            KwLet => "'let'".into(),
            KwPrint => "'print'".into(),
            KwIf => "'if'".into(),
            KwElse => "'else'".into(),
            KwWhile => "'while'".into(),
            KwTrue => "'true'".into(),
            KwFalse => "'false'".into(),
            KwNull => "'null'".into(),
            Int(i) => format!("entier {i}"),
            Float(x) => format!("flottant {x}"),
            Str(_) => "chaîne".into(),
            LParen => "'('".into(),
            RParen => "')'".into(),
            LBrace => "'{'".into(),
            RBrace => "'}'".into(),
            Semicolon => "';'".into(),
            Assign => "'='".into(),
            Plus => "'+'".into(),
            Minus => "'-'".into(),
            Star => "'*'".into(),
            Slash => "'/'".into(),
            Percent => "'%'".into(),
            Not => "'!'".into(),
            EqEq => "'=='".into(),
            Ne => "'!='".into(),
            Lt => "'<'".into(),
            Le => "'<='".into(),
            Gt => "'>'".into(),
            Ge => "'>='".into(),
            AndAnd => "'&&'".into(),
            OrOr => "'||'".into(),
        }
    }
}

/// Tokenise intégralement la source (le `Eof` final est inclus).
pub fn tokenize(src: &str) -> Result<Vec<Token>, LexError> {
    let mut lx = Lexer::new(src);
    let mut out = Vec::new();
    loop {
        let t = lx.next_token()?;
        let end = matches!(t.kind, TokenKind::Eof);
        out.push(t);
        if end {
            break;
        }
    }
    Ok(out)
}

/* ───────────────────────── Lexer ───────────────────────── */

pub struct Lexer<'a> {
    src: &'a str,
    chars: std::str::CharIndices<'a>,
    /// lookahead courant (index byte + char)
    look: Option<(usize, char)>,
    pos: Pos,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        let mut chars = src.char_indices();
        let look = chars.next();
        Self { src, chars, look, pos: Pos::start() }
    }

    /// Lit le prochain token (ignore espaces/commentaires).
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_ws_and_comments()?;

        let start = self.pos;
        let (i, ch) = match self.look {
            Some(p) => p,
            None => return Ok(Token { kind: TokenKind::Eof, pos: start }),
        };

        // Shebang en tête de fichier (#!...)
        if i == 0 && self.starts_with("#!") {
            self.eat_line();
            return self.next_token();
        }

        if is_ident_start(ch) {
            return Ok(self.lex_ident_or_keyword(start));
        }
        if ch.is_ascii_digit() {
            return self.lex_number(start);
        }
        if ch == '"' {
            return self.lex_string(start);
        }

        self.lex_punct_or_op(start)
    }

    /* ────── curseur ────── */

    fn peek(&self) -> Option<char> {
        self.look.map(|(_, c)| c)
    }

    fn rest(&self) -> &'a str {
        match self.look {
            Some((i, _)) => &self.src[i..],
            None => "",
        }
    }

    fn starts_with(&self, pat: &str) -> bool {
        self.rest().starts_with(pat)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, ch) = self.look?;
        if ch == '\n' {
            self.pos.line += 1;
            self.pos.col = 1;
        } else {
            self.pos.col += 1;
        }
        self.look = self.chars.next();
        Some(ch)
    }

    fn eat_line(&mut self) {
        while let Some(c) = self.peek() {
            self.bump();
            if c == '\n' {
                break;
            }
        }
    }

    fn err(&self, pos: Pos, msg: impl Into<String>) -> LexError {
        LexError { pos, msg: msg.into() }
    }

    /* ────── espaces & commentaires ────── */

    fn skip_ws_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.starts_with("//") => {
                    self.eat_line();
                }
                Some('/') if self.starts_with("/*") => {
                    let open = self.pos;
                    self.bump(); // '/'
                    self.bump(); // '*'
                    let mut depth = 1u32;
                    loop {
                        if self.look.is_none() {
                            return Err(self.err(open, "commentaire /* non refermé"));
                        }
                        if self.starts_with("/*") {
                            self.bump();
                            self.bump();
                            depth += 1;
                        } else if self.starts_with("*/") {
                            self.bump();
                            self.bump();
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        } else {
                            self.bump();
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /* ────── idents & mots-clés ────── */

    fn lex_ident_or_keyword(&mut self, start: Pos) -> Token {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        let kind = match name.as_str() {
            "let" => TokenKind::KwLet,
            "print" => TokenKind::KwPrint,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "while" => TokenKind::KwWhile,
            "true" => TokenKind::KwTrue,
            "false" => TokenKind::KwFalse,
            "null" => TokenKind::KwNull,
            _ => TokenKind::Ident(name),
        };
        Token { kind, pos: start }
    }

    /* ────── nombres ────── */

    fn lex_number(&mut self, start: Pos) -> Result<Token, LexError> {
        // hex : 0x..., underscores tolérés
        if self.starts_with("0x") || self.starts_with("0X") {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_hexdigit() {
                    digits.push(c);
                    self.bump();
                } else if c == '_' {
                    self.bump();
                } else {
                    break;
                }
            }
            if digits.is_empty() {
                return Err(self.err(start, "littéral hexadécimal vide"));
            }
            let value = i64::from_str_radix(&digits, 16)
                .map_err(|_| self.err(start, "entier hexadécimal trop grand"))?;
            return Ok(Token { kind: TokenKind::Int(value), pos: start });
        }

        let mut text = String::new();
        let mut is_float = false;

        self.eat_digits(&mut text);
        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.bump();
            self.eat_digits(&mut text);
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push('e');
            self.bump();
            if matches!(self.peek(), Some('+') | Some('-')) {
                text.push(self.bump().unwrap_or('+'));
            }
            let before = text.len();
            self.eat_digits(&mut text);
            if text.len() == before {
                return Err(self.err(start, "exposant vide dans un flottant"));
            }
        }

        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.err(start, format!("flottant invalide: {text}")))?;
            Ok(Token { kind: TokenKind::Float(value), pos: start })
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.err(start, format!("entier trop grand: {text}")))?;
            Ok(Token { kind: TokenKind::Int(value), pos: start })
        }
    }

    fn eat_digits(&mut self, out: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                out.push(c);
                self.bump();
            } else if c == '_' {
                self.bump();
            } else {
                break;
            }
        }
    }

    /* ────── chaînes ────── */

    fn lex_string(&mut self, start: Pos) -> Result<Token, LexError> {
        self.bump(); // '"'
        let mut value = String::new();
        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => return Err(self.err(start, "chaîne non refermée")),
            };
            match c {
                '"' => {
                    self.bump();
                    return Ok(Token { kind: TokenKind::Str(value), pos: start });
                }
                '\n' => return Err(self.err(start, "chaîne non refermée avant fin de ligne")),
                '\\' => {
                    let esc_pos = self.pos;
                    self.bump();
                    let e = self
                        .bump()
                        .ok_or_else(|| self.err(start, "chaîne non refermée"))?;
                    match e {
                        'n' => value.push('\n'),
                        't' => value.push('\t'),
                        'r' => value.push('\r'),
                        '0' => value.push('\0'),
                        '\\' => value.push('\\'),
                        '"' => value.push('"'),
                        'u' => {
                            if self.peek() != Some('{') {
                                return Err(self.err(esc_pos, "échappe \\u sans '{'"));
                            }
                            self.bump();
                            let mut hex = String::new();
                            while let Some(h) = self.peek() {
                                if h == '}' {
                                    break;
                                }
                                hex.push(h);
                                self.bump();
                            }
                            if self.bump() != Some('}') {
                                return Err(self.err(esc_pos, "échappe \\u{...} non refermée"));
                            }
                            let cp = u32::from_str_radix(&hex, 16)
                                .map_err(|_| self.err(esc_pos, "code \\u{...} invalide"))?;
                            let ch = char::from_u32(cp)
                                .ok_or_else(|| self.err(esc_pos, "code \\u{...} hors plage"))?;
                            value.push(ch);
                        }
                        other => {
                            return Err(self.err(esc_pos, format!("échappe inconnue: \\{other}")))
                        }
                    }
                }
                _ => {
                    value.push(c);
                    self.bump();
                }
            }
        }
    }

    /* ────── ponctuation & opérateurs ────── */

    fn lex_punct_or_op(&mut self, start: Pos) -> Result<Token, LexError> {
        use TokenKind::*;

        // multi-char d'abord
        for (pat, kind) in [
            ("==", EqEq),
            ("!=", Ne),
            ("<=", Le),
            (">=", Ge),
            ("&&", AndAnd),
            ("||", OrOr),
        ] {
            if self.starts_with(pat) {
                self.bump();
                self.bump();
                return Ok(Token { kind, pos: start });
            }
        }

        let c = self.bump().unwrap_or('\0');
        let kind = match c {
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            ';' => Semicolon,
            '=' => Assign,
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => Slash,
            '%' => Percent,
            '!' => Not,
            '<' => Lt,
            '>' => Gt,
            other => return Err(self.err(start, format!("caractère inattendu: '{other}'"))),
        };
        Ok(Token { kind, pos: start })
    }
}

fn is_ident_start(c: char) -> bool {
    c == '_' || c.is_alphabetic()
}

fn is_ident_continue(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

/* ───────────────────────── Tests ───────────────────────── */

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        tokenize(src).expect("lex ok").into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn idents_and_keywords() {
        use TokenKind::*;
        assert_eq!(
            kinds("let brouillard = null;"),
            vec![KwLet, Ident("brouillard".into()), Assign, KwNull, Semicolon, Eof]
        );
        assert_eq!(kinds("lettres"), vec![Ident("lettres".into()), Eof]);
    }

    #[test]
    fn numbers() {
        use TokenKind::*;
        assert_eq!(kinds("42"), vec![Int(42), Eof]);
        assert_eq!(kinds("1_000_000"), vec![Int(1_000_000), Eof]);
        assert_eq!(kinds("0xFF"), vec![Int(255), Eof]);
        assert_eq!(kinds("3.5"), vec![Float(3.5), Eof]);
        assert_eq!(kinds("1."), vec![Float(1.0), Eof]);
        assert_eq!(kinds("2e3"), vec![Float(2000.0), Eof]);
        assert_eq!(kinds("2.5e-1"), vec![Float(0.25), Eof]);
    }

    #[test]
    fn strings_and_escapes() {
        use TokenKind::*;
        assert_eq!(kinds(r#""bonjour""#), vec![Str("bonjour".into()), Eof]);
        assert_eq!(kinds(r#""a\nb\t\"c\"""#), vec![Str("a\nb\t\"c\"".into()), Eof]);
        assert_eq!(kinds(r#""\u{e9}""#), vec![Str("é".into()), Eof]);
    }

    #[test]
    fn operators() {
        use TokenKind::*;
        assert_eq!(
            kinds("a <= b && !c || d != e"),
            vec![
                Ident("a".into()), Le, Ident("b".into()), AndAnd, Not, Ident("c".into()),
                OrOr, Ident("d".into()), Ne, Ident("e".into()), Eof
            ]
        );
        // '=' seul vs '=='
        assert_eq!(kinds("= =="), vec![Assign, EqEq, Eof]);
    }

    #[test]
    fn comments_and_shebang() {
        use TokenKind::*;
        let src = "#!/usr/bin/env brumec\n// ligne\nlet x /* bloc /* imbriqué */ */ = 1;";
        assert_eq!(
            kinds(src),
            vec![KwLet, Ident("x".into()), Assign, Int(1), Semicolon, Eof]
        );
    }

    #[test]
    fn positions_track_lines() {
        let toks = tokenize("let a = 1;\nprint a;").expect("lex ok");
        assert_eq!(toks[0].pos, Pos { line: 1, col: 1 });
        let print_tok = toks.iter().find(|t| t.kind == TokenKind::KwPrint).unwrap();
        assert_eq!(print_tok.pos.line, 2);
        assert_eq!(print_tok.pos.col, 1);
    }

    #[test]
    fn lex_errors() {
        assert!(tokenize("\"ouverte").is_err());
        assert!(tokenize("@").is_err());
        assert!(tokenize("\"\\q\"").is_err());
        assert!(tokenize("/* jamais fermé").is_err());
        assert!(tokenize("1e").is_err());
        // un '&' seul n'existe pas en Brume
        assert!(tokenize("a & b").is_err());
    }
}
