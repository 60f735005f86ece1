//! Lexer and recursive-descent parser for the expression language.

use serde_json::Value;

use super::ExprError;

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) enum Ast {
    Literal(Value),
    /// A binding lookup followed by key/index segments.
    Path { root: String, segments: Vec<Segment> },
    Unary { op: UnaryOp, expr: Box<Ast> },
    Binary { op: BinOp, lhs: Box<Ast>, rhs: Box<Ast> },
    Call { name: String, args: Vec<Ast> },
}

#[derive(Debug, Clone)]
pub(crate) enum Segment {
    Key(String),
    Index(Box<Ast>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinOp {
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Dot,
    Comma,
    Not,
    Minus,
    AndAnd,
    OrOr,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) => format!("identifier {s:?}"),
            Token::Int(n) => format!("number {n}"),
            Token::Float(f) => format!("number {f}"),
            Token::Str(s) => format!("string {s:?}"),
            other => format!("{other:?}"),
        }
    }
}

fn lex(source: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::AndAnd);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::OrOr);
                i += 2;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::EqEq);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::NotEq);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '\'' | '"' => {
                let (tok, next) = lex_string(&chars, i)?;
                tokens.push(tok);
                i = next;
            }
            '0'..='9' => {
                let (tok, next) = lex_number(&chars, i);
                tokens.push(tok);
                i = next;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ExprError::UnexpectedChar { ch: other, pos: i }),
        }
    }

    Ok(tokens)
}

/// Lex a quoted string starting at `start` (the opening quote). Supports
/// backslash escapes for the quote characters, `\\`, `\n`, and `\t`.
fn lex_string(chars: &[char], start: usize) -> Result<(Token, usize), ExprError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        match chars[i] {
            '\\' => {
                let escaped = chars.get(i + 1).ok_or(ExprError::UnterminatedString)?;
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => *other,
                });
                i += 2;
            }
            c if c == quote => return Ok((Token::Str(out), i + 1)),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    Err(ExprError::UnterminatedString)
}

fn lex_number(chars: &[char], start: usize) -> (Token, usize) {
    let mut i = start;
    let mut is_float = false;

    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit) {
        is_float = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }

    let text: String = chars[start..i].iter().collect();
    let token = if is_float {
        // A digit-only string with one dot always parses.
        Token::Float(text.parse().unwrap_or(0.0))
    } else {
        match text.parse::<i64>() {
            Ok(n) => Token::Int(n),
            // Larger than i64: keep the value, at float precision.
            Err(_) => Token::Float(text.parse().unwrap_or(f64::INFINITY)),
        }
    };
    (token, i)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse `source` into an AST, requiring the whole input to be consumed.
pub(crate) fn parse(source: &str) -> Result<Ast, ExprError> {
    let tokens = lex(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let ast = parser.parse_or()?;
    if let Some(tok) = parser.peek() {
        return Err(ExprError::UnexpectedToken(tok.describe()));
    }
    Ok(ast)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token, ExprError> {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(tok)
    }

    fn expect(&mut self, expected: &Token) -> Result<(), ExprError> {
        let tok = self.next()?;
        if &tok == expected {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken(tok.describe()))
        }
    }

    fn parse_or(&mut self) -> Result<Ast, ExprError> {
        let mut lhs = self.parse_and()?;
        while self.peek() == Some(&Token::OrOr) {
            self.pos += 1;
            let rhs = self.parse_and()?;
            lhs = Ast::Binary {
                op: BinOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Ast, ExprError> {
        let mut lhs = self.parse_equality()?;
        while self.peek() == Some(&Token::AndAnd) {
            self.pos += 1;
            let rhs = self.parse_equality()?;
            lhs = Ast::Binary {
                op: BinOp::And,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Ast, ExprError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinOp::Eq,
                Some(Token::NotEq) => BinOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = Ast::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Ast, ExprError> {
        let lhs = self.parse_unary()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_unary()?;
        Ok(Ast::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_unary(&mut self) -> Result<Ast, ExprError> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Ast::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(self.parse_unary()?),
                })
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Ast::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(self.parse_unary()?),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Ast, ExprError> {
        match self.next()? {
            Token::Int(n) => Ok(Ast::Literal(Value::from(n))),
            Token::Float(f) => Ok(Ast::Literal(Value::from(f))),
            Token::Str(s) => Ok(Ast::Literal(Value::String(s))),
            Token::LParen => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Ast::Literal(Value::Bool(true))),
                "false" => Ok(Ast::Literal(Value::Bool(false))),
                "null" => Ok(Ast::Literal(Value::Null)),
                _ => {
                    if self.peek() == Some(&Token::LParen) {
                        self.pos += 1;
                        let args = self.parse_call_args()?;
                        Ok(Ast::Call { name, args })
                    } else {
                        let segments = self.parse_segments()?;
                        Ok(Ast::Path {
                            root: name,
                            segments,
                        })
                    }
                }
            },
            other => Err(ExprError::UnexpectedToken(other.describe())),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Ast>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            match self.next()? {
                Token::Comma => continue,
                Token::RParen => return Ok(args),
                other => return Err(ExprError::UnexpectedToken(other.describe())),
            }
        }
    }

    fn parse_segments(&mut self) -> Result<Vec<Segment>, ExprError> {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.next()? {
                        Token::Ident(key) => segments.push(Segment::Key(key)),
                        other => return Err(ExprError::UnexpectedToken(other.describe())),
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_or()?;
                    self.expect(&Token::RBracket)?;
                    segments.push(Segment::Index(Box::new(index)));
                }
                _ => return Ok(segments),
            }
        }
    }
}
