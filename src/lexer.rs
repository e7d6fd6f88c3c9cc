//! Tokenizer and per-line parser, producing the statement list the two
//! passes walk. Grounded on the line-oriented, character-scanner style of
//! a small hand-written assembler front end: one line in, one `Statement`
//! out, with a `Peekable<Chars>`-driven tokenizer feeding a small
//! recursive-descent expression parser.

use std::iter::Peekable;
use std::str::Chars;

use crate::ast::{
    Address, AddressTag, BinOp, DataElement, DataSize, Expr, ExprNode, Statement, StatementKind,
    UnOp,
};
use crate::diagnostics::DiagnosticsSink;
use crate::error::Severity;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(i64),
    Str(String),
    Char(u8),
    Colon,
    Comma,
    Equals,
    Hash,
    Dot,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Shl,
    Shr,
    Amp,
    Pipe,
    Caret,
    Tilde,
}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(line: &'a str) -> Lexer<'a> {
        Lexer {
            chars: line.chars().peekable(),
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, String> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else if c == ';' {
                break;
            } else if c.is_ascii_digit() {
                tokens.push(self.read_number()?);
            } else if c == '$' {
                self.chars.next();
                tokens.push(self.read_radix_number(16)?);
            } else if c == '%' && matches!(peek_second(&self.chars), Some(d) if d == '0' || d == '1')
            {
                self.chars.next();
                tokens.push(self.read_radix_number(2)?);
            } else if is_ident_start(c) {
                tokens.push(self.read_ident());
            } else if c == '"' {
                tokens.push(self.read_string()?);
            } else if c == '\'' {
                tokens.push(self.read_char_literal()?);
            } else {
                tokens.push(self.read_punctuation()?);
            }
        }
        Ok(tokens)
    }

    fn read_number(&mut self) -> Result<Token, String> {
        if self.chars.peek() == Some(&'0') {
            match peek_second(&self.chars) {
                Some('x') | Some('X') => {
                    self.chars.next();
                    self.chars.next();
                    return self.read_radix_number(16);
                }
                Some('b') | Some('B') => {
                    self.chars.next();
                    self.chars.next();
                    return self.read_radix_number(2);
                }
                _ => {}
            }
        }
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        text.parse::<i64>()
            .map(Token::Number)
            .map_err(|_| format!("invalid decimal literal \"{text}\""))
    }

    fn read_radix_number(&mut self, radix: u32) -> Result<Token, String> {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_digit(radix) {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        i64::from_str_radix(&text, radix)
            .map(Token::Number)
            .map_err(|_| format!("invalid base-{radix} literal \"{text}\""))
    }

    fn read_ident(&mut self) -> Token {
        let mut text = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_ident_continue(c) {
                text.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        Token::Ident(text)
    }

    fn read_string(&mut self) -> Result<Token, String> {
        self.chars.next(); // opening quote
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some('"') => return Ok(Token::Str(text)),
                Some('\\') => text.push(self.read_escape()?),
                Some(c) => text.push(c),
                None => return Err("unterminated string literal".into()),
            }
        }
    }

    fn read_char_literal(&mut self) -> Result<Token, String> {
        self.chars.next(); // opening quote
        let value = match self.chars.next() {
            Some('\\') => self.read_escape()?,
            Some(c) => c,
            None => return Err("unterminated character literal".into()),
        };
        match self.chars.next() {
            Some('\'') => Ok(Token::Char(value as u8)),
            _ => Err("character literal must be exactly one character".into()),
        }
    }

    fn read_escape(&mut self) -> Result<char, String> {
        match self.chars.next() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some('\\') => Ok('\\'),
            Some('\'') => Ok('\''),
            Some('"') => Ok('"'),
            Some(other) => Ok(other),
            None => Err("unterminated escape sequence".into()),
        }
    }

    fn read_punctuation(&mut self) -> Result<Token, String> {
        let c = self.chars.next().expect("caller peeked Some");
        Ok(match c {
            ':' => Token::Colon,
            ',' => Token::Comma,
            '=' => Token::Equals,
            '#' => Token::Hash,
            '.' => Token::Dot,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '&' => Token::Amp,
            '^' => Token::Caret,
            '~' => Token::Tilde,
            '|' => Token::Pipe,
            '<' if self.chars.peek() == Some(&'<') => {
                self.chars.next();
                Token::Shl
            }
            '>' if self.chars.peek() == Some(&'>') => {
                self.chars.next();
                Token::Shr
            }
            other => return Err(format!("unexpected character '{other}'")),
        })
    }
}

fn peek_second(chars: &Peekable<Chars>) -> Option<char> {
    chars.clone().nth(1)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Tokenizes and parses every line of `source` into a `Statement`. A line
/// that fails to parse becomes a `Noop` statement and a diagnostic — a
/// malformed line never stops the rest of the file from being read.
pub fn parse(source: &str, diagnostics: &mut DiagnosticsSink) -> Vec<Statement> {
    source
        .lines()
        .enumerate()
        .map(|(index, line)| {
            let line_number = index as u32 + 1;
            parse_line(line_number, line).unwrap_or_else(|message| {
                diagnostics.push(Severity::Error, line_number, message);
                Statement::new(line_number, None, None, StatementKind::Noop)
            })
        })
        .collect()
}

fn parse_line(line_number: u32, line: &str) -> Result<Statement, String> {
    let comment = line.find(';').map(|i| line[i + 1..].trim().to_string());
    let tokens = Lexer::new(line).tokenize()?;
    let mut parser = Parser { tokens: &tokens, pos: 0 };

    let label = parser.take_label()?;
    let kind = parser.take_statement_kind()?;
    if !parser.at_end() {
        return Err(format!("unexpected trailing tokens after {:?}", parser.peek()));
    }
    Ok(Statement::new(line_number, label, comment, kind))
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn bump(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token) -> Result<(), String> {
        if self.peek() == Some(token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(format!("expected {token:?}, found {:?}", self.peek()))
        }
    }

    fn take_label(&mut self) -> Result<Option<String>, String> {
        if let (Some(Token::Ident(name)), Some(Token::Colon)) =
            (self.tokens.get(self.pos), self.tokens.get(self.pos + 1))
        {
            let name = name.clone();
            self.pos += 2;
            Ok(Some(name))
        } else {
            Ok(None)
        }
    }

    fn take_statement_kind(&mut self) -> Result<StatementKind, String> {
        if self.at_end() {
            return Ok(StatementKind::Noop);
        }
        let Token::Ident(keyword) = self.peek().cloned().ok_or("expected a keyword or mnemonic")?
        else {
            return Err(format!("expected a keyword or mnemonic, found {:?}", self.peek()));
        };
        let upper = keyword.to_ascii_uppercase();
        match upper.as_str() {
            "ORG" => {
                self.bump();
                Ok(StatementKind::Org(self.parse_expr_node()?))
            }
            "SET" => {
                self.bump();
                let Token::Ident(name) = self.bump().cloned().ok_or("SET requires a symbol name")?
                else {
                    return Err("SET requires a symbol name".into());
                };
                self.expect(&Token::Equals)?;
                Ok(StatementKind::Set(name, self.parse_expr_node()?))
            }
            "SPACE" => {
                self.bump();
                Ok(StatementKind::Space(DataSize::Byte, self.parse_expr_node()?))
            }
            "BYTE" | "BYTES" => {
                self.bump();
                Ok(StatementKind::Data(DataSize::Byte, self.parse_data_list()?))
            }
            "WORD" | "WORDS" => {
                self.bump();
                Ok(StatementKind::Data(DataSize::Word, self.parse_data_list()?))
            }
            "STRING" => {
                self.bump();
                Ok(StatementKind::Data(DataSize::Byte, self.parse_string_as_bytes()?))
            }
            "END" => {
                self.bump();
                Ok(StatementKind::Noop)
            }
            _ => {
                self.bump();
                let addr = self.parse_address()?;
                Ok(StatementKind::Instruction(upper, addr))
            }
        }
    }

    fn parse_data_list(&mut self) -> Result<Vec<DataElement>, String> {
        let mut elements = Vec::new();
        loop {
            elements.push(self.parse_data_element()?);
            if self.peek() == Some(&Token::Comma) {
                self.bump();
            } else {
                break;
            }
        }
        Ok(elements)
    }

    fn parse_data_element(&mut self) -> Result<DataElement, String> {
        if let Some(Token::Ident(name)) = self.peek() {
            if name.eq_ignore_ascii_case("REP") {
                self.bump();
                self.expect(&Token::LParen)?;
                let count = self.parse_expr_node()?;
                self.expect(&Token::RParen)?;
                let value = self.parse_expr_node()?;
                return Ok(DataElement::Rep { count, value });
            }
        }
        Ok(DataElement::Single(self.parse_expr_node()?))
    }

    /// `STRING "literal"` desugars into a list of byte constants — pure
    /// parser sugar, no new statement kind.
    fn parse_string_as_bytes(&mut self) -> Result<Vec<DataElement>, String> {
        let Token::Str(text) = self.bump().cloned().ok_or("STRING requires a string literal")?
        else {
            return Err("STRING requires a string literal".into());
        };
        Ok(text
            .bytes()
            .map(|b| DataElement::Single(ExprNode::new(Expr::Constant(b as i64))))
            .collect())
    }

    fn parse_address(&mut self) -> Result<Address, String> {
        if self.at_end() {
            return Ok(Address::no_operand(AddressTag::Implied));
        }
        if let Some(Token::Ident(name)) = self.peek() {
            if name.eq_ignore_ascii_case("A") && self.tokens.len() == self.pos + 1 {
                self.bump();
                return Ok(Address::no_operand(AddressTag::Accumulator));
            }
        }
        if self.peek() == Some(&Token::Hash) {
            self.bump();
            return Ok(Address::with_expr(AddressTag::Immediate, self.parse_expr_node()?));
        }
        if self.peek() == Some(&Token::LBracket) {
            self.bump();
            let expr = self.parse_expr_node()?;
            if self.peek() == Some(&Token::Comma) {
                self.bump();
                self.expect_ident_upper("X")?;
                self.expect(&Token::RBracket)?;
                return Ok(Address::with_expr(AddressTag::IndirectX, expr));
            }
            self.expect(&Token::RBracket)?;
            if self.peek() == Some(&Token::Comma) {
                self.bump();
                self.expect_ident_upper("Y")?;
                return Ok(Address::with_expr(AddressTag::IndirectY, expr));
            }
            return Ok(Address::with_expr(AddressTag::Indirect, expr));
        }

        let start = self.pos;
        let wrapped = self.peek() == Some(&Token::LParen);
        let mut expr = self.parse_expr_node()?;
        if wrapped && self.is_balanced_parenthesized(start, self.pos) {
            expr.parenthesized = true;
        }

        if self.peek() == Some(&Token::Comma) {
            self.bump();
            if self.expect_ident_upper("X").is_ok() {
                return Ok(Address::with_expr(AddressTag::AddressX, expr));
            }
            self.expect_ident_upper("Y")?;
            return Ok(Address::with_expr(AddressTag::AddressY, expr));
        }
        Ok(Address::with_expr(AddressTag::Address, expr))
    }

    /// Whether `tokens[start..end]` is exactly one `(` ... `)` pair wrapping
    /// the entire span — the only shape that makes a top-level operand
    /// ambiguous with indirect addressing.
    fn is_balanced_parenthesized(&self, start: usize, end: usize) -> bool {
        if end - start < 2 {
            return false;
        }
        if self.tokens[start] != Token::LParen || self.tokens[end - 1] != Token::RParen {
            return false;
        }
        let mut depth = 0;
        for token in &self.tokens[start..end - 1] {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return false;
                    }
                }
                _ => {}
            }
        }
        true
    }

    fn expect_ident_upper(&mut self, expected: &str) -> Result<(), String> {
        match self.peek() {
            Some(Token::Ident(name)) if name.eq_ignore_ascii_case(expected) => {
                self.bump();
                Ok(())
            }
            other => Err(format!("expected '{expected}', found {other:?}")),
        }
    }

    // Expression grammar, loosest-binding first:
    //   or_expr   := xor_expr   ( '|' xor_expr   )*
    //   xor_expr  := and_expr   ( '^' and_expr   )*
    //   and_expr  := shift_expr ( '&' shift_expr )*
    //   shift_expr:= add_expr   ( ('<<'|'>>') add_expr )*
    //   add_expr  := mul_expr   ( ('+'|'-') mul_expr )*
    //   mul_expr  := unary      ( ('*'|'/'|'%') unary )*
    //   unary     := ('-'|'~')? primary
    //   primary   := number | char | '.' | ident | '(' or_expr ')'

    fn parse_expr_node(&mut self) -> Result<ExprNode, String> {
        Ok(ExprNode::new(self.parse_or()?))
    }

    fn parse_or(&mut self) -> Result<Expr, String> {
        self.parse_binop_level(&[(Token::Pipe, BinOp::Or)], Self::parse_xor)
    }

    fn parse_xor(&mut self) -> Result<Expr, String> {
        self.parse_binop_level(&[(Token::Caret, BinOp::Xor)], Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, String> {
        self.parse_binop_level(&[(Token::Amp, BinOp::And)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr, String> {
        self.parse_binop_level(
            &[(Token::Shl, BinOp::Shl), (Token::Shr, BinOp::Shr)],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr, String> {
        self.parse_binop_level(
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, String> {
        self.parse_binop_level(
            &[
                (Token::Star, BinOp::Mul),
                (Token::Slash, BinOp::Div),
                (Token::Percent, BinOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_binop_level(
        &mut self,
        operators: &[(Token, BinOp)],
        mut next: impl FnMut(&mut Self) -> Result<Expr, String>,
    ) -> Result<Expr, String> {
        let mut expr = next(self)?;
        loop {
            let matched = operators
                .iter()
                .find(|(token, _)| self.peek() == Some(token))
                .map(|(_, op)| *op);
            match matched {
                Some(op) => {
                    self.bump();
                    let rhs = next(self)?;
                    expr = Expr::Binary(op, Box::new(expr), Box::new(rhs));
                }
                None => return Ok(expr),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            Some(Token::Tilde) => {
                self.bump();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, String> {
        match self.bump().cloned() {
            Some(Token::Number(value)) => Ok(Expr::Constant(value)),
            Some(Token::Char(value)) => Ok(Expr::Constant(value as i64)),
            Some(Token::Dot) => Ok(Expr::Location),
            Some(Token::Ident(name)) => Ok(Expr::Symbol(name)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(format!("expected an expression, found {other:?}")),
        }
    }
}
