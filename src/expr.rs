//! Restricted arithmetic expressions over positional indicator inputs.
//!
//! Formulas stored in batch configuration are parsed once into an AST
//! supporting `+ - * /`, parentheses, unary minus, numeric literals and
//! positional variables `node_id1`, `node_id2`, ... Nothing else evaluates;
//! stored configuration never reaches a general-purpose interpreter.

use crate::error::{Result, StatGraphError};
use regex::Regex;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    /// Zero-based input position (`node_id1` parses to `Var(0)`).
    Var(usize),
    Neg(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Parse a formula. Syntax errors are fatal for the whole derived-node
    /// operation, so they surface here, before any cell is evaluated.
    pub fn parse(input: &str) -> Result<Expr> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(StatGraphError::Formula("Empty formula".to_string()));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expression()?;
        if parser.pos != parser.tokens.len() {
            return Err(StatGraphError::Formula(format!(
                "Unexpected trailing input in formula '{}'",
                input
            )));
        }
        Ok(expr)
    }

    /// Zero-based input positions referenced by the expression.
    pub fn variables(&self) -> BTreeSet<usize> {
        let mut vars = BTreeSet::new();
        self.collect_variables(&mut vars);
        vars
    }

    fn collect_variables(&self, vars: &mut BTreeSet<usize>) {
        match self {
            Expr::Num(_) => {}
            Expr::Var(i) => {
                vars.insert(*i);
            }
            Expr::Neg(e) => e.collect_variables(vars),
            Expr::Add(a, b) | Expr::Sub(a, b) | Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_variables(vars);
                b.collect_variables(vars);
            }
        }
    }

    /// Number of inputs the expression requires (highest position + 1).
    pub fn arity(&self) -> usize {
        self.variables().iter().max().map(|i| i + 1).unwrap_or(0)
    }

    /// Evaluate against substituted input values.
    ///
    /// Any division whose divisor comes out exactly zero makes the whole
    /// cell missing instead of producing an infinity that would be written
    /// to the store.
    pub fn eval(&self, vars: &[f64]) -> Option<f64> {
        match self {
            Expr::Num(v) => Some(*v),
            Expr::Var(i) => vars.get(*i).copied(),
            Expr::Neg(e) => e.eval(vars).map(|v| -v),
            Expr::Add(a, b) => Some(a.eval(vars)? + b.eval(vars)?),
            Expr::Sub(a, b) => Some(a.eval(vars)? - b.eval(vars)?),
            Expr::Mul(a, b) => Some(a.eval(vars)? * b.eval(vars)?),
            Expr::Div(a, b) => {
                let numerator = a.eval(vars)?;
                let divisor = b.eval(vars)?;
                if divisor == 0.0 {
                    None
                } else {
                    Some(numerator / divisor)
                }
            }
        }
    }
}

/// Identifier tokens referenced in a raw formula string.
///
/// Binding is strictly positional; this exists for validation and logging
/// only.
pub fn referenced_variables(formula: &str) -> Vec<String> {
    let pattern = Regex::new(r"\bnode_id\d+\b").unwrap();
    pattern
        .find_iter(formula)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Var(usize),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.' || chars[i] == ',') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect::<String>().replace(',', ".");
                let value = literal.parse::<f64>().map_err(|_| {
                    StatGraphError::Formula(format!("Invalid number '{}' in formula", literal))
                })?;
                tokens.push(Token::Num(value));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let position = ident
                    .strip_prefix("node_id")
                    .and_then(|suffix| suffix.parse::<usize>().ok())
                    .filter(|n| *n >= 1)
                    .ok_or_else(|| {
                        StatGraphError::Formula(format!(
                            "Unknown identifier '{}'; only node_id<N> variables are allowed",
                            ident
                        ))
                    })?;
                tokens.push(Token::Var(position - 1));
            }
            other => {
                return Err(StatGraphError::Formula(format!(
                    "Unexpected character '{}' in formula",
                    other
                )));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // expression := term (('+' | '-') term)*
    fn expression(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.advance();
                    let right = self.term()?;
                    left = Expr::Add(Box::new(left), Box::new(right));
                }
                Token::Minus => {
                    self.advance();
                    let right = self.term()?;
                    left = Expr::Sub(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term := factor (('*' | '/') factor)*
    fn term(&mut self) -> Result<Expr> {
        let mut left = self.factor()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.advance();
                    let right = self.factor()?;
                    left = Expr::Mul(Box::new(left), Box::new(right));
                }
                Token::Slash => {
                    self.advance();
                    let right = self.factor()?;
                    left = Expr::Div(Box::new(left), Box::new(right));
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // factor := '-' factor | '(' expression ')' | number | variable
    fn factor(&mut self) -> Result<Expr> {
        match self.advance() {
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.factor()?))),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(StatGraphError::Formula(
                        "Unbalanced parenthesis in formula".to_string(),
                    )),
                }
            }
            Some(Token::Num(v)) => Ok(Expr::Num(v)),
            Some(Token::Var(i)) => Ok(Expr::Var(i)),
            other => Err(StatGraphError::Formula(format!(
                "Expected operand, found {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_eval_precedence() {
        let expr = Expr::parse("node_id1 + node_id2 * 2").unwrap();
        assert_eq!(expr.eval(&[1.0, 3.0]), Some(7.0));
    }

    #[test]
    fn test_parentheses_override_precedence() {
        let expr = Expr::parse("(node_id1 + node_id2) * 2").unwrap();
        assert_eq!(expr.eval(&[1.0, 3.0]), Some(8.0));
    }

    #[test]
    fn test_unary_minus() {
        let expr = Expr::parse("-node_id1 + 10").unwrap();
        assert_eq!(expr.eval(&[4.0]), Some(6.0));
    }

    #[test]
    fn test_division_by_zero_is_missing() {
        let expr = Expr::parse("node_id1 / node_id2").unwrap();
        assert_eq!(expr.eval(&[10.0, 0.0]), None);
        assert_eq!(expr.eval(&[10.0, 4.0]), Some(2.5));
    }

    #[test]
    fn test_nested_division_by_zero_is_missing() {
        let expr = Expr::parse("node_id1 / (node_id2 - node_id3)").unwrap();
        assert_eq!(expr.eval(&[10.0, 5.0, 5.0]), None);
    }

    #[test]
    fn test_decimal_comma_literal() {
        let expr = Expr::parse("node_id1 * 0,5").unwrap();
        assert_eq!(expr.eval(&[8.0]), Some(4.0));
    }

    #[test]
    fn test_syntax_errors_rejected() {
        assert!(Expr::parse("").is_err());
        assert!(Expr::parse("node_id1 +").is_err());
        assert!(Expr::parse("node_id1 ** node_id2").is_err());
        assert!(Expr::parse("(node_id1 + node_id2").is_err());
        assert!(Expr::parse("node_id1 ^ 2").is_err());
    }

    #[test]
    fn test_unknown_identifiers_rejected() {
        assert!(Expr::parse("import_os").is_err());
        assert!(Expr::parse("node_id0").is_err());
        assert!(Expr::parse("x + y").is_err());
    }

    #[test]
    fn test_variable_discovery() {
        let expr = Expr::parse("node_id2 / (node_id1 + node_id2)").unwrap();
        let vars: Vec<usize> = expr.variables().into_iter().collect();
        assert_eq!(vars, vec![0, 1]);
        assert_eq!(expr.arity(), 2);
    }

    #[test]
    fn test_referenced_variables_helper() {
        let names = referenced_variables("node_id1 / node_id2 + node_id10");
        assert_eq!(names, vec!["node_id1", "node_id2", "node_id10"]);
    }

    #[test]
    fn test_constant_expression() {
        let expr = Expr::parse("100 / 4").unwrap();
        assert_eq!(expr.arity(), 0);
        assert_eq!(expr.eval(&[]), Some(25.0));
    }
}
