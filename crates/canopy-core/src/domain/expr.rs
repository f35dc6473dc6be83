//! Filter expressions over record columns.
//!
//! Grammar (keywords and column names are case-insensitive):
//!
//! ```text
//! expr    := or
//! or      := and (("or" | "|" | "||") and)*
//! and     := unary (("and" | "&" | "&&") unary)*
//! unary   := ("not" | "!") unary | atom
//! atom    := "(" expr ")"
//!          | column op literal | literal op column
//!          | column ["not"] "in" "(" literal ("," literal)* ")"
//!          | column "is" ["not"] "null"
//! op      := "==" | "=" | "!=" | "<>" | "<" | "<=" | ">" | ">="
//! literal := number | 'text' | "text" | true | false | null
//! ```
//!
//! Evaluation is three-valued: a comparison involving a null is unknown,
//! `not` keeps it unknown, `and`/`or` follow Kleene logic, and a record
//! whose filter ends up unknown does not match.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use crate::error::{EstimationError, Result};
use crate::tables::Record;
use crate::value::Value;

// ── Tokens ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Text(String),
    Bool(bool),
    Op(CmpOp),
    And,
    Or,
    Not,
    In,
    Is,
    Null,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Operator with its operands swapped (`a < b` ⇔ `b > a`).
    fn flipped(self) -> Self {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            other => other,
        }
    }

    fn holds(self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        };
        f.write_str(s)
    }
}

fn tokenize(src: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = src.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '&' | '|' => {
                chars.next();
                if chars.peek() == Some(&c) {
                    chars.next();
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                }
                tokens.push(Token::Op(CmpOp::Eq));
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Ne));
                } else {
                    tokens.push(Token::Not);
                }
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        chars.next();
                        tokens.push(Token::Op(CmpOp::Le));
                    }
                    Some('>') => {
                        chars.next();
                        tokens.push(Token::Op(CmpOp::Ne));
                    }
                    _ => tokens.push(Token::Op(CmpOp::Lt)),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Op(CmpOp::Ge));
                } else {
                    tokens.push(Token::Op(CmpOp::Gt));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => text.push(ch),
                        None => return Err(format!("unterminated string starting with {quote}")),
                    }
                }
                tokens.push(Token::Text(text));
            }
            c if c.is_ascii_digit() || c == '.' || c == '-' => {
                let mut num = String::new();
                num.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    let exponent_sign = (d == '+' || d == '-') && num.ends_with(['e', 'E']);
                    if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let v: f64 = num.parse().map_err(|_| format!("invalid number `{num}`"))?;
                tokens.push(Token::Number(v));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match word.to_ascii_lowercase().as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "in" => Token::In,
                    "is" => Token::Is,
                    "null" => Token::Null,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(word.to_ascii_uppercase()),
                });
            }
            other => return Err(format!("unexpected character `{other}`")),
        }
    }
    Ok(tokens)
}

// ── Syntax tree ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare { column: String, op: CmpOp, value: Value },
    In { column: String, values: Vec<Value>, negated: bool },
    IsNull { column: String, negated: bool },
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type ParseResult<T> = std::result::Result<T, String>;

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn eat(&mut self, want: &Token) -> bool {
        if self.peek() == Some(want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, want: Token, what: &str) -> ParseResult<()> {
        if self.eat(&want) {
            Ok(())
        } else {
            Err(format!("expected {what}"))
        }
    }

    fn parse_or(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expr> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        match self.next() {
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::Ident(column)) => self.parse_predicate(column),
            Some(tok) => {
                // literal op column
                let value = literal(tok)?;
                let op = match self.next() {
                    Some(Token::Op(op)) => op,
                    _ => return Err("expected comparison operator".into()),
                };
                match self.next() {
                    Some(Token::Ident(column)) => Ok(Expr::Compare { column, op: op.flipped(), value }),
                    _ => Err("expected column name".into()),
                }
            }
            None => Err("unexpected end of expression".into()),
        }
    }

    fn parse_predicate(&mut self, column: String) -> ParseResult<Expr> {
        match self.next() {
            Some(Token::Op(op)) => {
                let value = match self.next() {
                    Some(tok) => literal(tok)?,
                    None => return Err(format!("missing value after `{column} {op}`")),
                };
                Ok(Expr::Compare { column, op, value })
            }
            Some(Token::Is) => {
                let negated = self.eat(&Token::Not);
                self.expect(Token::Null, "`null` after `is`")?;
                Ok(Expr::IsNull { column, negated })
            }
            Some(Token::Not) => {
                self.expect(Token::In, "`in` after `not`")?;
                let values = self.parse_list()?;
                Ok(Expr::In { column, values, negated: true })
            }
            Some(Token::In) => {
                let values = self.parse_list()?;
                Ok(Expr::In { column, values, negated: false })
            }
            _ => Err(format!("expected operator after column `{column}`")),
        }
    }

    fn parse_list(&mut self) -> ParseResult<Vec<Value>> {
        self.expect(Token::LParen, "`(` to open value list")?;
        let mut values = Vec::new();
        loop {
            match self.next() {
                Some(tok) => values.push(literal(tok)?),
                None => return Err("unterminated value list".into()),
            }
            if self.eat(&Token::RParen) {
                break;
            }
            self.expect(Token::Comma, "`,` or `)` in value list")?;
        }
        Ok(values)
    }
}

fn literal(tok: Token) -> ParseResult<Value> {
    match tok {
        Token::Number(v) => Ok(Value::Number(v)),
        Token::Text(s) => Ok(Value::Text(s)),
        Token::Bool(b) => Ok(Value::Bool(b)),
        Token::Null => Ok(Value::Null),
        other => Err(format!("expected literal, found {other:?}")),
    }
}

impl Expr {
    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
            Expr::Not(e) => e.collect_columns(out),
            Expr::Compare { column, .. } | Expr::In { column, .. } | Expr::IsNull { column, .. } => {
                out.insert(column.clone());
            }
        }
    }

    /// `None` is the unknown truth value.
    fn eval<R: Record + ?Sized>(&self, record: &R) -> Option<bool> {
        let get = |column: &str| record.column(column).unwrap_or(Value::Null);
        match self {
            Expr::And(a, b) => match (a.eval(record), b.eval(record)) {
                (Some(false), _) | (_, Some(false)) => Some(false),
                (Some(true), Some(true)) => Some(true),
                _ => None,
            },
            Expr::Or(a, b) => match (a.eval(record), b.eval(record)) {
                (Some(true), _) | (_, Some(true)) => Some(true),
                (Some(false), Some(false)) => Some(false),
                _ => None,
            },
            Expr::Not(e) => e.eval(record).map(|v| !v),
            Expr::Compare { column, op, value } => compare(&get(column), value).map(|o| op.holds(o)),
            Expr::In { column, values, negated } => {
                let v = get(column);
                if v.is_null() {
                    return None;
                }
                let found = values
                    .iter()
                    .any(|candidate| compare(&v, candidate) == Some(Ordering::Equal));
                Some(found != *negated)
            }
            Expr::IsNull { column, negated } => Some(get(column).is_null() != *negated),
        }
    }
}

/// Ordering between two non-null values of the same kind.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// ── Public filter ────────────────────────────────────────────────────────────

/// A parsed filter expression, kept with its source text for error reports.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    source: String,
    root: Expr,
}

impl FilterExpr {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source).map_err(|e| EstimationError::expression(source, e))?;
        if tokens.is_empty() {
            return Err(EstimationError::expression(source, "empty expression"));
        }
        let mut parser = Parser { tokens, pos: 0 };
        let root = parser
            .parse_or()
            .map_err(|e| EstimationError::expression(source, e))?;
        if parser.pos < parser.tokens.len() {
            return Err(EstimationError::expression(
                source,
                format!("unexpected trailing input at token {}", parser.pos + 1),
            ));
        }
        Ok(Self { source: source.to_string(), root })
    }

    /// Parse and check every referenced column exists in `available`
    /// (upper-case names).
    pub fn parse_for(source: &str, available: &BTreeSet<String>, level: &str) -> Result<Self> {
        let expr = Self::parse(source)?;
        let missing: Vec<String> = expr
            .columns()
            .into_iter()
            .filter(|c| !available.contains(c))
            .collect();
        if !missing.is_empty() {
            return Err(EstimationError::expression(
                source,
                format!("unknown {level} column(s): {}", missing.join(", ")),
            ));
        }
        Ok(expr)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Expr {
        &self.root
    }

    /// Upper-case names of every column the expression references.
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.root.collect_columns(&mut out);
        out
    }

    pub fn matches<R: Record + ?Sized>(&self, record: &R) -> bool {
        self.root.eval(record).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct Row(BTreeMap<&'static str, Value>);

    impl Record for Row {
        fn column(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    fn row() -> Row {
        Row(BTreeMap::from([
            ("DIA", Value::Number(12.5)),
            ("SPCD", Value::Number(131.0)),
            ("STATUSCD", Value::Number(1.0)),
            ("COMPONENT", Value::from("SURVIVOR")),
            ("HT", Value::Null),
        ]))
    }

    fn check(src: &str) -> bool {
        FilterExpr::parse(src).unwrap().matches(&row())
    }

    #[test]
    fn comparisons() {
        assert!(check("DIA >= 12.5"));
        assert!(check("dia > 5 and statuscd == 1"));
        assert!(!check("DIA < 5.0"));
        assert!(check("SPCD = 131"));
        assert!(check("SPCD <> 110"));
        assert!(check("5 < DIA"));
    }

    #[test]
    fn boolean_structure_and_precedence() {
        // and binds tighter than or
        assert!(check("DIA < 5 or SPCD == 131 and STATUSCD == 1"));
        assert!(!check("(DIA < 5 or SPCD == 131) and STATUSCD == 2"));
        assert!(check("not DIA < 5"));
        assert!(check("!(SPCD == 110) & DIA > 1"));
        assert!(check("SPCD == 110 || DIA > 1"));
    }

    #[test]
    fn membership_and_nulls() {
        assert!(check("SPCD in (110, 131, 132)"));
        assert!(check("SPCD not in (110, 132)"));
        assert!(check("COMPONENT in ('SURVIVOR', \"INGROWTH\")"));
        assert!(check("HT is null"));
        assert!(check("DIA is not null"));
        assert!(!check("HT > 0"));
        assert!(!check("HT in (1, 2)"));
    }

    #[test]
    fn columns_are_collected_uppercase() {
        let f = FilterExpr::parse("dia > 5 and (spcd in (1) or Ht is null)").unwrap();
        let cols: Vec<String> = f.columns().into_iter().collect();
        assert_eq!(cols, vec!["DIA", "HT", "SPCD"]);
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for src in ["", "DIA >", "DIA >= 5 and", "(DIA > 5", "DIA ~ 5", "SPCD in 131", "'abc"] {
            let err = FilterExpr::parse(src).unwrap_err();
            assert!(
                matches!(err, EstimationError::DomainExpression { .. }),
                "{src} should fail"
            );
        }
    }

    #[test]
    fn unknown_columns_fail_validation() {
        let available: BTreeSet<String> = ["DIA".to_string()].into_iter().collect();
        assert!(FilterExpr::parse_for("DIA > 5", &available, "tree").is_ok());
        let err = FilterExpr::parse_for("DIA > 5 and HEIGHT > 3", &available, "tree").unwrap_err();
        match err {
            EstimationError::DomainExpression { reason, .. } => assert!(reason.contains("HEIGHT")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn negative_numbers_parse() {
        let f = FilterExpr::parse("DIA > -1").unwrap();
        assert!(f.matches(&row()));
    }

    #[test]
    fn signed_exponents_parse() {
        assert!(check("DIA > 1e-3"));
        assert!(check("DIA < 1.5E+2"));
        assert!(!check("DIA > 2e1"));
        assert!(FilterExpr::parse("DIA > 1e-").is_err());
    }

    #[test]
    fn negation_keeps_null_comparisons_unknown() {
        // HT is null in the test row; each pair must agree.
        for (negated, direct) in [
            ("not HT == 5", "HT != 5"),
            ("not HT > 5", "HT <= 5"),
            ("not HT < 5", "HT >= 5"),
            ("not HT in (5)", "HT not in (5)"),
            ("not (HT < 5)", "HT >= 5"),
        ] {
            assert!(!check(negated), "{negated} should not match");
            assert_eq!(check(negated), check(direct), "{negated} vs {direct}");
        }
        assert!(!check("not not HT > 5"));
    }

    #[test]
    fn unknown_combines_with_kleene_logic() {
        // unknown or true -> true; unknown and false -> false
        assert!(check("HT > 5 or DIA > 5"));
        assert!(check("not (HT > 5 and DIA < 5)"));
        // unknown and true -> unknown -> no match, also under not
        assert!(!check("HT > 5 and DIA > 5"));
        assert!(!check("not (HT > 5 and DIA > 5)"));
        assert!(!check("not (HT > 5 or DIA < 5)"));
        assert!(check("HT is null and not DIA < 5"));
    }
}
