//! # Row Filters
//!
//! Filtered updates, deletes and finds select rows with a [`Filter`]. A
//! filter is a tree of conditions over one table's [`Column`] enum, with
//! every value held as a bound [`SqlValue`].
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Builder                                                                │
//! │    Filter::lt(ProductColumn::Price, 10.0)                               │
//! │        .and(Filter::like(ProductColumn::Name, "Lamp%"))                 │
//! │                                                                         │
//! │  Raw predicate + positional parameters                                 │
//! │    Filter::<ProductColumn>::parse("price < ? AND name LIKE ?",          │
//! │                                   vec![10.0.into(), "Lamp%".into()])    │
//! │                                                                         │
//! │  Both produce the same tree. Rendering re-emits column names from the  │
//! │  enum and binds every value:                                           │
//! │                                                                         │
//! │    (price < ? AND name LIKE ?)      params: [10.0, "Lamp%"]            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Accepted Predicate Grammar
//! ```text
//! expr      := and_expr ( OR and_expr )*
//! and_expr  := unary ( AND unary )*
//! unary     := NOT unary | '(' expr ')' | condition
//! condition := column ( cmp '?'
//!                     | [NOT] LIKE '?'
//!                     | IS [NOT] NULL
//!                     | [NOT] IN '(' '?' ( ',' '?' )* ')' )
//! cmp       := '=' | '==' | '!=' | '<>' | '<' | '<=' | '>' | '>='
//! ```
//! Keywords are case-insensitive. Literals, functions, sub-queries,
//! comments and statement separators are rejected, as is any column not
//! in the table's enum.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::column::Column;
use crate::error::{ValidationError, ValidationResult};
use crate::value::SqlValue;

/// Parentheses / NOT nesting allowed in a parsed predicate.
const MAX_DEPTH: usize = 64;

// =============================================================================
// Predicate Tree
// =============================================================================

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Like => "LIKE",
        }
    }
}

/// One node of a filter.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate<C> {
    Compare { column: C, op: CompareOp, value: SqlValue },
    IsNull { column: C, negated: bool },
    In { column: C, values: Vec<SqlValue>, negated: bool },
    Not(Box<Predicate<C>>),
    And(Vec<Predicate<C>>),
    Or(Vec<Predicate<C>>),
}

/// Destination for rendered SQL.
///
/// The database layer implements this over `sqlx::QueryBuilder`;
/// [`RenderedSql`] implements it with `?` placeholders.
pub trait SqlWriter {
    /// Appends trusted SQL text.
    fn push_sql(&mut self, sql: &str);

    /// Appends a placeholder bound to `value`.
    fn push_value(&mut self, value: &SqlValue);
}

impl<C: Column> Predicate<C> {
    /// Rejects `And`/`Or` nodes without operands, at any depth.
    ///
    /// An empty group has no SQL form; `()` is not a valid expression.
    pub fn check(&self) -> ValidationResult<()> {
        match self {
            Predicate::And(parts) | Predicate::Or(parts) if parts.is_empty() => {
                Err(ValidationError::EmptyGroup)
            }
            Predicate::And(parts) | Predicate::Or(parts) => parts.iter().try_for_each(Predicate::check),
            Predicate::Not(inner) => inner.check(),
            _ => Ok(()),
        }
    }

    /// Writes this predicate to `out`.
    pub fn render<W: SqlWriter + ?Sized>(&self, out: &mut W) {
        match self {
            Predicate::Compare { column, op, value } => {
                out.push_sql(column.name());
                out.push_sql(" ");
                out.push_sql(op.as_sql());
                out.push_sql(" ");
                out.push_value(value);
            }
            Predicate::IsNull { column, negated } => {
                out.push_sql(column.name());
                out.push_sql(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Predicate::In { values, negated, .. } if values.is_empty() => {
                // x IN () matches nothing; x NOT IN () matches everything.
                out.push_sql(if *negated { "1" } else { "0" });
            }
            Predicate::In {
                column,
                values,
                negated,
            } => {
                out.push_sql(column.name());
                out.push_sql(if *negated { " NOT IN (" } else { " IN (" });
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_sql(", ");
                    }
                    out.push_value(value);
                }
                out.push_sql(")");
            }
            Predicate::Not(inner) => {
                out.push_sql("NOT (");
                inner.render(out);
                out.push_sql(")");
            }
            Predicate::And(parts) => render_joined(parts, " AND ", out),
            Predicate::Or(parts) => render_joined(parts, " OR ", out),
        }
    }
}

fn render_joined<C: Column, W: SqlWriter + ?Sized>(parts: &[Predicate<C>], sep: &str, out: &mut W) {
    out.push_sql("(");
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push_sql(sep);
        }
        part.render(out);
    }
    out.push_sql(")");
}

/// SQL text with `?` placeholders and the values to bind, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlWriter for RenderedSql {
    fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    fn push_value(&mut self, value: &SqlValue) {
        self.sql.push('?');
        self.params.push(value.clone());
    }
}

// =============================================================================
// Filter
// =============================================================================

/// A row filter over the columns `C`.
///
/// An empty filter (no conditions) is representable so that filters can
/// be assembled incrementally, but the database layer refuses to run a
/// filtered update or delete with one.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter<C> {
    predicate: Option<Predicate<C>>,
}

impl<C: Column> Default for Filter<C> {
    fn default() -> Self {
        Filter { predicate: None }
    }
}

impl<C: Column> From<Predicate<C>> for Filter<C> {
    fn from(predicate: Predicate<C>) -> Self {
        Filter {
            predicate: Some(predicate),
        }
    }
}

impl<C: Column> Filter<C> {
    /// A filter with no conditions.
    pub fn new() -> Self {
        Self::default()
    }

    fn compare(column: C, op: CompareOp, value: SqlValue) -> Self {
        // `= NULL` never matches in SQL; use IS [NOT] NULL instead.
        let predicate = match (op, value.is_null()) {
            (CompareOp::Eq, true) => Predicate::IsNull {
                column,
                negated: false,
            },
            (CompareOp::Ne, true) => Predicate::IsNull {
                column,
                negated: true,
            },
            _ => Predicate::Compare { column, op, value },
        };
        predicate.into()
    }

    /// Matches the row whose primary key is `id`.
    pub fn by_id(id: i64) -> Self {
        Self::eq(C::primary_key(), id)
    }

    pub fn eq(column: C, value: impl Into<SqlValue>) -> Self {
        Self::compare(column, CompareOp::Eq, value.into())
    }

    pub fn ne(column: C, value: impl Into<SqlValue>) -> Self {
        Self::compare(column, CompareOp::Ne, value.into())
    }

    pub fn lt(column: C, value: impl Into<SqlValue>) -> Self {
        Self::compare(column, CompareOp::Lt, value.into())
    }

    pub fn le(column: C, value: impl Into<SqlValue>) -> Self {
        Self::compare(column, CompareOp::Le, value.into())
    }

    pub fn gt(column: C, value: impl Into<SqlValue>) -> Self {
        Self::compare(column, CompareOp::Gt, value.into())
    }

    pub fn ge(column: C, value: impl Into<SqlValue>) -> Self {
        Self::compare(column, CompareOp::Ge, value.into())
    }

    pub fn like(column: C, pattern: impl Into<SqlValue>) -> Self {
        Self::compare(column, CompareOp::Like, pattern.into())
    }

    pub fn is_null(column: C) -> Self {
        Predicate::IsNull {
            column,
            negated: false,
        }
        .into()
    }

    pub fn is_not_null(column: C) -> Self {
        Predicate::IsNull {
            column,
            negated: true,
        }
        .into()
    }

    pub fn in_list<I, V>(column: C, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        Predicate::In {
            column,
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
        .into()
    }

    /// Both filters must match. An empty side is ignored.
    pub fn and(self, other: Filter<C>) -> Self {
        self.combine(other, true)
    }

    /// Either filter may match. An empty side is ignored.
    pub fn or(self, other: Filter<C>) -> Self {
        self.combine(other, false)
    }

    /// Negates the filter. Negating an empty filter leaves it empty.
    pub fn not(self) -> Self {
        Filter {
            predicate: self.predicate.map(|p| Predicate::Not(Box::new(p))),
        }
    }

    fn combine(self, other: Filter<C>, conjunction: bool) -> Self {
        let predicate = match (self.predicate, other.predicate) {
            (None, p) | (p, None) => p,
            (Some(a), Some(b)) => Some(match (a, conjunction) {
                // Flatten chains so `a AND b AND c` renders without nesting.
                (Predicate::And(mut parts), true) => {
                    parts.push(b);
                    Predicate::And(parts)
                }
                (Predicate::Or(mut parts), false) => {
                    parts.push(b);
                    Predicate::Or(parts)
                }
                (a, true) => Predicate::And(vec![a, b]),
                (a, false) => Predicate::Or(vec![a, b]),
            }),
        };
        Filter { predicate }
    }

    /// Returns true when the filter has no conditions.
    pub fn is_empty(&self) -> bool {
        self.predicate.is_none()
    }

    /// The root predicate, if any.
    pub fn predicate(&self) -> Option<&Predicate<C>> {
        self.predicate.as_ref()
    }

    /// The root predicate after [`Predicate::check`]. `None` matches every
    /// row.
    pub fn checked_predicate(&self) -> ValidationResult<Option<&Predicate<C>>> {
        if let Some(p) = &self.predicate {
            p.check()?;
        }
        Ok(self.predicate.as_ref())
    }

    /// Returns the root predicate, or [`ValidationError::EmptyFilter`].
    pub fn require_predicate(&self) -> ValidationResult<&Predicate<C>> {
        self.checked_predicate()?.ok_or(ValidationError::EmptyFilter)
    }

    /// Renders the filter with `?` placeholders.
    pub fn to_sql(&self) -> RenderedSql {
        let mut out = RenderedSql::default();
        if let Some(p) = &self.predicate {
            p.render(&mut out);
        }
        out
    }

    /// Parses a raw predicate fragment over this table's columns.
    ///
    /// `params` are bound to the `?` placeholders left to right.
    ///
    /// ## Example
    /// ```rust
    /// use mercado_core::{Filter, ProductColumn};
    ///
    /// let f = Filter::<ProductColumn>::parse(
    ///     "price >= ? and description is not null",
    ///     vec![5.0.into()],
    /// ).unwrap();
    /// assert_eq!(f.to_sql().sql, "(price >= ? AND description IS NOT NULL)");
    ///
    /// // Structure other than columns, operators and placeholders is refused.
    /// assert!(Filter::<ProductColumn>::parse("1 = 1", vec![]).is_err());
    /// assert!(Filter::<ProductColumn>::parse("price > ?; DROP TABLE products", vec![1.0.into()]).is_err());
    /// ```
    pub fn parse(predicate: &str, params: Vec<SqlValue>) -> ValidationResult<Self> {
        let tokens = tokenize(predicate)?;

        let placeholders = tokens
            .iter()
            .filter(|(_, t)| matches!(t, Token::Placeholder))
            .count();
        if placeholders != params.len() {
            return Err(ValidationError::ParameterCount {
                placeholders,
                params: params.len(),
            });
        }

        if tokens.is_empty() {
            return Ok(Filter::new());
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            end: predicate.len(),
            params: params.into_iter(),
            depth: 0,
            _column: std::marker::PhantomData,
        };
        let predicate = parser.expr()?;
        if let Some((offset, token)) = parser.tokens.get(parser.pos) {
            return Err(invalid(*offset, format!("unexpected {token}")));
        }
        Ok(predicate.into())
    }
}

// =============================================================================
// Lexer
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Placeholder,
    Op(CompareOp),
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(w) => write!(f, "'{w}'"),
            Token::Placeholder => f.write_str("'?'"),
            Token::Op(op) => write!(f, "'{}'", op.as_sql()),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn invalid(offset: usize, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidFilter {
        offset,
        reason: reason.into(),
    }
}

fn tokenize(input: &str) -> ValidationResult<Vec<(usize, Token)>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut word = String::new();
            while let Some(&(_, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push((offset, Token::Word(word)));
            continue;
        }

        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let token = match (c, next) {
            ('?', _) => Token::Placeholder,
            ('(', _) => Token::LParen,
            (')', _) => Token::RParen,
            (',', _) => Token::Comma,
            ('=', Some('=')) => {
                chars.next();
                Token::Op(CompareOp::Eq)
            }
            ('=', _) => Token::Op(CompareOp::Eq),
            ('!', Some('=')) => {
                chars.next();
                Token::Op(CompareOp::Ne)
            }
            ('<', Some('>')) => {
                chars.next();
                Token::Op(CompareOp::Ne)
            }
            ('<', Some('=')) => {
                chars.next();
                Token::Op(CompareOp::Le)
            }
            ('<', _) => Token::Op(CompareOp::Lt),
            ('>', Some('=')) => {
                chars.next();
                Token::Op(CompareOp::Ge)
            }
            ('>', _) => Token::Op(CompareOp::Gt),
            _ => return Err(invalid(offset, format!("unexpected character '{c}'"))),
        };
        tokens.push((offset, token));
    }

    Ok(tokens)
}

// =============================================================================
// Parser
// =============================================================================

struct Parser<C> {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
    params: std::vec::IntoIter<SqlValue>,
    depth: usize,
    _column: std::marker::PhantomData<C>,
}

impl<C: Column> Parser<C> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(o, _)| *o)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ValidationResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.unexpected(keyword))
        }
    }

    fn expect(&mut self, token: Token) -> ValidationResult<()> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(&token.to_string()))
        }
    }

    fn unexpected(&self, wanted: &str) -> ValidationError {
        let found = self
            .peek()
            .map_or_else(|| "end of input".to_string(), Token::to_string);
        invalid(self.offset(), format!("expected {wanted}, found {found}"))
    }

    fn placeholder(&mut self) -> ValidationResult<SqlValue> {
        self.expect(Token::Placeholder)?;
        // Counts were checked against the parameters before parsing.
        Ok(self.params.next().unwrap_or(SqlValue::Null))
    }

    fn descend(&mut self) -> ValidationResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(invalid(self.offset(), "predicate nested too deeply"));
        }
        Ok(())
    }

    fn expr(&mut self) -> ValidationResult<Predicate<C>> {
        let mut parts = vec![self.and_expr()?];
        while self.eat_keyword("OR") {
            parts.push(self.and_expr()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::Or(parts)
        })
    }

    fn and_expr(&mut self) -> ValidationResult<Predicate<C>> {
        let mut parts = vec![self.unary()?];
        while self.eat_keyword("AND") {
            parts.push(self.unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Predicate::And(parts)
        })
    }

    fn unary(&mut self) -> ValidationResult<Predicate<C>> {
        if self.eat_keyword("NOT") {
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Predicate::Not(Box::new(inner)));
        }

        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            self.descend()?;
            let inner = self.expr()?;
            self.expect(Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }

        self.condition()
    }

    fn condition(&mut self) -> ValidationResult<Predicate<C>> {
        let offset = self.offset();
        let column = match self.next() {
            Some(Token::Word(name)) => C::from_name(&name).ok_or(ValidationError::UnknownColumn {
                table: C::TABLE,
                column: name,
            })?,
            Some(other) => return Err(invalid(offset, format!("expected column, found {other}"))),
            None => return Err(invalid(offset, "expected column, found end of input")),
        };

        if let Some(Token::Op(op)) = self.peek().cloned() {
            self.pos += 1;
            let value = self.placeholder()?;
            return Ok(Predicate::Compare { column, op, value });
        }

        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            self.expect_keyword("NULL")?;
            return Ok(Predicate::IsNull { column, negated });
        }

        let negated = self.eat_keyword("NOT");

        if self.eat_keyword("LIKE") {
            let value = self.placeholder()?;
            let like = Predicate::Compare {
                column,
                op: CompareOp::Like,
                value,
            };
            return Ok(if negated {
                Predicate::Not(Box::new(like))
            } else {
                like
            });
        }

        if self.eat_keyword("IN") {
            self.expect(Token::LParen)?;
            let mut values = vec![self.placeholder()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                values.push(self.placeholder()?);
            }
            self.expect(Token::RParen)?;
            return Ok(Predicate::In {
                column,
                values,
                negated,
            });
        }

        Err(self.unexpected(if negated {
            "LIKE or IN"
        } else {
            "operator"
        }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
