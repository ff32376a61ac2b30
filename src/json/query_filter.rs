//! Query filter expressions.
//!
//! # Syntax
//! ```text
//! Expr    := OrExpr
//! OrExpr  := AndExpr ( 'or' AndExpr )*
//! AndExpr := NotExpr ( 'and' NotExpr )*
//! NotExpr := '!' PrimaryExpr | PrimaryExpr
//! PrimaryExpr := '(' Expr ')' | 'true' | 'false'
//!              | Pointer 'pr'
//!              | Pointer Op Value
//! Op      := 'eq' | 'co' | 'sw' | 'gt' | 'ge' | 'lt' | 'le' | [a-zA-Z_0-9.]+
//! Value   := '"' string '"' | "'" string "'" | number | 'true' | 'false'
//! ```
//! Keywords and operators are case-insensitive.

use std::fmt;

use serde_json::{Number, Value};

use crate::error::{ResourceError, ResourceResult};
use crate::json::JsonPointer;

const MAX_DEPTH: usize = 256;

/// A typed predicate tree over JSON pointers.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    And(Vec<QueryFilter>),
    Or(Vec<QueryFilter>),
    Not(Box<QueryFilter>),
    BooleanLiteral(bool),
    Equals { field: JsonPointer, value: Value },
    Contains { field: JsonPointer, value: Value },
    StartsWith { field: JsonPointer, value: Value },
    GreaterThan { field: JsonPointer, value: Value },
    GreaterThanOrEqual { field: JsonPointer, value: Value },
    LessThan { field: JsonPointer, value: Value },
    LessThanOrEqual { field: JsonPointer, value: Value },
    Present { field: JsonPointer },
    ExtendedMatch {
        field: JsonPointer,
        operator: String,
        value: Value,
    },
}

impl QueryFilter {
    pub fn always_true() -> Self {
        Self::BooleanLiteral(true)
    }

    pub fn always_false() -> Self {
        Self::BooleanLiteral(false)
    }

    pub fn and(filters: Vec<QueryFilter>) -> Self {
        Self::And(filters)
    }

    pub fn or(filters: Vec<QueryFilter>) -> Self {
        Self::Or(filters)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: QueryFilter) -> Self {
        Self::Not(Box::new(filter))
    }

    pub fn equal_to(field: impl Into<JsonPointer>, value: impl Into<Value>) -> Self {
        Self::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn present(field: impl Into<JsonPointer>) -> Self {
        Self::Present { field: field.into() }
    }

    /// Build the comparison named by `operator` (`eq`, `co`, `sw`, `gt`,
    /// `ge`, `lt`, `le`, or an extended operator name).
    pub fn comparison(
        field: impl Into<JsonPointer>,
        operator: &str,
        value: impl Into<Value>,
    ) -> ResourceResult<Self> {
        let field = field.into();
        let value = value.into();
        let filter = match operator.to_ascii_lowercase().as_str() {
            "eq" => Self::Equals { field, value },
            "co" => Self::Contains { field, value },
            "sw" => Self::StartsWith { field, value },
            "gt" => Self::GreaterThan { field, value },
            "ge" => Self::GreaterThanOrEqual { field, value },
            "lt" => Self::LessThan { field, value },
            "le" => Self::LessThanOrEqual { field, value },
            _ if is_extended_operator(operator) => Self::ExtendedMatch {
                field,
                operator: operator.to_string(),
                value,
            },
            _ => {
                return Err(ResourceError::BadRequest(format!(
                    "\"{operator}\" is not a valid filter operator"
                )))
            }
        };
        Ok(filter)
    }

    /// Parse the string form of a filter.
    pub fn parse(filter: &str) -> ResourceResult<Self> {
        let tokens = tokenize(filter)?;
        let mut parser = Parser {
            source: filter,
            tokens,
            pos: 0,
        };
        let result = parser.or_expr(0)?;
        if parser.pos < parser.tokens.len() {
            return Err(parser.invalid());
        }
        Ok(result)
    }
}

fn is_extended_operator(operator: &str) -> bool {
    !operator.is_empty()
        && operator
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Word(String),
    Quoted(String),
}

fn tokenize(source: &str) -> ResourceResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ' ' => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some(c2) = chars.next() {
                    if c2 == '\\' {
                        match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => {
                                return Err(ResourceError::BadRequest(
                                    "The filter string cannot end with an escape character".into(),
                                ))
                            }
                        }
                    } else if c2 == c {
                        closed = true;
                        break;
                    } else {
                        value.push(c2);
                    }
                }
                if !closed {
                    return Err(invalid_filter(source));
                }
                tokens.push(Token::Quoted(value));
            }
            _ => {
                let mut word = String::new();
                while let Some(&c2) = chars.peek() {
                    if c2 == '(' || c2 == ')' || c2 == ' ' {
                        break;
                    }
                    word.push(c2);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

fn invalid_filter(source: &str) -> ResourceError {
    ResourceError::BadRequest(format!("Invalid query filter '{source}'"))
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn invalid(&self) -> ResourceError {
        invalid_filter(self.source)
    }

    fn check_depth(&self, depth: usize) -> ResourceResult<()> {
        if depth > MAX_DEPTH {
            return Err(ResourceError::BadRequest(format!(
                "The query filter '{}' cannot be parsed because it contains more than {} nested expressions",
                self.source, MAX_DEPTH
            )));
        }
        Ok(())
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.tokens.get(self.pos), Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword))
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn or_expr(&mut self, depth: usize) -> ResourceResult<QueryFilter> {
        self.check_depth(depth)?;
        let mut filters = vec![self.and_expr(depth + 1)?];
        while self.peek_keyword("or") {
            self.pos += 1;
            filters.push(self.and_expr(depth + 1)?);
        }
        Ok(collapse(filters, QueryFilter::Or))
    }

    fn and_expr(&mut self, depth: usize) -> ResourceResult<QueryFilter> {
        self.check_depth(depth)?;
        let mut filters = vec![self.not_expr(depth + 1)?];
        while self.peek_keyword("and") {
            self.pos += 1;
            filters.push(self.not_expr(depth + 1)?);
        }
        Ok(collapse(filters, QueryFilter::And))
    }

    fn not_expr(&mut self, depth: usize) -> ResourceResult<QueryFilter> {
        self.check_depth(depth)?;
        if self.peek_keyword("!") || self.peek_keyword("nt") {
            self.pos += 1;
            Ok(QueryFilter::not(self.primary_expr(depth + 1)?))
        } else {
            self.primary_expr(depth + 1)
        }
    }

    fn primary_expr(&mut self, depth: usize) -> ResourceResult<QueryFilter> {
        self.check_depth(depth)?;
        match self.next() {
            Some(Token::Open) => {
                let filter = self.or_expr(depth + 1)?;
                match self.next() {
                    Some(Token::Close) => Ok(filter),
                    _ => Err(self.invalid()),
                }
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("true") => Ok(QueryFilter::always_true()),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("false") => Ok(QueryFilter::always_false()),
            Some(Token::Word(field)) => {
                let field = JsonPointer::parse(&field);
                let Some(Token::Word(operator)) = self.next() else {
                    return Err(self.invalid());
                };
                if operator.eq_ignore_ascii_case("pr") {
                    return Ok(QueryFilter::Present { field });
                }
                let value = match self.next() {
                    Some(Token::Quoted(s)) => Value::String(s),
                    Some(Token::Word(w)) => self.literal(&w)?,
                    _ => return Err(self.invalid()),
                };
                QueryFilter::comparison(field, &operator, value).map_err(|_| self.invalid())
            }
            _ => Err(self.invalid()),
        }
    }

    fn literal(&self, word: &str) -> ResourceResult<Value> {
        if word.eq_ignore_ascii_case("true") {
            return Ok(Value::Bool(true));
        }
        if word.eq_ignore_ascii_case("false") {
            return Ok(Value::Bool(false));
        }
        if word.contains('.') {
            return word
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| self.invalid());
        }
        word.parse::<i64>()
            .map(Value::from)
            .map_err(|_| self.invalid())
    }
}

fn collapse(mut filters: Vec<QueryFilter>, wrap: fn(Vec<QueryFilter>) -> QueryFilter) -> QueryFilter {
    if filters.len() == 1 {
        filters.remove(0)
    } else {
        wrap(filters)
    }
}

impl fmt::Display for QueryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryFilter::And(filters) => write_composite(f, " and ", filters),
            QueryFilter::Or(filters) => write_composite(f, " or ", filters),
            QueryFilter::Not(inner) => write!(f, "! ({inner})"),
            QueryFilter::BooleanLiteral(b) => write!(f, "{b}"),
            QueryFilter::Equals { field, value } => write_assertion(f, field, "eq", value),
            QueryFilter::Contains { field, value } => write_assertion(f, field, "co", value),
            QueryFilter::StartsWith { field, value } => write_assertion(f, field, "sw", value),
            QueryFilter::GreaterThan { field, value } => write_assertion(f, field, "gt", value),
            QueryFilter::GreaterThanOrEqual { field, value } => write_assertion(f, field, "ge", value),
            QueryFilter::LessThan { field, value } => write_assertion(f, field, "lt", value),
            QueryFilter::LessThanOrEqual { field, value } => write_assertion(f, field, "le", value),
            QueryFilter::Present { field } => write!(f, "{field} pr"),
            QueryFilter::ExtendedMatch {
                field,
                operator,
                value,
            } => write_assertion(f, field, operator, value),
        }
    }
}

fn write_composite(f: &mut fmt::Formatter<'_>, op: &str, filters: &[QueryFilter]) -> fmt::Result {
    f.write_str("(")?;
    for (i, filter) in filters.iter().enumerate() {
        if i > 0 {
            f.write_str(op)?;
        }
        write!(f, "{filter}")?;
    }
    f.write_str(")")
}

fn write_assertion(
    f: &mut fmt::Formatter<'_>,
    field: &JsonPointer,
    op: &str,
    value: &Value,
) -> fmt::Result {
    match value {
        Value::Bool(_) | Value::Number(_) => write!(f, "{field} {op} {value}"),
        Value::String(s) => write!(
            f,
            "{field} {op} \"{}\"",
            s.replace('\\', "\\\\").replace('"', "\\\"")
        ),
        other => write!(f, "{field} {op} \"{other}\""),
    }
}
