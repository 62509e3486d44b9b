//! # Query Parser
//!
//! Recursive-descent parser for the supported SQL subset, plus parameter
//! binding.
//!
//! ```text
//! SELECT [TOP n] [VALUE] (* | expr [AS alias], ... | AGG(expr))
//! FROM source [[AS] alias]
//! [WHERE expr]
//! [ORDER BY path [ASC | DESC]]
//! ```

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{CosmosError, CosmosResult, ParameterFault};

use super::ast::{
    Aggregate, AggregateFunction, CompareOp, Expr, OrderBy, PathSegment, Projection, PropertyPath,
    SelectItem, SelectQuery, SortDirection, TypeCheck,
};
use super::lexer::{syntax_error, tokenize, Token};
use super::spec::SqlQuerySpec;

/// Keywords that belong to SQL features this engine does not execute
const UNSUPPORTED_KEYWORDS: &[&str] = &["DISTINCT", "JOIN", "GROUP", "OFFSET", "LIMIT", "IN", "LIKE", "BETWEEN"];

/// Words that cannot be used as a FROM alias
const RESERVED: &[&str] = &["SELECT", "FROM", "WHERE", "ORDER", "BY", "AND", "OR", "NOT", "AS", "TOP", "VALUE"];

/// Query with every placeholder bound to a value
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    pub query: SelectQuery,
    pub parameters: BTreeMap<String, Value>,
}

impl BoundQuery {
    /// Parse the text and check parameters against placeholders.
    ///
    /// Every placeholder must be bound and every binding must be used.
    pub fn bind(spec: &SqlQuerySpec) -> CosmosResult<Self> {
        let query = parse_query(&spec.query)?;

        let mut parameters = BTreeMap::new();
        for param in &spec.parameters {
            if parameters.insert(param.name.clone(), param.value.clone()).is_some() {
                return Err(CosmosError::bad_request(format!(
                    "parameter {} is bound more than once",
                    param.name
                )));
            }
        }

        let referenced = query.parameters();
        if let Some(name) = referenced.iter().find(|n| !parameters.contains_key(*n)) {
            return Err(CosmosError::UnboundParameter {
                name: name.clone(),
                fault: ParameterFault::MissingBinding,
            });
        }
        if let Some(name) = parameters.keys().find(|n| !referenced.contains(*n)) {
            return Err(CosmosError::UnboundParameter {
                name: name.clone(),
                fault: ParameterFault::NotReferenced,
            });
        }

        Ok(Self { query, parameters })
    }
}

/// Parse query text into a `SelectQuery`
pub fn parse_query(text: &str) -> CosmosResult<SelectQuery> {
    let tokens = tokenize(text)?;
    let mut parser = Parser { tokens, pos: 0 };
    let query = parser.select()?;
    if let Some(token) = parser.peek() {
        return Err(syntax_error(format!("unexpected trailing token {:?}", token)));
    }
    check_roots(&query)?;
    Ok(query)
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
        self.pos += 1;
        token
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(keyword))
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.at_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> CosmosResult<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(syntax_error(format!("expected {}", keyword)))
        }
    }

    fn expect(&mut self, expected: Token) -> CosmosResult<()> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            other => Err(syntax_error(format!("expected {:?}, found {:?}", expected, other))),
        }
    }

    fn check_unsupported(&self) -> CosmosResult<()> {
        if let Some(Token::Ident(word)) = self.peek() {
            if UNSUPPORTED_KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k)) {
                return Err(CosmosError::unsupported_query(format!(
                    "{} is not supported",
                    word.to_uppercase()
                )));
            }
        }
        Ok(())
    }

    fn select(&mut self) -> CosmosResult<SelectQuery> {
        self.expect_keyword("SELECT")?;

        let mut top = None;
        let mut value = false;
        loop {
            self.check_unsupported()?;
            if self.eat_keyword("TOP") {
                top = match self.advance() {
                    Some(Token::Number(Value::Number(n))) => n.as_u64().map(|n| n as usize),
                    _ => None,
                };
                if top.is_none() {
                    return Err(syntax_error("TOP requires a non-negative integer"));
                }
            } else if self.eat_keyword("VALUE") {
                value = true;
            } else {
                break;
            }
        }

        let projection = if value {
            match self.aggregate()? {
                Some(aggregate) => Projection::Aggregate(aggregate),
                None => Projection::Value(self.expr()?),
            }
        } else if self.peek() == Some(&Token::Star) {
            self.pos += 1;
            Projection::All
        } else {
            let mut items = vec![self.select_item()?];
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                items.push(self.select_item()?);
            }
            Projection::Items(items)
        };

        self.expect_keyword("FROM")?;
        let source = self.identifier()?;
        self.eat_keyword("AS");
        let alias = match self.peek() {
            Some(Token::Ident(word)) if !is_reserved(word) => {
                let word = word.clone();
                self.check_unsupported()?;
                self.pos += 1;
                word
            }
            _ => source.clone(),
        };

        self.check_unsupported()?;
        let filter = if self.eat_keyword("WHERE") {
            Some(self.expr()?)
        } else {
            None
        };

        self.check_unsupported()?;
        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let path = match self.operand()? {
                Expr::Path(path) => path,
                _ => return Err(syntax_error("ORDER BY requires a property path")),
            };
            let direction = if self.eat_keyword("DESC") {
                SortDirection::Desc
            } else {
                self.eat_keyword("ASC");
                SortDirection::Asc
            };
            if self.peek() == Some(&Token::Comma) {
                return Err(CosmosError::unsupported_query(
                    "ORDER BY on more than one property is not supported",
                ));
            }
            Some(OrderBy { path, direction })
        } else {
            None
        };

        self.check_unsupported()?;
        Ok(SelectQuery {
            top,
            projection,
            source,
            alias,
            filter,
            order_by,
        })
    }

    /// `AGG(expr)` directly after `SELECT VALUE`
    fn aggregate(&mut self) -> CosmosResult<Option<Aggregate>> {
        let function = match (self.peek(), self.tokens.get(self.pos + 1)) {
            (Some(Token::Ident(name)), Some(Token::LParen)) => AggregateFunction::from_function(name),
            _ => None,
        };
        let Some(function) = function else {
            return Ok(None);
        };

        self.pos += 1;
        self.expect(Token::LParen)?;
        let arg = self.expr()?;
        self.expect(Token::RParen)?;
        Ok(Some(Aggregate { function, arg }))
    }

    fn select_item(&mut self) -> CosmosResult<SelectItem> {
        let expr = self.expr()?;
        let alias = if self.eat_keyword("AS") {
            Some(self.identifier()?)
        } else {
            None
        };
        Ok(SelectItem { expr, alias })
    }

    fn identifier(&mut self) -> CosmosResult<String> {
        match self.advance() {
            Some(Token::Ident(name)) if !is_reserved(&name) => Ok(name),
            other => Err(syntax_error(format!("expected identifier, found {:?}", other))),
        }
    }

    fn expr(&mut self) -> CosmosResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("OR") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> CosmosResult<Expr> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("AND") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> CosmosResult<Expr> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.not_expr()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> CosmosResult<Expr> {
        let left = self.operand()?;
        self.check_unsupported()?;
        if let Some(Token::Compare(op)) = self.peek() {
            let op: CompareOp = *op;
            self.pos += 1;
            let right = self.operand()?;
            return Ok(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn operand(&mut self) -> CosmosResult<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(n)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Param(name)) => Ok(Expr::Parameter(name)),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(word)) => {
                if word.eq_ignore_ascii_case("true") {
                    return Ok(Expr::Literal(Value::Bool(true)));
                }
                if word.eq_ignore_ascii_case("false") {
                    return Ok(Expr::Literal(Value::Bool(false)));
                }
                if word.eq_ignore_ascii_case("null") {
                    return Ok(Expr::Literal(Value::Null));
                }
                if self.peek() == Some(&Token::LParen) {
                    return self.function(word);
                }
                if is_reserved(&word) {
                    return Err(syntax_error(format!("unexpected keyword {}", word)));
                }
                self.path(word)
            }
            other => Err(syntax_error(format!("unexpected token {:?}", other))),
        }
    }

    fn function(&mut self, name: String) -> CosmosResult<Expr> {
        if let Some(check) = TypeCheck::from_function(&name) {
            self.expect(Token::LParen)?;
            let arg = self.expr()?;
            self.expect(Token::RParen)?;
            return Ok(Expr::TypeCheck(check, Box::new(arg)));
        }
        if let Some(aggregate) = AggregateFunction::from_function(&name) {
            return Err(CosmosError::unsupported_query(format!(
                "{} is only supported as SELECT VALUE {}(...)",
                aggregate.name(),
                aggregate.name()
            )));
        }
        if !name.eq_ignore_ascii_case("IS_DEFINED") {
            return Err(CosmosError::unsupported_query(format!(
                "function {} is not supported",
                name.to_uppercase()
            )));
        }
        self.expect(Token::LParen)?;
        let arg = match self.operand()? {
            Expr::Path(path) => path,
            Expr::Root(root) => PropertyPath {
                root,
                segments: Vec::new(),
            },
            _ => return Err(syntax_error("IS_DEFINED expects a property path")),
        };
        self.expect(Token::RParen)?;
        Ok(Expr::IsDefined(arg))
    }

    fn path(&mut self, root: String) -> CosmosResult<Expr> {
        let mut segments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    match self.advance() {
                        Some(Token::Ident(name)) => segments.push(PathSegment::Field(name)),
                        other => {
                            return Err(syntax_error(format!(
                                "expected property name after '.', found {:?}",
                                other
                            )))
                        }
                    }
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let segment = match self.advance() {
                        Some(Token::Str(name)) => PathSegment::Field(name),
                        Some(Token::Number(Value::Number(n))) => match n.as_u64() {
                            Some(i) => PathSegment::Index(i as usize),
                            None => return Err(syntax_error("array index must be a non-negative integer")),
                        },
                        other => {
                            return Err(syntax_error(format!("invalid property accessor {:?}", other)))
                        }
                    };
                    self.expect(Token::RBracket)?;
                    segments.push(segment);
                }
                _ => break,
            }
        }

        if segments.is_empty() {
            Ok(Expr::Root(root))
        } else {
            Ok(Expr::Path(PropertyPath { root, segments }))
        }
    }
}

fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|k| word.eq_ignore_ascii_case(k))
}

/// Every identifier used in expressions must be the FROM alias
fn check_roots(query: &SelectQuery) -> CosmosResult<()> {
    let mut roots = Vec::new();
    match &query.projection {
        Projection::All => {}
        Projection::Value(expr) => expr.roots(&mut roots),
        Projection::Aggregate(aggregate) => aggregate.arg.roots(&mut roots),
        Projection::Items(items) => {
            for item in items {
                item.expr.roots(&mut roots);
            }
        }
    }
    if let Some(filter) = &query.filter {
        filter.roots(&mut roots);
    }
    if let Some(order) = &query.order_by {
        roots.push(order.path.root.clone());
    }

    match roots.into_iter().find(|r| r != &query.alias) {
        Some(unknown) => Err(CosmosError::bad_request(format!(
            "Identifier '{}' could not be resolved",
            unknown
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_select_all() {
        let q = parse_query("SELECT * FROM c").unwrap();
        assert_eq!(q.projection, Projection::All);
        assert_eq!(q.source, "c");
        assert_eq!(q.alias, "c");
        assert!(q.filter.is_none());
        assert!(q.order_by.is_none());
    }

    #[test]
    fn test_parse_full_statement() {
        let q = parse_query(
            "select top 10 r.id, r.address.city AS city FROM root r \
             WHERE r.age > 21 AND NOT (r.status = 'inactive') ORDER BY r.age DESC",
        )
        .unwrap();
        assert_eq!(q.top, Some(10));
        assert_eq!(q.source, "root");
        assert_eq!(q.alias, "r");
        match &q.projection {
            Projection::Items(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[1].alias.as_deref(), Some("city"));
            }
            other => panic!("unexpected projection {:?}", other),
        }
        let order = q.order_by.unwrap();
        assert_eq!(order.direction, SortDirection::Desc);
        assert_eq!(order.path.leaf_name(), Some("age"));
        assert!(matches!(q.filter, Some(Expr::And(_, _))));
    }

    #[test]
    fn test_parse_value_and_brackets() {
        let q = parse_query("SELECT VALUE c[\"name\"] FROM c WHERE IS_DEFINED(c.tags[0])").unwrap();
        match q.projection {
            Projection::Value(Expr::Path(p)) => assert_eq!(p.leaf_name(), Some("name")),
            other => panic!("unexpected projection {:?}", other),
        }
        assert!(matches!(q.filter, Some(Expr::IsDefined(_))));
    }

    #[test]
    fn test_parse_aggregates() {
        let q = parse_query("SELECT VALUE avg(r.n) FROM r WHERE IS_NUMBER(r.n) ORDER BY r.n").unwrap();
        let aggregate = q.aggregate().unwrap();
        assert_eq!(aggregate.function, AggregateFunction::Avg);
        assert!(matches!(aggregate.arg, Expr::Path(_)));
        assert!(matches!(q.filter, Some(Expr::TypeCheck(TypeCheck::Number, _))));
        assert!(q.order_by.is_some());
        assert!(q.merge_order().is_none());

        let q = parse_query("SELECT VALUE COUNT(1) FROM c").unwrap();
        assert_eq!(q.aggregate().unwrap().arg, Expr::Literal(json!(1)));

        assert_eq!(parse_query("SELECT VALUE SUM(x.n) FROM c").unwrap_err().status_code(), Some(400));
        assert!(parse_query("SELECT VALUE COUNT(c.n FROM c").is_err());
    }

    #[test]
    fn test_or_binds_looser_than_and() {
        let q = parse_query("SELECT * FROM c WHERE c.a = 1 OR c.b = 2 AND c.c = 3").unwrap();
        match q.filter {
            Some(Expr::Or(_, right)) => assert!(matches!(*right, Expr::And(_, _))),
            other => panic!("unexpected filter {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_identifier() {
        let err = parse_query("SELECT * FROM c WHERE x.id = 1").unwrap_err();
        assert_eq!(err.status_code(), Some(400));
    }

    #[test]
    fn test_syntax_errors() {
        assert!(parse_query("SELECT FROM c").is_err());
        assert!(parse_query("SELECT * c").is_err());
        assert!(parse_query("SELECT * FROM c WHERE").is_err());
        assert!(parse_query("SELECT * FROM c ORDER c.id").is_err());
        assert!(parse_query("SELECT * FROM c extra tokens").is_err());
    }

    #[test]
    fn test_unsupported_features() {
        for text in [
            "SELECT DISTINCT c.id FROM c",
            "SELECT COUNT(1) FROM c",
            "SELECT VALUE LOWER(c.id) FROM c",
            "SELECT * FROM c WHERE MAX(c.n) > 1",
            "SELECT * FROM c JOIN t IN c.tags",
            "SELECT * FROM c ORDER BY c.a, c.b",
            "SELECT * FROM c OFFSET 1 LIMIT 1",
        ] {
            let err = parse_query(text).unwrap_err();
            assert!(
                matches!(err, CosmosError::UnsupportedQuery(_)),
                "{} gave {:?}",
                text,
                err
            );
        }
    }

    #[test]
    fn test_bind_parameters() {
        let spec = SqlQuerySpec::new("SELECT * FROM c WHERE c.id = @id AND c.n > @min")
            .with_parameter("@id", "a")
            .with_parameter("@min", 3);
        let bound = BoundQuery::bind(&spec).unwrap();
        assert_eq!(bound.parameters["@min"], json!(3));
    }

    #[test]
    fn test_missing_binding() {
        let spec = SqlQuerySpec::new("SELECT * FROM c WHERE c.id = @id");
        match BoundQuery::bind(&spec).unwrap_err() {
            CosmosError::UnboundParameter { name, fault } => {
                assert_eq!(name, "@id");
                assert_eq!(fault, ParameterFault::MissingBinding);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_unreferenced_binding() {
        let spec = SqlQuerySpec::new("SELECT * FROM c").with_parameter("@unused", 1);
        match BoundQuery::bind(&spec).unwrap_err() {
            CosmosError::UnboundParameter { name, fault } => {
                assert_eq!(name, "@unused");
                assert_eq!(fault, ParameterFault::NotReferenced);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_binding() {
        let spec = SqlQuerySpec::new("SELECT * FROM c WHERE c.id = @id")
            .with_parameter("@id", 1)
            .with_parameter("@id", 2);
        assert_eq!(BoundQuery::bind(&spec).unwrap_err().status_code(), Some(400));
    }
}
