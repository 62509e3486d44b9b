//! # Query AST
//!
//! Parsed form of the supported SQL subset.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// One step of a property path
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Property path rooted at the FROM alias, e.g. `c.address.city`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyPath {
    pub root: String,
    pub segments: Vec<PathSegment>,
}

impl PropertyPath {
    /// Last field name, used as the default projection name
    pub fn leaf_name(&self) -> Option<&str> {
        match self.segments.last() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Resolve against a document bound to the root alias
    pub fn lookup<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let mut current = document;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Field(name) => current.as_object()?.get(name)?,
                PathSegment::Index(i) => current.as_array()?.get(*i)?,
            };
        }
        Some(current)
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)?;
        for segment in &self.segments {
            match segment {
                PathSegment::Field(name) => write!(f, "[\"{}\"]", name)?,
                PathSegment::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Type-checking functions: `IS_NUMBER(x)`, `IS_STRING(x)` and friends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeCheck {
    Number,
    String,
    Bool,
    Null,
    Array,
    Object,
}

impl TypeCheck {
    pub fn from_function(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "IS_NUMBER" => Some(Self::Number),
            "IS_STRING" => Some(Self::String),
            "IS_BOOL" => Some(Self::Bool),
            "IS_NULL" => Some(Self::Null),
            "IS_ARRAY" => Some(Self::Array),
            "IS_OBJECT" => Some(Self::Object),
            _ => None,
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::Number, Value::Number(_))
                | (Self::String, Value::String(_))
                | (Self::Bool, Value::Bool(_))
                | (Self::Null, Value::Null)
                | (Self::Array, Value::Array(_))
                | (Self::Object, Value::Object(_))
        )
    }
}

/// Scalar expression
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Literal(Value),
    Parameter(String),
    Path(PropertyPath),
    /// The whole document, e.g. `SELECT VALUE c`
    Root(String),
    Compare {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IsDefined(PropertyPath),
    /// False when the argument is undefined
    TypeCheck(TypeCheck, Box<Expr>),
}

impl Expr {
    /// Collect every `@placeholder` referenced by this expression
    pub fn collect_parameters(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Parameter(name) => {
                out.insert(name.clone());
            }
            Expr::Compare { left, right, .. } | Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_parameters(out);
                right.collect_parameters(out);
            }
            Expr::Not(inner) | Expr::TypeCheck(_, inner) => inner.collect_parameters(out),
            Expr::Literal(_) | Expr::Path(_) | Expr::Root(_) | Expr::IsDefined(_) => {}
        }
    }

    /// Visit every property path rooted in this expression
    pub fn roots(&self, out: &mut Vec<String>) {
        match self {
            Expr::Path(p) | Expr::IsDefined(p) => out.push(p.root.clone()),
            Expr::Root(r) => out.push(r.clone()),
            Expr::Compare { left, right, .. } | Expr::And(left, right) | Expr::Or(left, right) => {
                left.roots(out);
                right.roots(out);
            }
            Expr::Not(inner) | Expr::TypeCheck(_, inner) => inner.roots(out),
            Expr::Literal(_) | Expr::Parameter(_) => {}
        }
    }
}

/// One item of a SELECT list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

/// Aggregate functions allowed in `SELECT VALUE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn from_function(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(Self::Count),
            "SUM" => Some(Self::Sum),
            "AVG" => Some(Self::Avg),
            "MIN" => Some(Self::Min),
            "MAX" => Some(Self::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// `SELECT VALUE COUNT(c.x)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub arg: Expr,
}

/// What the query returns per document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// `SELECT *`
    All,
    /// `SELECT VALUE expr`
    Value(Expr),
    /// `SELECT a, b AS x`
    Items(Vec<SelectItem>),
    /// `SELECT VALUE AGG(expr)`: one value for the whole result set
    Aggregate(Aggregate),
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// ORDER BY clause (single key)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBy {
    pub path: PropertyPath,
    pub direction: SortDirection,
}

/// Parsed SELECT statement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectQuery {
    pub top: Option<usize>,
    pub projection: Projection,
    /// Name after FROM
    pub source: String,
    /// Alias used by expressions; the source name when no alias is given
    pub alias: String,
    pub filter: Option<Expr>,
    pub order_by: Option<OrderBy>,
}

impl SelectQuery {
    /// Placeholders referenced anywhere in the statement
    pub fn parameters(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        match &self.projection {
            Projection::All => {}
            Projection::Value(expr) => expr.collect_parameters(&mut out),
            Projection::Aggregate(aggregate) => aggregate.arg.collect_parameters(&mut out),
            Projection::Items(items) => {
                for item in items {
                    item.expr.collect_parameters(&mut out);
                }
            }
        }
        if let Some(filter) = &self.filter {
            filter.collect_parameters(&mut out);
        }
        out
    }

    pub fn aggregate(&self) -> Option<&Aggregate> {
        match &self.projection {
            Projection::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        }
    }

    /// ORDER BY the cursor must merge on. Aggregates fold to one value,
    /// so their ORDER BY has nothing to merge.
    pub fn merge_order(&self) -> Option<&OrderBy> {
        match self.projection {
            Projection::Aggregate(_) => None,
            _ => self.order_by.as_ref(),
        }
    }
}
