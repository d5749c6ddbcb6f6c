//! Clause list elements and their textual rendering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Traversal direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Outbound,
    Inbound,
    #[default]
    Any,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "OUTBOUND",
            Direction::Inbound => "INBOUND",
            Direction::Any => "ANY",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OUTBOUND" => Ok(Direction::Outbound),
            "INBOUND" => Ok(Direction::Inbound),
            "ANY" => Ok(Direction::Any),
            other => Err(format!("unknown traversal direction `{other}`")),
        }
    }
}

/// Traversal depth: an exact hop count or an inclusive `min..max` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "DepthDecl", into = "DepthDecl")]
pub enum Depth {
    Exact(u32),
    Range(u32, u32),
}

impl Depth {
    /// Range from two bounds in any order; negative bounds count by magnitude.
    pub fn range(a: i64, b: i64) -> Self {
        let (a, b) = (clamp_abs(a), clamp_abs(b));
        Depth::Range(a.min(b), a.max(b))
    }

    pub fn exact(depth: i64) -> Self {
        Depth::Exact(clamp_abs(depth))
    }

    pub fn min(&self) -> u32 {
        match *self {
            Depth::Exact(d) => d,
            Depth::Range(a, b) => a.min(b),
        }
    }

    pub fn max(&self) -> u32 {
        match *self {
            Depth::Exact(d) => d,
            Depth::Range(a, b) => a.max(b),
        }
    }
}

fn clamp_abs(v: i64) -> u32 {
    u32::try_from(v.unsigned_abs()).unwrap_or(u32::MAX)
}

impl Default for Depth {
    fn default() -> Self {
        Depth::Exact(1)
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Depth::Exact(d) => write!(f, "{d}"),
            Depth::Range(..) => write!(f, "{}..{}", self.min(), self.max()),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DepthDecl {
    Exact(i64),
    Bounds(Vec<i64>),
}

impl TryFrom<DepthDecl> for Depth {
    type Error = String;

    fn try_from(decl: DepthDecl) -> Result<Self, Self::Error> {
        match decl {
            DepthDecl::Exact(d) => Ok(Depth::exact(d)),
            DepthDecl::Bounds(bounds) => match bounds.as_slice() {
                [] => Ok(Depth::default()),
                [d] => Ok(Depth::exact(*d)),
                [a, b] => Ok(Depth::range(*a, *b)),
                _ => Err(format!("depth takes one or two bounds, got {}", bounds.len())),
            },
        }
    }
}

impl From<Depth> for DepthDecl {
    fn from(depth: Depth) -> Self {
        match depth {
            Depth::Exact(d) => DepthDecl::Exact(i64::from(d)),
            Depth::Range(..) => {
                DepthDecl::Bounds(vec![i64::from(depth.min()), i64::from(depth.max())])
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// A clause operand: a developer-declared path (emitted verbatim) or a bind
/// parameter (emitted as `@name`, value carried separately).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Path(String),
    Param(String),
}

impl Operand {
    pub fn path(path: impl Into<String>) -> Self {
        Operand::Path(path.into())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Path(p) => f.write_str(p),
            Operand::Param(name) => write!(f, "@{name}"),
        }
    }
}

/// What a `RETURN` clause yields per row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Projection {
    /// A bound variable such as `v`, `x` or `NEW`.
    Var(String),
    /// `MERGE(base, { "alias": operand, ... })`
    Merge {
        base: String,
        extras: Vec<(String, Operand)>,
    },
}

impl Projection {
    pub fn var(name: impl Into<String>) -> Self {
        Projection::Var(name.into())
    }

    pub fn merge<I, A, P>(base: impl Into<String>, extras: I) -> Self
    where
        I: IntoIterator<Item = (A, P)>,
        A: Into<String>,
        P: Into<String>,
    {
        Projection::Merge {
            base: base.into(),
            extras: extras
                .into_iter()
                .map(|(alias, path)| (alias.into(), Operand::Path(path.into())))
                .collect(),
        }
    }
}

impl From<&str> for Projection {
    fn from(var: &str) -> Self {
        Projection::Var(var.to_string())
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Projection::Var(v) => f.write_str(v),
            Projection::Merge { base, extras } => {
                let pairs: Vec<String> = extras
                    .iter()
                    .map(|(alias, op)| format!("\"{alias}\": {op}"))
                    .collect();
                write!(f, "MERGE({base}, {{ {} }})", pairs.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Lt,
    Lte,
    Eq,
    Neq,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Eq => "==",
            CompareOp::Neq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// One element of a statement, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Clause {
    For {
        var: String,
        collection: String,
    },
    Traverse {
        depth: Depth,
        direction: Direction,
        start: Operand,
        graph: String,
    },
    Filter(Operand),
    And(Operand),
    Or(Operand),
    /// `standalone` opens a new `FILTER`, otherwise the negation joins the
    /// running predicate with `AND`.
    Not {
        operand: Operand,
        standalone: bool,
    },
    In(Operand),
    Compare(CompareOp, Operand),
    Like(Operand),
    Limit {
        offset: u64,
        size: u64,
    },
    Sort {
        field: String,
        order: SortOrder,
    },
    Insert {
        document: Operand,
        collection: String,
    },
    Update {
        var: String,
        patch: Operand,
        collection: String,
    },
    Return {
        projection: Projection,
        distinct: bool,
    },
}

impl Clause {
    /// Whether this clause belongs to a running `FILTER` predicate.
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Clause::Filter(_)
                | Clause::And(_)
                | Clause::Or(_)
                | Clause::Not { .. }
                | Clause::In(_)
                | Clause::Compare(..)
                | Clause::Like(_)
        )
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clause::For { var, collection } => write!(f, "FOR {var} IN {collection}"),
            Clause::Traverse {
                depth,
                direction,
                start,
                graph,
            } => write!(f, "FOR v, e, p IN {depth} {direction} {start} GRAPH \"{graph}\""),
            Clause::Filter(op) => write!(f, "FILTER {op}"),
            Clause::And(op) => write!(f, "AND {op}"),
            Clause::Or(op) => write!(f, "OR {op}"),
            Clause::Not {
                operand,
                standalone: true,
            } => write!(f, "FILTER NOT {operand}"),
            Clause::Not {
                operand,
                standalone: false,
            } => write!(f, "AND NOT {operand}"),
            Clause::In(op) => write!(f, "IN {op}"),
            Clause::Compare(cmp, op) => write!(f, "{} {op}", cmp.symbol()),
            Clause::Like(op) => write!(f, "LIKE {op}"),
            Clause::Limit { offset, size } => write!(f, "LIMIT {offset}, {size}"),
            Clause::Sort { field, order } => write!(f, "SORT {field} {}", order.as_str()),
            Clause::Insert {
                document,
                collection,
            } => write!(f, "INSERT {document} INTO {collection}"),
            Clause::Update {
                var,
                patch,
                collection,
            } => write!(f, "UPDATE {var} WITH {patch} IN {collection}"),
            Clause::Return {
                projection,
                distinct: false,
            } => write!(f, "RETURN {projection}"),
            Clause::Return {
                projection,
                distinct: true,
            } => write!(f, "RETURN DISTINCT {projection}"),
        }
    }
}
