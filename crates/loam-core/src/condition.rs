//! Condition expressions and their compilation to SQL boolean fragments.
//!
//! A [`Condition`] is a tagged tree: raw fragments pass through verbatim,
//! `AND`/`OR` nodes recurse, and leaf operators expand column/value sets.
//! Compilation is pure; values on the leaf paths are inlined as escaped
//! literals, mirroring the driver-quote path of classic PDO-style layers.

use std::fmt;
use std::str::FromStr;

use crate::dialect::Dialect;
use crate::error::Error;
use crate::value::{SqlValue, ToSqlValue};

/// Leaf condition operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `IN (..)` — empty value set compiles to a literal falsehood.
    In,
    /// `NOT IN (..)` — empty value set compiles to a vacuous truth.
    NotIn,
    /// Conjunction of one `LIKE` term per value.
    Like,
    /// Conjunction of one `NOT LIKE` term per value.
    NotLike,
    /// Disjunction of one `LIKE` term per value.
    OrLike,
    /// Disjunction of one `NOT LIKE` term per value.
    OrNotLike,
}

impl FromStr for Operator {
    type Err = Error;

    /// Parses the legacy string operator tags, case-insensitively.
    ///
    /// Unknown tags fail loudly with [`Error::InvalidOperator`]; silently
    /// compiling them to nothing would hide caller bugs.
    fn from_str(tag: &str) -> Result<Self, Error> {
        match tag.to_ascii_uppercase().as_str() {
            "IN" => Ok(Self::In),
            "NOT IN" => Ok(Self::NotIn),
            "LIKE" => Ok(Self::Like),
            "NOT LIKE" => Ok(Self::NotLike),
            "OR LIKE" => Ok(Self::OrLike),
            "OR NOT LIKE" => Ok(Self::OrNotLike),
            _ => Err(Error::InvalidOperator(String::from(tag))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::OrLike => "OR LIKE",
            Self::OrNotLike => "OR NOT LIKE",
        })
    }
}

/// A structured SQL boolean predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// A literal SQL fragment, used verbatim. Caller's responsibility.
    Raw(String),
    /// Conjunction; empty operand lists are vacuous and compile to nothing.
    And(Vec<Condition>),
    /// Disjunction; empty operand lists are vacuous and compile to nothing.
    Or(Vec<Condition>),
    /// A leaf operator applied to one column and a value set.
    Leaf {
        /// The operator.
        op: Operator,
        /// Unquoted column name; quoted per dialect at compile time.
        column: String,
        /// Value set; scalars are singleton sets.
        values: Vec<SqlValue>,
    },
}

impl Condition {
    /// A raw SQL fragment condition.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::Raw(sql.into())
    }

    /// The empty condition; compiles to nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::Raw(String::new())
    }

    /// A conjunction of conditions.
    #[must_use]
    pub fn and(items: Vec<Condition>) -> Self {
        Self::And(items)
    }

    /// A disjunction of conditions.
    #[must_use]
    pub fn or(items: Vec<Condition>) -> Self {
        Self::Or(items)
    }

    /// A leaf condition from a string operator tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperator`] for unrecognized tags.
    pub fn leaf<V: ToSqlValue>(
        tag: &str,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self, Error> {
        Ok(Self::Leaf {
            op: tag.parse()?,
            column: String::from(column),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
        })
    }

    fn typed_leaf<V: ToSqlValue>(
        op: Operator,
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::Leaf {
            op,
            column: String::from(column),
            values: values.into_iter().map(ToSqlValue::to_sql_value).collect(),
        }
    }

    /// `column IN (..)`.
    pub fn in_list<V: ToSqlValue>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::typed_leaf(Operator::In, column, values)
    }

    /// `column NOT IN (..)`.
    pub fn not_in_list<V: ToSqlValue>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Self::typed_leaf(Operator::NotIn, column, values)
    }

    /// `column LIKE p1 AND column LIKE p2 ...`.
    pub fn like<V: ToSqlValue>(column: &str, patterns: impl IntoIterator<Item = V>) -> Self {
        Self::typed_leaf(Operator::Like, column, patterns)
    }

    /// `column NOT LIKE p1 AND column NOT LIKE p2 ...`.
    pub fn not_like<V: ToSqlValue>(column: &str, patterns: impl IntoIterator<Item = V>) -> Self {
        Self::typed_leaf(Operator::NotLike, column, patterns)
    }

    /// `column LIKE p1 OR column LIKE p2 ...`.
    pub fn like_any<V: ToSqlValue>(column: &str, patterns: impl IntoIterator<Item = V>) -> Self {
        Self::typed_leaf(Operator::OrLike, column, patterns)
    }

    /// `column NOT LIKE p1 OR column NOT LIKE p2 ...`.
    pub fn not_like_any<V: ToSqlValue>(
        column: &str,
        patterns: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::typed_leaf(Operator::OrNotLike, column, patterns)
    }

    /// Compiles this condition to a SQL boolean fragment.
    ///
    /// Vacuous conditions compile to the empty string and are dropped by the
    /// surrounding clause.
    #[must_use]
    pub fn compile(&self, dialect: Dialect) -> String {
        match self {
            Self::Raw(sql) => sql.clone(),
            Self::And(items) => join_group(items, dialect, " AND "),
            Self::Or(items) => join_group(items, dialect, " OR "),
            Self::Leaf { op, column, values } => compile_leaf(*op, column, values, dialect),
        }
    }
}

fn join_group(items: &[Condition], dialect: Dialect, sep: &str) -> String {
    let parts: Vec<String> = items
        .iter()
        .map(|c| c.compile(dialect))
        .filter(|c| !c.is_empty())
        .map(|c| format!("({c})"))
        .collect();
    parts.join(sep)
}

fn compile_leaf(op: Operator, column: &str, values: &[SqlValue], dialect: Dialect) -> String {
    let column = dialect.quote_identifier(column);
    match op {
        Operator::In | Operator::NotIn => {
            if values.is_empty() {
                // IN () is always false, NOT IN () always true.
                return if op == Operator::In {
                    String::from("0")
                } else {
                    String::new()
                };
            }
            let list: Vec<String> = values.iter().map(SqlValue::to_sql_inline).collect();
            format!("{column} {op} ({})", list.join(","))
        }
        Operator::Like | Operator::NotLike | Operator::OrLike | Operator::OrNotLike => {
            if values.is_empty() {
                return if matches!(op, Operator::Like | Operator::OrLike) {
                    String::from("0")
                } else {
                    String::new()
                };
            }
            let (connective, term_op) = match op {
                Operator::Like => (" AND ", "LIKE"),
                Operator::NotLike => (" AND ", "NOT LIKE"),
                Operator::OrLike => (" OR ", "LIKE"),
                _ => (" OR ", "NOT LIKE"),
            };
            let terms: Vec<String> = values
                .iter()
                .map(|v| format!("{column} {term_op} {}", v.to_sql_inline()))
                .collect();
            terms.join(connective)
        }
    }
}
