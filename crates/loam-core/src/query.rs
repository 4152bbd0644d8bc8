//! SELECT clause accumulation and assembly.
//!
//! A [`QuerySpec`] holds one statement's clause fragments in structured form
//! and compiles them in a fixed order. Identifier quoting is deferred to
//! build time so a spec can be assembled before the connection (and with it
//! the dialect) exists.

use crate::condition::Condition;
use crate::dialect::Dialect;
use crate::error::{Error, Result};

/// Join flavors supported by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// `JOIN`.
    Inner,
    /// `LEFT JOIN`.
    Left,
    /// `RIGHT JOIN`.
    Right,
}

impl JoinKind {
    const fn keyword(self) -> &'static str {
        match self {
            Self::Inner => "JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
        }
    }
}

/// One registered join clause.
#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    table: String,
    on: Condition,
}

/// Clause fragments for one SELECT statement.
///
/// Owned exclusively by one command builder; compiled via [`QuerySpec::build`].
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    select: Option<String>,
    distinct: bool,
    from: Option<String>,
    joins: Vec<Join>,
    where_clause: Option<Condition>,
    group: Option<String>,
    having: Option<Condition>,
    order: Option<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    unions: Vec<String>,
}

impl QuerySpec {
    /// Creates an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no clause has been registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.select.is_none()
            && !self.distinct
            && self.from.is_none()
            && self.joins.is_empty()
            && self.where_clause.is_none()
            && self.group.is_none()
            && self.having.is_none()
            && self.order.is_none()
            && self.limit.is_none()
            && self.offset.is_none()
            && self.unions.is_empty()
    }

    /// Sets the select list (comma-separated, aliases allowed).
    pub fn set_select(&mut self, fields: &str) {
        self.select = Some(String::from(fields));
    }

    /// Marks the query DISTINCT.
    pub fn set_distinct(&mut self) {
        self.distinct = true;
    }

    /// Sets the FROM table list (comma-separated, aliases allowed).
    pub fn set_from(&mut self, tables: &str) {
        self.from = Some(String::from(tables));
    }

    /// Appends a join; joins are emitted in registration order.
    pub fn add_join(&mut self, kind: JoinKind, table: &str, on: Condition) {
        self.joins.push(Join {
            kind,
            table: String::from(table),
            on,
        });
    }

    /// Sets the WHERE condition.
    pub fn set_where(&mut self, condition: Condition) {
        self.where_clause = Some(condition);
    }

    /// Sets the GROUP BY field list.
    pub fn set_group(&mut self, fields: &str) {
        self.group = Some(String::from(fields));
    }

    /// Sets the HAVING condition; only emitted when GROUP BY is present.
    pub fn set_having(&mut self, condition: Condition) {
        self.having = Some(condition);
    }

    /// Sets the ORDER BY field list (`field [ASC|DESC]`, comma-separated).
    pub fn set_order(&mut self, fields: &str) {
        self.order = Some(String::from(fields));
    }

    /// Sets the row limit.
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    /// Sets the row offset.
    pub fn set_offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    /// Appends a trailing UNION fragment, used verbatim.
    pub fn add_union(&mut self, sql: &str) {
        self.unions.push(String::from(sql));
    }

    /// Compiles the spec into SQL text.
    ///
    /// # Errors
    ///
    /// [`Error::MissingFromClause`] when no FROM table was registered, and
    /// [`Error::UnsupportedDialect`] when a limit/offset was requested on a
    /// dialect without a clause form for it.
    pub fn build(&self, dialect: Dialect) -> Result<String> {
        let mut sql = String::from("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        match &self.select {
            Some(fields) => sql.push_str(&compile_select_list(dialect, fields)),
            None => sql.push('*'),
        }

        let from = self.from.as_ref().ok_or(Error::MissingFromClause)?;
        sql.push_str(" FROM ");
        sql.push_str(&compile_table_list(dialect, from));

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join.kind.keyword());
            sql.push(' ');
            sql.push_str(&quote_aliased(dialect, &join.table));
            let on = join.on.compile(dialect);
            if !on.is_empty() {
                sql.push_str(" ON ");
                sql.push_str(&on);
            }
        }

        if let Some(cond) = &self.where_clause {
            let compiled = cond.compile(dialect);
            if !compiled.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&compiled);
            }
        }

        if let Some(group) = &self.group {
            sql.push_str(" GROUP BY ");
            let fields: Vec<String> = split_top_level(group)
                .iter()
                .map(|f| dialect.quote_identifier(f))
                .collect();
            sql.push_str(&fields.join(", "));

            if let Some(having) = &self.having {
                let compiled = having.compile(dialect);
                if !compiled.is_empty() {
                    sql.push_str(" HAVING ");
                    sql.push_str(&compiled);
                }
            }
        }

        if let Some(order) = &self.order {
            sql.push_str(" ORDER BY ");
            sql.push_str(&compile_order_list(dialect, order));
        }

        dialect.push_limit_offset(&mut sql, self.limit, self.offset)?;

        for union in &self.unions {
            sql.push(' ');
            sql.push_str(union);
        }

        Ok(sql)
    }
}

/// Splits a field list on top-level commas only, never inside parentheses.
#[must_use]
pub fn split_top_level(list: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0_u32;
    let mut current = String::new();
    for ch in list.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    parts.push(String::from(trimmed));
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(String::from(trimmed));
    }
    parts
}

/// Splits `<expr> [AS] <alias>` into expression and alias.
///
/// The single trailing whitespace-delimited token is the alias; an `AS`
/// keyword before it (any case) is consumed. Returns `None` when there is no
/// alias.
#[must_use]
pub fn split_alias(entry: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = entry.split_whitespace().collect();
    if tokens.len() < 2 {
        return None;
    }
    let alias = tokens[tokens.len() - 1];
    let mut expr = &tokens[..tokens.len() - 1];
    if expr
        .last()
        .is_some_and(|t| t.eq_ignore_ascii_case("as"))
    {
        expr = &expr[..expr.len() - 1];
    }
    if expr.is_empty() {
        return None;
    }
    Some((expr.join(" "), String::from(alias)))
}

fn quote_aliased(dialect: Dialect, entry: &str) -> String {
    match split_alias(entry) {
        Some((expr, alias)) => format!(
            "{} AS {}",
            dialect.quote_identifier(&expr),
            dialect.quote_identifier(&alias)
        ),
        None => dialect.quote_identifier(entry),
    }
}

fn compile_select_list(dialect: Dialect, fields: &str) -> String {
    // Lists containing parentheses (aggregates, expressions) pass through
    // untouched; the caller owns their quoting.
    if fields.contains('(') {
        return String::from(fields);
    }
    let compiled: Vec<String> = split_top_level(fields)
        .iter()
        .map(|f| quote_aliased(dialect, f))
        .collect();
    compiled.join(", ")
}

fn compile_table_list(dialect: Dialect, tables: &str) -> String {
    let compiled: Vec<String> = split_top_level(tables)
        .iter()
        .map(|t| quote_aliased(dialect, t))
        .collect();
    compiled.join(", ")
}

fn compile_order_list(dialect: Dialect, fields: &str) -> String {
    let compiled: Vec<String> = split_top_level(fields)
        .iter()
        .map(|field| {
            match field.rsplit_once(char::is_whitespace) {
                Some((expr, dir))
                    if dir.eq_ignore_ascii_case("asc") || dir.eq_ignore_ascii_case("desc") =>
                {
                    format!("{} {dir}", dialect.quote_identifier(expr.trim_end()))
                }
                _ => dialect.quote_identifier(field),
            }
        })
        .collect();
    compiled.join(", ")
}
