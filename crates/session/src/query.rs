//! Statement builder
//!
//! Statements carry bind markers (`?`) only; values are supplied when a
//! prepared statement is bound. Each restriction and the optional `LIMIT`
//! consume exactly one marker, in the order they were added.
//!
//! ```text
//! Select::from("dependency").column("links").where_in("day")
//!     => SELECT links FROM dependency WHERE day IN ?
//! ```

use std::fmt;

/// Comparison applied by one `WHERE` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Restriction {
    /// `column = ?`
    Eq,
    /// `column IN ?`; the bound value is a list
    In,
    /// `column >= ?`
    Gte,
    /// `column <= ?`
    Lte,
    /// `column LIKE ?`; `%` matches any run of characters at either end
    Like,
}

impl Restriction {
    fn operator(self) -> &'static str {
        match self {
            Restriction::Eq => "=",
            Restriction::In => " IN ",
            Restriction::Gte => ">=",
            Restriction::Lte => "<=",
            Restriction::Like => " LIKE ",
        }
    }
}

/// A restriction on one column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Predicate {
    /// Restricted column
    pub column: String,
    /// Comparison
    pub restriction: Restriction,
}

/// `SELECT` statement
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Select {
    table: String,
    columns: Vec<String>,
    predicates: Vec<Predicate>,
    limit: bool,
    allow_filtering: bool,
}

impl Select {
    /// Start a select over `table`; no columns means all columns
    pub fn from(table: impl Into<String>) -> Self {
        Select {
            table: table.into(),
            columns: Vec::new(),
            predicates: Vec::new(),
            limit: false,
            allow_filtering: false,
        }
    }

    /// Add a projected column
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Add several projected columns
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    fn restrict(mut self, column: impl Into<String>, restriction: Restriction) -> Self {
        self.predicates.push(Predicate {
            column: column.into(),
            restriction,
        });
        self
    }

    /// `column = ?`
    pub fn where_eq(self, column: impl Into<String>) -> Self {
        self.restrict(column, Restriction::Eq)
    }

    /// `column IN ?`
    pub fn where_in(self, column: impl Into<String>) -> Self {
        self.restrict(column, Restriction::In)
    }

    /// `column >= ?`
    pub fn where_gte(self, column: impl Into<String>) -> Self {
        self.restrict(column, Restriction::Gte)
    }

    /// `column <= ?`
    pub fn where_lte(self, column: impl Into<String>) -> Self {
        self.restrict(column, Restriction::Lte)
    }

    /// `column LIKE ?`
    pub fn where_like(self, column: impl Into<String>) -> Self {
        self.restrict(column, Restriction::Like)
    }

    /// `LIMIT ?`, always the last marker
    pub fn limit_marker(mut self) -> Self {
        self.limit = true;
        self
    }

    /// Permit restrictions on columns that are neither keys nor indexed
    pub fn allow_filtering(mut self) -> Self {
        self.allow_filtering = true;
        self
    }

    /// Table read by this statement
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Projected columns; empty means all
    pub fn projection(&self) -> &[String] {
        &self.columns
    }

    /// Restrictions in marker order
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// True if the statement ends with `LIMIT ?`
    pub fn has_limit(&self) -> bool {
        self.limit
    }

    /// True if `ALLOW FILTERING` was requested
    pub fn filtering_allowed(&self) -> bool {
        self.allow_filtering
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.columns.is_empty() {
            f.write_str("*")?;
        } else {
            f.write_str(&self.columns.join(","))?;
        }
        write!(f, " FROM {}", self.table)?;
        for (i, predicate) in self.predicates.iter().enumerate() {
            f.write_str(if i == 0 { " WHERE " } else { " AND " })?;
            write!(f, "{}{}?", predicate.column, predicate.restriction.operator())?;
        }
        if self.limit {
            f.write_str(" LIMIT ?")?;
        }
        if self.allow_filtering {
            f.write_str(" ALLOW FILTERING")?;
        }
        Ok(())
    }
}

/// `INSERT` statement; inserting an existing primary key overwrites it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Insert {
    table: String,
    columns: Vec<String>,
}

impl Insert {
    /// Start an insert into `table`
    pub fn into(table: impl Into<String>) -> Self {
        Insert {
            table: table.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column, bound positionally
    pub fn value(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Table written by this statement
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Written columns in marker order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl fmt::Display for Insert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let markers = vec!["?"; self.columns.len()];
        write!(
            f,
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.columns.join(","),
            markers.join(",")
        )
    }
}

/// Any statement a session can prepare
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    /// Read
    Select(Select),
    /// Write
    Insert(Insert),
}

impl Statement {
    /// Table the statement touches
    pub fn table(&self) -> &str {
        match self {
            Statement::Select(s) => s.table(),
            Statement::Insert(i) => i.table(),
        }
    }

    /// Number of `?` markers to bind
    pub fn bind_markers(&self) -> usize {
        match self {
            Statement::Select(s) => s.predicates.len() + usize::from(s.limit),
            Statement::Insert(i) => i.columns.len(),
        }
    }
}

impl From<Select> for Statement {
    fn from(s: Select) -> Self {
        Statement::Select(s)
    }
}

impl From<Insert> for Statement {
    fn from(i: Insert) -> Self {
        Statement::Insert(i)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(s) => fmt::Display::fmt(s, f),
            Statement::Insert(i) => fmt::Display::fmt(i, f),
        }
    }
}
