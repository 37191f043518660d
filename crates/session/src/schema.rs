//! Keyspace and table descriptions
//!
//! The session needs to know each table's primary key to upsert rows and to
//! decide which restrictions it can serve without `ALLOW FILTERING`.

use std::collections::{BTreeMap, BTreeSet};

/// Sort direction of a clustering column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusteringOrder {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

/// One table: columns, primary key and secondary indexes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    partition_key: Vec<String>,
    clustering: Vec<(String, ClusteringOrder)>,
    columns: BTreeSet<String>,
    indexed: BTreeSet<String>,
}

impl TableSchema {
    /// Start a table description
    pub fn new(name: impl Into<String>) -> Self {
        TableSchema {
            name: name.into(),
            partition_key: Vec::new(),
            clustering: Vec::new(),
            columns: BTreeSet::new(),
            indexed: BTreeSet::new(),
        }
    }

    /// Add a partition key column
    pub fn partition_key(mut self, column: &str) -> Self {
        self.partition_key.push(column.to_string());
        self.columns.insert(column.to_string());
        self
    }

    /// Add a clustering column
    pub fn clustering(mut self, column: &str, order: ClusteringOrder) -> Self {
        self.clustering.push((column.to_string(), order));
        self.columns.insert(column.to_string());
        self
    }

    /// Add a regular column
    pub fn column(mut self, column: &str) -> Self {
        self.columns.insert(column.to_string());
        self
    }

    /// Add a regular column with a secondary index
    pub fn indexed(mut self, column: &str) -> Self {
        self.columns.insert(column.to_string());
        self.indexed.insert(column.to_string());
        self
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Partition key columns, in key order
    pub fn partition_columns(&self) -> &[String] {
        &self.partition_key
    }

    /// Clustering columns with their sort order
    pub fn clustering_columns(&self) -> &[(String, ClusteringOrder)] {
        &self.clustering
    }

    /// Partition key followed by clustering columns
    pub fn primary_key(&self) -> impl Iterator<Item = &str> {
        self.partition_key
            .iter()
            .map(String::as_str)
            .chain(self.clustering.iter().map(|(c, _)| c.as_str()))
    }

    /// True if the table defines `column`
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// True if `column` is part of the primary key
    pub fn is_key(&self, column: &str) -> bool {
        self.primary_key().any(|c| c == column)
    }

    /// True if `column` has a secondary index
    pub fn is_indexed(&self, column: &str) -> bool {
        self.indexed.contains(column)
    }
}

/// Named set of tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    name: String,
    tables: BTreeMap<String, TableSchema>,
}

impl Keyspace {
    /// Empty keyspace
    pub fn new(name: impl Into<String>) -> Self {
        Keyspace {
            name: name.into(),
            tables: BTreeMap::new(),
        }
    }

    /// Add a table, replacing any table of the same name
    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    /// Keyspace name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a table
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    /// Table names, sorted
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}
