//! Data-source seam: an explicitly passed handle that turns a query
//! expression into a single in-process `DataFrame`.
//!
//! Built-in sources accept a deliberately small grammar:
//!
//! ```text
//! SELECT * FROM <table> [LIMIT <n>] [;]
//! <table>
//! ```
//!
//! Keywords are case-insensitive; `<table>` may be dotted (`main.db.trips`).

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use polars::prelude::{DataFrame, IpcReader, SerReader};
use regex::Regex;
use tracing::debug;

use crate::error::QueryError;

const C_PATTERN_TABLE: &str = r"[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*";
const TUP_IPC_EXTENSIONS: [&str; 2] = ["arrow", "ipc"];

/// Anything that can answer a query with a materialized dataset.
pub trait TabularSource {
    /// Run `query` and collect the full result.
    fn query(&self, query: &str) -> Result<DataFrame, QueryError>;
}

impl<T: TabularSource + ?Sized> TabularSource for &T {
    fn query(&self, query: &str) -> Result<DataFrame, QueryError> {
        (**self).query(query)
    }
}

////////////////////////////////////////////////////////////////////////////////
// #region QueryGrammar

/// Parsed query expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecTableQuery {
    /// Table name as written.
    pub table: String,
    /// Row cap from `LIMIT`.
    pub limit: Option<usize>,
}

impl SpecTableQuery {
    /// Cap `df` to [`Self::limit`] rows.
    pub fn apply_limit(&self, df: DataFrame) -> DataFrame {
        match self.limit {
            Some(n_limit) if n_limit < df.height() => df.head(Some(n_limit)),
            _ => df,
        }
    }
}

impl FromStr for SpecTableQuery {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re_select = Regex::new(&format!(
            r"(?i)^\s*select\s+\*\s+from\s+({C_PATTERN_TABLE})(?:\s+limit\s+([0-9]+))?\s*;?\s*$"
        ))
        .map_err(|err| QueryError::InvalidQuery(err.to_string()))?;
        let re_bare = Regex::new(&format!(r"^\s*({C_PATTERN_TABLE})\s*;?\s*$"))
            .map_err(|err| QueryError::InvalidQuery(err.to_string()))?;

        if let Some(caps) = re_select.captures(s) {
            let limit = match caps.get(2) {
                Some(m) => Some(m.as_str().parse::<usize>().map_err(|err| {
                    QueryError::InvalidQuery(format!("LIMIT {:?}: {err}", m.as_str()))
                })?),
                None => None,
            };
            return Ok(Self {
                table: caps[1].to_string(),
                limit,
            });
        }
        if let Some(caps) = re_bare.captures(s) {
            return Ok(Self {
                table: caps[1].to_string(),
                limit: None,
            });
        }
        Err(QueryError::InvalidQuery(format!(
            "expected `SELECT * FROM <table> [LIMIT n]` or a table name, got {s:?}"
        )))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemorySource

/// Named in-memory tables.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    dict_tables: BTreeMap<String, DataFrame>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `df` under `name`, returning the table it replaced.
    pub fn register(&mut self, name: impl Into<String>, df: DataFrame) -> Option<DataFrame> {
        self.dict_tables.insert(name.into(), df)
    }

    /// Builder form of [`Self::register`].
    pub fn with_table(mut self, name: impl Into<String>, df: DataFrame) -> Self {
        self.register(name, df);
        self
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.dict_tables.keys().map(String::as_str)
    }
}

impl TabularSource for MemorySource {
    fn query(&self, query: &str) -> Result<DataFrame, QueryError> {
        let spec_query: SpecTableQuery = query.parse()?;
        let df = self
            .dict_tables
            .get(&spec_query.table)
            .ok_or_else(|| QueryError::TableNotFound(spec_query.table.clone()))?;
        debug!(table = %spec_query.table, limit = ?spec_query.limit, "memory table resolved");
        Ok(spec_query.apply_limit(df.clone()))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region IpcDirSource

/// A directory of Arrow IPC files, one table per `<table>.arrow` / `<table>.ipc`.
#[derive(Debug, Clone)]
pub struct IpcDirSource {
    path_dir: PathBuf,
}

impl IpcDirSource {
    pub fn new(path_dir: impl Into<PathBuf>) -> Self {
        Self {
            path_dir: path_dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.path_dir
    }

    fn resolve_table_path(&self, table: &str) -> Option<PathBuf> {
        TUP_IPC_EXTENSIONS
            .iter()
            .map(|ext| self.path_dir.join(format!("{table}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl TabularSource for IpcDirSource {
    fn query(&self, query: &str) -> Result<DataFrame, QueryError> {
        let spec_query: SpecTableQuery = query.parse()?;
        let path_table = self
            .resolve_table_path(&spec_query.table)
            .ok_or_else(|| QueryError::TableNotFound(spec_query.table.clone()))?;

        let derive_read_error = |message: String| QueryError::Read {
            table: spec_query.table.clone(),
            message,
        };
        let file = File::open(&path_table).map_err(|err| derive_read_error(err.to_string()))?;
        let df = IpcReader::new(file)
            .finish()
            .map_err(|err| derive_read_error(format!("Failed to read IPC file: {err}")))?;
        debug!(
            table = %spec_query.table,
            path = %path_table.display(),
            rows = df.height(),
            "ipc table loaded"
        );
        Ok(spec_query.apply_limit(df))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
