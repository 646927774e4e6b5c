//! WAL Entry definitions
//!
//! Defines the table mutations that are logged. One `WalEntry` is what a
//! caller appends; on disk it may be spread over several frames, each of which
//! decodes back into a `WalEntry` holding only its own records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Kind of table mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Insert or overwrite records
    Update,

    /// Remove records (identified by their key column)
    Delete,
}

/// Declared type of a table column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Bool,
    Int,
    Float,
    Double,
    String,
    Bytes,
}

/// One column declaration in a table schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Position identifier used by `Record` columns
    pub index: u32,
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(index: u32, name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            index,
            name: name.into(),
            column_type,
        }
    }
}

/// Schema change carried alongside an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Name of the column that identifies a record, if any
    pub key_column: Option<String>,

    /// Column declarations, in declaration order
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(key_column: Option<&str>) -> Self {
        Self {
            key_column: key_column.map(str::to_string),
            columns: Vec::new(),
        }
    }

    /// Add a column declaration (builder style)
    pub fn with_column(mut self, index: u32, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnSchema::new(index, name, column_type));
        self
    }

    /// Look up a column declaration by index
    pub fn column(&self, index: u32) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.index == index)
    }
}

/// A typed cell value
///
/// Floats are compared and stored by value; the codec keeps their exact bit
/// pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Null,
    Bool(bool),
    Int(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Column {
    /// Type of the value, `None` for null
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Column::Null => None,
            Column::Bool(_) => Some(ColumnType::Bool),
            Column::Int(_) => Some(ColumnType::Int),
            Column::Float(_) => Some(ColumnType::Float),
            Column::Double(_) => Some(ColumnType::Double),
            Column::String(_) => Some(ColumnType::String),
            Column::Bytes(_) => Some(ColumnType::Bytes),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Column::Null)
    }
}

impl From<bool> for Column {
    fn from(v: bool) -> Self {
        Column::Bool(v)
    }
}

macro_rules! widen_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Column {
            fn from(v: $t) -> Self {
                Column::Int(i64::from(v))
            }
        })*
    };
}

widen_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Column {
    fn from(v: f32) -> Self {
        Column::Float(v)
    }
}

impl From<f64> for Column {
    fn from(v: f64) -> Self {
        Column::Double(v)
    }
}

impl From<String> for Column {
    fn from(v: String) -> Self {
        Column::String(v)
    }
}

impl From<&str> for Column {
    fn from(v: &str) -> Self {
        Column::String(v.to_string())
    }
}

impl From<Vec<u8>> for Column {
    fn from(v: Vec<u8>) -> Self {
        Column::Bytes(v)
    }
}

impl<T: Into<Column>> From<Option<T>> for Column {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Column::Null)
    }
}

/// One row: column index → value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub columns: BTreeMap<u32, Column>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value (builder style)
    pub fn with(mut self, index: u32, value: impl Into<Column>) -> Self {
        self.columns.insert(index, value.into());
        self
    }

    /// Set a column value, returning the previous one
    pub fn set(&mut self, index: u32, value: impl Into<Column>) -> Option<Column> {
        self.columns.insert(index, value.into())
    }

    pub fn get(&self, index: u32) -> Option<&Column> {
        self.columns.get(&index)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<C: Into<Column>> FromIterator<(u32, C)> for Record {
    fn from_iter<I: IntoIterator<Item = (u32, C)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().map(|(i, v)| (i, v.into())).collect(),
        }
    }
}

/// A single logical entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// The mutation kind
    pub entry_type: EntryType,

    /// Table the records belong to
    pub table_name: String,

    /// Present only when the entry introduces or alters the table schema
    pub table_schema: Option<TableSchema>,

    /// Records in caller order
    pub records: Vec<Record>,
}

impl WalEntry {
    /// Create an entry with no schema and no records
    pub fn new(entry_type: EntryType, table_name: impl Into<String>) -> Self {
        Self {
            entry_type,
            table_name: table_name.into(),
            table_schema: None,
            records: Vec::new(),
        }
    }

    /// Shorthand for an `Update` entry
    pub fn update(table_name: impl Into<String>) -> Self {
        Self::new(EntryType::Update, table_name)
    }

    /// Shorthand for a `Delete` entry
    pub fn delete(table_name: impl Into<String>) -> Self {
        Self::new(EntryType::Delete, table_name)
    }

    /// Attach a schema (builder style)
    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.table_schema = Some(schema);
        self
    }

    /// Append one record (builder style)
    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    /// Append many records (builder style)
    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        self.records.extend(records);
        self
    }
}
