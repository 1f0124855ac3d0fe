//! Column definitions for tables that are still being built
//!
//! A definition is a name, a value type and a constraint set. Definitions
//! can be built in code:
//!
//! ```rust,ignore
//! let id = ColumnDef::new("id", ColumnType::Integer).primary_key().autoincrement();
//! let name = ColumnDef::new("name", ColumnType::Text).not_null();
//! ```
//!
//! or parsed from the compact form used on the command line,
//! `name:type[:pk][:autoincrement][:not-null][:unique][:default=LITERAL]`.

use crate::db::quote_ident;
use crate::error::{EditorError, Result};
use crate::value::{Value, DATETIME_FORMAT, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    BigInteger,
    Boolean,
    Date,
    DateTime,
    Integer,
    Float,
    Numeric,
    Text,
    String,
}

impl ColumnType {
    /// Type name used in generated DDL.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::BigInteger => "BIGINT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATE",
            ColumnType::DateTime => "DATETIME",
            ColumnType::Integer => "INTEGER",
            ColumnType::Float => "FLOAT",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Text => "TEXT",
            ColumnType::String => "VARCHAR",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::BigInteger | ColumnType::Integer)
    }

    /// Whether a literal of this value's kind fits the type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::BigInteger | ColumnType::Integer, Value::Integer(_)) => true,
            (ColumnType::Boolean, Value::Boolean(_)) => true,
            (ColumnType::Float | ColumnType::Numeric, Value::Integer(_) | Value::Real(_)) => true,
            (ColumnType::Text | ColumnType::String, Value::Text(_)) => true,
            (ColumnType::Date, Value::Date(_)) => true,
            (ColumnType::DateTime, Value::DateTime(_)) => true,
            _ => false,
        }
    }

    /// Parse a literal written as text into a value of this type.
    /// `null` (any case) is the explicit null marker.
    pub fn parse_literal(&self, text: &str) -> Option<Value> {
        if text.eq_ignore_ascii_case("null") {
            return Some(Value::Null);
        }
        match self {
            ColumnType::BigInteger | ColumnType::Integer => text.parse().ok().map(Value::Integer),
            ColumnType::Boolean => match text.to_ascii_lowercase().as_str() {
                "true" | "1" => Some(Value::Boolean(true)),
                "false" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            ColumnType::Float | ColumnType::Numeric => text
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Real),
            ColumnType::Text | ColumnType::String => Some(Value::Text(text.to_string())),
            ColumnType::Date => NaiveDate::parse_from_str(text, DATE_FORMAT).ok().map(Value::Date),
            ColumnType::DateTime => NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                .ok()
                .map(Value::DateTime),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl FromStr for ColumnType {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        let ty = match s.to_ascii_lowercase().as_str() {
            "biginteger" | "bigint" => ColumnType::BigInteger,
            "boolean" | "bool" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "datetime" | "timestamp" => ColumnType::DateTime,
            "integer" | "int" => ColumnType::Integer,
            "float" | "real" | "double" => ColumnType::Float,
            "numeric" | "decimal" => ColumnType::Numeric,
            "text" => ColumnType::Text,
            "string" | "varchar" => ColumnType::String,
            other => {
                return Err(EditorError::InvalidColumn {
                    column: String::new(),
                    reason: format!("unknown column type '{}'", other),
                })
            }
        };
        Ok(ty)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Constraints {
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub autoincrement: bool,
    /// `Some(Value::Null)` is an explicit `DEFAULT NULL`
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDef {
    name: String,
    column_type: ColumnType,
    constraints: Constraints,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            constraints: Constraints::default(),
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.constraints.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.constraints.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.constraints.unique = true;
        self
    }

    pub fn autoincrement(mut self) -> Self {
        self.constraints.autoincrement = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.constraints.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.primary_key
    }

    /// Check the constraint invariants of a single column.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| EditorError::InvalidColumn {
            column: self.name.clone(),
            reason,
        };

        if self.name.is_empty() {
            return Err(invalid("column name is empty".to_string()));
        }
        if self.constraints.autoincrement && !self.constraints.primary_key {
            return Err(invalid("autoincrement requires a primary key".to_string()));
        }
        if self.constraints.autoincrement && !self.column_type.is_integer() {
            return Err(invalid(format!(
                "autoincrement requires an integer type, not {}",
                self.column_type
            )));
        }
        if let Some(default) = &self.constraints.default {
            // SQL has no literal for inf or NaN
            if matches!(default, Value::Real(f) if !f.is_finite()) {
                return Err(invalid("default must be a finite number".to_string()));
            }
            if !self.column_type.accepts(default) {
                return Err(invalid(format!(
                    "default {} does not match type {}",
                    default.to_sql_literal(),
                    self.column_type
                )));
            }
        }
        Ok(())
    }

    /// Column clause of a `CREATE TABLE` statement. `inline_pk` is set when
    /// this column alone forms the primary key.
    pub fn to_sql(&self, inline_pk: bool) -> String {
        // SQLite only allows AUTOINCREMENT on an INTEGER PRIMARY KEY.
        let type_name = if self.constraints.autoincrement {
            ColumnType::Integer.sql_name()
        } else {
            self.column_type.sql_name()
        };

        let mut sql = format!("{} {}", quote_ident(&self.name), type_name);
        if inline_pk {
            sql.push_str(" PRIMARY KEY");
            if self.constraints.autoincrement {
                sql.push_str(" AUTOINCREMENT");
            }
        }
        if self.constraints.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.constraints.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.constraints.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(&default.to_sql_literal());
        }
        sql
    }
}

impl FromStr for ColumnDef {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.split(':');
        let name = parts.next().unwrap_or_default().trim();
        let invalid = |reason: String| EditorError::InvalidColumn {
            column: name.to_string(),
            reason,
        };

        let column_type: ColumnType = parts
            .next()
            .ok_or_else(|| invalid("missing column type".to_string()))?
            .trim()
            .parse()
            .map_err(|_| invalid(format!("cannot parse type in '{}'", s)))?;

        let mut column = ColumnDef::new(name, column_type);
        for flag in parts {
            let flag = flag.trim();
            match flag.to_ascii_lowercase().as_str() {
                "pk" | "primary-key" => column = column.primary_key(),
                "autoincrement" | "auto" => column = column.autoincrement(),
                "not-null" | "notnull" => column = column.not_null(),
                "unique" => column = column.unique(),
                lower if lower.starts_with("default=") => {
                    let literal = &flag["default=".len()..];
                    let value = column_type.parse_literal(literal).ok_or_else(|| {
                        invalid(format!("default '{}' is not a valid {}", literal, column_type))
                    })?;
                    column = column.with_default(value);
                }
                _ => return Err(invalid(format!("unknown column flag '{}'", flag))),
            }
        }

        column.validate()?;
        Ok(column)
    }
}
