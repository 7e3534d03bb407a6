//! Storage-agnostic table and column definitions used by migration units.
//!
//! The Postgres store renders them to SQL; the in-memory store keeps them as
//! its catalog.

use crate::error::{CmsError, CmsResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Auto-incrementing 64-bit key
    Serial,
    Integer,
    BigInteger,
    Boolean,
    Text,
    Varchar(u32),
    Decimal,
    Timestamp,
    Json,
}

impl ColumnType {
    fn sql(&self) -> String {
        match self {
            Self::Serial => "BIGSERIAL".to_string(),
            Self::Integer => "INTEGER".to_string(),
            Self::BigInteger => "BIGINT".to_string(),
            Self::Boolean => "BOOLEAN".to_string(),
            Self::Text => "TEXT".to_string(),
            Self::Varchar(len) => format!("VARCHAR({len})"),
            Self::Decimal => "NUMERIC(12, 2)".to_string(),
            Self::Timestamp => "TIMESTAMPTZ".to_string(),
            Self::Json => "JSONB".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// Raw SQL default expression
    pub default: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            primary_key: false,
            unique: false,
            default: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_value(mut self, expression: impl Into<String>) -> Self {
        self.default = Some(expression.into());
        self
    }

    pub fn to_sql(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.column_type.sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique && !self.primary_key {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
}

impl TableDefinition {
    /// Table with a `BIGSERIAL` `id` primary key
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: vec![ColumnDefinition::new("id", ColumnType::Serial).primary_key()],
        }
    }

    pub fn column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds `created_at` / `updated_at` defaulting to now
    pub fn timestamps(self) -> Self {
        self.column(ColumnDefinition::new("created_at", ColumnType::Timestamp).default_value("NOW()"))
            .column(ColumnDefinition::new("updated_at", ColumnType::Timestamp).default_value("NOW()"))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn validate(&self) -> CmsResult<()> {
        validate_identifier(&self.name)?;
        for column in &self.columns {
            validate_identifier(&column.name)?;
        }

        let mut names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        names.sort_unstable();
        if names.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(CmsError::validation(format!(
                "Table '{}' declares a column twice",
                self.name
            )));
        }

        Ok(())
    }

    pub fn to_create_sql(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(ColumnDefinition::to_sql).collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.name,
            columns.join(", ")
        )
    }
}

/// Table and column names are interpolated into DDL, so only plain
/// identifiers are accepted
pub fn validate_identifier(name: &str) -> CmsResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false);

    if valid_start
        && name.len() <= 63
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        Ok(())
    } else {
        Err(CmsError::validation(format!("Invalid identifier '{name}'")))
    }
}
