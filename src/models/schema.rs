//! Schema-related data models.
//!
//! [`TableSchema`] renders itself as the `CREATE TABLE` text handed to the
//! agent; nothing here is cached between tool calls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the table listing: a name and its catalog comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_name: String,
    /// May be empty or whitespace; see [`TableDescriptor::description`].
    pub table_comment: String,
}

impl TableDescriptor {
    pub fn new(table_name: impl Into<String>, table_comment: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            table_comment: table_comment.into(),
        }
    }

    /// The comment, or `None` when it is empty or whitespace-only.
    pub fn description(&self) -> Option<&str> {
        let trimmed = self.table_comment.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub table_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<SampleRows>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            comment: None,
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
            sample: None,
        }
    }

    /// Set the table comment. Blank comments are dropped.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        self.comment = (!comment.trim().is_empty()).then(|| comment.trim().to_string());
        self
    }

    pub fn with_column(mut self, column: ColumnDefinition) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_primary_key(mut self, columns: Vec<String>) -> Self {
        self.primary_key = columns;
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn with_sample(mut self, sample: SampleRows) -> Self {
        self.sample = Some(sample);
        self
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(comment) = &self.comment {
            for line in comment.lines() {
                writeln!(f, "-- {}", line)?;
            }
        }
        writeln!(f, "CREATE TABLE {} (", self.table_name)?;

        let mut lines: Vec<String> = self.columns.iter().map(|c| c.to_string()).collect();
        if !self.primary_key.is_empty() {
            lines.push(format!("PRIMARY KEY ({})", self.primary_key.join(", ")));
        }
        lines.extend(self.foreign_keys.iter().map(|fk| fk.to_string()));
        writeln!(f, "\t{}", lines.join(",\n\t"))?;
        write!(f, ")")?;

        if let Some(sample) = &self.sample {
            write!(f, "\n\n/*\n{} rows from {} table:\n", sample.rows.len(), self.table_name)?;
            write!(f, "{}", sample)?;
            write!(f, "*/")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    /// Full type as the catalog reports it (e.g., `varchar(30)`, `bigint unsigned`)
    pub data_type: String,
    pub nullable: bool,
    /// Raw default expression as stored in the catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
            is_primary_key: false,
            comment: None,
        }
    }

    pub fn with_primary_key(mut self, is_pk: bool) -> Self {
        self.is_primary_key = is_pk;
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Set the column comment. Blank comments are dropped.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        self.comment = (!comment.trim().is_empty()).then_some(comment);
        self
    }
}

impl fmt::Display for ColumnDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data_type = if self.data_type.is_empty() {
            // SQLite allows untyped columns
            "ANY".to_string()
        } else {
            self.data_type.to_uppercase()
        };
        write!(f, "{} {}", self.name, data_type)?;
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        if let Some(default) = &self.default_value {
            write!(f, " DEFAULT {}", default)?;
        }
        if let Some(comment) = &self.comment {
            write!(f, " COMMENT '{}'", comment.replace('\'', "''"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

impl ForeignKey {
    pub fn new(
        column: impl Into<String>,
        references_table: impl Into<String>,
        references_column: impl Into<String>,
    ) -> Self {
        Self {
            column: column.into(),
            references_table: references_table.into(),
            references_column: references_column.into(),
        }
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FOREIGN KEY({}) REFERENCES {} ({})",
            self.column, self.references_table, self.references_column
        )
    }
}

/// First rows of a table, already rendered to text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl fmt::Display for SampleRows {
    /// Tab-separated header and rows, one per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            writeln!(f, "{}", row.join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_description() {
        assert_eq!(
            TableDescriptor::new("t_student", "学生表").description(),
            Some("学生表")
        );
        assert_eq!(TableDescriptor::new("t_rolemodel", "").description(), None);
        assert_eq!(TableDescriptor::new("t", " \t\n").description(), None);
    }

    #[test]
    fn test_table_schema_render() {
        let schema = TableSchema::new("t_student")
            .with_comment("学生表")
            .with_column(ColumnDefinition::new("id", "int", false).with_primary_key(true))
            .with_column(ColumnDefinition::new("name", "varchar(20)", true).with_comment("姓名"))
            .with_column(ColumnDefinition::new("age", "int", true).with_default("18"))
            .with_column(ColumnDefinition::new("class_id", "int", true))
            .with_primary_key(vec!["id".to_string()])
            .with_foreign_key(ForeignKey::new("class_id", "t_class", "id"));

        assert_eq!(
            schema.to_string(),
            "-- 学生表\n\
             CREATE TABLE t_student (\n\
             \tid INT NOT NULL,\n\
             \tname VARCHAR(20) COMMENT '姓名',\n\
             \tage INT DEFAULT 18,\n\
             \tclass_id INT,\n\
             \tPRIMARY KEY (id),\n\
             \tFOREIGN KEY(class_id) REFERENCES t_class (id)\n\
             )"
        );
    }

    #[test]
    fn test_table_schema_render_with_sample() {
        let schema = TableSchema::new("t_rolemodel")
            .with_comment("   ")
            .with_column(ColumnDefinition::new("name", "text", true))
            .with_sample(SampleRows {
                columns: vec!["name".to_string()],
                rows: vec![vec!["丘丘".to_string()], vec!["NULL".to_string()]],
            });

        let text = schema.to_string();
        assert!(!text.starts_with("--"));
        assert!(text.ends_with("/*\n2 rows from t_rolemodel table:\nname\n丘丘\nNULL\n*/"));
    }

    #[test]
    fn test_column_comment_quotes_escaped() {
        let column = ColumnDefinition::new("nick", "text", true).with_comment("it's");
        assert_eq!(column.to_string(), "nick TEXT COMMENT 'it''s'");
    }

    #[test]
    fn test_untyped_sqlite_column() {
        let column = ColumnDefinition::new("payload", "", true);
        assert_eq!(column.to_string(), "payload ANY");
    }
}
