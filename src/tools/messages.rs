//! Localized tool descriptions and response text.

use crate::config::Locale;
use crate::error::{DbError, SqlPosition};
use crate::models::{InvalidKind, TableDescriptor, ValidationOutcome};
use crate::tools::ToolKind;

/// Strings for one locale.
#[derive(Debug, Clone, Copy, Default)]
pub struct Messages {
    locale: Locale,
}

impl Messages {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    fn pick(&self, zh: &'static str, en: &'static str) -> &'static str {
        match self.locale {
            Locale::Zh => zh,
            Locale::En => en,
        }
    }

    pub fn description(&self, tool: ToolKind) -> &'static str {
        match tool {
            ToolKind::ListTables => self.pick(
                "列出数据库中所有表名及描述信息。无需输入参数。",
                "List every table in the database with its description. Takes no input.",
            ),
            ToolKind::Schema => self.pick(
                "获取指定表的结构和示例行。输入为逗号分隔的表名列表，例如：table1, table2, table3。\
                 请先调用 sql_db_list_tables 确认这些表存在！省略输入则返回所有表的结构。",
                "Get the schema and sample rows of the given tables. Input is a comma-separated \
                 list of table names, e.g. table1, table2, table3. Call sql_db_list_tables first \
                 to make sure the tables exist! Omit the input to describe every table.",
            ),
            ToolKind::Query => self.pick(
                "对数据库执行一条SQL查询并返回结果。如果查询有误，将返回错误信息；\
                 此时请改写查询，检查后重试。如果遇到 Unknown column 之类的错误，\
                 请使用 sql_db_schema 查看正确的字段。",
                "Execute a SQL query against the database and get back the result. If the query \
                 is not correct, an error message is returned; rewrite the query, check it, and \
                 try again. If you hit an unknown column error, use sql_db_schema to look up \
                 the correct columns.",
            ),
            ToolKind::QueryChecker => self.pick(
                "在执行查询前检查SQL语句是否正确，不会修改任何数据。\
                 使用 sql_db_query 执行查询前请务必先用本工具检查！",
                "Double check whether a SQL query is correct before executing it. Never changes \
                 any data. Always use this tool before executing a query with sql_db_query!",
            ),
        }
    }

    /// Prefix put in front of every failure returned by `tool`.
    pub fn error_prefix(&self, tool: ToolKind) -> &'static str {
        match tool {
            ToolKind::ListTables => self.pick("列出表时出错：", "Error listing tables: "),
            ToolKind::Schema => self.pick("获取表结构时出错：", "Error getting table schema: "),
            ToolKind::Query => self.pick("执行查询时出错：", "Error executing query: "),
            ToolKind::QueryChecker => self.pick("检查查询时出错：", "Error checking query: "),
        }
    }

    /// Render a failure as the string handed back to the agent.
    pub fn error(&self, tool: ToolKind, err: &DbError) -> String {
        let mut text = format!("{}{}", self.error_prefix(tool), err);
        if let Some(suggestion) = err.suggestion() {
            text.push('\n');
            text.push_str(self.pick("建议：", "Suggestion: "));
            text.push_str(suggestion);
        }
        text
    }

    pub fn invalid_arguments(&self, tool: ToolKind, detail: &str) -> String {
        format!(
            "{}{}{}",
            self.error_prefix(tool),
            self.pick("参数无效：", "invalid arguments: "),
            detail
        )
    }

    pub fn unknown_tool(&self, name: &str) -> String {
        match self.locale {
            Locale::Zh => format!("错误：未知工具 {name}"),
            Locale::En => format!("Error: unknown tool {name}"),
        }
    }

    pub fn no_description(&self) -> &'static str {
        self.pick("暂无描述", "No description")
    }

    /// Numbered two-line entry per table, preceded by the total count.
    pub fn table_list(&self, tables: &[TableDescriptor]) -> String {
        let mut text = match self.locale {
            Locale::Zh => format!("数据库中共有{} 个表：\n\n", tables.len()),
            Locale::En => format!("The database contains {} tables:\n\n", tables.len()),
        };
        for (i, table) in tables.iter().enumerate() {
            let description = table.description().unwrap_or(self.no_description());
            let entry = match self.locale {
                Locale::Zh => format!(
                    "{}. 表名：{}\n  描述：{}\n\n",
                    i + 1,
                    table.table_name,
                    description
                ),
                Locale::En => format!(
                    "{}. Table: {}\n  Description: {}\n\n",
                    i + 1,
                    table.table_name,
                    description
                ),
            };
            text.push_str(&entry);
        }
        text
    }

    pub fn no_matching_tables(&self, requested: &[String]) -> String {
        let names = requested.join(", ");
        match self.locale {
            Locale::Zh => format!("未找到匹配的表：{names}。请先调用 sql_db_list_tables 查看可用的表。"),
            Locale::En => format!(
                "No matching tables found: {names}. Call sql_db_list_tables to see the available tables."
            ),
        }
    }

    pub fn truncated(&self, row_limit: u32) -> String {
        match self.locale {
            Locale::Zh => format!("（结果已截断，仅显示前 {row_limit} 行）"),
            Locale::En => format!("(result truncated to the first {row_limit} rows)"),
        }
    }

    pub fn validation(&self, outcome: &ValidationOutcome) -> String {
        match outcome {
            ValidationOutcome::Valid { normalized } => {
                let mut text = self
                    .pick("查询语句正确。", "The query is valid.")
                    .to_string();
                if let Some(sql) = normalized {
                    text.push_str(self.pick("\n\n规范化语句：\n", "\n\nNormalized:\n"));
                    text.push_str(sql);
                }
                text
            }
            ValidationOutcome::Invalid {
                kind,
                message,
                position,
            } => {
                let mut text = match self.locale {
                    Locale::Zh => format!("查询语句无效（{}）：{}", self.kind_label(*kind), message),
                    Locale::En => {
                        format!("The query is invalid ({}): {}", self.kind_label(*kind), message)
                    }
                };
                if let Some(position) = position {
                    text.push_str(&self.position(position));
                }
                text
            }
        }
    }

    fn kind_label(&self, kind: InvalidKind) -> &'static str {
        match kind {
            InvalidKind::Syntax => self.pick("语法错误", "syntax error"),
            InvalidKind::Rejected => self.pick("数据库拒绝", "rejected by the database"),
            InvalidKind::Blocked => self.pick("只读连接不允许", "not allowed on a read-only connection"),
        }
    }

    fn position(&self, position: &SqlPosition) -> String {
        match self.locale {
            Locale::Zh => format!("（第 {} 行，第 {} 列）", position.line, position.column),
            Locale::En => format!(" (line {}, column {})", position.line, position.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_list_zh() {
        let tables = vec![
            TableDescriptor::new("t_student", "学生表"),
            TableDescriptor::new("t_rolemodel", "  "),
        ];
        let text = Messages::new(Locale::Zh).table_list(&tables);
        assert_eq!(
            text,
            "数据库中共有2 个表：\n\n\
             1. 表名：t_student\n  描述：学生表\n\n\
             2. 表名：t_rolemodel\n  描述：暂无描述\n\n"
        );
    }

    #[test]
    fn test_table_list_en() {
        let tables = vec![TableDescriptor::new("users", "")];
        let text = Messages::new(Locale::En).table_list(&tables);
        assert!(text.starts_with("The database contains 1 tables:\n\n"));
        assert!(text.contains("1. Table: users\n  Description: No description\n"));
    }

    #[test]
    fn test_error_with_suggestion() {
        let err = DbError::execution("no such table: nope", None, "Check the table name");
        let text = Messages::new(Locale::En).error(ToolKind::Query, &err);
        assert_eq!(
            text,
            "Error executing query: Execution failed: no such table: nope\nSuggestion: Check the table name"
        );

        let zh = Messages::new(Locale::Zh).error(ToolKind::ListTables, &DbError::introspection("x"));
        assert!(zh.starts_with("列出表时出错："));
    }

    #[test]
    fn test_validation_rendering() {
        let messages = Messages::new(Locale::En);
        let invalid = ValidationOutcome::Invalid {
            kind: InvalidKind::Syntax,
            message: "Expected: an expression".to_string(),
            position: Some(SqlPosition { line: 1, column: 8 }),
        };
        assert_eq!(
            messages.validation(&invalid),
            "The query is invalid (syntax error): Expected: an expression (line 1, column 8)"
        );

        let valid = ValidationOutcome::Valid {
            normalized: Some("SELECT 1".to_string()),
        };
        assert_eq!(
            messages.validation(&valid),
            "The query is valid.\n\nNormalized:\nSELECT 1"
        );
    }
}
