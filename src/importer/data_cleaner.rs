// ==========================================
// 用户导入服务 - 数据清洗器实现
// ==========================================
// 职责: 必填列校验 / TRIM / 邮箱小写 / 丢弃不完整行
// ==========================================

use crate::domain::table::{normalize_email, CellValue, Table, REQUIRED_COLUMNS};
use crate::domain::table::{EMAIL_COLUMN, NAME_COLUMN};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::table_importer_trait::DataCleaner as DataCleanerTrait;
use tracing::debug;

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn clean_table(&self, table: Table) -> ImportResult<Table> {
        // 必填列校验
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| table.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(
                REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            ));
        }

        if table.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        // 上面已校验列存在
        let name_idx = table.column_index(NAME_COLUMN).unwrap_or_default();
        let email_idx = table.column_index(EMAIL_COLUMN).unwrap_or_default();

        let Table { columns, rows } = table;
        let total = rows.len();
        let rows: Vec<_> = rows
            .into_iter()
            .filter_map(|mut row| {
                row.cells.resize(columns.len(), CellValue::Null);
                let name = self.clean_text(&row.cells[name_idx].as_text());
                let email = normalize_email(&row.cells[email_idx].as_text());
                if name.is_empty() || email.is_empty() {
                    return None;
                }
                row.cells[name_idx] = CellValue::Text(name);
                row.cells[email_idx] = CellValue::Text(email);
                Some(row)
            })
            .collect();

        debug!(total = total, kept = rows.len(), "数据清洗完成");

        if rows.is_empty() {
            return Err(ImportError::EmptyFile);
        }

        Ok(Table::new(columns, rows))
    }

    fn clean_text(&self, value: &str) -> String {
        value.trim().to_string()
    }
}

impl DataCleaner {
    /// 邮箱格式校验（local@domain.tld）
    pub fn is_valid_email(&self, email: &str) -> bool {
        let mut parts = email.split('@');
        let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
            return false;
        };
        !local.is_empty()
            && !email.chars().any(char::is_whitespace)
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Row;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_clean_table_normalizes_name_and_email() {
        let table = Table::new(
            vec!["name".to_string(), "email".to_string(), "note".to_string()],
            vec![Row::new(vec![text("  Ana  "), text("  Ana@X.COM "), text("  keep ")])],
        );
        let cleaned = DataCleaner.clean_table(table).unwrap();

        assert_eq!(cleaned.cell(0, "name"), Some(&text("Ana")));
        assert_eq!(cleaned.cell(0, "email"), Some(&text("ana@x.com")));
        // 非必填列原样保留
        assert_eq!(cleaned.cell(0, "note"), Some(&text("  keep ")));
    }

    #[test]
    fn test_clean_table_drops_incomplete_rows() {
        let table = Table::new(
            vec!["name".to_string(), "email".to_string()],
            vec![
                Row::new(vec![text("Ana"), text("ana@x.com")]),
                Row::new(vec![text("   "), text("b@x.com")]),
                Row::new(vec![text("Carl"), CellValue::Null]),
            ],
        );
        let cleaned = DataCleaner.clean_table(table).unwrap();
        assert_eq!(cleaned.len(), 1);
    }

    #[test]
    fn test_clean_table_missing_columns() {
        let table = Table::new(
            vec!["nombre".to_string(), "email".to_string()],
            vec![Row::new(vec![text("Ana"), text("ana@x.com")])],
        );
        let result = DataCleaner.clean_table(table);
        assert!(matches!(result, Err(ImportError::MissingColumns(_))));
    }

    #[test]
    fn test_clean_table_empty() {
        let table = Table::new(vec!["name".to_string(), "email".to_string()], vec![]);
        assert!(matches!(DataCleaner.clean_table(table), Err(ImportError::EmptyFile)));

        let only_blank = Table::new(
            vec!["name".to_string(), "email".to_string()],
            vec![Row::new(vec![text(" "), text("a@x.com")])],
        );
        assert!(matches!(DataCleaner.clean_table(only_blank), Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_numeric_name_is_kept_as_text() {
        let table = Table::new(
            vec!["name".to_string(), "email".to_string()],
            vec![Row::new(vec![CellValue::Int(42), text("n@x.com")])],
        );
        let cleaned = DataCleaner.clean_table(table).unwrap();
        assert_eq!(cleaned.cell(0, "name"), Some(&text("42")));
    }

    #[test]
    fn test_is_valid_email() {
        let cleaner = DataCleaner;
        assert!(cleaner.is_valid_email("ana@x.com"));
        assert!(!cleaner.is_valid_email("ana@x"));
        assert!(!cleaner.is_valid_email("@x.com"));
        assert!(!cleaner.is_valid_email("a@b@x.com"));
        assert!(!cleaner.is_valid_email("a b@x.com"));
        assert!(!cleaner.is_valid_email("ana@.com"));
    }
}
