// ==========================================
// 用户导入服务 - Excel 导出器
// ==========================================
// 职责: 工作表 → .xlsx 字节流（表头 + 当前全部行）
// 约束: 数值按数字写出，文本按字符串写出，空值留空
//       超出 2^53 的整数按字符串写出
//       导出结果重新导入后行列一致
// ==========================================

use crate::domain::table::{CellValue, Table, MAX_EXACT_F64_INT};
use crate::importer::error::ImportResult;
use rust_xlsxwriter::Workbook;

/// 导出工作表名
pub const EXPORT_SHEET_NAME: &str = "Usuarios";

/// 导出文件名
pub const EXPORT_FILE_NAME: &str = "usuarios_modificados.xlsx";

/// xlsx MIME 类型
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub struct XlsxExporter;

impl XlsxExporter {
    /// 导出为 xlsx 字节流
    pub fn export(&self, table: &Table) -> ImportResult<Vec<u8>> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(EXPORT_SHEET_NAME)?;

        for (col, name) in table.columns.iter().enumerate() {
            worksheet.write_string(0, col as u16, name.as_str())?;
        }

        for (idx, row) in table.rows.iter().enumerate() {
            let excel_row = (idx + 1) as u32;
            for (col, cell) in row.cells.iter().enumerate().take(table.columns.len()) {
                let col = col as u16;
                match cell {
                    CellValue::Null => {}
                    CellValue::Int(i) if i.unsigned_abs() > MAX_EXACT_F64_INT => {
                        worksheet.write_string(excel_row, col, i.to_string())?;
                    }
                    CellValue::Int(i) => {
                        worksheet.write_number(excel_row, col, *i as f64)?;
                    }
                    CellValue::Float(f) => {
                        worksheet.write_number(excel_row, col, *f)?;
                    }
                    CellValue::Text(s) => {
                        worksheet.write_string(excel_row, col, s.as_str())?;
                    }
                }
            }
        }

        let bytes = workbook.save_to_buffer()?;
        tracing::debug!(rows = table.len(), bytes = bytes.len(), "Excel 导出完成");
        Ok(bytes)
    }
}
