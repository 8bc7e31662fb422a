// ==========================================
// 用户导入服务 - 文件解析器实现
// ==========================================
// 职责: 上传字节流 → 原始工作表（表头 + 数据行）
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// ==========================================

use crate::domain::table::{CellValue, Row, Table, MAX_EXACT_F64_INT};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::table_importer_trait::FileParser;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::io::Cursor;

// ==========================================
// 源文件格式
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Xlsx,
    Xls,
    Csv,
}

impl SourceFormat {
    /// 按文件扩展名识别格式（大小写不敏感）
    pub fn from_file_name(file_name: &str) -> ImportResult<Self> {
        let ext = std::path::Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "xlsx" => Ok(SourceFormat::Xlsx),
            "xls" => Ok(SourceFormat::Xls),
            "csv" => Ok(SourceFormat::Csv),
            _ => Err(ImportError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_table(&self, bytes: &[u8]) -> ImportResult<Table> {
        // 去掉 UTF-8 BOM
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(bytes);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut cells: Vec<CellValue> = record
                .iter()
                .take(columns.len())
                .map(cell_from_csv)
                .collect();
            cells.resize(columns.len(), CellValue::Null);

            let row = Row::new(cells);
            // 跳过完全空白的行
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        Ok(Table::new(columns, rows))
    }
}

/// CSV 文本 → 单元格值（只识别可无损还原的数字）
fn cell_from_csv(raw: &str) -> CellValue {
    if raw.is_empty() {
        return CellValue::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        if i.to_string() == raw {
            return CellValue::Int(i);
        }
    }
    let numeric_chars = raw.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-');
    if numeric_chars && raw.contains('.') {
        if let Ok(f) = raw.parse::<f64>() {
            // 30.0 与工作簿读取一致，收敛为 Int
            return CellValue::from_f64(f);
        }
    }
    CellValue::Text(raw.to_string())
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl FileParser for ExcelParser {
    fn parse_to_table(&self, bytes: &[u8]) -> ImportResult<Table> {
        // 自动识别 xlsx / xls / xlsb / ods
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // 读取第一个 sheet
        let sheet_names = workbook.sheet_names();
        let sheet_name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| ImportError::FormatError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）；空工作表视为无列
        let mut rows_iter = range.rows();
        let columns: Vec<String> = match rows_iter.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            None => return Ok(Table::default()),
        };

        // 读取数据行
        let mut rows = Vec::new();
        for data_row in rows_iter {
            let mut cells: Vec<CellValue> = data_row
                .iter()
                .take(columns.len())
                .map(cell_from_excel)
                .collect();
            cells.resize(columns.len(), CellValue::Null);

            let row = Row::new(cells);
            // 跳过完全空白的行
            if row.is_blank() {
                continue;
            }
            rows.push(row);
        }

        Ok(Table::new(columns, rows))
    }
}

/// Excel 单元格 → 单元格值
fn cell_from_excel(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::from_f64(*f),
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) => match parse_wide_int(s) {
            Some(i) => CellValue::Int(i),
            None => CellValue::Text(s.clone()),
        },
        // 布尔 / 日期 / 错误值按显示文本保存
        other => CellValue::Text(other.to_string()),
    }
}

/// 超出 f64 精确范围的整数以文本写入工作簿，读取时还原为 Int
fn parse_wide_int(s: &str) -> Option<i64> {
    let i = s.parse::<i64>().ok()?;
    (i.unsigned_abs() > MAX_EXACT_F64_INT && i.to_string() == s).then_some(i)
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse(&self, file_name: &str, bytes: &[u8]) -> ImportResult<Table> {
        match SourceFormat::from_file_name(file_name)? {
            SourceFormat::Csv => CsvParser.parse_to_table(bytes),
            SourceFormat::Xlsx | SourceFormat::Xls => ExcelParser.parse_to_table(bytes),
        }
    }
}
