use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::mem::take;
use std::path::{Path, PathBuf};

use crate::model::{PenaltyLabel, PersistedRecord};

/// 輸出檔開頭的 UTF-8 BOM，確保試算表軟體正確辨識編碼
pub(crate) const UTF8_BOM: &str = "\u{feff}";

/// 紀錄表表頭
pub const RECORD_HEADER: [&str; 7] = [
    "序號",
    "案件名稱",
    "裁判日期",
    "裁判案由",
    "違約金類型",
    "最終違約金類型",
    "Target",
];

/// 標籤表表頭
pub const TARGET_HEADER: [&str; 1] = ["Target"];

fn needs_quotes(field: &str) -> bool {
    field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// 寫出一列 CSV，必要時加引號並以雙引號跳脫
pub fn write_row<W: Write, S: AsRef<str>>(mut w: W, row: &[S]) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        let cell = cell.as_ref();
        if !first {
            write!(w, ",")?;
        } else {
            first = false;
        }
        if needs_quotes(cell) {
            let escaped = cell.replace('"', "\"\"");
            write!(w, "\"{escaped}\"")?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

/// 容錯的 CSV 解析器（引號與 CRLF 皆可），供回讀輸出檔使用
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            ',' if !in_quotes => {
                row.push(take(&mut field));
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !row.is_empty() && !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    // 結尾沒有換行的最後一列也要收
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// 讀回輸出檔的所有列，自動剝除 BOM
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("讀取輸出檔失敗: {}", path.display()))?;
    Ok(parse_rows(text.trim_start_matches('\u{feff}')))
}

/// 附加式 CSV 輸出端。
///
/// 每筆各寫一次紀錄表與標籤表；表頭只在檔案為空時寫一次，之後純附加。
/// 檔案控制代碼逐筆開關，不跨請求持有。兩表之間沒有交易性：
/// 兩次寫入之間中斷會讓兩表相差一列。
pub struct CsvSink {
    record_path: PathBuf,
    target_path: PathBuf,
}

impl CsvSink {
    pub fn new(record_path: impl Into<PathBuf>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            record_path: record_path.into(),
            target_path: target_path.into(),
        }
    }

    pub fn append_record(&self, record: &PersistedRecord) -> Result<()> {
        append_row(&self.record_path, &RECORD_HEADER, &record.to_row())
    }

    pub fn append_target(&self, label: PenaltyLabel) -> Result<()> {
        append_row(&self.target_path, &TARGET_HEADER, &[label.code().to_string()])
    }
}

fn append_row(path: &Path, header: &[&str], row: &[String]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("開啟輸出檔失敗: {}", path.display()))?;
    if file.metadata()?.len() == 0 {
        file.write_all(UTF8_BOM.as_bytes())?;
        write_row(&mut file, header)?;
    }
    write_row(&mut file, row)?;
    Ok(())
}
