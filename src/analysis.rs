use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;

use crate::model::PenaltyLabel;
use crate::sink::{UTF8_BOM, read_rows, write_row};

/// 依 Target 數字代碼補上文字標籤欄位，產出對照檔。
///
/// 讀回紀錄表，在每列尾端加上 TargetName 欄位
/// （punitive / compensatory / notdefine），回傳處理的資料列數。
pub fn merge_label_names(record_csv: &Path, output_csv: &Path) -> Result<usize> {
    let rows = read_rows(record_csv)?;
    let mut iter = rows.into_iter();
    let header = iter
        .next()
        .ok_or_else(|| anyhow!("紀錄檔為空: {}", record_csv.display()))?;
    let target_idx = header
        .iter()
        .position(|name| name == "Target")
        .ok_or_else(|| anyhow!("紀錄檔缺少 Target 欄位"))?;

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(UTF8_BOM.as_bytes());
    let mut new_header = header;
    new_header.push("TargetName".to_string());
    write_row(&mut out, &new_header)?;

    let mut count = 0;
    for mut row in iter {
        let code = row
            .get(target_idx)
            .and_then(|value| value.parse::<u8>().ok())
            .unwrap_or(0);
        row.push(PenaltyLabel::from_code(code).name().to_string());
        write_row(&mut out, &row)?;
        count += 1;
    }
    fs::write(output_csv, out)
        .with_context(|| format!("寫入對照檔失敗: {}", output_csv.display()))?;
    Ok(count)
}
