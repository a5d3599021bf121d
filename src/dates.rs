use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

/// 民國紀年與西元紀年的固定差值
pub const ROC_YEAR_OFFSET: i32 = 1911;

static ROC_DATE_RE: OnceLock<Regex> = OnceLock::new();

fn roc_date_re() -> &'static Regex {
    ROC_DATE_RE.get_or_init(|| {
        Regex::new(r"民國\s*(\d+)\s*年\s*(\d+)\s*月\s*(\d+)\s*日")
            .expect("民國日期正規表示式不合法")
    })
}

/// 將民國日期轉換為西元日期（YYYY-MM-DD，月日補零）。
///
/// 不符合格式或不是合法日期的文字原樣返回。這是刻意的盡力而為策略：
/// 轉換失敗不視為錯誤，下游照常寫出原文。
pub fn convert_roc_date(text: &str) -> String {
    let caps = match roc_date_re().captures(text) {
        Some(caps) => caps,
        None => return text.to_string(),
    };
    let (Ok(roc_year), Ok(month), Ok(day)) = (
        caps[1].parse::<i32>(),
        caps[2].parse::<u32>(),
        caps[3].parse::<u32>(),
    ) else {
        return text.to_string();
    };
    let year = roc_year + ROC_YEAR_OFFSET;
    match NaiveDate::from_ymd_opt(year, month, day) {
        Some(_) => format!("{year}-{month:02}-{day:02}"),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_basic() {
        assert_eq!(convert_roc_date("民國113年5月1日"), "2024-05-01");
    }

    #[test]
    fn test_convert_with_spaces() {
        assert_eq!(convert_roc_date("民國 112 年 12 月 31 日"), "2023-12-31");
    }

    #[test]
    fn test_convert_inside_longer_text() {
        // 日期通常夾在其他文字之間，採搜尋而非整串比對
        assert_eq!(convert_roc_date("本件於民國110年1月5日宣判"), "2021-01-05");
    }

    #[test]
    fn test_passthrough_non_matching() {
        assert_eq!(convert_roc_date("未知"), "未知");
        assert_eq!(convert_roc_date(""), "");
    }

    #[test]
    fn test_idempotent_on_converted() {
        // 已轉換過的字串不含民國紀年，再次套用應原樣返回
        let once = convert_roc_date("民國113年5月1日");
        assert_eq!(convert_roc_date(&once), once, "轉換應具冪等性");
    }

    #[test]
    fn test_invalid_calendar_date_passthrough() {
        assert_eq!(convert_roc_date("民國113年13月1日"), "民國113年13月1日");
        assert_eq!(convert_roc_date("民國113年2月30日"), "民國113年2月30日");
    }
}
