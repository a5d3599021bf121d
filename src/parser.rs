use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};

use crate::dates::convert_roc_date;
use crate::model::CaseSummary;

/// 裁判全文保留的最大字元數，同時限制記憶體與分類請求的大小
pub const MAX_CONTENT_CHARS: usize = 5000;

/// 取不到裁判日期時的哨兵值
pub const UNKNOWN_DATE: &str = "未知";

/// 詳細頁上裁判日期欄位的文字標記
const DATE_MARKER: &str = "裁判日期：";

/// 固定字串的 CSS 選擇器，解析失敗屬程式錯誤
fn css(selector: &str) -> Selector {
    Selector::parse(selector).expect("CSS 選擇器不合法")
}

/// 查詢表單需要的 ASP.NET 隱藏欄位
#[derive(Debug, Clone)]
pub struct SearchFormState {
    pub viewstate: String,
    pub viewstate_generator: String,
    pub event_validation: String,
}

fn hidden_input(document: &Html, id: &str) -> Result<String> {
    let selector = Selector::parse(&format!("input#{id}"))
        .map_err(|e| anyhow!("選擇器解析失敗: {}", e))?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(str::to_string)
        .ok_or_else(|| anyhow!("搜尋首頁缺少隱藏欄位 {}", id))
}

/// 從搜尋首頁讀出防偽的隱藏表單欄位。缺少任一欄位即為錯誤：
/// 沒有這些欄位就無法送出查詢，爬取流程必須中止。
pub fn parse_hidden_form_state(html: &str) -> Result<SearchFormState> {
    let document = Html::parse_document(html);
    Ok(SearchFormState {
        viewstate: hidden_input(&document, "__VIEWSTATE")?,
        viewstate_generator: hidden_input(&document, "__VIEWSTATEGENERATOR")?,
        event_validation: hidden_input(&document, "__EVENTVALIDATION")?,
    })
}

/// 組出送出查詢的表單內容
pub fn build_search_form(state: &SearchFormState, keyword: &str) -> Vec<(String, String)> {
    vec![
        ("__VIEWSTATE".to_string(), state.viewstate.clone()),
        ("__VIEWSTATEGENERATOR".to_string(), state.viewstate_generator.clone()),
        ("__EVENTVALIDATION".to_string(), state.event_validation.clone()),
        ("txtKW".to_string(), keyword.to_string()),
        ("judtype".to_string(), "JUDBOOK".to_string()),
        ("whosub".to_string(), "0".to_string()),
        ("ctl00$cp_content$btnSimpleQry".to_string(), "送出查詢".to_string()),
    ]
}

/// 從查詢結果外框頁找出結果列表 iframe 的來源網址，找不到時回傳空字串
pub fn parse_main_page(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&css("iframe#iframe-data"))
        .next()
        .and_then(|el| el.value().attr("src"))
        .unwrap_or_default()
        .to_string()
}

/// 從結果列表頁擷取案件標題、案由與連結。
///
/// 回傳兩個空容器代表頁面上已無任何標題，是爬取迴圈的終止訊號，
/// 與網路層失敗（fetch 回傳 None）是不同的情況。
pub fn parse_results_page(html: &str) -> (Vec<CaseSummary>, Vec<String>) {
    let document = Html::parse_document(html);
    let td_selector = css("td");
    let mut data = Vec::new();
    let mut links = Vec::new();
    for title_el in document.select(&css(".hlTitle_scroll")) {
        let title = title_el.text().collect::<String>().trim().to_string();
        let link = title_el.value().attr("href").unwrap_or_default().to_string();
        // 裁判案由在同一列的第四個儲存格
        let category = title_el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "tr")
            .and_then(|row| row.select(&td_selector).nth(3))
            .map(|td| td.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        links.push(link.clone());
        data.push(CaseSummary { title, category, link });
    }
    (data, links)
}

/// 清理詳細頁內容：取出全文容器的純文字並截斷長度。
/// 找不到容器時回傳空字串，交由完整性檢查過濾。
pub fn parse_detail_page(html: &str) -> String {
    let document = Html::parse_document(html);
    document
        .select(&css(".htmlcontent"))
        .next()
        .map(|el| {
            let text: String = el.text().collect();
            text.trim().chars().take(MAX_CONTENT_CHARS).collect()
        })
        .unwrap_or_default()
}

/// 從詳細頁擷取裁判日期並轉為西元格式。
///
/// 先找到「裁判日期：」標記所在的節點；日期與標記同節點時直接取標記之後的
/// 文字，否則往後找第一個有文字的兄弟元素。找不到標記時回傳「未知」，
/// 一律不視為錯誤。
pub fn extract_judgment_date(html: &str) -> String {
    let document = Html::parse_document(html);
    for el in document.select(&css("td, th, div, span, label")) {
        let text: String = el.text().collect();
        let Some(after) = text.split(DATE_MARKER).nth(1) else {
            continue;
        };
        let after = after.trim();
        if !after.is_empty() {
            return convert_roc_date(after);
        }
        // 標記單獨成一節點，日期在後續的兄弟元素裡
        let mut sibling = el.next_sibling();
        while let Some(node) = sibling {
            if let Some(next_el) = ElementRef::wrap(node) {
                let next_text = next_el.text().collect::<String>();
                let next_text = next_text.trim();
                if !next_text.is_empty() {
                    return convert_roc_date(next_text);
                }
            }
            sibling = node.next_sibling();
        }
    }
    UNKNOWN_DATE.to_string()
}
