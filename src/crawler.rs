use anyhow::{Result, anyhow, bail};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::app::config::AppConfig;
use crate::classifier::{self, GeminiClassifier};
use crate::fetcher::Fetcher;
use crate::model::{CaseSummary, CrawlProgress, CrawlResult, PersistedRecord};
use crate::parser::{
    build_search_form, extract_judgment_date, parse_detail_page, parse_hidden_form_state,
    parse_main_page, parse_results_page,
};
use crate::sink::CsvSink;

pub const BASE_URL: &str = "https://judgment.judicial.gov.tw/FJUD/default.aspx";
pub const DETAILS_BASE_URL: &str = "https://judgment.judicial.gov.tw/FJUD/";

/// 回應內文出現這段文字代表來源暫時拒絕請求
const BUSY_MARKER: &str = "系統忙碌中";

/// 換頁前隨機延遲的下界與區間（毫秒）
const PAGE_DELAY_MIN_MS: u64 = 3000;
const PAGE_DELAY_SPAN_MS: u64 = 2000;

/// 分頁爬取的協調器。
///
/// 流程：送出查詢取得結果列表 → 逐筆抓詳細頁、分類、驗證、寫出 →
/// 換頁重來，直到達成目標筆數、結果頁為空、或來源持續忙碌為止。
/// 全程單執行緒循序執行，已寫出的資料不會因中途失敗而回滾。
pub struct Crawler {
    fetcher: Fetcher,
    classifier: GeminiClassifier,
    sink: CsvSink,
    config: AppConfig,
}

impl Crawler {
    pub fn new(config: AppConfig) -> Result<Self> {
        let fetcher = Fetcher::new(&config)?;
        let classifier = GeminiClassifier::new(&config.api_url, &config.api_key);
        let sink = CsvSink::new(&config.record_output, &config.target_output);
        Ok(Self {
            fetcher,
            classifier,
            sink,
            config,
        })
    }

    pub async fn run(&self) -> Result<CrawlProgress> {
        // 初始階段失敗即中止：沒有查詢結果的 iframe 就無從爬起
        let landing = self
            .fetcher
            .fetch(BASE_URL, None)
            .await
            .ok_or_else(|| anyhow!("無法取得搜尋首頁"))?;
        let state = parse_hidden_form_state(&landing)?;
        let form = build_search_form(&state, &self.config.search_keyword);
        let search_result = self
            .fetcher
            .fetch(BASE_URL, Some(&form))
            .await
            .ok_or_else(|| anyhow!("送出查詢失敗"))?;
        let iframe_src = parse_main_page(&search_result);
        if iframe_src.is_empty() {
            bail!("查詢結果頁缺少結果列表 iframe");
        }
        let iframe_url = format!("{DETAILS_BASE_URL}{iframe_src}");
        let mut page_content = self
            .fetcher
            .fetch(&iframe_url, None)
            .await
            .ok_or_else(|| anyhow!("無法取得第一頁結果"))?;

        let mut progress = CrawlProgress::default();
        loop {
            let (summaries, links) = parse_results_page(&page_content);
            debug!("本頁共 {} 個連結", links.len());
            if summaries.is_empty() {
                info!("結果頁沒有任何案件標題，爬取結束");
                break;
            }
            for summary in &summaries {
                if progress.fetched >= self.config.target_count {
                    break;
                }
                if let Some(record) = self.process_case(summary, progress.fetched + 1).await {
                    self.persist(&record);
                    progress.fetched += 1;
                }
            }
            info!(
                "完成第 {} 頁資料爬取，共計 {} 筆資料",
                progress.page, progress.fetched
            );
            if progress.fetched >= self.config.target_count {
                info!("已達目標筆數 {}", self.config.target_count);
                break;
            }
            progress.page += 1;
            let next_url = next_page_url(&iframe_url, progress.page);
            match self.fetch_results_page(&next_url).await {
                Some(content) => page_content = content,
                None => {
                    warn!("多次嘗試仍無法取得下一頁，提前結束爬取");
                    break;
                }
            }
        }
        Ok(progress)
    }

    /// 處理單一案件：抓詳細頁、萃取欄位、分類、驗證完整性。
    /// 任一環節缺料就放棄這筆（不重試），回傳 None。
    async fn process_case(&self, summary: &CaseSummary, serial: usize) -> Option<PersistedRecord> {
        let detail_url = format!("{DETAILS_BASE_URL}{}", summary.link);
        debug!("抓取詳細頁: {}", detail_url);
        let detail = self.fetcher.fetch(&detail_url, None).await?;
        let result = CrawlResult {
            title: summary.title.clone(),
            category: summary.category.clone(),
            link: summary.link.clone(),
            full_content: parse_detail_page(&detail),
            judgment_date: extract_judgment_date(&detail),
        };

        // 分類失敗時套用預設結論，爬取流程不可因分類服務中斷
        let (label, verdict) = match self.classifier.classify(&result.full_content).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("API 呼叫失敗: {}，改用預設分類", e);
                classifier::fallback()
            }
        };

        if !result.is_complete() {
            info!("欄位不完整，略過: {}", summary.title);
            return None;
        }
        Some(PersistedRecord {
            serial,
            result,
            verdict,
            label,
        })
    }

    /// 兩個輸出檔各自附加；寫入失敗僅記錄，該筆遺失但爬取繼續
    fn persist(&self, record: &PersistedRecord) {
        if let Err(e) = self.sink.append_record(record) {
            warn!("CSV 寫入失敗: {}", e);
        }
        if let Err(e) = self.sink.append_target(record.label) {
            warn!("Target.csv 寫入失敗: {}", e);
        }
    }

    /// 取下一頁結果；回應缺漏或出現系統忙碌訊息時重試固定次數，
    /// 重試用盡回傳 None，由主迴圈提前收尾
    async fn fetch_results_page(&self, url: &str) -> Option<String> {
        // 換頁前的隨機延遲，避免被來源封鎖
        let delay = PAGE_DELAY_MIN_MS + fastrand::u64(0..=PAGE_DELAY_SPAN_MS);
        sleep(Duration::from_millis(delay)).await;

        info!("抓取下一頁: {}", url);
        for attempt in 1..=self.config.page_retry_attempts {
            if let Some(content) = self.fetcher.fetch(url, None).await {
                if !content.contains(BUSY_MARKER) {
                    return Some(content);
                }
            }
            warn!(
                "取得下一頁失敗（第 {}/{} 次），{} 秒後重試",
                attempt, self.config.page_retry_attempts, self.config.page_retry_wait_secs
            );
            sleep(Duration::from_secs(self.config.page_retry_wait_secs)).await;
        }
        None
    }
}

static PAGE_PARAM_RE: OnceLock<Regex> = OnceLock::new();

/// 以頁碼改寫結果列表網址的 page 參數
pub(crate) fn next_page_url(iframe_url: &str, page: usize) -> String {
    let re = PAGE_PARAM_RE
        .get_or_init(|| Regex::new(r"([?&])page=\d+").expect("page 參數正規表示式不合法"));
    if re.is_match(iframe_url) {
        return re
            .replace(iframe_url, format!("${{1}}page={page}"))
            .into_owned();
    }
    if iframe_url.contains('?') {
        format!("{iframe_url}&page={page}")
    } else {
        format!("{iframe_url}?page={page}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_page_url_appends_param() {
        assert_eq!(
            next_page_url("https://example.tw/qryresultlst.aspx?q=abc&sort=DS", 2),
            "https://example.tw/qryresultlst.aspx?q=abc&sort=DS&page=2"
        );
    }

    #[test]
    fn test_next_page_url_replaces_existing_param() {
        assert_eq!(
            next_page_url("https://example.tw/qryresultlst.aspx?q=abc&page=1&ot=in", 5),
            "https://example.tw/qryresultlst.aspx?q=abc&page=5&ot=in"
        );
    }

    #[test]
    fn test_next_page_url_without_query() {
        assert_eq!(
            next_page_url("https://example.tw/qryresultlst.aspx", 3),
            "https://example.tw/qryresultlst.aspx?page=3"
        );
    }

    #[test]
    fn test_empty_results_page_yields_no_links() {
        // 結果頁沒有標題時必須直接終止，不會發出任何詳細頁請求
        let (summaries, links) = parse_results_page("<html><body>查無資料</body></html>");
        assert!(summaries.is_empty());
        assert!(links.is_empty());
    }
}
