use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::app::config::AppConfig;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3";

/// 單一請求的逾時上限
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// 指數退避的秒數上限
const MAX_BACKOFF_SECS: u64 = 60;

/// 帶重試機制的 HTTP 客戶端。
///
/// 只對伺服器端暫時性錯誤（502/503/504）重試，其餘錯誤立即放棄；
/// 呼叫端拿到的是 `Option<String>`，失敗不會往外拋例外。
pub struct Fetcher {
    client: reqwest::Client,
    max_retries: u32,
    backoff_factor: u64,
    delay_min_ms: u64,
    delay_max_ms: u64,
}

impl Fetcher {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            max_retries: config.max_retries,
            backoff_factor: config.backoff_factor,
            delay_min_ms: config.delay_min_ms,
            delay_max_ms: config.delay_max_ms,
        })
    }

    /// 發送 GET 或 POST 請求取得網頁內容，失敗時回傳 None
    pub async fn fetch(&self, url: &str, form: Option<&[(String, String)]>) -> Option<String> {
        match self.try_fetch(url, form).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("網頁請求失敗: {} ({})", url, e);
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str, form: Option<&[(String, String)]>) -> Result<String> {
        // 模擬人工操作的隨機延遲，降低對伺服器的壓力
        self.random_delay().await;

        let mut attempt = 0u32;
        loop {
            let request = match form {
                Some(fields) => self.client.post(url).form(fields),
                None => self.client.get(url),
            };
            let response = request.send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response.text().await?);
            }
            if is_transient(status.as_u16()) && attempt < self.max_retries {
                attempt += 1;
                let delay = backoff_delay(self.backoff_factor, attempt);
                warn!(
                    "伺服器暫時性錯誤 {}，第 {}/{} 次重試，{} 秒後再試",
                    status,
                    attempt,
                    self.max_retries,
                    delay.as_secs()
                );
                sleep(delay).await;
                continue;
            }
            return Err(anyhow!("HTTP 狀態碼 {}", status));
        }
    }

    async fn random_delay(&self) {
        let span = self.delay_max_ms.saturating_sub(self.delay_min_ms);
        let ms = self.delay_min_ms + fastrand::u64(0..=span);
        sleep(Duration::from_millis(ms)).await;
    }
}

/// 判斷狀態碼是否為可重試的暫時性錯誤
pub(crate) fn is_transient(status: u16) -> bool {
    matches!(status, 502 | 503 | 504)
}

/// 第 attempt 次重試前的等待時間：backoff_factor * 2^(attempt-1)，封頂 60 秒
pub(crate) fn backoff_delay(backoff_factor: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let secs = backoff_factor.saturating_mul(1u64 << exponent);
    Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient_covers_exactly_gateway_errors() {
        assert!(is_transient(502));
        assert!(is_transient(503));
        assert!(is_transient(504));
        assert!(!is_transient(500), "500 不在重試範圍內");
        assert!(!is_transient(404));
        assert!(!is_transient(429));
        assert!(!is_transient(200));
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        assert_eq!(backoff_delay(2, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(2, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(2, 4), Duration::from_secs(16));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(2, 10), Duration::from_secs(MAX_BACKOFF_SECS));
        // 極端的重試次數不可溢位
        assert_eq!(backoff_delay(2, u32::MAX), Duration::from_secs(MAX_BACKOFF_SECS));
    }
}
