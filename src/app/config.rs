use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// 爬蟲全域設定。
///
/// 所有欄位皆有預設值，缺少 config.toml 時直接以預設值執行。
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 裁判書查詢關鍵字
    #[serde(default = "default_search_keyword")]
    pub search_keyword: String,
    /// 目標爬取筆數，達到即停止
    #[serde(default = "default_target_count")]
    pub target_count: usize,
    /// 紀錄表輸出路徑
    #[serde(default = "default_record_output")]
    pub record_output: String,
    /// 標籤表輸出路徑
    #[serde(default = "default_target_output")]
    pub target_output: String,
    /// 分類服務端點
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// 分類服務金鑰，留空時所有分類都會落入預設結論
    #[serde(default)]
    pub api_key: String,
    /// 單一請求對暫時性錯誤的最大重試次數
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// 指數退避的基準秒數
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u64,
    /// 每次請求前隨機延遲的下界（毫秒）
    #[serde(default = "default_delay_min_ms")]
    pub delay_min_ms: u64,
    /// 每次請求前隨機延遲的上界（毫秒）
    #[serde(default = "default_delay_max_ms")]
    pub delay_max_ms: u64,
    /// 換頁遇系統忙碌時的重試次數
    #[serde(default = "default_page_retry_attempts")]
    pub page_retry_attempts: u32,
    /// 換頁重試的間隔秒數
    #[serde(default = "default_page_retry_wait_secs")]
    pub page_retry_wait_secs: u64,
    /// 爬取結束後是否產出標籤名稱對照檔
    #[serde(default)]
    pub write_label_names: bool,
    /// 標籤名稱對照檔輸出路徑
    #[serde(default = "default_label_output")]
    pub label_output: String,
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = config_path.unwrap_or_else(|| Path::new("config.toml"));
        if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("讀取設定檔失敗: {}", path.display()))?;
            let cfg: AppConfig = toml::from_str(&raw)
                .with_context(|| format!("解析設定檔失敗: {}", path.display()))?;
            return Ok(cfg);
        }
        Ok(AppConfig::default())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            search_keyword: default_search_keyword(),
            target_count: default_target_count(),
            record_output: default_record_output(),
            target_output: default_target_output(),
            api_url: default_api_url(),
            api_key: String::new(),
            max_retries: default_max_retries(),
            backoff_factor: default_backoff_factor(),
            delay_min_ms: default_delay_min_ms(),
            delay_max_ms: default_delay_max_ms(),
            page_retry_attempts: default_page_retry_attempts(),
            page_retry_wait_secs: default_page_retry_wait_secs(),
            write_label_names: false,
            label_output: default_label_output(),
        }
    }
}

fn default_search_keyword() -> String {
    "契約".to_string()
}

fn default_target_count() -> usize {
    400
}

fn default_record_output() -> String {
    "judgment_data_analysis.csv".to_string()
}

fn default_target_output() -> String {
    "Target.csv".to_string()
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        .to_string()
}

fn default_max_retries() -> u32 {
    10
}

fn default_backoff_factor() -> u64 {
    2
}

fn default_delay_min_ms() -> u64 {
    2000
}

fn default_delay_max_ms() -> u64 {
    5000
}

fn default_page_retry_attempts() -> u32 {
    3
}

fn default_page_retry_wait_secs() -> u64 {
    10
}

fn default_label_output() -> String {
    "updated_judgment_data.csv".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.search_keyword, "契約");
        assert_eq!(cfg.target_count, 400);
        assert_eq!(cfg.max_retries, 10);
        assert_eq!(cfg.page_retry_attempts, 3);
        assert!(cfg.api_key.is_empty());
        assert!(!cfg.write_label_names);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            search_keyword = "工程契約"
            target_count = 500
            api_key = "test-key"
            "#,
        )
        .expect("設定檔應可解析");
        assert_eq!(cfg.search_keyword, "工程契約");
        assert_eq!(cfg.target_count, 500);
        assert_eq!(cfg.api_key, "test-key");
        // 未指定的欄位應落回預設值
        assert_eq!(cfg.target_output, "Target.csv");
        assert_eq!(cfg.delay_min_ms, 2000);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let cfg = AppConfig::load(Some(Path::new("no_such_config.toml"))).expect("缺檔應回傳預設值");
        assert_eq!(cfg.record_output, "judgment_data_analysis.csv");
    }
}
