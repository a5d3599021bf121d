mod analysis;
mod app;
mod classifier;
mod crawler;
mod dates;
mod fetcher;
mod logger;
mod model;
mod parser;
mod sink;

use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

use crate::app::config::AppConfig;
use crate::crawler::Crawler;

#[tokio::main]
async fn main() -> Result<()> {
    logger::init();

    let config = AppConfig::load(None)?;
    info!("🚀 開始裁判書爬取流程...");
    info!("🔍 查詢關鍵字: {}", config.search_keyword);
    info!("📊 目標筆數: {}", config.target_count);
    if config.api_key.is_empty() {
        warn!("未設定 API 金鑰，所有分類將採用預設結論");
    }

    let crawler = Crawler::new(config.clone())?;
    let progress = crawler.run().await?;
    info!(
        "🎉 爬取完成! 共處理 {} 頁、寫出 {} 筆資料",
        progress.page + 1,
        progress.fetched
    );

    if config.write_label_names {
        let count = analysis::merge_label_names(
            Path::new(&config.record_output),
            Path::new(&config.label_output),
        )?;
        info!("✅ 已產出標籤對照檔 {}（{} 筆）", config.label_output, count);
    }

    Ok(())
}
