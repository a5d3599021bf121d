use tracing_subscriber::EnvFilter;

/// 初始化全域 tracing 訂閱者，預設 info 等級，可由 RUST_LOG 覆寫
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
