/// 違約金分類標籤。
///
/// 採固定三碼制：0 = 無法判定、1 = 懲罰性、2 = 損害賠償性。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyLabel {
    Unknown,
    Punitive,
    Compensatory,
}

impl PenaltyLabel {
    /// 對應輸出檔 Target 欄位的數字代碼
    pub fn code(self) -> u8 {
        match self {
            PenaltyLabel::Unknown => 0,
            PenaltyLabel::Punitive => 1,
            PenaltyLabel::Compensatory => 2,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            1 => PenaltyLabel::Punitive,
            2 => PenaltyLabel::Compensatory,
            _ => PenaltyLabel::Unknown,
        }
    }

    /// 分析輸出使用的英文標籤名稱
    pub fn name(self) -> &'static str {
        match self {
            PenaltyLabel::Unknown => "notdefine",
            PenaltyLabel::Punitive => "punitive",
            PenaltyLabel::Compensatory => "compensatory",
        }
    }
}

/// 結果列表頁上的單筆案件摘要
#[derive(Debug, Clone)]
pub struct CaseSummary {
    pub title: String,
    /// 裁判案由
    pub category: String,
    /// 詳細頁相對連結
    pub link: String,
}

/// 一筆完整爬取的案件資料，建立後不再修改
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub title: String,
    pub category: String,
    pub link: String,
    /// 去除標記後的裁判全文，長度已截斷
    pub full_content: String,
    /// 西元格式裁判日期，取不到時為「未知」
    pub judgment_date: String,
}

impl CrawlResult {
    /// 持久化前的完整性檢查：標題、案由、全文三者皆不可為空
    pub fn is_complete(&self) -> bool {
        !self.title.is_empty() && !self.category.is_empty() && !self.full_content.is_empty()
    }
}

/// 寫入紀錄表的單位：爬取結果加上分類結論
#[derive(Debug, Clone)]
pub struct PersistedRecord {
    pub serial: usize,
    pub result: CrawlResult,
    /// 分類服務回傳的原始結論文字
    pub verdict: String,
    pub label: PenaltyLabel,
}

impl PersistedRecord {
    /// 產生紀錄表的一列：序號,案件名稱,裁判日期,裁判案由,違約金類型,最終違約金類型,Target
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.serial.to_string(),
            self.result.title.clone(),
            self.result.judgment_date.clone(),
            self.result.category.clone(),
            self.verdict.clone(),
            // 最終違約金類型與分析結果相同，沿用原始欄位設計
            self.verdict.clone(),
            self.label.code().to_string(),
        ]
    }
}

/// 爬取進度計數器，僅在行程啟動時歸零
#[derive(Debug, Default, Clone, Copy)]
pub struct CrawlProgress {
    /// 已成功寫入的筆數
    pub fetched: usize,
    /// 目前結果頁頁碼（從 0 起算）
    pub page: usize,
}
