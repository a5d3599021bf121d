use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::model::PenaltyLabel;

/// 分類服務失敗時由呼叫端套用的預設結論文字
pub const FALLBACK_VERDICT: &str = "**損害賠償性編號2**";

/// 原文中人工判定的優先標記，出現時直接蓋過 API 結論
const MANUAL_PUNITIVE_MARKER: &str = "判定為**懲罰性編號1**";

/// 回應文字中對應懲罰性結論的標記寫法
const PUNITIVE_MARKERS: [&str; 4] = [
    "懲罰性編號1**",
    "懲罰性編號1",
    "編號1：懲罰性",
    "編號1 懲罰性",
];

/// 回應文字中對應損害賠償性結論的標記寫法
const COMPENSATORY_MARKERS: [&str; 4] = [
    "損害賠償性編號2**",
    "損害賠償性編號2",
    "編號2：損害賠償性",
    "編號2 損害賠償性",
];

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("API 請求失敗: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("API 回應中沒有可用的候選結果")]
    NoCandidate,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// 透過 Gemini 生成式 API 判斷違約金條款類型的轉接器。
///
/// `classify` 只回報成敗，不自行吞錯：失敗時的預設結論（[`fallback`]）
/// 由呼叫端明確套用，讓這個回退策略可以被測試與覆寫。
pub struct GeminiClassifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl GeminiClassifier {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// 分析契約內容，回傳標籤代碼與原始結論文字
    pub async fn classify(&self, content: &str) -> Result<(PenaltyLabel, String), ClassifyError> {
        let prompt = build_prompt(content);
        let payload = json!({ "contents": [{ "parts": [{ "text": prompt }] }] });
        let response = self
            .client
            .post(&self.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        let body: GenerateResponse = response.json().await?;
        let verdict = body
            .candidates
            .first()
            .and_then(|candidate| candidate.content.parts.first())
            .map(|part| part.text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(ClassifyError::NoCandidate)?;
        debug!("API 回應結論: {}", verdict);
        let verdict = refine_verdict(content, verdict);
        let label = map_verdict(&verdict);
        Ok((label, verdict))
    }
}

/// 失敗時的預設結論：損害賠償性
pub fn fallback() -> (PenaltyLabel, String) {
    (PenaltyLabel::Compensatory, FALLBACK_VERDICT.to_string())
}

/// 原文若已含人工判定標記，該判定優先於 API 結論。
/// 明確的文字訊號勝過機率性的分類結果。
pub fn refine_verdict(content: &str, verdict: String) -> String {
    if content.contains(MANUAL_PUNITIVE_MARKER) {
        return "**懲罰性編號1**".to_string();
    }
    verdict
}

/// 掃描結論文字中的固定標記，對應到封閉的標籤集合。
/// 認不得的文字一律對應到無法判定，不會是錯誤。
pub fn map_verdict(verdict: &str) -> PenaltyLabel {
    if COMPENSATORY_MARKERS.iter().any(|marker| verdict.contains(marker)) {
        return PenaltyLabel::Compensatory;
    }
    if PUNITIVE_MARKERS.iter().any(|marker| verdict.contains(marker)) {
        return PenaltyLabel::Punitive;
    }
    PenaltyLabel::Unknown
}

/// 組出含分類依據的提示文字
fn build_prompt(content: &str) -> String {
    format!(
        "以下是一段契約內容，請協助判斷其中內容是**懲罰性編號1**還是**損害賠償性編號2**，\n\n\
         分析依據：\n\
         **懲罰性編號1**\n\
         1. 為了對違約方進行懲罰，通常超過實際損失的範圍，並無與具體損失掛鉤。\n\
         2. 提及額外罰金，且這些罰金無法與實際損失相對應，則屬於懲罰性違約金。\n\
         3. 金額遠超過實際損害的合理比例（通常超過損害的30%），此類設定是對違約行為的額外懲罰，而非對實際損失的補償。\n\
         4. 無法直接與實際損失或費用相連結，金額通常是預設的固定數額或按契約條款預定的比例計算。\n\
         5. 伴隨強制執行條款，用以迫使違約方履行契約或承擔額外的經濟責任。\n\n\
         **損害賠償性編號2**\n\
         1. 補償由違約行為所造成的實際損失。其金額通常不超過損失的30%，以合理比例反映實際損失。\n\
         2. 返還款項、不當得利返還或程序費用，且未提及額外罰金或懲罰性條款。\n\
         3. 基於實際損害設定，金額通常不會超過損害的30%。若金額過高，則需進一步檢視其是否合理。\n\
         4. 若契約中涉及雙方協商的和解金額，且金額與實際損失相符，則屬於損害賠償性。\n\
         5. 若金額設定目的是賠償由違約行為引起的實際損失，而非對違約方進行懲罰。\n\n\
         契約內容若無法確定，請務必選擇最接近的分類：**懲罰性編號1**或**損害賠償性編號2**，不允許未知分類。\n\n\
         內容如下：\n{content}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_verdict_punitive_variants() {
        assert_eq!(map_verdict("**懲罰性編號1**"), PenaltyLabel::Punitive);
        assert_eq!(map_verdict("本件屬懲罰性編號1"), PenaltyLabel::Punitive);
        assert_eq!(map_verdict("結論：編號1：懲罰性"), PenaltyLabel::Punitive);
        assert_eq!(map_verdict("編號1 懲罰性違約金"), PenaltyLabel::Punitive);
    }

    #[test]
    fn test_map_verdict_compensatory_variants() {
        assert_eq!(map_verdict("**損害賠償性編號2**"), PenaltyLabel::Compensatory);
        assert_eq!(map_verdict("應為損害賠償性編號2"), PenaltyLabel::Compensatory);
        assert_eq!(map_verdict("編號2：損害賠償性"), PenaltyLabel::Compensatory);
        assert_eq!(map_verdict("編號2 損害賠償性"), PenaltyLabel::Compensatory);
    }

    #[test]
    fn test_map_verdict_unrecognized_is_unknown() {
        assert_eq!(map_verdict(""), PenaltyLabel::Unknown);
        assert_eq!(map_verdict("無法判斷"), PenaltyLabel::Unknown);
        assert_eq!(map_verdict("random english text"), PenaltyLabel::Unknown);
    }

    #[test]
    fn test_fallback_is_compensatory() {
        let (label, verdict) = fallback();
        assert_eq!(label, PenaltyLabel::Compensatory);
        assert_eq!(map_verdict(&verdict), PenaltyLabel::Compensatory, "預設結論必須落在封閉標籤集合內");
    }

    #[test]
    fn test_refine_verdict_manual_marker_wins() {
        let content = "……法院判定為**懲罰性編號1**，理由如下……";
        let refined = refine_verdict(content, "**損害賠償性編號2**".to_string());
        assert_eq!(map_verdict(&refined), PenaltyLabel::Punitive, "原文的人工判定應優先於 API 結論");
    }

    #[test]
    fn test_refine_verdict_without_marker_keeps_api_result() {
        let refined = refine_verdict("一般契約內容", "**損害賠償性編號2**".to_string());
        assert_eq!(map_verdict(&refined), PenaltyLabel::Compensatory);
    }

    #[test]
    fn test_build_prompt_embeds_content_and_rubric() {
        let prompt = build_prompt("違約金為契約總價之五倍");
        assert!(prompt.contains("違約金為契約總價之五倍"));
        assert!(prompt.contains("**懲罰性編號1**"));
        assert!(prompt.contains("**損害賠償性編號2**"));
        assert!(prompt.contains("不允許未知分類"));
    }
}
