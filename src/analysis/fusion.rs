use crate::domain::model::{
    round_to, ContributionBreakdown, CoughAssessment, FusedAssessment, FusedRiskLevel, FusionSummary,
    RiskLevel, SymptomReport, VisionAssessment,
};
use crate::domain::ports::ResultStore;
use crate::utils::error::Result;
use std::path::PathBuf;

pub const AUDIO_RESULT_PREFIX: &str = "audio_analysis";
pub const TEXT_RESULT_PREFIX: &str = "text_analysis_";
const JSON_SUFFIX: &str = ".json";

const AUDIO_WEIGHT: f64 = 0.6;
const VISION_WEIGHT: f64 = 0.2;
const TEXT_WEIGHT: f64 = 0.2;

/// 最新結果檔中讀到的分數
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedScore {
    pub file: Option<PathBuf>,
    pub score: Option<f64>,
    /// 找到檔案但無法解析
    pub unreadable: bool,
}

/// 找出最新的結果檔，取第一個存在的 key；其值為 null 或非數值時視為沒有分數
pub fn load_latest_score<S: ResultStore>(store: &S, prefix: &str, keys: &[&str]) -> Result<LoadedScore> {
    let Some(path) = store.latest_matching(prefix, JSON_SUFFIX)? else {
        return Ok(LoadedScore::default());
    };

    match store.load_json::<serde_json::Value>(&path) {
        Ok(data) => {
            let score = keys
                .iter()
                .find_map(|key| data.get(*key))
                .and_then(|v| v.as_f64());
            Ok(LoadedScore {
                file: Some(path),
                score,
                unreadable: false,
            })
        }
        Err(e) => {
            tracing::warn!("⚠️ Error reading {}: {}", path.display(), e);
            Ok(LoadedScore {
                file: Some(path),
                score: None,
                unreadable: true,
            })
        }
    }
}

pub fn load_latest_audio<S: ResultStore>(store: &S) -> Result<LoadedScore> {
    load_latest_score(store, AUDIO_RESULT_PREFIX, &["risk_score"])
}

pub fn load_latest_text<S: ResultStore>(store: &S) -> Result<LoadedScore> {
    load_latest_score(store, TEXT_RESULT_PREFIX, &["text_risk_score", "risk_score"])
}

pub fn fused_label(score: Option<f64>) -> FusedRiskLevel {
    match score {
        None => FusedRiskLevel::Unknown,
        Some(s) if s >= 0.75 => FusedRiskLevel::Known(RiskLevel::High),
        Some(s) if s >= 0.4 => FusedRiskLevel::Known(RiskLevel::Medium),
        Some(_) => FusedRiskLevel::Known(RiskLevel::Low),
    }
}

/// 取可用分數的平均
pub fn fuse_latest(audio: &LoadedScore, text: &LoadedScore, timestamp: String) -> FusionSummary {
    let scores: Vec<f64> = [audio.score, text.score].into_iter().flatten().collect();
    let fused = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    FusionSummary {
        audio_file: audio.file.as_ref().map(|p| p.display().to_string()),
        audio_risk_score: audio.score,
        text_file: text.file.as_ref().map(|p| p.display().to_string()),
        text_risk_score: text.score,
        fused_risk_score: fused,
        fused_risk_label: fused_label(fused),
        timestamp,
    }
}

pub fn weighted_risk_level(risk: f64) -> RiskLevel {
    if risk > 0.5 {
        RiskLevel::High
    } else if risk >= 0.2 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// 加權融合：音訊 0.6、影像 0.2、文字 0.2；影像只在確認有狗時計分
pub fn weighted_fusion(
    audio: &CoughAssessment,
    vision: &VisionAssessment,
    text: &SymptomReport,
) -> FusedAssessment {
    let a = audio.cough_score;
    let v = if vision.dog_detected { vision.dog_conf } else { 0.0 };
    let t = text.severity_score;

    let risk = AUDIO_WEIGHT * a + VISION_WEIGHT * v + TEXT_WEIGHT * t;

    let mut explanation = Vec::new();
    if a >= 0.6 {
        explanation.push("Audio: cough-like events detected.".to_string());
    }
    if vision.dog_detected {
        explanation.push("Vision: dog detected in image.".to_string());
    }
    if t > 0.0 {
        explanation.push(format!("Text: symptoms mentioned ({}).", text.keywords.join(", ")));
    }
    if explanation.is_empty() {
        explanation.push("No strong signals found from inputs.".to_string());
    }

    FusedAssessment {
        risk_score: round_to(risk, 3),
        risk_level: weighted_risk_level(risk),
        explanation,
    }
}

/// 各模態原始分數的相對佔比
pub fn contributions(
    audio: &CoughAssessment,
    vision: &VisionAssessment,
    text: &SymptomReport,
) -> ContributionBreakdown {
    let total = audio.cough_score + vision.dog_conf + text.severity_score + 1e-9;
    ContributionBreakdown {
        audio: audio.cough_score / total,
        vision: vision.dog_conf / total,
        text: text.severity_score / total,
    }
}

pub fn session_summary(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::Low => {
            "Based on the current inputs, your dog shows a low respiratory risk. \
             No strong cough patterns were detected. Continue monitoring your dog and \
             consult a veterinarian if symptoms persist or worsen."
        }
        RiskLevel::Medium => {
            "Based on the current inputs, your dog shows a moderate respiratory risk. \
             Some cough-like patterns were detected. Monitoring is recommended, and \
             veterinary advice should be considered if symptoms continue."
        }
        RiskLevel::High => {
            "Based on the current inputs, your dog shows a high respiratory risk. \
             Strong and sustained cough-like patterns were detected. Veterinary \
             consultation is strongly advised."
        }
    }
}

pub const DISCLAIMER: &str = "This system provides a non-diagnostic risk indication and does not replace professional veterinary advice.";
