use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 風險等級
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        };
        f.write_str(label)
    }
}

/// 融合後等級；沒有任何可用分數時為 Unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusedRiskLevel {
    Known(RiskLevel),
    Unknown,
}

impl Serialize for FusedRiskLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FusedRiskLevel::Known(level) => level.serialize(serializer),
            FusedRiskLevel::Unknown => serializer.serialize_str("Unknown"),
        }
    }
}

impl<'de> Deserialize<'de> for FusedRiskLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "Low" => Ok(FusedRiskLevel::Known(RiskLevel::Low)),
            "Medium" => Ok(FusedRiskLevel::Known(RiskLevel::Medium)),
            "High" => Ok(FusedRiskLevel::Known(RiskLevel::High)),
            "Unknown" => Ok(FusedRiskLevel::Unknown),
            other => Err(serde::de::Error::unknown_variant(
                other,
                &["Low", "Medium", "High", "Unknown"],
            )),
        }
    }
}

impl std::fmt::Display for FusedRiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FusedRiskLevel::Known(level) => level.fmt(f),
            FusedRiskLevel::Unknown => f.write_str("Unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Launcher
// ---------------------------------------------------------------------------

/// 單一階段的執行狀態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded { exit_code: i32 },
    /// 非零退出碼；被信號終止時沒有退出碼
    Failed { exit_code: Option<i32> },
    LaunchFailed { reason: String },
    TimedOut { after: Duration },
    Skipped { reason: String },
}

impl StageStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, StageStatus::Succeeded { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            StageStatus::Succeeded { exit_code } => format!("succeeded (exit {})", exit_code),
            StageStatus::Failed { exit_code: Some(code) } => format!("failed (exit {})", code),
            StageStatus::Failed { exit_code: None } => "terminated by signal".to_string(),
            StageStatus::LaunchFailed { reason } => format!("could not launch: {}", reason),
            StageStatus::TimedOut { after } => format!("timed out after {:?}", after),
            StageStatus::Skipped { reason } => format!("skipped: {}", reason),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StageResult {
    pub stage_name: String,
    pub status: StageStatus,
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// 能量爆發偵測結果 (audio_analysis_*.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAnalysis {
    pub risk_score: f64,
    pub audio_risk_score: f64,
    pub risk_label: RiskLevel,
    pub sample_rate: u32,
    pub num_cough_events: usize,
    pub cough_timestamps: Vec<f64>,
}

/// 穩健峰值偵測結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoughAssessment {
    pub cough_score: f64,
    pub events: usize,
    pub timestamps: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// 飼主描述的關鍵字分析 (text_analysis_*.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteAnalysis {
    pub note: String,
    pub found_symptoms: Vec<String>,
    pub found_context: Vec<String>,
    pub found_severity: Vec<String>,
    pub text_risk_score: f64,
    pub text_risk_label: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomReport {
    pub keywords: Vec<String>,
    pub modifiers_detected: Vec<String>,
    pub severity_score: f64,
    pub notes: String,
}

// ---------------------------------------------------------------------------
// Vision
// ---------------------------------------------------------------------------

/// 外部偵測器輸出的一個框，bbox = [x1, y1, x2, y2]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionSet {
    #[serde(default)]
    pub image_width: Option<u32>,
    #[serde(default)]
    pub image_height: Option<u32>,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub label: String,
    pub confidence: f64,
    pub area_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionAssessment {
    pub dog_detected: bool,
    pub dog_conf: f64,
    pub car_conf: f64,
    pub best_area_ratio: f64,
    pub detected: Vec<DetectedObject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl VisionAssessment {
    pub fn not_provided() -> Self {
        Self {
            dog_detected: false,
            dog_conf: 0.0,
            car_conf: 0.0,
            best_area_ratio: 0.0,
            detected: Vec::new(),
            notes: Some("No image provided".to_string()),
        }
    }

    pub fn detected_classes(&self) -> Vec<&str> {
        self.detected.iter().map(|d| d.label.as_str()).collect()
    }
}

// ---------------------------------------------------------------------------
// Fusion
// ---------------------------------------------------------------------------

/// 最新音訊與文字結果的平均融合 (fusion_summary_*.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionSummary {
    pub audio_file: Option<String>,
    pub audio_risk_score: Option<f64>,
    pub text_file: Option<String>,
    pub text_risk_score: Option<f64>,
    pub fused_risk_score: Option<f64>,
    pub fused_risk_label: FusedRiskLevel,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedAssessment {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub explanation: Vec<String>,
}

/// 各模態分數佔比
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContributionBreakdown {
    pub audio: f64,
    pub vision: f64,
    pub text: f64,
}

/// 一次 assess 的完整輸出 (session_*.json)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub audio: CoughAssessment,
    pub vision: VisionAssessment,
    pub text: SymptomReport,
    pub fusion: FusedAssessment,
    pub contributions: ContributionBreakdown,
    pub summary: String,
}

/// 依浮點數的精確十進位值四捨五入到指定小數位，恰好一半時取偶數
pub fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}
