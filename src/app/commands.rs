use crate::adapters::results_store::{stamped_file_name, timestamp_now, LocalResultStore};
use crate::analysis::{audio, fusion, text, vision};
use crate::domain::model::{
    AudioAnalysis, FusionSummary, NoteAnalysis, SessionReport, VisionAssessment,
};
use crate::domain::ports::ResultStore;
use crate::utils::error::{CompanionError, Result};
use std::io::{BufRead, Write};
use std::path::Path;

pub const ENERGY_CSV_FILE: &str = "energy.csv";

fn format_optional(score: Option<f64>) -> String {
    score.map(|s| s.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(CompanionError::MissingInputError {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

/// 能量爆發偵測，輸出 audio_analysis JSON 與能量曲線 CSV
pub fn audio_command<W: Write>(store: &LocalResultStore, input: &Path, out: &mut W) -> Result<AudioAnalysis> {
    writeln!(out, "\n🐶 Running Audio Prototype (energy-burst detector)...\n")?;
    ensure_exists(input)?;

    let clip = audio::load_wav(input)?;
    writeln!(out, "Loaded audio: {}", input.display())?;
    writeln!(out, "Sample rate: {} Hz", clip.sample_rate)?;
    writeln!(out, "Length: {:.2} seconds\n", clip.duration_seconds())?;

    let detection = audio::detect_energy_bursts(&clip)?;
    let analysis = detection.analysis;

    writeln!(
        out,
        "Detected high-energy bursts (cough-like events): {}",
        analysis.num_cough_events
    )?;
    writeln!(out, "Approx cough timestamps (s):")?;
    writeln!(out, "{:?}\n", analysis.cough_timestamps)?;
    writeln!(
        out,
        "Estimated kennel cough risk: {} (score ≈ {:.2})\n",
        analysis.risk_label, analysis.risk_score
    )?;

    let json_path = store.save_json(fusion::AUDIO_RESULT_PREFIX, &analysis)?;
    writeln!(out, "💾 Saved analysis JSON to: {}", json_path.display())?;

    let csv_path = store.save_series_csv(ENERGY_CSV_FILE, ["frame", "energy"], &detection.energy)?;
    writeln!(out, "💾 Saved energy curve to: {}\n", csv_path.display())?;

    tracing::info!(
        "🎧 Audio analysis finished: {} events, risk {}",
        analysis.num_cough_events,
        analysis.risk_label
    );
    Ok(analysis)
}

/// 顯示提示並讀取一行飼主描述
pub fn prompt_note<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<String> {
    writeln!(out, "🐾 Text Prototype — Owner Note Analysis")?;
    writeln!(out, "Type a short description of your dog's condition.")?;
    writeln!(
        out,
        "Example: 'My dog has a hacking cough after daycare and is very tired.'\n"
    )?;
    write!(out, "Owner note: ")?;
    out.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// 關鍵字分析；空白描述時不輸出任何檔案
pub fn text_command<W: Write>(store: &LocalResultStore, note: &str, out: &mut W) -> Result<Option<NoteAnalysis>> {
    let note = note.trim();
    if note.is_empty() {
        writeln!(out, "No note entered. Exiting.")?;
        return Ok(None);
    }

    let analysis = text::analyze_owner_note(note);

    writeln!(out, "\n🔍 Extracted Information:")?;
    writeln!(out, "  Symptoms found: {:?}", analysis.found_symptoms)?;
    writeln!(out, "  Context found:  {:?}", analysis.found_context)?;
    writeln!(out, "  Severity words: {:?}", analysis.found_severity)?;
    writeln!(
        out,
        "\n🧮 Text-based risk score: {} ({})",
        analysis.text_risk_score, analysis.text_risk_label
    )?;

    let path = store.save_json("text_analysis", &analysis)?;
    writeln!(out, "\n💾 Saved text analysis JSON to: {}", path.display())?;

    Ok(Some(analysis))
}

/// 讀取偵測結果並判斷畫面中是否有狗
pub fn vision_command<W: Write>(
    store: &LocalResultStore,
    detections: &Path,
    image: Option<&Path>,
    out: &mut W,
) -> Result<VisionAssessment> {
    let assessment = assess_image(detections, image)?;

    writeln!(out, "📌 Detected classes: {:?}", assessment.detected_classes())?;
    writeln!(
        out,
        "🐕 Dog detected: {} (confidence {}, area {})",
        assessment.dog_detected, assessment.dog_conf, assessment.best_area_ratio
    )?;
    if assessment.car_conf > 0.0 {
        writeln!(out, "🚗 Car confidence: {}", assessment.car_conf)?;
    }

    let path = store.save_json("vision_analysis", &assessment)?;
    writeln!(out, "💾 Saved vision analysis JSON to: {}", path.display())?;

    Ok(assessment)
}

fn assess_image(detections: &Path, image: Option<&Path>) -> Result<VisionAssessment> {
    tracing::info!("🔍 Reading detections from {}", detections.display());
    let set = vision::load_detections(detections)?;
    let (width, height) = vision::resolve_image_size(&set, image)?;
    vision::assess_detections(&set.detections, width, height)
}

/// 平均最新的音訊與文字分數
pub fn fusion_command<W: Write>(store: &LocalResultStore, out: &mut W) -> Result<FusionSummary> {
    writeln!(out, "\n🐾 Fusion Prototype — Combining Audio + Text Risk Scores\n")?;

    let audio = fusion::load_latest_audio(store)?;
    match (&audio.file, audio.unreadable) {
        (Some(file), false) => {
            writeln!(out, "🎧 Latest audio file: {}", file.display())?;
            writeln!(out, "   Audio risk score: {}", format_optional(audio.score))?;
        }
        _ => writeln!(
            out,
            "⚠️  No usable audio_analysis JSON found in {}. Run the audio stage first or check the file content.",
            store.base_path().display()
        )?,
    }

    let text = fusion::load_latest_text(store)?;
    match (&text.file, text.unreadable) {
        (Some(file), false) => {
            writeln!(out, "📝 Latest text file:  {}", file.display())?;
            writeln!(out, "   Text risk score:  {}", format_optional(text.score))?;
        }
        _ => writeln!(
            out,
            "⚠️  No usable text_analysis JSON found in {}. Run the text stage first.",
            store.base_path().display()
        )?,
    }

    let timestamp = timestamp_now();
    let summary = fusion::fuse_latest(&audio, &text, timestamp.clone());
    let fused = format_optional(summary.fused_risk_score);

    writeln!(out, "\n🧮 Fused Risk:")?;
    writeln!(out, "   Score: {} ({})\n", fused, summary.fused_risk_label)?;
    writeln!(out, "📄 Summary:")?;
    writeln!(out, "Based on the available inputs:")?;
    writeln!(out, "- Audio-based risk: {}", format_optional(summary.audio_risk_score))?;
    writeln!(out, "- Text-based risk:  {}\n", format_optional(summary.text_risk_score))?;
    writeln!(
        out,
        "Overall kennel cough likelihood: {} ({}).\n",
        fused, summary.fused_risk_label
    )?;

    let path = store.save_json_as(&stamped_file_name("fusion_summary", &timestamp), &summary)?;
    writeln!(out, "💾 Saved fusion summary JSON to: {}", path.display())?;

    Ok(summary)
}

/// assess 的輸入
#[derive(Debug, Clone)]
pub struct AssessInputs<'a> {
    pub audio: &'a Path,
    pub detections: Option<&'a Path>,
    pub image: Option<&'a Path>,
    pub note: Option<&'a str>,
}

/// 單次完整評估：穩健音訊、影像、規則式文字與加權融合
pub fn assess_command<W: Write>(
    store: &LocalResultStore,
    inputs: &AssessInputs<'_>,
    out: &mut W,
) -> Result<SessionReport> {
    ensure_exists(inputs.audio)?;
    writeln!(out, "Running analysis...")?;

    let clip = audio::load_wav(inputs.audio)?;
    let audio_out = audio::assess_cough(&clip)?;

    let vision_out = match inputs.detections {
        Some(detections) => assess_image(detections, inputs.image)?,
        None => VisionAssessment::not_provided(),
    };

    let extractor = text::SymptomExtractor::new()?;
    let text_out = extractor.extract(inputs.note.unwrap_or_default());

    let fusion_out = fusion::weighted_fusion(&audio_out, &vision_out, &text_out);
    let contributions = fusion::contributions(&audio_out, &vision_out, &text_out);
    let summary = fusion::session_summary(fusion_out.risk_level);

    writeln!(out, "\n✅ Risk Assessment Complete")?;
    writeln!(out, "  Estimated Risk Level: {}", fusion_out.risk_level)?;
    writeln!(out, "  Risk Score (0–1):     {:.3}", fusion_out.risk_score)?;

    writeln!(out, "\n📝 Explanation:")?;
    for line in &fusion_out.explanation {
        writeln!(out, "  - {}", line)?;
    }

    writeln!(out, "\n📊 Risk Contribution Breakdown:")?;
    writeln!(out, "  Audio:  {:.1}%", contributions.audio * 100.0)?;
    writeln!(out, "  Vision: {:.1}%", contributions.vision * 100.0)?;
    writeln!(out, "  Text:   {:.1}%", contributions.text * 100.0)?;

    writeln!(out, "\n📄 Session Summary:")?;
    writeln!(out, "  {}", summary)?;
    writeln!(out, "\n⚠️  {}", fusion::DISCLAIMER)?;

    let session_id = timestamp_now();
    let report = SessionReport {
        session_id: session_id.clone(),
        audio: audio_out,
        vision: vision_out,
        text: text_out,
        fusion: fusion_out,
        contributions,
        summary: summary.to_string(),
    };

    let path = store.save_json_as(&stamped_file_name("session", &session_id), &report)?;
    writeln!(out, "\n💾 Saved session JSON to: {}", path.display())?;

    Ok(report)
}
