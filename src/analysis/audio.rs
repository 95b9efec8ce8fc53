//! 咳嗽類聲音事件偵測。
//!
//! 兩種偵測器：
//! - 能量爆發偵測（原型）：frame 能量超過平均值 + 1.5 倍標準差即視為一次爆發。
//! - 穩健峰值偵測：平滑後的 RMS 以中位數與 MAD 設門檻，再依事件率與數量評分。

use crate::domain::model::{round_to, AudioAnalysis, CoughAssessment, RiskLevel};
use crate::utils::error::{CompanionError, Result};
use std::path::Path;

pub const ENERGY_FRAME_LENGTH: usize = 2048;
pub const ENERGY_HOP_LENGTH: usize = 512;
const ENERGY_STD_FACTOR: f64 = 1.5;
const RISK_PER_EVENT: f64 = 0.07;

pub const RMS_FRAME_LENGTH: usize = 2048;
pub const RMS_HOP_LENGTH: usize = 1024;
const SMOOTHING_WINDOW: usize = 5;
const MAD_EPSILON: f64 = 1e-9;
const MIN_EVENT_DISTANCE_S: f64 = 0.5;
const MAD_MULTIPLIERS: [f64; 3] = [10.0, 8.0, 6.0];
const FEW_EVENTS: usize = 4;
const FEW_EVENTS_DAMPING: f64 = 0.4;

/// 單聲道音訊
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// 讀取 WAV，多聲道取平均，整數樣本縮放到 [-1, 1]
pub fn load_wav<P: AsRef<Path>>(path: P) -> Result<AudioClip> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CompanionError::MissingInputError {
            path: path.display().to_string(),
        });
    }

    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f64;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f64 / scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    let samples = interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
        .collect();

    tracing::debug!(
        "Loaded {}: {} Hz, {} channel(s), {} bits",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    Ok(AudioClip::new(samples, spec.sample_rate))
}

/// 每個 hop 起點的能量（Σ y²），最後幾個 frame 會被截短
pub fn frame_energy(samples: &[f64], frame_length: usize, hop_length: usize) -> Vec<f64> {
    (0..samples.len())
        .step_by(hop_length.max(1))
        .map(|start| {
            let end = (start + frame_length).min(samples.len());
            samples[start..end].iter().map(|y| y * y).sum::<f64>()
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// 母體標準差
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn frames_to_timestamps(frames: &[usize], hop_length: usize, sample_rate: u32) -> Vec<f64> {
    frames
        .iter()
        .map(|&frame| round_to((frame * hop_length) as f64 / sample_rate as f64, 2))
        .collect()
}

pub fn energy_risk_level(score: f64) -> RiskLevel {
    if score > 0.6 {
        RiskLevel::High
    } else if score > 0.3 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// 能量爆發偵測的輸出與中間能量曲線
#[derive(Debug, Clone)]
pub struct EnergyDetection {
    pub analysis: AudioAnalysis,
    pub energy: Vec<f64>,
}

pub fn detect_energy_bursts(clip: &AudioClip) -> Result<EnergyDetection> {
    if clip.sample_rate == 0 {
        return Err(CompanionError::ProcessingError {
            message: "Audio has a sample rate of 0 Hz".to_string(),
        });
    }

    let energy = frame_energy(&clip.samples, ENERGY_FRAME_LENGTH, ENERGY_HOP_LENGTH);
    let threshold = mean(&energy) + ENERGY_STD_FACTOR * std_dev(&energy);

    let burst_frames: Vec<usize> = energy
        .iter()
        .enumerate()
        .filter(|(_, e)| **e > threshold)
        .map(|(i, _)| i)
        .collect();

    let cough_timestamps = frames_to_timestamps(&burst_frames, ENERGY_HOP_LENGTH, clip.sample_rate);
    let risk_score = (cough_timestamps.len() as f64 * RISK_PER_EVENT).min(1.0);

    tracing::debug!(
        "Energy threshold {:.6}, {} of {} frames above it",
        threshold,
        burst_frames.len(),
        energy.len()
    );

    Ok(EnergyDetection {
        analysis: AudioAnalysis {
            risk_score,
            audio_risk_score: risk_score,
            risk_label: energy_risk_level(risk_score),
            sample_rate: clip.sample_rate,
            num_cough_events: cough_timestamps.len(),
            cough_timestamps,
        },
        energy,
    })
}

/// 置中的 RMS：兩端各補 frame_length / 2 個零，共 1 + len / hop 個 frame
pub fn centered_rms(samples: &[f64], frame_length: usize, hop_length: usize) -> Vec<f64> {
    let hop = hop_length.max(1);
    let half = (frame_length / 2) as isize;
    let frames = 1 + samples.len() / hop;

    (0..frames)
        .map(|t| {
            let center = (t * hop) as isize;
            let start = center - half;
            let sum_sq: f64 = (start..start + frame_length as isize)
                .filter(|&i| i >= 0 && (i as usize) < samples.len())
                .map(|i| samples[i as usize].powi(2))
                .sum();
            (sum_sq / frame_length as f64).sqrt()
        })
        .collect()
}

/// 均勻視窗的置中卷積，邊界外視為 0。
/// 輸出長度為 max(輸入, 視窗)，輸入比視窗短時會補出視窗長度。
pub fn moving_average(values: &[f64], window: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let window = window.max(1);
    let len = values.len() as isize;
    let out_len = values.len().max(window);
    let offset = ((values.len().min(window) - 1) / 2) as isize;

    (0..out_len as isize)
        .map(|i| {
            let end = i + offset;
            let sum: f64 = (end - window as isize + 1..=end)
                .filter(|&j| j >= 0 && j < len)
                .map(|j| values[j as usize])
                .sum();
            sum / window as f64
        })
        .collect()
}

/// 高於門檻的局部極大值，且與上一個峰至少相隔 min_distance 個 frame
pub fn detect_peaks(values: &[f64], threshold: f64, min_distance: usize) -> Vec<usize> {
    let mut peaks: Vec<usize> = Vec::new();
    if values.len() < 3 {
        return peaks;
    }

    for i in 1..values.len() - 1 {
        let is_peak = values[i] > threshold && values[i] > values[i - 1] && values[i] > values[i + 1];
        if is_peak && peaks.last().is_none_or(|&last| i - last >= min_distance) {
            peaks.push(i);
        }
    }
    peaks
}

pub fn assess_cough(clip: &AudioClip) -> Result<CoughAssessment> {
    if clip.sample_rate == 0 {
        return Err(CompanionError::ProcessingError {
            message: "Audio has a sample rate of 0 Hz".to_string(),
        });
    }

    let rms = centered_rms(&clip.samples, RMS_FRAME_LENGTH, RMS_HOP_LENGTH);
    let smoothed = moving_average(&rms, SMOOTHING_WINDOW);

    let med = median(&smoothed);
    let deviations: Vec<f64> = smoothed.iter().map(|v| (v - med).abs()).collect();
    let mad = median(&deviations) + MAD_EPSILON;

    let min_distance = (MIN_EVENT_DISTANCE_S * clip.sample_rate as f64 / RMS_HOP_LENGTH as f64) as usize;

    let mut peaks = Vec::new();
    for k in MAD_MULTIPLIERS {
        peaks = detect_peaks(&smoothed, med + k * mad, min_distance);
        if !peaks.is_empty() {
            tracing::debug!("Threshold med + {}·MAD found {} peak(s)", k, peaks.len());
            break;
        }
    }

    let timestamps = frames_to_timestamps(&peaks, RMS_HOP_LENGTH, clip.sample_rate);
    let events = timestamps.len();

    let events_per_10s = events as f64 / (clip.duration_seconds() / 10.0).max(1e-9);
    let rate_score = (events_per_10s / 6.0).min(1.0);
    let count_score = (events as f64 / 25.0).min(1.0);

    let mut score = (0.5 * rate_score + 0.5 * count_score).min(1.0);
    // 少量峰值多半是吠叫
    if events < FEW_EVENTS {
        score *= FEW_EVENTS_DAMPING;
    }

    Ok(CoughAssessment {
        cough_score: round_to(score, 3),
        events,
        timestamps,
    })
}
