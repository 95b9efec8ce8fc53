use crate::domain::model::{round_to, NoteAnalysis, RiskLevel, SymptomReport};
use crate::utils::error::Result;
use regex::Regex;

const SYMPTOM_KEYWORDS: &[&str] = &[
    "cough", "hacking", "gagging", "wheezing", "honking", "choking", "phlegm", "mucus",
];
const CONTEXT_KEYWORDS: &[&str] = &[
    "daycare", "shelter", "boarding", "grooming", "park", "dog park", "kennel",
];
const SEVERITY_KEYWORDS: &[&str] = &[
    "lethargic",
    "tired",
    "not eating",
    "no appetite",
    "weak",
    "breathing fast",
    "difficulty breathing",
];

fn matching_keywords(text: &str, keywords: &[&str]) -> Vec<String> {
    keywords
        .iter()
        .filter(|keyword| text.contains(*keyword))
        .map(|keyword| keyword.to_string())
        .collect()
}

pub fn note_risk_level(score: f64) -> RiskLevel {
    if score >= 0.7 {
        RiskLevel::High
    } else if score >= 0.4 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// 以子字串比對症狀、環境與嚴重度關鍵字，命中越多風險越高
pub fn analyze_owner_note(note: &str) -> NoteAnalysis {
    let text = note.to_lowercase();

    let found_symptoms = matching_keywords(&text, SYMPTOM_KEYWORDS);
    let found_context = matching_keywords(&text, CONTEXT_KEYWORDS);
    let found_severity = matching_keywords(&text, SEVERITY_KEYWORDS);

    let mut score: f64 = 0.0;
    if !found_symptoms.is_empty() {
        score += 0.4;
    }
    if !found_context.is_empty() {
        score += 0.3;
    }
    if !found_severity.is_empty() {
        score += 0.3;
    }
    let score = score.min(1.0);

    NoteAnalysis {
        note: note.to_string(),
        found_symptoms,
        found_context,
        found_severity,
        text_risk_score: round_to(score, 2),
        text_risk_label: note_risk_level(score),
    }
}

/// 概念名稱、比對樣式、權重，以及是否需要處理否定語
struct Concept {
    name: &'static str,
    patterns: &'static [&'static str],
    weight: f64,
    negatable: bool,
}

const CONCEPTS: &[Concept] = &[
    Concept {
        name: "cough",
        patterns: &["cough", "coughing", "hacking", "hack"],
        weight: 0.25,
        negatable: true,
    },
    Concept {
        name: "gagging",
        patterns: &["gag", "gagging", "retch", "retching"],
        weight: 0.20,
        negatable: true,
    },
    Concept {
        name: "sneeze",
        patterns: &["sneeze", "sneezing"],
        weight: 0.10,
        negatable: true,
    },
    Concept {
        name: "lethargy",
        patterns: &["lethargy", "lethargic", "low energy", "tired", "fatigue", "weak"],
        weight: 0.20,
        negatable: true,
    },
    Concept {
        name: "daycare",
        patterns: &["daycare", "kennel", "boarding", "grooming"],
        weight: 0.10,
        negatable: false,
    },
    Concept {
        name: "appetite_loss",
        patterns: &["not eating", "loss of appetite", "no appetite", "poor appetite"],
        weight: 0.25,
        negatable: true,
    },
];

/// 強度修飾語：(名稱, 樣式, 加分)
const MODIFIERS: &[(&str, &str, f64)] = &[
    ("frequent", r"\bfrequent\b|\boften\b|\brepeated\b|\bmany\b|\bseveral\b", 0.15),
    ("daily/multiple", r"\bmultiple times\b|\bevery day\b|\bdaily\b", 0.15),
    ("night", r"\bat night\b|\bnight\b|\bkeeping us up\b", 0.10),
    ("dry/hacking", r"\bdry\b|\bhacking\b|\bchoking\b", 0.10),
];

const NEGATION_PREFIXES: &[&str] = &[r"no", r"not", r"without", r"doesn['’]?t", r"didn['’]?t"];

struct CompiledPattern {
    matcher: Regex,
    negation: Option<Regex>,
}

struct CompiledConcept {
    concept: &'static Concept,
    patterns: Vec<CompiledPattern>,
}

/// 規則式 NLP：關鍵詞、否定語與強度修飾語，全部可解釋
pub struct SymptomExtractor {
    concepts: Vec<CompiledConcept>,
    modifiers: Vec<(&'static str, Regex, f64)>,
}

impl SymptomExtractor {
    pub fn new() -> Result<Self> {
        let mut concepts = Vec::with_capacity(CONCEPTS.len());
        for concept in CONCEPTS {
            let mut patterns = Vec::with_capacity(concept.patterns.len());
            for pattern in concept.patterns {
                let matcher = Regex::new(&format!(r"\b{}\b", pattern))?;
                // 只看樣式的第一個字，例如 "low energy" → "low"
                let negation = if concept.negatable {
                    let token = pattern.split_whitespace().next().unwrap_or(*pattern);
                    let alternatives = NEGATION_PREFIXES.join("|");
                    Some(Regex::new(&format!(r"\b(?:{})\s+{}\b", alternatives, regex::escape(token)))?)
                } else {
                    None
                };
                patterns.push(CompiledPattern { matcher, negation });
            }
            concepts.push(CompiledConcept { concept, patterns });
        }

        let mut modifiers = Vec::with_capacity(MODIFIERS.len());
        for (name, pattern, bonus) in MODIFIERS {
            modifiers.push((*name, Regex::new(pattern)?, *bonus));
        }

        Ok(Self { concepts, modifiers })
    }

    pub fn extract(&self, owner_note: &str) -> SymptomReport {
        let text = owner_note.trim().to_lowercase();
        if text.is_empty() {
            return SymptomReport {
                keywords: Vec::new(),
                modifiers_detected: Vec::new(),
                severity_score: 0.0,
                notes: "No owner note provided".to_string(),
            };
        }

        let mut keywords: Vec<String> = Vec::new();
        let mut severity: f64 = 0.0;

        for compiled in &self.concepts {
            // 任一未被否定的樣式命中即算偵測到
            let found = compiled.patterns.iter().any(|p| {
                p.matcher.is_match(&text)
                    && !p.negation.as_ref().is_some_and(|negation| negation.is_match(&text))
            });
            if found && !keywords.iter().any(|k| k == compiled.concept.name) {
                keywords.push(compiled.concept.name.to_string());
                severity += compiled.concept.weight;
            }
        }

        let mut modifiers_detected = Vec::new();
        let mut intensity: f64 = 0.0;
        for (name, pattern, bonus) in &self.modifiers {
            if pattern.is_match(&text) {
                modifiers_detected.push(name.to_string());
                intensity += bonus;
            }
        }

        SymptomReport {
            keywords,
            modifiers_detected,
            severity_score: round_to(severity + intensity, 3).min(1.0),
            notes: "Rule-based NLP with negation + intensity modifiers (interpretable)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_analysis_high_risk() {
        let result = analyze_owner_note("My dog has a hacking cough after daycare and is very tired.");
        assert_eq!(result.found_symptoms, vec!["cough", "hacking"]);
        assert_eq!(result.found_context, vec!["daycare"]);
        assert_eq!(result.found_severity, vec!["tired"]);
        assert_eq!(result.text_risk_score, 1.0);
        assert_eq!(result.text_risk_label, RiskLevel::High);
    }

    #[test]
    fn test_keyword_analysis_symptom_and_context_is_high() {
        let result = analyze_owner_note("Coughing since the Dog Park visit");
        assert_eq!(result.found_context, vec!["park", "dog park"]);
        assert_eq!(result.text_risk_score, 0.7);
        assert_eq!(result.text_risk_label, RiskLevel::High);
    }

    #[test]
    fn test_keyword_analysis_levels() {
        assert_eq!(analyze_owner_note("some wheezing").text_risk_label, RiskLevel::Medium);
        assert_eq!(analyze_owner_note("went to the kennel").text_risk_label, RiskLevel::Low);
        assert_eq!(analyze_owner_note("all good").text_risk_score, 0.0);
    }

    #[test]
    fn test_extractor_detects_concepts_and_modifiers() {
        let extractor = SymptomExtractor::new().unwrap();
        let report = extractor.extract("Dry hacking cough several times a day, worse at night, after boarding");

        assert_eq!(report.keywords, vec!["cough", "daycare"]);
        assert_eq!(report.modifiers_detected, vec!["frequent", "night", "dry/hacking"]);
        // 0.25 + 0.10 + 0.15 + 0.10 + 0.10
        assert_eq!(report.severity_score, 0.7);
    }

    #[test]
    fn test_extractor_honors_negation() {
        let extractor = SymptomExtractor::new().unwrap();
        let report = extractor.extract("No cough and not tired, just sneezing");
        assert_eq!(report.keywords, vec!["sneeze"]);
        assert_eq!(report.severity_score, 0.1);
    }

    #[test]
    fn test_negation_does_not_cover_other_patterns() {
        let extractor = SymptomExtractor::new().unwrap();
        // "no cough" 否定了 cough，但 "hacking" 仍成立
        let report = extractor.extract("no cough but some hacking");
        assert_eq!(report.keywords, vec!["cough"]);
    }

    #[test]
    fn test_extractor_caps_score() {
        let extractor = SymptomExtractor::new().unwrap();
        let report = extractor.extract(
            "Frequent hacking, gagging, sneezing, lethargic, not eating, daily at night since kennel",
        );
        assert_eq!(report.severity_score, 1.0);
    }

    #[test]
    fn test_empty_note() {
        let extractor = SymptomExtractor::new().unwrap();
        let report = extractor.extract("   ");
        assert!(report.keywords.is_empty());
        assert_eq!(report.severity_score, 0.0);
        assert_eq!(report.notes, "No owner note provided");
    }
}
