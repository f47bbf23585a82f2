//! Response quality scanning
//!
//! Advisory only: the scanner scores a model reply and may append a caveat,
//! but never blocks or regenerates it.

use super::classifier::is_weather_query;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const SPECIFIC_CLAIM_PENALTY: f64 = 0.2;
const LOW_CONFIDENCE_PENALTY: f64 = 0.1;
const OVERCONFIDENCE_PENALTY: f64 = 0.15;
const FACTUAL_CLAIM_PENALTY: f64 = 0.25;
const CONTRADICTION_PENALTY: f64 = 0.3;
const MISSING_WEATHER_PENALTY: f64 = 0.3;
const SHORT_REPLY_PENALTY: f64 = 0.1;
const OFF_TOPIC_PENALTY: f64 = 0.2;

/// Below this the generic low-confidence note is appended
const LOW_SCORE: f64 = 0.4;
/// Below this some caveat is appended
const CAVEAT_SCORE: f64 = 0.6;

/// Hedges tolerated before the reply counts as low-confidence
const HEDGING_LIMIT: usize = 3;

const LONG_QUESTION_WORDS: usize = 20;
const SHORT_REPLY_WORDS: usize = 25;

const LOW_CONFIDENCE_NOTE: &str = "\n\n---\n*Note: I'm not fully confident about parts of this answer. Please verify important details such as prices, schedules, and entry requirements with official sources before you travel.*";

const VERIFY_NOTE: &str = "\n\n---\n*Tip: Travel details change often, so double-check anything important with official sources before booking.*";

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("quality pattern is valid")
}

static SPECIFIC_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "price per night",
            compile(r"(?i)[$€£]\s?\d+(?:[.,]\d{1,2})?\s*(?:per|a|/)\s*night"),
        ),
        (
            "calendar date",
            compile(r"(?i)\b(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+\d{1,2}(?:st|nd|rd|th)?,?\s+\d{4}\b"),
        ),
        ("calendar date", compile(r"\b\d{1,2}/\d{1,2}/\d{4}\b")),
        ("clock time", compile(r"(?i)\b\d{1,2}:\d{2}\s*(?:am|pm)?\b")),
        (
            "phone number",
            compile(r"(?:\+\d{1,3}[\s.-]?)?\(?\d{2,4}\)?[\s.-]\d{3,4}[\s.-]\d{3,4}\b"),
        ),
        (
            "street address",
            compile(r"\b\d{1,5}\s+(?:[A-Z][a-z]+\s+){1,3}(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Lane|Ln|Drive|Dr|Way|Place|Square)\b"),
        ),
        ("flight number", compile(r"\b[A-Z]{2}\s?\d{3,4}\b")),
    ]
});

static FACTUAL_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "exchange rate",
            compile(r"(?i)\b1\s*(?:usd|eur|gbp|jpy|dollars?|euros?|pounds?)\s*(?:=|is|equals|gets you)\s*(?:about\s+|around\s+)?[\d.,]+"),
        ),
        (
            "exchange rate",
            compile(r"(?i)exchange rate\s+(?:is|of)\s+(?:about\s+|around\s+)?[\d.,]+"),
        ),
        (
            "visa requirement",
            compile(r"(?i)\bvisas?\s+(?:is|are)\s+(?:not\s+)?required|\b(?:do|does)\s+not\s+need\s+a\s+visa|\bvisa[- ]free\s+for\s+\d+\s+days"),
        ),
        (
            "crime rate",
            compile(r"(?i)\bcrime rates?\s+(?:is|are|of)\b|\b(?:safest|most dangerous)\s+(?:city|country|neighbou?rhood)"),
        ),
        ("hotel rating", compile(r"(?i)\b[1-5](?:\.\d)?[- ]star\b")),
        (
            "transit schedule",
            compile(r"(?i)\b(?:trains?|bus|buses|ferry|ferries|metro|subway|trams?|flights?)\s+(?:leaves?|departs?|runs?|arrives?|operates?)\s+(?:every|at|hourly)\b"),
        ),
        (
            "attraction hours",
            compile(r"(?i)\b(?:opens?|is open|closes?)\s+(?:daily\s+)?(?:at|from|until)\s+\d"),
        ),
        (
            "admission fee",
            compile(r"(?i)\b(?:entry|admission|entrance)\s+(?:fee|ticket)s?\s+(?:is|are|costs?)\s+[$€£]?\d"),
        ),
    ]
});

const HEDGING_PHRASES: &[&str] = &[
    "i think",
    "i believe",
    "probably",
    "perhaps",
    "possibly",
    "might",
    "may be",
    "not sure",
    "it seems",
    "likely",
];

const OVERCONFIDENT_PHRASES: &[&str] = &[
    "definitely",
    "100% sure",
    "guaranteed",
    "without a doubt",
    "absolutely certain",
    "i'm certain",
    "no doubt",
];

static CONTRADICTION_PAIRS: Lazy<Vec<(&'static str, &'static str, Regex, Regex)>> =
    Lazy::new(|| {
        vec![
            ("hot", "cold", compile(r"(?i)\bhot\b"), compile(r"(?i)\bcold\b")),
            (
                "sunny",
                "rainy",
                compile(r"(?i)\bsunny\b"),
                compile(r"(?i)\brain(?:y|ing)?\b"),
            ),
            (
                "peak season",
                "off-season",
                compile(r"(?i)\b(?:peak|high)\s+season\b"),
                compile(r"(?i)\b(?:off[- ]?season|low\s+season)\b"),
            ),
        ]
    });

static WEATHER_DATA_PATTERN: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)\d+(?:\.\d+)?\s*°|\bdegrees\b|\bhumidity\b|\bwind speed\b|weather data not available|unable to fetch weather")
});

const OVERLAP_STOPWORDS: &[&str] = &[
    "what", "what's", "whats", "where", "when", "which", "while", "should", "could", "would",
    "about", "there", "their", "them", "they", "then", "than", "with", "from", "have", "this",
    "that", "these", "those", "your", "into", "like", "does", "will", "some", "were", "been",
    "also", "just", "very", "much", "many", "more", "most", "tell", "please", "know", "want",
    "need", "good", "really",
];

/// Issue categories the scanner can raise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualityFlag {
    MissingWeatherData,
    Contradictions,
    FactualClaims,
    SpecificClaims,
    OffTopic,
    GenericResponse,
    LowConfidenceLanguage,
    OverconfidentLanguage,
}

impl QualityFlag {
    /// Caveat order, most important first
    const PRIORITY: [QualityFlag; 6] = [
        QualityFlag::MissingWeatherData,
        QualityFlag::Contradictions,
        QualityFlag::FactualClaims,
        QualityFlag::SpecificClaims,
        QualityFlag::OffTopic,
        QualityFlag::GenericResponse,
    ];

    pub fn penalty(&self) -> f64 {
        match self {
            QualityFlag::MissingWeatherData => MISSING_WEATHER_PENALTY,
            QualityFlag::Contradictions => CONTRADICTION_PENALTY,
            QualityFlag::FactualClaims => FACTUAL_CLAIM_PENALTY,
            QualityFlag::SpecificClaims => SPECIFIC_CLAIM_PENALTY,
            QualityFlag::OffTopic => OFF_TOPIC_PENALTY,
            QualityFlag::GenericResponse => SHORT_REPLY_PENALTY,
            QualityFlag::LowConfidenceLanguage => LOW_CONFIDENCE_PENALTY,
            QualityFlag::OverconfidentLanguage => OVERCONFIDENCE_PENALTY,
        }
    }

    /// Category-specific note; confidence-language flags have none
    pub fn caveat(&self) -> Option<&'static str> {
        match self {
            QualityFlag::MissingWeatherData => Some("\n\n---\n*Note: I couldn't confirm live weather data for this answer. Check a current forecast before you go.*"),
            QualityFlag::Contradictions => Some("\n\n---\n*Note: Conditions can vary a lot by season and time of day. Check the specifics for your travel dates.*"),
            QualityFlag::FactualClaims => Some("\n\n---\n*Note: Entry rules, exchange rates, schedules, and opening hours change frequently. Confirm them with official sources.*"),
            QualityFlag::SpecificClaims => Some("\n\n---\n*Note: Specific prices, times, and contact details may be out of date. Verify them directly with the provider.*"),
            QualityFlag::OffTopic => Some("\n\n---\n*Note: This answer may not fully address your question. Feel free to rephrase or add details.*"),
            QualityFlag::GenericResponse => Some("\n\n---\n*Note: This is a brief overview. Ask a follow-up question for more detail.*"),
            QualityFlag::LowConfidenceLanguage | QualityFlag::OverconfidentLanguage => None,
        }
    }
}

/// Counts of hedging and overconfident phrases
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfidenceSignals {
    pub hedging: usize,
    pub overconfident: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QualityReport {
    pub score: f64,
    pub flags: Vec<QualityFlag>,
    pub specific_claims: Vec<String>,
    pub factual_claims: Vec<String>,
    pub contradictions: Vec<(&'static str, &'static str)>,
    pub confidence: ConfidenceSignals,
}

impl QualityReport {
    pub fn has(&self, flag: QualityFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Highest-priority flag that carries its own caveat
    pub fn primary_flag(&self) -> Option<QualityFlag> {
        QualityFlag::PRIORITY.into_iter().find(|f| self.has(*f))
    }
}

/// Scores replies and decides which caveat, if any, to append
#[derive(Debug, Clone)]
pub struct QualityScanner {
    baseline: f64,
    off_topic_threshold: f64,
}

impl Default for QualityScanner {
    fn default() -> Self {
        Self::new(0.5, 0.3)
    }
}

impl QualityScanner {
    pub fn new(baseline: f64, off_topic_threshold: f64) -> Self {
        Self {
            baseline,
            off_topic_threshold,
        }
    }

    pub fn from_config(config: &crate::config::AssistantConfig) -> Self {
        Self::new(config.quality_baseline, config.off_topic_threshold)
    }

    pub fn scan(&self, question: &str, reply: &str) -> QualityReport {
        let specific_claims = detect_specific_claims(reply);
        let factual_claims = detect_factual_claims(reply);
        let contradictions = detect_contradictions(reply);
        let confidence = detect_confidence_indicators(reply);

        let mut flags = Vec::new();
        if is_weather_query(question) && !WEATHER_DATA_PATTERN.is_match(reply) {
            flags.push(QualityFlag::MissingWeatherData);
        }
        if !contradictions.is_empty() {
            flags.push(QualityFlag::Contradictions);
        }
        if !factual_claims.is_empty() {
            flags.push(QualityFlag::FactualClaims);
        }
        if !specific_claims.is_empty() {
            flags.push(QualityFlag::SpecificClaims);
        }
        if question_overlap(question, reply).is_some_and(|o| o < self.off_topic_threshold) {
            flags.push(QualityFlag::OffTopic);
        }
        if word_count(question) > LONG_QUESTION_WORDS && word_count(reply) < SHORT_REPLY_WORDS {
            flags.push(QualityFlag::GenericResponse);
        }
        if confidence.hedging >= HEDGING_LIMIT {
            flags.push(QualityFlag::LowConfidenceLanguage);
        }
        if confidence.overconfident > 0 {
            flags.push(QualityFlag::OverconfidentLanguage);
        }

        let penalty: f64 = flags.iter().map(QualityFlag::penalty).sum();
        let score = (self.baseline - penalty).clamp(0.0, 1.0);

        QualityReport {
            score,
            flags,
            specific_claims,
            factual_claims,
            contradictions,
            confidence,
        }
    }

    /// Reply with the caveat selected by `report` appended, if any
    pub fn annotate(&self, reply: &str, report: &QualityReport) -> String {
        let note = if report.score < LOW_SCORE {
            Some(LOW_CONFIDENCE_NOTE)
        } else if report.score < CAVEAT_SCORE {
            Some(
                report
                    .primary_flag()
                    .and_then(|f| f.caveat())
                    .unwrap_or(VERIFY_NOTE),
            )
        } else {
            None
        };

        match note {
            Some(note) => format!("{}{}", reply.trim_end(), note),
            None => reply.to_string(),
        }
    }
}

fn find_all(patterns: &[(&'static str, Regex)], text: &str) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|(_, re)| re.find_iter(text).map(|m| m.as_str().trim().to_string()))
        .collect()
}

pub fn detect_specific_claims(reply: &str) -> Vec<String> {
    find_all(&SPECIFIC_PATTERNS, reply)
}

pub fn detect_factual_claims(reply: &str) -> Vec<String> {
    find_all(&FACTUAL_PATTERNS, reply)
}

pub fn detect_confidence_indicators(reply: &str) -> ConfidenceSignals {
    let lower = reply.to_lowercase();
    let count = |phrases: &[&str]| -> usize {
        phrases.iter().map(|p| lower.matches(*p).count()).sum()
    };
    ConfidenceSignals {
        hedging: count(HEDGING_PHRASES),
        overconfident: count(OVERCONFIDENT_PHRASES),
    }
}

pub fn detect_contradictions(reply: &str) -> Vec<(&'static str, &'static str)> {
    CONTRADICTION_PAIRS
        .iter()
        .filter(|(_, _, a, b)| a.is_match(reply) && b.is_match(reply))
        .map(|(a, b, _, _)| (*a, *b))
        .collect()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn content_words(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|w| w.chars().count() > 3 && !OVERLAP_STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Share of the question's content words that reappear in the reply
fn question_overlap(question: &str, reply: &str) -> Option<f64> {
    let asked = content_words(question);
    if asked.is_empty() {
        return None;
    }
    let answered = content_words(reply);
    let shared = asked.intersection(&answered).count();
    Some(shared as f64 / asked.len() as f64)
}
