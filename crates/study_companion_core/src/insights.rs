//! crates/study_companion_core/src/insights.rs
//!
//! Small one-shot features around the chat: the daily quote, the festive banner,
//! translation and illustration prompts.

use crate::domain::{DailyQuote, FestiveTheme, Language, MedicalField};
use crate::ports::{PortError, TextRequest};
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::warn;

/// The banner theme for a calendar day, if any.
pub fn festive_theme(date: NaiveDate) -> Option<FestiveTheme> {
    let (theme, title) = match (date.month(), date.day()) {
        (1, 14) => ("kite", "Uttarayan"),
        (8, 15) => ("independence", "Independence Day"),
        (10, _) | (11, _) => ("festive", "Deepavali Season"),
        _ => return None,
    };
    Some(FestiveTheme {
        theme: theme.to_string(),
        title: title.to_string(),
    })
}

pub fn quote_request(field: MedicalField) -> TextRequest {
    let subject = match field {
        MedicalField::Bams => "a meaningful Sanskrit Shloka from Charaka Samhita",
        _ => "a medical clinical fact (anatomy, physiology or pathology)",
    };
    TextRequest {
        prompt: format!(
            "Generate {} with translations in English, Gujarati, and Hindi. \
             Return a JSON object: {{\"original\": string, \"translations\": {{\"en\": string, \"gu\": string, \"hi\": string}}}}.",
            subject
        ),
        json_output: true,
        ..Default::default()
    }
}

#[derive(Deserialize)]
struct QuotePayload {
    original: String,
    translations: BTreeMap<Language, String>,
}

/// Decodes the model's quote, falling back to the fixed quote on any failure
/// or when a translation is missing.
pub fn daily_quote(outcome: Result<String, PortError>, date: NaiveDate) -> DailyQuote {
    let date_str = date.format("%Y-%m-%d").to_string();
    let raw = match outcome {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Daily quote generation failed: {}", e);
            return fallback_quote(date_str);
        }
    };
    match serde_json::from_str::<QuotePayload>(strip_code_fence(&raw)) {
        Ok(payload) if Language::ALL.iter().all(|l| payload.translations.contains_key(l)) => DailyQuote {
            original: payload.original,
            translations: payload.translations,
            date: date_str,
        },
        Ok(_) => {
            warn!("Daily quote is missing a translation");
            fallback_quote(date_str)
        }
        Err(e) => {
            warn!("Daily quote was not valid JSON: {}", e);
            fallback_quote(date_str)
        }
    }
}

fn fallback_quote(date: String) -> DailyQuote {
    let translations = BTreeMap::from([
        (Language::English, "Preserve the health of the healthy.".to_string()),
        (Language::Gujarati, "સ્વસ્થ વ્યક્તિના સ્વાસ્થ્યનું રક્ષણ કરવું.".to_string()),
        (Language::Hindi, "स्वस्थ व्यक्ति के स्वास्थ्य की रक्षा करना।".to_string()),
    ]);
    DailyQuote {
        original: "Health is the greatest wealth.".to_string(),
        translations,
        date,
    }
}

// Some models wrap JSON output in a markdown fence even when asked not to.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

pub fn translate_request(text: &str, target: Language) -> TextRequest {
    TextRequest {
        prompt: format!(
            "Translate the following medical text into {}. Maintain clinical accuracy: \n\n{}",
            target.english_name(),
            text
        ),
        ..Default::default()
    }
}

/// The translation, or the untouched source text when translation failed.
pub fn translation_or_source(outcome: Result<String, PortError>, source: &str) -> String {
    match outcome {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => source.to_string(),
        Err(e) => {
            warn!("Translation failed: {}", e);
            source.to_string()
        }
    }
}

pub fn illustration_prompt(subject: &str) -> String {
    format!(
        "High-quality clinical illustration of: {}. Professional medical educational style.",
        subject
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    #[test]
    fn festive_calendar() {
        assert_eq!(festive_theme(day(1, 14)).unwrap().title, "Uttarayan");
        assert_eq!(festive_theme(day(8, 15)).unwrap().theme, "independence");
        assert_eq!(festive_theme(day(10, 2)).unwrap().title, "Deepavali Season");
        assert_eq!(festive_theme(day(11, 30)).unwrap().theme, "festive");
        assert!(festive_theme(day(1, 15)).is_none());
        assert!(festive_theme(day(12, 1)).is_none());
    }

    #[test]
    fn quote_prompt_follows_field() {
        assert!(quote_request(MedicalField::Bams).prompt.contains("Shloka"));
        let clinical = quote_request(MedicalField::Mbbs);
        assert!(clinical.prompt.contains("clinical fact"));
        assert!(clinical.json_output);
    }

    #[test]
    fn quote_is_parsed_and_dated() {
        let raw = r#"```json
{"original":"Swasthasya swasthya rakshanam","translations":{"en":"Protect health","gu":"આરોગ્ય","hi":"स्वास्थ्य"}}
```"#;
        let quote = daily_quote(Ok(raw.to_string()), day(3, 9));
        assert_eq!(quote.original, "Swasthasya swasthya rakshanam");
        assert_eq!(quote.translations[&Language::Hindi], "स्वास्थ्य");
        assert_eq!(quote.date, "2025-03-09");
    }

    #[test]
    fn bad_quote_falls_back() {
        let quote = daily_quote(Ok("not json".into()), day(3, 9));
        assert_eq!(quote.original, "Health is the greatest wealth.");
        assert_eq!(quote.translations.len(), 3);

        let partial = r#"{"original":"x","translations":{"en":"y"}}"#;
        let quote = daily_quote(Ok(partial.into()), day(3, 9));
        assert_eq!(quote.original, "Health is the greatest wealth.");

        let quote = daily_quote(Err(PortError::MissingCredential), day(3, 9));
        assert_eq!(quote.date, "2025-03-09");
    }

    #[test]
    fn translation_failure_returns_source() {
        assert_eq!(
            translation_or_source(Err(PortError::Unexpected("down".into())), "Vata dosha"),
            "Vata dosha"
        );
        assert_eq!(translation_or_source(Ok("વાત દોષ".into()), "Vata dosha"), "વાત દોષ");
        assert!(translate_request("x", Language::Gujarati).prompt.contains("into Gujarati"));
    }
}
