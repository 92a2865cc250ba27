//! crates/study_companion_core/src/domain.rs
//!
//! Defines the core data structures for the application.
//! Every record here is mirrored 1:1 into the local key/value store as JSON,
//! so field names follow the camelCase snapshot format.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Milliseconds since the Unix epoch, the timestamp unit used in every record.
pub type Millis = i64;

pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

//=========================================================================================
// Profile Enumerations
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "gu")]
    Gujarati,
    #[serde(rename = "hi")]
    Hindi,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::English, Language::Gujarati, Language::Hindi];

    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Gujarati => "gu",
            Language::Hindi => "hi",
        }
    }

    /// The language name as it is written into prompts.
    pub fn english_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Gujarati => "Gujarati",
            Language::Hindi => "Hindi",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Student,
    Professor,
    Teacher,
    Doctor,
    Patient,
    #[serde(rename = "Normal Person")]
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MedicalField {
    #[serde(rename = "MBBS")]
    Mbbs,
    #[serde(rename = "BDS")]
    Bds,
    #[serde(rename = "BAMS")]
    Bams,
    #[serde(rename = "BHMS")]
    Bhms,
    Nursing,
    Physiotherapy,
    Pharmacy,
    #[serde(rename = "General Health")]
    General,
}

impl MedicalField {
    /// Fields offered during onboarding. `General` is a catch-all and is never
    /// selectable there.
    pub const SELECTABLE: [MedicalField; 7] = [
        MedicalField::Mbbs,
        MedicalField::Bds,
        MedicalField::Bams,
        MedicalField::Bhms,
        MedicalField::Nursing,
        MedicalField::Physiotherapy,
        MedicalField::Pharmacy,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MedicalField::Mbbs => "MBBS",
            MedicalField::Bds => "BDS",
            MedicalField::Bams => "BAMS",
            MedicalField::Bhms => "BHMS",
            MedicalField::Nursing => "Nursing",
            MedicalField::Physiotherapy => "Physiotherapy",
            MedicalField::Pharmacy => "Pharmacy",
            MedicalField::General => "General Health",
        }
    }
}

impl fmt::Display for MedicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseLevel {
    #[serde(rename = "1st Year")]
    Year1,
    #[serde(rename = "2nd Year")]
    Year2,
    #[serde(rename = "3rd Year")]
    Year3,
    #[serde(rename = "4th Year")]
    Year4,
    #[serde(rename = "Internship")]
    Internship,
    #[serde(rename = "Post Graduate (MD/MS)")]
    PostGraduate,
    #[serde(rename = "PhD / Research")]
    Research,
    #[serde(rename = "Not Applicable")]
    NotApplicable,
    #[serde(rename = "Coming Soon")]
    ComingSoon,
}

//=========================================================================================
// User Profile
//=========================================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub youtube: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facebook: Option<String>,
}

/// The single active end-user of this device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub profile_pic: String,
    pub role: Role,
    pub gender: Gender,
    pub medical_field: MedicalField,
    pub course_level: CourseLevel,
    pub preferred_language: Language,
    pub is_profile_complete: bool,
    pub agreed_to_privacy: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_links: Option<SocialLinks>,
}

/// A partial update to a `UserProfile`. Only the provided fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_pic: Option<String>,
    pub role: Option<Role>,
    pub gender: Option<Gender>,
    pub medical_field: Option<MedicalField>,
    pub course_level: Option<CourseLevel>,
    pub preferred_language: Option<Language>,
    pub is_profile_complete: Option<bool>,
    pub agreed_to_privacy: Option<bool>,
    pub social_links: Option<SocialLinks>,
}

impl UserProfile {
    /// Applies `update` field by field. Social links are merged key by key, so
    /// an update carrying only `youtube` leaves `facebook` untouched.
    pub fn merge(&mut self, update: ProfileUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(email) = update.email {
            self.email = email;
        }
        if let Some(pic) = update.profile_pic {
            self.profile_pic = pic;
        }
        if let Some(role) = update.role {
            self.role = role;
        }
        if let Some(gender) = update.gender {
            self.gender = gender;
        }
        if let Some(field) = update.medical_field {
            self.medical_field = field;
        }
        if let Some(level) = update.course_level {
            self.course_level = level;
        }
        if let Some(language) = update.preferred_language {
            self.preferred_language = language;
        }
        if let Some(complete) = update.is_profile_complete {
            self.is_profile_complete = complete;
        }
        if let Some(agreed) = update.agreed_to_privacy {
            self.agreed_to_privacy = agreed;
        }
        if let Some(links) = update.social_links {
            let current = self.social_links.get_or_insert_with(SocialLinks::default);
            if links.youtube.is_some() {
                current.youtube = links.youtube;
            }
            if links.facebook.is_some() {
                current.facebook = links.facebook;
            }
        }
    }
}

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// An inline file sent along with a message. `data` is base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<FilePart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding: Option<Vec<serde_json::Value>>,
    pub timestamp: Millis,
}

impl Message {
    pub fn user(content: impl Into<String>, attachments: Vec<FilePart>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            attachments: (!attachments.is_empty()).then_some(attachments),
            grounding: None,
            timestamp: now_millis(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            attachments: None,
            grounding: None,
            timestamp: now_millis(),
        }
    }
}

/// One independent conversation thread with the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub last_modified: Millis,
}

//=========================================================================================
// Study Desk Sources
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Image,
}

/// A document or image uploaded by the user onto the study desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSource {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub data: String,
}

impl CustomSource {
    pub fn mime_type(&self) -> &'static str {
        match self.kind {
            SourceKind::Pdf => "application/pdf",
            SourceKind::Image => "image/png",
        }
    }
}

/// A catalog book pinned onto the study desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedBook {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subject: String,
}

//=========================================================================================
// Library Catalog
//=========================================================================================

/// A chapter of a book. Content is keyed by language; not every language is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Adhyaya {
    pub id: String,
    pub number: u32,
    pub title: String,
    pub content: BTreeMap<Language, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_meanings: Option<String>,
}

impl Adhyaya {
    /// Chapter text for the reader: preferred language, then English, then Gujarati.
    pub fn text_for(&self, preferred: Language) -> &str {
        [preferred, Language::English, Language::Gujarati]
            .iter()
            .find_map(|lang| self.content.get(lang))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// A section of a book grouping its chapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sthana {
    pub id: String,
    pub title: String,
    pub adhyayas: Vec<Adhyaya>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subject: String,
    pub level: String,
    pub language: Language,
    pub cover_image: String,
    pub sthanas: Vec<Sthana>,
}

impl Book {
    pub fn chapter(&self, chapter_id: &str) -> Option<&Adhyaya> {
        self.sthanas
            .iter()
            .flat_map(|s| s.adhyayas.iter())
            .find(|a| a.id == chapter_id)
    }

    pub fn to_pinned(&self) -> PinnedBook {
        PinnedBook {
            id: self.id.clone(),
            title: self.title.clone(),
            author: self.author.clone(),
            subject: self.subject.clone(),
        }
    }
}

//=========================================================================================
// Insights
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuote {
    pub original: String,
    pub translations: BTreeMap<Language, String>,
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FestiveTheme {
    pub theme: String,
    pub title: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            id: "user_1".into(),
            name: "User".into(),
            email: "user@example.com".into(),
            profile_pic: "pic".into(),
            role: Role::Student,
            gender: Gender::Male,
            medical_field: MedicalField::Bams,
            course_level: CourseLevel::Year1,
            preferred_language: Language::English,
            is_profile_complete: false,
            agreed_to_privacy: false,
            social_links: None,
        }
    }

    #[test]
    fn social_links_merge_only_provided_keys() {
        let mut p = profile();
        p.merge(ProfileUpdate {
            social_links: Some(SocialLinks {
                youtube: Some("yt".into()),
                facebook: Some("fb".into()),
            }),
            ..Default::default()
        });
        p.merge(ProfileUpdate {
            social_links: Some(SocialLinks {
                youtube: Some("yt2".into()),
                facebook: None,
            }),
            ..Default::default()
        });
        let links = p.social_links.unwrap();
        assert_eq!(links.youtube.as_deref(), Some("yt2"));
        assert_eq!(links.facebook.as_deref(), Some("fb"));
    }

    #[test]
    fn profile_serializes_with_snapshot_names() {
        let json = serde_json::to_value(profile()).unwrap();
        assert_eq!(json["medicalField"], "BAMS");
        assert_eq!(json["courseLevel"], "1st Year");
        assert_eq!(json["preferredLanguage"], "en");
        assert_eq!(json["isProfileComplete"], false);
    }

    #[test]
    fn chapter_text_falls_back_to_english() {
        let mut content = BTreeMap::new();
        content.insert(Language::English, "english".to_string());
        content.insert(Language::Gujarati, "gujarati".to_string());
        let chapter = Adhyaya {
            id: "a1".into(),
            number: 1,
            title: "t".into(),
            content,
            word_meanings: None,
        };
        assert_eq!(chapter.text_for(Language::Hindi), "english");
        assert_eq!(chapter.text_for(Language::Gujarati), "gujarati");
    }
}
