//! crates/study_companion_core/src/library.rs
//!
//! The built-in book catalog and the request shaping for chapter-grounded Q&A.

use crate::domain::{Adhyaya, Book, Language, Sthana, UserProfile};
use crate::persona::persona_for;
use crate::ports::TextRequest;
use std::collections::BTreeMap;

/// Returned when the gateway call for a chapter question fails.
pub const BOOK_QA_FALLBACK: &str = "Error connecting to the knowledge base.";
/// Returned when the gateway answers a chapter question with empty text.
pub const BOOK_QA_EMPTY: &str = "I apologize, I cannot generate an answer at this moment.";

#[derive(Debug, Clone)]
pub struct Catalog {
    books: Vec<Book>,
}

impl Catalog {
    pub fn new(books: Vec<Book>) -> Self {
        Self { books }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_books())
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn get(&self, id: &str) -> Option<&Book> {
        self.books.iter().find(|b| b.id == id)
    }

    /// Case-insensitive title filter. An empty term matches every book.
    pub fn search(&self, term: &str) -> Vec<&Book> {
        let needle = term.trim().to_lowercase();
        self.books
            .iter()
            .filter(|b| b.title.to_lowercase().contains(&needle))
            .collect()
    }
}

/// Shapes a question about one chapter: persona plus book/chapter framing, with
/// the chapter text in the reader's language as context.
pub fn chapter_question(book: &Book, chapter: &Adhyaya, profile: &UserProfile, query: &str) -> TextRequest {
    let context = chapter.text_for(profile.preferred_language);
    let system = format!(
        "{} You are helping the user study \"{}\", Chapter {}: \"{}\". Use the provided chapter context.",
        persona_for(profile.medical_field),
        book.title,
        chapter.number,
        chapter.title
    );
    TextRequest {
        system: Some(system),
        prompt: format!("Chapter Context:\n{}\n\nUser Question: {}", context, query),
        ..Default::default()
    }
}

fn chapter(id: &str, number: u32, title: &str, texts: &[(Language, &str)]) -> Adhyaya {
    Adhyaya {
        id: id.to_string(),
        number,
        title: title.to_string(),
        content: texts
            .iter()
            .map(|(lang, text)| (*lang, text.to_string()))
            .collect::<BTreeMap<_, _>>(),
        word_meanings: None,
    }
}

#[allow(clippy::too_many_arguments)]
fn book(
    id: &str,
    title: &str,
    author: &str,
    subject: &str,
    level: &str,
    language: Language,
    cover_image: &str,
    sthanas: Vec<Sthana>,
) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        subject: subject.to_string(),
        level: level.to_string(),
        language,
        cover_image: cover_image.to_string(),
        sthanas,
    }
}

fn builtin_books() -> Vec<Book> {
    vec![
        book(
            "charaka-1",
            "Charaka Samhita (Sutra Sthana)",
            "Acharya Charaka",
            "Kaya Chikitsa (BAMS)",
            "1st Year",
            Language::Gujarati,
            "assets/covers/charaka.jpg",
            vec![Sthana {
                id: "cs-s1".into(),
                title: "Sutra Sthana (સૂત્ર સ્થાન)".into(),
                adhyayas: vec![
                    chapter(
                        "cs-a1",
                        1,
                        "Deerghanjivitiya Adhyaya (દીર્ઘનજીવિતીય)",
                        &[
                            (Language::English, "Chapter 1: Quest for Longevity\nAyurveda is the science of life (Ayu): what is wholesome (Hita) and unwholesome (Ahita) for it, and what makes it happy (Sukha) or unhappy (Dukha)."),
                            (Language::Gujarati, "અધ્યાય ૧: દીર્ઘનજીવિતીય અધ્યાય\nઆયુર્વેદ એ દીર્ઘ આયુષ્ય અને આરોગ્ય માટેનું જ્ઞાન છે."),
                        ],
                    ),
                    chapter(
                        "cs-a2",
                        2,
                        "Apamarga Tanduliya (અપામાર્ગ તંડુલીય)",
                        &[(Language::English, "Chapter 2: Seed of Apamarga\nDrugs used for bio-purification (Panchakarma) and the twenty-eight medicinal gruels (Yavagu).")],
                    ),
                ],
            }],
        ),
        book(
            "mbbs-anatomy",
            "Gray's Anatomy: The Anatomical Basis of Clinical Practice",
            "Henry Gray",
            "Modern Anatomy (MBBS)",
            "1st Year",
            Language::English,
            "assets/covers/grays.jpg",
            vec![Sthana {
                id: "mbbs-s1".into(),
                title: "Introduction to Human Anatomy".into(),
                adhyayas: vec![
                    chapter(
                        "mbbs-a1",
                        1,
                        "Anatomical Nomenclature & Positions",
                        &[
                            (Language::English, "Chapter 1: Anatomical Fundamentals\nDirectional terms (superior and inferior, medial and lateral) and the anatomical position: erect, eyes forward, palms facing forward."),
                            (Language::Hindi, "अध्याय १: शारीरिक मूल बातें\nदिशासूचक शब्द और शारीरिक स्थिति: सीधे खड़े, आँखें सामने, हथेलियाँ आगे की ओर।"),
                        ],
                    ),
                    chapter(
                        "mbbs-a2",
                        2,
                        "Osteology: The Skeletal System",
                        &[(Language::English, "Chapter 2: Osteology\nThe 206 bones, axial and appendicular skeleton, and the parts of a long bone: diaphysis, epiphysis and metaphysis.")],
                    ),
                ],
            }],
        ),
        book(
            "bhms-organon",
            "Organon of Medicine",
            "Samuel Hahnemann",
            "Homeopathic Philosophy (BHMS)",
            "1st Year",
            Language::English,
            "assets/covers/organon.jpg",
            vec![Sthana {
                id: "bhms-s1".into(),
                title: "Aphorisms of Hahnemann".into(),
                adhyayas: vec![chapter(
                    "bhms-a1",
                    1,
                    "The High Mission of Physician",
                    &[(Language::English, "Aphorism 1: the physician's high and only mission is to restore the sick to health, to cure, as it is termed.")],
                )],
            }],
        ),
        book(
            "pharmacy-pcol",
            "Essentials of Medical Pharmacology",
            "K.D. Tripathi",
            "Pharmacy",
            "2nd Year",
            Language::English,
            "assets/covers/tripathi.jpg",
            vec![Sthana {
                id: "ph-s1".into(),
                title: "Pharmacokinetics & Dynamics".into(),
                adhyayas: vec![chapter(
                    "ph-a1",
                    1,
                    "Drug Absorption & Metabolism",
                    &[(Language::English, "Chapter 1: Absorption, distribution, metabolism and excretion. First-pass metabolism lowers the bioavailability of many oral drugs.")],
                )],
            }],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CourseLevel, Gender, MedicalField, Role};

    fn reader(lang: Language, field: MedicalField) -> UserProfile {
        UserProfile {
            id: "user_1".into(),
            name: "Asha".into(),
            email: "asha@example.com".into(),
            profile_pic: String::new(),
            role: Role::Student,
            gender: Gender::Female,
            medical_field: field,
            course_level: CourseLevel::Year1,
            preferred_language: lang,
            is_profile_complete: true,
            agreed_to_privacy: true,
            social_links: None,
        }
    }

    #[test]
    fn search_is_case_insensitive() {
        let catalog = Catalog::builtin();
        let hits = catalog.search("ANATOMY");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "mbbs-anatomy");
        assert_eq!(catalog.search("").len(), catalog.books().len());
    }

    #[test]
    fn chapter_question_uses_reader_language() {
        let catalog = Catalog::builtin();
        let book = catalog.get("charaka-1").unwrap();
        let chapter = book.chapter("cs-a1").unwrap();

        let request = chapter_question(book, chapter, &reader(Language::Gujarati, MedicalField::Bams), "Define Ayu");

        assert!(request.prompt.contains("દીર્ઘ આયુષ્ય"));
        assert!(request.prompt.ends_with("User Question: Define Ayu"));
        let system = request.system.unwrap();
        assert!(system.contains("Chapter 1"));
        assert!(system.starts_with("You are 'VaidyaGuru'"));
    }
}
