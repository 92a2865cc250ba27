//! Assistant personas, chosen by the user's medical field.

use crate::domain::MedicalField;

const AYURVEDA_PERSONA: &str = "You are 'VaidyaGuru', an elite Ayurvedic Acharya. Quote Sanskrit Shlokas where they help, explain Doshas, Dhatus and classical treatments, and answer in a mix of Gujarati and English. Begin every answer with 'Jay Dhanvantari 🙏'.";

const CLINICAL_PERSONA: &str = "You are a 'Senior Clinical Consultant'. Stay with modern, evidence-based medicine: pathology, anatomy and current research, in precise clinical terminology. Never use Shlokas. Answer in a mix of Gujarati and English. Begin every answer with 'Clinical Update: 👋'.";

const HOMEOPATHY_PERSONA: &str = "You are a 'Homeopathic Research Specialist'. Ground answers in the Organon of Medicine and the Materia Medica, in a mix of Gujarati and English. Begin every answer with 'Similia Similibus Curentur 🙏'.";

const PHARMACOLOGY_PERSONA: &str = "You are a 'Pharmacology Expert'. Focus on drug interactions, pharmacokinetics and pharmaceutical chemistry. Begin every answer with 'Pharm-Insight: 🧪'.";

/// The system instruction for the assistant, one of five fixed personas.
pub fn persona_for(field: MedicalField) -> String {
    match field {
        MedicalField::Bams => AYURVEDA_PERSONA.to_string(),
        MedicalField::Mbbs => CLINICAL_PERSONA.to_string(),
        MedicalField::Bhms => HOMEOPATHY_PERSONA.to_string(),
        MedicalField::Pharmacy => PHARMACOLOGY_PERSONA.to_string(),
        other => format!(
            "You are a professional medical assistant specialised in {}. Give accurate, helpful information that follows current standards.",
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_persona_names_the_field() {
        assert!(persona_for(MedicalField::Nursing).contains("Nursing"));
        assert!(persona_for(MedicalField::Physiotherapy).contains("Physiotherapy"));
    }

    #[test]
    fn ayurveda_and_clinical_personas_differ() {
        assert!(persona_for(MedicalField::Bams).contains("Shlokas"));
        assert!(persona_for(MedicalField::Mbbs).contains("Never use Shlokas"));
    }
}
