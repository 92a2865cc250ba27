//! crates/study_companion_core/src/onboarding.rs
//!
//! The one-time, forward-only onboarding flow.
//!
//! Transitions live in `TRANSITIONS`, a table of (step, input kind, guard) →
//! next step. The role-dependent skip past the field and level steps is a
//! guarded row in that table rather than a branch in a handler.

use crate::domain::{CourseLevel, Gender, Language, MedicalField, ProfileUpdate, Role, SocialLinks};
use crate::ports::PortError;
use crate::profile::ProfileStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const DEFAULT_YOUTUBE: &str = "https://youtube.com/VaidyaGuru";
const DEFAULT_FACEBOOK: &str = "https://facebook.com/VaidyaGuru";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    SelectLanguage,
    EnterIdentity,
    AcceptTerms,
    SelectRole,
    SelectGender,
    SelectField,
    SelectLevel,
    Complete,
}

/// A user action on the current onboarding step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "value", rename_all = "snake_case")]
pub enum OnboardingInput {
    ChooseLanguage(Language),
    SubmitName(String),
    AcceptTerms,
    ChooseRole(Role),
    ChooseGender(Gender),
    ChooseField(MedicalField),
    ChooseLevel(CourseLevel),
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Language,
    Name,
    Terms,
    Role,
    Gender,
    Field,
    Level,
    Finish,
}

impl OnboardingInput {
    pub fn kind(&self) -> InputKind {
        match self {
            OnboardingInput::ChooseLanguage(_) => InputKind::Language,
            OnboardingInput::SubmitName(_) => InputKind::Name,
            OnboardingInput::AcceptTerms => InputKind::Terms,
            OnboardingInput::ChooseRole(_) => InputKind::Role,
            OnboardingInput::ChooseGender(_) => InputKind::Gender,
            OnboardingInput::ChooseField(_) => InputKind::Field,
            OnboardingInput::ChooseLevel(_) => InputKind::Level,
            OnboardingInput::Finish => InputKind::Finish,
        }
    }
}

/// Condition on the collected answers that a transition row requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    RoleIs(Role),
    RoleIsNot(Role),
}

impl Guard {
    fn holds(self, draft: &OnboardingDraft) -> bool {
        match self {
            Guard::Always => true,
            Guard::RoleIs(role) => draft.role == role,
            Guard::RoleIsNot(role) => draft.role != role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OnboardingStep,
    pub on: InputKind,
    pub guard: Guard,
    pub to: OnboardingStep,
}

const fn row(from: OnboardingStep, on: InputKind, guard: Guard, to: OnboardingStep) -> Transition {
    Transition { from, on, guard, to }
}

pub const TRANSITIONS: &[Transition] = &[
    row(OnboardingStep::SelectLanguage, InputKind::Language, Guard::Always, OnboardingStep::EnterIdentity),
    row(OnboardingStep::EnterIdentity, InputKind::Name, Guard::Always, OnboardingStep::AcceptTerms),
    row(OnboardingStep::AcceptTerms, InputKind::Terms, Guard::Always, OnboardingStep::SelectRole),
    row(OnboardingStep::SelectRole, InputKind::Role, Guard::Always, OnboardingStep::SelectGender),
    row(OnboardingStep::SelectGender, InputKind::Gender, Guard::RoleIs(Role::Normal), OnboardingStep::Complete),
    row(OnboardingStep::SelectGender, InputKind::Gender, Guard::RoleIsNot(Role::Normal), OnboardingStep::SelectField),
    row(OnboardingStep::SelectField, InputKind::Field, Guard::Always, OnboardingStep::SelectLevel),
    row(OnboardingStep::SelectLevel, InputKind::Level, Guard::Always, OnboardingStep::Complete),
    row(OnboardingStep::Complete, InputKind::Finish, Guard::Always, OnboardingStep::Complete),
];

/// Looks up the next step for `kind` on `from`, given the answers collected so far.
pub fn next_step(from: OnboardingStep, kind: InputKind, draft: &OnboardingDraft) -> Option<OnboardingStep> {
    TRANSITIONS
        .iter()
        .find(|t| t.from == from && t.on == kind && t.guard.holds(draft))
        .map(|t| t.to)
}

#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("{input:?} is not accepted on step {step:?}")]
    InvalidInput { step: OnboardingStep, input: InputKind },
    #[error("A name is required")]
    EmptyName,
    #[error("{0} cannot be chosen as a field of study")]
    FieldNotSelectable(MedicalField),
    #[error("Onboarding is already finished")]
    AlreadyFinished,
    #[error(transparent)]
    Port(#[from] PortError),
}

/// The answers collected so far. Unanswered steps keep the baseline defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingDraft {
    pub language: Language,
    pub name: String,
    pub role: Role,
    pub gender: Gender,
    pub field: MedicalField,
    pub level: CourseLevel,
}

impl Default for OnboardingDraft {
    fn default() -> Self {
        Self {
            language: Language::English,
            name: String::new(),
            role: Role::Student,
            gender: Gender::Male,
            field: MedicalField::Bams,
            level: CourseLevel::Year1,
        }
    }
}

/// What the view needs to render the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OnboardingView {
    pub step: OnboardingStep,
    pub language: Language,
    pub title: &'static str,
    pub options: Vec<String>,
    pub finished: bool,
}

#[derive(Debug, Clone)]
pub struct Onboarding {
    step: OnboardingStep,
    draft: OnboardingDraft,
    trail: Vec<OnboardingStep>,
    finished: bool,
}

impl Default for Onboarding {
    fn default() -> Self {
        Self::new()
    }
}

impl Onboarding {
    pub fn new() -> Self {
        Self {
            step: OnboardingStep::SelectLanguage,
            draft: OnboardingDraft::default(),
            trail: vec![OnboardingStep::SelectLanguage],
            finished: false,
        }
    }

    /// A flow completed in an earlier run, restored from a complete profile.
    pub fn completed(language: Language) -> Self {
        Self {
            step: OnboardingStep::Complete,
            draft: OnboardingDraft {
                language,
                ..Default::default()
            },
            trail: vec![OnboardingStep::Complete],
            finished: true,
        }
    }

    pub fn step(&self) -> OnboardingStep {
        self.step
    }

    pub fn draft(&self) -> &OnboardingDraft {
        &self.draft
    }

    /// Every step entered so far, in order.
    pub fn trail(&self) -> &[OnboardingStep] {
        &self.trail
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Applies one input. On error the machine is left exactly as it was.
    pub async fn apply(
        &mut self,
        input: OnboardingInput,
        profiles: &ProfileStore,
    ) -> Result<OnboardingStep, OnboardingError> {
        if self.finished {
            return Err(OnboardingError::AlreadyFinished);
        }

        let current = self.step();
        let mut draft = self.draft.clone();
        match &input {
            OnboardingInput::ChooseLanguage(lang) => draft.language = *lang,
            OnboardingInput::SubmitName(name) => draft.name = name.trim().to_string(),
            OnboardingInput::ChooseRole(role) => draft.role = *role,
            OnboardingInput::ChooseGender(gender) => draft.gender = *gender,
            OnboardingInput::ChooseField(field) => draft.field = *field,
            OnboardingInput::ChooseLevel(level) => draft.level = *level,
            OnboardingInput::AcceptTerms | OnboardingInput::Finish => {}
        }

        let next = next_step(current, input.kind(), &draft).ok_or(OnboardingError::InvalidInput {
            step: current,
            input: input.kind(),
        })?;

        match input {
            OnboardingInput::SubmitName(_) => {
                if draft.name.is_empty() {
                    return Err(OnboardingError::EmptyName);
                }
                profiles
                    .login(
                        draft.language,
                        ProfileUpdate {
                            name: Some(draft.name.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
            OnboardingInput::ChooseField(field) if !MedicalField::SELECTABLE.contains(&field) => {
                return Err(OnboardingError::FieldNotSelectable(field));
            }
            OnboardingInput::Finish => {
                if profiles.update(completion_update(&draft)).await?.is_none() {
                    return Err(PortError::NotFound("active profile".to_string()).into());
                }
                self.finished = true;
                info!("Onboarding finished after {} steps", self.trail.len());
            }
            _ => {}
        }

        debug!("Onboarding step {:?} -> {:?}", current, next);
        if next != current {
            self.trail.push(next);
        }
        self.draft = draft;
        self.step = next;
        Ok(next)
    }

    pub fn view(&self) -> OnboardingView {
        let step = self.step();
        OnboardingView {
            step,
            language: self.draft.language,
            title: step_title(step, self.draft.language),
            options: step_options(step),
            finished: self.finished,
        }
    }
}

/// The final profile update: collected answers plus the completion flags.
fn completion_update(draft: &OnboardingDraft) -> ProfileUpdate {
    ProfileUpdate {
        role: Some(draft.role),
        gender: Some(draft.gender),
        medical_field: Some(draft.field),
        course_level: Some(draft.level),
        preferred_language: Some(draft.language),
        is_profile_complete: Some(true),
        agreed_to_privacy: Some(true),
        social_links: Some(SocialLinks {
            youtube: Some(DEFAULT_YOUTUBE.to_string()),
            facebook: Some(DEFAULT_FACEBOOK.to_string()),
        }),
        ..Default::default()
    }
}

fn wire_names<T: Serialize>(values: &[T]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| serde_json::to_value(v).ok())
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn step_options(step: OnboardingStep) -> Vec<String> {
    match step {
        OnboardingStep::SelectLanguage => wire_names(&Language::ALL),
        OnboardingStep::SelectRole => wire_names(&[
            Role::Student,
            Role::Professor,
            Role::Teacher,
            Role::Doctor,
            Role::Patient,
            Role::Normal,
        ]),
        OnboardingStep::SelectGender => wire_names(&[Gender::Male, Gender::Female]),
        OnboardingStep::SelectField => wire_names(&MedicalField::SELECTABLE),
        OnboardingStep::SelectLevel => wire_names(&[
            CourseLevel::Year1,
            CourseLevel::Year2,
            CourseLevel::Year3,
            CourseLevel::Year4,
            CourseLevel::Internship,
            CourseLevel::PostGraduate,
            CourseLevel::Research,
            CourseLevel::NotApplicable,
            CourseLevel::ComingSoon,
        ]),
        OnboardingStep::EnterIdentity | OnboardingStep::AcceptTerms | OnboardingStep::Complete => {
            Vec::new()
        }
    }
}

/// Step heading in the language chosen on the first step.
pub fn step_title(step: OnboardingStep, lang: Language) -> &'static str {
    use Language::*;
    use OnboardingStep::*;
    match (step, lang) {
        (SelectLanguage, _) => "Choose Language / ભાષા પસંદ કરો / भाषा चुनें",
        (EnterIdentity, English) => "Enter Your Name",
        (EnterIdentity, Gujarati) => "તમારું નામ લખો",
        (EnterIdentity, Hindi) => "अपना नाम दर्ज करें",
        (AcceptTerms, English) => "Dedication & Terms",
        (AcceptTerms, Gujarati) => "સમર્પણ અને સુરક્ષા",
        (AcceptTerms, Hindi) => "समर्पण और सुरक्षा",
        (SelectRole, English) => "Select Profession",
        (SelectRole, Gujarati) => "વ્યવસાય પસંદ કરો",
        (SelectRole, Hindi) => "पेशा चुनें",
        (SelectGender, English) => "Select Gender",
        (SelectGender, Gujarati) => "જાતિ પસંદ કરો",
        (SelectGender, Hindi) => "लिंग चुनें",
        (SelectField, English) => "Medical Field",
        (SelectField, Gujarati) => "ક્ષેત્ર પસંદ કરો",
        (SelectField, Hindi) => "क्षेत्र चुनें",
        (SelectLevel, English) => "Course Level",
        (SelectLevel, Gujarati) => "લેવલ પસંદ કરો",
        (SelectLevel, Hindi) => "स्तर चुनें",
        (Complete, English) => "Begin My Journey",
        (Complete, Gujarati) => "મુસાફરી શરૂ કરો",
        (Complete, Hindi) => "शुरू करें",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::Arc;

    fn profiles() -> ProfileStore {
        ProfileStore::new(Arc::new(InMemoryStore::new()))
    }

    async fn run(
        machine: &mut Onboarding,
        profiles: &ProfileStore,
        inputs: Vec<OnboardingInput>,
    ) -> OnboardingStep {
        let mut step = machine.step();
        for input in inputs {
            step = machine.apply(input, profiles).await.unwrap();
        }
        step
    }

    #[tokio::test]
    async fn normal_person_skips_field_and_level() {
        let profiles = profiles();
        let mut machine = Onboarding::new();
        let step = run(
            &mut machine,
            &profiles,
            vec![
                OnboardingInput::ChooseLanguage(Language::English),
                OnboardingInput::SubmitName("Ravi".into()),
                OnboardingInput::AcceptTerms,
                OnboardingInput::ChooseRole(Role::Normal),
                OnboardingInput::ChooseGender(Gender::Male),
            ],
        )
        .await;

        assert_eq!(step, OnboardingStep::Complete);
        assert!(!machine.trail().contains(&OnboardingStep::SelectField));
        assert!(!machine.trail().contains(&OnboardingStep::SelectLevel));

        machine.apply(OnboardingInput::Finish, &profiles).await.unwrap();
        assert!(profiles.current().unwrap().is_profile_complete);
    }

    #[tokio::test]
    async fn other_roles_visit_field_and_level() {
        let profiles = profiles();
        let mut machine = Onboarding::new();
        run(
            &mut machine,
            &profiles,
            vec![
                OnboardingInput::ChooseLanguage(Language::English),
                OnboardingInput::SubmitName("Meera".into()),
                OnboardingInput::AcceptTerms,
                OnboardingInput::ChooseRole(Role::Doctor),
                OnboardingInput::ChooseGender(Gender::Female),
            ],
        )
        .await;
        assert_eq!(machine.step(), OnboardingStep::SelectField);

        run(
            &mut machine,
            &profiles,
            vec![
                OnboardingInput::ChooseField(MedicalField::Mbbs),
                OnboardingInput::ChooseLevel(CourseLevel::Internship),
                OnboardingInput::Finish,
            ],
        )
        .await;

        assert!(machine.trail().contains(&OnboardingStep::SelectField));
        assert!(machine.trail().contains(&OnboardingStep::SelectLevel));
        let p = profiles.current().unwrap();
        assert_eq!(p.medical_field, MedicalField::Mbbs);
        assert_eq!(p.course_level, CourseLevel::Internship);
        assert_eq!(p.role, Role::Doctor);
    }

    #[tokio::test]
    async fn blank_name_is_rejected_without_login() {
        let profiles = profiles();
        let mut machine = Onboarding::new();
        machine
            .apply(OnboardingInput::ChooseLanguage(Language::Gujarati), &profiles)
            .await
            .unwrap();

        let err = machine
            .apply(OnboardingInput::SubmitName("   ".into()), &profiles)
            .await
            .unwrap_err();

        assert!(matches!(err, OnboardingError::EmptyName));
        assert_eq!(machine.step(), OnboardingStep::EnterIdentity);
        assert!(profiles.current().is_none());
    }

    #[tokio::test]
    async fn out_of_order_input_is_rejected() {
        let profiles = profiles();
        let mut machine = Onboarding::new();

        let err = machine
            .apply(OnboardingInput::ChooseRole(Role::Student), &profiles)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OnboardingError::InvalidInput { step: OnboardingStep::SelectLanguage, .. }
        ));
        assert_eq!(machine.trail(), &[OnboardingStep::SelectLanguage]);
    }

    #[tokio::test]
    async fn general_health_is_not_selectable() {
        let profiles = profiles();
        let mut machine = Onboarding::new();
        run(
            &mut machine,
            &profiles,
            vec![
                OnboardingInput::ChooseLanguage(Language::English),
                OnboardingInput::SubmitName("Kiran".into()),
                OnboardingInput::AcceptTerms,
                OnboardingInput::ChooseRole(Role::Student),
                OnboardingInput::ChooseGender(Gender::Male),
            ],
        )
        .await;

        let err = machine
            .apply(OnboardingInput::ChooseField(MedicalField::General), &profiles)
            .await
            .unwrap_err();
        assert!(matches!(err, OnboardingError::FieldNotSelectable(MedicalField::General)));
        assert_eq!(machine.step(), OnboardingStep::SelectField);
    }

    #[test]
    fn table_branches_on_role() {
        let normal = OnboardingDraft { role: Role::Normal, ..Default::default() };
        let student = OnboardingDraft::default();
        assert_eq!(
            next_step(OnboardingStep::SelectGender, InputKind::Gender, &normal),
            Some(OnboardingStep::Complete)
        );
        assert_eq!(
            next_step(OnboardingStep::SelectGender, InputKind::Gender, &student),
            Some(OnboardingStep::SelectField)
        );
    }

    #[test]
    fn view_uses_chosen_language() {
        let mut machine = Onboarding::new();
        machine.draft.language = Language::Hindi;
        machine.step = OnboardingStep::SelectRole;
        let view = machine.view();
        assert_eq!(view.title, "पेशा चुनें");
        assert!(view.options.contains(&"Normal Person".to_string()));
    }

    #[test]
    fn input_wire_format() {
        let input: OnboardingInput =
            serde_json::from_str(r#"{"action":"choose_level","value":"1st Year"}"#).unwrap();
        assert_eq!(input, OnboardingInput::ChooseLevel(CourseLevel::Year1));
        let input: OnboardingInput = serde_json::from_str(r#"{"action":"accept_terms"}"#).unwrap();
        assert_eq!(input, OnboardingInput::AcceptTerms);
    }
}
