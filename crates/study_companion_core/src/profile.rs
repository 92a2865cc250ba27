//! crates/study_companion_core/src/profile.rs
//!
//! The active user profile: login, merge-update, logout and restore, with the
//! current profile published to subscribers on every change.

use crate::domain::{
    now_millis, CourseLevel, Gender, Language, MedicalField, ProfileUpdate, Role, UserProfile,
};
use crate::ports::{KeyValueStore, PortResult};
use crate::store::{load_record, save_record, PROFILE_KEY};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_NAME: &str = "User";
const DEFAULT_EMAIL: &str = "user@example.com";

/// Owns the single active `UserProfile` and mirrors it into the store.
pub struct ProfileStore {
    store: Arc<dyn KeyValueStore>,
    current: watch::Sender<Option<UserProfile>>,
    write_lock: Mutex<()>,
}

impl ProfileStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            store,
            current,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads the persisted profile, if any. A corrupt record is cleared.
    pub async fn restore(&self) -> Option<UserProfile> {
        let _guard = self.write_lock.lock().await;
        let profile: Option<UserProfile> = load_record(self.store.as_ref(), PROFILE_KEY).await;
        if let Some(p) = &profile {
            info!("Restored profile {} (complete: {})", p.id, p.is_profile_complete);
        }
        self.current.send_replace(profile.clone());
        profile
    }

    pub fn current(&self) -> Option<UserProfile> {
        self.current.borrow().clone()
    }

    /// A receiver that observes every profile change, including logout.
    pub fn subscribe(&self) -> watch::Receiver<Option<UserProfile>> {
        self.current.subscribe()
    }

    /// Creates a fresh, incomplete profile and makes it the active one.
    pub async fn login(&self, language: Language, data: ProfileUpdate) -> PortResult<UserProfile> {
        let _guard = self.write_lock.lock().await;
        let created_at = now_millis();
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let profile = UserProfile {
            id: format!("user_{}", Uuid::now_v7().simple()),
            name: non_empty(data.name).unwrap_or_else(|| DEFAULT_NAME.to_string()),
            email: non_empty(data.email).unwrap_or_else(|| DEFAULT_EMAIL.to_string()),
            profile_pic: non_empty(data.profile_pic).unwrap_or_else(|| {
                format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", created_at)
            }),
            role: data.role.unwrap_or(Role::Student),
            gender: data.gender.unwrap_or(Gender::Male),
            medical_field: data.medical_field.unwrap_or(MedicalField::Bams),
            course_level: data.course_level.unwrap_or(CourseLevel::Year1),
            preferred_language: language,
            is_profile_complete: false,
            agreed_to_privacy: false,
            social_links: None,
        };

        save_record(self.store.as_ref(), PROFILE_KEY, &profile).await?;
        info!("Created profile {}", profile.id);
        self.current.send_replace(Some(profile.clone()));
        Ok(profile)
    }

    /// Merges `update` into the active profile. Returns `None` when nobody is logged in.
    pub async fn update(&self, update: ProfileUpdate) -> PortResult<Option<UserProfile>> {
        let _guard = self.write_lock.lock().await;
        let Some(mut profile) = self.current() else {
            debug!("Ignoring profile update: no active profile");
            return Ok(None);
        };

        profile.merge(update);
        save_record(self.store.as_ref(), PROFILE_KEY, &profile).await?;
        self.current.send_replace(Some(profile.clone()));
        Ok(Some(profile))
    }

    pub async fn logout(&self) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(PROFILE_KEY).await?;
        self.current.send_replace(None);
        info!("Logged out; profile cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn profiles() -> (InMemoryStore, ProfileStore) {
        let store = InMemoryStore::new();
        let profiles = ProfileStore::new(Arc::new(store.clone()));
        (store, profiles)
    }

    #[tokio::test]
    async fn login_applies_baseline_defaults() {
        let (store, profiles) = profiles();
        let p = profiles.login(Language::Gujarati, ProfileUpdate::default()).await.unwrap();

        assert_eq!(p.name, "User");
        assert_eq!(p.email, "user@example.com");
        assert_eq!(p.role, Role::Student);
        assert_eq!(p.gender, Gender::Male);
        assert_eq!(p.medical_field, MedicalField::Bams);
        assert_eq!(p.course_level, CourseLevel::Year1);
        assert_eq!(p.preferred_language, Language::Gujarati);
        assert!(!p.is_profile_complete);
        assert!(store.contains(PROFILE_KEY));
    }

    #[tokio::test]
    async fn two_logins_differ_only_in_identity() {
        let (_, profiles) = profiles();
        let data = ProfileUpdate {
            name: Some("Asha".into()),
            email: Some("asha@example.com".into()),
            profile_pic: Some("pic".into()),
            ..Default::default()
        };
        let a = profiles.login(Language::Hindi, data.clone()).await.unwrap();
        let b = profiles.login(Language::Hindi, data).await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(UserProfile { id: b.id.clone(), ..a }, b);
    }

    #[tokio::test]
    async fn updates_are_last_write_wins() {
        let (_, profiles) = profiles();
        let original = profiles.login(Language::English, ProfileUpdate::default()).await.unwrap();

        profiles
            .update(ProfileUpdate { name: Some("A".into()), ..Default::default() })
            .await
            .unwrap();
        profiles
            .update(ProfileUpdate { role: Some(Role::Doctor), ..Default::default() })
            .await
            .unwrap();
        let p = profiles
            .update(ProfileUpdate { name: Some("B".into()), ..Default::default() })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(p.name, "B");
        assert_eq!(p.role, Role::Doctor);
        assert_eq!(p.gender, original.gender);
        assert_eq!(p.medical_field, original.medical_field);
        assert_eq!(p.id, original.id);
    }

    #[tokio::test]
    async fn update_without_profile_is_noop() {
        let (store, profiles) = profiles();
        let result = profiles
            .update(ProfileUpdate { name: Some("A".into()), ..Default::default() })
            .await
            .unwrap();

        assert!(result.is_none());
        assert!(!store.contains(PROFILE_KEY));
    }

    #[tokio::test]
    async fn logout_clears_store_and_notifies() {
        let (store, profiles) = profiles();
        let mut rx = profiles.subscribe();
        profiles.login(Language::English, ProfileUpdate::default()).await.unwrap();
        assert!(rx.borrow_and_update().is_some());

        profiles.logout().await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
        assert!(!store.contains(PROFILE_KEY));
        assert!(profiles.current().is_none());
    }

    #[tokio::test]
    async fn restore_reads_persisted_profile() {
        let (store, profiles) = profiles();
        let p = profiles.login(Language::Hindi, ProfileUpdate::default()).await.unwrap();

        let reopened = ProfileStore::new(Arc::new(store));
        assert_eq!(reopened.restore().await, Some(p));
    }

    #[tokio::test]
    async fn corrupt_profile_is_discarded_on_restore() {
        let (store, profiles) = profiles();
        store.set(PROFILE_KEY, &serde_json::json!("garbage")).await.unwrap();

        assert!(profiles.restore().await.is_none());
        assert!(!store.contains(PROFILE_KEY));
    }
}
