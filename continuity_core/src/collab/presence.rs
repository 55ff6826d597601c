//! Who is online in a project, where they are looking, and what they edit.
//!
//! Records are written by the clients themselves. There is no heartbeat
//! expiry: a client that disappears without calling
//! [`PresenceRegistry::set_offline`] stays "online".

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{SharedClock, SystemClock};
use crate::error::CollabError;
use crate::tree::{ProjectId, UserId};

const PRESENCE_CHANNEL_CAPACITY: usize = 64;
const DEFAULT_PANEL: &str = "entities";

/// Every presence record of a project, keyed by user.
pub type PresenceSnapshot = BTreeMap<UserId, PresenceRecord>;

/// Profile fields supplied when a user opens a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl UserProfile {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            email: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditedItemKind {
    Book,
    Chapter,
    Beat,
    Panel,
    Entity,
}

/// The item a user currently has open for editing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditingItem {
    pub kind: EditedItemKind,
    /// e.g. `book/1/chapter/3/beat/2` or `entity/<id>`.
    pub path: String,
    pub started_at: DateTime<Utc>,
}

/// Where a user is looking, for "follow" style navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewLocation {
    pub panel: String,
    pub book_number: Option<u32>,
    pub chapter_number: Option<u32>,
    pub beat_sequence: Option<u32>,
    pub page_number: Option<u32>,
    pub entity_id: Option<String>,
}

/// Partial update of the free-form activity fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityUpdate {
    pub current_panel: Option<String>,
    pub current_entity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: UserId,
    pub profile: UserProfile,
    pub online: bool,
    pub last_seen: DateTime<Utc>,
    pub current_panel: String,
    pub current_entity: Option<String>,
    pub current_view: Option<ViewLocation>,
    pub editing_item: Option<EditingItem>,
}

impl PresenceRecord {
    /// Name shown to other collaborators.
    pub fn display_name(&self) -> Option<&str> {
        self.profile
            .display_name
            .as_deref()
            .or(self.profile.email.as_deref())
    }
}

/// One entry of [`PresenceRegistry::editing_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorInfo {
    pub user_id: UserId,
    pub user_name: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug)]
struct ProjectPresence {
    records: PresenceSnapshot,
    sender: broadcast::Sender<PresenceSnapshot>,
}

impl Default for ProjectPresence {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            sender: broadcast::channel(PRESENCE_CHANNEL_CAPACITY).0,
        }
    }
}

impl ProjectPresence {
    fn publish(&self) {
        // No subscribers is fine.
        let _ = self.sender.send(self.records.clone());
    }
}

/// Presence records for every project.
///
/// Clones share the same registry.
#[derive(Debug, Clone)]
pub struct PresenceRegistry {
    projects: Arc<RwLock<HashMap<ProjectId, ProjectPresence>>>,
    clock: SharedClock,
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            projects: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Mark a user online, resetting their view and editing state.
    pub async fn set_presence(&self, project: &ProjectId, user_id: &UserId, profile: UserProfile) {
        let now = self.clock.now();
        let mut projects = self.projects.write().await;
        let entry = projects.entry(project.clone()).or_default();
        entry.records.insert(
            user_id.clone(),
            PresenceRecord {
                user_id: user_id.clone(),
                profile,
                online: true,
                last_seen: now,
                current_panel: DEFAULT_PANEL.to_string(),
                current_entity: None,
                current_view: None,
                editing_item: None,
            },
        );
        debug!(%project, user = %user_id, "presence set");
        entry.publish();
    }

    pub async fn update_activity(
        &self,
        project: &ProjectId,
        user_id: &UserId,
        activity: ActivityUpdate,
    ) -> Result<(), CollabError> {
        self.modify(project, user_id, |record| {
            if let Some(panel) = activity.current_panel {
                record.current_panel = panel;
            }
            if let Some(entity) = activity.current_entity {
                record.current_entity = Some(entity);
            }
        })
        .await
    }

    /// Start (`Some`) or stop (`None`) editing an item.
    pub async fn set_editing(
        &self,
        project: &ProjectId,
        user_id: &UserId,
        item: Option<(EditedItemKind, String)>,
    ) -> Result<(), CollabError> {
        let now = self.clock.now();
        self.modify(project, user_id, |record| {
            record.editing_item = item.map(|(kind, path)| EditingItem {
                kind,
                path,
                started_at: now,
            });
        })
        .await
    }

    pub async fn set_current_view(
        &self,
        project: &ProjectId,
        user_id: &UserId,
        view: ViewLocation,
    ) -> Result<(), CollabError> {
        self.modify(project, user_id, |record| {
            record.current_view = Some(view);
        })
        .await
    }

    /// Mark a user offline and drop their editing item. Unknown users are
    /// ignored.
    pub async fn set_offline(&self, project: &ProjectId, user_id: &UserId) {
        let result = self
            .modify(project, user_id, |record| {
                record.online = false;
                record.editing_item = None;
            })
            .await;
        if result.is_err() {
            debug!(%project, user = %user_id, "set_offline for unknown user");
        }
    }

    pub async fn snapshot(&self, project: &ProjectId) -> PresenceSnapshot {
        self.projects
            .read()
            .await
            .get(project)
            .map(|p| p.records.clone())
            .unwrap_or_default()
    }

    /// Online users' editing items, keyed by item path.
    ///
    /// When two users claim the same path the later one in user order wins.
    pub async fn editing_status(&self, project: &ProjectId) -> BTreeMap<String, EditorInfo> {
        let projects = self.projects.read().await;
        let Some(presence) = projects.get(project) else {
            return BTreeMap::new();
        };

        presence
            .records
            .values()
            .filter(|record| record.online)
            .filter_map(|record| {
                record.editing_item.as_ref().map(|item| {
                    (
                        item.path.clone(),
                        EditorInfo {
                            user_id: record.user_id.clone(),
                            user_name: record.display_name().map(str::to_string),
                            started_at: item.started_at,
                        },
                    )
                })
            })
            .collect()
    }

    /// Receive the full record set of a project after every change.
    pub async fn subscribe(&self, project: &ProjectId) -> broadcast::Receiver<PresenceSnapshot> {
        self.projects
            .write()
            .await
            .entry(project.clone())
            .or_default()
            .sender
            .subscribe()
    }

    async fn modify<F>(&self, project: &ProjectId, user_id: &UserId, edit: F) -> Result<(), CollabError>
    where
        F: FnOnce(&mut PresenceRecord),
    {
        let now = self.clock.now();
        let mut projects = self.projects.write().await;
        let no_presence = || CollabError::NoPresence {
            project: project.clone(),
            user_id: user_id.clone(),
        };
        let presence = projects.get_mut(project).ok_or_else(no_presence)?;
        let record = presence.records.get_mut(user_id).ok_or_else(no_presence)?;

        edit(record);
        record.last_seen = now;
        presence.publish();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Clock, ManualClock};

    fn setup() -> (PresenceRegistry, ManualClock, ProjectId) {
        let clock = ManualClock::starting_now();
        let registry = PresenceRegistry::new().with_clock(Arc::new(clock.clone()));
        (registry, clock, ProjectId::from("p1"))
    }

    #[tokio::test]
    async fn test_set_presence_defaults() {
        let (registry, clock, project) = setup();
        let ada = UserId::from("ada");

        registry
            .set_presence(&project, &ada, UserProfile::named("Ada"))
            .await;

        let snapshot = registry.snapshot(&project).await;
        let record = &snapshot[&ada];
        assert!(record.online);
        assert_eq!(record.current_panel, "entities");
        assert_eq!(record.last_seen, clock.now());
        assert!(record.current_view.is_none());
        assert!(record.editing_item.is_none());
    }

    #[tokio::test]
    async fn test_editing_status_only_online() {
        let (registry, _, project) = setup();
        let (ada, grace) = (UserId::from("ada"), UserId::from("grace"));

        registry
            .set_presence(&project, &ada, UserProfile::named("Ada"))
            .await;
        registry
            .set_presence(
                &project,
                &grace,
                UserProfile {
                    display_name: None,
                    email: Some("grace@example.com".into()),
                },
            )
            .await;

        registry
            .set_editing(&project, &ada, Some((EditedItemKind::Beat, "book/1/chapter/1/beat/1".into())))
            .await
            .unwrap();
        registry
            .set_editing(&project, &grace, Some((EditedItemKind::Entity, "entity/kael".into())))
            .await
            .unwrap();

        let status = registry.editing_status(&project).await;
        assert_eq!(status.len(), 2);
        assert_eq!(
            status["entity/kael"].user_name.as_deref(),
            Some("grace@example.com")
        );

        registry.set_offline(&project, &ada).await;
        let status = registry.editing_status(&project).await;
        assert_eq!(status.len(), 1);
        assert!(!registry.snapshot(&project).await[&ada].online);
    }

    #[tokio::test]
    async fn test_updates_require_presence() {
        let (registry, _, project) = setup();
        let ghost = UserId::from("ghost");

        let err = registry
            .set_current_view(&project, &ghost, ViewLocation::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CollabError::NoPresence { .. }));

        // Going offline never fails.
        registry.set_offline(&project, &ghost).await;
    }

    #[tokio::test]
    async fn test_activity_and_view_bump_last_seen() {
        let (registry, clock, project) = setup();
        let ada = UserId::from("ada");
        registry.set_presence(&project, &ada, UserProfile::default()).await;

        clock.advance(chrono::Duration::seconds(10));
        registry
            .update_activity(
                &project,
                &ada,
                ActivityUpdate {
                    current_panel: Some("narrative".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        registry
            .set_current_view(
                &project,
                &ada,
                ViewLocation {
                    panel: "narrative".into(),
                    book_number: Some(1),
                    chapter_number: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let record = registry.snapshot(&project).await.remove(&ada).unwrap();
        assert_eq!(record.current_panel, "narrative");
        assert_eq!(record.current_view.unwrap().chapter_number, Some(2));
        assert_eq!(record.last_seen, clock.now());
    }

    #[tokio::test]
    async fn test_subscribers_get_snapshots() {
        let (registry, _, project) = setup();
        let mut rx = registry.subscribe(&project).await;

        registry
            .set_presence(&project, &UserId::from("ada"), UserProfile::named("Ada"))
            .await;
        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
