//! Pull of authoritative master data and identity reconciliation.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::transport::{CentralTransport, TransportError};
use crate::config::SyncSettings;
use crate::db::{Database, LibSqlMasterDataRepository, MasterDataRepository};
use crate::models::{DistributionItem, MasterId, Role, UserAccount};

/// Master data collections mirrored from the central server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MasterCollection {
    DistributionItems,
    Users,
}

impl MasterCollection {
    pub const PULL_ORDER: [Self; 2] = [Self::DistributionItems, Self::Users];

    pub const fn label(self) -> &'static str {
        match self {
            Self::DistributionItems => "distribution items",
            Self::Users => "users",
        }
    }
}

impl std::fmt::Display for MasterCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What reconciling one central entity did to the local mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileOutcome {
    Created,
    Updated,
    /// The local row carried a different ID and was deleted and recreated
    Recreated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    pub natural_key: String,
    pub id: MasterId,
    pub outcome: ReconcileOutcome,
}

#[derive(Debug, Error)]
pub enum PullError {
    #[error(transparent)]
    Network(#[from] TransportError),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Invalid response body: {0}")]
    Data(String),
    #[error("Store error: {0}")]
    Store(#[from] crate::Error),
}

#[derive(Debug, Deserialize)]
struct ItemsEnvelope {
    items: Vec<RemoteItem>,
}

#[derive(Debug, Deserialize)]
struct RemoteItem {
    id: MasterId,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct UsersEnvelope {
    users: Vec<RemoteUser>,
}

#[derive(Deserialize)]
struct RemoteUser {
    id: MasterId,
    username: String,
    #[serde(default, alias = "password")]
    credential_hash: Option<String>,
    #[serde(default, alias = "full_name")]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default = "default_active")]
    is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl TryFrom<RemoteItem> for DistributionItem {
    type Error = PullError;

    fn try_from(value: RemoteItem) -> Result<Self, PullError> {
        let name = value.name.trim().to_string();
        if name.is_empty() {
            return Err(PullError::Data(format!("item {} has an empty name", value.id)));
        }
        Ok(Self {
            id: value.id,
            name,
            description: value.description.unwrap_or_default(),
        })
    }
}

impl TryFrom<RemoteUser> for UserAccount {
    type Error = PullError;

    fn try_from(value: RemoteUser) -> Result<Self, PullError> {
        let username = value.username.trim().to_string();
        if username.is_empty() {
            return Err(PullError::Data(format!("user {} has an empty username", value.id)));
        }
        Ok(Self {
            id: value.id,
            username,
            display_name: value.display_name.unwrap_or_default(),
            email: value.email.unwrap_or_default(),
            credential_hash: value.credential_hash.unwrap_or_default(),
            role: value.role.as_deref().map_or(Role::General, Role::from_wire),
            is_active: value.is_active,
        })
    }
}

/// Mirrors central master data into the local store
pub struct InboundSyncer<'a, T> {
    transport: &'a T,
    settings: &'a SyncSettings,
    base_url: &'a str,
    masters: LibSqlMasterDataRepository<'a>,
}

impl<'a, T: CentralTransport> InboundSyncer<'a, T> {
    pub const fn new(
        db: &'a Database,
        transport: &'a T,
        settings: &'a SyncSettings,
        base_url: &'a str,
    ) -> Self {
        Self {
            transport,
            settings,
            base_url,
            masters: LibSqlMasterDataRepository::new(db.connection()),
        }
    }

    /// Fetch the full list for `collection` and reconcile every entity.
    ///
    /// Any failure aborts this collection only; entities reconciled before
    /// the failure stay applied.
    pub async fn pull(&self, collection: MasterCollection) -> Result<Vec<Reconciled>, PullError> {
        let mut applied = Vec::new();
        self.pull_into(collection, &mut applied).await?;
        Ok(applied)
    }

    /// Like [`Self::pull`], but pushes each outcome into `applied` as soon as
    /// it is stored, so a failed pull still reports what it changed.
    pub async fn pull_into(
        &self,
        collection: MasterCollection,
        applied: &mut Vec<Reconciled>,
    ) -> Result<(), PullError> {
        match collection {
            MasterCollection::DistributionItems => {
                let envelope: ItemsEnvelope = self.fetch(&self.settings.endpoints.distribution_items).await?;
                tracing::info!("Pulled {} distribution items", envelope.items.len());
                applied.reserve(envelope.items.len());
                for remote in envelope.items {
                    applied.push(self.reconcile_item(remote.try_into()?).await?);
                }
            }
            MasterCollection::Users => {
                let envelope: UsersEnvelope = self.fetch(&self.settings.endpoints.users).await?;
                tracing::info!("Pulled {} users", envelope.users.len());
                applied.reserve(envelope.users.len());
                for remote in envelope.users {
                    applied.push(self.reconcile_user(remote.try_into()?).await?);
                }
            }
        }
        Ok(())
    }

    async fn fetch<D: serde::de::DeserializeOwned>(&self, path: &str) -> Result<D, PullError> {
        let url = self.settings.endpoint_url(self.base_url, path);
        tracing::debug!("GET {}", url);
        let reply = self.transport.get(&url, self.settings.pull_timeout()).await?;
        if !reply.is_success() {
            return Err(PullError::Http {
                status: reply.status,
                message: reply.error_message(),
            });
        }
        serde_json::from_str(&reply.body).map_err(|error| PullError::Data(error.to_string()))
    }

    async fn reconcile_item(&self, item: DistributionItem) -> Result<Reconciled, PullError> {
        let outcome = match self.masters.find_item_by_name(&item.name).await? {
            None => {
                self.masters.upsert_item(&item).await?;
                ReconcileOutcome::Created
            }
            Some(local) if local.id == item.id => {
                self.masters.upsert_item(&item).await?;
                ReconcileOutcome::Updated
            }
            Some(local) => {
                tracing::warn!(
                    "Item '{}' has local id {} but central id {}; recreating",
                    item.name,
                    local.id,
                    item.id
                );
                self.masters.replace_item(&item).await?;
                ReconcileOutcome::Recreated
            }
        };

        Ok(Reconciled {
            natural_key: item.name,
            id: item.id,
            outcome,
        })
    }

    async fn reconcile_user(&self, user: UserAccount) -> Result<Reconciled, PullError> {
        let outcome = match self.masters.find_user_by_username(&user.username).await? {
            None => {
                self.masters.insert_user(&user).await?;
                ReconcileOutcome::Created
            }
            Some(local) if local.id == user.id => {
                self.masters.update_user(&user).await?;
                ReconcileOutcome::Updated
            }
            Some(local) => {
                tracing::warn!(
                    "User '{}' has local id {} but central id {}; recreating",
                    user.username,
                    local.id,
                    user.id
                );
                self.masters.replace_user(&user).await?;
                ReconcileOutcome::Recreated
            }
        };

        Ok(Reconciled {
            natural_key: user.username,
            id: user.id,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::mock::MockTransport;
    use pretty_assertions::assert_eq;

    const BASE: &str = "http://central.example:8000";

    fn settings() -> SyncSettings {
        SyncSettings::new(vec![BASE.to_string()], "SHELTER_001", "RPi_Shelter_A_01")
    }

    fn items_url() -> String {
        format!("{BASE}/api/distribution-items/")
    }

    fn users_url() -> String {
        format!("{BASE}/api/get-all-users/")
    }

    fn outcomes(reconciled: &[Reconciled]) -> Vec<ReconcileOutcome> {
        reconciled.iter().map(|entity| entity.outcome).collect()
    }

    const ITEMS: &str = r#"{"items": [
        {"id": 1, "name": "Breakfast", "description": "Rice ball"},
        {"id": "2", "name": "Water", "description": null}
    ]}"#;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_item_pull_is_idempotent() {
        let db = Database::open_in_memory().await.unwrap();
        let transport = MockTransport::new();
        transport.reply(&items_url(), 200, ITEMS);
        transport.reply(&items_url(), 200, ITEMS);
        let settings = settings();
        let syncer = InboundSyncer::new(&db, &transport, &settings, BASE);

        let first = syncer.pull(MasterCollection::DistributionItems).await.unwrap();
        let masters = LibSqlMasterDataRepository::new(db.connection());
        let after_first = masters.list_items().await.unwrap();
        let second = syncer.pull(MasterCollection::DistributionItems).await.unwrap();
        let after_second = masters.list_items().await.unwrap();

        assert_eq!(outcomes(&first), vec![ReconcileOutcome::Created; 2]);
        assert_eq!(outcomes(&second), vec![ReconcileOutcome::Updated; 2]);
        assert_eq!(after_first, after_second);
        assert_eq!(
            after_second,
            vec![
                DistributionItem {
                    id: MasterId::from("1"),
                    name: "Breakfast".to_string(),
                    description: "Rice ball".to_string(),
                },
                DistributionItem {
                    id: MasterId::from("2"),
                    name: "Water".to_string(),
                    description: String::new(),
                },
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_item_with_divergent_id_is_recreated() {
        let db = Database::open_in_memory().await.unwrap();
        let masters = LibSqlMasterDataRepository::new(db.connection());
        masters
            .upsert_item(&DistributionItem {
                id: MasterId::from("local-9"),
                name: "Water".to_string(),
                description: "old".to_string(),
            })
            .await
            .unwrap();
        let transport = MockTransport::new();
        transport.reply(&items_url(), 200, ITEMS);
        let settings = settings();

        let reconciled = InboundSyncer::new(&db, &transport, &settings, BASE)
            .pull(MasterCollection::DistributionItems)
            .await
            .unwrap();

        assert_eq!(
            outcomes(&reconciled),
            vec![ReconcileOutcome::Created, ReconcileOutcome::Recreated]
        );
        let water = masters.find_item_by_name("Water").await.unwrap().unwrap();
        assert_eq!(water.id, MasterId::from("2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_user_conflict_recreates_under_central_id() {
        let db = Database::open_in_memory().await.unwrap();
        let masters = LibSqlMasterDataRepository::new(db.connection());
        masters
            .insert_user(&UserAccount {
                id: MasterId::from("L1"),
                username: "alice".to_string(),
                display_name: "Alice".to_string(),
                email: String::new(),
                credential_hash: "local-hash".to_string(),
                role: Role::General,
                is_active: true,
            })
            .await
            .unwrap();
        let transport = MockTransport::new();
        transport.reply(
            &users_url(),
            200,
            r#"{"users": [{"id": "C1", "username": "alice", "password": "central-hash",
                "full_name": "Alice Tanaka", "email": "alice@example.org", "role": "admin"}]}"#,
        );
        let settings = settings();

        let reconciled = InboundSyncer::new(&db, &transport, &settings, BASE)
            .pull(MasterCollection::Users)
            .await
            .unwrap();

        assert_eq!(
            reconciled,
            vec![Reconciled {
                natural_key: "alice".to_string(),
                id: MasterId::from("C1"),
                outcome: ReconcileOutcome::Recreated,
            }]
        );
        let users = masters.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, MasterId::from("C1"));
        assert_eq!(users[0].credential_hash, "central-hash");
        assert_eq!(users[0].display_name, "Alice Tanaka");
        assert!(users[0].has_admin_access());
        assert!(masters
            .find_user_by_id(&MasterId::from("L1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_user_with_same_id_is_updated_in_place() {
        let db = Database::open_in_memory().await.unwrap();
        let transport = MockTransport::new();
        transport.reply(
            &users_url(),
            200,
            r#"{"users": [{"id": 5, "username": "bob", "credential_hash": "h1", "role": "rescuer"}]}"#,
        );
        transport.reply(
            &users_url(),
            200,
            r#"{"users": [{"id": 5, "username": "bob", "credential_hash": "h2", "role": "mystery", "is_active": false}]}"#,
        );
        let settings = settings();
        let syncer = InboundSyncer::new(&db, &transport, &settings, BASE);

        let first = syncer.pull(MasterCollection::Users).await.unwrap();
        let second = syncer.pull(MasterCollection::Users).await.unwrap();

        assert_eq!(outcomes(&first), vec![ReconcileOutcome::Created]);
        assert_eq!(outcomes(&second), vec![ReconcileOutcome::Updated]);
        let bob = LibSqlMasterDataRepository::new(db.connection())
            .find_user_by_username("bob")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bob.credential_hash, "h2");
        assert_eq!(bob.role, Role::General);
        assert!(!bob.is_active);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_errors_are_classified() {
        let db = Database::open_in_memory().await.unwrap();
        let transport = MockTransport::new();
        transport.reply(&users_url(), 403, r#"{"message": "Forbidden"}"#);
        transport.reply(&users_url(), 200, r#"{"people": []}"#);
        transport.fail(&users_url(), "dns error");
        let settings = settings();
        let syncer = InboundSyncer::new(&db, &transport, &settings, BASE);

        let http = syncer.pull(MasterCollection::Users).await.unwrap_err();
        assert_eq!(http.to_string(), "HTTP 403: Forbidden");
        let data = syncer.pull(MasterCollection::Users).await.unwrap_err();
        assert!(matches!(data, PullError::Data(_)));
        let network = syncer.pull(MasterCollection::Users).await.unwrap_err();
        assert_eq!(network.to_string(), "Network error: dns error");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_blank_natural_key_aborts_collection() {
        let db = Database::open_in_memory().await.unwrap();
        let transport = MockTransport::new();
        transport.reply(
            &items_url(),
            200,
            r#"{"items": [{"id": 1, "name": "Soap"}, {"id": 2, "name": "  "}]}"#,
        );
        let settings = settings();

        let result = InboundSyncer::new(&db, &transport, &settings, BASE)
            .pull(MasterCollection::DistributionItems)
            .await;

        assert!(matches!(result, Err(PullError::Data(_))));
        let items = LibSqlMasterDataRepository::new(db.connection())
            .list_items()
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_into_keeps_entities_applied_before_failure() {
        let db = Database::open_in_memory().await.unwrap();
        let transport = MockTransport::new();
        transport.reply(
            &users_url(),
            200,
            r#"{"users": [{"id": 3, "username": "carol"}, {"id": 4, "username": ""}]}"#,
        );
        let settings = settings();
        let mut applied = Vec::new();

        let result = InboundSyncer::new(&db, &transport, &settings, BASE)
            .pull_into(MasterCollection::Users, &mut applied)
            .await;

        assert!(matches!(result, Err(PullError::Data(_))));
        assert_eq!(
            applied,
            vec![Reconciled {
                natural_key: "carol".to_string(),
                id: MasterId::from("3"),
                outcome: ReconcileOutcome::Created,
            }]
        );
    }
}
