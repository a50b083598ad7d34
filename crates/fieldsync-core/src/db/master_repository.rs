//! Repository for master data mirrored from the central server

use std::future::Future;

use crate::error::{Error, Result};
use crate::models::{DistributionItem, MasterId, Role, UserAccount};
use libsql::{params, Connection, Row};

/// Trait for mirrored master data storage operations (async)
#[allow(async_fn_in_trait)]
pub trait MasterDataRepository {
    /// Find a distribution item by its natural key
    async fn find_item_by_name(&self, name: &str) -> Result<Option<DistributionItem>>;

    /// Insert a new item or refresh the description of the row with the same name
    async fn upsert_item(&self, item: &DistributionItem) -> Result<()>;

    /// Atomically delete the row currently holding `item.name` and insert `item`
    async fn replace_item(&self, item: &DistributionItem) -> Result<()>;

    /// List all distribution items by name
    async fn list_items(&self) -> Result<Vec<DistributionItem>>;

    /// Find a user account by its natural key
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>>;

    /// Find a user account by canonical ID
    async fn find_user_by_id(&self, id: &MasterId) -> Result<Option<UserAccount>>;

    /// Insert a new user account
    async fn insert_user(&self, user: &UserAccount) -> Result<()>;

    /// Update a user's mutable attributes in place, matching on ID
    async fn update_user(&self, user: &UserAccount) -> Result<()>;

    /// Atomically delete the row currently holding `user.username` and insert `user`
    async fn replace_user(&self, user: &UserAccount) -> Result<()>;

    /// List all user accounts by username
    async fn list_users(&self) -> Result<Vec<UserAccount>>;
}

/// libSQL implementation of `MasterDataRepository`
pub struct LibSqlMasterDataRepository<'a> {
    conn: &'a Connection,
}

const USER_COLUMNS: &str = "id, username, display_name, email, credential_hash, role, is_active";

impl<'a> LibSqlMasterDataRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_item(row: &Row) -> Result<DistributionItem> {
        Ok(DistributionItem {
            id: MasterId::new(row.get::<String>(0)?),
            name: row.get(1)?,
            description: row.get(2)?,
        })
    }

    fn parse_user(row: &Row) -> Result<UserAccount> {
        let role: Role = row.get::<String>(5)?.parse().map_err(Error::Database)?;
        Ok(UserAccount {
            id: MasterId::new(row.get::<String>(0)?),
            username: row.get(1)?,
            display_name: row.get(2)?,
            email: row.get(3)?,
            credential_hash: row.get(4)?,
            role,
            is_active: row.get::<i32>(6)? != 0,
        })
    }

    async fn query_users(&self, filter: &str, value: Option<&str>) -> Result<Vec<UserAccount>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM user_accounts {filter}");
        let mut rows = match value {
            Some(value) => self.conn.query(&sql, params![value]).await?,
            None => self.conn.query(&sql, ()).await?,
        };

        let mut users = Vec::new();
        while let Some(row) = rows.next().await? {
            users.push(Self::parse_user(&row)?);
        }
        Ok(users)
    }

    async fn upsert_item_row(&self, item: &DistributionItem) -> Result<()> {
        // The canonical ID may have moved from a renamed item.
        self.conn
            .execute(
                "DELETE FROM distribution_items WHERE id = ? AND name <> ?",
                params![item.id.as_str(), item.name.as_str()],
            )
            .await?;
        self.conn
            .execute(
                "INSERT INTO distribution_items (id, name, description) VALUES (?, ?, ?)
                 ON CONFLICT(name) DO UPDATE SET description = excluded.description",
                params![
                    item.id.as_str(),
                    item.name.as_str(),
                    item.description.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    async fn replace_item_rows(&self, item: &DistributionItem) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM distribution_items WHERE name = ?",
                params![item.name.as_str()],
            )
            .await?;
        self.upsert_item_row(item).await
    }

    async fn insert_user_row(&self, user: &UserAccount) -> Result<()> {
        // A stale row may still hold this canonical ID under an old username.
        self.conn
            .execute(
                "DELETE FROM user_accounts WHERE id = ? AND username <> ?",
                params![user.id.as_str(), user.username.as_str()],
            )
            .await?;
        self.conn
            .execute(
                "INSERT INTO user_accounts (id, username, display_name, email, credential_hash, role, is_active)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    user.id.as_str(),
                    user.username.as_str(),
                    user.display_name.as_str(),
                    user.email.as_str(),
                    user.credential_hash.as_str(),
                    user.role.as_str(),
                    i32::from(user.is_active)
                ],
            )
            .await?;
        Ok(())
    }

    async fn replace_user_rows(&self, user: &UserAccount) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM user_accounts WHERE username = ?",
                params![user.username.as_str()],
            )
            .await?;
        self.insert_user_row(user).await
    }

    /// Run `work` inside a transaction, rolling back on failure
    async fn in_transaction(&self, work: impl Future<Output = Result<()>>) -> Result<()> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        if let Err(e) = work.await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e);
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
        Ok(())
    }
}

impl MasterDataRepository for LibSqlMasterDataRepository<'_> {
    async fn find_item_by_name(&self, name: &str) -> Result<Option<DistributionItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, description FROM distribution_items WHERE name = ?",
                params![name],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert_item(&self, item: &DistributionItem) -> Result<()> {
        self.upsert_item_row(item).await
    }

    async fn replace_item(&self, item: &DistributionItem) -> Result<()> {
        self.in_transaction(self.replace_item_rows(item)).await
    }

    async fn list_items(&self) -> Result<Vec<DistributionItem>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, description FROM distribution_items ORDER BY name ASC",
                (),
            )
            .await?;

        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(Self::parse_item(&row)?);
        }
        Ok(items)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserAccount>> {
        let mut users = self
            .query_users("WHERE username = ?", Some(username))
            .await?;
        Ok(users.pop())
    }

    async fn find_user_by_id(&self, id: &MasterId) -> Result<Option<UserAccount>> {
        let mut users = self.query_users("WHERE id = ?", Some(id.as_str())).await?;
        Ok(users.pop())
    }

    async fn insert_user(&self, user: &UserAccount) -> Result<()> {
        self.insert_user_row(user).await
    }

    async fn update_user(&self, user: &UserAccount) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE user_accounts
                 SET display_name = ?, email = ?, credential_hash = ?, role = ?, is_active = ?
                 WHERE id = ? AND username = ?",
                params![
                    user.display_name.as_str(),
                    user.email.as_str(),
                    user.credential_hash.as_str(),
                    user.role.as_str(),
                    i32::from(user.is_active),
                    user.id.as_str(),
                    user.username.as_str()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("user {} ({})", user.username, user.id)));
        }
        Ok(())
    }

    async fn replace_user(&self, user: &UserAccount) -> Result<()> {
        self.in_transaction(self.replace_user_rows(user)).await
    }

    async fn list_users(&self) -> Result<Vec<UserAccount>> {
        self.query_users("ORDER BY username ASC", None).await
    }
}
