use std::path::Path;

use fieldsync_core::db::{LibSqlMasterDataRepository, MasterDataRepository};
use fieldsync_core::models::{Role, UserAccount};
use serde::Serialize;

use crate::commands::common::open_database;
use crate::error::CliError;

/// A mirrored user as shown to operators; never includes the credential hash.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserListItem {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub admin: bool,
}

impl From<&UserAccount> for UserListItem {
    fn from(user: &UserAccount) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            is_active: user.is_active,
            admin: user.has_admin_access(),
        }
    }
}

pub fn format_user_line(user: &UserListItem) -> String {
    let mut flags = Vec::new();
    if user.admin {
        flags.push("admin");
    }
    if !user.is_active {
        flags.push("inactive");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "{:<8} {:<20} {:<24} {}{flags}",
        user.id, user.username, user.display_name, user.role
    )
}

pub async fn run_items(db_path: &Path, as_json: bool) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let items = LibSqlMasterDataRepository::new(db.connection())
        .list_items()
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No distribution items yet. Run `fieldsync sync` to fetch them.");
    } else {
        for item in &items {
            println!("{:<8} {:<24} {}", item.id, item.name, item.description);
        }
    }
    Ok(())
}

pub async fn run_users(db_path: &Path, as_json: bool) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let users = LibSqlMasterDataRepository::new(db.connection())
        .list_users()
        .await?;
    let items = users.iter().map(UserListItem::from).collect::<Vec<_>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("No user accounts yet. Run `fieldsync sync` to fetch them.");
    } else {
        for item in &items {
            println!("{}", format_user_line(item));
        }
    }
    Ok(())
}
