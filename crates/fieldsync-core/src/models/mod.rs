//! Data models for fieldsync

mod checkin;
mod field_report;
mod master;
mod record;
mod registration;

pub use checkin::{CheckinEvent, CheckinKind};
pub use field_report::{FieldReport, SupplyLevel};
pub use master::{has_admin_access, DistributionItem, MasterId, Role, UserAccount};
pub use record::{RecordId, RecordKind, SyncMeta, SyncStatus, SyncableRecord};
pub use registration::UserRegistration;
