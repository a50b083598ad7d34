pub mod common;
pub mod config;
pub mod master;
pub mod record;
pub mod status;
pub mod sync;
