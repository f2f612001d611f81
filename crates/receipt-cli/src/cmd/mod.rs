pub mod backfill;
pub mod check;
pub mod config;
pub mod init;
pub mod respond;
pub mod status;
