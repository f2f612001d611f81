pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod io;
pub mod paths;
pub mod pdf;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod sheet;
pub mod status;
pub mod storage;
pub mod trigger;
pub mod types;
pub mod validate;
pub mod workspace;

pub use error::{ReceiptError, Result};
