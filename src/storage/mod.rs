//! Persistence of the published selection across restarts
//!
//! Only the last good selection is kept; there is no history.

pub mod backup;

pub use backup::{read_backup, write_backup, BackupError, BackupStore};
