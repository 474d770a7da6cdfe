//!  Storage is organized through [stats_storage::StatsStorageImpl].
//!  The basic idea is:
//!   - There is a directory with one session file per UTC day.
//!   - A session file holds the day's aggregate counters plus the raw
//!     reminder history.
//!   - Files are always rewritten whole, through a temp file and an atomic
//!     rename, so a cut-off write never leaves an unparseable store behind.

pub mod entities;
pub mod stats_storage;
