//! Local persistence for client state.
//!
//! The only thing the admin client keeps on disk is a handful of named
//! key-value slots (today: the session credential). `repo` holds the SQL;
//! callers import from `ecoholiday_admin::db`.

pub mod repo;

pub use repo::*;
