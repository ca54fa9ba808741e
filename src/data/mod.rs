//! Persistence and caching.

pub mod db {
    pub use crate::db::*;
}

pub mod db_storage {
    pub use crate::db_storage::*;
}

pub mod queue_cache {
    pub use crate::queue_cache::*;
}
