//! # storage-adapters
//!
//! Driven adapters: the MariaDB repositories behind the persistence ports
//! and the local-filesystem media store.

pub mod mariadb;
pub mod media;

pub use mariadb::MariaRepo;
pub use media::LocalMediaStore;
