//! Platform Crate - Technical Infrastructure
//!
//! Technical helpers shared by the feature modules:
//! - Password hashing (Argon2id)
//! - Session cookie handling

pub mod cookie;
pub mod password;
