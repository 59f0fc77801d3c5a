//! Domain Layer
//!
//! Entities and the collaborator contracts the composition layer relies on:
//! storage adapters, feature modules, mail transports, view engines, events.

pub mod adapter;
pub mod email;
pub mod event;
pub mod feature;
pub mod mail;
pub mod user;
pub mod view;

pub use adapter::{SharedAdapter, StorageAdapter};
pub use email::Email;
pub use event::{AuthEvent, EventBus};
pub use feature::{FeatureKind, FeatureModule, Route};
pub use mail::{MailMessage, MailTransport, SharedMailer};
pub use user::{Lookup, User};
pub use view::ViewEngine;
