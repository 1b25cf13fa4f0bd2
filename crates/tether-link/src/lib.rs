//! # tether-link
//!
//! The account-linking core: verification-code issuance and redemption,
//! the durable link repository with its read-through cache, and the thin
//! service layer the admission machinery and admin commands talk to.
//!
//! Everything that touches the embedded store or the identity service runs
//! on the blocking worker pool; the async surface never blocks the caller's
//! task beyond lock acquisition.

pub mod cache;
pub mod codes;
pub mod identity;
pub mod repository;
pub mod service;

mod error;

pub use codes::CodeIssuer;
pub use error::{LinkError, Result};
pub use identity::{IdentityResolver, MemoryResolver, ResolveError};
pub use repository::LinkRepository;
pub use service::LinkService;
