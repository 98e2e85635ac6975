pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod session;

pub use auth::{AuthError, AuthGuard, LoginOutcome, LoginService, Principal};
pub use domain::chat::{ChatMessage, ChatTurn, ReplySource, Role, SessionId};
pub use domain::credential::Credential;
pub use domain::plan::TripRequest;
pub use domain::session::{SessionEntry, SessionToken};
pub use errors::{ApplicationError, InterfaceError};
pub use session::{InMemorySessionStore, SessionStore};
