//! Client core for the BlogVerse social network: an API client with retry
//! and session handling, resource stores for posts, comments, reactions,
//! follows and auth, optimistic reaction updates and paginated lists.

pub mod api;
pub mod auth;
pub mod comments;
pub mod config;
pub mod error;
pub mod follows;
pub mod normalize;
pub mod optimistic;
pub mod pagination;
pub mod posts;
pub mod reactions;
pub mod response;
pub mod session;
pub mod status;

pub use api::ApiClient;
pub use auth::store::AuthStore;
pub use comments::store::CommentThread;
pub use config::settings::Settings;
pub use error::ApiError;
pub use follows::store::Connections;
pub use posts::store::PostFeed;
pub use reactions::store::ReactorList;
pub use response::ApiResponse;
pub use session::{FileSessionStore, MemorySessionStore, Session, SessionStore, SessionTokens};
