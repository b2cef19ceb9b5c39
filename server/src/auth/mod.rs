//! Staff authentication: Argon2id password checks, HS256 session tokens and
//! the optional login bot check.

pub mod bot_check;
pub mod extractor;
pub mod password;
pub mod service;
pub mod token;

pub use bot_check::BotCheck;
pub use extractor::{AuthUser, ClientIp};
pub use token::{Claims, TokenService};
