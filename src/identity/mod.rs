//! Steam login and session tokens

pub mod steam;
pub mod token;

pub use steam::{SteamAuth, SteamClient};
pub use token::{SessionClaims, TokenService};
