pub mod auth;
pub mod errors;
pub mod rate_limit;
pub mod security;
