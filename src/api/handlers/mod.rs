pub mod auth;
pub mod booking;
pub mod factory;
pub mod health;
pub mod review;
pub mod tour;
pub mod upload;
pub mod user;
pub mod views;
