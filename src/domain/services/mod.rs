pub mod api_features;
pub mod auth_service;
pub mod geo;
pub mod notification_service;
pub mod rating_service;
pub mod reporting;
