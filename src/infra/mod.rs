pub mod email;
pub mod factory;
pub mod images;
pub mod payments;
pub mod repositories;
