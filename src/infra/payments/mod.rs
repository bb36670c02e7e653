pub mod stripe_gateway;
