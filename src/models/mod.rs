pub mod billing;
pub mod envelope;
pub mod group;
pub mod token;
pub mod user;
