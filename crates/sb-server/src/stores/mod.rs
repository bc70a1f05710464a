pub mod client;
pub mod invoice;
pub mod project;
pub mod recurring;
pub mod session;
pub mod split;
pub mod user;
