pub mod record;
pub mod role;
pub mod user;
