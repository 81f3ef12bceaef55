pub mod health;
pub mod plugins;
pub mod spaces;
pub mod user;
