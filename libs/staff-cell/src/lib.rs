pub mod gate;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
