mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod constants;

pub mod api;
pub mod config;
pub mod media;
pub mod state;

pub use authentication::*;
pub use constants::*;
pub use database::*;
