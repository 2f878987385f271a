pub mod ads;
pub mod auth;
pub mod error;
pub mod extract;
pub mod html;
pub mod middleware;
pub mod pagination;
pub mod permissions;
pub mod proposals;
pub mod routes;
pub mod state;
pub mod users;
pub mod validate;
pub mod views;

pub use routes::router;
pub use state::{AppState, AppStateInner, Settings};
