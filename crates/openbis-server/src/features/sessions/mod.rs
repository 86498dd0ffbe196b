//! Login and logout

pub mod login;
pub mod logout;
pub mod routes;

pub use login::{LoginCommand, LoginResponse};
pub use routes::sessions_routes;
