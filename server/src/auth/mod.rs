//! Authentication for the admin API.

mod middleware;

pub use middleware::*;
