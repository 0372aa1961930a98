//! Data models

mod allowed_email;
mod analytics;
mod kid_profile;
mod user;
mod worksheet;

pub use allowed_email::*;
pub use analytics::*;
pub use kid_profile::*;
pub use user::*;
pub use worksheet::*;
