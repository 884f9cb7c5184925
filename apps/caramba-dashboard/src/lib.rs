pub mod api;
pub mod cache;
pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod expansion;
pub mod modal;
pub mod scheduler;
pub mod surface;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod view;

pub use dashboard::{Command, Dashboard, DashboardOptions};
pub use error::ApiError;
