pub mod calendar;
pub mod clock;
pub mod model;
pub mod notifications;
pub mod service;
pub mod store;
pub mod streak;

pub use crate::service::{HabitService, HabitServiceBuilder, ServiceError};
