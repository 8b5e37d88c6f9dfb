pub mod delivery;
pub mod enrichment;
pub mod error;
pub mod id_list;
pub mod ids;
pub mod notification;
pub mod platform;
pub mod preferences;
pub mod profile;
pub mod registry;
pub mod service;
pub mod store;
pub mod time_base;

pub use crate::error::{NotifyError, Result, StorageError};
pub use crate::notification::{Button, Notification, NotificationRequest};
pub use crate::service::{NotificationScheduler, NotificationSchedulerBuilder};
