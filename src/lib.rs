pub mod accounts;
pub mod config;
pub mod db;
pub mod error;
pub mod invoice;
pub mod lifecycle;
pub mod linkedin;
pub mod mailer;
pub mod model;
pub mod outbox;
pub mod payments;
pub mod registry;
pub mod scheduler;
