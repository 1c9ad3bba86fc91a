pub mod auth;
pub mod call_service;
pub mod dashboard_service;
pub mod date_range;
pub mod mailer;
pub mod reminder_service;
