pub mod auth;
pub mod call;
pub mod dashboard;
pub mod lead;
