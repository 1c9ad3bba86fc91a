pub mod auth;
pub mod calls;
pub mod dashboard;
pub mod leads;
