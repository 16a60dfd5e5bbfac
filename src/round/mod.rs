pub mod economy;
pub mod eligibility;
pub mod handlers;
pub mod models;
pub mod service;
pub mod types;
