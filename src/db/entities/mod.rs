//! Database entities

pub mod activity;
pub mod client_category;
pub mod client_company;
pub mod contact;
pub mod opportunity;
pub mod session;
pub mod user;
