// Targets domain - the accounts copy is tailored to (table `accounts`)

pub mod models;

pub use models::*;
