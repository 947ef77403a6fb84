pub mod agent;
pub mod callbacks;
pub mod errors;
pub mod models;
pub mod prompt;
pub mod providers;
pub mod sampling;
pub mod tools;
