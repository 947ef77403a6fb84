pub mod anthropic;
pub mod base;
pub mod configs;
pub mod factory;

#[cfg(test)]
pub mod mock;
