pub mod project;
pub mod unit;
