// Registry module - catalog of analysis units and their statistics

pub mod catalog;

pub use catalog::{UnitHandle, UnitRegistry, UnitStats};
