pub mod error;
pub mod interval;
pub mod models;
pub mod recurrence;
pub mod recurrence_engine;
pub mod settings;
pub mod time_block;
