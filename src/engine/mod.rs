pub mod geo;
pub mod matcher;
pub mod nearby;
