pub mod metro;
pub mod seed;
