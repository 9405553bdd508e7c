pub mod cli;
pub mod initializers;
