pub mod qa;
pub mod statement;
