pub mod issue;
pub mod label;
pub mod project;
