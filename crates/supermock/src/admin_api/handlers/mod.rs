pub mod groups;
pub mod rules;
pub mod spaces;
pub mod system;
