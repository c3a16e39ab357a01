pub mod function;
pub mod layout;
pub mod registry;
pub mod typesystem;
