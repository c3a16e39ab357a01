pub mod array;
pub mod memory;
pub mod object;
pub mod view;
