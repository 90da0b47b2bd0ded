pub mod actor;
pub mod cart;
pub mod directory;
pub mod errors;
pub mod order;
pub mod status;
