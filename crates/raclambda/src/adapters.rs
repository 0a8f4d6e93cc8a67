pub mod conversion;
pub mod object_store;
pub mod parameter_store;
pub mod process;
pub mod sync;
