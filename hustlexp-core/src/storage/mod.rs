pub mod pool;
pub mod repositories;

pub use pool::Storage;
