pub mod core;
pub mod household;
pub mod sync;
