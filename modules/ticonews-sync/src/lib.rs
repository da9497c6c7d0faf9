pub mod sync;

pub use sync::Synchronizer;
