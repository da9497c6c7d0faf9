pub mod message;
pub mod notifier;

pub use notifier::Notifier;
