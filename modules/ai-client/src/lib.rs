pub mod claude;
pub mod error;
pub mod limiter;
pub mod schema;
pub mod session;

pub use claude::Claude;
pub use error::EngineError;
pub use limiter::RateLimiter;
pub use schema::StructuredOutput;
pub use session::{send_structured, ChatSession, SessionParams, StructuredSession};
