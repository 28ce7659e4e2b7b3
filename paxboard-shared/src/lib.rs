pub mod channel;
pub mod message;
pub mod metrics;

pub use channel::Channel;
pub use message::{ClientMessage, Sample};
