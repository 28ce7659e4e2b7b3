pub mod serve;
pub mod stream;
