pub mod channel;
pub mod request;

pub use channel::MrpcChannel;
pub use request::{MrpcResult, RequestHandle, RequestId, RequestState};
