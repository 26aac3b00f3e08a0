pub mod poller;

pub use poller::EventPoller;
