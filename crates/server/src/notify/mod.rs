mod registry;
mod server;

pub use registry::{NotifyClient, NotifyRegistry};
pub use server::{DatagramSink, NotifyServer, NotifyService};
