//! SfnVisualizer host: serves state machine graph visualizations over
//! JSON-RPC on stdio.

pub mod config;
pub mod outbox;
pub mod protocol;
pub mod service;
pub mod surface;
pub mod transport;
pub mod types;

pub use config::HostConfig;
pub use protocol::ProtocolHandler;
pub use service::VisualizerService;
pub use transport::StdioTransport;
