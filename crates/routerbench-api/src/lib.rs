// routerbench-api: Async client for the dataset Router (buffered, streaming, offload)

pub mod client;
pub mod demux;
pub mod error;
pub mod models;
pub mod result;
pub mod transfer;
pub mod transport;

pub use client::{RouterClient, TransferOptions};
pub use demux::{STREAM_MARKER, StreamDemux};
pub use error::Error;
pub use models::{ActiveHosts, Connector, RemoteTimestamps, RouterStatus, StatusResponse};
pub use result::{Pattern, TransferRequest, TransferResult, TransferStatus};
pub use transfer::{Transfer, poll_attempts};
pub use transport::{TlsMode, TransportConfig};
