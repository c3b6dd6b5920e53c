// fleetsync-api: Async Rust client for fleet-tracking servers (REST + push socket)

pub mod client;
pub mod error;
pub mod model;
pub mod transport;
pub mod websocket;

pub use client::FleetClient;
pub use error::Error;
pub use model::{Attributes, Device, DeviceStatus, Event, Position, Server};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{TransportEvent, WebSocketHandle};
