// Proxy node: caching front-end between clients and the origin.

pub mod node;
pub mod upstream;

pub use node::ProxyNode;
pub use upstream::{FetchOutcome, OriginBackend, Upstream};
