pub mod core {
    pub mod config;
    pub mod error;
    pub mod registry;
}

pub mod blockchain {
    pub mod rpc_client;
}

pub mod engine {
    pub mod aggregator;
    pub mod poller;
    pub mod snapshot;
}

pub mod math;
pub mod protocol;

pub use self::core::{config, error, registry};
pub use blockchain::rpc_client;
pub use engine::{aggregator, poller, snapshot};
pub use protocol::lending;
