//! Off-ledger relayer for the fairqueue sequencer: discovers pending orders,
//! executes them in strict global sequence order, co-signs fast-path swaps,
//! and publishes order status over HTTP and WebSocket.

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod price;
pub mod server;
pub mod status;
pub mod txcheck;
pub mod types;
