pub mod cancel_order;
pub mod execute_order;
pub mod initialize;
pub mod manage_relayers;
pub mod register_pool;
pub mod release_cancelled;
pub mod set_pause;
pub mod submit_order;
pub mod swap_immediate;

pub use cancel_order::*;
pub use execute_order::*;
pub use initialize::*;
pub use manage_relayers::*;
pub use register_pool::*;
pub use release_cancelled::*;
pub use set_pause::*;
pub use submit_order::*;
pub use swap_immediate::*;
