//! Concrete reply aggregators.
//!
//! - **OrderManager**: one [`OrderRecord`] per order id, with delta polling
//! - **AccountManager**: account values and portfolio positions for one account
//! - **RealtimeBarManager**: the most recent bar of one realtime bar stream
//!
//! Constructors spawn the manager's control loop and therefore must be called
//! from within a tokio runtime.

mod account_manager;
mod order_manager;
mod order_record;
mod realtime_manager;

pub use account_manager::AccountManager;
pub use order_manager::OrderManager;
pub use order_record::OrderRecord;
pub use realtime_manager::RealtimeBarManager;
