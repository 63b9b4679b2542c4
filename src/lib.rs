// 商户与POS终端生命周期引擎
// 商户登记、终端配额、设备唯一性以及闲置终端停用

pub mod config;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

pub use error::{ErrorKind, LifecycleError, LifecycleResult, StoreError};
pub use services::{LifecyclePolicy, MerchantLifecycle, SweepReport, TerminalLifecycle};
