//! 核心层：错误与断线分类、重连策略、行为策略状态、状态投影、会话监管、优雅关闭

pub mod error;
pub mod policy;
pub mod reconnect;
pub mod shutdown;
pub mod state;
pub mod supervisor;

pub use error::{ActionError, CommandError, ConnectError, DisconnectReason, TransportError};
pub use policy::{Feature, OperatingMode, PolicyHandle, PolicyState, SleepDirective};
pub use reconnect::ReconnectPolicy;
pub use shutdown::ShutdownManager;
pub use state::{LinkPhase, StatusSnapshot};
pub use supervisor::{Directive, Supervisor};
