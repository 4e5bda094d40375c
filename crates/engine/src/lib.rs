//! Delivery engine for the Ferriqa webhook pipeline: retry policy, HTTP
//! delivery, the priority queue, and the dispatcher that wires them to the
//! subscription registry and delivery history store.

pub mod deliverer;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod queue;
pub mod retry;

pub use deliverer::HttpDeliverer;
pub use dispatcher::{Dispatcher, DispatcherProcessor, DispatchResult, TestResult};
pub use error::{DelivererError, DispatchError, QueueError};
pub use hooks::{NoopHooks, WebhookHooks};
pub use queue::{JobProcessor, PriorityQueue, QueueStats, DEFAULT_TICK_INTERVAL};
