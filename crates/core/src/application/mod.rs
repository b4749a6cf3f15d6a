// Application Layer - Scheduler components

pub mod admission;
pub mod enhanced_queue;
pub mod manager;
pub mod priority_heap;
pub mod shutdown;
pub mod throttler;

// Re-exports
pub use admission::{ItemUsage, Queue, QueueUsage};
pub use enhanced_queue::{EnhancedQueue, EnhancedQueueSnapshot};
pub use manager::{ManagerError, QueueManager};
pub use priority_heap::PriorityHeap;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
pub use throttler::{PopDetail, QueueBinding, Throttler};
