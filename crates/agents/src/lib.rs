//! Campaign dispatch: staggered scheduling of send jobs and the worker pool
//! that executes them.

pub mod manager;
pub mod queue;
pub mod redis_queue;
pub mod scheduler;
pub mod worker;

pub use manager::WorkerPool;
pub use queue::InProcessQueue;
pub use redis_queue::RedisJobQueue;
pub use scheduler::DispatchScheduler;
pub use worker::DeliveryWorker;
