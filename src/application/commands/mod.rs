//! The worker command bus: envelope shapes, the handler table, the response
//! classifier, and the dispatcher that ties them together.

pub mod channel;
pub mod classifier;
pub mod dispatcher;
pub mod envelope;
pub mod handlers;
pub mod procedure;

pub use channel::{create_worker_channel, SharedWorkerChannel, WorkerChannel};
pub use dispatcher::CommandDispatcher;
pub use procedure::Procedure;
