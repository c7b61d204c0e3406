pub mod dispatcher;
pub mod queue;
pub mod writer;

pub use dispatcher::{recover_stuck_outbox_rows, OutboxDispatcher};
pub use queue::{LoggingQueuePublisher, QueuePublisher};
pub use writer::write_to_outbox;
