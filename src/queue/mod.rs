//! Job queue: wire format, brokers, producer, and the consumer pool.

pub mod broker;
pub mod consumer;
pub mod job;
pub mod publisher;

pub use broker::{ChannelBroker, JobBroker, SqliteBroker};
pub use consumer::{Consumer, ConsumerOptions, HandleJob};
pub use job::{Job, JobType};
pub use publisher::Publisher;
