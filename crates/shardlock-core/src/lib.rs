pub mod config;
pub mod error;
pub mod plan;

pub use error::{ShardlockError, ShardlockResult};
pub use plan::{plan_shards, shard_size, ShardPlan};
