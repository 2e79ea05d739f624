mod guard;
mod store;

pub use guard::ConcurrencyGuard;
pub use store::{CacheStore, ChannelData, DeviceState, StagedCycle};
