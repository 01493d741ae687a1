pub(crate) mod reaper;
pub(crate) mod scheduler;
