pub(crate) mod events;
pub(crate) mod notifier;
pub(crate) mod scoring;
pub(crate) mod session_timing;
pub(crate) mod sessions;
