//! The channel control plane: desired-set store, reconciler, and the
//! token bucket gating outbound commands.
mod bucket;
mod reconciler;
mod store;

pub use reconciler::Reconciler;
pub use store::DesiredSnapshot;
pub use store::DesiredView;
pub use store::RosterHandle;
pub use store::RosterStore;

#[cfg(test)]
mod reconciler_test;
