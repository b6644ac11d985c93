pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod memory;
pub mod outbox;
pub mod transitions;

pub use coordinator::BookingCoordinator;
pub use error::BookingError;
pub use lifecycle::TripDraft;
pub use memory::MemoryBookingStore;
pub use outbox::LogNotifier;
