pub mod events;
pub mod identity;
pub mod models;
pub mod store;

pub use models::{DeliveryRequest, RequestStatus, Trip, TripStatus};
pub use store::{BookingStore, StoreError, TripTx};
