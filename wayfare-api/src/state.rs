use std::sync::Arc;

use wayfare_booking::BookingCoordinator;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<BookingCoordinator>,
    pub auth: AuthConfig,
}
