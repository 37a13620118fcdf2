use crate::config::AppConfig;
use crate::services::BookingService;

pub struct AppState {
    pub booking: BookingService,
    pub config: AppConfig,
}
