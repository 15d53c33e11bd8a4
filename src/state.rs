use std::sync::Arc;

use crate::config::AppConfig;
use crate::middleware::rate_limit::{FixedWindowLimiter, IpRateLimiter};
use crate::services::mpesa_service::MpesaService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub mpesa_service: Arc<MpesaService>,
    pub rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, reqwest::Error> {
        let mpesa_service = Arc::new(MpesaService::new(config.mpesa.clone())?);
        let rate_limiter = Arc::new(FixedWindowLimiter::new(&config.rate_limit));

        Ok(AppState {
            config: Arc::new(config),
            mpesa_service,
            rate_limiter,
        })
    }
}
