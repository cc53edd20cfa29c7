// RecoBattle HTTP handlers
//
// This module contains the HTTP layer: owner identification, multipart parsing
// and the route handlers over the core services.

pub mod authentication;
pub mod form;
pub mod routes;

use actix_web::web;

use crate::asr::AsrRegistry;
use crate::audio_files::AudioFiles;
use crate::config::ServerConfig;
use crate::metrics::Metrics;
use crate::quality_control::QualityControls;
use crate::queue_manager::QueueManager;

// Re-export handlers for easier access
pub use self::authentication::{Authentication, OwnerId, ANONYMOUS_OWNER};
pub use self::routes::{configure_api, metrics_endpoint, service_status};

/// Shared services handed to every worker of the HTTP server
#[derive(Clone)]
pub struct AppServices {
    pub audio_files: web::Data<AudioFiles>,
    pub quality_controls: web::Data<QualityControls>,
    pub registry: web::Data<AsrRegistry>,
    pub queue: web::Data<QueueManager>,
    pub server: web::Data<ServerConfig>,
    pub metrics: web::Data<Metrics>,
}

impl AppServices {
    /// Register application data and all routes.
    ///
    /// API routes live under `/api` behind the owner middleware; `/status` and
    /// `/metrics` are public.
    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.audio_files.clone())
            .app_data(self.quality_controls.clone())
            .app_data(self.registry.clone())
            .app_data(self.queue.clone())
            .app_data(self.server.clone())
            .app_data(self.metrics.clone())
            .service(
                web::scope("/api")
                    .wrap(
                        Authentication::new(self.server.enable_authorization)
                            .with_owner_header(self.server.owner_header.clone()),
                    )
                    .configure(configure_api),
            )
            .service(service_status)
            .service(metrics_endpoint);
    }
}
