//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the database pool, the parsed configuration, the SQL catalog and
//! the JWT service. Image stores and the mailer are optional; handlers that
//! need them answer 503 when they are `None`.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::db::catalog::QueryCatalog;
use crate::services::mail::Mailer;
use crate::services::report::ReportFonts;
use crate::services::storage::ImageStore;
use crate::services::token::TokenService;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub queries: Arc<QueryCatalog>,
    pub tokens: TokenService,
    /// Member avatars. `None` if SFTP is not configured.
    pub avatars: Option<Arc<dyn ImageStore>>,
    /// Dog photos. `None` if SFTP is not configured.
    pub dog_photos: Option<Arc<dyn ImageStore>>,
    /// Welcome mail sender. `None` if Resend is not configured.
    pub mailer: Option<Arc<dyn Mailer>>,
    /// Embedded into dog reports. Empty means built-in Helvetica.
    pub report_fonts: Arc<ReportFonts>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: AppConfig, queries: QueryCatalog) -> Self {
        let tokens = TokenService::new(&config.jwt);
        Self {
            pool,
            config: Arc::new(config),
            queries: Arc::new(queries),
            tokens,
            avatars: None,
            dog_photos: None,
            mailer: None,
            report_fonts: Arc::new(ReportFonts::default()),
        }
    }

    #[must_use]
    pub fn with_image_stores(mut self, avatars: Arc<dyn ImageStore>, dog_photos: Arc<dyn ImageStore>) -> Self {
        self.avatars = Some(avatars);
        self.dog_photos = Some(dog_photos);
        self
    }

    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    #[must_use]
    pub fn with_report_fonts(mut self, fonts: ReportFonts) -> Self {
        self.report_fonts = Arc::new(fonts);
        self
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;
