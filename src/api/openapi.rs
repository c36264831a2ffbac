//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{fines, health, loans, media, overdue};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Elidune Circulation API",
        version = "1.0.0",
        description = "Borrowing, overdue detection and fine collection",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html"),
        contact(name = "Elidune Team", email = "contact@elidune.org")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        health::health_check,
        media::get_media,
        loans::get_user_loans,
        loans::create_loan,
        loans::return_loan,
        fines::get_user_fines,
        fines::get_user_balance,
        fines::pay_fine,
        overdue::run_scan,
        overdue::send_reminders,
    ),
    components(
        schemas(
            crate::models::media::Media,
            crate::models::media::MediaType,
            crate::models::borrowing::Borrowing,
            crate::models::borrowing::BorrowingStatus,
            crate::models::borrowing::LoanRequest,
            crate::models::fine::Fine,
            crate::models::fine::PayFine,
            crate::models::fine::FinePayment,
            crate::models::user::BalanceResponse,
            crate::services::overdue::ScanReport,
            overdue::ReminderResponse,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "media", description = "Catalog lookups"),
        (name = "loans", description = "Borrowing and returns"),
        (name = "fines", description = "Fines, payments and balances"),
        (name = "overdue", description = "Overdue detection and reminders")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
