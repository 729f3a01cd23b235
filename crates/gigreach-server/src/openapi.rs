use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "gigreach API",
        version = "0.2.0",
        description = "Control surface for the gigreach job-posting discovery and outreach scraper."
    ),
    paths(
        crate::routes::start_run,
        crate::routes::run_status,
        crate::routes::download_results,
        crate::routes::cleanup,
        crate::routes::get_config,
        crate::routes::update_config,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::StartRunResponse,
        crate::dto::StatusResponse,
        crate::dto::CleanupResponse,
        crate::dto::ConfigResponse,
        crate::dto::UpdateConfigRequest,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "runs", description = "Scraping run lifecycle"),
        (name = "config", description = "Scraper configuration"),
        (name = "system", description = "Health and system status"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("token")
                        .description(Some(
                            "Admin API key. Set via GIGREACH_ADMIN_TOKEN environment variable.",
                        ))
                        .build(),
                ),
            );
        }
    }
}
