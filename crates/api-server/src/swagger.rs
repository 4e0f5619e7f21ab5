//! OpenAPI specification and Swagger UI configuration.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campaign Express API",
        version = "0.1.0",
        description = "Personalized email campaign dispatch and delivery analytics.\n\nUpload an audience with a prompt template, receive delivery webhooks, read campaign counters.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Campaigns", description = "Campaign validation and scheduling"),
        (name = "Events", description = "Delivery event webhook and campaign metrics"),
        (name = "Operations", description = "Health, readiness, and liveness checks"),
    ),
    paths(
        crate::campaign_rest::handle_create_campaign,
        crate::event_rest::handle_event_webhook,
        crate::event_rest::handle_metrics,
        crate::rest::health_check,
        crate::rest::readiness,
        crate::rest::liveness,
    ),
    components(schemas(
        crate::campaign_rest::CampaignRequest,
        crate::campaign_rest::CampaignResponse,
        crate::campaign_rest::SkippedRowResponse,
        campaign_core::MetricsSnapshot,
        crate::rest::ErrorResponse,
        crate::rest::HealthResponse,
    ))
)]
pub struct ApiDoc;
