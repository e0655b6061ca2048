//! HTTP API for search jobs.
//!
//! Jobs are started with `POST /api/search` and polled by id; the response
//! bodies are the same snapshots the CLI renders.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::app::AppContext;
use crate::scrapers::SiteRegistry;
use crate::services::SearchService;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
    pub registry: Arc<SiteRegistry>,
}

impl AppState {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            search: ctx.search.clone(),
            registry: ctx.registry.clone(),
        }
    }
}

/// Start the web server.
pub async fn serve(ctx: &AppContext, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(AppState::new(ctx));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::models::ScrapedRecipe;
    use crate::repository::MemoryRecipeStore;
    use crate::scrapers::{ExtractionError, SearchQuery, SiteAdapter};
    use crate::services::SearchConfig;

    struct Quiet {
        domains: Vec<String>,
    }

    #[async_trait]
    impl SiteAdapter for Quiet {
        fn name(&self) -> &str {
            "Quiet"
        }

        fn domains(&self) -> &[String] {
            &self.domains
        }

        async fn discover(&self, _query: &SearchQuery, _limit: usize) -> Result<Vec<String>, ExtractionError> {
            Ok(Vec::new())
        }

        async fn extract(&self, url: &str) -> Result<ScrapedRecipe, ExtractionError> {
            Err(ExtractionError::MarkupNotFound(url.to_string()))
        }
    }

    fn setup_test_app() -> axum::Router {
        let mut registry = SiteRegistry::new();
        registry
            .register(Arc::new(Quiet {
                domains: vec!["quiet.test".to_string()],
            }))
            .unwrap();
        let registry = Arc::new(registry);
        let search = Arc::new(SearchService::new(
            registry.clone(),
            Arc::new(MemoryRecipeStore::new()),
            SearchConfig::default(),
        ));
        create_router(AppState { search, registry })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = setup_test_app();
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sites_listing() {
        let app = setup_test_app();
        let response = app
            .oneshot(Request::builder().uri("/api/sites").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json[0]["name"], "Quiet");
        assert_eq!(json[0]["domains"][0], "quiet.test");
    }

    #[tokio::test]
    async fn test_unknown_job_is_not_found() {
        let app = setup_test_app();
        let uri = format!("/api/search/{}", uuid::Uuid::new_v4());
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_zero_cap_is_bad_request() {
        let app = setup_test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/search")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"result_cap": 0}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
