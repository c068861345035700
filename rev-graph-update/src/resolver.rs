use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::event::ParentEdge;

/// Parent-edge lookup against the graph store.
///
/// Safe for concurrent invocation; caching and timeout policy belong to
/// the store side of this seam.
#[async_trait]
pub trait ParentResolver {
    async fn parents(&self, resource_id: &str) -> Result<Vec<ParentEdge>, ResolveError>;
}

/// HTTP client for the graph store's parent-edge endpoint.
pub struct GraphStoreClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl GraphStoreClient {
    pub fn new(base_url: &Url, request_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("rev-graph-update")
            .timeout(request_timeout)
            .build()?;

        Ok(GraphStoreClient {
            client,
            endpoint: base_url.join("parents")?,
        })
    }
}

#[async_trait]
impl ParentResolver for GraphStoreClient {
    async fn parents(&self, resource_id: &str) -> Result<Vec<ParentEdge>, ResolveError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("resource", resource_id)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ResolveError::Status(response.status()));
        }

        let edges: Vec<ParentEdge> = response.json().await?;
        debug!(resource_id, parents = edges.len(), "resolved parent edges");
        Ok(edges)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::Query;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};

    use super::*;

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn client(base: &Url) -> GraphStoreClient {
        GraphStoreClient::new(base, Duration::from_secs(5)).expect("failed to build client")
    }

    async fn parents_handler(
        Query(params): Query<HashMap<String, String>>,
    ) -> Json<Vec<ParentEdge>> {
        let edges = match params.get("resource").map(String::as_str) {
            Some("resources/child") => vec![
                ParentEdge {
                    resource_id: "resources/p1".to_string(),
                    path: "/a".to_string(),
                    content_type: "t1".to_string(),
                },
                ParentEdge {
                    resource_id: "resources/p2".to_string(),
                    path: "/b".to_string(),
                    content_type: "t2".to_string(),
                },
            ],
            _ => vec![],
        };
        Json(edges)
    }

    #[tokio::test]
    async fn decodes_parent_edges() {
        let base = serve(Router::new().route("/parents", get(parents_handler))).await;

        let edges = client(&base).parents("resources/child").await.unwrap();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].resource_id, "resources/p1");
        assert_eq!(edges[0].path, "/a");
        assert_eq!(edges[1].content_type, "t2");
    }

    #[tokio::test]
    async fn roots_have_no_parents() {
        let base = serve(Router::new().route("/parents", get(parents_handler))).await;

        let edges = client(&base).parents("resources/root").await.unwrap();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn store_errors_surface_as_resolution_failures() {
        let base = serve(
            Router::new().route("/parents", get(|| async { StatusCode::INTERNAL_SERVER_ERROR })),
        )
        .await;

        let err = client(&base).parents("resources/child").await.unwrap_err();
        assert!(
            matches!(err, ResolveError::Status(code) if code == StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[tokio::test]
    async fn unreachable_store_surfaces_as_request_failure() {
        // Nothing is listening on this port
        let base = Url::parse("http://127.0.0.1:1/").unwrap();

        let err = client(&base).parents("resources/child").await.unwrap_err();
        assert!(matches!(err, ResolveError::Request(_)));
    }
}
