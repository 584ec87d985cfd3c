//! Defines routes for the rate table, storage blocks and packages.
//!
//! ## Structure
//! - **Rates**
//!   - `GET|POST   /package_rates`
//!   - `GET|DELETE /package_rates/{id}`
//!
//! - **Storage blocks**
//!   - `GET|POST         /storage_blocks`
//!   - `GET              /storage_blocks/best_fit?volume=&weight=&count=`
//!   - `GET|PATCH|DELETE /storage_blocks/{id}`
//!   - `GET              /storage_blocks/{id}/load`
//!
//! - **Packages**
//!   - `GET|POST         /packages` (list supports filters and continuation tokens)
//!   - `GET|PATCH|DELETE /packages/{id}`
//!   - `GET              /packages/{id}/history`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        package_handlers::{
            create_package, delete_package, get_package, list_packages, package_history,
            update_package,
        },
        package_rate_handlers::{create_rate, delete_rate, get_rate, list_rates},
        storage_block_handlers::{
            best_fit, block_load, create_block, delete_block, get_block, list_blocks,
            update_block,
        },
    },
    state::AppState,
};
use axum::{Router, routing::get};

/// Build the router; the caller attaches `AppState` with `with_state`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // rates
        .route("/package_rates", get(list_rates).post(create_rate))
        .route("/package_rates/{id}", get(get_rate).delete(delete_rate))
        // storage blocks
        .route("/storage_blocks", get(list_blocks).post(create_block))
        .route("/storage_blocks/best_fit", get(best_fit))
        .route(
            "/storage_blocks/{id}",
            get(get_block).patch(update_block).delete(delete_block),
        )
        .route("/storage_blocks/{id}/load", get(block_load))
        // packages
        .route("/packages", get(list_packages).post(create_package))
        .route(
            "/packages/{id}",
            get(get_package).patch(update_package).delete(delete_package),
        )
        .route("/packages/{id}/history", get(package_history))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        routes().with_state(AppState::new(Arc::new(memory_pool().await)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn seed(app: &Router) -> (String, String) {
        let (status, rate) = send(
            app,
            "POST",
            "/package_rates",
            Some(json!({
                "name": "standard",
                "base_rate": 10000.0,
                "base_weight": 5.0,
                "oversize_rate": 8000.0,
                "overweight_rate_per_kg": 2000.0,
                "fragile_rate": 5000.0,
                "urgent_rate": 6000.0
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, block) = send(
            app,
            "POST",
            "/storage_blocks",
            Some(json!({
                "name": "A1",
                "max_weight": 100.0,
                "max_size": 1000.0,
                "max_package": 2
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        (
            rate["id"].as_str().unwrap().to_string(),
            block["id"].as_str().unwrap().to_string(),
        )
    }

    fn package_body(rate_id: &str, block_id: &str, weight: f64) -> Value {
        json!({
            "block_id": block_id,
            "package_rate_id": rate_id,
            "width": 10.0,
            "height": 10.0,
            "length": 3.0,
            "weight": weight
        })
    }

    #[tokio::test]
    async fn health_endpoints_respond() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, "GET", "/readyz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
    }

    #[tokio::test]
    async fn over_capacity_package_is_a_bad_request() {
        let app = app().await;
        let (rate_id, block_id) = seed(&app).await;

        let (status, first) =
            send(&app, "POST", "/packages", Some(package_body(&rate_id, &block_id, 40.0))).await;
        assert_eq!(status, StatusCode::CREATED);
        // 10000 base + 35 kg over the base weight * 2000
        assert_eq!(first["shipping_cost"], 80000.0);
        assert_eq!(first["status"], "ORDERED");

        let (status, err) =
            send(&app, "POST", "/packages", Some(package_body(&rate_id, &block_id, 70.0))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(err["status"], 400);
        assert!(err["error"].as_str().unwrap().contains("weight"));

        let (_, load) = send(&app, "GET", &format!("/storage_blocks/{block_id}/load"), None).await;
        assert_eq!(load["load"]["count"], 1);
        assert_eq!(load["load"]["weight"], 40.0);
    }

    #[tokio::test]
    async fn missing_resources_are_not_found() {
        let app = app().await;
        let missing = uuid::Uuid::new_v4();
        for uri in [
            format!("/packages/{missing}"),
            format!("/packages/{missing}/history"),
            format!("/storage_blocks/{missing}"),
            format!("/package_rates/{missing}"),
        ] {
            let (status, _) = send(&app, "GET", &uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        }
    }

    #[tokio::test]
    async fn patch_null_block_unassigns() {
        let app = app().await;
        let (rate_id, block_id) = seed(&app).await;
        let (_, package) =
            send(&app, "POST", "/packages", Some(package_body(&rate_id, &block_id, 1.0))).await;
        let id = package["id"].as_str().unwrap();

        let (status, updated) = send(
            &app,
            "PATCH",
            &format!("/packages/{id}"),
            Some(json!({ "block_id": null, "description": "returned" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["block_id"], Value::Null);
        assert_eq!(updated["description"], "returned");

        let (_, history) = send(&app, "GET", &format!("/packages/{id}/history"), None).await;
        assert_eq!(history[0]["action"], "MOVED");

        let (status, _) = send(&app, "DELETE", &format!("/storage_blocks/{block_id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn lowering_block_limit_below_load_is_rejected() {
        let app = app().await;
        let (rate_id, block_id) = seed(&app).await;
        send(&app, "POST", "/packages", Some(package_body(&rate_id, &block_id, 30.0))).await;

        let (status, err) = send(
            &app,
            "PATCH",
            &format!("/storage_blocks/{block_id}"),
            Some(json!({ "max_weight": 10.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(err["error"].as_str().unwrap().contains("weight"));

        let (status, _) = send(&app, "DELETE", &format!("/storage_blocks/{block_id}"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn best_fit_and_listing() {
        let app = app().await;
        let (rate_id, block_id) = seed(&app).await;

        let (status, fit) =
            send(&app, "GET", "/storage_blocks/best_fit?volume=500&weight=50", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fit["block"]["id"], block_id.as_str());

        let (_, none) =
            send(&app, "GET", "/storage_blocks/best_fit?volume=5000&weight=1", None).await;
        assert_eq!(none["block"], Value::Null);

        for weight in [1.0, 2.0] {
            send(&app, "POST", "/packages", Some(package_body(&rate_id, &block_id, weight))).await;
        }
        let (status, page) = send(&app, "GET", "/packages?limit=1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["packages"].as_array().unwrap().len(), 1);
        assert_eq!(page["is_truncated"], true);

        let token = page["next_continuation_token"].as_str().unwrap();
        let (_, rest) = send(&app, "GET", &format!("/packages?limit=1&continuation_token={token}"), None).await;
        assert_eq!(rest["packages"].as_array().unwrap().len(), 1);
        assert_eq!(rest["is_truncated"], false);

        let (status, _) = send(&app, "GET", "/packages?continuation_token=%25%25", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
