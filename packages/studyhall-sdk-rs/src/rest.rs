//! Async REST client for the Studyhall API and its external collaborators.
//!
//! The productivity resources (`/tasks`, `/notes`, `/songs`, `/leetcode`,
//! `/auth/*`) and the chatbot are external services; this client talks to
//! them generically — JSON in, JSON out, bearer token attached. Only the room
//! catalog and the admin purge belong to the real-time core itself.

use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, SdkError};
use crate::types::{RoomCatalog, RoomInfo};

const DEFAULT_BASE: &str = "http://localhost:8080/api/v1";

/// The rooms every client knows even when the catalog is unreachable.
pub fn fallback_rooms() -> Vec<RoomInfo> {
    vec![
        RoomInfo {
            id: "commons".into(),
            name: "Commons".into(),
            description: "General discussion for everyone".into(),
        },
        RoomInfo {
            id: "placements".into(),
            name: "Placements".into(),
            description: "Internships, interviews, and placement prep".into(),
        },
    ]
}

/// Async Studyhall REST client.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    admin_token: Option<String>,
}

impl RestClient {
    /// Build a client. `token` becomes a `Bearer` authorization header for
    /// the external collaborators; pass `None` for anonymous access.
    pub fn new(token: Option<&str>, base_url: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .default_headers({
                let mut h = reqwest::header::HeaderMap::new();
                if let Some(token) = token {
                    h.insert(
                        reqwest::header::AUTHORIZATION,
                        reqwest::header::HeaderValue::from_str(&format!("Bearer {token}"))
                            .map_err(|e| SdkError::Other(e.to_string()))?,
                    );
                }
                h.insert(
                    reqwest::header::CONTENT_TYPE,
                    reqwest::header::HeaderValue::from_static("application/json"),
                );
                h
            })
            .build()
            .map_err(SdkError::Http)?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE)
                .trim_end_matches('/')
                .to_owned(),
            admin_token: None,
        })
    }

    /// Attach the shared secret for administrative routes.
    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }

    // ── Internal ──────────────────────────────────────────────────────────────

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(b) = body {
            req = req.json(b);
        }
        if let Some(admin) = &self.admin_token {
            req = req.header("x-admin-token", admin);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let msg = resp
                .json::<Value>()
                .await
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_owned))
                .unwrap_or_else(|| status.to_string());
            return Err(SdkError::Api {
                status: status.as_u16(),
                message: msg,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return serde_json::from_value(Value::Null).map_err(SdkError::Json);
        }
        Ok(resp.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.request(Method::POST, path, Some(body)).await
    }

    async fn put<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.request(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.client.delete(&url).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(SdkError::Api {
                status,
                message: resp.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }

    // ── Rooms ─────────────────────────────────────────────────────────────────

    /// Fetch the room catalog.
    pub async fn list_rooms(&self) -> Result<Vec<RoomInfo>> {
        let catalog: RoomCatalog = self.get("/rooms").await?;
        Ok(catalog.rooms)
    }

    /// Fetch the catalog, substituting the built-in pair when the server
    /// cannot produce one.
    pub async fn list_rooms_or_default(&self) -> Vec<RoomInfo> {
        match self.list_rooms().await {
            Ok(rooms) if !rooms.is_empty() => rooms,
            Ok(_) => fallback_rooms(),
            Err(e) => {
                tracing::debug!("Room catalog unavailable ({e}), using built-in rooms");
                fallback_rooms()
            }
        }
    }

    // ── Admin ─────────────────────────────────────────────────────────────────

    /// Delete every stored chat message. Destructive and irreversible.
    /// Returns the number of messages removed.
    pub async fn purge_messages(&self) -> Result<u64> {
        let resp: Value = self
            .post("/admin/messages/purge", &Value::Null)
            .await?;
        Ok(resp.get("deleted").and_then(Value::as_u64).unwrap_or(0))
    }

    // ── External collaborators (generic CRUD) ─────────────────────────────────
    // Resources: "tasks", "notes", "songs", "leetcode".

    /// List a collaborator resource.
    pub async fn list_resource(&self, resource: &str) -> Result<Vec<Value>> {
        self.get(&format!("/{resource}")).await
    }

    /// Create an item in a collaborator resource.
    pub async fn create_resource(&self, resource: &str, body: &Value) -> Result<Value> {
        self.post(&format!("/{resource}"), body).await
    }

    /// Replace an item in a collaborator resource.
    pub async fn update_resource(&self, resource: &str, id: &str, body: &Value) -> Result<Value> {
        self.put(&format!("/{resource}/{id}"), body).await
    }

    /// Delete an item from a collaborator resource.
    pub async fn delete_resource(&self, resource: &str, id: &str) -> Result<()> {
        self.delete(&format!("/{resource}/{id}")).await
    }

    // ── Auth (external) ───────────────────────────────────────────────────────

    /// Exchange credentials for a token with the external auth service.
    pub async fn login(&self, email: &str, password: &str) -> Result<Value> {
        self.post(
            "/auth/login",
            &serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Register with the external auth service.
    pub async fn signup(&self, body: &Value) -> Result<Value> {
        self.post("/auth/signup", body).await
    }

    // ── Chatbot (external) ────────────────────────────────────────────────────

    /// Single-shot text exchange with the generative endpoint: one prompt in,
    /// one reply out. The proxying itself is the external service's business.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let resp: Value = self
            .post("/chatbot", &serde_json::json!({ "message": prompt }))
            .await?;
        resp.get("reply")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| SdkError::Other("Chatbot reply missing".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_rooms_are_the_builtin_pair() {
        let rooms = fallback_rooms();
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].id, "commons");
        assert_eq!(rooms[1].id, "placements");
    }

    #[tokio::test]
    async fn test_catalog_falls_back_when_unreachable() {
        // Nothing listens on this port; the client must substitute the
        // built-in pair rather than surface an error.
        let rest = RestClient::new(None, Some("http://127.0.0.1:9")).unwrap();
        let rooms = rest.list_rooms_or_default().await;
        assert_eq!(rooms, fallback_rooms());
    }
}
