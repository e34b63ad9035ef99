//! HTTP client for end-to-end tests
//!
//! Wraps reqwest with one method per API endpoint. When routes or request
//! formats change, update only this file.

use super::constants::*;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client carrying an optional bearer token
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Session token sent as `Authorization: Bearer <token>`
    pub token: Option<String>,
    /// Id of the principal the token belongs to
    pub user_id: Option<i64>,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            token: None,
            user_id: None,
        }
    }

    /// Registers a principal and returns a client holding its token.
    ///
    /// # Panics
    ///
    /// Panics if registration does not answer 201.
    pub async fn registered(base_url: String, login: &str, password: &str, email: &str) -> Self {
        let mut client = Self::new(base_url);
        let response = client.register(login, password, email).await;
        assert_eq!(
            response.status(),
            StatusCode::CREATED,
            "Registration of {} failed",
            login
        );
        client.adopt_session(response).await;
        client
    }

    pub async fn alice(base_url: String) -> Self {
        Self::registered(base_url, ALICE_LOGIN, ALICE_PASS, ALICE_EMAIL).await
    }

    pub async fn bob(base_url: String) -> Self {
        Self::registered(base_url, BOB_LOGIN, BOB_PASS, BOB_EMAIL).await
    }

    /// Keeps the token and user id from a login or registration response.
    pub async fn adopt_session(&mut self, response: Response) -> Value {
        let body: Value = response.json().await.expect("Auth response is not JSON");
        self.token = Some(
            body["token"]
                .as_str()
                .expect("Auth response has no token")
                .to_string(),
        );
        self.user_id = body["user"]["user_id"].as_i64();
        body
    }

    /// Same server, different (or no) token.
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token.to_string()),
            user_id: None,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Response {
        self.authorized(builder)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn get(&self, path: &str) -> Response {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.send(self.client.post(self.url(path)).json(&body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Response {
        self.send(self.client.put(self.url(path)).json(&body)).await
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.send(self.client.delete(self.url(path))).await
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    /// POST /api/auth/register
    pub async fn register(&self, login: &str, password: &str, email: &str) -> Response {
        self.post(
            "/auth/register",
            json!({
                "login": login,
                "password": password,
                "first_name": "Test",
                "last_name": "User",
                "email": email,
            }),
        )
        .await
    }

    /// POST /api/auth/login
    pub async fn login(&self, login: &str, password: &str) -> Response {
        self.post("/auth/login", json!({ "login": login, "password": password }))
            .await
    }

    // ========================================================================
    // Profile
    // ========================================================================

    /// GET /api/profile
    pub async fn get_profile(&self) -> Response {
        self.get("/profile").await
    }

    /// PUT /api/profile
    pub async fn update_profile(&self, body: Value) -> Response {
        self.put("/profile", body).await
    }

    // ========================================================================
    // Library
    // ========================================================================

    /// GET /api/genres
    pub async fn get_genres(&self) -> Response {
        self.get("/genres").await
    }

    /// Id of the first seeded genre.
    pub async fn any_genre_id(&self) -> i64 {
        let genres: Value = self.get_genres().await.json().await.expect("Genres are not JSON");
        genres[0]["genre_id"].as_i64().expect("No genres seeded")
    }

    /// GET /api/artists
    pub async fn get_artists(&self) -> Response {
        self.get("/artists").await
    }

    /// POST /api/artists
    pub async fn add_artist(&self, name: &str) -> Response {
        self.post("/artists", json!({ "name": name })).await
    }

    /// Adds an artist and returns its id.
    pub async fn create_artist(&self, name: &str) -> i64 {
        let response = self.add_artist(name).await;
        assert_eq!(response.status(), StatusCode::CREATED, "Adding artist {} failed", name);
        let body: Value = response.json().await.expect("Artist is not JSON");
        body["artist_id"].as_i64().expect("Artist has no id")
    }

    /// PUT /api/artists/{id}
    pub async fn update_artist(&self, artist_id: i64, name: &str) -> Response {
        self.put(&format!("/artists/{}", artist_id), json!({ "name": name }))
            .await
    }

    /// DELETE /api/artists/{id}
    pub async fn delete_artist(&self, artist_id: i64) -> Response {
        self.delete(&format!("/artists/{}", artist_id)).await
    }

    /// GET /api/artists/{id}/tracks-count
    pub async fn get_artist_tracks_count(&self, artist_id: i64) -> Response {
        self.get(&format!("/artists/{}/tracks-count", artist_id)).await
    }

    /// GET /api/tracks
    pub async fn get_tracks(&self) -> Response {
        self.get("/tracks").await
    }

    /// GET /api/search/tracks?{query}
    pub async fn search_tracks(&self, query: &str) -> Response {
        self.get(&format!("/search/tracks?{}", query)).await
    }

    /// POST /api/tracks
    pub async fn add_track(&self, title: &str, artist_id: i64, genre_id: i64) -> Response {
        self.post(
            "/tracks",
            json!({ "title": title, "artist_id": artist_id, "genre_id": genre_id }),
        )
        .await
    }

    /// Adds a track and returns its id.
    pub async fn create_track(&self, title: &str, artist_id: i64, genre_id: i64) -> i64 {
        let response = self.add_track(title, artist_id, genre_id).await;
        assert_eq!(response.status(), StatusCode::CREATED, "Adding track {} failed", title);
        let body: Value = response.json().await.expect("Track is not JSON");
        body["track_id"].as_i64().expect("Track has no id")
    }

    /// PUT /api/tracks/{id}
    pub async fn update_track(&self, track_id: i64, body: Value) -> Response {
        self.put(&format!("/tracks/{}", track_id), body).await
    }

    /// DELETE /api/tracks/{id}
    pub async fn delete_track(&self, track_id: i64) -> Response {
        self.delete(&format!("/tracks/{}", track_id)).await
    }

    // ========================================================================
    // Collections
    // ========================================================================

    /// GET /api/collections
    pub async fn get_collections(&self) -> Response {
        self.get("/collections").await
    }

    /// POST /api/collections
    pub async fn add_collection(&self, name: &str) -> Response {
        self.post("/collections", json!({ "name": name })).await
    }

    /// Creates a collection and returns its id.
    pub async fn create_collection(&self, name: &str) -> i64 {
        let response = self.add_collection(name).await;
        assert_eq!(
            response.status(),
            StatusCode::CREATED,
            "Creating collection {} failed",
            name
        );
        let body: Value = response.json().await.expect("Collection is not JSON");
        body["collection_id"].as_i64().expect("Collection has no id")
    }

    /// PUT /api/collections/{id}
    pub async fn update_collection(&self, collection_id: i64, name: &str) -> Response {
        self.put(
            &format!("/collections/{}", collection_id),
            json!({ "name": name }),
        )
        .await
    }

    /// DELETE /api/collections/{id}
    pub async fn delete_collection(&self, collection_id: i64) -> Response {
        self.delete(&format!("/collections/{}", collection_id)).await
    }

    /// GET /api/collections/{id}/tracks
    pub async fn get_collection_tracks(&self, collection_id: i64) -> Response {
        self.get(&format!("/collections/{}/tracks", collection_id))
            .await
    }

    /// POST /api/collections/{id}/tracks
    pub async fn add_collection_track(&self, collection_id: i64, track_id: i64) -> Response {
        self.post(
            &format!("/collections/{}/tracks", collection_id),
            json!({ "track_id": track_id }),
        )
        .await
    }

    /// DELETE /api/collections/{id}/tracks/{track_id}
    pub async fn remove_collection_track(&self, collection_id: i64, track_id: i64) -> Response {
        self.delete(&format!(
            "/collections/{}/tracks/{}",
            collection_id, track_id
        ))
        .await
    }

    // ========================================================================
    // Admin
    // ========================================================================

    /// GET /api/admin/users
    pub async fn admin_users(&self) -> Response {
        self.get("/admin/users").await
    }

    /// GET /api/admin/tracks
    pub async fn admin_tracks(&self) -> Response {
        self.get("/admin/tracks").await
    }

    /// GET /api/admin/audit?limit={limit}
    pub async fn admin_audit(&self, limit: Option<usize>) -> Response {
        match limit {
            Some(limit) => self.get(&format!("/admin/audit?limit={}", limit)).await,
            None => self.get("/admin/audit").await,
        }
    }
}
