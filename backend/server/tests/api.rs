use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
};
use http_body_util::BodyExt;
use menu::Document;
use serde_json::{Value, json};
use server::{
    app,
    auth::StaticIdentity,
    config::Config,
    database::{DocumentStore, MemoryStore, Query, StoreError},
    state::State,
    upload::{
        ImageFile, MB, UploadBackend, UploadChain, UploadError, Uploader,
        storage::StorageErrorCode,
    },
};
use tower::ServiceExt;

const BOUNDARY: &str = "menu-test-boundary";
const PLACEHOLDER: &str = "https://placeholder.test/food.png";

/// Memory store that counts writes.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
}

impl CountingStore {
    fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn list(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<(String, Document)>, StoreError> {
        self.inner.list(collection, query).await
    }

    async fn insert(&self, collection: &str, document: Document) -> Result<String, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(collection, document).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update(collection, id, fields).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(collection, id).await
    }
}

struct Host {
    name: &'static str,
    url: Option<&'static str>,
    calls: AtomicUsize,
}

impl Host {
    fn up(name: &'static str, url: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            url: Some(url),
            calls: AtomicUsize::new(0),
        })
    }

    fn down(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            url: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UploadBackend for Host {
    fn name(&self) -> &str {
        self.name
    }

    fn max_size(&self) -> usize {
        10 * MB
    }

    async fn upload(&self, _image: &ImageFile) -> Result<String, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        self.url
            .map(str::to_string)
            .ok_or_else(|| UploadError::Rejected(format!("{} unavailable", self.name)))
    }
}

struct LockedBucket;

#[async_trait]
impl UploadBackend for LockedBucket {
    fn name(&self) -> &str {
        "Storage"
    }

    fn max_size(&self) -> usize {
        5 * MB
    }

    async fn upload(&self, _image: &ImageFile) -> Result<String, UploadError> {
        Err(UploadError::Storage(StorageErrorCode::from_code(
            "storage/unauthorized",
        )))
    }
}

struct Harness {
    app: Router,
    store: Arc<CountingStore>,
    hosts: Vec<Arc<Host>>,
}

impl Harness {
    fn config() -> Config {
        Config {
            placeholder_image_url: PLACEHOLDER.to_string(),
            ..Config::default()
        }
    }

    fn new(hosts: Vec<Arc<Host>>) -> Self {
        let config = Self::config();

        let backends: Vec<Arc<dyn UploadBackend>> = hosts
            .iter()
            .map(|host| host.clone() as Arc<dyn UploadBackend>)
            .collect();
        let chain = UploadChain::new(backends, PLACEHOLDER.to_string());
        let uploader = Uploader::fallback(chain, config.max_upload_size);

        Self::build(config, uploader, hosts)
    }

    /// Single bucket that refuses every upload.
    fn locked_bucket() -> Self {
        let config = Self::config();
        let uploader = Uploader::single(Arc::new(LockedBucket), config.max_upload_size);

        Self::build(config, uploader, Vec::new())
    }

    fn build(config: Config, uploader: Uploader, hosts: Vec<Arc<Host>>) -> Self {
        let store = Arc::new(CountingStore::default());
        let identity = Arc::new(StaticIdentity::new("chef@menu.test", "saffron"));
        let state = State::from_parts(config, store.clone(), uploader, identity);

        Self {
            app: app(state),
            store,
            hosts,
        }
    }

    fn working() -> Self {
        Self::new(vec![Host::up("primary", "https://primary.test/dish.png")])
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();

        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn login(&self) -> String {
        let request = json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "chef@menu.test", "password": "saffron" }),
        );

        let (status, body) = self.send(request).await;
        assert_eq!(status, StatusCode::OK);

        body["token"].as_str().unwrap().to_string()
    }

    async fn create_category(&self, token: &str, name: &str) -> String {
        let request = json_request(
            Method::POST,
            "/api/admin/categories",
            Some(token),
            json!({ "name": name }),
        );

        let (status, body) = self.send(request).await;
        assert_eq!(status, StatusCode::CREATED);

        body["id"].as_str().unwrap().to_string()
    }

    async fn create_food(
        &self,
        token: &str,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> (StatusCode, Value) {
        let request = multipart_request(Method::POST, "/api/admin/foods", token, fields, image);
        self.send(request).await
    }
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");

    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

fn authorized(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// `image` is (content type, bytes).
fn multipart_request(
    method: Method,
    uri: &str,
    token: &str,
    fields: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();

    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((content_type, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"dish.png\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn food_fields<'a>(name: &'a str, price: &'a str, category_id: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("name", name),
        ("description", "Made to order"),
        ("price", price),
        ("categoryId", category_id),
    ]
}

fn names(foods: &Value) -> Vec<&str> {
    foods
        .as_array()
        .unwrap()
        .iter()
        .map(|food| food["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn admin_routes_require_session() {
    let harness = Harness::working();

    let request = json_request(
        Method::POST,
        "/api/admin/categories",
        None,
        json!({ "name": "Drinks" }),
    );
    let (status, _) = harness.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = json_request(
        Method::POST,
        "/api/admin/categories",
        Some("not-a-session"),
        json!({ "name": "Drinks" }),
    );
    let (status, _) = harness.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(harness.store.writes(), 0);
}

#[tokio::test]
async fn login_logout_cycle() {
    let harness = Harness::working();

    let request = json_request(
        Method::POST,
        "/api/auth/login",
        None,
        json!({ "email": "chef@menu.test", "password": "wrong" }),
    );
    let (status, _) = harness.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = harness.login().await;
    let (status, body) = harness
        .send(authorized(Method::GET, "/api/auth/session", &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "chef@menu.test");

    let (status, _) = harness
        .send(authorized(Method::POST, "/api/auth/logout", &token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = harness
        .send(authorized(Method::GET, "/api/auth/session", &token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn blank_fields_never_reach_store() {
    let harness = Harness::working();
    let token = harness.login().await;

    for name in ["", "   ", "\t\n"] {
        let request = json_request(
            Method::POST,
            "/api/admin/categories",
            Some(&token),
            json!({ "name": name }),
        );
        let (status, _) = harness.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
    assert_eq!(harness.store.writes(), 0);

    let category = harness.create_category(&token, "Grill").await;
    let writes = harness.store.writes();

    let blank_name = food_fields("  ", "10", &category);
    let mut blank_description = food_fields("Kebab", "10", &category);
    blank_description[1] = ("description", " ");
    let no_category = food_fields("Kebab", "10", "");

    for fields in [blank_name, blank_description, no_category] {
        let (status, _) = harness
            .create_food(&token, &fields, Some(("image/png", b"png")))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    assert_eq!(harness.store.writes(), writes);
    assert_eq!(harness.hosts[0].calls(), 0);
}

#[tokio::test]
async fn prices_validated_and_forwarded() {
    let harness = Harness::working();
    let token = harness.login().await;
    let category = harness.create_category(&token, "Grill").await;
    let writes = harness.store.writes();

    for price in ["abc", "0", "-3", "", "NaN"] {
        let (status, _) = harness
            .create_food(&token, &food_fields("Kebab", price, &category), None)
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "price {price:?}");
    }
    assert_eq!(harness.store.writes(), writes);

    let (status, _) = harness
        .create_food(&token, &food_fields("Kebab", "12.75", &category), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, foods) = harness.get("/api/foods").await;
    assert_eq!(foods[0]["price"], json!(12.75));
}

#[tokio::test]
async fn second_host_used_when_first_fails() {
    let harness = Harness::new(vec![
        Host::down("primary"),
        Host::up("secondary", "https://secondary.test/dish.png"),
        Host::up("inline", "data:image/png;base64,cG5n"),
    ]);
    let token = harness.login().await;
    let category = harness.create_category(&token, "Grill").await;

    let (status, body) = harness
        .create_food(
            &token,
            &food_fields("Kebab", "10", &category),
            Some(("image/png", b"png")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["imageUrl"], "https://secondary.test/dish.png");

    let (_, foods) = harness.get("/api/foods").await;
    assert_eq!(foods[0]["imageUrl"], "https://secondary.test/dish.png");

    assert_eq!(harness.hosts[0].calls(), 1);
    assert_eq!(harness.hosts[1].calls(), 1);
    assert_eq!(harness.hosts[2].calls(), 0);
}

#[tokio::test]
async fn placeholder_when_every_host_fails() {
    let harness = Harness::new(vec![
        Host::down("primary"),
        Host::down("secondary"),
        Host::down("inline"),
    ]);
    let token = harness.login().await;
    let category = harness.create_category(&token, "Grill").await;

    let (status, body) = harness
        .create_food(
            &token,
            &food_fields("Kebab", "10", &category),
            Some(("image/jpeg", b"jpg")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["imageUrl"], PLACEHOLDER);

    let id = body["id"].as_str().unwrap().to_string();
    let request = multipart_request(
        Method::PUT,
        &format!("/api/admin/foods/{id}"),
        &token,
        &[("name", "Chicken Kebab")],
        Some(("image/jpeg", b"jpg")),
    );
    let (status, body) = harness.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrl"], PLACEHOLDER);

    let (_, foods) = harness.get("/api/foods").await;
    assert_eq!(foods[0]["name"], "Chicken Kebab");
    assert_eq!(foods[0]["imageUrl"], PLACEHOLDER);
}

#[tokio::test]
async fn non_image_refused() {
    let harness = Harness::working();
    let token = harness.login().await;
    let category = harness.create_category(&token, "Grill").await;

    let (status, _) = harness
        .create_food(
            &token,
            &food_fields("Kebab", "10", &category),
            Some(("application/pdf", b"%PDF")),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(harness.hosts[0].calls(), 0);
}

#[tokio::test]
async fn edit_without_image_keeps_previous() {
    let harness = Harness::working();
    let token = harness.login().await;
    let category = harness.create_category(&token, "Grill").await;

    let (_, body) = harness
        .create_food(
            &token,
            &food_fields("Kebab", "10", &category),
            Some(("image/png", b"png")),
        )
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let request = multipart_request(
        Method::PUT,
        &format!("/api/admin/foods/{id}"),
        &token,
        &[("price", "14"), ("description", "Now with rice")],
        None,
    );
    let (status, _) = harness.send(request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, foods) = harness.get("/api/foods").await;
    assert_eq!(foods[0]["price"], json!(14.0));
    assert_eq!(foods[0]["description"], "Now with rice");
    assert_eq!(foods[0]["imageUrl"], "https://primary.test/dish.png");
    assert_eq!(harness.hosts[0].calls(), 1);
}

#[tokio::test]
async fn category_filter_selects_exact_matches() {
    let harness = Harness::working();
    let token = harness.login().await;
    let grill = harness.create_category(&token, "Grill").await;
    let drinks = harness.create_category(&token, "Drinks").await;

    for (name, category) in [
        ("Kebab", &grill),
        ("Tea", &drinks),
        ("Burger", &grill),
        ("Ayran", &drinks),
        ("Chops", &grill),
    ] {
        let (status, _) = harness
            .create_food(&token, &food_fields(name, "5", category), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, all) = harness.get("/api/foods").await;
    assert_eq!(names(&all), vec!["Ayran", "Burger", "Chops", "Kebab", "Tea"]);

    let (_, filtered) = harness.get(&format!("/api/foods?categoryId={grill}")).await;
    assert_eq!(names(&filtered), vec!["Burger", "Chops", "Kebab"]);
    assert!(
        filtered
            .as_array()
            .unwrap()
            .iter()
            .all(|food| food["categoryId"] == grill.as_str())
    );

    let (_, menu) = harness.get(&format!("/api/menu?categoryId={drinks}")).await;
    assert_eq!(menu["selectedCategory"]["name"], "Drinks");
    assert_eq!(names(&menu["foods"]), vec!["Ayran", "Tea"]);
    assert_eq!(menu["foods"][0]["categoryName"], "Drinks");

    let (_, reset) = harness.get("/api/menu?categoryId=").await;
    assert_eq!(reset["selectedCategory"], Value::Null);
    assert_eq!(names(&reset["foods"]), names(&all));

    let (_, categories) = harness.get("/api/categories").await;
    assert_eq!(names(&categories), vec!["Drinks", "Grill"]);
}

#[tokio::test]
async fn deleted_category_leaves_foods_unknown() {
    let harness = Harness::working();
    let token = harness.login().await;
    let desserts = harness.create_category(&token, "Desserts").await;

    harness
        .create_food(&token, &food_fields("Baklava", "6", &desserts), None)
        .await;

    let (status, _) = harness
        .send(authorized(
            Method::DELETE,
            &format!("/api/admin/categories/{desserts}"),
            &token,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, foods) = harness.get("/api/foods").await;
    assert_eq!(foods[0]["categoryId"], desserts.as_str());

    let (status, menu) = harness.get("/api/menu").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(menu["foods"][0]["categoryName"], "Unknown category");

    let (_, admin) = harness
        .send(authorized(Method::GET, "/api/admin/foods", &token))
        .await;
    assert_eq!(admin[0]["categoryName"], "Unknown category");
}

#[tokio::test]
async fn rename_and_delete_food() {
    let harness = Harness::working();
    let token = harness.login().await;
    let soups = harness.create_category(&token, "Soup").await;

    let request = json_request(
        Method::PUT,
        &format!("/api/admin/categories/{soups}"),
        Some(&token),
        json!({ "name": "  Soups  " }),
    );
    let (status, _) = harness.send(request).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, categories) = harness.get("/api/categories").await;
    assert_eq!(categories[0]["name"], "Soups");

    let (_, body) = harness
        .create_food(&token, &food_fields("Lentil", "4", &soups), None)
        .await;
    let id = body["id"].as_str().unwrap().to_string();

    let (status, _) = harness
        .send(authorized(
            Method::DELETE,
            &format!("/api/admin/foods/{id}"),
            &token,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, foods) = harness.get("/api/foods").await;
    assert!(foods.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn rename_missing_category_is_not_found() {
    let harness = Harness::working();
    let token = harness.login().await;

    let request = json_request(
        Method::PUT,
        "/api/admin/categories/ghost",
        Some(&token),
        json!({ "name": "Anything" }),
    );
    let (status, _) = harness.send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn standalone_image_upload() {
    let harness = Harness::working();
    let token = harness.login().await;

    let request = multipart_request(
        Method::POST,
        "/api/admin/images",
        &token,
        &[],
        Some(("image/webp", b"webp")),
    );
    let (status, body) = harness.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["imageUrl"], "https://primary.test/dish.png");

    let request = multipart_request(Method::POST, "/api/admin/images", &token, &[], None);
    let (status, body) = harness.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Please choose an image");
}

#[tokio::test]
async fn storage_failure_reported() {
    let harness = Harness::locked_bucket();
    let token = harness.login().await;
    let category = harness.create_category(&token, "Grill").await;
    let writes = harness.store.writes();

    let (status, body) = harness
        .create_food(
            &token,
            &food_fields("Kebab", "10", &category),
            Some(("image/png", b"png")),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, "You are not allowed to upload images");
    assert_eq!(harness.store.writes(), writes);

    let (_, foods) = harness.get("/api/foods").await;
    assert!(foods.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_image_refused() {
    let harness = Harness::working();
    let token = harness.login().await;
    let category = harness.create_category(&token, "Grill").await;
    let writes = harness.store.writes();

    let oversized = vec![0u8; 5 * MB + 1];
    let (status, body) = harness
        .create_food(
            &token,
            &food_fields("Kebab", "10", &category),
            Some(("image/png", oversized.as_slice())),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "File must not be larger than 5 MB");
    assert_eq!(harness.store.writes(), writes);
    assert_eq!(harness.hosts[0].calls(), 0);
}

#[tokio::test]
async fn empty_edit_of_missing_food_is_not_found() {
    let harness = Harness::working();
    let token = harness.login().await;

    let request = multipart_request(
        Method::PUT,
        "/api/admin/foods/ghost",
        &token,
        &[("imageUrl", "")],
        None,
    );
    let (status, _) = harness.send(request).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
