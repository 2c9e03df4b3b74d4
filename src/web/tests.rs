use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, EncodingKey, Header};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;
use crate::db::services::RecipeService;
use crate::services::image_service::sample_png;
use crate::web::models::Claims;

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "recipe-upload-boundary";

const ALICE: i32 = 1;
const BOB: i32 = 2;

struct TestApp {
    router: Router,
    db: DatabaseConnection,
    media_root: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

async fn test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = crate::db::connect("sqlite::memory:").await.unwrap();
    crate::db::ensure_schema(&db).await.unwrap();

    let media_root = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::with_secret(SECRET);
    config.media_root = media_root.path().to_string_lossy().into_owned();
    configure(&mut config);

    let router = create_axum_router(db.clone(), Arc::new(config));
    TestApp {
        router,
        db,
        media_root,
    }
}

fn token_for(user_id: i32) -> String {
    let claims = Claims {
        sub: format!("user{user_id}"),
        user_id,
        exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_ref()),
    )
    .unwrap()
}

impl TestApp {
    async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<i32>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(format!("{API_PREFIX}{uri}"));
        if let Some(user_id) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(user_id)));
        }
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.call(request).await
    }

    async fn get(&self, uri: &str, user: i32) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(user), None).await
    }

    async fn post(&self, uri: &str, user: i32, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(user), Some(body)).await
    }

    async fn upload(&self, recipe_id: i32, user: i32, field: &str, bytes: &[u8]) -> (StatusCode, Value) {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"upload.png\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("{API_PREFIX}/recipes/{recipe_id}/image/"))
            .header(header::AUTHORIZATION, format!("Bearer {}", token_for(user)))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        self.call(request).await
    }

    async fn create_tag(&self, user: i32, name: &str) -> i32 {
        let (status, body) = self.post("/tags/", user, json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap() as i32
    }

    async fn create_ingredient(&self, user: i32, name: &str) -> i32 {
        let (status, body) = self.post("/ingridients/", user, json!({ "name": name })).await;
        assert_eq!(status, StatusCode::CREATED);
        body["id"].as_i64().unwrap() as i32
    }

    async fn create_recipe(&self, user: i32, extra: Value) -> i32 {
        let mut payload = json!({ "title": "Sample recipe", "time_minutes": 10, "price": 5.0 });
        if let (Some(target), Some(source)) = (payload.as_object_mut(), extra.as_object()) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        let (status, body) = self.post("/recipes/", user, payload).await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap() as i32
    }

    fn image_path(&self, image_url: &str) -> std::path::PathBuf {
        let relative = image_url.strip_prefix("/media/").unwrap();
        self.media_root.path().join(relative)
    }
}

fn names(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|item| item["name"].as_str().unwrap().to_string())
        .collect()
}

fn ids(body: &Value) -> Vec<i32> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_i64().unwrap() as i32)
        .collect()
}

#[tokio::test]
async fn test_health_check_is_public() {
    let app = test_app().await;
    let request = Request::builder().uri("/api/health").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_auth_required_everywhere() {
    let app = test_app().await;
    let cases = [
        (Method::GET, "/tags/"),
        (Method::POST, "/tags/"),
        (Method::GET, "/tags/1/"),
        (Method::DELETE, "/tags/1/"),
        (Method::GET, "/ingridients/"),
        (Method::PATCH, "/ingridients/1/"),
        (Method::GET, "/recipes/"),
        (Method::PUT, "/recipes/1/"),
        (Method::POST, "/recipes/1/image/"),
    ];
    for (method, uri) in cases {
        let (status, body) = app.send(method.clone(), uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let app = test_app().await;
    let request = Request::builder()
        .uri(format!("{API_PREFIX}/tags/"))
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.call(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_token_cookie_is_accepted() {
    let app = test_app().await;
    let request = Request::builder()
        .uri(format!("{API_PREFIX}/tags"))
        .header(header::COOKIE, format!("token={}", token_for(ALICE)))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.call(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_tag_round_trip() {
    let app = test_app().await;
    let (status, created) = app
        .post("/tags/", ALICE, json!({ "name": "Vegan", "id": 500, "user_id": BOB }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_ne!(created["id"], json!(500));
    assert_eq!(created["name"], "Vegan");
    assert_eq!(created.as_object().unwrap().len(), 2);

    let id = created["id"].as_i64().unwrap();
    let (status, fetched) = app.get(&format!("/tags/{id}"), ALICE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    // The owner key in the payload was ignored.
    let (_, bob_tags) = app.get("/tags/", BOB).await;
    assert_eq!(bob_tags, json!([]));
}

#[tokio::test]
async fn test_tag_update_and_delete() {
    let app = test_app().await;
    let id = app.create_tag(ALICE, "Breakfast").await;

    let (status, body) = app
        .send(Method::PUT, &format!("/tags/{id}/"), Some(ALICE), Some(json!({ "name": "Brunch" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": id, "name": "Brunch" }));

    let (status, body) = app
        .send(Method::PATCH, &format!("/tags/{id}/"), Some(ALICE), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Brunch");

    let (status, _) = app
        .send(Method::PUT, &format!("/tags/{id}/"), Some(ALICE), Some(json!({ "name": "  " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::DELETE, &format!("/tags/{id}/"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&format!("/tags/{id}/"), ALICE).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ingredients_ordered_and_limited_to_user() {
    let app = test_app().await;
    app.create_ingredient(ALICE, "tomato").await;
    app.create_ingredient(ALICE, "potato").await;

    let (status, body) = app.get("/ingridients/", ALICE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["tomato", "potato"]);

    app.create_ingredient(BOB, "ketchup").await;

    let (_, body) = app.get("/ingridients/", ALICE).await;
    assert_eq!(names(&body), vec!["tomato", "potato"]);
    let (_, body) = app.get("/ingridients/", BOB).await;
    assert_eq!(names(&body), vec!["ketchup"]);
}

#[tokio::test]
async fn test_other_users_records_are_not_found() {
    let app = test_app().await;
    let tag_id = app.create_tag(ALICE, "Dessert").await;
    let ingredient_id = app.create_ingredient(ALICE, "Sugar").await;
    let recipe_id = app.create_recipe(ALICE, json!({})).await;

    for uri in [
        format!("/tags/{tag_id}/"),
        format!("/ingridients/{ingredient_id}/"),
        format!("/recipes/{recipe_id}/"),
    ] {
        let (status, _) = app.get(&uri, BOB).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {uri}");

        let (status, _) = app
            .send(Method::PATCH, &uri, Some(BOB), Some(json!({ "name": "x", "title": "x" })))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "PATCH {uri}");

        let full_body = json!({ "name": "x", "title": "x", "time_minutes": 1, "price": 1.0 });
        let (status, _) = app.send(Method::PUT, &uri, Some(BOB), Some(full_body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "PUT {uri}");

        let (status, _) = app.send(Method::DELETE, &uri, Some(BOB), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "DELETE {uri}");

        let (status, _) = app.get(&uri, ALICE).await;
        assert_eq!(status, StatusCode::OK, "owner GET {uri}");
    }

    let (status, _) = app.upload(recipe_id, BOB, "image", &sample_png()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_ids_are_not_found() {
    let app = test_app().await;
    let recipe_id = app.create_recipe(ALICE, json!({})).await;

    for uri in ["/tags/abc/", "/ingridients/abc/", "/recipes/99999999999/", "/recipes/-x"] {
        let (status, body) = app.get(uri, ALICE).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "GET {uri}");
        assert!(body["error"].is_string(), "GET {uri}: {body}");
    }

    let (status, body) = app
        .send(Method::PATCH, "/recipes/abc/", Some(ALICE), Some(json!({ "title": "x" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = app.get(&format!("/recipes/{recipe_id}/"), ALICE).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_null_fields_are_rejected() {
    let app = test_app().await;
    let tag_id = app.create_tag(ALICE, "Vegan").await;
    let recipe_id = app.create_recipe(ALICE, json!({ "title": "Stew", "price": 4.5 })).await;
    let uri = format!("/recipes/{recipe_id}/");

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(ALICE), Some(json!({ "title": null, "price": null })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("may not be null"));

    let (status, _) = app
        .send(Method::PATCH, &uri, Some(ALICE), Some(json!({ "tags": null })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, detail) = app.get(&uri, ALICE).await;
    assert_eq!(detail["title"], "Stew");
    assert_eq!(detail["price"], 4.5);

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/tags/{tag_id}/"),
            Some(ALICE),
            Some(json!({ "name": null })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_basic_recipe() {
    let app = test_app().await;
    let (status, body) = app
        .post(
            "/recipes",
            ALICE,
            json!({ "title": "Cheese cake", "time_minutes": 30, "price": 5.00 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["title"], "Cheese cake");
    assert_eq!(body["time_minutes"], 30);
    assert_eq!(body["price"], 5.0);
    assert_eq!(body["link"], "");
    assert_eq!(body["tags"], json!([]));
    assert_eq!(body["ingredients"], json!([]));
    assert!(body.get("image").is_none());
}

#[tokio::test]
async fn test_create_recipe_validation() {
    let app = test_app().await;

    let (status, body) = app.post("/recipes/", ALICE, json!({ "title": "No time" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("time_minutes"));

    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("{API_PREFIX}/recipes/"))
        .header(header::AUTHORIZATION, format!("Bearer {}", token_for(ALICE)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let (status, _) = app.call(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/recipes/",
            ALICE,
            json!({ "title": "Typed", "time_minutes": "soon", "price": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recipe_detail_nests_and_write_takes_ids() {
    let app = test_app().await;
    let vegan = app.create_tag(ALICE, "Vegan").await;
    let dessert = app.create_tag(ALICE, "Dessert").await;
    let lime = app.create_ingredient(ALICE, "Lime").await;

    let (status, created) = app
        .post(
            "/recipes/",
            ALICE,
            json!({
                "title": "Avocado Lime Cheese cake",
                "time_minutes": 60,
                "price": 20.00,
                "tags": [dessert, vegan, vegan],
                "ingredients": [lime]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let mut expected_tags = vec![vegan, dessert];
    expected_tags.sort();
    assert_eq!(created["tags"], json!(expected_tags));
    assert_eq!(created["ingredients"], json!([lime]));

    let id = created["id"].as_i64().unwrap();
    let (status, detail) = app.get(&format!("/recipes/{id}/"), ALICE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        detail["tags"],
        json!([{ "id": vegan, "name": "Vegan" }, { "id": dessert, "name": "Dessert" }])
    );
    assert_eq!(detail["ingredients"], json!([{ "id": lime, "name": "Lime" }]));
    assert_eq!(detail["title"], "Avocado Lime Cheese cake");

    // Embedded objects are not accepted on write.
    let (status, _) = app
        .post(
            "/recipes/",
            ALICE,
            json!({
                "title": "Nested",
                "time_minutes": 1,
                "price": 1,
                "tags": [{ "id": vegan, "name": "Vegan" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_related_ids_are_rejected() {
    let app = test_app().await;
    let bobs_tag = app.create_tag(BOB, "Secret").await;

    let (status, body) = app
        .post(
            "/recipes/",
            ALICE,
            json!({ "title": "Stolen", "time_minutes": 5, "price": 1, "tags": [bobs_tag] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("tags:"));

    let (status, body) = app
        .post(
            "/recipes/",
            ALICE,
            json!({ "title": "Ghost", "time_minutes": 5, "price": 1, "ingredients": [9999] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("ingredients:"));

    let (_, recipes) = app.get("/recipes/", ALICE).await;
    assert_eq!(recipes, json!([]));
}

#[tokio::test]
async fn test_partial_update_recipe() {
    let app = test_app().await;
    let old_tag = app.create_tag(ALICE, "Main course").await;
    let new_tag = app.create_tag(ALICE, "Curry").await;
    let recipe_id = app.create_recipe(ALICE, json!({ "tags": [old_tag] })).await;

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/recipes/{recipe_id}/"),
            Some(ALICE),
            Some(json!({ "title": "Chicken Tikka", "tags": [new_tag] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Chicken Tikka");
    assert_eq!(body["tags"], json!([new_tag]));
    assert_eq!(body["time_minutes"], 10);

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/recipes/{recipe_id}/"),
            Some(ALICE),
            Some(json!({ "price": 7.5 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["price"], 7.5);
    assert_eq!(body["tags"], json!([new_tag]));
}

#[tokio::test]
async fn test_full_update_recipe() {
    let app = test_app().await;
    let tag = app.create_tag(ALICE, "Main course").await;
    let recipe_id = app
        .create_recipe(ALICE, json!({ "tags": [tag], "link": "https://example.com" }))
        .await;

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/recipes/{recipe_id}"),
            Some(ALICE),
            Some(json!({ "title": "Hakka Noodles", "time_minutes": 25, "price": 50 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Hakka Noodles");
    assert_eq!(body["time_minutes"], 25);
    assert_eq!(body["price"], 50.0);
    assert_eq!(body["link"], "");
    assert_eq!(body["tags"], json!([]));

    let (status, _) = app
        .send(
            Method::PUT,
            &format!("/recipes/{recipe_id}"),
            Some(ALICE),
            Some(json!({ "title": "Missing price", "time_minutes": 25 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recipes_limited_to_user_newest_first() {
    let app = test_app().await;
    app.create_recipe(BOB, json!({})).await;
    let first = app.create_recipe(ALICE, json!({ "title": "First" })).await;
    let second = app.create_recipe(ALICE, json!({ "title": "Second" })).await;

    let (status, body) = app.get("/recipes/", ALICE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![second, first]);
    // Listings reference related records by id.
    assert_eq!(body[0]["tags"], json!([]));
}

#[tokio::test]
async fn test_filter_recipes_by_tags_and_ingredients() {
    let app = test_app().await;
    let t1 = app.create_tag(ALICE, "Vegan").await;
    let t2 = app.create_tag(ALICE, "Quick").await;
    let t3 = app.create_tag(ALICE, "Meat").await;
    let cheese = app.create_ingredient(ALICE, "Cheese").await;
    let chicken = app.create_ingredient(ALICE, "Chicken").await;

    let r1 = app
        .create_recipe(ALICE, json!({ "tags": [t1, t2], "ingredients": [cheese] }))
        .await;
    let r2 = app
        .create_recipe(ALICE, json!({ "tags": [t3], "ingredients": [chicken] }))
        .await;
    let r3 = app.create_recipe(ALICE, json!({})).await;

    let (status, body) = app.get(&format!("/recipes/?tags={t1}"), ALICE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![r1]);

    let (_, body) = app.get(&format!("/recipes/?tags={t1},{t2},{t3}"), ALICE).await;
    assert_eq!(ids(&body), vec![r2, r1]);

    let (_, body) = app.get(&format!("/recipes/?ingredients={chicken}"), ALICE).await;
    assert_eq!(ids(&body), vec![r2]);

    let (_, body) = app
        .get(&format!("/recipes/?tags={t1},{t3}&ingredients={cheese}"), ALICE)
        .await;
    assert_eq!(ids(&body), vec![r1]);

    let (_, body) = app.get("/recipes/?tags=", ALICE).await;
    assert_eq!(ids(&body), vec![r3, r2, r1]);

    let (status, _) = app.get("/recipes/?tags=abc", ALICE).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assigned_only_tags() {
    let app = test_app().await;
    let used = app.create_tag(ALICE, "Breakfast").await;
    app.create_tag(ALICE, "Lunch").await;
    app.create_recipe(ALICE, json!({ "tags": [used] })).await;
    app.create_recipe(ALICE, json!({ "tags": [used] })).await;

    let (_, body) = app.get("/tags/?assigned_only=1", ALICE).await;
    assert_eq!(names(&body), vec!["Breakfast"]);

    let (_, body) = app.get("/tags/", ALICE).await;
    assert_eq!(names(&body), vec!["Lunch", "Breakfast"]);
}

#[tokio::test]
async fn test_deleting_tag_unlinks_it_from_recipes() {
    let app = test_app().await;
    let keep = app.create_tag(ALICE, "Keep").await;
    let drop = app.create_tag(ALICE, "Drop").await;
    let recipe_id = app.create_recipe(ALICE, json!({ "tags": [keep, drop] })).await;

    let (status, _) = app.send(Method::DELETE, &format!("/tags/{drop}"), Some(ALICE), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, detail) = app.get(&format!("/recipes/{recipe_id}"), ALICE).await;
    assert_eq!(detail["tags"], json!([{ "id": keep, "name": "Keep" }]));
}

#[tokio::test]
async fn test_upload_image_to_recipe() {
    let app = test_app().await;
    let recipe_id = app.create_recipe(ALICE, json!({})).await;

    let (status, body) = app.upload(recipe_id, ALICE, "image", &sample_png()).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["id"], recipe_id);
    let image_url = body["image"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/media/uploads/recipe/"));
    assert!(app.image_path(&image_url).exists());

    // The stored file is served back under the media URL.
    let request = Request::builder().uri(&image_url).body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Replacing the image removes the previous file.
    let (status, body) = app.upload(recipe_id, ALICE, "image", &sample_png()).await;
    assert_eq!(status, StatusCode::OK);
    let replacement = body["image"].as_str().unwrap();
    assert_ne!(replacement, image_url);
    assert!(!app.image_path(&image_url).exists());
    assert!(app.image_path(replacement).exists());
}

#[tokio::test]
async fn test_upload_invalid_image_keeps_previous() {
    let app = test_app().await;
    let recipe_id = app.create_recipe(ALICE, json!({})).await;

    let (status, body) = app.upload(recipe_id, ALICE, "image", &sample_png()).await;
    assert_eq!(status, StatusCode::OK);
    let original_url = body["image"].as_str().unwrap().to_string();
    let before = RecipeService::get_recipe(&app.db, recipe_id, ALICE).await.unwrap();

    let (status, body) = app.upload(recipe_id, ALICE, "image", b"not img2").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("image:"));

    let (status, _) = app.upload(recipe_id, ALICE, "picture", &sample_png()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let after = RecipeService::get_recipe(&app.db, recipe_id, ALICE).await.unwrap();
    assert_eq!(after.image, before.image);
    assert!(app.image_path(&original_url).exists());

    let upload_dir = app.media_root.path().join("uploads/recipe");
    assert_eq!(std::fs::read_dir(upload_dir).unwrap().count(), 1);
}

#[tokio::test]
async fn test_oversized_upload_is_payload_too_large() {
    let app = test_app_with(|config| config.max_upload_bytes = 1024).await;
    let recipe_id = app.create_recipe(ALICE, json!({})).await;

    let (status, body) = app.upload(recipe_id, ALICE, "image", &[0u8; 4096]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(body["error"].is_string());

    let stored = RecipeService::get_recipe(&app.db, recipe_id, ALICE).await.unwrap();
    assert!(stored.image.is_none());
}

#[tokio::test]
async fn test_delete_recipe_removes_image() {
    let app = test_app().await;
    let recipe_id = app.create_recipe(ALICE, json!({})).await;
    let (_, body) = app.upload(recipe_id, ALICE, "image", &sample_png()).await;
    let image_url = body["image"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(Method::DELETE, &format!("/recipes/{recipe_id}/"), Some(ALICE), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!app.image_path(&image_url).exists());

    let (status, _) = app.get(&format!("/recipes/{recipe_id}/"), ALICE).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
