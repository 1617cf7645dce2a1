use std::{path::PathBuf, sync::Arc};

use chrono::Duration;
use serde_json::{json, Value};
use warp::http::StatusCode;

use crate::{
    cache::cache::memory::MemorySessionCache,
    config::Config,
    context::Context,
    database::memory::MemoryStore,
    document::render::{
        testing::{media_root, page_text, FONT},
        Renderer,
    },
    jwt::TokenSigner,
    schema::{Id, ShoppingItem},
};

use super::routes::routes;

const GIF: &str = "data:image/gif;base64,R0lGODlhAQABAIAAAAAAAP///yH5BAEAAAAALAAAAAABAAEAAAIBRAA7";

struct TestApp {
    store: Arc<MemoryStore>,
    context: Context,
    root: PathBuf,
}

struct Reply {
    status: StatusCode,
    headers: warp::http::HeaderMap,
    bytes: Vec<u8>,
}

impl Reply {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap_or(Value::Null)
    }
}

fn app() -> TestApp {
    let root = media_root("api");
    let config = Config {
        port: 0,
        database_url: String::new(),
        database_max_connections: 1,
        redis_url: String::new(),
        secret: b"test secret".to_vec(),
        token_hours: 1,
        media_root: root.clone(),
        site_name: String::from("foodgram"),
        site_url: String::from("http://testserver"),
        pdf_font: String::from(FONT),
    };
    let renderer = Renderer::new(&config.pdf_font, &config.site_name, &config.media_root).unwrap();
    let signer = TokenSigner::new(&config.secret, Duration::hours(1)).unwrap();
    let store = Arc::new(MemoryStore::default());

    let context = Context::new(
        store.clone(),
        Arc::new(MemorySessionCache::default()),
        signer,
        renderer,
        config,
    );

    TestApp {
        store,
        context,
        root,
    }
}

impl TestApp {
    async fn send(&self, method: &str, path: &str, token: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = warp::test::request().method(method).path(path);
        if let Some(token) = token {
            request = request.header("authorization", format!("Token {token}"));
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.reply(&routes(self.context.clone())).await;
        Reply {
            status: response.status(),
            headers: response.headers().clone(),
            bytes: response.body().to_vec(),
        }
    }

    async fn register(&self, username: &str) -> (Id, String) {
        let email = format!("{username}@example.com");
        let reply = self
            .send(
                "POST",
                "/api/users/",
                None,
                Some(json!({
                    "email": email,
                    "username": username,
                    "first_name": "Test",
                    "last_name": "Cook",
                    "password": "long enough password",
                })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.json());
        let id = reply.json()["id"].as_i64().unwrap() as Id;

        (id, self.login(&email).await)
    }

    async fn login(&self, email: &str) -> String {
        let reply = self
            .send(
                "POST",
                "/api/auth/token/login/",
                None,
                Some(json!({ "email": email, "password": "long enough password" })),
            )
            .await;
        assert_eq!(reply.status, StatusCode::OK);
        reply.json()["auth_token"].as_str().unwrap().to_string()
    }

    async fn create_recipe(&self, token: &str, body: Value) -> Id {
        let reply = self.send("POST", "/api/recipes/", Some(token), Some(body)).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.json());
        reply.json()["id"].as_i64().unwrap() as Id
    }
}

fn recipe_body(name: &str, ingredients: &[(Id, i32)], tags: &[Id], cooking_time: i32) -> Value {
    let ingredients: Vec<Value> = ingredients
        .iter()
        .map(|(id, amount)| json!({ "id": id, "amount": amount }))
        .collect();

    json!({
        "ingredients": ingredients,
        "tags": tags,
        "image": GIF,
        "name": name,
        "text": "Mix everything.",
        "cooking_time": cooking_time,
    })
}

#[tokio::test]
async fn register_login_and_logout() {
    let app = app();
    let (id, token) = app.register("alice").await;

    let me = app.send("GET", "/api/users/me/", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.json()["id"], json!(id));
    assert_eq!(me.json()["is_subscribed"], json!(false));

    let logout = app
        .send("POST", "/api/auth/token/logout/", Some(&token), None)
        .await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);

    let me = app.send("GET", "/api/users/me/", Some(&token), None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);

    let anonymous = app.send("GET", "/api/users/me", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_credentials_and_tokens() {
    let app = app();
    app.register("alice").await;

    let login = app
        .send(
            "POST",
            "/api/auth/token/login/",
            None,
            Some(json!({ "email": "alice@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::BAD_REQUEST);

    let listing = app.send("GET", "/api/recipes/", Some("garbage"), None).await;
    assert_eq!(listing.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_rejects_banned_and_duplicate_users() {
    let app = app();
    app.register("alice").await;

    let banned = app
        .send(
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "boss@example.com",
                "username": "Admin",
                "first_name": "Big",
                "last_name": "Boss",
                "password": "long enough password",
            })),
        )
        .await;
    assert_eq!(banned.status, StatusCode::BAD_REQUEST);
    assert!(banned.json()["username"].is_array());

    let duplicate = app
        .send(
            "POST",
            "/api/users/",
            None,
            Some(json!({
                "email": "ALICE@example.com",
                "username": "alice2",
                "first_name": "Alice",
                "last_name": "Again",
                "password": "long enough password",
            })),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
    assert!(duplicate.json()["email"].is_array());

    // The single stored account answers to any casing of its email.
    assert!(!app.login("Alice@Example.COM").await.is_empty());
}

#[tokio::test]
async fn set_password_checks_the_current_one() {
    let app = app();
    let (_, token) = app.register("alice").await;

    let wrong = app
        .send(
            "POST",
            "/api/users/set_password/",
            Some(&token),
            Some(json!({ "new_password": "another long one", "current_password": "nope" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    assert!(wrong.json()["current_password"].is_array());

    let changed = app
        .send(
            "POST",
            "/api/users/set_password/",
            Some(&token),
            Some(json!({
                "new_password": "another long one",
                "current_password": "long enough password",
            })),
        )
        .await;
    assert_eq!(changed.status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn tags_and_ingredient_search() {
    let app = app();
    let breakfast = app.store.add_tag("Breakfast", "breakfast");
    app.store.add_ingredient("Flour", "g");
    app.store.add_ingredient("flaxseed", "g");
    app.store.add_ingredient("sugar", "g");

    let tags = app.send("GET", "/api/tags/", None, None).await;
    assert_eq!(tags.json(), json!([{ "id": breakfast, "name": "Breakfast", "slug": "breakfast" }]));

    let missing = app.send("GET", "/api/tags/999/", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json(), json!({ "detail": "Not found." }));

    let found = app.send("GET", "/api/ingredients/?name=FL", None, None).await.json();
    let names: Vec<&str> = found
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Flour", "flaxseed"]);
}

#[tokio::test]
async fn recipe_create_and_read() {
    let app = app();
    let (_, token) = app.register("alice").await;
    let lunch = app.store.add_tag("Lunch", "lunch");
    let flour = app.store.add_ingredient("flour", "g");

    let id = app
        .create_recipe(&token, recipe_body("Pancakes", &[(flour, 200)], &[lunch, lunch], 15))
        .await;

    let reply = app.send("GET", &format!("/api/recipes/{id}/"), None, None).await;
    assert_eq!(reply.status, StatusCode::OK);

    let recipe = reply.json();
    assert_eq!(recipe["name"], json!("Pancakes"));
    assert_eq!(recipe["author"]["username"], json!("alice"));
    assert_eq!(recipe["tags"].as_array().unwrap().len(), 1);
    assert_eq!(
        recipe["ingredients"],
        json!([{ "id": flour, "name": "flour", "measurement_unit": "g", "amount": 200 }])
    );
    assert_eq!(recipe["is_favorited"], json!(false));

    let image = recipe["image"].as_str().unwrap();
    assert!(image.starts_with("http://testserver/media/recipes/images/"));

    let relative = image.trim_start_matches("http://testserver/media/");
    let served = app.send("GET", &format!("/media/{relative}"), None, None).await;
    assert_eq!(served.status, StatusCode::OK);
    assert!(served.bytes.starts_with(b"GIF89a"));
}

#[tokio::test]
async fn recipe_validation_errors() {
    let app = app();
    let (_, token) = app.register("alice").await;
    let flour = app.store.add_ingredient("flour", "g");

    let anonymous = app
        .send("POST", "/api/recipes/", None, Some(recipe_body("Soup", &[(flour, 1)], &[], 5)))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let unknown = app
        .send(
            "POST",
            "/api/recipes/",
            Some(&token),
            Some(recipe_body("Soup", &[(flour, 1), (4242, 1)], &[777], 0)),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);

    let body = unknown.json();
    assert!(body["ingredients"][0].as_str().unwrap().contains("4242"));
    assert!(body["tags"][0].as_str().unwrap().contains("777"));
    assert!(body["cooking_time"].is_array());

    let mut no_image = recipe_body("Soup", &[(flour, 1)], &[], 5);
    no_image["image"] = json!("not an image");
    let reply = app.send("POST", "/api/recipes/", Some(&token), Some(no_image)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(reply.json()["image"].is_array());
}

#[tokio::test]
async fn only_authors_and_staff_modify_recipes() {
    let app = app();
    let (_, alice) = app.register("alice").await;
    let (bob_id, bob) = app.register("bob").await;
    let flour = app.store.add_ingredient("flour", "g");
    let eggs = app.store.add_ingredient("eggs", "pcs");

    let id = app
        .create_recipe(&alice, recipe_body("Pancakes", &[(flour, 200)], &[], 15))
        .await;
    let path = format!("/api/recipes/{id}/");

    let forbidden = app
        .send("PATCH", &path, Some(&bob), Some(json!({ "name": "Mine now" })))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let forbidden = app.send("DELETE", &path, Some(&bob), None).await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let missing = app
        .send("PATCH", "/api/recipes/999/", Some(&alice), Some(json!({ "name": "x" })))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let patched = app
        .send("PATCH", &path, Some(&alice), Some(json!({ "cooking_time": 20 })))
        .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.json()["cooking_time"], json!(20));
    assert_eq!(patched.json()["name"], json!("Pancakes"));
    assert_eq!(patched.json()["ingredients"][0]["amount"], json!(200));

    let mut replacement = recipe_body("Omelette", &[(eggs, 3)], &[], 10);
    replacement.as_object_mut().unwrap().remove("image");
    let replaced = app.send("PUT", &path, Some(&alice), Some(replacement)).await;
    assert_eq!(replaced.status, StatusCode::OK);
    assert_eq!(replaced.json()["ingredients"][0]["name"], json!("eggs"));

    app.store.promote(bob_id);
    let staff = app.login("bob@example.com").await;
    let patched = app
        .send("PATCH", &path, Some(&staff), Some(json!({ "name": "Moderated" })))
        .await;
    assert_eq!(patched.status, StatusCode::OK);

    let image = app.store.image_of(id).unwrap();
    assert!(app.root.join(&image).exists());

    let deleted = app.send("DELETE", &path, Some(&alice), None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert!(!app.root.join(&image).exists());

    let gone = app.send("GET", &path, None, None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorites_and_cart_are_sets() {
    let app = app();
    let (_, token) = app.register("alice").await;
    let flour = app.store.add_ingredient("flour", "g");
    let id = app
        .create_recipe(&token, recipe_body("Bread", &[(flour, 500)], &[], 60))
        .await;

    for action in ["favorite", "shopping_cart"] {
        let path = format!("/api/recipes/{id}/{action}/");

        let first = app.send("POST", &path, Some(&token), None).await;
        assert_eq!(first.status, StatusCode::CREATED);
        assert_eq!(first.json()["name"], json!("Bread"));

        let second = app.send("POST", &path, Some(&token), None).await;
        assert_eq!(second.status, StatusCode::BAD_REQUEST);

        let removed = app.send("DELETE", &path, Some(&token), None).await;
        assert_eq!(removed.status, StatusCode::NO_CONTENT);

        let absent = app.send("DELETE", &path, Some(&token), None).await;
        assert_eq!(absent.status, StatusCode::BAD_REQUEST);

        let missing = app
            .send("POST", &format!("/api/recipes/999/{action}/"), Some(&token), None)
            .await;
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let anonymous = app.send("POST", &path, None, None).await;
        assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    }

    app.send("POST", &format!("/api/recipes/{id}/favorite/"), Some(&token), None)
        .await;
    let recipe = app
        .send("GET", &format!("/api/recipes/{id}/"), Some(&token), None)
        .await;
    assert_eq!(recipe.json()["is_favorited"], json!(true));
    assert_eq!(recipe.json()["is_in_shopping_cart"], json!(false));
}

#[tokio::test]
async fn shopping_cart_downloads_as_pdf() {
    let app = app();
    let (alice_id, token) = app.register("alice").await;
    let flour = app.store.add_ingredient("flour", "g");
    let eggs = app.store.add_ingredient("eggs", "pcs");

    let a = app
        .create_recipe(&token, recipe_body("A", &[(flour, 200), (eggs, 2)], &[], 10))
        .await;
    let b = app
        .create_recipe(&token, recipe_body("B", &[(flour, 300)], &[], 10))
        .await;
    for id in [a, b] {
        let reply = app
            .send("POST", &format!("/api/recipes/{id}/shopping_cart/"), Some(&token), None)
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
    }

    let list = app.context.store.shopping_list(alice_id).await.unwrap();
    assert_eq!(
        list,
        vec![
            ShoppingItem {
                name: String::from("eggs"),
                total_amount: 2,
                measurement_unit: String::from("pcs"),
            },
            ShoppingItem {
                name: String::from("flour"),
                total_amount: 500,
                measurement_unit: String::from("g"),
            },
        ]
    );

    let reply = app
        .send("GET", "/api/recipes/download_shopping_cart/", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers["content-type"], "application/pdf");
    assert_eq!(
        reply.headers["content-disposition"],
        "attachment; filename=\"alice_shopping_list.pdf\""
    );
    assert_eq!(lopdf::Document::load_mem(&reply.bytes).unwrap().get_pages().len(), 1);
    assert!(app.root.join("shopping_lists/alice_shopping_list.pdf").exists());

    let anonymous = app
        .send("GET", "/api/recipes/download_shopping_cart/", None, None)
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn shopping_list_keeps_cyrillic_names() {
    let app = app();
    let (_, token) = app.register("alice").await;
    let flour = app.store.add_ingredient("мука", "г");
    let id = app
        .create_recipe(&token, recipe_body("Блины", &[(flour, 200)], &[], 20))
        .await;
    app.send("POST", &format!("/api/recipes/{id}/shopping_cart/"), Some(&token), None)
        .await;

    let reply = app
        .send("GET", "/api/recipes/download_shopping_cart/", Some(&token), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);

    let lines = page_text(&reply.bytes, 1);
    assert_eq!(lines[0], "Shopping list for alice (foodgram)");
    assert_eq!(lines[1], "мука - 200 г");
}

#[tokio::test]
async fn single_recipe_downloads_as_pdf() {
    let app = app();
    let (_, token) = app.register("alice").await;
    let flour = app.store.add_ingredient("flour", "g");
    let id = app
        .create_recipe(&token, recipe_body("Bread", &[(flour, 500)], &[], 60))
        .await;

    let reply = app
        .send("GET", &format!("/api/recipes/{id}/download/"), None, None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.bytes.starts_with(b"%PDF"));
    assert!(app.root.join(format!("recipes/{id}_recipe.pdf")).exists());

    let missing = app.send("GET", "/api/recipes/999/download/", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subscriptions() {
    let app = app();
    let (alice_id, alice) = app.register("alice").await;
    let (bob_id, bob) = app.register("bob").await;
    let flour = app.store.add_ingredient("flour", "g");
    for name in ["One", "Two", "Three", "Four"] {
        app.create_recipe(&bob, recipe_body(name, &[(flour, 1)], &[], 5))
            .await;
    }

    let own = app
        .send("POST", &format!("/api/users/{alice_id}/subscribe/"), Some(&alice), None)
        .await;
    assert_eq!(own.status, StatusCode::BAD_REQUEST);

    let path = format!("/api/users/{bob_id}/subscribe/");
    let first = app.send("POST", &path, Some(&alice), None).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.json()["recipes_count"], json!(4));
    assert_eq!(first.json()["recipes"].as_array().unwrap().len(), 3);
    assert_eq!(first.json()["is_subscribed"], json!(true));

    let again = app.send("POST", &path, Some(&alice), None).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    let missing = app
        .send("POST", "/api/users/999/subscribe/", Some(&alice), None)
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let listing = app
        .send("GET", "/api/users/subscriptions/?recipes_limit=1", Some(&alice), None)
        .await;
    assert_eq!(listing.status, StatusCode::OK);
    assert_eq!(listing.json()["count"], json!(1));
    assert_eq!(listing.json()["results"][0]["recipes"].as_array().unwrap().len(), 1);

    let profile = app
        .send("GET", &format!("/api/users/{bob_id}/"), Some(&alice), None)
        .await;
    assert_eq!(profile.json()["is_subscribed"], json!(true));

    let removed = app.send("DELETE", &path, Some(&alice), None).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let absent = app.send("DELETE", &path, Some(&alice), None).await;
    assert_eq!(absent.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn recipe_filters_and_pagination() {
    let app = app();
    let (alice_id, alice) = app.register("alice").await;
    let (_, bob) = app.register("bob").await;
    let lunch = app.store.add_tag("Lunch", "lunch");
    let dinner = app.store.add_tag("Dinner", "dinner");
    let flour = app.store.add_ingredient("flour", "g");

    app.create_recipe(&alice, recipe_body("Quick soup", &[(flour, 1)], &[lunch], 10))
        .await;
    app.create_recipe(&alice, recipe_body("Slow stew", &[(flour, 1)], &[dinner], 120))
        .await;
    app.create_recipe(&bob, recipe_body("Soup of the day", &[(flour, 1)], &[lunch, dinner], 30))
        .await;

    let soups = app.send("GET", "/api/recipes/?title=SOUP", None, None).await;
    assert_eq!(soups.json()["count"], json!(2));

    let by_alice = app
        .send("GET", &format!("/api/recipes/?author={alice_id}&tags=dinner"), None, None)
        .await;
    assert_eq!(by_alice.json()["count"], json!(1));
    assert_eq!(by_alice.json()["results"][0]["name"], json!("Slow stew"));

    let any_tag = app
        .send("GET", "/api/recipes/?tags=lunch&tags=dinner", None, None)
        .await;
    assert_eq!(any_tag.json()["count"], json!(3));

    let bounded = app
        .send("GET", "/api/recipes/?cooking_time_min=10&cooking_time_max=30&limit=1", None, None)
        .await;
    let body = bounded.json();
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["previous"], Value::Null);
    let next = body["next"].as_str().unwrap();
    assert!(next.starts_with("http://testserver/api/recipes/?"));
    assert!(next.contains("cooking_time_min=10"));
    assert!(next.contains("page=2"));

    let beyond = app.send("GET", "/api/recipes/?page=9", None, None).await;
    assert_eq!(beyond.status, StatusCode::NOT_FOUND);
    assert_eq!(beyond.json(), json!({ "detail": "Invalid page." }));

    for page in ["0", "-1", "9223372036854775807", "1537228672809129301"] {
        for path in ["/api/recipes/", "/api/users/"] {
            let reply = app.send("GET", &format!("{path}?page={page}"), None, None).await;
            assert_eq!(reply.status, StatusCode::NOT_FOUND, "{path}?page={page}");
            assert_eq!(reply.json(), json!({ "detail": "Invalid page." }));
        }
        let reply = app
            .send("GET", &format!("/api/users/subscriptions/?page={page}"), Some(&alice), None)
            .await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    let malformed = app.send("GET", "/api/recipes/?author=abc", None, None).await;
    assert_eq!(malformed.status, StatusCode::BAD_REQUEST);
    assert!(malformed.json()["author"].is_array());

    let newest = app.send("GET", "/api/recipes/", None, None).await;
    assert_eq!(newest.json()["results"][0]["name"], json!("Soup of the day"));
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = app();

    let reply = app.send("GET", "/api/nothing/", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = app.send("DELETE", "/api/tags/", None, None).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
}
