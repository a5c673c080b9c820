use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::{app::build_app, memory::MemoryImageStore, state::AppState};

const BOUNDARY: &str = "offerbay-test-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File(name, content_type, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"f{i}\"\r\n\
                         Content-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn app() -> (Router, Arc<MemoryImageStore>) {
    let images = Arc::new(MemoryImageStore::default());
    (build_app(AppState::fake_with(images.clone(), false)), images)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn json_req(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut b = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(t) = token {
        b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    b.body(Body::from(body.to_string())).unwrap()
}

fn multipart_req(method: Method, uri: &str, token: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(multipart(parts)))
        .unwrap()
}

async fn signup(app: &Router, name: &str) -> String {
    let (status, body) = send(
        app,
        json_req(
            Method::POST,
            "/user/signup",
            None,
            json!({"username": name, "email": format!("{name}@example.com"), "password": "pw"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

async fn publish(app: &Router, token: &str, title: &str, price: &str) -> Value {
    let (status, body) = send(
        app,
        multipart_req(
            Method::POST,
            "/offer/publish",
            token,
            &[
                Part::Text("title", title),
                Part::Text("description", "Porté deux fois"),
                Part::Text("price", price),
                Part::Text("brand", "Kiabi"),
                Part::Text("city", "Nantes"),
                Part::File("picture", "image/jpeg", b"jpeg-bytes"),
                Part::File("picture", "image/png", b"png-bytes"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn signup_login_and_conflict() {
    let (app, _) = app();
    let (status, created) = send(
        &app,
        json_req(
            Method::POST,
            "/user/signup",
            None,
            json!({"username": "Zoé", "email": " Zoe@Mail.com ", "password": "secret", "newsletter": true}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["account"]["username"], "Zoé");
    assert!(created["account"]["avatar"].is_null());
    assert_eq!(created["token"].as_str().unwrap().len(), 64);
    assert!(created.get("password_hash").is_none());

    let (status, _) = send(
        &app,
        json_req(
            Method::POST,
            "/user/signup",
            None,
            json!({"username": "other", "email": "zoe@mail.com", "password": "x"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, logged) = send(
        &app,
        json_req(
            Method::POST,
            "/user/login",
            None,
            json!({"email": "ZOE@mail.com", "password": "secret"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logged["id"], created["id"]);
    assert_eq!(logged["token"], created["token"]);

    let (status, body) = send(
        &app,
        json_req(
            Method::POST,
            "/user/login",
            None,
            json!({"email": "zoe@mail.com", "password": "nope"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn signup_missing_field_is_bad_request() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        json_req(
            Method::POST,
            "/user/signup",
            None,
            json!({"username": "a", "password": "x"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing parameter: email");
}

#[tokio::test]
async fn signup_with_bad_avatar_type_is_415() {
    let (app, _) = app();
    let body = multipart(&[
        Part::Text("username", "pix"),
        Part::Text("email", "pix@example.com"),
        Part::Text("password", "pw"),
        Part::File("avatar", "image/tiff", b"tiff"),
    ]);
    let req = Request::builder()
        .method(Method::POST)
        .uri("/user/signup")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let (app, _) = app();
    let token = signup(&app, "alice").await;

    let cases = [
        None,
        Some("Token abc".to_string()),
        Some("Bearer ".to_string()),
        Some("Bearer not-a-real-token".to_string()),
        Some(format!("bearer {token}")),
    ];
    for auth in cases {
        let mut b = Request::builder().method(Method::POST).uri("/offer/publish");
        if let Some(a) = &auth {
            b = b.header(header::AUTHORIZATION, a);
        }
        let (status, body) = send(&app, b.body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{auth:?}");
        assert_eq!(body["error"], "Unauthorized");
    }
}

#[tokio::test]
async fn publish_and_fetch_round_trip() {
    let (app, images) = app();
    let token = signup(&app, "alice").await;
    let created = publish(&app, &token, "Robe d'été", "19.99").await;

    assert_eq!(created["title"], "Robe d'été");
    assert_eq!(created["price"], 19.99);
    assert_eq!(
        created["details"],
        json!([{"MARQUE": "Kiabi"}, {"EMPLACEMENT": "Nantes"}])
    );
    assert_eq!(created["images"].as_array().unwrap().len(), 2);
    assert_eq!(created["coverImage"], created["images"][0]);
    assert_eq!(created["images"][1]["format"], "png");
    assert_eq!(created["owner"], json!({"account": {"username": "alice", "avatar": null}}));
    assert_eq!(images.len().await, 2);

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = send(
        &app,
        Request::builder()
            .uri(format!("/offers/{id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn publish_without_pictures_is_rejected() {
    let (app, _) = app();
    let token = signup(&app, "alice").await;
    let (status, _) = send(
        &app,
        multipart_req(
            Method::POST,
            "/offer/publish",
            &token,
            &[Part::Text("title", "Pull"), Part::Text("price", "5")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn update_and_delete_flow_with_ownership() {
    let (app, images) = app();
    let alice = signup(&app, "alice").await;
    let bob = signup(&app, "bob").await;
    let created = publish(&app, &alice, "Veste", "40").await;
    let id = created["id"].as_str().unwrap().to_string();
    let cover_id = created["coverImage"]["externalId"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        json_req(Method::PUT, &format!("/offer/{id}"), Some(&bob), json!({"price": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let delete_list = serde_json::to_string(&[&cover_id]).unwrap();
    let (status, updated) = send(
        &app,
        multipart_req(
            Method::PUT,
            &format!("/offer/{id}"),
            &alice,
            &[
                Part::Text("price", "35"),
                Part::Text("color", "Noir"),
                Part::Text("deleteImages", &delete_list),
                Part::File("image", "image/gif", b"gif"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["price"], 35.0);
    assert_eq!(updated["details"], json!([{"COULEUR": "Noir"}]));
    let imgs = updated["images"].as_array().unwrap();
    assert_eq!(imgs.len(), 2);
    assert_eq!(imgs[0], created["images"][1]);
    assert_eq!(imgs[1]["format"], "gif");
    assert_eq!(updated["coverImage"], created["images"][1]);

    let (status, _) = send(
        &app,
        json_req(Method::PUT, &format!("/offer/{id}"), Some(&alice), json!({"price": "-3"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let del = |token: &str| {
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/offer/{id}"))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(&app, del(&bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, del(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Offer deleted");
    assert_eq!(images.len().await, 0);

    let (status, _) = send(&app, del(&alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_offer_id_is_bad_request() {
    let (app, _) = app();
    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/offers/12345")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn offers_listing_filters_sorts_and_paginates() {
    let (app, _) = app();
    let token = signup(&app, "alice").await;
    for i in 0..12 {
        publish(&app, &token, &format!("Chemise {i}"), &(100 - i).to_string()).await;
    }
    publish(&app, &token, "Pantalon", "3").await;

    let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

    let (status, body) = send(&app, get("/offers?title=chemise&sort=price-asc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 12);
    let prices: Vec<f64> = body["offers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["price"].as_f64().unwrap())
        .collect();
    assert_eq!(prices.len(), 10);
    assert!(prices.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(prices[0], 89.0);

    let (_, body) = send(&app, get("/offers?title=CHEMISE&page=2")).await;
    assert_eq!(body["offers"].as_array().unwrap().len(), 2);

    let (_, body) = send(&app, get("/offers?priceMin=95&priceMax=abc&sort=price-desc")).await;
    assert_eq!(body["count"], 6);
    assert_eq!(body["offers"][0]["price"], 100.0);

    let (_, body) = send(&app, get("/offers?page=zero")).await;
    assert_eq!(body["count"], 13);
    assert_eq!(body["offers"].as_array().unwrap().len(), 10);
    assert_eq!(body["offers"][0]["owner"]["account"]["username"], "alice");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (app, _) = app();
    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "This route does not exist");
}

#[tokio::test]
async fn huge_page_number_returns_empty_page() {
    let (app, _) = app();
    let token = signup(&app, "alice").await;
    publish(&app, &token, "Chemise", "10").await;

    let (status, body) = send(
        &app,
        Request::builder()
            .uri("/offers?page=9223372036854775807")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["offers"], json!([]));
}
