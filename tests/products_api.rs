mod common;

use axum::http::{Method, StatusCode};
use common::{ADMIN, JOHN, spawn_app};
use rstest::rstest;
use serde_json::{Value, json};

fn names(page: &Value) -> Vec<&str> {
    page["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|product| product["name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn listing_only_shows_stock_above_ten() {
    let app = spawn_app().await;

    let (status, body) = app.get("/products/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "List products successfully");
    assert_eq!(body["data"]["count"], 1);
    assert_eq!(names(&body["data"]), ["Product 2"]);
    assert_eq!(body["data"]["results"][0]["price"], "50.00");
    assert_eq!(body["data"]["results"][0]["in_stock"], true);
}

#[tokio::test]
async fn all_and_info_ignore_the_stock_predicate() {
    let app = spawn_app().await;

    let (status, body) = app.get("/products/all/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, body) = app.get("/products/info/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 3);
    assert_eq!(body["data"]["max_price"], "100.00");
}

#[tokio::test]
async fn product_writes_need_staff() {
    let app = spawn_app().await;
    let product = json!({ "name": "Lamp", "price": "12.50", "stock": 40 });

    let (status, _) = app
        .send(Method::POST, "/products/", None, Some(product.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(Method::POST, "/products/", Some(JOHN), Some(product.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, "/products/", Some(ADMIN), Some(product))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["price"], "12.50");
    assert_eq!(body["data"]["description"], "");
}

#[rstest]
#[case(json!({ "name": "Lamp", "price": "0", "stock": 1 }), "price")]
#[case(json!({ "name": "Lamp", "price": "-3.00", "stock": 1 }), "price")]
#[case(json!({ "name": "Lamp", "price": "1.999", "stock": 1 }), "price")]
#[case(json!({ "name": "Lamp", "price": "1.00", "stock": -1 }), "stock")]
#[case(json!({ "name": "   ", "price": "1.00", "stock": 1 }), "name")]
#[case(json!({ "price": "1.00", "stock": 1 }), "name")]
#[case(json!({ "name": "Lamp", "price": "abc", "stock": 1 }), "price")]
#[case(json!({ "name": "Lamp", "price": "1.00", "stock": "many" }), "stock")]
#[case(json!({ "name": ["Lamp"], "price": "1.00", "stock": 1 }), "name")]
#[tokio::test]
async fn invalid_products_are_rejected_per_field(#[case] product: Value, #[case] field: &str) {
    let app = spawn_app().await;

    let (status, body) = app
        .send(Method::POST, "/products/", Some(ADMIN), Some(product))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"][field].is_array(), "{body}");
    assert_eq!(body["data"], Value::Null);
}

#[tokio::test]
async fn put_replaces_and_patch_updates() {
    let app = spawn_app().await;
    let id = app.seed.product_ids[2];
    let uri = format!("/products/{id}/");

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(ADMIN), Some(json!({ "stock": 11 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 11);
    assert_eq!(body["data"]["name"], "Product 3");

    let (status, body) = app
        .send(Method::PUT, &uri, Some(ADMIN), Some(json!({ "stock": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["name"].is_array());

    let (status, body) = app
        .send(
            Method::PUT,
            &uri,
            Some(ADMIN),
            Some(json!({ "name": "Renamed", "price": "31.00", "stock": 12 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Renamed");
    assert_eq!(body["data"]["description"], "");

    let (_, body) = app.get("/products/?ordering=name", None).await;
    assert_eq!(names(&body["data"]), ["Product 2", "Renamed"]);
}

#[tokio::test]
async fn deleting_a_product_drops_its_order_items() {
    let app = spawn_app().await;
    let id = app.seed.product_ids[0];
    assert_eq!(app.store.order_item_count(), 2);

    let (status, body) = app
        .send(Method::DELETE, &format!("/products/{id}/"), Some(ADMIN), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    assert_eq!(app.store.order_item_count(), 1);

    let (status, _) = app.get(&format!("/products/{id}/"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, order) = app
        .get(&format!("/orders/{}/", app.seed.order_id), Some(JOHN))
        .await;
    assert_eq!(order["data"]["total_price"], "50.00");
}

#[tokio::test]
async fn pagination_reports_neighbours_and_rejects_bad_pages() {
    let app = spawn_app().await;
    for n in 0..3 {
        let (status, _) = app
            .send(
                Method::POST,
                "/products/",
                Some(ADMIN),
                Some(json!({ "name": format!("Extra {n}"), "price": "5.00", "stock": 50 })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.get("/products/?pgnum=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 4);
    assert_eq!(body["data"]["previous"], 1);
    assert_eq!(body["data"]["next"], Value::Null);
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 2);

    let (_, body) = app.get("/products/?pgsize=3", None).await;
    assert_eq!(body["data"]["next"], 2);
    assert_eq!(body["data"]["results"].as_array().unwrap().len(), 3);

    for uri in ["/products/?pgnum=3", "/products/?pgnum=0", "/products/?pgnum=abc"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["message"], "Invalid page.");
    }
}

#[rstest]
#[case("/products/?price__lt=60&pgsize=10", &["Product 2", "Cheap"])]
#[case("/products/?price__gt=10&pgsize=10", &["Product 2"])]
#[case("/products/?price__range=1,50&ordering=-price&pgsize=10", &["Product 2", "Cheap"])]
#[case("/products/?name__contains=Chea", &["Cheap"])]
#[case("/products/?search=cheap%20LAMP", &["Cheap"])]
#[case("/products/?ordering=-stock,name&pgsize=10", &["Cheap", "Product 2"])]
#[tokio::test]
async fn listing_filters_compose(#[case] uri: &str, #[case] expected: &[&str]) {
    let app = spawn_app().await;
    app.send(
        Method::POST,
        "/products/",
        Some(ADMIN),
        Some(json!({
            "name": "Cheap",
            "description": "A desk lamp",
            "price": "9.99",
            "stock": 30
        })),
    )
    .await;

    let (status, body) = app.get(uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body["data"]), expected);
}

#[tokio::test]
async fn malformed_price_filter_is_a_bad_request() {
    let app = spawn_app().await;

    let (status, body) = app.get("/products/?price__lt=cheap", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["price__lt"].is_array());
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = spawn_app().await;

    let (status, body) = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/products/"].is_object());
    assert!(body["paths"]["/orders/{order_id}/"].is_object());
}

#[tokio::test]
async fn mistyped_patch_fields_are_field_errors() {
    let app = spawn_app().await;
    let uri = format!("/products/{}/", app.seed.product_ids[0]);

    let (status, body) = app
        .send(Method::PATCH, &uri, Some(ADMIN), Some(json!({ "price": "abc" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["price"], json!(["A valid number is required."]));

    let (_, body) = app.get(&uri, None).await;
    assert_eq!(body["data"]["price"], "100.00");
}

#[rstest]
#[case(Method::GET, "/products/abc/")]
#[case(Method::PATCH, "/products/abc/")]
#[case(Method::DELETE, "/products/99999999999/")]
#[tokio::test]
async fn malformed_product_ids_are_not_found(#[case] method: Method, #[case] uri: &str) {
    let app = spawn_app().await;
    let body = (method == Method::PATCH).then(|| json!({ "stock": 1 }));

    let (status, body) = app.send(method, uri, Some(ADMIN), body).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["data"], Value::Null);
    assert!(body["message"].is_string());
}
