use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{
    CARS_URI, body_json, empty_request, json_request, send, setup_provider, setup_test_app,
};

use crudbase::config::Settings;
use crudbase::resources::Car;
use crudbase::routes;

async fn create(app: &axum::Router, model: &str, year: i32) -> Car {
    let response = send(
        app,
        json_request("POST", CARS_URI, &json!({"model": model, "year": year})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    serde_json::from_value(body_json(response).await).unwrap()
}

#[tokio::test]
async fn test_index_is_up() {
    let app = setup_test_app(setup_provider().await);

    let response = send(&app, empty_request("GET", "/Template/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"msg": "API is up"}));
}

#[tokio::test]
async fn test_openapi_document() {
    let app = setup_test_app(setup_provider().await);

    let response = send(&app, empty_request("GET", "/Template/openapi.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["components"]["schemas"]["Car"].is_object());
    assert!(doc["components"]["schemas"]["FilterSpec"].is_object());
}

#[tokio::test]
async fn test_create_get_and_list() {
    let app = setup_test_app(setup_provider().await);
    let civic = create(&app, "Civic", 2020).await;
    create(&app, "Golf", 2018).await;
    create(&app, "Polo", 2021).await;

    let response = send(&app, empty_request("GET", &format!("{CARS_URI}/{}", civic.id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let fetched: Car = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(fetched, civic);

    let response = send(&app, empty_request("GET", &format!("{CARS_URI}?skip=1&limit=2"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-range"], "cars 1-2/3");
    let page: Vec<Car> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].model, "Golf");
}

#[tokio::test]
async fn test_error_statuses() {
    let app = setup_test_app(setup_provider().await);

    let response = send(&app, empty_request("GET", &format!("{CARS_URI}/999"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, empty_request("DELETE", &format!("{CARS_URI}/999"))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, empty_request("GET", &format!("{CARS_URI}?skip=-1"))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        json_request("POST", CARS_URI, &json!({"model": "", "year": 1700})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("{CARS_URI}/search"),
            &json!([{"field": "year", "operator": "between", "value": [2000, 2010]}]),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains("between")
    );
}

#[tokio::test]
async fn test_partial_update_and_delete() {
    let app = setup_test_app(setup_provider().await);
    let civic = create(&app, "Civic", 2020).await;
    let uri = format!("{CARS_URI}/{}", civic.id);

    let response = send(&app, json_request("PUT", &uri, &json!({"year": 2021}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Car = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(updated.model, "Civic");
    assert_eq!(updated.year, 2021);

    let response = send(&app, empty_request("DELETE", &uri)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let removed: Car = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(removed, updated);

    let response = send(&app, empty_request("GET", &uri)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_batch_create_and_keyed_update() {
    let app = setup_test_app(setup_provider().await);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("{CARS_URI}/batch"),
            &json!([
                {"model": "Civic", "year": 2015},
                {"model": "Golf", "year": 2016},
                {"model": "Polo", "year": 2017}
            ]),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["inserted"], 3);

    let response = send(
        &app,
        json_request(
            "PUT",
            &format!("{CARS_URI}/batch?key=model"),
            &json!([
                {"model": "Civic", "year": 2001},
                {"model": "Beetle", "year": 2002},
                {"model": "Polo", "year": 2003}
            ]),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Vec<Car> = serde_json::from_value(body_json(response).await).unwrap();
    let pairs: Vec<_> = updated.iter().map(|c| (c.model.as_str(), c.year)).collect();
    assert_eq!(pairs, vec![("Civic", 2001), ("Polo", 2003)]);
}

#[tokio::test]
async fn test_search_and_last() {
    let app = setup_test_app(setup_provider().await);
    create(&app, "Civic", 2015).await;
    let newest_civic = create(&app, "Civic", 2022).await;
    create(&app, "Golf", 2022).await;

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("{CARS_URI}/search"),
            &json!([
                {"field": "year", "operator": ">=", "value": 2020},
                {"field": "model", "operator": "ilike", "value": "golf"}
            ]),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let found: Vec<Car> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].model, "Golf");

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("{CARS_URI}/last"),
            &json!({"model": {"operator": "==", "value": "Civic"}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let last: Car = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(last, newest_civic);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("{CARS_URI}/last"),
            &json!({"model": {"operator": "==", "value": "Beetle"}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_strict_payloads_reject_unknown_keys() {
    let settings = Settings {
        strict_payloads: true,
        ..Settings::default()
    };
    let app = routes::app(&settings, setup_provider().await);

    let response = send(
        &app,
        json_request(
            "POST",
            CARS_URI,
            &json!({"model": "Civic", "year": 2020, "colour": "red"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let lenient = setup_test_app(setup_provider().await);
    let response = send(
        &lenient,
        json_request(
            "POST",
            CARS_URI,
            &json!({"model": "Civic", "year": 2020, "colour": "red"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_batch_update_defaults_to_id_key() {
    let app = setup_test_app(setup_provider().await);
    let civic = create(&app, "Civic", 2015).await;

    let response = send(
        &app,
        json_request(
            "PUT",
            &format!("{CARS_URI}/batch"),
            &json!([
                {"id": civic.id, "model": "Civic", "year": 2001},
                {"id": civic.id + 100, "model": "Ghost", "year": 2002}
            ]),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Vec<Car> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].id, civic.id);
    assert_eq!(updated[0].year, 2001);
}

#[tokio::test]
async fn test_malformed_filter_bodies_are_bad_requests() {
    let app = setup_test_app(setup_provider().await);

    let response = send(
        &app,
        json_request(
            "POST",
            &format!("{CARS_URI}/search"),
            &json!([{"operator": "="}]),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(
        body_json(response).await["error"]
            .as_str()
            .unwrap()
            .starts_with("invalid filter body")
    );

    let response = send(
        &app,
        json_request("POST", &format!("{CARS_URI}/last"), &json!(["model"])),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
