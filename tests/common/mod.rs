#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use tower::ServiceExt;

use crudbase::config::Settings;
use crudbase::core::CrudEngine;
use crudbase::migration::Migrator;
use crudbase::resources::{Car, CarCreate};
use crudbase::routes;
use crudbase::session::{BackendId, Session, SessionProvider};

pub const CARS_URI: &str = "/Template/api/v1/cars";

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Same as [`setup_test_db`], with `model` made unique so bulk inserts can conflict.
pub async fn setup_test_db_unique_model() -> Result<DatabaseConnection, DbErr> {
    let db = setup_test_db().await?;
    db.execute_unprepared("CREATE UNIQUE INDEX idx_cars_model ON cars (model)")
        .await?;
    Ok(db)
}

pub fn provider(db: DatabaseConnection) -> SessionProvider {
    SessionProvider::from_connections([(BackendId::Primary, db)])
}

pub async fn setup_provider() -> SessionProvider {
    provider(setup_test_db().await.expect("Failed to setup test database"))
}

pub fn setup_test_app(provider: SessionProvider) -> Router {
    routes::app(&Settings::default(), provider)
}

pub fn car(model: &str, year: i32) -> CarCreate {
    CarCreate {
        model: model.to_string(),
        year,
    }
}

/// Insert cars one by one inside `session`, returning them in insertion order.
pub async fn seed(session: &Session, cars: &[(&str, i32)]) -> Vec<Car> {
    let engine = CrudEngine::<Car>::new();
    let mut created = Vec::with_capacity(cars.len());
    for (model, year) in cars {
        created.push(
            engine
                .create(session, car(model, *year))
                .await
                .expect("Failed to seed car"),
        );
    }
    created
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(body).unwrap()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
