use axum::http::{Method, StatusCode};
use scopecrate::{
    ApiConfig, ApiMethods, ConfigError, EntityOptions, GenericController, OptionsRegistry,
};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;

mod common;
use common::{item_entity::Item, send, setup_test_app, setup_test_db};

const ITEM: &str = "/api/items/5d0a4f62-8b1a-4f0e-9d61-0c0ffee00001";

#[tokio::test]
async fn test_disabled_get_rejects_list_and_find() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(db, EntityOptions::new(ApiMethods::INSERT));

    for uri in ["/api/items", ITEM] {
        let (status, _, error) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error.unwrap(), json!({"error": "GET is disabled for items"}));
    }

    // POST is still open
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/items",
        None,
        Some(json!({"name": "Anvil", "category": "tools"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_disabled_get_wins_over_missing_read_scopes() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let options = EntityOptions::new(ApiMethods::INSERT)
        .authorize()
        .read_scopes(["items.read"]);
    let app = setup_test_app(db, options);

    for uri in ["/api/items", ITEM, "/api/items?select=cost"] {
        let (status, _, error) = send(&app, Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error.unwrap(), json!({"error": "GET is disabled for items"}));
    }
}

#[tokio::test]
async fn test_each_disabled_method_names_itself() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(db, EntityOptions::new(ApiMethods::NONE));
    let body = json!({"name": "Chisel", "category": "tools"});

    let cases = [
        (Method::POST, "/api/items", Some(body.clone()), "POST"),
        (Method::PUT, ITEM, Some(body), "PUT"),
        (Method::DELETE, ITEM, None, "DELETE"),
    ];
    for (method, uri, body, label) in cases {
        let (status, _, error) = send(&app, method, uri, None, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error.unwrap()["error"], format!("{label} is disabled for items"));
    }
}

#[tokio::test]
async fn test_disabled_method_wins_over_bad_request() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(db, EntityOptions::new(ApiMethods::GET));

    // Malformed id and missing body are never looked at
    let (status, _, error) = send(&app, Method::PUT, "/api/items/oops", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.unwrap()["error"], "PUT is disabled for items");

    let (status, _, error) = send(&app, Method::GET, "/api/items?range=oops", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error.unwrap()["error"], "Validation failed");
}

#[tokio::test]
async fn test_read_only_entity() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(db, EntityOptions::new(ApiMethods::GET));

    let (status, _, body) = send(&app, Method::GET, "/api/items", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap(), json!([]));

    let (status, _, _) = send(&app, Method::GET, ITEM, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&app, Method::DELETE, ITEM, None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_combined_method_flags() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(db, EntityOptions::new(ApiMethods::GET | ApiMethods::DELETE));

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/items",
        None,
        Some(json!({"name": "Rasp", "category": "tools"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app, Method::DELETE, ITEM, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_options_fail_construction() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let registry = OptionsRegistry::new();

    let result = GenericController::<Item, DatabaseConnection>::new(
        &registry,
        db,
        Arc::new(ApiConfig::default()),
    );
    match result {
        Err(err) => assert_eq!(
            err,
            ConfigError::MissingOptions {
                resource: "items".to_string()
            }
        ),
        Ok(_) => panic!("controller built without options"),
    }
}

#[tokio::test]
async fn test_duplicate_registration_is_rejected() {
    let mut registry = OptionsRegistry::new();
    registry
        .register::<Item>(EntityOptions::new(ApiMethods::ALL))
        .unwrap();

    let err = registry
        .register::<Item>(EntityOptions::new(ApiMethods::GET))
        .unwrap_err();
    assert_eq!(
        err,
        ConfigError::DuplicateOptions {
            resource: "items".to_string()
        }
    );
    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.resolve::<Item>().unwrap().methods,
        ApiMethods::ALL
    );
}

#[tokio::test]
async fn test_custom_base_path() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let mut registry = OptionsRegistry::new();
    registry
        .register::<Item>(EntityOptions::new(ApiMethods::ALL))
        .unwrap();
    let config = Arc::new(ApiConfig::default().with_base_path("/v2/"));
    let app = GenericController::<Item, _>::new(&registry, db, config)
        .unwrap()
        .into_router();

    let (status, headers, _) = send(
        &app,
        Method::POST,
        "/v2/items",
        None,
        Some(json!({"name": "Awl", "category": "tools"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(
        headers["location"]
            .to_str()
            .unwrap()
            .starts_with("/v2/items/")
    );

    let (status, _, _) = send(&app, Method::GET, "/api/items", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
