use inventory_report::{
    config::{ApiSettings, Settings},
    credentials::CredentialStore,
    dispatcher::{Action, ActionEvent, Dispatcher, FetchRequest},
    error::AppError,
    inventory::{InventoryClient, PageRequest},
    report::ReportWriter,
};
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn write_env(temp_dir: &TempDir, content: &str) -> CredentialStore {
    let path = temp_dir.path().join(".env");
    std::fs::write(&path, content).unwrap();
    CredentialStore::with_candidates(vec![path])
}

#[tokio::test]
async fn test_credentials_from_file_reach_the_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/locations/loc456/products"))
        .and(header("authorization", "Bearer tok123"))
        .and(header("version", "2021-07-28"))
        .and(query_param("altId", "loc456"))
        .and(query_param("altType", "location"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "products": [
                {"name": "Widget", "productName": "Widget Pro", "availableQuantity": 5, "image": "http://x/y.png"},
                {"name": "Gadget", "productName": "Gadget Max", "availableQuantity": "3"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    // Legacy key names are still understood
    let store = write_env(
        &temp_dir,
        "HIGHLEVEL_ACCESS_TOKEN=tok123\nHIGHLEVEL_LOCATION_ID=loc456\n",
    );
    let credentials = store.load().await.unwrap();

    let client = InventoryClient::new(&ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .unwrap();

    let records = client
        .fetch_page(&credentials, PageRequest::default())
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name, "Widget");
    assert_eq!(records[1].available_quantity, 3);
    assert_eq!(records[1].image_url(), None);

    let output = temp_dir.path().join("inventario.xlsx");
    let written = ReportWriter::new()
        .write(&records, Some(&output), None)
        .unwrap();
    assert_eq!(written, output);
    assert!(std::fs::metadata(&output).unwrap().len() > 0);
}

#[tokio::test]
async fn test_fetch_then_export_through_dispatcher() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/inventory"))
        .and(query_param("limit", "25"))
        .and(query_param("offset", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "inventory": [{"name": "Widget", "availableQuantity": 2}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    // Stored page defaults apply when the request leaves them open
    let store = write_env(
        &temp_dir,
        "ACCESS_TOKEN=tok123\nLOCATION_ID=loc456\nAPI_LIMIT=25\nAPI_OFFSET=5\n",
    );

    let mut settings = Settings::default();
    settings.api.base_url = server.uri();
    let (dispatcher, mut events) = Dispatcher::new(&settings, store).unwrap();

    dispatcher.fetch(FetchRequest::default()).unwrap();
    let mut records = None;
    while let Some(event) = events.recv().await {
        match event {
            ActionEvent::Fetched(fetched) => records = Some(fetched),
            ActionEvent::Failed { error, .. } => panic!("fetch failed: {}", error),
            ActionEvent::Finished(Action::Fetch) => break,
            _ => {}
        }
    }
    let records = records.expect("no Fetched event");
    assert_eq!(records.len(), 1);

    let output = temp_dir.path().join("report.xlsx");
    dispatcher.export(records, Some(output.clone())).unwrap();
    let mut exported = None;
    while let Some(event) = events.recv().await {
        match event {
            ActionEvent::Exported(path) => exported = Some(path),
            ActionEvent::Failed { error, .. } => panic!("export failed: {}", error),
            ActionEvent::Finished(Action::Export) => break,
            _ => {}
        }
    }

    assert_eq!(exported, Some(output.clone()));
    assert!(output.is_file());
}

#[tokio::test]
async fn test_unauthorized_fetch_sends_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let store = write_env(&temp_dir, "CLIENT_ID=cid\nACCESS_TOKEN=\n");

    let client = InventoryClient::new(&ApiSettings {
        base_url: server.uri(),
        ..ApiSettings::default()
    })
    .unwrap();

    let err = client
        .test_connection(&store.load().await.unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingCredentials(_)));
}
