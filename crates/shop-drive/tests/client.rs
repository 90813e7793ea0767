use serde_json::json;
use shop_core::{FileHost, FileMetadata, ShopError};
use shop_drive::{DriveClient, DriveConfig, ServiceAccountKey};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("fixtures/test_rsa_key.pem");
const FILE_ID: &str = "1SRI05oRIFGW6eKbpNiNVuuaLHSvKM4l1";

fn client(server: &MockServer) -> DriveClient {
    let key = ServiceAccountKey {
        client_email: "store@doitek-store.iam.gserviceaccount.com".into(),
        private_key: TEST_KEY.into(),
        private_key_id: Some("kid-1".into()),
        token_uri: String::new(),
    };
    let config = DriveConfig::new(key)
        .with_api_base_url(server.uri())
        .with_token_uri(format!("{}/token", server.uri()));
    DriveClient::new(config).unwrap()
}

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("jwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.drive-token",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn file_path() -> String {
    format!("/drive/v3/files/{}", FILE_ID)
}

#[tokio::test]
async fn test_fetch_metadata_reuses_token() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path(file_path()))
        .and(header("authorization", "Bearer ya29.drive-token"))
        .and(query_param("fields", "name,mimeType,webContentLink"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "XML_Key_Generator_v4.zip",
            "mimeType": "application/zip"
        })))
        .expect(2)
        .mount(&server)
        .await;

    let drive = client(&server);

    let meta = drive.fetch_metadata(FILE_ID).await.unwrap();
    assert_eq!(meta.name, "XML_Key_Generator_v4.zip");
    assert_eq!(meta.mime_type, "application/zip");
    assert!(meta.web_content_link.is_none());

    drive.fetch_metadata(FILE_ID).await.unwrap();
}

#[tokio::test]
async fn test_fetch_content() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path(file_path()))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK\x03\x04 archive".to_vec()))
        .mount(&server)
        .await;

    let bytes = client(&server).fetch_content(FILE_ID).await.unwrap();

    assert_eq!(&bytes[..4], b"PK\x03\x04");
}

#[tokio::test]
async fn test_empty_content_is_an_error() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path(file_path()))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let err = client(&server).fetch_content(FILE_ID).await.unwrap_err();

    assert!(matches!(err, ShopError::FileRetrieval { .. }));
}

#[tokio::test]
async fn test_missing_file() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path(file_path()))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": format!("File not found: {}.", FILE_ID)}
        })))
        .mount(&server)
        .await;

    match client(&server).fetch_metadata(FILE_ID).await.unwrap_err() {
        ShopError::FileRetrieval { file_ref, message } => {
            assert_eq!(file_ref, FILE_ID);
            assert!(message.contains("404"));
            assert!(message.contains("File not found"));
        }
        other => panic!("expected file retrieval error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_token_exchange_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&server)
        .await;

    match client(&server).fetch_metadata(FILE_ID).await.unwrap_err() {
        ShopError::FileRetrieval { file_ref, message } => {
            assert_eq!(file_ref, FILE_ID);
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("expected file retrieval error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_link_delivery_reads_metadata_once() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path(file_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "tool.zip",
            "mimeType": "application/zip",
            "webContentLink": "https://drive.google.com/uc?id=abc&export=download"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let metadata = client.fetch_metadata(FILE_ID).await.unwrap();
    let link = client.generate_link(FILE_ID, &metadata).await.unwrap();

    assert_eq!(link, "https://drive.google.com/uc?id=abc&export=download");
}

#[tokio::test]
async fn test_generate_link_falls_back_to_public_url() {
    let server = MockServer::start().await;
    let metadata = FileMetadata {
        name: "tool.zip".into(),
        mime_type: "application/zip".into(),
        web_content_link: None,
    };

    let link = client(&server).generate_link(FILE_ID, &metadata).await.unwrap();

    assert_eq!(link, shop_drive::public_download_url(FILE_ID));
    assert!(server.received_requests().await.unwrap().is_empty());
}
