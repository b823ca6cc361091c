// ArkClient tests against a local mock HTTP server.

use fabulist_core::ArkConfig;
use fabulist_error::{CollaboratorErrorKind, FabulistErrorKind};
use fabulist_interface::{
    ChatCompletion, ImageGeneration, ImageRequest, TaskStatus, VideoGeneration, VideoTaskRequest,
};
use fabulist_models::ArkClient;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, max_retries: usize) -> ArkClient {
    let config = ArkConfig::default()
        .with_base_url(server.uri())
        .with_api_key(Some("test-key".to_string()))
        .with_max_retries(max_retries);
    ArkClient::new(config).expect("client")
}

fn collaborator_kind(err: &fabulist_error::FabulistError) -> CollaboratorErrorKind {
    match err.kind() {
        FabulistErrorKind::Collaborator(e) => e.kind.clone(),
        other => panic!("expected a collaborator error, got {other}"),
    }
}

#[tokio::test]
async fn test_chat_completion() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "ep-20250220181854-c8s82",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "Theme: dinosaurs"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"chapters\": []}"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server, 0)
        .complete("Be brief.", "Theme: dinosaurs")
        .await?;
    assert_eq!(reply, "{\"chapters\": []}");
    Ok(())
}

#[tokio::test]
async fn test_empty_chat_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = client(&server, 0).complete("", "hi").await.unwrap_err();
    assert!(matches!(
        collaborator_kind(&err),
        CollaboratorErrorKind::EmptyResponse(_)
    ));
}

#[tokio::test]
async fn test_auth_failure_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server, 3).complete("", "hi").await.unwrap_err();
    assert_eq!(
        collaborator_kind(&err),
        CollaboratorErrorKind::Auth("bad key".to_string())
    );
}

#[tokio::test]
async fn test_unavailable_service_is_retried() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v3/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "recovered"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = client(&server, 1).complete("", "hi").await?;
    assert_eq!(reply, "recovered");
    Ok(())
}

#[tokio::test]
async fn test_image_generation() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/images/generations"))
        .and(body_partial_json(json!({
            "model": "doubao-seedream-4.0",
            "prompt": "a hatching egg",
            "size": "2304x1728",
            "sequential_image_generation": "auto",
            "sequential_image_generation_options": {"max_images": 2},
            "image": ["https://img.test/previous.png"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"url": "https://img.test/1.png"},
                {"b64_json": "aGVsbG8=", "format": "webp"}
            ]
        })))
        .mount(&server)
        .await;

    let request = ImageRequest::builder()
        .prompt("a hatching egg")
        .size("2304x1728")
        .max_images(2u32)
        .reference_images(vec!["https://img.test/previous.png".to_string()])
        .build()?;
    let images = client(&server, 0).generate(&request).await?;

    assert_eq!(
        images,
        vec![
            "https://img.test/1.png".to_string(),
            "data:image/webp;base64,aGVsbG8=".to_string()
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_image_generation_without_images() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/images/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let request = ImageRequest::builder().prompt("x").size("1024x1024").build()?;
    let err = client(&server, 0).generate(&request).await.unwrap_err();
    assert!(matches!(
        collaborator_kind(&err),
        CollaboratorErrorKind::EmptyResponse(_)
    ));
    Ok(())
}

#[tokio::test]
async fn test_video_task_lifecycle() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v3/contents/generations/tasks"))
        .and(body_partial_json(json!({
            "model": "doubao-seedance-1-0-lite-i2v",
            "content": [
                {"type": "text", "text": "a story"},
                {"type": "image_url", "image_url": {"url": "https://img.test/1.png", "role": "reference_image"}}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "cgt-42"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/contents/generations/tasks"))
        .and(query_param("task_id", "cgt-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "succeeded",
            "content": {"video_url": "https://video.test/42.mp4"}
        })))
        .mount(&server)
        .await;

    let client = client(&server, 0);
    let request = VideoTaskRequest::builder()
        .prompt("a story")
        .reference_images(vec!["https://img.test/1.png".to_string()])
        .build()?;
    let task_id = client.create_task(&request).await?;
    assert_eq!(task_id, "cgt-42");

    let status = client.poll_status(&task_id).await?;
    assert_eq!(*status.status(), TaskStatus::Succeeded);
    assert_eq!(status.finished_url(), Some("https://video.test/42.mp4"));
    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/contents/generations/tasks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let err = client(&server, 0).poll_status("t").await.unwrap_err();
    assert!(matches!(err.kind(), FabulistErrorKind::Parse(_)));
}

#[test]
fn test_missing_api_key() {
    let err = ArkClient::new(ArkConfig::default()).unwrap_err();
    assert!(matches!(err.kind(), FabulistErrorKind::Config(_)));
}
