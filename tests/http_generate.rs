use actix_http::Request;
use actix_web::{
    body::to_bytes,
    dev::{Service, ServiceResponse},
    http::{header::CONTENT_TYPE, StatusCode},
    test, web, App, Error,
};
use serde_json::{json, Value};
use std::sync::Arc;
use story_stream::server::{app_config, AppState};
use story_stream::{
    GenerationClient, MockBackend, RequestValidator, StoryPipeline, ValidationPolicy,
};

fn state_with(mock: Arc<MockBackend>, policy: ValidationPolicy) -> AppState {
    let client = GenerationClient::builder("http://unused")
        .backend(mock)
        .build()
        .unwrap();
    AppState::new(StoryPipeline::new(
        Arc::new(client),
        RequestValidator::new(policy),
    ))
}

async fn setup(
    state: AppState,
) -> impl Service<Request, Response = ServiceResponse, Error = Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(app_config),
    )
    .await
}

fn json_post(body: Value) -> Request {
    test::TestRequest::post()
        .uri("/generate")
        .set_json(body)
        .to_request()
}

#[actix_web::test]
async fn streams_fragments_as_plain_text() {
    let mock = Arc::new(MockBackend::new(["The ", "", "young ", "swordsman..."]));
    let app = setup(state_with(mock.clone(), ValidationPolicy::Lenient)).await;

    let resp = test::call_service(&app, json_post(json!({"style": "武侠"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );

    let body = to_bytes(resp.into_body()).await.unwrap();
    assert_eq!(body, "The young swordsman...");
    assert_eq!(mock.calls(), 1);
    assert!(mock.last_request().unwrap().user.contains("[武侠]"));
}

#[actix_web::test]
async fn non_json_body_is_rejected() {
    let mock = Arc::new(MockBackend::new(["unused"]));
    let app = setup(state_with(mock.clone(), ValidationPolicy::Lenient)).await;

    let req = test::TestRequest::post()
        .uri("/generate")
        .insert_header((CONTENT_TYPE, "text/plain"))
        .set_payload("write me a story")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "请求必须是 JSON 格式");
    assert_eq!(mock.calls(), 0);
}

#[actix_web::test]
async fn invalid_json_with_json_content_type_is_rejected() {
    let mock = Arc::new(MockBackend::new(["unused"]));
    let app = setup(state_with(mock.clone(), ValidationPolicy::Lenient)).await;

    let req = test::TestRequest::post()
        .uri("/generate")
        .insert_header((CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "请求必须是 JSON 格式");
}

#[actix_web::test]
async fn non_object_json_is_rejected() {
    let mock = Arc::new(MockBackend::new(["unused"]));
    let app = setup(state_with(mock.clone(), ValidationPolicy::Lenient)).await;

    let resp = test::call_service(&app, json_post(json!(["style", "武侠"]))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(mock.calls(), 0);
}

#[actix_web::test]
async fn strict_policy_rejects_missing_fields() {
    let mock = Arc::new(MockBackend::new(["unused"]));
    let app = setup(state_with(mock.clone(), ValidationPolicy::Strict)).await;

    let resp = test::call_service(&app, json_post(json!({"style": "武侠"}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("title"));
    assert_eq!(mock.calls(), 0);
}

#[actix_web::test]
async fn unavailable_client_answers_503() {
    let state = AppState::unavailable(RequestValidator::default(), "未能初始化 AI 服务客户端");
    let app = setup(state).await;

    let resp = test::call_service(&app, json_post(json!({"style": "武侠"}))).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "未能初始化 AI 服务客户端");
}

#[actix_web::test]
async fn unreachable_backend_answers_500_without_text() {
    let mock = Arc::new(MockBackend::unreachable("connection refused"));
    let app = setup(state_with(mock.clone(), ValidationPolicy::Lenient)).await;

    let resp = test::call_service(&app, json_post(json!({"style": "武侠"}))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp
        .headers()
        .get(CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));

    let body: Value = test::read_body_json(resp).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("AI 服务调用失败: "));
    assert!(message.contains("connection refused"));
    assert_eq!(mock.calls(), 1);
}

#[actix_web::test]
async fn failure_before_first_fragment_answers_500() {
    let mock = Arc::new(MockBackend::new(["", ""]).failing_with("rate limited"));
    let app = setup(state_with(mock, ValidationPolicy::Lenient)).await;

    let resp = test::call_service(&app, json_post(json!({"style": "武侠"}))).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("rate limited"));
}

#[actix_web::test]
async fn failure_after_first_fragment_cuts_the_body() {
    let mock = Arc::new(MockBackend::new(["The ", "young "]).failing_with("connection reset"));
    let app = setup(state_with(mock, ValidationPolicy::Lenient)).await;

    let resp = test::call_service(&app, json_post(json!({"style": "武侠"}))).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(to_bytes(resp.into_body()).await.is_err());
}

#[actix_web::test]
async fn continuation_request_streams() {
    let mock = Arc::new(MockBackend::new(["续写"]));
    let app = setup(state_with(mock.clone(), ValidationPolicy::Strict)).await;

    let resp = test::call_service(
        &app,
        json_post(json!({
            "style": "武侠",
            "is_continue": true,
            "continue_from": "少年拔剑而起。",
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(to_bytes(resp.into_body()).await.unwrap(), "续写");

    let sent = mock.last_request().unwrap();
    assert!(sent.user.contains("少年拔剑而起。"));
    assert!(sent.user.contains("请继续创作："));
}

#[actix_web::test]
async fn large_continuation_source_is_accepted() {
    let mock = Arc::new(MockBackend::new(["续写"]));
    let app = setup(state_with(mock.clone(), ValidationPolicy::Lenient)).await;

    let source = "剑".repeat(100_000);
    let resp = test::call_service(
        &app,
        json_post(json!({"is_continue": true, "continue_from": source})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(to_bytes(resp.into_body()).await.unwrap(), "续写");
    assert!(mock.last_request().unwrap().user.contains(&source));
}

#[actix_web::test]
async fn oversized_body_is_a_json_413() {
    let mock = Arc::new(MockBackend::new(["unused"]));
    let state = state_with(mock.clone(), ValidationPolicy::Lenient).with_max_body_bytes(1024);
    let app = setup(state).await;

    let resp = test::call_service(
        &app,
        json_post(json!({"is_continue": true, "continue_from": "剑".repeat(1_000)})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        resp.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "请求体过大，超过 1024 字节上限");
    assert_eq!(mock.calls(), 0);
}
