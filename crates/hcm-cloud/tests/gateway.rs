//! Cloud gateway adapter tests against a mock server.

use serde_json::json;
use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hcm_cloud::{CloudError, GatewayOptions, ResourceAdapter, RestAdapter};
use hcm_core::{ErrorKind, HcmError, ResourceKind, Scope, Vendor};

fn scope() -> Scope {
    Scope::new(Vendor::TCloud, "acc-1", "ap-guangzhou")
}

fn adapter(server: &MockServer, kind: ResourceKind) -> RestAdapter {
    let options = GatewayOptions {
        page_size: 2,
        query_limit: 2,
        ..GatewayOptions::default()
    };
    RestAdapter::new(server.uri(), "secret", Vendor::TCloud, kind, &options).unwrap()
}

#[tokio::test]
async fn list_sends_scope_and_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tcloud/vpc"))
        .and(bearer_token("secret"))
        .and(query_param("account_id", "acc-1"))
        .and(query_param("region", "ap-guangzhou"))
        .and(query_param("limit", "2"))
        .and(query_param("cursor", "tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "details": [
                {"cloud_id": "vpc-a", "name": "a", "attributes": {"cidr": "10.0.0.0/16"}},
                {"cloud_id": "vpc-b", "name": "b"}
            ],
            "next_cursor": "tok-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let page = adapter(&server, ResourceKind::Vpc)
        .list(&scope(), Some("tok-1"))
        .await
        .unwrap();

    assert_eq!(page.details.len(), 2);
    assert_eq!(page.details[0].attributes["cidr"], "10.0.0.0/16");
    assert_eq!(page.next_cursor.as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn list_without_next_cursor_is_last_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tcloud/eip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"details": []})))
        .mount(&server)
        .await;

    let page = adapter(&server, ResourceKind::Eip)
        .list(&scope(), None)
        .await
        .unwrap();
    assert!(page.details.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn list_by_ids_posts_cloud_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tcloud/vpc/query"))
        .and(body_json(json!({
            "account_id": "acc-1",
            "region": "ap-guangzhou",
            "cloud_ids": ["vpc-a", "vpc-z"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "details": [{"cloud_id": "vpc-a", "name": "a"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let found = adapter(&server, ResourceKind::Vpc)
        .list_by_ids(&scope(), &["vpc-a".into(), "vpc-z".into()])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].cloud_id, "vpc-a");
}

#[tokio::test]
async fn list_by_ids_over_limit_never_calls_vendor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ids: Vec<String> = (0..3).map(|i| format!("vpc-{i}")).collect();
    let err = adapter(&server, ResourceKind::Vpc)
        .list_by_ids(&scope(), &ids)
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::InvalidRequest(_)));
}

#[tokio::test]
async fn error_envelope_maps_to_upstream_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tcloud/cvm"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"code": "RequestLimitExceeded", "message": "throttled"}
        })))
        .mount(&server)
        .await;

    let err = adapter(&server, ResourceKind::Cvm)
        .list(&scope(), None)
        .await
        .unwrap_err();
    match &err {
        CloudError::Api { code, status, .. } => {
            assert_eq!(code, "RequestLimitExceeded");
            assert_eq!(*status, 503);
        }
        other => panic!("unexpected error: {other}"),
    }

    let hcm: HcmError = err.into_hcm("tcloud");
    assert_eq!(hcm.kind(), ErrorKind::UpstreamUnavailable);
}

#[tokio::test]
async fn non_json_error_body_is_still_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let err = adapter(&server, ResourceKind::Vpc)
        .list(&scope(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CloudError::Api { status: 502, .. }));
}

#[tokio::test]
async fn delete_of_missing_resource_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/tcloud/disk/disk-9"))
        .and(query_param("zone", "ap-guangzhou-3"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server, ResourceKind::Disk)
        .delete(&scope().with_zone("ap-guangzhou-3"), "disk-9")
        .await
        .unwrap();
}

#[tokio::test]
async fn attach_posts_target() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tcloud/disk/disk-1/attach"))
        .and(body_json(json!({
            "account_id": "acc-1",
            "region": "ap-guangzhou",
            "target_cloud_id": "ins-1"
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    adapter(&server, ResourceKind::Disk)
        .attach(&scope(), "disk-1", "ins-1")
        .await
        .unwrap();
}

#[tokio::test]
async fn create_returns_descriptors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tcloud/eip"))
        .and(body_json(json!({
            "account_id": "acc-1",
            "region": "ap-guangzhou",
            "spec": {"count": 2}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "details": [{"cloud_id": "eip-1"}, {"cloud_id": "eip-2"}]
        })))
        .mount(&server)
        .await;

    let created = adapter(&server, ResourceKind::Eip)
        .create(&scope(), &json!({"count": 2}))
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].name, "");
}
