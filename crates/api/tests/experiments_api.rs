//! Listing, import, rename and deletion of persisted runs.

mod common;

use axum::http::StatusCode;
use common::{admin_token, body_json, build_test_app, delete, get, patch_json, post_json, start_run, user_token};
use serde_json::json;

#[tokio::test]
async fn empty_workspace_lists_nothing() {
    let test = build_test_app();

    let list = body_json(get(test.app(), "/api/v1/experiments/7", &user_token()).await).await;
    let last = body_json(get(test.app(), "/api/v1/experiments/fetch/7", &user_token()).await).await;

    assert!(list["data"].as_object().unwrap().is_empty());
    assert!(last["data"].is_null());
}

#[tokio::test]
async fn listing_strips_graph_and_keys_by_uid() {
    let test = build_test_app();
    let uid = start_run(&test, "1", "first").await;

    let json = body_json(get(test.app(), "/api/v1/experiments/1", &user_token()).await).await;

    let expt = &json["data"][uid.as_str()];
    assert_eq!(expt["name"], "first");
    assert_eq!(expt["unique_id"], uid);
    assert_eq!(expt["function"]["mc"]["success"], "running");
    assert!(expt.get("nodeDict").is_none());
    assert!(expt.get("edgeDict").is_none());
}

#[tokio::test]
async fn import_returns_graph_with_merged_params() {
    let test = build_test_app();
    let uid = start_run(&test, "1", "first").await;

    let json = body_json(
        get(test.app(), &format!("/api/v1/experiments/import/1/{uid}"), &user_token()).await,
    )
    .await;

    let data = &json["data"];
    assert_eq!(data["edgeDict"]["e1"]["source"], "input_0");
    let param = &data["nodeDict"]["mc"]["data"]["param"];
    assert_eq!(param["max_shifts"]["value"], json!([8, 8]));
    assert_eq!(param["niter_rig"]["value"], 1);
}

#[tokio::test]
async fn rename_updates_name_only() {
    let test = build_test_app();
    let uid = start_run(&test, "1", "first").await;

    let response = patch_json(
        test.app(),
        &format!("/api/v1/experiments/1/{uid}/rename"),
        &user_token(),
        json!({"new_name": "renamed"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["name"], "renamed");
    let list = body_json(get(test.app(), "/api/v1/experiments/1", &user_token()).await).await;
    assert_eq!(list["data"][uid.as_str()]["name"], "renamed");
    assert_eq!(list["data"][uid.as_str()]["function"]["mc"]["name"], "caiman_mc");
}

#[tokio::test]
async fn rename_unknown_run_is_404() {
    let test = build_test_app();
    let response = patch_json(
        test.app(),
        "/api/v1/experiments/1/ghost/rename",
        &user_token(),
        json!({"new_name": "x"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_output_directory() {
    let test = build_test_app();
    let uid = start_run(&test, "1", "first").await;

    let response = delete(test.app(), &format!("/api/v1/experiments/1/{uid}"), &user_token()).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], true);
    assert!(!test.run_dir("1", &uid).exists());

    let again = delete(test.app(), &format!("/api/v1/experiments/1/{uid}"), &user_token()).await;
    assert_eq!(again.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_bulk_delete_skips_missing() {
    let test = build_test_app();
    let a = start_run(&test, "1", "a").await;
    let b = start_run(&test, "1", "b").await;

    let response = post_json(
        test.app(),
        "/api/v1/experiments/delete/1",
        &admin_token(),
        json!({"uidList": [a, "missing"]}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"], json!([a]));
    assert!(!test.run_dir("1", &a).exists());
    assert!(test.run_dir("1", &b).exists());
}

#[tokio::test]
async fn traversal_in_ids_is_rejected() {
    let test = build_test_app();
    let response = get(test.app(), "/api/v1/experiments/import/1/..", &user_token()).await;
    assert_ne!(response.status(), StatusCode::OK);
}
