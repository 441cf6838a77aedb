//! Integration tests for `SoraApi` against an in-process fake service.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use tokio_util::sync::CancellationToken;

use scenechain_core::types::JobId;
use scenechain_generation::client::GenerationClient;
use scenechain_generation::error::GenerationError;
use scenechain_generation::job::{ClipDuration, GenerationRequest, JobStatus};
use scenechain_generation::poll::{await_completion, PollConfig};

fn fast_polls() -> PollConfig {
    PollConfig::from_polls(Duration::from_millis(10), 20)
}

// ---------------------------------------------------------------------------
// Test: text-only job runs to completion and downloads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn text_job_completes_and_downloads() {
    let fake = common::spawn_fake().await;
    let api = fake.api();

    let request = GenerationRequest::new("a lighthouse at dusk").with_duration(ClipDuration::Eight);
    let job_id = api.submit(&request).await.unwrap();
    assert_eq!(job_id.as_str(), "video_1");

    let job = await_completion(&api, &job_id, &fast_polls(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);

    let bytes = api.download(&job).await.unwrap();
    assert_eq!(bytes, b"FAKE-MP4:video_1");

    let subs = fake.submissions();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0].prompt, "a lighthouse at dusk");
    assert_eq!(subs[0].model.as_deref(), Some("sora-2"));
    assert_eq!(subs[0].seconds.as_deref(), Some("8"));
    assert_eq!(subs[0].api_version.as_deref(), Some("2024-12-01-preview"));
    assert!(subs[0].reference_file.is_none());
}

// ---------------------------------------------------------------------------
// Test: reference image is uploaded as a multipart file
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reference_image_is_uploaded() {
    let fake = common::spawn_fake().await;
    let dir = tempfile::tempdir().unwrap();
    let frame = dir.path().join("frame_000.jpg");
    std::fs::write(&frame, b"jpegbytes").unwrap();

    let request = GenerationRequest::new("continue the walk").with_reference(Some(frame));
    fake.api().submit(&request).await.unwrap();

    let subs = fake.submissions();
    assert_eq!(subs[0].reference_file.as_deref(), Some("frame_000.jpg"));
    assert_eq!(subs[0].reference_len, 9);
    assert_eq!(subs[0].seconds.as_deref(), Some("12"));
}

// ---------------------------------------------------------------------------
// Test: empty prompt never reaches the service
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_prompt_is_rejected_locally() {
    let fake = common::spawn_fake().await;
    let result = fake.api().submit(&GenerationRequest::new("  ")).await;

    assert_matches!(result, Err(GenerationError::InvalidRequest(_)));
    assert!(fake.submissions().is_empty());
}

// ---------------------------------------------------------------------------
// Test: service-side 400 maps to InvalidRequest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn service_rejection_is_invalid_request() {
    let fake = common::spawn_fake().await;
    let result = fake
        .api()
        .submit(&GenerationRequest::new("please reject this"))
        .await;

    assert_matches!(result, Err(GenerationError::InvalidRequest(body)) if body.contains("moderation"));
}

// ---------------------------------------------------------------------------
// Test: failed job surfaces the service's reason
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_job_reports_reason() {
    let fake = common::spawn_fake().await;
    let api = fake.api();
    let job_id = api
        .submit(&GenerationRequest::new("this will fail"))
        .await
        .unwrap();

    let result = await_completion(&api, &job_id, &fast_polls(), &CancellationToken::new()).await;
    assert_matches!(
        result,
        Err(GenerationError::JobFailed { reason, .. }) if reason == "blocked by safety system"
    );
}

// ---------------------------------------------------------------------------
// Test: unknown job id maps to NotFound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_job_is_not_found() {
    let fake = common::spawn_fake().await;
    let result = fake.api().poll(&JobId::from("video_404")).await;

    assert_matches!(result, Err(GenerationError::NotFound(id)) if id.as_str() == "video_404");
}

// ---------------------------------------------------------------------------
// Test: download before success is AssetUnavailable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_of_pending_job_is_unavailable() {
    let fake = common::spawn_fake().await;
    let api = fake.api();
    let job_id = api.submit(&GenerationRequest::new("slow")).await.unwrap();

    let job = api.poll(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_matches!(
        api.download(&job).await,
        Err(GenerationError::AssetUnavailable { .. })
    );
}

// ---------------------------------------------------------------------------
// Test: remix posts to the source job's remix route
// ---------------------------------------------------------------------------

#[tokio::test]
async fn remix_targets_previous_job() {
    let fake = common::spawn_fake().await;
    let api = fake.api();
    let first = api.submit(&GenerationRequest::new("opening")).await.unwrap();

    let request = GenerationRequest::new("same shot, at night").with_remix_of(Some(first.clone()));
    let second = api.submit(&request).await.unwrap();
    assert_ne!(first, second);

    let subs = fake.submissions();
    assert_eq!(subs[1].remix_of.as_deref(), Some(first.as_str()));
    assert_eq!(subs[1].prompt, "same shot, at night");
}

// ---------------------------------------------------------------------------
// Test: wrong key is an API error, not a panic or a retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn bad_key_is_api_error() {
    let fake = common::spawn_fake().await;
    let result = fake
        .api_with_key("wrong")
        .submit(&GenerationRequest::new("anything"))
        .await;

    assert_matches!(result, Err(GenerationError::Api { status: 401, .. }));
}
