//! Integration tests for the PDF renamer service, driven through the router
//! with fake rasterizer and OCR engines.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::*;
use pdf_renamer::config::CollisionPolicy;
use pdf_renamer::create_router;
use pdf_renamer::error::FailureKind;
use pdf_renamer::models::{FileOutcome, InputFile};
use pdf_renamer::services::Disposition;

const MARIA: &str = "Name: Maria Garcia\nDOB: 01/01/1990\n";

#[tokio::test]
async fn upload_renames_file_on_disk() {
    let env = TestEnv::new();
    let app = create_router(env.state.clone());

    let response = app
        .oneshot(multipart_request(
            "/upload",
            "pdfs",
            &[("scan001.pdf", pdf_with_text(MARIA))],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let names: Vec<String> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(names, vec!["Maria Garcia.pdf"]);

    assert_eq!(list_dir(&env.renamed_dir()), vec!["Maria Garcia.pdf"]);
    let stored = std::fs::read(env.renamed_dir().join("Maria Garcia.pdf")).unwrap();
    assert_eq!(stored, pdf_with_text(MARIA));

    // Nothing left behind in the working directories.
    assert!(list_dir(&env.upload_dir()).is_empty());
    assert!(list_dir(&env.temp_dir()).is_empty());
}

#[tokio::test]
async fn process_offers_renamed_download() {
    let env = TestEnv::new();
    let app = create_router(env.state.clone());

    let response = app
        .clone()
        .oneshot(multipart_request(
            "/api/v1/process",
            "pdfs",
            &[("scan001.pdf", pdf_with_text(MARIA))],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    let result = &json["data"]["results"][0];
    assert_eq!(result["original"], "scan001.pdf");
    assert_eq!(result["new_name"], "Maria_Garcia_scan001.pdf");
    assert_eq!(result["status"], "renamed");
    let url = result["download_url"].as_str().unwrap().to_string();

    let response = app
        .oneshot(Request::builder().uri(&url).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/pdf");
    assert_eq!(
        response.headers()["content-disposition"],
        "attachment; filename=\"Maria_Garcia_scan001.pdf\""
    );
    assert_eq!(body_bytes(response).await, pdf_with_text(MARIA));

    // The download disposition never touches the rename directories.
    assert!(list_dir(&env.renamed_dir()).is_empty());
    assert!(list_dir(&env.upload_dir()).is_empty());
}

#[tokio::test]
async fn missing_label_falls_back_to_sentinel() {
    let env = TestEnv::new();
    let files = vec![InputFile::new("form.pdf", pdf_with_text("Signature: ______\n"))];

    let outcomes = env
        .state
        .pipeline
        .process_batch(files.clone(), Disposition::Download)
        .await;
    assert_eq!(outcomes[0].new_name(), "unknown_form.pdf");

    let outcomes = env
        .state
        .pipeline
        .process_batch(files, Disposition::Rename)
        .await;
    assert_eq!(outcomes[0].new_name(), "Unknown.pdf");
}

#[tokio::test]
async fn one_failure_does_not_affect_the_rest() {
    for disposition in [Disposition::Download, Disposition::Rename] {
        for broken in 0..3 {
            let env = TestEnv::with_config(|c| c.rename_collision = CollisionPolicy::Suffix);
            let files: Vec<InputFile> = (0..3)
                .map(|i| {
                    let text = if i == broken {
                        format!("{}\nName: Person {}\n", BROKEN, i)
                    } else {
                        format!("Name: Person {}\n", i)
                    };
                    InputFile::new(format!("scan{}.pdf", i), pdf_with_text(&text))
                })
                .collect();

            let outcomes = env.state.pipeline.process_batch(files, disposition).await;
            assert_eq!(outcomes.len(), 3);

            for (i, outcome) in outcomes.iter().enumerate() {
                assert_eq!(outcome.original(), format!("scan{}.pdf", i));
                if i == broken {
                    match outcome {
                        FileOutcome::Failed { kind, .. } => assert_eq!(*kind, FailureKind::Decode),
                        other => panic!("expected failure at {}, got {:?}", i, other),
                    }
                    assert_eq!(outcome.new_name(), "error");
                } else {
                    assert!(!outcome.is_failure(), "{:?} / {:?}", disposition, outcome);
                }
            }

            // The failed upload is cleaned up, not left in uploads/.
            assert!(list_dir(&env.upload_dir()).is_empty());
            assert!(list_dir(&env.temp_dir()).is_empty());
        }
    }
}

#[tokio::test]
async fn upload_reports_failures_as_error_entries() {
    let env = TestEnv::new();
    let app = create_router(env.state.clone());

    let response = app
        .oneshot(multipart_request(
            "/upload",
            "pdfs",
            &[
                ("a.pdf", pdf_with_text("Name: Ann Lee\n")),
                ("b.pdf", pdf_with_text(BROKEN)),
                ("c.txt", b"just text".to_vec()),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let names: Vec<String> = serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(names, vec!["Ann Lee.pdf", "error", "error"]);
}

#[tokio::test]
async fn process_reports_failure_kinds() {
    let env = TestEnv::new();
    let app = create_router(env.state.clone());

    let response = app
        .oneshot(multipart_request(
            "/api/v1/process",
            "file",
            &[
                ("b.pdf", pdf_with_text(BROKEN)),
                ("c.txt", b"just text".to_vec()),
            ],
        ))
        .await
        .unwrap();

    let json = body_json(response).await;
    let results = json["data"]["results"].as_array().unwrap();
    assert_eq!(json["data"]["failed"], 2);
    assert_eq!(results[0]["error"]["kind"], "decode");
    assert_eq!(results[1]["error"]["kind"], "invalid_file");
    assert!(results.iter().all(|r| r.get("download_url").is_none()));
    assert!(results.iter().all(|r| r["new_name"] == "error"));
}

#[tokio::test]
async fn slow_ocr_times_out_per_file() {
    let env = TestEnv::with_config(|c| c.ocr_timeout_seconds = 1);
    let files = vec![
        InputFile::new("slow.pdf", pdf_with_text(&format!("{}5000\nName: Slow\n", DELAY))),
        InputFile::new("fast.pdf", pdf_with_text("Name: Fast\n")),
    ];

    let outcomes = env
        .state
        .pipeline
        .process_batch(files, Disposition::Rename)
        .await;

    match &outcomes[0] {
        FileOutcome::Failed { kind, message, .. } => {
            assert_eq!(*kind, FailureKind::Recognition);
            assert!(message.contains("timed out"));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert_eq!(outcomes[1].new_name(), "Fast.pdf");
    assert!(list_dir(&env.upload_dir()).is_empty());
}

#[tokio::test]
async fn concurrent_processing_keeps_input_order() {
    let env = TestEnv::with_config(|c| c.ocr_concurrency = 3);
    let files: Vec<InputFile> = [(300, "First"), (150, "Second"), (0, "Third")]
        .iter()
        .map(|(delay, name)| {
            InputFile::new(
                format!("{}.pdf", name.to_lowercase()),
                pdf_with_text(&format!("{}{}\nName: {}\n", DELAY, delay, name)),
            )
        })
        .collect();

    let outcomes = env
        .state
        .pipeline
        .process_batch(files, Disposition::Download)
        .await;
    let names: Vec<&str> = outcomes.iter().map(|o| o.new_name()).collect();
    assert_eq!(
        names,
        vec!["First_first.pdf", "Second_second.pdf", "Third_third.pdf"]
    );
}

#[tokio::test]
async fn rename_collisions_follow_policy() {
    let files = || {
        vec![
            InputFile::new("a.pdf", pdf_with_text("Name: Jane Doe\n")),
            InputFile::new("b.pdf", pdf_with_text("Name: Jane Doe\n")),
        ]
    };

    let env = TestEnv::new();
    let outcomes = env
        .state
        .pipeline
        .process_batch(files(), Disposition::Rename)
        .await;
    assert_eq!(outcomes[0].new_name(), "Jane Doe.pdf");
    assert_eq!(outcomes[1].new_name(), "Jane Doe.pdf");
    assert_eq!(list_dir(&env.renamed_dir()), vec!["Jane Doe.pdf"]);

    let env = TestEnv::with_config(|c| c.rename_collision = CollisionPolicy::Suffix);
    let outcomes = env
        .state
        .pipeline
        .process_batch(files(), Disposition::Rename)
        .await;
    assert_eq!(outcomes[0].new_name(), "Jane Doe.pdf");
    assert_eq!(outcomes[1].new_name(), "Jane Doe (1).pdf");
    assert_eq!(
        list_dir(&env.renamed_dir()),
        vec!["Jane Doe (1).pdf", "Jane Doe.pdf"]
    );
}

#[tokio::test]
async fn new_run_releases_previous_downloads() {
    let env = TestEnv::new();
    let app = create_router(env.state.clone());

    let first = body_json(
        app.clone()
            .oneshot(multipart_request(
                "/api/v1/process",
                "pdfs",
                &[("a.pdf", pdf_with_text("Name: Ann\n"))],
            ))
            .await
            .unwrap(),
    )
    .await;
    let first_url = first["data"]["results"][0]["download_url"]
        .as_str()
        .unwrap()
        .to_string();

    let second = body_json(
        app.clone()
            .oneshot(multipart_request(
                "/api/v1/process",
                "pdfs",
                &[("b.pdf", pdf_with_text("Name: Bob\n"))],
            ))
            .await
            .unwrap(),
    )
    .await;
    let second_url = second["data"]["results"][0]["download_url"]
        .as_str()
        .unwrap()
        .to_string();

    let get = |uri: String| Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(get(first_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = app.clone().oneshot(get(second_url.clone())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/v1/downloads")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get(second_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn request_without_files_is_rejected() {
    let env = TestEnv::new();
    let app = create_router(env.state.clone());

    let boundary = "----no-files";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = boundary
    );
    let request = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["code"], "MISSING_FILE");
}

#[tokio::test]
async fn malformed_download_id_is_a_bad_request() {
    let env = TestEnv::new();
    let app = create_router(env.state.clone());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/downloads/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reports_tool_status() {
    let env = TestEnv::new();
    let app = create_router(env.state.clone());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["services"]["rasterizer"], true);
    assert_eq!(json["services"]["ocr_service"], true);
    assert_eq!(json["downloads_held"], 0);

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn static_files_are_served_from_public_dir() {
    let env = TestEnv::new();
    std::fs::create_dir_all(&env.state.config.public_dir).unwrap();
    std::fs::write(env.state.config.public_dir.join("index.html"), "<h1>renamer</h1>").unwrap();
    let app = create_router(env.state.clone());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"<h1>renamer</h1>");
}

#[tokio::test]
async fn oversized_file_is_rejected_with_413() {
    let env = TestEnv::with_config(|c| c.max_file_size_mb = 1);
    let app = create_router(env.state.clone());

    let mut content = pdf_with_text(MARIA);
    content.resize(1024 * 1024 + 512 * 1024, b' ');

    let response = app
        .oneshot(multipart_request(
            "/upload",
            "pdfs",
            &[("big.pdf", content)],
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "FILE_TOO_LARGE");
    // 1.5MB is reported rounded up
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("2MB exceeds limit of 1MB"));
    assert!(list_dir(&env.renamed_dir()).is_empty());
    assert!(list_dir(&env.upload_dir()).is_empty());
}

#[tokio::test]
async fn excess_concurrent_batches_get_429() {
    let env = TestEnv::with_config(|c| c.max_concurrent_requests = 1);
    let app = create_router(env.state.clone());

    let slow = tokio::spawn(app.clone().oneshot(multipart_request(
        "/api/v1/process",
        "pdfs",
        &[(
            "slow.pdf",
            pdf_with_text(&format!("{}1500\nName: Slow Poke\n", DELAY)),
        )],
    )));
    // Let the first batch take the only permit.
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    let response = app
        .clone()
        .oneshot(multipart_request(
            "/upload",
            "pdfs",
            &[("scan001.pdf", pdf_with_text(MARIA))],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], "RATE_LIMIT_EXCEEDED");

    let response = slow.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["results"][0]["new_name"], "Slow_Poke_slow.pdf");

    // The permit is back once the slow batch is done.
    let response = app
        .oneshot(multipart_request(
            "/upload",
            "pdfs",
            &[("scan001.pdf", pdf_with_text(MARIA))],
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (total, rejected, available) = env.state.rate_limiter.metrics();
    assert_eq!((total, rejected, available), (3, 1, 1));
}
