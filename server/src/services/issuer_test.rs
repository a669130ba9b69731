use super::*;

const PASTE: &str = "IkaPaintBoard";

fn ok_body(uid: u32, data: &str) -> String {
    format!(r#"{{"code": 200, "paste": {{"data": "{data}", "user": {{"uid": {uid}}}}}}}"#)
}

#[test]
fn valid_paste_passes() {
    assert_eq!(check_paste(200, &ok_body(42, PASTE), 42, PASTE), Ok(()));
}

#[test]
fn paste_content_is_trimmed() {
    let padded = serde_json::json!({
        "code": 200,
        "paste": {"data": format!("\n{PASTE}  \n"), "user": {"uid": 42}}
    })
    .to_string();

    assert_eq!(check_paste(200, &padded, 42, PASTE), Ok(()));
}

#[test]
fn missing_paste_is_not_found() {
    assert_eq!(check_paste(404, "", 42, PASTE), Err(IssueError::PasteNotFound));
}

#[test]
fn other_upstream_status_is_generic_failure() {
    let err = check_paste(503, "", 42, PASTE).unwrap_err();
    assert!(matches!(err, IssueError::Upstream(_)));
    assert_eq!(err.error_type(), "SERVER_ERROR");
}

#[test]
fn envelope_code_not_200_is_generic_failure() {
    let body = r#"{"code": 403, "paste": null}"#;
    assert!(matches!(check_paste(200, body, 42, PASTE), Err(IssueError::Upstream(_))));
}

#[test]
fn malformed_json_is_generic_failure() {
    assert!(matches!(check_paste(200, "not json", 42, PASTE), Err(IssueError::Upstream(_))));
}

#[test]
fn wrong_uid_is_mismatch() {
    assert_eq!(
        check_paste(200, &ok_body(43, PASTE), 42, PASTE),
        Err(IssueError::UidMismatch)
    );
}

#[test]
fn wrong_content_is_mismatch() {
    assert_eq!(
        check_paste(200, &ok_body(42, "SomethingElse"), 42, PASTE),
        Err(IssueError::ContentMismatch)
    );
}

#[test]
fn uid_check_precedes_content_check() {
    // Both wrong: uid mismatch wins.
    assert_eq!(
        check_paste(200, &ok_body(43, "SomethingElse"), 42, PASTE),
        Err(IssueError::UidMismatch)
    );
}

#[test]
fn error_types_are_stable() {
    assert_eq!(IssueError::UidNotAllowed.error_type(), "UID_NOT_ALLOWED");
    assert_eq!(IssueError::PasteNotFound.error_type(), "PASTE_NOT_FOUND");
    assert_eq!(IssueError::UidMismatch.error_type(), "UID_MISMATCH");
    assert_eq!(IssueError::ContentMismatch.error_type(), "CONTENT_MISMATCH");
    assert_eq!(IssueError::Upstream(String::new()).error_type(), "SERVER_ERROR");
}

#[test]
fn rejections_are_distinguished_from_upstream_failures() {
    assert!(IssueError::UidNotAllowed.is_rejection());
    assert!(IssueError::PasteNotFound.is_rejection());
    assert!(IssueError::UidMismatch.is_rejection());
    assert!(IssueError::ContentMismatch.is_rejection());
    assert!(!IssueError::Upstream(String::new()).is_rejection());
}

#[tokio::test]
async fn uid_above_cap_is_rejected_before_any_fetch() {
    let mut config = crate::state::test_helpers::test_config();
    config.max_allowed_uid = Some(100);
    let core = crate::state::Core::new(crate::board::PixelStore::new(4, 2));
    let state = crate::state::AppState::new(config, core, None);

    // The client points nowhere; the cap check must short-circuit first.
    let paste = PasteClient::with_base("http://127.0.0.1:1");
    let err = generate_token(&state, &paste, 101, "abc123").await.unwrap_err();
    assert_eq!(err, IssueError::UidNotAllowed);
}
