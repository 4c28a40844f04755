use super::*;
use crate::client::{ChatClient, InboundMessage, LinkButton, MediaKind};
use crate::error::ClientError;

#[test]
fn api_url_embeds_token_and_method() {
    let client = TelegramClient::new("123:ABC".into(), 30);
    assert_eq!(
        client.api_url("getMe"),
        "https://api.telegram.org/bot123:ABC/getMe"
    );
    assert_eq!(
        client.api_url("copyMessage"),
        "https://api.telegram.org/bot123:ABC/copyMessage"
    );
}

#[test]
fn max_message_length_is_protocol_ceiling() {
    let client = TelegramClient::new("t".into(), 30);
    assert_eq!(client.max_message_length(), 4096);
}

// ── Error classification ────────────────────────────────────────

#[test]
fn flood_wait_classified_with_retry_after() {
    let payload = serde_json::json!({
        "ok": false,
        "error_code": 429,
        "description": "Too Many Requests: retry after 17",
        "parameters": { "retry_after": 17 }
    });
    match classify_api_error(&payload) {
        ClientError::FloodWait(secs) => assert_eq!(secs, 17),
        other => panic!("expected FloodWait, got {other:?}"),
    }
}

#[test]
fn chat_not_found_classified_as_not_found() {
    let payload = serde_json::json!({
        "ok": false,
        "error_code": 400,
        "description": "Bad Request: chat not found"
    });
    assert!(matches!(
        classify_api_error(&payload),
        ClientError::NotFound(_)
    ));
}

#[test]
fn other_errors_classified_as_rpc() {
    let payload = serde_json::json!({
        "ok": false,
        "error_code": 403,
        "description": "Forbidden: bot was kicked"
    });
    assert!(matches!(classify_api_error(&payload), ClientError::Rpc(_)));
}

// ── Identifier normalization ────────────────────────────────────

#[test]
fn numeric_identifier_passes_through() {
    assert_eq!(normalize_identifier("-1001234567"), serde_json::json!(-1001234567i64));
    assert_eq!(normalize_identifier("42"), serde_json::json!(42));
}

#[test]
fn handles_and_links_normalize_to_at_handle() {
    assert_eq!(normalize_identifier("@channel"), serde_json::json!("@channel"));
    assert_eq!(normalize_identifier("channel"), serde_json::json!("@channel"));
    assert_eq!(
        normalize_identifier("https://t.me/channel"),
        serde_json::json!("@channel")
    );
    assert_eq!(
        normalize_identifier("t.me/channel/"),
        serde_json::json!("@channel")
    );
}

// ── Inline keyboard layout ──────────────────────────────────────

#[test]
fn keyboard_rows_two_then_one() {
    let buttons = vec![
        LinkButton { text: "a".into(), url: "https://a".into() },
        LinkButton { text: "b".into(), url: "https://b".into() },
        LinkButton { text: "c".into(), url: "https://c".into() },
    ];
    let markup = inline_keyboard(&buttons).expect("markup");
    let rows = markup["inline_keyboard"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].as_array().map(Vec::len), Some(2));
    assert_eq!(rows[1].as_array().map(Vec::len), Some(1));
    assert_eq!(rows[1][0]["text"], "c");
}

#[test]
fn no_buttons_means_no_markup() {
    assert!(inline_keyboard(&[]).is_none());
}

#[test]
fn copy_body_sets_caption_even_when_cleaning_emptied_it() {
    let message = InboundMessage {
        chat_id: -100123,
        message_id: 4,
        sender_id: None,
        text: "t.me/spam".into(),
        media: Some(MediaKind::Photo),
    };

    // An empty caption must still be sent, or the original caption survives.
    let body = copy_body(7, &message, "", &[]);
    assert_eq!(body["caption"], "");
    assert_eq!(body["from_chat_id"], -100123);
    assert_eq!(body["message_id"], 4);

    let body = copy_body(7, &message, "cleaned", &[]);
    assert_eq!(body["caption"], "cleaned");
}

// ── Message parsing ─────────────────────────────────────────────

#[test]
fn parses_text_message() {
    let raw = serde_json::json!({
        "message_id": 7,
        "chat": { "id": -100123 },
        "from": { "id": 55 },
        "text": "hello"
    });
    let msg = parse_message(&raw).expect("message");
    assert_eq!(msg.chat_id, -100123);
    assert_eq!(msg.message_id, 7);
    assert_eq!(msg.sender_id, Some(55));
    assert_eq!(msg.text, "hello");
    assert!(msg.media.is_none());
}

#[test]
fn caption_used_when_no_text() {
    let raw = serde_json::json!({
        "message_id": 8,
        "chat": { "id": 1 },
        "photo": [{ "file_id": "x" }],
        "caption": "look"
    });
    let msg = parse_message(&raw).expect("message");
    assert_eq!(msg.text, "look");
    assert_eq!(msg.media, Some(MediaKind::Photo));
    assert_eq!(msg.sender_id, None);
}

#[test]
fn animation_wins_over_document() {
    // Gif updates carry both `animation` and `document`.
    let raw = serde_json::json!({
        "message_id": 9,
        "chat": { "id": 1 },
        "animation": { "file_id": "a" },
        "document": { "file_id": "a" }
    });
    let msg = parse_message(&raw).expect("message");
    assert_eq!(msg.media, Some(MediaKind::Gif));
}

#[test]
fn titled_audio_is_music_untitled_is_audio() {
    let titled = serde_json::json!({
        "message_id": 10,
        "chat": { "id": 1 },
        "audio": { "file_id": "a", "title": "Song" }
    });
    let untitled = serde_json::json!({
        "message_id": 11,
        "chat": { "id": 1 },
        "audio": { "file_id": "a" }
    });
    assert_eq!(parse_message(&titled).unwrap().media, Some(MediaKind::Music));
    assert_eq!(parse_message(&untitled).unwrap().media, Some(MediaKind::Audio));
}

#[test]
fn venue_and_location_both_classify_as_location() {
    let venue = serde_json::json!({
        "message_id": 12,
        "chat": { "id": 1 },
        "venue": { "title": "cafe" },
        "location": { "latitude": 0.0, "longitude": 0.0 }
    });
    assert_eq!(
        parse_message(&venue).unwrap().media,
        Some(MediaKind::Location)
    );
}

#[test]
fn service_message_without_chat_is_dropped() {
    let raw = serde_json::json!({ "message_id": 13 });
    assert!(parse_message(&raw).is_none());
}
