//! Integration tests for the WhatsApp webhook routes.

mod common;

use std::time::{Duration, Instant};

use {
    hmac::{Hmac, Mac},
    secrecy::Secret,
    sha2::Sha256,
};

use {
    handoff_config::schema::DEFAULT_FALLBACK_REPLY,
    handoff_sessions::{ConversationStore, MessageSender},
};

use common::{VERIFY_TOKEN, start_server, start_server_with_delay, test_config, text_payload};

const SENDER: &str = "5491122334455";

#[tokio::test]
async fn subscription_handshake_echoes_challenge() {
    let server = start_server(test_config(), "ok").await;

    let resp = server
        .client
        .get(server.url("/webhook"))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", VERIFY_TOKEN),
            ("hub.challenge", "1158201444"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "1158201444");

    let resp = server
        .client
        .get(server.url("/webhook"))
        .query(&[
            ("hub.mode", "subscribe"),
            ("hub.verify_token", "wrong"),
            ("hub.challenge", "1158201444"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn handoff_request_escalates_and_acknowledges() {
    let server = start_server(test_config(), "no debería usarse").await;

    let resp = server
        .client
        .post(server.url("/webhook"))
        .json(&text_payload(SENDER, "wamid.1", "Quiero hablar con un asesor"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    assert!(server.store.is_escalated(SENDER).await.unwrap());
    assert_eq!(server.responder_calls(), 0);
    assert_eq!(server.outbound.sent(), vec![(
        "541122334455".to_string(),
        DEFAULT_FALLBACK_REPLY.to_string()
    )]);
}

#[tokio::test]
async fn escalated_sender_gets_no_reply() {
    let server = start_server(test_config(), "respuesta").await;
    server.store.escalate(SENDER, "asesor", 1).await.unwrap();

    server
        .client
        .post(server.url("/webhook"))
        .json(&text_payload(SENDER, "wamid.2", "¿Siguen ahí?"))
        .send()
        .await
        .unwrap();

    assert_eq!(server.responder_calls(), 0);
    assert!(server.outbound.sent().is_empty());
    let transcript = server.store.transcript(SENDER).await.unwrap();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].sender, MessageSender::User);
}

#[tokio::test]
async fn ordinary_message_is_auto_replied_once() {
    let server = start_server(test_config(), "Sin turno, por orden de llegada").await;
    let payload = text_payload(SENDER, "wamid.3", "¿Necesito turno?");

    for _ in 0..2 {
        let resp = server
            .client
            .post(server.url("/webhook"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    assert_eq!(server.responder_calls(), 1);
    assert_eq!(server.outbound.sent().len(), 1);
    assert!(!server.store.is_escalated(SENDER).await.unwrap());
}

#[tokio::test]
async fn slow_responder_does_not_delay_acknowledgment() {
    let mut config = test_config();
    config.gateway.ack_timeout_secs = 1;
    let server = start_server_with_delay(
        config,
        "Abrimos a las 9",
        Some(Duration::from_secs(3)),
    )
    .await;

    let started = Instant::now();
    let resp = server
        .client
        .post(server.url("/webhook"))
        .json(&text_payload(SENDER, "wamid.slow", "¿horario?"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert!(started.elapsed() < Duration::from_millis(2500));
    assert!(server.outbound.sent().is_empty());

    // Routing keeps running after the acknowledgment.
    let deadline = Instant::now() + Duration::from_secs(10);
    while server.outbound.sent().is_empty() && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(server.outbound.sent()[0].1, "Abrimos a las 9");
    assert_eq!(server.responder_calls(), 1);
}

#[tokio::test]
async fn non_text_and_malformed_payloads_are_acknowledged() {
    let server = start_server(test_config(), "ok").await;

    let mut image = text_payload(SENDER, "wamid.4", "");
    image["entry"][0]["changes"][0]["value"]["messages"][0]["type"] = "image".into();
    let resp = server
        .client
        .post(server.url("/webhook"))
        .json(&image)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = server
        .client
        .post(server.url("/webhook"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    assert_eq!(server.responder_calls(), 0);
    assert!(server.outbound.sent().is_empty());
}

#[tokio::test]
async fn signature_is_enforced_when_app_secret_set() {
    let mut config = test_config();
    config.whatsapp.app_secret = Some(Secret::new("app-secret".into()));
    let server = start_server(config, "ok").await;
    let body = serde_json::to_vec(&text_payload(SENDER, "wamid.5", "hola")).unwrap();

    let resp = server
        .client
        .post(server.url("/webhook"))
        .header("content-type", "application/json")
        .header("x-hub-signature-256", "sha256=deadbeef")
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(server.responder_calls(), 0);

    let mut mac = Hmac::<Sha256>::new_from_slice(b"app-secret").unwrap();
    mac.update(&body);
    let signature = format!("sha256={}", hex::encode(mac.finalize().into_bytes()));
    let resp = server
        .client
        .post(server.url("/webhook"))
        .header("content-type", "application/json")
        .header("x-hub-signature-256", signature)
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(server.responder_calls(), 1);
}

#[tokio::test]
async fn health_reports_ok() {
    let server = start_server(test_config(), "ok").await;
    let body: serde_json::Value = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}
