use crate::fixtures::rtp::pcmu_rtp_parameters;
use crate::fixtures::test_app::TestApp;
use crate::fixtures::ws_client::WsClient;

#[tokio::test]
async fn join_room_returns_transports_and_router_capabilities() {
    let app = TestApp::spawn().await;
    let mut client = WsClient::connect(&app.ws_url).await;

    let ack = client.join_room("room-1", "alice").await;

    assert!(ack["sendTransport"]["id"].is_string());
    assert!(ack["recvTransport"]["id"].is_string());
    assert_ne!(ack["sendTransport"]["id"], ack["recvTransport"]["id"]);
    assert!(ack["routerRtpCapabilities"]["codecs"].is_array());

    client.close().await;
}

#[tokio::test]
async fn second_peer_join_notifies_first_peer() {
    let app = TestApp::spawn().await;
    let mut alice = WsClient::connect(&app.ws_url).await;
    let mut bob = WsClient::connect(&app.ws_url).await;

    let _ = alice.join_room("room-2", "alice").await;
    let _ = bob.join_room("room-2", "bob").await;

    let event = alice.recv().await;
    assert_eq!(event["type"], "peer-joined");
    assert_eq!(event["data"]["peerId"], "bob");

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn duplicate_peer_id_in_same_room_is_rejected() {
    let app = TestApp::spawn().await;
    let mut alice = WsClient::connect(&app.ws_url).await;
    let mut alice_again = WsClient::connect(&app.ws_url).await;

    let _ = alice.join_room("room-3", "alice").await;
    let reply = alice_again.join_room("room-3", "alice").await;

    assert!(reply["error"].is_string());

    alice.close().await;
    alice_again.close().await;
}

#[tokio::test]
async fn get_producers_is_empty_for_a_freshly_joined_room() {
    let app = TestApp::spawn().await;
    let mut client = WsClient::connect(&app.ws_url).await;

    let _ = client.join_room("room-4", "alice").await;
    client.send("get-producers", serde_json::json!({})).await;
    let reply = client.recv().await;

    assert_eq!(reply["producers"].as_array().unwrap().len(), 0);

    client.close().await;
}

#[tokio::test]
async fn requests_before_join_room_are_rejected() {
    let app = TestApp::spawn().await;
    let mut client = WsClient::connect(&app.ws_url).await;

    client.send("get-producers", serde_json::json!({})).await;
    let reply = client.recv().await;

    assert!(reply["error"].is_string());

    client.close().await;
}

#[tokio::test]
async fn malformed_request_produces_an_error_ack_not_a_dropped_connection() {
    let app = TestApp::spawn().await;
    let mut client = WsClient::connect(&app.ws_url).await;

    // Unknown shape entirely: no "type" tag the server's tagged enum knows.
    client.send("not-a-real-request-type", serde_json::json!({})).await;

    // The connection must still be alive and able to join afterwards.
    let ack = client.join_room("room-5", "alice").await;
    assert!(ack["sendTransport"]["id"].is_string());

    client.close().await;
}

#[tokio::test]
async fn peer_leaving_notifies_remaining_peers() {
    let app = TestApp::spawn().await;
    let mut alice = WsClient::connect(&app.ws_url).await;
    let mut bob = WsClient::connect(&app.ws_url).await;

    let _ = alice.join_room("room-6", "alice").await;
    let _ = bob.join_room("room-6", "bob").await;
    let _ = alice.recv().await; // alice's peer-joined event for bob

    bob.close().await;

    let event = alice.recv().await;
    assert_eq!(event["type"], "peer-left");
    assert_eq!(event["data"]["peerId"], "bob");

    alice.close().await;
}

#[tokio::test]
async fn connect_transport_rejects_an_unknown_transport_id() {
    let app = TestApp::spawn().await;
    let mut client = WsClient::connect(&app.ws_url).await;
    let _ = client.join_room("room-7", "alice").await;

    client
        .send(
            "connect-transport",
            serde_json::json!({
                "transportId": "00000000-0000-0000-0000-000000000000",
                "dtlsParameters": { "role": "auto", "fingerprints": [] },
            }),
        )
        .await;
    let reply = client.recv().await;

    assert!(reply["error"].is_string());

    client.close().await;
}

#[tokio::test]
async fn resume_consumer_rejects_an_unknown_consumer_id() {
    let app = TestApp::spawn().await;
    let mut client = WsClient::connect(&app.ws_url).await;
    let _ = client.join_room("room-8", "alice").await;

    client
        .send(
            "resume-consumer",
            serde_json::json!({ "consumerId": "00000000-0000-0000-0000-000000000000" }),
        )
        .await;
    let reply = client.recv().await;

    assert!(reply["error"].is_string());

    client.close().await;
}

#[tokio::test]
async fn produce_on_the_send_transport_returns_a_producer_id() {
    let app = TestApp::spawn().await;
    let mut client = WsClient::connect(&app.ws_url).await;
    let ack = client.join_room("room-9", "alice").await;
    let send_transport_id = ack["sendTransport"]["id"].as_str().unwrap().to_string();

    let rtp_parameters = serde_json::to_value(pcmu_rtp_parameters(11_111_111)).unwrap();
    client
        .send(
            "produce",
            serde_json::json!({
                "transportId": send_transport_id,
                "kind": "audio",
                "rtpParameters": rtp_parameters,
            }),
        )
        .await;
    let reply = client.recv().await;

    assert!(reply["id"].is_string(), "unexpected produce reply: {reply}");

    client.close().await;
}

#[tokio::test]
async fn second_peer_can_consume_a_producer_and_receives_new_producer_event() {
    let app = TestApp::spawn().await;
    let mut alice = WsClient::connect(&app.ws_url).await;
    let mut bob = WsClient::connect(&app.ws_url).await;

    let alice_ack = alice.join_room("room-10", "alice").await;
    let alice_send_transport = alice_ack["sendTransport"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let bob_ack = bob.join_room("room-10", "bob").await;
    let _ = alice.recv().await; // alice's peer-joined event for bob

    let rtp_parameters = serde_json::to_value(pcmu_rtp_parameters(22_222_222)).unwrap();
    alice
        .send(
            "produce",
            serde_json::json!({
                "transportId": alice_send_transport,
                "kind": "audio",
                "rtpParameters": rtp_parameters,
            }),
        )
        .await;
    let produce_reply = alice.recv().await;
    let producer_id = produce_reply["id"].as_str().unwrap().to_string();

    let new_producer_event = bob.recv().await;
    assert_eq!(new_producer_event["type"], "new-producer");
    assert_eq!(new_producer_event["data"]["peerId"], "alice");
    assert_eq!(new_producer_event["data"]["producerId"], producer_id);

    let bob_recv_transport = bob_ack["recvTransport"]["id"].as_str().unwrap().to_string();
    bob.send(
        "consume",
        serde_json::json!({
            "transportId": bob_recv_transport,
            "producerId": producer_id,
            "rtpCapabilities": bob_ack["routerRtpCapabilities"],
        }),
    )
    .await;
    let consume_reply = bob.recv().await;

    assert!(
        consume_reply["id"].is_string(),
        "unexpected consume reply: {consume_reply}"
    );
    assert_eq!(consume_reply["producerId"], producer_id);
    assert_eq!(consume_reply["kind"], "audio");
    assert!(consume_reply["rtpParameters"]["codecs"].is_array());

    alice.close().await;
    bob.close().await;
}

#[tokio::test]
async fn a_peer_cannot_consume_its_own_producer() {
    let app = TestApp::spawn().await;
    let mut client = WsClient::connect(&app.ws_url).await;
    let ack = client.join_room("room-11", "alice").await;
    let send_transport_id = ack["sendTransport"]["id"].as_str().unwrap().to_string();
    let recv_transport_id = ack["recvTransport"]["id"].as_str().unwrap().to_string();

    let rtp_parameters = serde_json::to_value(pcmu_rtp_parameters(33_333_333)).unwrap();
    client
        .send(
            "produce",
            serde_json::json!({
                "transportId": send_transport_id,
                "kind": "audio",
                "rtpParameters": rtp_parameters,
            }),
        )
        .await;
    let produce_reply = client.recv().await;
    let producer_id = produce_reply["id"].as_str().unwrap().to_string();

    client
        .send(
            "consume",
            serde_json::json!({
                "transportId": recv_transport_id,
                "producerId": producer_id,
                "rtpCapabilities": ack["routerRtpCapabilities"],
            }),
        )
        .await;
    let reply = client.recv().await;

    assert!(reply["error"].is_string(), "expected a rejection, got: {reply}");

    client.close().await;
}

#[tokio::test]
async fn late_joiner_sees_an_existing_producer_via_get_producers() {
    let app = TestApp::spawn().await;
    let mut alice = WsClient::connect(&app.ws_url).await;

    let alice_ack = alice.join_room("room-12", "alice").await;
    let alice_send_transport = alice_ack["sendTransport"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let rtp_parameters = serde_json::to_value(pcmu_rtp_parameters(44_444_444)).unwrap();
    alice
        .send(
            "produce",
            serde_json::json!({
                "transportId": alice_send_transport,
                "kind": "audio",
                "rtpParameters": rtp_parameters,
            }),
        )
        .await;
    let produce_reply = alice.recv().await;
    let producer_id = produce_reply["id"].as_str().unwrap().to_string();

    let mut bob = WsClient::connect(&app.ws_url).await;
    let _ = bob.join_room("room-12", "bob").await;
    let _ = alice.recv().await; // alice's peer-joined event for bob

    bob.send("get-producers", serde_json::json!({})).await;
    let reply = bob.recv().await;

    let producers = reply["producers"].as_array().unwrap();
    assert_eq!(producers.len(), 1);
    assert_eq!(producers[0]["peerId"], "alice");
    assert_eq!(producers[0]["producerId"], producer_id);
    assert_eq!(producers[0]["kind"], "audio");

    alice.close().await;
    bob.close().await;
}
