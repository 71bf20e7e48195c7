use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chanmux_frame::{
    control_frame, decode_frame, ChannelId, ControlCommand, Frame, DEFAULT_MAX_PAYLOAD,
};
use chanmux_server::{Channel, Handler, MuxConfig, MuxError, MuxReport, Multiplexer, RouterExit};
use chanmux_transport::{
    MemoryReader, MemoryTransport, MemoryWriter, Message, MessageKind, MessageReader,
    MessageTransport, MessageWriter,
};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(5);

struct Client {
    reader: MemoryReader,
    writer: MemoryWriter,
}

impl Client {
    async fn open(&mut self, id: ChannelId) {
        self.writer
            .write_binary(control_frame(&ControlCommand::OpenChannel(id)))
            .await
            .expect("open should send");
    }

    async fn send(&mut self, id: ChannelId, payload: &'static [u8]) {
        self.writer
            .write_binary(Frame::new(id, Bytes::from_static(payload)).to_bytes())
            .await
            .expect("frame should send");
    }

    async fn raw(&mut self, bytes: &'static [u8]) {
        self.writer
            .write_binary(Bytes::from_static(bytes))
            .await
            .expect("raw frame should send");
    }

    async fn next_frame(&mut self) -> Frame {
        let message = timeout(WAIT, self.reader.read())
            .await
            .expect("frame should arrive in time")
            .expect("read should succeed")
            .expect("stream should be open");
        assert!(message.is_binary(), "expected binary, got {message}");
        decode_frame(message.data, DEFAULT_MAX_PAYLOAD).expect("frame should decode")
    }

    async fn expect_close(&mut self) {
        let message = timeout(WAIT, self.reader.read())
            .await
            .expect("close should arrive in time")
            .expect("read should succeed")
            .expect("close message expected before end of stream");
        assert_eq!(message.kind, MessageKind::Close);
    }

    async fn hang_up(&mut self) {
        self.writer.close().await.expect("close should succeed");
    }
}

fn start<H: Handler>(handler: H) -> (JoinHandle<chanmux_server::Result<MuxReport>>, Client) {
    start_with_config(handler, MuxConfig::default())
}

fn start_with_config<H: Handler>(
    handler: H,
    config: MuxConfig,
) -> (JoinHandle<chanmux_server::Result<MuxReport>>, Client) {
    let (server, client) = MemoryTransport::pair();
    let mux = Multiplexer::new(server, handler).with_config(config);
    let handle = tokio::spawn(mux.run());
    let (reader, writer) = client.split();
    (handle, Client { reader, writer })
}

async fn finish(
    handle: JoinHandle<chanmux_server::Result<MuxReport>>,
) -> chanmux_server::Result<MuxReport> {
    timeout(WAIT, handle)
        .await
        .expect("multiplexer should finish in time")
        .expect("multiplexer task should not panic")
}

/// Collects every payload a channel receives and reports it when input ends.
fn collector(done: mpsc::UnboundedSender<(ChannelId, Vec<Bytes>)>) -> impl Handler {
    move |mut channel: Channel| {
        let done = done.clone();
        async move {
            let id = channel.id();
            let received: Vec<Bytes> = channel.read().collect().await;
            let _ = done.send((id, received));
        }
    }
}

#[tokio::test]
async fn open_write_and_shutdown_end_to_end() {
    let (events_tx, mut events) = mpsc::unbounded_channel();
    let handler = move |mut channel: Channel| {
        let events = events_tx.clone();
        async move {
            let _ = events.send(format!("open {}", channel.id()));
            channel.write(b"hi").await.expect("write should succeed");
            while channel.recv().await.is_some() {}
            let _ = events.send(format!("end {}", channel.id()));
        }
    };
    let (handle, mut client) = start(handler);

    client.raw(&[0x00, 0x01, 0x07]).await;
    assert_eq!(events.recv().await.unwrap(), "open 7");

    let frame = client.next_frame().await;
    assert_eq!(frame.channel, 7);
    assert_eq!(frame.payload.as_ref(), b"hi");

    client.hang_up().await;
    assert_eq!(events.recv().await.unwrap(), "end 7");

    let report = finish(handle).await.expect("connection should close cleanly");
    assert_eq!(report.channels_opened, 1);
    assert_eq!(report.frames_out, 1);
    assert!(report.is_clean());
    client.expect_close().await;
}

#[tokio::test]
async fn frames_are_routed_without_cross_contamination() {
    let (done_tx, mut done) = mpsc::unbounded_channel();
    let (handle, mut client) = start(collector(done_tx));

    client.open(3).await;
    client.open(5).await;
    client.send(3, b"a1").await;
    client.send(5, b"b1").await;
    client.send(3, b"a2").await;
    client.send(5, b"b2").await;
    client.send(3, b"a3").await;
    client.hang_up().await;

    let mut results = HashMap::new();
    for _ in 0..2 {
        let (id, payloads) = timeout(WAIT, done.recv()).await.unwrap().unwrap();
        results.insert(id, payloads);
    }
    assert_eq!(
        results[&3],
        vec![
            Bytes::from_static(b"a1"),
            Bytes::from_static(b"a2"),
            Bytes::from_static(b"a3")
        ]
    );
    assert_eq!(
        results[&5],
        vec![Bytes::from_static(b"b1"), Bytes::from_static(b"b2")]
    );

    let report = finish(handle).await.unwrap();
    assert_eq!(report.channels_opened, 2);
    assert_eq!(report.frames_in, 7);
}

#[tokio::test]
async fn stalled_channel_blocks_delivery_to_others() {
    let (release, gate) = oneshot::channel::<()>();
    let gate = Arc::new(Mutex::new(Some(gate)));
    let (arrived_tx, mut arrived) = mpsc::unbounded_channel();
    let handler = move |mut channel: Channel| {
        let gate = match channel.id() {
            1 => gate.lock().expect("lock").take(),
            _ => None,
        };
        let arrived = arrived_tx.clone();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            while let Some(payload) = channel.recv().await {
                let _ = arrived.send((channel.id(), payload));
            }
        }
    };
    let (handle, mut client) = start(handler);

    client.open(1).await;
    client.send(1, b"stuck").await;
    client.open(2).await;
    client.send(2, b"behind").await;

    // Channel 1 has not taken its frame, so nothing behind it is routed.
    assert!(timeout(Duration::from_millis(200), arrived.recv())
        .await
        .is_err());

    release.send(()).unwrap();
    let mut got = vec![
        timeout(WAIT, arrived.recv()).await.unwrap().unwrap(),
        timeout(WAIT, arrived.recv()).await.unwrap().unwrap(),
    ];
    got.sort_unstable();
    assert_eq!(
        got,
        vec![
            (1, Bytes::from_static(b"stuck")),
            (2, Bytes::from_static(b"behind"))
        ]
    );

    client.hang_up().await;
    let report = finish(handle).await.unwrap();
    assert_eq!(report.frames_in, 4);
}

#[tokio::test]
async fn duplicate_open_keeps_the_original_channel() {
    let invocations = Arc::new(AtomicUsize::new(0));
    let (done_tx, mut done) = mpsc::unbounded_channel();
    let counter = Arc::clone(&invocations);
    let handler = move |mut channel: Channel| {
        counter.fetch_add(1, Ordering::SeqCst);
        let done = done_tx.clone();
        async move {
            let received: Vec<Bytes> = channel.read().collect().await;
            let _ = done.send((channel.id(), received));
        }
    };
    let (handle, mut client) = start(handler);

    client.open(4).await;
    client.send(4, b"before").await;
    client.open(4).await;
    client.send(4, b"after").await;
    client.hang_up().await;

    let (id, payloads) = timeout(WAIT, done.recv()).await.unwrap().unwrap();
    assert_eq!(id, 4);
    assert_eq!(
        payloads,
        vec![Bytes::from_static(b"before"), Bytes::from_static(b"after")]
    );

    let report = finish(handle).await.unwrap();
    assert_eq!(report.channels_opened, 1);
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn reserved_id_is_never_opened() {
    let ids = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&ids);
    let handler = move |mut channel: Channel| {
        seen.lock().expect("lock").push(channel.id());
        async move { while channel.recv().await.is_some() {} }
    };
    let (handle, mut client) = start(handler);

    client.open(0).await;
    client.open(1).await;
    client.send(1, b"ok").await;
    client.hang_up().await;

    let report = finish(handle).await.unwrap();
    assert_eq!(report.channels_opened, 1);
    assert_eq!(*ids.lock().expect("lock"), vec![1]);
}

#[tokio::test]
async fn control_anomalies_do_not_end_the_connection() {
    let (done_tx, mut done) = mpsc::unbounded_channel();
    let (handle, mut client) = start(collector(done_tx));

    client.raw(&[0x00]).await; // empty control message
    client.raw(&[0x00, 0x09]).await; // unknown command
    client.raw(&[0x00, 0x02, 0x01]).await; // close command is not accepted
    client.raw(&[0x00, 0x01]).await; // open without an id
    client.open(2).await;
    client.send(2, b"still here").await;
    client.hang_up().await;

    let (id, payloads) = timeout(WAIT, done.recv()).await.unwrap().unwrap();
    assert_eq!(id, 2);
    assert_eq!(payloads, vec![Bytes::from_static(b"still here")]);
    assert!(finish(handle).await.unwrap().is_clean());
}

#[tokio::test]
async fn teardown_waits_for_every_handler() {
    let gates: Arc<Mutex<HashMap<ChannelId, oneshot::Receiver<()>>>> = Arc::default();
    let (ended_tx, mut ended) = mpsc::unbounded_channel();
    let (release_a, gate_a) = oneshot::channel();
    let (release_b, gate_b) = oneshot::channel();
    gates.lock().expect("lock").insert(1, gate_a);
    gates.lock().expect("lock").insert(2, gate_b);

    let handler_gates = Arc::clone(&gates);
    let handler = move |mut channel: Channel| {
        let gate = handler_gates
            .lock()
            .expect("lock")
            .remove(&channel.id())
            .expect("gate per channel");
        let ended = ended_tx.clone();
        async move {
            while channel.recv().await.is_some() {}
            let _ = ended.send(channel.id());
            let _ = gate.await;
        }
    };
    let (handle, mut client) = start(handler);

    client.open(1).await;
    client.open(2).await;
    client.hang_up().await;

    // Both channels see their input end once the transport is gone.
    let mut seen = vec![
        timeout(WAIT, ended.recv()).await.unwrap().unwrap(),
        timeout(WAIT, ended.recv()).await.unwrap().unwrap(),
    ];
    seen.sort_unstable();
    assert_eq!(seen, vec![1, 2]);

    sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished(), "torn down while A and B still running");

    release_a.send(()).unwrap();
    sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished(), "torn down while B still running");

    release_b.send(()).unwrap();
    let report = finish(handle).await.unwrap();
    assert_eq!(report.channels_opened, 2);
    client.expect_close().await;
}

#[tokio::test]
async fn handler_close_ends_only_its_input() {
    let (done_tx, mut done) = mpsc::unbounded_channel();
    let handler = move |mut channel: Channel| {
        let done = done_tx.clone();
        async move {
            if channel.id() == 1 {
                channel.close().await.expect("close should enqueue");
                channel.close().await.expect("second close is a no-op");
                let rest: Vec<Bytes> = channel.read().collect().await;
                channel.write(b"bye").await.expect("write after close");
                let _ = done.send((channel.id(), rest));
            } else {
                let got: Vec<Bytes> = channel.read().collect().await;
                let _ = done.send((channel.id(), got));
            }
        }
    };
    let (handle, mut client) = start(handler);

    client.open(1).await;
    let frame = client.next_frame().await;
    assert_eq!((frame.channel, frame.payload.as_ref()), (1, &b"bye"[..]));
    let (id, rest) = timeout(WAIT, done.recv()).await.unwrap().unwrap();
    assert_eq!(id, 1);
    assert!(rest.is_empty());

    client.open(2).await;
    client.send(2, b"x").await;
    client.hang_up().await;
    let (id, got) = timeout(WAIT, done.recv()).await.unwrap().unwrap();
    assert_eq!(id, 2);
    assert_eq!(got, vec![Bytes::from_static(b"x")]);

    finish(handle).await.unwrap();
}

#[tokio::test]
async fn unknown_channel_aborts_the_connection() {
    let (done_tx, mut done) = mpsc::unbounded_channel();
    let (handle, mut client) = start(collector(done_tx));

    client.open(1).await;
    client.send(9, b"nobody").await;

    let (id, payloads) = timeout(WAIT, done.recv()).await.unwrap().unwrap();
    assert_eq!(id, 1);
    assert!(payloads.is_empty());

    let err = finish(handle).await.unwrap_err();
    assert!(matches!(err, MuxError::UnknownChannelId(9)));
    client.expect_close().await;
}

#[tokio::test]
async fn text_message_is_fatal() {
    let (handle, mut client) = start(|_channel: Channel| async {});
    client
        .writer
        .write(Message::text("hello"))
        .await
        .unwrap();

    let err = finish(handle).await.unwrap_err();
    assert!(matches!(
        err,
        MuxError::UnsupportedMessageKind(MessageKind::Text)
    ));
}

#[tokio::test]
async fn malformed_channel_id_is_fatal() {
    let (handle, mut client) = start(|_channel: Channel| async {});
    client.raw(&[0x80]).await;

    let err = finish(handle).await.unwrap_err();
    assert!(matches!(err, MuxError::MalformedChannelId(_)));
}

#[tokio::test]
async fn oversized_frame_is_fatal() {
    let config = MuxConfig {
        max_payload_size: 4,
        ..MuxConfig::default()
    };
    let (handle, mut client) = start_with_config(
        |mut channel: Channel| async move { while channel.recv().await.is_some() {} },
        config,
    );
    client.open(1).await;
    client.send(1, b"too large").await;

    let err = finish(handle).await.unwrap_err();
    assert!(matches!(err, MuxError::Frame(_)));
}

#[tokio::test]
async fn panicking_handler_does_not_block_teardown() {
    let (handle, mut client) = start(|channel: Channel| async move {
        if channel.id() == 1 {
            panic!("handler failure");
        }
    });
    client.open(1).await;
    client.hang_up().await;

    let report = finish(handle).await.unwrap();
    assert_eq!(report.channels_opened, 1);
}

#[tokio::test]
async fn write_failure_tears_the_connection_down() {
    let (server, client) = MemoryTransport::pair();
    let (client_reader, mut client_writer) = client.split();
    drop(client_reader);

    let handler = |mut channel: Channel| async move {
        let _ = channel.write(b"lost").await;
        while channel.recv().await.is_some() {}
    };
    let handle = tokio::spawn(Multiplexer::new(server, handler).run());

    client_writer
        .write_binary(control_frame(&ControlCommand::OpenChannel(1)))
        .await
        .unwrap();

    let err = finish(handle).await.unwrap_err();
    assert!(matches!(err, MuxError::TransportWrite(_)));
}

#[tokio::test]
async fn idle_connection_closes_when_peer_leaves() {
    let (handle, mut client) = start(|_channel: Channel| async {});
    client.hang_up().await;

    let report = finish(handle).await.unwrap();
    assert_eq!(report.channels_opened, 0);
    assert!(matches!(report.router_exit, RouterExit::PeerClosed));
    client.expect_close().await;
}
