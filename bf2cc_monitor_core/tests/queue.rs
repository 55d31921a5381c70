mod common;

use std::time::Duration;

use bf2cc_monitor_core::{
    commands::{Alias, Visibility},
    monitor::DataFiles,
    rcon::{CommandQueue, QueueError},
    LogHub, Monitor, Rcon, RconError,
};
use common::{Behaviour, FakeServer, PASSWORD};

async fn ready_session(server: &FakeServer) -> Rcon {
    let mut rcon = Rcon::new(&server.address);
    rcon.connect().await.unwrap();
    rcon.authenticate(PASSWORD, None).await.unwrap();
    rcon
}

#[tokio::test]
async fn commands_go_out_in_order_one_at_a_time() {
    let server = FakeServer::start(Behaviour {
        delay: Duration::from_millis(20),
        ..Default::default()
    })
    .await;
    let rcon = ready_session(&server).await;

    let (queue, mut consumer) = CommandQueue::new();
    let mut responses = consumer.responses();

    // Queued before the consumer starts, and from two producers
    let other = queue.clone();
    for i in 0..3 {
        queue.enqueue(format!("first {i}")).unwrap();
        other.enqueue(format!("second {i}")).unwrap();
    }
    let consumer = tokio::spawn(consumer.run(rcon));

    assert_eq!(queue.request("last").await.unwrap(), "ok last");
    for i in 0..3 {
        assert_eq!(responses.recv().await.unwrap(), format!("ok first {i}"));
        assert_eq!(responses.recv().await.unwrap(), format!("ok second {i}"));
    }

    assert_eq!(
        server.commands(),
        vec![
            "first 0", "second 0", "first 1", "second 1", "first 2", "second 2", "last"
        ]
    );
    assert!(!server.saw_pipelining());

    drop(queue);
    drop(other);
    consumer.await.unwrap().unwrap();
}

#[tokio::test]
async fn consumer_needs_an_authenticated_session() {
    let server = FakeServer::start(Behaviour::default()).await;
    let mut rcon = Rcon::new(&server.address);
    rcon.connect().await.unwrap();

    let (queue, consumer) = CommandQueue::new();
    let result = consumer.run(rcon).await;

    assert!(matches!(result, Err(RconError::NotReady(_))), "{result:?}");
    assert!(matches!(queue.enqueue("bf2cc si"), Err(QueueError::Closed)));
}

#[tokio::test]
async fn failed_session_stops_the_consumer() {
    let server = FakeServer::start(Behaviour {
        drop_after: Some(1),
        ..Default::default()
    })
    .await;
    let rcon = ready_session(&server).await;

    let (queue, consumer) = CommandQueue::new();
    let consumer = tokio::spawn(consumer.run(rcon));

    let result = queue.request("bf2cc si").await;
    assert!(
        matches!(result, Err(QueueError::Rcon(RconError::TransportLost(_)))),
        "{result:?}"
    );
    assert!(matches!(consumer.await.unwrap(), Err(RconError::Failed)));
    assert!(matches!(
        queue.request("bf2cc pl").await,
        Err(QueueError::Closed)
    ));
}

fn chat_server(command: &str) -> String {
    match command {
        "bf2cc clientchatbuffer" => "3\tAce\t1\tchat\t12:00\t!test".into(),
        other => format!("ok {other}"),
    }
}

#[tokio::test]
async fn monitor_polls_and_answers_chat() {
    let server = FakeServer::start(Behaviour {
        respond: chat_server,
        ..Default::default()
    })
    .await;
    let rcon = ready_session(&server).await;

    let dir = std::env::temp_dir().join(format!("bf2cc_queue_monitor_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let mut monitor = Monitor::new(DataFiles::in_directory(&dir), LogHub::default());
    monitor.aliases.insert(
        "test".into(),
        Alias::new(0, Visibility::Public, "testing successful"),
    );

    let finished = tokio::time::timeout(
        Duration::from_millis(300),
        monitor.run(rcon, Duration::from_millis(50)),
    )
    .await;
    assert!(finished.is_err(), "Monitor stopped early: {finished:?}");

    let commands = server.commands();
    assert_eq!(
        &commands[..4],
        &[
            "bf2cc monitor 1",
            "bf2cc si",
            "bf2cc pl",
            "bf2cc clientchatbuffer"
        ]
    );
    assert!(commands
        .iter()
        .any(|c| c == "bf2cc sendserverchat testing successful"));

    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn dropped_monitor_stops_polling() {
    let server = FakeServer::start(Behaviour::default()).await;
    let rcon = ready_session(&server).await;

    let dir = std::env::temp_dir().join(format!("bf2cc_queue_dropped_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let mut monitor = Monitor::new(DataFiles::in_directory(&dir), LogHub::default());

    let finished = tokio::time::timeout(
        Duration::from_millis(120),
        monitor.run(rcon, Duration::from_millis(20)),
    )
    .await;
    assert!(finished.is_err(), "Monitor stopped early: {finished:?}");

    // Let a command already on the wire be answered
    tokio::time::sleep(Duration::from_millis(20)).await;
    let sent = server.commands().len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.commands().len(), sent);

    std::fs::remove_dir_all(dir).unwrap();
}
