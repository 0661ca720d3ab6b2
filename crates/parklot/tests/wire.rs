//! End-to-end wire tests: a served pool driven over loopback TCP.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::{FramedRead, FramedWrite};

use parklot::Dispatcher;
use parklot::codec::JsonLineCodec;
use parklot::pool::{OccupancyRecord, PoolSnapshot, SlotPool};
use parklot::protocol::{CallStatus, Command, Request, Response};
use parklot::server::serve_on;

struct Client {
    reader: FramedRead<tokio::net::tcp::OwnedReadHalf, JsonLineCodec<Response>>,
    writer: FramedWrite<tokio::net::tcp::OwnedWriteHalf, JsonLineCodec<Request>>,
}

impl Client {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: FramedRead::new(read_half, JsonLineCodec::new()),
            writer: FramedWrite::new(write_half, JsonLineCodec::new()),
        }
    }

    async fn call(&mut self, command: Command) -> Response {
        self.writer.send(Request::new(command)).await.unwrap();
        self.reader.next().await.unwrap().unwrap()
    }
}

async fn start_server() -> (std::net::SocketAddr, watch::Sender<bool>) {
    start_server_with_deadline(Duration::from_secs(5)).await
}

async fn start_server_with_deadline(
    read_deadline: Duration,
) -> (std::net::SocketAddr, watch::Sender<bool>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dispatcher = Arc::new(Dispatcher::new(Arc::new(SlotPool::ordered())));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        serve_on(listener, dispatcher, read_deadline, shutdown_rx)
            .await
            .unwrap();
    });

    (addr, shutdown_tx)
}

#[tokio::test]
async fn full_session_over_tcp() {
    let (addr, _shutdown) = start_server().await;
    let mut client = Client::connect(addr).await;

    let opened = client.call(Command::OpenPool("3".to_string())).await;
    assert_eq!(opened.status, CallStatus::Ok);
    assert!(opened.message.contains('3'));

    let entered = client
        .call(Command::Enter {
            police_number: "KA-01-HH-1234".to_string(),
        })
        .await;
    assert_eq!(entered.status, CallStatus::Ok);
    assert!(entered.message.ends_with("SLOT number id 1"));

    let duplicate = client
        .call(Command::Enter {
            police_number: "KA-01-HH-1234".to_string(),
        })
        .await;
    assert_eq!(duplicate.status, CallStatus::Error);
    assert!(duplicate.message.contains("already parked"));

    let overflow = client
        .call(Command::Leave {
            police_number: "KA-01-HH-1234".to_string(),
            hours: i64::MAX,
        })
        .await;
    assert_eq!(overflow.status, CallStatus::Error);
    assert!(overflow.message.contains("parking duration"));

    let left = client
        .call(Command::Leave {
            police_number: "KA-01-HH-1234".to_string(),
            hours: 3,
        })
        .await;
    assert_eq!(left.status, CallStatus::Ok);
    let record: OccupancyRecord = serde_json::from_str(&left.message).unwrap();
    assert_eq!(record.area_number, 1);
    assert_eq!(record.cost, Some(20.0));

    let status = client.call(Command::Status).await;
    assert_eq!(status.status, CallStatus::Ok);
    let snapshot: PoolSnapshot = serde_json::from_str(&status.message).unwrap();
    assert_eq!(snapshot.capacity, 3);
    assert_eq!(snapshot.revenue, 20.0);
    assert_eq!(snapshot.transactions, 1);
}

#[tokio::test]
async fn second_open_is_rejected_and_state_preserved() {
    let (addr, _shutdown) = start_server().await;

    // one connection per request, the way the CLI behaves
    let mut first = Client::connect(addr).await;
    assert_eq!(
        first.call(Command::OpenPool("2".to_string())).await.status,
        CallStatus::Ok
    );

    let mut second = Client::connect(addr).await;
    let reopened = second.call(Command::OpenPool("9".to_string())).await;
    assert_eq!(reopened.status, CallStatus::Error);
    assert!(reopened.message.contains("already initialized"));

    let status = second.call(Command::Status).await;
    let snapshot: PoolSnapshot = serde_json::from_str(&status.message).unwrap();
    assert_eq!(snapshot.capacity, 2);
}

#[tokio::test]
async fn malformed_line_gets_an_error_response() {
    let (addr, _shutdown) = start_server().await;

    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, write_half) = stream.into_split();
    let mut writer = FramedWrite::new(write_half, tokio_util::codec::LinesCodec::new());
    let mut reader = FramedRead::new(read_half, JsonLineCodec::<Response>::new());

    writer.send("this is not json".to_string()).await.unwrap();
    let response = reader.next().await.unwrap().unwrap();
    assert_eq!(response.status, CallStatus::Error);
    assert!(response.message.starts_with("malformed request"));

    // server closes the connection after a framing error
    assert!(reader.next().await.is_none());
}

#[tokio::test]
async fn concurrent_clients_get_distinct_slots() {
    let (addr, _shutdown) = start_server().await;

    let mut setup = Client::connect(addr).await;
    assert_eq!(
        setup.call(Command::OpenPool("8".to_string())).await.status,
        CallStatus::Ok
    );

    let handles: Vec<_> = (0..8)
        .map(|n| {
            tokio::spawn(async move {
                let mut client = Client::connect(addr).await;
                let response = client
                    .call(Command::Enter {
                        police_number: format!("CAR-{n}"),
                    })
                    .await;
                assert_eq!(response.status, CallStatus::Ok);
                let slot: u32 = response
                    .message
                    .rsplit(' ')
                    .next()
                    .unwrap()
                    .parse()
                    .unwrap();
                slot
            })
        })
        .collect();

    let mut slots = Vec::new();
    for handle in handles {
        slots.push(handle.await.unwrap());
    }
    slots.sort_unstable();
    assert_eq!(slots, (1..=8).collect::<Vec<u32>>());
}

#[tokio::test]
async fn idle_connection_is_closed_at_the_read_deadline() {
    let (addr, _shutdown) = start_server_with_deadline(Duration::from_millis(100)).await;

    // never send a request; the server tears the connection down on its own
    let mut idle = Client::connect(addr).await;
    assert!(idle.reader.next().await.is_none());

    // fresh connections are still served afterwards
    let mut client = Client::connect(addr).await;
    assert_eq!(
        client.call(Command::OpenPool("1".to_string())).await.status,
        CallStatus::Ok
    );
}

#[tokio::test]
async fn shutdown_stops_accepting() {
    let (addr, shutdown) = start_server().await;
    shutdown.send(true).unwrap();

    // give the accept loop a moment to observe the channel
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(TcpStream::connect(addr).await.is_err());
}
