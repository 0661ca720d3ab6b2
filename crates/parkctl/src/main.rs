//! Thin, stateless client: one JSON line out, one response line back.

mod import;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use anyhow::Context;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use parklot::codec::JsonLineCodec;
use parklot::protocol::{CallStatus, Command, Request, Response};

const DEFAULT_ADDR: &str = "127.0.0.1:8080";

enum Action {
    Single(Command),
    Import(PathBuf),
}

struct Args {
    addr: SocketAddr,
    action: Action,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            if !msg.is_empty() {
                eprintln!("error: {msg}");
                eprintln!();
            }
            eprintln!("Usage: parkctl [--addr <host:port>] <command>");
            eprintln!();
            eprintln!("Commands:");
            eprintln!("  open-pool <capacity>          Initialize the parking lot size");
            eprintln!("  enter <police-number>         Park a car");
            eprintln!("  leave <police-number> <hours> Exit the parking area");
            eprintln!("  status                        Show pool state");
            eprintln!("  import <file>                 Send an instruction file line by line");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --addr <host:port>            Server address [default: {DEFAULT_ADDR}]");
            process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut addr: SocketAddr = DEFAULT_ADDR
        .parse()
        .expect("default address is well-formed");
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--addr" => {
                i += 1;
                addr = args
                    .get(i)
                    .ok_or("--addr requires a value")?
                    .parse()
                    .map_err(|_| "--addr must be host:port".to_string())?;
            }
            "--help" | "-h" => return Err("".to_string()),
            arg if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            arg => positional.push(arg.to_string()),
        }
        i += 1;
    }

    let (command, params) = positional
        .split_first()
        .ok_or("missing command".to_string())?;

    let action = match command.as_str() {
        "open-pool" => {
            let capacity = params.first().ok_or("capacity not specified")?;
            Action::Single(Command::OpenPool(capacity.clone()))
        }
        "enter" => {
            let police_number = params.first().ok_or("police number not specified")?;
            Action::Single(Command::Enter {
                police_number: police_number.clone(),
            })
        }
        "leave" => {
            let police_number = params.first().ok_or("police number not specified")?;
            let hours = params
                .get(1)
                .ok_or("hours not specified")?
                .parse()
                .map_err(|_| "hours must be an integer".to_string())?;
            Action::Single(Command::Leave {
                police_number: police_number.clone(),
                hours,
            })
        }
        "status" => Action::Single(Command::Status),
        "import" => {
            let file = params.first().ok_or("instruction file not specified")?;
            Action::Import(PathBuf::from(file))
        }
        other => return Err(format!("unknown command: {other}")),
    };

    Ok(Args { addr, action })
}

async fn run(args: Args) -> anyhow::Result<()> {
    match args.action {
        Action::Single(command) => {
            let response = send_request(args.addr, command).await?;
            print_response(&response);
            if !response.is_ok() {
                process::exit(1);
            }
        }
        Action::Import(path) => {
            let commands = import::load(&path)?;
            // sequential on purpose: instruction files assume ordering
            for command in commands {
                let response = send_request(args.addr, command).await?;
                print_response(&response);
            }
        }
    }
    Ok(())
}

/// Dial, send one request line, read one response line.
async fn send_request(addr: SocketAddr, command: Command) -> anyhow::Result<Response> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to server at {addr}"))?;
    let (read_half, write_half) = stream.into_split();
    let mut writer = FramedWrite::new(write_half, JsonLineCodec::<Request>::new());
    let mut reader = FramedRead::new(read_half, JsonLineCodec::<Response>::new());

    let request = Request::new(command);
    tracing::debug!(request_id = ?request.x_request_id, "sending request");
    writer.send(request).await.context("cannot send request")?;

    reader
        .next()
        .await
        .context("connection closed before a response arrived")?
        .context("cannot read response")
}

fn print_response(response: &Response) {
    match response.status {
        CallStatus::Ok => println!("{}", response.message),
        CallStatus::Error => println!("ERROR: {}", response.message),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr));
    let _ = subscriber.try_init();
}
