use std::process;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use parklot::Dispatcher;
use parklot::pool::{FreeIndex, OrderedFreeIndex, PoolOptions, ScanFreeIndex, SlotPool};
use parklot::server::{ServerConfig, serve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    Ordered,
    Scan,
}

struct Args {
    host: String,
    port: u16,
    backend: Backend,
    fold_case: bool,
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
            eprintln!("Usage: parklot [--host <addr>] [--port <port>] [--backend ordered|scan] [--fold-case]");
            eprintln!();
            eprintln!("Options:");
            eprintln!("  --host <addr>       Bind address [default: 0.0.0.0]");
            eprintln!("  --port <port>       TCP port [default: 8080]");
            eprintln!("  --backend <kind>    Free-slot index: ordered (O(log n)) or scan (O(n)) [default: ordered]");
            eprintln!("  --fold-case         Treat police numbers case-insensitively");
            process::exit(2);
        }
    };

    if let Err(e) = run(args).await {
        eprintln!("error: {e}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let mut host = "0.0.0.0".to_string();
    let mut port = 8080u16;
    let mut backend = Backend::Ordered;
    let mut fold_case = false;

    let mut i = 1; // skip argv[0]
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                host = args.get(i).ok_or("--host requires a value")?.clone();
            }
            "--port" => {
                i += 1;
                port = args
                    .get(i)
                    .ok_or("--port requires a value")?
                    .parse()
                    .map_err(|_| "--port must be an integer".to_string())?;
            }
            "--backend" => {
                i += 1;
                backend = match args.get(i).ok_or("--backend requires a value")?.as_str() {
                    "ordered" => Backend::Ordered,
                    "scan" => Backend::Scan,
                    other => return Err(format!("unknown backend: {other}")),
                };
            }
            "--fold-case" => fold_case = true,
            "--help" | "-h" => return Err("".to_string()),
            arg => return Err(format!("unknown argument: {arg}")),
        }
        i += 1;
    }

    Ok(Args {
        host,
        port,
        backend,
        fold_case,
    })
}

async fn run(args: Args) -> anyhow::Result<()> {
    let free: Box<dyn FreeIndex> = match args.backend {
        Backend::Ordered => Box::new(OrderedFreeIndex::new()),
        Backend::Scan => Box::new(ScanFreeIndex::new()),
    };
    let pool = Arc::new(SlotPool::with_options(
        free,
        PoolOptions {
            case_insensitive_ids: args.fold_case,
        },
    ));
    let dispatcher = Arc::new(Dispatcher::new(pool));

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        read_deadline: Duration::from_secs(10),
    };
    serve(config, dispatcher).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");
    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("parklot")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults() {
        let args = parse_args(&argv(&[])).unwrap();
        assert_eq!(args.host, "0.0.0.0");
        assert_eq!(args.port, 8080);
        assert_eq!(args.backend, Backend::Ordered);
        assert!(!args.fold_case);
    }

    #[test]
    fn backend_selection() {
        let args = parse_args(&argv(&["--backend", "scan", "--fold-case"])).unwrap();
        assert_eq!(args.backend, Backend::Scan);
        assert!(args.fold_case);
    }

    #[test]
    fn rejects_unknown_flags() {
        assert!(parse_args(&argv(&["--threads", "4"])).is_err());
        assert!(parse_args(&argv(&["--backend", "vector"])).is_err());
        assert!(parse_args(&argv(&["--port", "eight"])).is_err());
    }
}
