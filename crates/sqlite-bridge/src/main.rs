use anyhow::Context;
use clap::Parser;
use sqlite_bridge::{Bridge, Config, Request};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// sqlite-bridge exposes database open/close/delete, batch SQL execution,
/// and an echo probe to a host process: newline-delimited JSON requests on
/// stdin are answered by newline-delimited JSON responses on stdout.
#[derive(clap::Parser, Debug)]
#[clap(about = "Bridge host database calls onto an embedded SQLite engine.")]
pub struct Args {
    /// Directory under which named databases are created and opened.
    #[clap(long, env = "BRIDGE_DATABASES_DIR")]
    pub databases_dir: Option<std::path::PathBuf>,

    /// Tracing filter directive for logs, which are written to stderr.
    #[clap(long, default_value = "info", env = "BRIDGE_LOG")]
    pub log: String,
}

fn main() {
    let args = Args::parse();

    // Logs are written to stderr in JSON lines format, leaving stdout as a
    // clean response channel for the host.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(args.log.as_str())
        .json()
        // Without this, many fields (including the message) would get nested
        // inside of a `"fields"` object, which just makes parsing harder.
        .flatten_event(true)
        .init();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build();

    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(%error, "couldn't build Tokio runtime");
            std::process::exit(1);
        }
    };

    tracing::info!(log = %args.log, "sqlite-bridge started");
    let result = runtime.block_on(serve(args));

    if let Err(error) = result {
        tracing::error!(
            error = format!("{error:#}"),
            "sqlite-bridge crashed with error"
        );
        std::process::exit(1);
    }
    tracing::info!("sqlite-bridge exiting");
}

async fn serve(args: Args) -> anyhow::Result<()> {
    let bridge = Bridge::new(Config {
        databases_dir: args.databases_dir,
    });

    let mut requests = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    // Requests are served strictly in order: each is answered before the
    // next line is read. EOF on stdin is a graceful shutdown.
    while let Some(line) = requests.next_line().await.context("reading request")? {
        if line.chars().all(char::is_whitespace) {
            continue;
        }
        let request: Request = serde_json::from_str(&line)
            .with_context(|| format!("could not parse {line:?} into a bridge request"))?;

        let response = bridge.serve(request).await;

        let mut buf = serde_json::to_vec(&response).unwrap();
        buf.push(b'\n');
        stdout.write_all(&buf).await.context("writing response")?;
        stdout.flush().await.context("flushing response")?;
    }

    Ok(())
}
