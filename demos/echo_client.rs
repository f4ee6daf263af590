//! Echo client example.
//!
//! This example connects to a TCP echo server, sends a line every time the
//! previous one comes back, and reconnects if the server goes away.
//!
//! Start any echo server first, e.g.: ncat -l 7007 -k -c 'cat'
//! Then run: cargo run --example echo_client --features tokio [host:port]

use reconnecting_client::connection::{AsyncClient, ClientConfig, ClientEvent};
use reconnecting_client::Endpoint;
use std::time::Duration;

const SERVER_ADDR: &str = "127.0.0.1:7007";
const ROUNDS: usize = 5;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let addr = std::env::args().nth(1).unwrap_or_else(|| SERVER_ADDR.to_string());
    let endpoint: Endpoint = addr.parse()?;

    let config = ClientConfig::robust()
        .with_max_retries(5)
        .with_connect_timeout(Duration::from_secs(3))
        .with_reconnect_sleep(Duration::from_millis(500));

    println!("Connecting to {endpoint}...");
    let mut client = AsyncClient::spawn(endpoint, config);
    client.start()?;

    let mut round = 0;
    loop {
        // Writes fail until the session is up.
        if client.write(format!("hello #{round}\n")).await.is_ok() {
            break;
        }
        if client.state().await?.is_terminal() {
            if let Some(ClientEvent::Error(err)) = client.next_event().await {
                eprintln!("Connection failed: {err}");
            }
            client.shutdown().await?;
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    while let Some(event) = client.next_event().await {
        match event {
            ClientEvent::WriteDrained => println!("sent #{round}"),
            ClientEvent::Readable => {
                let data = client.read().await?;
                print!("echo: {}", String::from_utf8_lossy(&data));

                round += 1;
                if round == ROUNDS {
                    client.stop()?;
                } else {
                    client.write(format!("hello #{round}\n")).await?;
                }
            }
            ClientEvent::Done => {
                println!("Done.");
                break;
            }
            ClientEvent::Error(err) => {
                eprintln!("Connection failed: {err}");
                break;
            }
        }
    }

    client.shutdown().await?;
    Ok(())
}
