use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Start a raw HTTP server that answers every connection with a response head
/// and the first part of its body, then stops writing while keeping the
/// connection open. Returns the base URL.
pub fn stalled_server(status: &str, content_length: usize, partial: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {content_length}\r\n\r\n"
    );

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let head = head.clone();
            thread::spawn(move || {
                let mut request = [0u8; 8192];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(partial);
                let _ = stream.flush();
                thread::sleep(Duration::from_secs(60));
            });
        }
    });

    format!("http://{addr}")
}

/// Cancel `cancel` after `delay`, from a separate task.
pub fn cancel_after(cancel: &CancellationToken, delay: Duration) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        cancel.cancel();
    });
}
