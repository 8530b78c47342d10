// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Synthetic delay server targeted by the network load workload.
//!
//! Accepts a connection, reads whatever request arrives, waits a fixed
//! delay, answers with a fixed-size body and closes. The protocol is a
//! minimal HTTP/1.0 exchange; clients read to EOF.

use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Delay before each response.
pub const RESPONSE_DELAY: Duration = Duration::from_millis(50);

/// Response body size in bytes.
pub const RESPONSE_BODY_LEN: usize = 1024;

/// Bind `addr` and serve with the default delay and body size.
pub async fn serve(addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!(addr = %addr, "delay server listening");
    serve_on(listener, RESPONSE_DELAY, RESPONSE_BODY_LEN).await
}

/// Serve connections from an already-bound listener.
pub async fn serve_on(
    listener: TcpListener,
    delay: Duration,
    body_len: usize,
) -> anyhow::Result<()> {
    loop {
        let (mut stream, _peer) = listener.accept().await.context("accepting connection")?;
        tokio::spawn(async move {
            let mut request = [0u8; 1024];
            let _ = stream.read(&mut request).await;
            tokio::time::sleep(delay).await;
            let header = format!("HTTP/1.0 200 OK\r\nContent-Length: {}\r\n\r\n", body_len);
            let body = vec![b'x'; body_len];
            let _ = stream.write_all(header.as_bytes()).await;
            let _ = stream.write_all(&body).await;
            let _ = stream.shutdown().await;
        });
    }
}
