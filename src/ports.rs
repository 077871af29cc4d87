//! Ephemeral port allocation on the loopback interface.
//!
//! The allocator binds port 0, reads the port the OS assigned and releases the
//! socket before returning. Another process may claim the port before the
//! dashboard server binds it; the server then fails to start and reports a
//! bind error instead of picking a different port.

use std::net::Ipv4Addr;

use tokio::net::TcpListener;

use crate::error::XrayError;

/// Obtain one currently-unused TCP port on 127.0.0.1.
pub async fn allocate_free_port() -> crate::Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .map_err(XrayError::PortAllocation)?;
    let port = listener
        .local_addr()
        .map_err(XrayError::PortAllocation)?
        .port();
    drop(listener);

    if port == 0 {
        return Err(XrayError::PortAllocation(std::io::Error::other(
            "OS returned no port",
        )));
    }

    tracing::debug!(port = %port, "allocated ephemeral port");
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_allocated_port_is_bindable() {
        let port = allocate_free_port().await.unwrap();
        assert_ne!(port, 0);
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await;
        assert!(listener.is_ok(), "allocated port {} should be free", port);
    }

    #[tokio::test]
    async fn test_sequential_allocations_are_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..5 {
            let port = allocate_free_port().await.unwrap();
            seen.insert(port);
        }
        assert_eq!(seen.len(), 5, "expected 5 distinct ports, got {:?}", seen);
    }
}
