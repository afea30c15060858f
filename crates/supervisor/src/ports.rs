use std::net::{Ipv4Addr, TcpListener};

use thiserror::Error;
use tracing::debug;

/// Errors raised while looking for a listening port.
/// 尋找可監聽連接埠時可能發生的錯誤。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("no free port found in range {start}-{end}")]
    NoFreePort { start: u16, end: u16 },
    #[error("invalid port range {start}-{end}")]
    InvalidRange { start: u16, end: u16 },
}

/// Probes `port` by binding a listener on all interfaces and releasing it at once.
/// 在所有介面上綁定後立即釋放，以探測連接埠是否可用。
pub fn is_port_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).is_ok()
}

/// Returns the first port in `start..=end` that could be bound, scanning upwards.
/// 由小到大掃描 `start..=end`，回傳第一個可綁定的連接埠。
///
/// The result is only a snapshot: another process may take the port before the
/// backend binds it, and a second call may return a different port.
pub fn find_free_port(start: u16, end: u16) -> Result<u16, PortError> {
    if start == 0 || start > end {
        return Err(PortError::InvalidRange { start, end });
    }
    for port in start..=end {
        if is_port_free(port) {
            debug!(port, "found free port");
            return Ok(port);
        }
    }
    Err(PortError::NoFreePort { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn occupied() -> (TcpListener, u16) {
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn returns_port_inside_range() {
        let (listener, port) = occupied();
        drop(listener);
        let end = port.saturating_add(16);
        let found = find_free_port(port, end).unwrap();
        assert!((port..=end).contains(&found));
    }

    #[test]
    fn skips_ports_in_use() {
        let (_first, taken) = occupied();
        if taken == u16::MAX {
            return;
        }
        match find_free_port(taken, taken + 1) {
            Ok(found) => assert_eq!(found, taken + 1),
            Err(err) => assert_eq!(
                err,
                PortError::NoFreePort {
                    start: taken,
                    end: taken + 1
                }
            ),
        }
    }

    #[test]
    fn exhausted_range_fails() {
        let (_listener, port) = occupied();
        assert_eq!(
            find_free_port(port, port),
            Err(PortError::NoFreePort {
                start: port,
                end: port
            })
        );
    }

    #[test]
    fn rejects_inverted_and_zero_ranges() {
        assert_eq!(
            find_free_port(5000, 4000),
            Err(PortError::InvalidRange {
                start: 5000,
                end: 4000
            })
        );
        assert!(matches!(
            find_free_port(0, 10),
            Err(PortError::InvalidRange { .. })
        ));
    }
}
