//! Transport endpoint addressing

use crate::error::TransportError;
use std::fmt;
use std::str::FromStr;

/// Baud rate both supported amplifier families use
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Where the amplifier's control port lives
///
/// Selection is by scheme prefix: `tcp://` (or the pyserial-style `socket://`)
/// addresses a serial-over-network bridge, anything else is taken as a local
/// serial device path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local serial device, e.g. `/dev/ttyUSB0`
    Serial { path: String, baud: u32 },
    /// Serial-over-network bridge, e.g. a ser2net host
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    /// Serial endpoint at the standard amplifier baud rate
    pub fn serial(path: impl Into<String>) -> Self {
        Endpoint::Serial {
            path: path.into(),
            baud: DEFAULT_BAUD_RATE,
        }
    }

    /// Serial endpoint with a non-standard baud rate
    pub fn serial_with_baud(path: impl Into<String>, baud: u32) -> Self {
        Endpoint::Serial {
            path: path.into(),
            baud,
        }
    }

    /// TCP endpoint for a serial bridge
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Tcp {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let network = s
            .strip_prefix("tcp://")
            .or_else(|| s.strip_prefix("socket://"));

        if let Some(addr) = network {
            let (host, port) = addr
                .rsplit_once(':')
                .ok_or_else(|| TransportError::InvalidEndpoint(s.to_string()))?;
            let port = port
                .parse()
                .map_err(|_| TransportError::InvalidEndpoint(s.to_string()))?;
            if host.is_empty() {
                return Err(TransportError::InvalidEndpoint(s.to_string()));
            }
            return Ok(Endpoint::tcp(host, port));
        }

        if s.contains("://") || s.is_empty() {
            return Err(TransportError::InvalidEndpoint(s.to_string()));
        }
        Ok(Endpoint::serial(s))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Serial { path, .. } => write!(f, "{path}"),
            Endpoint::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial_path() {
        let ep: Endpoint = "/dev/ttyUSB0".parse().unwrap();
        assert_eq!(
            ep,
            Endpoint::Serial {
                path: "/dev/ttyUSB0".to_string(),
                baud: DEFAULT_BAUD_RATE,
            }
        );
    }

    #[test]
    fn test_parse_tcp() {
        let ep: Endpoint = "tcp://192.168.1.50:4001".parse().unwrap();
        assert_eq!(ep, Endpoint::tcp("192.168.1.50", 4001));
    }

    #[test]
    fn test_parse_socket_scheme() {
        let ep: Endpoint = "socket://bridge.local:5000".parse().unwrap();
        assert_eq!(ep, Endpoint::tcp("bridge.local", 5000));
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!("http://x:1".parse::<Endpoint>().is_err());
        assert!("tcp://no-port".parse::<Endpoint>().is_err());
        assert!("tcp://:4001".parse::<Endpoint>().is_err());
        assert!("".parse::<Endpoint>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for raw in ["/dev/ttyS1", "tcp://amp:4001"] {
            let ep: Endpoint = raw.parse().unwrap();
            assert_eq!(ep.to_string(), raw);
        }
    }
}
