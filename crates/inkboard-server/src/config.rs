//! Command line and environment configuration.

use std::net::SocketAddr;

use clap::Parser;

/// WebSocket relay for Inkboard shared whiteboards.
#[derive(Debug, Clone, Parser)]
#[command(name = "inkboard-server", version, about)]
pub struct Config {
    /// Address to accept WebSocket connections on.
    #[arg(long, env = "INKBOARD_BIND", default_value = "0.0.0.0:4000")]
    pub bind: SocketAddr,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_flag() {
        let config = Config::try_parse_from(["inkboard-server", "--bind", "127.0.0.1:9000"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn test_invalid_bind_rejected() {
        assert!(Config::try_parse_from(["inkboard-server", "--bind", "localhost"]).is_err());
    }
}
