//! Mapping of native failure conditions onto [`ErrorKind`].

use std::io;

use hickory_resolver::proto::op::ResponseCode;

use super::ErrorKind;

/// Classify a socket error raised while opening a TCP connection.
pub fn classify_connect_error(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
        io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
        _ => ErrorKind::Unclassified,
    }
}

/// Classify a transport failure reported by the HTTP client.
///
/// Received responses never come through here: any status code is a success.
pub fn classify_http_error(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        ErrorKind::ConnectFailure
    } else if err.is_request() || err.is_body() || err.is_decode() || err.is_redirect() {
        ErrorKind::ProtocolError
    } else {
        ErrorKind::Unclassified
    }
}

/// Classify a DNS response code. `None` means the query succeeded.
pub fn classify_rcode(rcode: ResponseCode) -> Option<ErrorKind> {
    match rcode {
        ResponseCode::NoError => None,
        ResponseCode::NXDomain => Some(ErrorKind::NameNotFound),
        ResponseCode::ServFail | ResponseCode::Refused => Some(ErrorKind::NoServersAvailable),
        _ => Some(ErrorKind::Unclassified),
    }
}

/// Classify a socket error raised while talking to a DNS server.
pub fn classify_dns_io_error(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ErrorKind::Timeout,
        // ICMP port unreachable surfaces as a refused UDP receive
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::AddrNotAvailable => ErrorKind::NoServersAvailable,
        _ => ErrorKind::Unclassified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_errors() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_connect_error(&refused), ErrorKind::ConnectionRefused);

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_connect_error(&timed_out), ErrorKind::Timeout);

        let other = io::Error::new(io::ErrorKind::Other, "network is unreachable");
        assert_eq!(classify_connect_error(&other), ErrorKind::Unclassified);
    }

    #[test]
    fn test_rcodes() {
        assert_eq!(classify_rcode(ResponseCode::NoError), None);
        assert_eq!(classify_rcode(ResponseCode::NXDomain), Some(ErrorKind::NameNotFound));
        assert_eq!(classify_rcode(ResponseCode::ServFail), Some(ErrorKind::NoServersAvailable));
        assert_eq!(classify_rcode(ResponseCode::Refused), Some(ErrorKind::NoServersAvailable));
        assert_eq!(classify_rcode(ResponseCode::NotImp), Some(ErrorKind::Unclassified));
    }

    #[test]
    fn test_dns_io_errors() {
        let would_block = io::Error::from(io::ErrorKind::WouldBlock);
        assert_eq!(classify_dns_io_error(&would_block), ErrorKind::Timeout);

        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert_eq!(classify_dns_io_error(&refused), ErrorKind::NoServersAvailable);
    }
}
