//! DNS probe implementation using raw UDP packets.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use hickory_resolver::proto::op::{Header, Message, MessageType, OpCode, Query, ResponseCode};
use hickory_resolver::proto::rr::{Name, RData, RecordType as QueryType};
use hickory_resolver::proto::serialize::binary::BinDecodable;
use hickory_resolver::proto::ProtoError;
use thiserror::Error;
use tokio::net::UdpSocket;

use super::classify::{classify_dns_io_error, classify_rcode};
use super::{ErrorKind, Outcome, Payload, RecordType};

const HEADER_LEN: usize = 12;

/// Errors building a query or decoding a response.
#[derive(Error, Debug)]
pub enum DnsWireError {
    #[error("empty domain name")]
    EmptyName,
    #[error("invalid domain name {name:?}: {source}")]
    BadName {
        name: String,
        #[source]
        source: ProtoError,
    },
    #[error("failed to encode query: {0}")]
    Encode(#[source] ProtoError),
    #[error("response too short: {0} bytes")]
    TooShort(usize),
    #[error("packet is not a response")]
    NotAResponse,
    #[error("malformed response: {0}")]
    Malformed(#[from] ProtoError),
}

/// The parts of a DNS response the probe looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsResponse {
    pub id: u16,
    pub rcode: ResponseCode,
    pub truncated: bool,
    /// Address records of the queried type, in answer order.
    pub addresses: Vec<IpAddr>,
}

/// Resolve `domain` against `server` and report the first address returned.
pub async fn run_dns_probe(
    domain: &str,
    record_type: RecordType,
    server: SocketAddr,
    timeout: Duration,
) -> Outcome {
    let tx_id: u16 = rand::random();
    let packet = match build_dns_query(tx_id, domain, record_type) {
        Ok(packet) => packet,
        Err(e) => return Outcome::failure(ErrorKind::Unclassified, format!("{}: {}", domain, e)),
    };

    let bind_addr: SocketAddr = if server.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };
    let socket = match UdpSocket::bind(bind_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            return Outcome::failure(ErrorKind::Unclassified, format!("failed to bind socket: {}", e))
        }
    };
    if let Err(e) = socket.connect(server).await {
        return Outcome::failure(classify_dns_io_error(&e), format!("{}: {}", server, e));
    }

    let start = Instant::now();

    let reply = match tokio::time::timeout(timeout, exchange(&socket, &packet, tx_id)).await {
        Ok(Ok(reply)) => reply,
        Ok(Err(e)) => return Outcome::failure(classify_dns_io_error(&e), format!("{}: {}", server, e)),
        Err(_) => {
            return Outcome::failure(
                ErrorKind::Timeout,
                format!("no answer from {} within {:?}", server, timeout),
            )
        }
    };

    let latency = start.elapsed();

    // The rcode decides the outcome even when the rest of the message is cut short
    let header = match read_header(&reply) {
        Ok(header) => header,
        Err(e) => {
            tracing::warn!("DNS probe: undecodable answer from {}: {}", server, e);
            return Outcome::failure(ErrorKind::Unclassified, format!("{}: {}", server, e));
        }
    };
    if let Some(kind) = classify_rcode(header.response_code()) {
        return Outcome::failure(
            kind,
            format!("{} ({} from {})", domain, header.response_code(), server),
        );
    }

    let response = match parse_dns_response(&reply, record_type) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("DNS probe: undecodable answer from {}: {}", server, e);
            return Outcome::failure(ErrorKind::Unclassified, format!("{}: {}", server, e));
        }
    };

    match response.addresses.first() {
        Some(ip) => Outcome::success(latency, Payload::Resolved { ip: *ip }),
        None if response.truncated => Outcome::failure(
            ErrorKind::Unclassified,
            format!("truncated answer for {} from {}", domain, server),
        ),
        None => Outcome::failure(
            ErrorKind::NoRecord,
            format!("{} has no {} record", domain, record_type),
        ),
    }
}

/// Send the query and wait for the reply carrying our transaction id.
async fn exchange(socket: &UdpSocket, packet: &[u8], tx_id: u16) -> io::Result<Vec<u8>> {
    socket.send(packet).await?;

    let mut buf = [0u8; 4096];
    loop {
        let n = socket.recv(&mut buf).await?;
        if n >= 2 && u16::from_be_bytes([buf[0], buf[1]]) == tx_id {
            return Ok(buf[..n].to_vec());
        }
        tracing::debug!("DNS probe: ignoring {} byte datagram with foreign id", n);
    }
}

fn query_type(record_type: RecordType) -> QueryType {
    match record_type {
        RecordType::A => QueryType::A,
        RecordType::Aaaa => QueryType::AAAA,
    }
}

/// Build a standard recursive query for `domain`.
pub fn build_dns_query(tx_id: u16, domain: &str, record_type: RecordType) -> Result<Vec<u8>, DnsWireError> {
    let fqdn = if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{}.", domain)
    };
    let name = Name::from_ascii(&fqdn).map_err(|source| DnsWireError::BadName {
        name: domain.to_string(),
        source,
    })?;
    if name.is_root() {
        return Err(DnsWireError::EmptyName);
    }

    let mut message = Message::new();
    message
        .set_id(tx_id)
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, query_type(record_type)));

    message.to_vec().map_err(DnsWireError::Encode)
}

/// Decode just the fixed 12-byte header of a reply.
pub fn read_header(data: &[u8]) -> Result<Header, DnsWireError> {
    let bytes = data.get(..HEADER_LEN).ok_or(DnsWireError::TooShort(data.len()))?;
    let header = Header::from_bytes(bytes)?;
    if header.message_type() != MessageType::Response {
        return Err(DnsWireError::NotAResponse);
    }
    Ok(header)
}

/// Decode a whole reply and collect the address records of `record_type`.
pub fn parse_dns_response(data: &[u8], record_type: RecordType) -> Result<DnsResponse, DnsWireError> {
    let header = read_header(data)?;
    let message = Message::from_vec(data)?;

    let addresses = message
        .answers()
        .iter()
        .filter_map(|record| match (record_type, record.data()) {
            (RecordType::A, RData::A(a)) => Some(IpAddr::V4(a.0)),
            (RecordType::Aaaa, RData::AAAA(aaaa)) => Some(IpAddr::V6(aaaa.0)),
            // CNAME and friends ahead of the address records
            _ => None,
        })
        .collect();

    Ok(DnsResponse {
        id: header.id(),
        rcode: header.response_code(),
        truncated: header.truncated(),
        addresses,
    })
}
