use pnet::packet::Packet;
use pnet::packet::icmp::echo_request::MutableEchoRequestPacket;
use pnet::packet::icmp::{IcmpCode, IcmpPacket, IcmpTypes};
use pnet::packet::icmpv6::{Icmpv6Code, Icmpv6Packet, Icmpv6Types, MutableIcmpv6Packet};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use std::io;

use crate::error::{EchoFailure, PingError};
use crate::payload::cycle;
use crate::socket::IpFamily;

pub const IPV4_HEADER_LEN: usize = 20;
pub const ICMPV4_ECHO_LEN: usize = 8;

pub const IPV6_HEADER_LEN: usize = 40;
pub const ICMPV6_ECHO_LEN: usize = 8;

/// ICMPv6 header before the message body: type, code, checksum.
const ICMPV6_HEADER_LEN: usize = 4;
/// Identifier + sequence number carried by an ICMPv6 echo body.
const ICMPV6_ECHO_BODY_LEN: usize = 4;

/// Destination unreachable: fragmentation needed and DF set.
const FRAGMENTATION_NEEDED: u8 = 4;

/// What an inbound datagram means to the attempt waiting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Not addressed to this engine; keep reading.
    Foreign,
    Reply,
    Failure(EchoFailure),
}

/// Payload bytes that fit in an echo request of `size` total bytes.
pub fn payload_len(family: IpFamily, size: usize) -> usize {
    match family {
        IpFamily::V4 => size.saturating_sub(IPV4_HEADER_LEN + ICMPV4_ECHO_LEN),
        IpFamily::V6 => size.saturating_sub(IPV6_HEADER_LEN + ICMPV6_ECHO_LEN),
    }
}

/// Serialize an echo request whose IP datagram would be `size` bytes long.
///
/// ICMPv4 carries its own checksum. The ICMPv6 checksum covers the IPv6
/// pseudo header, so it is left zero for the raw socket to fill in.
pub fn build_echo_request(
    ip_version: u8,
    identifier: u16,
    sequence: u16,
    size: usize,
    seed: &[u8],
) -> Result<Vec<u8>, PingError> {
    let family = IpFamily::try_from(ip_version)?;
    let payload = cycle(seed, payload_len(family, size));

    match family {
        IpFamily::V4 => encode_v4(identifier, sequence, &payload),
        IpFamily::V6 => encode_v6(identifier, sequence, &payload),
    }
}

fn short_buffer() -> PingError {
    PingError::Io(io::Error::new(io::ErrorKind::InvalidInput, "buffer shorter than icmp header"))
}

fn encode_v4(identifier: u16, sequence: u16, payload: &[u8]) -> Result<Vec<u8>, PingError> {
    let mut buf = vec![0u8; ICMPV4_ECHO_LEN + payload.len()];
    {
        let mut echo = match MutableEchoRequestPacket::new(&mut buf) {
            Some(echo) => echo,
            None => return Err(short_buffer()),
        };
        echo.set_icmp_type(IcmpTypes::EchoRequest);
        echo.set_icmp_code(IcmpCode::new(0));
        echo.set_identifier(identifier);
        echo.set_sequence_number(sequence);
        echo.set_payload(payload);
    }

    let checksum = pnet::util::checksum(&buf, 1);
    buf[2..4].copy_from_slice(&checksum.to_be_bytes());
    Ok(buf)
}

fn encode_v6(identifier: u16, sequence: u16, payload: &[u8]) -> Result<Vec<u8>, PingError> {
    let mut body = Vec::with_capacity(ICMPV6_ECHO_BODY_LEN + payload.len());
    body.extend_from_slice(&identifier.to_be_bytes());
    body.extend_from_slice(&sequence.to_be_bytes());
    body.extend_from_slice(payload);

    let mut buf = vec![0u8; ICMPV6_HEADER_LEN + body.len()];
    {
        let mut icmp = match MutableIcmpv6Packet::new(&mut buf) {
            Some(icmp) => icmp,
            None => return Err(short_buffer()),
        };
        icmp.set_icmpv6_type(Icmpv6Types::EchoRequest);
        icmp.set_icmpv6_code(Icmpv6Code::new(0));
        icmp.set_checksum(0);
        icmp.set_payload(&body);
    }

    Ok(buf)
}

/// Classify a datagram read from the raw socket.
///
/// IPv4 raw sockets hand back the IP header, IPv6 ones start at the ICMPv6
/// header.
pub fn classify(raw: &[u8], expected_identifier: u16, ip_version: u8) -> Result<Verdict, PingError> {
    match IpFamily::try_from(ip_version)? {
        IpFamily::V4 => Ok(classify_v4(raw, expected_identifier)),
        IpFamily::V6 => Ok(classify_v6(raw, expected_identifier)),
    }
}

fn classify_v4(raw: &[u8], expected_identifier: u16) -> Verdict {
    let ipv4 = match Ipv4Packet::new(raw) {
        Some(ip) => ip,
        None => return Verdict::Foreign,
    };

    if ipv4.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
        return Verdict::Foreign;
    }

    let icmp = match IcmpPacket::new(ipv4.payload()) {
        Some(icmp) => icmp,
        None => return Verdict::Foreign,
    };

    // identifier sits in the first two bytes after type/code/checksum,
    // whatever the message type
    let rest = icmp.payload();
    if rest.len() < 2 {
        return Verdict::Foreign;
    }
    if u16::from_be_bytes([rest[0], rest[1]]) != expected_identifier {
        return Verdict::Foreign;
    }

    match icmp.get_icmp_type() {
        IcmpTypes::EchoReply => Verdict::Reply,
        IcmpTypes::DestinationUnreachable => {
            if icmp.get_icmp_code() == IcmpCode::new(FRAGMENTATION_NEEDED) {
                Verdict::Failure(EchoFailure::CouldNotFragment)
            } else {
                Verdict::Failure(EchoFailure::DestUnreachable)
            }
        }
        IcmpTypes::SourceQuench => Verdict::Failure(EchoFailure::SourceQuench),
        IcmpTypes::TimeExceeded => Verdict::Failure(EchoFailure::TtlExpired),
        _ => Verdict::Failure(EchoFailure::UnknownPacket),
    }
}

fn classify_v6(raw: &[u8], expected_identifier: u16) -> Verdict {
    let icmp = match Icmpv6Packet::new(raw) {
        Some(icmp) => icmp,
        None => return Verdict::Foreign,
    };

    match icmp.get_icmpv6_type() {
        Icmpv6Types::EchoReply => {
            let body = icmp.payload();
            if body.len() < ICMPV6_ECHO_BODY_LEN {
                return Verdict::Failure(EchoFailure::UnknownPacket);
            }
            if u16::from_be_bytes([body[0], body[1]]) == expected_identifier {
                Verdict::Reply
            } else {
                Verdict::Foreign
            }
        }
        Icmpv6Types::DestinationUnreachable => Verdict::Failure(EchoFailure::DestUnreachable),
        Icmpv6Types::PacketTooBig => Verdict::Failure(EchoFailure::CouldNotFragment),
        Icmpv6Types::TimeExceeded => Verdict::Failure(EchoFailure::TtlExpired),
        _ => Verdict::Failure(EchoFailure::UnknownPacket),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    const ID: u16 = 0xBEEF;

    #[test]
    fn test_v4_request_layout() {
        let pkt = build_echo_request(4, ID, 7, 100, &[0xAB, 0xCD]).unwrap();
        assert_eq!(pkt.len(), ICMPV4_ECHO_LEN + 72);
        assert_eq!(pkt[0], 8);
        assert_eq!(pkt[1], 0);
        assert_eq!(u16::from_be_bytes([pkt[4], pkt[5]]), ID);
        assert_eq!(u16::from_be_bytes([pkt[6], pkt[7]]), 7);
        assert_eq!(&pkt[8..], cycle(&[0xAB, 0xCD], 72).as_slice());
        assert!(pkt[8..].iter().all(|b| *b == 0xAB || *b == 0xCD));
    }

    #[test]
    fn test_v4_checksum_verifies() {
        let pkt = build_echo_request(4, ID, 1, 64, b"hello").unwrap();
        let icmp = IcmpPacket::new(&pkt).unwrap();
        assert_eq!(icmp.get_checksum(), pnet::packet::icmp::checksum(&icmp));
    }

    #[test]
    fn test_v6_request_layout() {
        let pkt = build_echo_request(6, ID, 3, 100, b"xy").unwrap();
        assert_eq!(pkt.len(), ICMPV6_ECHO_LEN + 52);
        assert_eq!(pkt[0], 128);
        assert_eq!(pkt[1], 0);
        assert_eq!(&pkt[2..4], &[0, 0]);
        assert_eq!(u16::from_be_bytes([pkt[4], pkt[5]]), ID);
        assert_eq!(u16::from_be_bytes([pkt[6], pkt[7]]), 3);
    }

    #[test]
    fn test_small_sizes_clamp_payload() {
        assert_eq!(build_echo_request(4, ID, 0, 10, b"ab").unwrap().len(), ICMPV4_ECHO_LEN);
        assert_eq!(build_echo_request(6, ID, 0, 47, b"ab").unwrap().len(), ICMPV6_ECHO_LEN);
    }

    #[test]
    fn test_header_only_requests_encode() {
        let v4 = encode_v4(ID, 3, &[]).unwrap();
        assert_eq!(v4.len(), ICMPV4_ECHO_LEN);
        assert_eq!(u16::from_be_bytes([v4[6], v4[7]]), 3);

        let v6 = encode_v6(ID, 3, &[]).unwrap();
        assert_eq!(v6, vec![128, 0, 0, 0, 0xBE, 0xEF, 0, 3]);
    }

    #[test]
    fn test_bad_version() {
        assert!(matches!(build_echo_request(5, ID, 0, 100, b"ab"), Err(PingError::BadIpVersion)));
        assert!(matches!(classify(&[], ID, 0), Err(PingError::BadIpVersion)));
    }

    #[test]
    fn test_v4_reply_matching_identifier() {
        let req = build_echo_request(4, ID, 0, 60, b"ab").unwrap();
        let frame = echo_reply_for(&req, IpFamily::V4);
        assert_eq!(classify(&frame, ID, 4).unwrap(), Verdict::Reply);
    }

    #[test]
    fn test_v4_reply_foreign_identifier() {
        let req = build_echo_request(4, ID + 1, 0, 60, b"ab").unwrap();
        let frame = echo_reply_for(&req, IpFamily::V4);
        assert_eq!(classify(&frame, ID, 4).unwrap(), Verdict::Foreign);
    }

    #[test]
    fn test_v4_unreachable_codes() {
        let frag = ipv4_frame(&icmpv4(3, 4, ID, 0));
        assert_eq!(classify(&frag, ID, 4).unwrap(), Verdict::Failure(EchoFailure::CouldNotFragment));

        for code in [0u8, 1, 3, 13] {
            let frame = ipv4_frame(&icmpv4(3, code, ID, 0));
            assert_eq!(classify(&frame, ID, 4).unwrap(), Verdict::Failure(EchoFailure::DestUnreachable));
        }
    }

    #[test]
    fn test_v4_other_types() {
        let cases = [
            (4u8, EchoFailure::SourceQuench),
            (11, EchoFailure::TtlExpired),
            (5, EchoFailure::UnknownPacket),
            (8, EchoFailure::UnknownPacket),
        ];
        for (icmp_type, failure) in cases {
            let frame = ipv4_frame(&icmpv4(icmp_type, 0, ID, 0));
            assert_eq!(classify(&frame, ID, 4).unwrap(), Verdict::Failure(failure));
        }
    }

    #[test]
    fn test_v4_non_icmp_is_foreign() {
        let mut frame = ipv4_frame(&icmpv4(0, 0, ID, 0));
        frame[9] = IpNextHeaderProtocols::Udp.0;
        assert_eq!(classify(&frame, ID, 4).unwrap(), Verdict::Foreign);
        assert_eq!(classify(&[0x45, 0, 0], ID, 4).unwrap(), Verdict::Foreign);
    }

    #[test]
    fn test_v6_reply() {
        let req = build_echo_request(6, ID, 9, 60, b"ab").unwrap();
        let reply = echo_reply_for(&req, IpFamily::V6);
        assert_eq!(classify(&reply, ID, 6).unwrap(), Verdict::Reply);
        assert_eq!(classify(&reply, ID ^ 0xFF, 6).unwrap(), Verdict::Foreign);
    }

    #[test]
    fn test_v6_reply_without_echo_body_is_unknown() {
        let truncated = [129u8, 0, 0, 0, 0xBE];
        assert_eq!(classify(&truncated, ID, 6).unwrap(), Verdict::Failure(EchoFailure::UnknownPacket));
    }

    #[test]
    fn test_v6_error_types() {
        let cases = [
            (1u8, EchoFailure::DestUnreachable),
            (2, EchoFailure::CouldNotFragment),
            (3, EchoFailure::TtlExpired),
            (135, EchoFailure::UnknownPacket),
        ];
        for (icmp_type, failure) in cases {
            let msg = [icmp_type, 0, 0, 0, 0, 0, 0, 0];
            assert_eq!(classify(&msg, ID, 6).unwrap(), Verdict::Failure(failure));
        }
        assert_eq!(classify(&[129, 0], ID, 6).unwrap(), Verdict::Foreign);
    }
}
