use super::errors::CaptureError;
use super::packet::{LinkLayer, Packet};
use crate::consts::{CAPTURE_READER_BUFFER_SIZE, MAX_STALLED_REFILLS};

use log::{debug, warn};
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, Linktype, PcapBlockOwned, PcapError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const LINKTYPE_LINUX_SLL2: i32 = 276;

impl TryFrom<Linktype> for LinkLayer {
    type Error = CaptureError;

    fn try_from(linktype: Linktype) -> Result<Self, Self::Error> {
        match linktype {
            Linktype::ETHERNET => Ok(Self::Ethernet),
            Linktype::RAW | Linktype::IPV4 | Linktype::IPV6 => Ok(Self::RawIp),
            Linktype::NULL | Linktype::LOOP => Ok(Self::Null),
            Linktype::LINUX_SLL => Ok(Self::LinuxSll),
            Linktype(LINKTYPE_LINUX_SLL2) => Ok(Self::LinuxSll2),
            Linktype(other) => Err(CaptureError::UnsupportedLinktype(other)),
        }
    }
}

fn timestamp_ns(ts_sec: u32, ts_frac: u32, nanosecond_precision: bool) -> u64 {
    let frac_ns = if nanosecond_precision {
        ts_frac as u64
    } else {
        ts_frac as u64 * 1_000
    };
    ts_sec as u64 * 1_000_000_000 + frac_ns
}

/// Reads every frame of a legacy pcap file, in file order.
///
/// Frames without an IP layer are kept so the caller can count them. A record cut
/// short at the end of the file ends the read with a warning instead of failing,
/// captures stopped by the rotation timeout routinely end that way.
pub fn read_capture(path: &Path, include_ipv6: bool) -> Result<Vec<Packet>, CaptureError> {
    let file = File::open(path)?;
    let mut reader = LegacyPcapReader::new(CAPTURE_READER_BUFFER_SIZE, BufReader::new(file))
        .map_err(|e| CaptureError::Malformed(format!("{:?}", e)))?;

    let mut link: Option<LinkLayer> = None;
    let mut nanosecond_precision = false;
    let mut stalled_refills = 0;
    let mut packets = Vec::new();

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                stalled_refills = 0;
                match block {
                    PcapBlockOwned::LegacyHeader(header) => {
                        link = Some(LinkLayer::try_from(header.network)?);
                        nanosecond_precision = header.is_nanosecond_precision();
                        debug!(
                            "{}: link {:?}, nanosecond precision: {}",
                            path.display(),
                            link,
                            nanosecond_precision
                        );
                    }
                    PcapBlockOwned::Legacy(record) => {
                        let link = link.ok_or_else(|| {
                            CaptureError::Malformed("packet record before file header".to_owned())
                        })?;
                        packets.push(Packet::decode(
                            timestamp_ns(record.ts_sec, record.ts_usec, nanosecond_precision),
                            record.data,
                            link,
                            include_ipv6,
                        ));
                    }
                    PcapBlockOwned::NG(_) => return Err(CaptureError::UnsupportedFormat("pcapng")),
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete { .. }) => {
                if stalled_refills >= MAX_STALLED_REFILLS {
                    warn!(
                        "{}: capture ends with an incomplete record, keeping {} packets",
                        path.display(),
                        packets.len()
                    );
                    break;
                }
                stalled_refills += 1;
                reader
                    .refill()
                    .map_err(|e| CaptureError::Malformed(format!("{:?}", e)))?;
            }
            Err(e) if link.is_some() => {
                warn!(
                    "{}: stopped reading after {} packets: {:?}",
                    path.display(),
                    packets.len(),
                    e
                );
                break;
            }
            Err(e) => return Err(CaptureError::Malformed(format!("{:?}", e))),
        }
    }

    Ok(packets)
}
