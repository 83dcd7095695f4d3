//! Sequential reading of fixed-layout trace records.
//!
//! Every record is a 240 byte trace header in the SEG-Y / SU layout followed by `ns` single
//! precision samples. Only the header fields needed to group traces into shots and to place
//! sources and receivers are decoded.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

/// Size of a trace header in bytes.
pub const TRACE_HEADER_BYTES: usize = 240;

const FLDR_OFFSET: usize = 8;
const SELEV_OFFSET: usize = 40;
const SCALEL_OFFSET: usize = 68;
const SCALCO_OFFSET: usize = 70;
const SX_OFFSET: usize = 72;
const GX_OFFSET: usize = 80;
const NS_OFFSET: usize = 114;

/// Byte order of the header fields and samples.
///
/// SU files carry the byte order of the machine that wrote them, which is little endian on
/// practically every host in use. SEG-Y files are big endian.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Converts a SEG-Y scale factor into a multiplier.
///
/// Negative values divide, zero means unity and positive values multiply.
pub fn scale_factor(scalar: i16) -> f32 {
    match scalar {
        s if s < 0 => 1.0 / (s as f32).abs(),
        0 => 1.0,
        s => s as f32,
    }
}

/// The decoded subset of a trace header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TraceHeader {
    /// Field record number, used as the shot identifier.
    pub fldr: i32,
    /// Surface elevation at the source.
    pub selev: i32,
    /// Scale factor for elevations.
    pub scalel: i16,
    /// Scale factor for coordinates.
    pub scalco: i16,
    /// Source x coordinate.
    pub sx: i32,
    /// Receiver x coordinate.
    pub gx: i32,
    /// Number of samples in this trace.
    pub ns: u16,
}

impl TraceHeader {
    pub fn decode(bytes: &[u8; TRACE_HEADER_BYTES], endianness: Endianness) -> Self {
        match endianness {
            Endianness::Little => Self::decode_with::<LittleEndian>(bytes),
            Endianness::Big => Self::decode_with::<BigEndian>(bytes),
        }
    }

    /// Encodes the header into a zero filled 240 byte record.
    pub fn encode(&self, endianness: Endianness) -> [u8; TRACE_HEADER_BYTES] {
        match endianness {
            Endianness::Little => self.encode_with::<LittleEndian>(),
            Endianness::Big => self.encode_with::<BigEndian>(),
        }
    }

    fn decode_with<B: ByteOrder>(bytes: &[u8; TRACE_HEADER_BYTES]) -> Self {
        TraceHeader {
            fldr: B::read_i32(&bytes[FLDR_OFFSET..]),
            selev: B::read_i32(&bytes[SELEV_OFFSET..]),
            scalel: B::read_i16(&bytes[SCALEL_OFFSET..]),
            scalco: B::read_i16(&bytes[SCALCO_OFFSET..]),
            sx: B::read_i32(&bytes[SX_OFFSET..]),
            gx: B::read_i32(&bytes[GX_OFFSET..]),
            ns: B::read_u16(&bytes[NS_OFFSET..]),
        }
    }

    fn encode_with<B: ByteOrder>(&self) -> [u8; TRACE_HEADER_BYTES] {
        let mut bytes = [0u8; TRACE_HEADER_BYTES];
        B::write_i32(&mut bytes[FLDR_OFFSET..], self.fldr);
        B::write_i32(&mut bytes[SELEV_OFFSET..], self.selev);
        B::write_i16(&mut bytes[SCALEL_OFFSET..], self.scalel);
        B::write_i16(&mut bytes[SCALCO_OFFSET..], self.scalco);
        B::write_i32(&mut bytes[SX_OFFSET..], self.sx);
        B::write_i32(&mut bytes[GX_OFFSET..], self.gx);
        B::write_u16(&mut bytes[NS_OFFSET..], self.ns);
        bytes
    }

    /// Scaled source x coordinate.
    pub fn source_x(&self) -> f32 {
        self.sx as f32 * scale_factor(self.scalco)
    }

    /// Scaled source elevation.
    pub fn source_z(&self) -> f32 {
        self.selev as f32 * scale_factor(self.scalel)
    }

    /// Scaled receiver x coordinate.
    pub fn receiver_x(&self) -> f32 {
        self.gx as f32 * scale_factor(self.scalco)
    }

    /// Two traces belong to the same shot if they share source position and record number.
    pub fn same_shot(&self, other: &TraceHeader) -> bool {
        self.sx == other.sx && self.fldr == other.fldr
    }
}

/// Reads trace records one after the other from any byte source.
///
/// A short read where a header or a full trace was expected is reported as the end of the
/// input, never as an error.
pub struct TraceReader<R> {
    inner: R,
    endianness: Endianness,
    header_bytes: [u8; TRACE_HEADER_BYTES],
    sample_bytes: Vec<u8>,
}

impl TraceReader<Box<dyn Read>> {
    /// Opens `path` for reading, or standard input if no path is given.
    pub fn open(path: Option<&Path>, endianness: Endianness) -> io::Result<Self> {
        let inner: Box<dyn Read> = match path {
            Some(path) => Box::new(BufReader::new(File::open(path)?)),
            None => Box::new(BufReader::new(io::stdin())),
        };
        Ok(TraceReader::new(inner, endianness))
    }
}

impl<R: Read> TraceReader<R> {
    pub fn new(inner: R, endianness: Endianness) -> Self {
        TraceReader {
            inner,
            endianness,
            header_bytes: [0u8; TRACE_HEADER_BYTES],
            sample_bytes: Vec::new(),
        }
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Reads the next header. Returns `None` at the end of the input.
    pub fn read_header(&mut self) -> io::Result<Option<TraceHeader>> {
        let n_read = read_full(&mut self.inner, &mut self.header_bytes)?;
        if n_read < TRACE_HEADER_BYTES {
            if n_read > 0 {
                log::warn!(
                    "truncated trace header ({} of {} bytes), treating as end of input",
                    n_read,
                    TRACE_HEADER_BYTES
                );
            }
            return Ok(None);
        }
        Ok(Some(TraceHeader::decode(&self.header_bytes, self.endianness)))
    }

    /// Reads `samples.len()` samples of the current trace.
    ///
    /// Returns `false` if the input ended before the trace was complete.
    pub fn read_samples(&mut self, samples: &mut [f32]) -> io::Result<bool> {
        let n_bytes = samples.len() * std::mem::size_of::<f32>();
        self.sample_bytes.resize(n_bytes, 0);
        let n_read = read_full(&mut self.inner, &mut self.sample_bytes)?;
        if n_read < n_bytes {
            log::warn!(
                "truncated trace ({} of {} bytes), treating as end of input",
                n_read,
                n_bytes
            );
            return Ok(false);
        }
        match self.endianness {
            Endianness::Little => LittleEndian::read_f32_into(&self.sample_bytes, samples),
            Endianness::Big => BigEndian::read_f32_into(&self.sample_bytes, samples),
        }
        Ok(true)
    }
}

/// Fills `buf` as far as the reader allows and returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use byteorder::WriteBytesExt;
    use std::io::Cursor;

    fn header() -> TraceHeader {
        TraceHeader {
            fldr: 7,
            selev: -1250,
            scalel: -10,
            scalco: -100,
            sx: 150_000,
            gx: 145_000,
            ns: 3,
        }
    }

    #[test]
    fn test_scale_factor_sign_convention() {
        assert_eq!(scale_factor(-100), 0.01);
        assert_eq!(scale_factor(0), 1.0);
        assert_eq!(scale_factor(10), 10.0);
    }

    #[test]
    fn test_header_fields_sit_at_segy_offsets() {
        let bytes = header().encode(Endianness::Big);
        assert_eq!(&bytes[8..12], &7_i32.to_be_bytes());
        assert_eq!(&bytes[72..76], &150_000_i32.to_be_bytes());
        assert_eq!(&bytes[114..116], &3_u16.to_be_bytes());
        assert_eq!(TraceHeader::decode(&bytes, Endianness::Big), header());
    }

    #[test]
    fn test_scaled_coordinates() {
        let h = header();
        assert_abs_diff_eq!(h.source_x(), 1500.0, epsilon = 1e-3);
        assert_abs_diff_eq!(h.receiver_x(), 1450.0, epsilon = 1e-3);
        assert_abs_diff_eq!(h.source_z(), -125.0, epsilon = 1e-4);
    }

    #[test]
    fn test_reader_reads_trace_and_stops_at_end() {
        let mut stream = header().encode(Endianness::Little).to_vec();
        for v in [1.0_f32, -2.0, 0.5] {
            stream.write_f32::<LittleEndian>(v).unwrap();
        }
        let mut reader = TraceReader::new(Cursor::new(stream), Endianness::Little);

        let h = reader.read_header().unwrap().unwrap();
        assert_eq!(h, header());
        let mut samples = vec![0.0_f32; h.ns as usize];
        assert!(reader.read_samples(&mut samples).unwrap());
        assert_eq!(samples, vec![1.0, -2.0, 0.5]);
        assert!(reader.read_header().unwrap().is_none());
    }

    #[test]
    fn test_reader_treats_short_reads_as_end_of_input() {
        let mut stream = header().encode(Endianness::Little).to_vec();
        stream.write_f32::<LittleEndian>(1.0).unwrap();
        let mut reader = TraceReader::new(Cursor::new(stream), Endianness::Little);
        reader.read_header().unwrap().unwrap();
        let mut samples = vec![0.0_f32; 3];
        assert!(!reader.read_samples(&mut samples).unwrap());

        let partial_header = vec![0u8; 100];
        let mut reader = TraceReader::new(Cursor::new(partial_header), Endianness::Little);
        assert!(reader.read_header().unwrap().is_none());
    }
}
