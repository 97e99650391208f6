use core::fmt::{self, Display};
use core::mem::size_of;
use serde::{Deserialize, Serialize};
use zerocopy::FromBytes;
use zerocopy_derive::{AsBytes, FromBytes, FromZeroes};

// Intel 64 and IA-32 Architectures SDM, Vol. 3A, 10.11 "Microcode Update Facilities"
pub const HEADER_SIZE: usize = size_of::<PrimaryHeader>();
pub const EXT_HEADER_SIZE: usize = size_of::<ExtendedHeader>();
/// Size of one extended signature table entry (signature, flags, checksum).
pub const EXT_SIGNATURE_SIZE: usize = 3 * size_of::<i32>();

/// Payload size implied by a `data_size` of zero (pre-Pentium 4 updates).
pub const DEFAULT_DATA_SIZE: usize = 2000;

#[derive(AsBytes, FromBytes, FromZeroes, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct Date(pub u32);

impl Date {
    pub fn month(&self) -> u32 {
        self.0 >> 24
    }

    pub fn day(&self) -> u32 {
        (self.0 >> 16) & 0xff
    }

    pub fn year(&self) -> u32 {
        self.0 & 0xffff
    }
}

impl Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the digits are BCD, so hex formatting reads as decimal
        let (m, d, y) = (self.month(), self.day(), self.year());
        write!(f, "{m:x}/{d:x}/{y:x}")
    }
}

#[derive(AsBytes, FromBytes, FromZeroes, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct PrimaryHeader {
    pub version: u32,
    pub revision: i32,
    pub date: Date,
    pub processor_signature: u32,
    pub checksum: u32,
    pub loader_revision: u32,
    pub processor_flags: u32,
    pub data_size: u32,
    pub total_size: u32,
    pub _reserved: [u8; 12],
}

impl PrimaryHeader {
    /// Reads a header from the start of `data`, `None` if it is too short.
    pub fn read(data: &[u8]) -> Option<Self> {
        let h = Self::read_from_prefix(data)?;
        Some(Self {
            version: u32::from_le(h.version),
            revision: i32::from_le(h.revision),
            date: Date(u32::from_le(h.date.0)),
            processor_signature: u32::from_le(h.processor_signature),
            checksum: u32::from_le(h.checksum),
            loader_revision: u32::from_le(h.loader_revision),
            processor_flags: u32::from_le(h.processor_flags),
            data_size: u32::from_le(h.data_size),
            total_size: u32::from_le(h.total_size),
            _reserved: h._reserved,
        })
    }

    /// Payload length, applying the zero-means-2000 rule.
    pub fn effective_data_size(&self) -> usize {
        match self.data_size {
            0 => DEFAULT_DATA_SIZE,
            s => s as usize,
        }
    }

    /// Whether an extended header and signature table follow the payload.
    ///
    /// A total size of zero means there is none. Otherwise the table is
    /// there when the total size claims more than header plus payload.
    pub fn has_extended_header(&self) -> bool {
        let total = self.total_size as i64;
        let used = (HEADER_SIZE + self.effective_data_size()) as i64;
        total != 0 && total - used > 0
    }

    pub fn cpu(&self) -> CpuId {
        CpuId::from(self.processor_signature)
    }
}

impl Display for PrimaryHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rev = self.revision;
        let date = self.date;
        let cpu = self.cpu();
        let pf = self.processor_flags;
        write!(f, "rev {rev:#x} {date} for {cpu} flags {pf:02x}")
    }
}

/// Family, model and stepping as encoded in CPUID leaf 1 EAX.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct CpuId {
    pub family: u32,
    pub model: u32,
    pub stepping: u32,
}

impl From<u32> for CpuId {
    fn from(sig: u32) -> Self {
        let base_family = (sig >> 8) & 0xf;
        let family = if base_family == 0xf {
            base_family + ((sig >> 20) & 0xff)
        } else {
            base_family
        };
        let base_model = (sig >> 4) & 0xf;
        let model = if base_family == 0x6 || base_family == 0xf {
            base_model | (((sig >> 16) & 0xf) << 4)
        } else {
            base_model
        };
        Self {
            family,
            model,
            stepping: sig & 0xf,
        }
    }
}

impl Display for CpuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let CpuId {
            family,
            model,
            stepping,
        } = self;
        write!(f, "family {family:02x} model {model:02x} stepping {stepping:x}")
    }
}

#[derive(AsBytes, FromBytes, FromZeroes, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct ExtendedHeader {
    pub signature_count: u32,
    pub checksum: u32,
    pub _reserved: [u8; 12],
}

impl ExtendedHeader {
    pub fn read(data: &[u8]) -> Option<Self> {
        let h = Self::read_from_prefix(data)?;
        Some(Self {
            signature_count: u32::from_le(h.signature_count),
            checksum: u32::from_le(h.checksum),
            _reserved: h._reserved,
        })
    }

    /// Byte length of the signature table following this header.
    pub fn table_size(&self) -> usize {
        self.signature_count as usize * EXT_SIGNATURE_SIZE
    }
}

impl Display for ExtendedHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.signature_count;
        let cs = self.checksum;
        write!(f, "{n} signatures, checksum {cs:08x}")
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtendedSignature {
    pub processor_signature: i32,
    pub processor_flags: i32,
    pub checksum: i32,
}

impl Display for ExtendedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.processor_signature;
        let pf = self.processor_flags;
        let cs = self.checksum;
        write!(f, "signature {s:08x} flags {pf:02x} checksum {cs:08x}")
    }
}

/// The extended signature table. On disk the fields are grouped: all
/// signatures, then all flags, then all checksums.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SignatureTable {
    pub signatures: Vec<i32>,
    pub flags: Vec<i32>,
    pub checksums: Vec<i32>,
}

impl SignatureTable {
    /// Reads `count` entries from the start of `data`, `None` if it is too short.
    pub fn read(data: &[u8], count: usize) -> Option<Self> {
        let n = count.checked_mul(EXT_SIGNATURE_SIZE)?;
        let table = data.get(..n)?;
        let words: Vec<i32> = table
            .chunks_exact(4)
            .map(|w| i32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .collect();
        Some(Self {
            signatures: words[..count].to_vec(),
            flags: words[count..2 * count].to_vec(),
            checksums: words[2 * count..].to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = ExtendedSignature> + '_ {
        self.signatures
            .iter()
            .zip(&self.flags)
            .zip(&self.checksums)
            .map(|((&s, &f), &c)| ExtendedSignature {
                processor_signature: s,
                processor_flags: f,
                checksum: c,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(data_size: u32, total_size: u32) -> Vec<u8> {
        let words: [u32; 9] = [1, 0x2f, 0x0721_2023, 0x000906ea, 0xdead, 1, 0x22, data_size, total_size];
        let mut b: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        b.extend_from_slice(&[0u8; 12]);
        b
    }

    #[test]
    fn layout_sizes() {
        assert_eq!(HEADER_SIZE, 48);
        assert_eq!(EXT_HEADER_SIZE, 20);
        assert_eq!(EXT_SIGNATURE_SIZE, 12);
    }

    #[test]
    fn read_primary_header() {
        let h = PrimaryHeader::read(&header_bytes(0x10, 0x40)).unwrap();
        assert_eq!(h.version, 1);
        assert_eq!(h.revision, 0x2f);
        assert_eq!(h.processor_signature, 0x000906ea);
        assert_eq!(h.processor_flags, 0x22);
        assert_eq!(h.data_size, 0x10);
        assert_eq!(h.total_size, 0x40);
        assert_eq!(h.date.to_string(), "7/21/2023");
    }

    #[test]
    fn short_header_is_none() {
        assert!(PrimaryHeader::read(&header_bytes(0, 0)[..47]).is_none());
    }

    #[test]
    fn zero_data_size_means_2000() {
        let h = PrimaryHeader::read(&header_bytes(0, 0x2000)).unwrap();
        assert_eq!(h.effective_data_size(), 2000);
    }

    #[test]
    fn extended_header_presence() {
        let h = |d, t| PrimaryHeader::read(&header_bytes(d, t)).unwrap();
        assert!(!h(0x10, 0).has_extended_header());
        assert!(!h(0x10, 0x40).has_extended_header());
        assert!(!h(0x10, 0x20).has_extended_header());
        assert!(h(0x10, 0x41).has_extended_header());
        assert!(h(0x10, 0x200).has_extended_header());
        assert!(!h(0, 2048).has_extended_header());
        assert!(h(0, 2049).has_extended_header());
    }

    #[test]
    fn cpuid_decoding() {
        let c = CpuId::from(0x000906ea);
        assert_eq!(c.family, 6);
        assert_eq!(c.model, 0x9e);
        assert_eq!(c.stepping, 0xa);

        let c = CpuId::from(0x00000f29);
        assert_eq!(c.family, 0xf);
        assert_eq!(c.model, 2);
        assert_eq!(c.stepping, 9);
    }

    #[test]
    fn signature_table_is_grouped_by_field() {
        let words: [i32; 6] = [0x106a5, 0x106a4, 0x03, 0x01, 0x1111, -2];
        let b: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        let t = SignatureTable::read(&b, 2).unwrap();
        assert_eq!(t.signatures, vec![0x106a5, 0x106a4]);
        assert_eq!(t.flags, vec![0x03, 0x01]);
        assert_eq!(t.checksums, vec![0x1111, -2]);

        let e: Vec<_> = t.entries().collect();
        assert_eq!(e[1].processor_signature, 0x106a4);
        assert_eq!(e[1].processor_flags, 0x01);
        assert_eq!(e[1].checksum, -2);

        assert!(SignatureTable::read(&b[..23], 2).is_none());
    }
}
