use core::iter::FusedIterator;
use log::{debug, trace};
use serde::Serialize;

use crate::header::{
    ExtendedHeader, PrimaryHeader, SignatureTable, EXT_HEADER_SIZE, HEADER_SIZE,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WalkOptions {
    /// Hand out the payload bytes with each record.
    pub include_payload: bool,
}

/// The structure that did not fit into the remaining bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Truncated {
    Header,
    Payload,
    ExtendedHeader,
    SignatureTable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum WalkError {
    #[error("truncated header at offset {offset:#010x}: need {needed} bytes, {available} left")]
    TruncatedHeader {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("truncated payload at offset {offset:#010x}: need {needed} bytes, {available} left")]
    TruncatedPayload {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error(
        "truncated extended header at offset {offset:#010x}: need {needed} bytes, {available} left"
    )]
    TruncatedExtendedHeader {
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error(
        "truncated signature table at offset {offset:#010x}: need {needed} bytes, {available} left"
    )]
    TruncatedSignatureTable {
        offset: usize,
        needed: usize,
        available: usize,
    },
}

impl WalkError {
    fn new(kind: Truncated, offset: usize, needed: usize, available: usize) -> Self {
        match kind {
            Truncated::Header => Self::TruncatedHeader {
                offset,
                needed,
                available,
            },
            Truncated::Payload => Self::TruncatedPayload {
                offset,
                needed,
                available,
            },
            Truncated::ExtendedHeader => Self::TruncatedExtendedHeader {
                offset,
                needed,
                available,
            },
            Truncated::SignatureTable => Self::TruncatedSignatureTable {
                offset,
                needed,
                available,
            },
        }
    }

    pub fn kind(&self) -> Truncated {
        match self {
            Self::TruncatedHeader { .. } => Truncated::Header,
            Self::TruncatedPayload { .. } => Truncated::Payload,
            Self::TruncatedExtendedHeader { .. } => Truncated::ExtendedHeader,
            Self::TruncatedSignatureTable { .. } => Truncated::SignatureTable,
        }
    }

    /// Offset of the structure that could not be read.
    pub fn offset(&self) -> usize {
        match *self {
            Self::TruncatedHeader { offset, .. }
            | Self::TruncatedPayload { offset, .. }
            | Self::TruncatedExtendedHeader { offset, .. }
            | Self::TruncatedSignatureTable { offset, .. } => offset,
        }
    }
}

/// One decoded microcode update.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct UpdateRecord<'a> {
    /// Position in the image, counting from 0.
    pub index: usize,
    /// Where the update starts in the image.
    pub offset: usize,
    /// Number of bytes the update occupies.
    pub size: usize,
    pub header: PrimaryHeader,
    pub extended_header: Option<ExtendedHeader>,
    pub signatures: Option<SignatureTable>,
    #[serde(with = "serde_bytes")]
    pub payload: Option<&'a [u8]>,
}

impl UpdateRecord<'_> {
    /// The byte range this update covers in the image.
    pub fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.size
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Positioned(usize),
    Exhausted,
    Error(WalkError),
}

/// Walks a concatenation of microcode updates, one record per step.
///
/// The walk stops for good after the end of the data or the first error.
#[derive(Clone, Debug)]
pub struct Walker<'a> {
    data: &'a [u8],
    options: WalkOptions,
    state: State,
    count: usize,
}

pub fn walk(data: &[u8], options: WalkOptions) -> Walker<'_> {
    Walker::new(data, options)
}

impl<'a> Walker<'a> {
    pub fn new(data: &'a [u8], options: WalkOptions) -> Self {
        let state = if data.is_empty() {
            State::Exhausted
        } else {
            State::Positioned(0)
        };
        Self {
            data,
            options,
            state,
            count: 0,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Current cursor. Once exhausted this is the image length; after an
    /// error it is where the structure that did not fit starts.
    pub fn offset(&self) -> usize {
        match self.state {
            State::Positioned(o) => o,
            State::Exhausted => self.data.len(),
            State::Error(e) => e.offset(),
        }
    }

    /// Number of records produced so far.
    pub fn produced(&self) -> usize {
        self.count
    }

    fn truncated(&self, kind: Truncated, pos: usize, needed: usize) -> WalkError {
        let available = self.data.len().saturating_sub(pos);
        WalkError::new(kind, pos, needed, available)
    }

    fn decode(&self, start: usize) -> Result<UpdateRecord<'a>, WalkError> {
        let header = PrimaryHeader::read(&self.data[start..])
            .ok_or_else(|| self.truncated(Truncated::Header, start, HEADER_SIZE))?;
        let mut pos = start + HEADER_SIZE;

        // the payload is bounds-checked even when it is only skipped
        let data_size = header.effective_data_size();
        let data = self
            .data
            .get(pos..pos + data_size)
            .ok_or_else(|| self.truncated(Truncated::Payload, pos, data_size))?;
        let payload = self.options.include_payload.then_some(data);
        pos += data_size;

        let (extended_header, signatures) = if header.has_extended_header() {
            let ext = ExtendedHeader::read(&self.data[pos..])
                .ok_or_else(|| self.truncated(Truncated::ExtendedHeader, pos, EXT_HEADER_SIZE))?;
            pos += EXT_HEADER_SIZE;

            let count = ext.signature_count as usize;
            let table = SignatureTable::read(&self.data[pos..], count)
                .ok_or_else(|| self.truncated(Truncated::SignatureTable, pos, ext.table_size()))?;
            pos += ext.table_size();
            trace!("{count} extended signatures: {table:08x?}");
            (Some(ext), Some(table))
        } else {
            (None, None)
        };

        Ok(UpdateRecord {
            index: self.count,
            offset: start,
            size: pos - start,
            header,
            extended_header,
            signatures,
            payload,
        })
    }
}

impl<'a> Iterator for Walker<'a> {
    type Item = Result<UpdateRecord<'a>, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        let State::Positioned(start) = self.state else {
            return None;
        };
        match self.decode(start) {
            Ok(r) => {
                let end = start + r.size;
                debug!("update {} @ {start:08x}:{end:08x}: {}", r.index, r.header);
                self.count += 1;
                self.state = if end >= self.data.len() {
                    State::Exhausted
                } else {
                    State::Positioned(end)
                };
                Some(Ok(r))
            }
            Err(e) => {
                self.state = State::Error(e);
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Walker<'_> {}
