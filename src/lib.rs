pub mod dat;
pub mod header;
pub mod hexdump;
pub mod walk;

pub use header::{CpuId, Date, ExtendedHeader, ExtendedSignature, PrimaryHeader, SignatureTable};
pub use walk::{walk, State, Truncated, UpdateRecord, WalkError, WalkOptions, Walker};
