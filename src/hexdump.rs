use core::fmt::{self, Display};

/// Payload bytes as `0x..` tokens, 16 per line with a gap after the 8th.
pub struct HexDump<'a>(pub &'a [u8]);

impl Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            write!(f, "0x{b:02x} ")?;
            let n = i + 1;
            if n % 16 == 0 {
                writeln!(f)?;
            } else if n % 8 == 0 {
                write!(f, "  ")?;
            }
        }
        Ok(())
    }
}
