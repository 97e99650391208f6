//! Intel ships microcode as `.dat` text: C array bodies of 32-bit hex words,
//! e.g. `0x00000001, 0x00000028, 0x09142023, 0x000906ea,`, interleaved with
//! `/* ... */` or `//` comment lines.

use log::trace;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatError {
    #[error("line {line}: not a 32-bit hex word: {word:?}")]
    InvalidWord { line: usize, word: String },
}

fn parse_word(w: &str) -> Option<u32> {
    let digits = w
        .strip_prefix("0x")
        .or_else(|| w.strip_prefix("0X"))
        .unwrap_or(w);
    // from_str_radix would accept a leading sign
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Converts `.dat` text into the binary image the walker reads.
pub fn parse(text: &str) -> Result<Vec<u8>, DatError> {
    let mut out = Vec::<u8>::new();
    for (i, line) in text.lines().enumerate() {
        // any slash marks a comment line
        if line.contains('/') {
            trace!("skipping line {}: {line}", i + 1);
            continue;
        }
        for token in line.split_whitespace() {
            let w = token.trim_matches(|c: char| c == ',' || c.is_whitespace());
            if w.is_empty() {
                continue;
            }
            let Some(v) = parse_word(w) else {
                return Err(DatError::InvalidWord {
                    line: i + 1,
                    word: w.to_string(),
                });
            };
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_become_little_endian() {
        let text = "/* m80906ea_000000f0.dat */\n0x00000001,\t0x000000f0, 0x09142023,\n0xdeadbeef,\n";
        let b = parse(text).unwrap();
        assert_eq!(b.len(), 16);
        assert_eq!(&b[0..4], &[1, 0, 0, 0]);
        assert_eq!(&b[4..8], &[0xf0, 0, 0, 0]);
        assert_eq!(&b[12..16], &[0xef, 0xbe, 0xad, 0xde]);
    }

    #[test]
    fn comments_and_blank_tokens() {
        let text = "// header\n\n 0x1 , 2\n , \nabc /* trailing */\n";
        let b = parse(text).unwrap();
        assert_eq!(b, vec![1, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn bad_word() {
        let e = parse("0x1,\n0x2, 0xzz,\n").unwrap_err();
        assert_eq!(
            e,
            DatError::InvalidWord {
                line: 2,
                word: "0xzz".to_string()
            }
        );
        assert_eq!(e.to_string(), "line 2: not a 32-bit hex word: \"0xzz\"");
    }

    #[test]
    fn word_too_wide() {
        assert!(parse("0x100000000\n").is_err());
        assert!(parse("-1\n").is_err());
    }
}
