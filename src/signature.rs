//! # Signature
//!
//! Byte patterns for the code that sets up the texture size limit, and the encodings that replace them.
//!
//! The limit is passed as two immediates (width and height) to the texture allocation routine. Both encodings of a
//! pair decode to the same instructions; only the immediate operand differs, so the code size never changes.

use std::fmt::Write;

use iced_x86::{Decoder, DecoderOptions, Formatter, IntelFormatter};

/// The way a matched signature is rewritten
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replacement {
    /// Overwrite every byte of the match
    Full(&'static [u8]),
    /// Overwrite only the listed `(offset, byte)` pairs, leaving the rest of the match untouched
    Delta(&'static [(usize, u8)]),
}

/// An original byte pattern and its replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Bytes to search for
    original: &'static [u8],
    /// How a match is rewritten
    replacement: Replacement,
}
impl Signature {
    /// Creates a signature, refusing pairs that would change the size of the patched code.
    ///
    /// Used in `const` items, so a bad pair fails the build.
    pub const fn new(original: &'static [u8], replacement: Replacement) -> Self {
        assert!(!original.is_empty(), "signature must not be empty");
        assert!(
            is_consistent(original, &replacement),
            "replacement must stay inside the original pattern"
        );
        Self {
            original,
            replacement,
        }
    }

    /// Bytes to search for
    pub const fn original(&self) -> &'static [u8] {
        self.original
    }

    /// How a match is rewritten
    pub const fn replacement(&self) -> Replacement {
        self.replacement
    }

    /// Length of the pattern, which is also the length of every write
    pub const fn len(&self) -> usize {
        self.original.len()
    }

    /// Returns `true` if the pattern has no bytes. Never the case for a signature built with [`Signature::new`].
    pub const fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    /// Bytes of a match after it has been rewritten
    pub fn patched(&self) -> Vec<u8> {
        match self.replacement {
            Replacement::Full(bytes) => bytes.to_vec(),
            Replacement::Delta(deltas) => {
                let mut bytes = self.original.to_vec();
                for &(offset, value) in deltas {
                    bytes[offset] = value;
                }
                bytes
            }
        }
    }
}

/// `len(original) == len(replacement)` for full replacements, every offset inside the pattern for deltas
const fn is_consistent(original: &[u8], replacement: &Replacement) -> bool {
    match replacement {
        Replacement::Full(bytes) => bytes.len() == original.len(),
        Replacement::Delta(deltas) => {
            if deltas.is_empty() {
                return false;
            }
            let mut i = 0;
            while i < deltas.len() {
                if deltas[i].0 >= original.len() {
                    return false;
                }
                i += 1;
            }
            true
        }
    }
}

/// `mov edx, 0x200` / `mov r8d, 0x200`
pub const X86_64_512: [u8; 11] = [
    0xba, 0x00, 0x02, 0x00, 0x00, // mov edx, 0x200
    0x41, 0xb8, 0x00, 0x02, 0x00, 0x00, // mov r8d, 0x200
];

/// `mov edx, 0x2000` / `mov r8d, 0x2000`
pub const X86_64_8192: [u8; 11] = [
    0xba, 0x00, 0x20, 0x00, 0x00, // mov edx, 0x2000
    0x41, 0xb8, 0x00, 0x20, 0x00, 0x00, // mov r8d, 0x2000
];

/// `movz w1, #0x200` / `movz w2, #0x200`
pub const ARM64_512: [u8; 8] = [
    0x01, 0x40, 0x80, 0x52, // movz w1, #0x200
    0x02, 0x40, 0x80, 0x52, // movz w2, #0x200
];

/// `movz w1, #0x2000` / `movz w2, #0x2000`
pub const ARM64_8192: [u8; 8] = [
    0x01, 0x00, 0x84, 0x52, // movz w1, #0x2000
    0x02, 0x00, 0x84, 0x52, // movz w2, #0x2000
];

/// Rewrites the second byte of each little-endian imm32 (0x02 -> 0x20)
pub const X86_64_8192_DELTA: [(usize, u8); 2] = [(2, 0x20), (8, 0x20)];

/// x86_64 Mach-O build: whole-pattern rewrite
pub const MACOS_X86_64: Signature = Signature::new(&X86_64_512, Replacement::Full(&X86_64_8192));

/// arm64 Mach-O build: whole-pattern rewrite
pub const MACOS_ARM64: Signature = Signature::new(&ARM64_512, Replacement::Full(&ARM64_8192));

/// x86_64 PE build: only the immediate bytes are touched
pub const WINDOWS_X86_64: Signature =
    Signature::new(&X86_64_512, Replacement::Delta(&X86_64_8192_DELTA));

/// Renders x86_64 machine code as Intel syntax, one instruction per line.
///
/// `ip` is only used to resolve relative operands.
pub fn describe(code: &[u8], ip: u64) -> String {
    let mut decoder = Decoder::with_ip(64, code, ip, DecoderOptions::NONE);
    let mut formatter = IntelFormatter::new();
    let mut out = String::new();
    let mut line = String::new();

    for instr in &mut decoder {
        line.clear();
        formatter.format(&instr, &mut line);
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "{:016x} {}", instr.ip(), line);
    }
    out
}

#[cfg(test)]
mod tests {
    use iced_x86::{Code, Decoder, DecoderOptions, Register};

    use super::*;

    /// Decodes `code` into `(register, immediate)` pairs of `mov r32, imm32`
    fn movs(code: &[u8]) -> Vec<(Register, u32)> {
        Decoder::new(64, code, DecoderOptions::NONE)
            .into_iter()
            .map(|instr| {
                assert_eq!(instr.code(), Code::Mov_r32_imm32);
                (instr.op0_register(), instr.immediate32())
            })
            .collect()
    }

    #[test]
    /// Every built-in pair keeps the code size
    fn test_lengths() {
        for signature in [MACOS_X86_64, MACOS_ARM64, WINDOWS_X86_64] {
            assert_eq!(signature.patched().len(), signature.len());
        }
        assert_eq!(X86_64_512.len(), X86_64_8192.len());
        assert_eq!(ARM64_512.len(), ARM64_8192.len());
    }

    #[test]
    /// The accessors hand back what the constructor checked
    fn test_accessors() {
        assert_eq!(WINDOWS_X86_64.original(), &X86_64_512[..]);
        assert_eq!(
            WINDOWS_X86_64.replacement(),
            Replacement::Delta(&X86_64_8192_DELTA)
        );
        assert_eq!(
            MACOS_ARM64.replacement(),
            Replacement::Full(&ARM64_8192)
        );
    }

    #[test]
    /// Both x86_64 encodings are the same instructions with a different immediate
    fn test_x86_64_encodings() {
        assert_eq!(
            movs(&X86_64_512),
            [(Register::EDX, 0x200), (Register::R8D, 0x200)]
        );
        assert_eq!(
            movs(&X86_64_8192),
            [(Register::EDX, 0x2000), (Register::R8D, 0x2000)]
        );
    }

    #[test]
    /// The selective rewrite produces the same code as the full one
    fn test_delta_matches_full() {
        assert_eq!(WINDOWS_X86_64.patched(), X86_64_8192);
        assert_eq!(MACOS_X86_64.patched(), X86_64_8192);

        // and only the immediates differ
        let changed: Vec<_> = X86_64_512
            .iter()
            .zip(X86_64_8192.iter())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(changed, [2, 8]);
    }

    #[test]
    /// `movz wN, #imm16` keeps the immediate in bits 5..21
    fn test_arm64_encodings() {
        let imm = |code: &[u8]| -> Vec<(u32, u32)> {
            code.chunks(4)
                .map(|word| {
                    let word = u32::from_le_bytes(word.try_into().unwrap());
                    // movz (32-bit, hw = 0)
                    assert_eq!(word & 0xffe0_0000, 0x5280_0000);
                    (word & 0x1f, (word >> 5) & 0xffff)
                })
                .collect()
        };
        assert_eq!(imm(&ARM64_512), [(1, 0x200), (2, 0x200)]);
        assert_eq!(imm(&ARM64_8192), [(1, 0x2000), (2, 0x2000)]);
    }

    #[test]
    /// Inconsistent pairs are rejected
    fn test_consistency() {
        assert!(!is_consistent(&X86_64_512, &Replacement::Full(&ARM64_8192)));
        assert!(!is_consistent(&ARM64_512, &Replacement::Delta(&[(8, 0)])));
        assert!(!is_consistent(&ARM64_512, &Replacement::Delta(&[])));
        assert!(is_consistent(&ARM64_512, &Replacement::Delta(&[(7, 0)])));
    }

    #[test]
    /// Disassembly lists both instructions
    fn test_describe() {
        let text = describe(&X86_64_8192, 0x1000);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000000000001000 mov edx"));
        assert!(lines[1].starts_with("0000000000001005 mov r8d"));
    }
}
