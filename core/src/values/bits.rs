//! Arbitrary-width two's-complement bit vectors.
//!
//! Values are stored as little-endian 64-bit limbs, always masked to their
//! declared width, so derived equality and hashing are canonical. The emitter
//! only ever constructs, compares and renders these; arithmetic beyond the
//! increment needed for range materialization belongs to the interpreter.

use core::fmt;

use smallvec::SmallVec;

/// A bit vector of fixed width with an explicit signedness tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bits {
    signed: bool,
    width: usize,
    /// Little-endian limbs; exactly `width.div_ceil(64)` entries, top limb masked.
    limbs: SmallVec<[u64; 2]>,
}

fn limb_count(width: usize) -> usize {
    width.div_ceil(64)
}

impl Bits {
    /// An unsigned value; `value` is truncated to `width` bits.
    pub fn ubits(width: usize, value: u64) -> Bits {
        let mut limbs = SmallVec::from_elem(0u64, limb_count(width));
        if let Some(first) = limbs.first_mut() {
            *first = value;
        }
        let mut bits = Bits {
            signed: false,
            width,
            limbs,
        };
        bits.mask_top();
        bits
    }

    /// A signed value; `value` is sign-extended, then truncated to `width` bits.
    pub fn sbits(width: usize, value: i64) -> Bits {
        let fill = if value < 0 { u64::MAX } else { 0 };
        let mut limbs = SmallVec::from_elem(fill, limb_count(width));
        if let Some(first) = limbs.first_mut() {
            *first = value as u64;
        }
        let mut bits = Bits {
            signed: true,
            width,
            limbs,
        };
        bits.mask_top();
        bits
    }

    /// A boolean as the canonical `u1` encoding.
    pub fn from_bool(value: bool) -> Bits {
        Bits::ubits(1, value as u64)
    }

    /// Builds a value from raw hex digits (most significant first).
    ///
    /// Returns `None` on a non-hex digit. Used by the reassembler for values
    /// wider than 64 bits.
    pub fn from_hex(signed: bool, width: usize, digits: &str) -> Option<Bits> {
        let mut limbs: SmallVec<[u64; 2]> = SmallVec::from_elem(0u64, limb_count(width));
        for (i, ch) in digits.bytes().rev().enumerate() {
            let nibble = (ch as char).to_digit(16)? as u64;
            if nibble == 0 {
                continue;
            }
            let top_bit = i * 4 + (63 - nibble.leading_zeros() as usize);
            if top_bit >= width {
                return None; // digits exceed the declared width
            }
            limbs[i / 16] |= nibble << ((i % 16) * 4);
        }
        Some(Bits {
            signed,
            width,
            limbs,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn is_zero(&self) -> bool {
        self.limbs.iter().all(|&limb| limb == 0)
    }

    /// The value as a `u64`, if it fits.
    pub fn as_u64(&self) -> Option<u64> {
        if self.limbs.iter().skip(1).any(|&limb| limb != 0) {
            return None;
        }
        Some(self.limbs.first().copied().unwrap_or(0))
    }

    /// The value as an `i64`, interpreting the sign bit for signed widths.
    ///
    /// Only defined for widths up to 64 bits.
    pub fn as_i64(&self) -> Option<i64> {
        if self.width > 64 {
            return None;
        }
        let raw = self.limbs.first().copied().unwrap_or(0);
        if self.signed && self.width > 0 && (raw >> (self.width - 1)) & 1 == 1 {
            // Sign-extend the stored (masked) pattern.
            let ext = if self.width == 64 {
                raw
            } else {
                raw | !((1u64 << self.width) - 1)
            };
            Some(ext as i64)
        } else {
            i64::try_from(raw).ok()
        }
    }

    pub fn to_usize(&self) -> Option<usize> {
        self.as_u64().and_then(|v| usize::try_from(v).ok())
    }

    /// The value plus one, wrapping at the declared width.
    pub fn wrapping_increment(&self) -> Bits {
        let mut out = self.clone();
        for limb in out.limbs.iter_mut() {
            let (sum, carry) = limb.overflowing_add(1);
            *limb = sum;
            if !carry {
                break;
            }
        }
        out.mask_top();
        out
    }

    /// Unsigned less-than. Both operands must have the same width.
    pub fn ult(&self, other: &Bits) -> bool {
        debug_assert_eq!(self.width, other.width, "width mismatch in ult");
        for (a, b) in self.limbs.iter().rev().zip(other.limbs.iter().rev()) {
            if a != b {
                return a < b;
            }
        }
        false
    }

    fn mask_top(&mut self) {
        let rem = self.width % 64;
        if rem != 0 {
            if let Some(top) = self.limbs.last_mut() {
                *top &= (1u64 << rem) - 1;
            }
        }
    }
}

impl fmt::Display for Bits {
    /// Canonical type-tagged text: `u32:42`, `s3:-1`, and lowercase hex for
    /// anything wider than 64 bits (`u128:0x5`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:", if self.signed { 's' } else { 'u' }, self.width)?;
        if self.width <= 64 {
            if self.signed {
                write!(f, "{}", self.as_i64().unwrap_or(0))
            } else {
                write!(f, "{}", self.as_u64().unwrap_or(0))
            }
        } else {
            write!(f, "0x")?;
            let mut leading = true;
            for limb in self.limbs.iter().rev() {
                if leading {
                    if *limb == 0 {
                        continue;
                    }
                    write!(f, "{:x}", limb)?;
                    leading = false;
                } else {
                    write!(f, "{:016x}", limb)?;
                }
            }
            if leading {
                write!(f, "0")?;
            }
            Ok(())
        }
    }
}
