// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

#![no_std]

//! `bitband` is a no-std crate for atomic single-bit flags on Cortex-M3/M4
//! cores, built on the SRAM bit-banding feature of those cores.
//!
//! Bit-banding maps each bit of the lowest megabyte of SRAM (the _source_
//! region) onto its own 32-bit word in a separate _alias_ region. Writing 1 or
//! 0 to an alias word sets or clears the corresponding bit in the source byte
//! without a read-modify-write sequence, and reading the word yields the
//! bit's current value. Two contexts that touch different bits of the same
//! byte therefore never race with one another: each access is a single
//! naturally-aligned word load or store.
//!
//! The crate is built around three pieces:
//!
//! * [`Region`], an immutable description of a bit-band pair (alias base and
//!   source base), typically [`Region::CORTEX_M_SRAM`];
//! * [`Region::make_handle`], the address calculator, which maps a storage
//!   byte and a bit index onto the alias word of that bit;
//! * [`Flag`], the resulting handle, exposing [`set`][Flag::set],
//!   [`clear`][Flag::clear] and [`test`][Flag::test].
//!
//! A `Flag` is valid by construction: an out-of-range bit index is rejected
//! with [`InvalidBitIndex`] and no handle is produced. All raw memory access
//! in the crate happens inside the `Flag` operations.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bitband::Region;
//!
//! static mut STATE: u8 = 0;
//!
//! // SAFETY: `STATE` is a static in SRAM, within the bit-band region.
//! let error = unsafe { Region::CORTEX_M_SRAM.make_handle(&raw const STATE, 3) }
//!     .unwrap();
//!
//! error.set();
//! assert!(error.test());
//! error.clear();
//! assert!(!error.test());
//! ```
//!
//! The calculator is also available on plain integers and in `const`
//! contexts:
//!
//! ```rust
//! use bitband::Region;
//!
//! const READY: Option<usize> = Region::CORTEX_M_SRAM.alias_address(0x2000_0000, 3);
//! assert_eq!(READY, Some(0x2200_000c));
//! assert_eq!(Region::CORTEX_M_SRAM.alias_address(0x2000_0000, 8), None);
//! ```
//!
//! For a set of named flags sharing one storage byte, see [`flags!`].

use core::fmt;
use core::ptr;

/// Specifies a layout of named flags over a single storage byte.
///
/// # Syntax
///
/// ```rust
/// bitband::flags!({
///     pub struct UartStatus(u8);
///     {
///         /// Receive data is ready.
///         let rx_ready: Bit<0>;
///         let tx_empty: Bit<1>;
///         let _: Bit<2>;
///         let overrun: Bit<7>;
///     }
/// });
///
/// assert_eq!(UartStatus::OVERRUN_BIT, 7);
/// assert_eq!(UartStatus::MASK, 0b1000_0011);
/// ```
///
/// The storage type given in the tuple struct must be `u8`: bit-banding
/// addresses memory byte by byte, and the storage byte is what the flags are
/// bound to. Each flag is declared with a `let` statement of the form
/// `let $name: Bit<$bit>;`, with `$bit` in `0..=7`. A wildcard declaration
/// `let _: Bit<$bit>;` documents a reserved bit and yields no accessor. Doc
/// comments on a flag are forwarded to its accessor.
///
/// Out-of-range bits, bits claimed twice, bit ranges, initializers and
/// non-`u8` storage are all rejected at compile time, as are flags named
/// after a generated method (`bind`, `clear_all`, `iter`) or sharing a name.
///
/// ```rust,compile_fail
/// bitband::flags!({
///     struct Status(u8);
///     {
///         let ready: Bit<8>;
///     }
/// });
/// ```
///
/// ```rust,compile_fail
/// bitband::flags!({
///     struct Status(u8);
///     {
///         let ready: Bit<1>;
///         let busy: Bit<1>;
///     }
/// });
/// ```
///
/// ```rust,compile_fail
/// bitband::flags!({
///     struct Status(u8);
///     {
///         let _: Bit<3>;
///         let error: Bit<3>;
///     }
/// });
/// ```
///
/// ```rust,compile_fail
/// bitband::flags!({
///     struct Status(u8);
///     {
///         let count: Bits<3, 0>;
///     }
/// });
/// ```
///
/// ```rust,compile_fail
/// bitband::flags!({
///     struct Status(u8);
///     {
///         let ready: Bit<0> = true;
///     }
/// });
/// ```
///
/// ```rust,compile_fail
/// bitband::flags!({
///     struct Status(u16);
///     {
///         let ready: Bit<0>;
///     }
/// });
/// ```
///
/// ```rust,compile_fail
/// bitband::flags!({
///     #[derive(Debug)]
///     struct Status(u8);
///     {
///         let ready: Bit<0>;
///     }
/// });
/// ```
///
/// ```rust,compile_fail
/// bitband::flags!({
///     struct Status(u8);
///     {
///         let iter: Bit<0>;
///     }
/// });
/// ```
///
/// ```rust,compile_fail
/// bitband::flags!({
///     struct Status(u8);
///     {
///         let ready: Bit<0>;
///         let ready: Bit<1>;
///     }
/// });
/// ```
///
/// # Generated items
///
/// The layout type is a `Copy` struct holding one [`Flag`] per named bit,
/// with [`Copy`], [`Clone`], [`Debug`], [`Eq`] and [`PartialEq`] implemented.
/// Other attributes on the struct are forwarded.
///
/// * `unsafe fn bind(region: &Region, storage: *const u8) -> Self` computes
///   every flag of the layout for the given storage byte, under the same
///   contract as [`Region::make_handle`];
/// * `fn $name(&self) -> Flag` returns the handle of flag `$name`;
/// * `const $NAME_BIT: u8` gives the bit position of each flag, and
///   `const MASK: u8` the mask of all named bits;
/// * `const FLAGS: [FlagMetadata; N]` describes every named flag in bit
///   order, and `iter()` (as well as [`IntoIterator`]) yields
///   `(&'static FlagMetadata, Flag)` pairs in that same order;
/// * `fn clear_all(&self)` clears every named flag, one alias write at a
///   time.
pub use bitband_macro::flags;

/// Size in bytes of the bit-bandable source window.
pub const REGION_SIZE: usize = 0x10_0000;

/// Number of bits, and so of alias words, per source byte.
pub const BITS_PER_BYTE: u8 = 8;

/// Size in bytes of one alias word.
pub const ALIAS_WORD_SIZE: usize = 4;

/// Bytes of alias space covering a single source byte.
pub const ALIAS_BYTES_PER_BYTE: usize = BITS_PER_BYTE as usize * ALIAS_WORD_SIZE;

/// Represents an out-of-range bit index given to [`Region::make_handle`] or
/// [`BitIndex::new`], wrapping the rejected value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidBitIndex(pub u8);

impl fmt::Display for InvalidBitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "bit index {} is out of range; a byte has bits 0 through {}",
            self.0,
            BitIndex::MAX.get(),
        )
    }
}

impl core::error::Error for InvalidBitIndex {}

/// The position of a bit within a byte, guaranteed to lie in `0..=7`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitIndex(u8);

impl BitIndex {
    /// The lowest bit of a byte.
    pub const MIN: Self = Self(0);

    /// The highest bit of a byte.
    pub const MAX: Self = Self(BITS_PER_BYTE - 1);

    /// Validates a bit index.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBitIndex`] if `bit` is 8 or greater.
    pub const fn new(bit: u8) -> Result<Self, InvalidBitIndex> {
        if bit < BITS_PER_BYTE {
            Ok(Self(bit))
        } else {
            Err(InvalidBitIndex(bit))
        }
    }

    /// Returns the bit position.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns the single-bit mask of this position within a byte.
    #[must_use]
    pub const fn mask(self) -> u8 {
        1 << self.0
    }
}

impl TryFrom<u8> for BitIndex {
    type Error = InvalidBitIndex;

    fn try_from(bit: u8) -> Result<Self, Self::Error> {
        Self::new(bit)
    }
}

impl From<BitIndex> for u8 {
    fn from(bit: BitIndex) -> Self {
        bit.0
    }
}

/// Returns the offset of the alias word of `bit` of the source byte at
/// `byte_offset`, relative to the alias base.
///
/// Each source byte is covered by eight consecutive alias words, one per
/// bit, hence `byte_offset * 32 + bit * 4`.
#[must_use]
pub const fn bit_word_offset(byte_offset: usize, bit: BitIndex) -> usize {
    byte_offset
        .wrapping_mul(ALIAS_BYTES_PER_BYTE)
        .wrapping_add(bit.0 as usize * ALIAS_WORD_SIZE)
}

/// A bit-band region: a source window of [`REGION_SIZE`] bytes and the alias
/// window mapping each of its bits.
///
/// A `Region` is plain configuration. It is created once, usually as a
/// constant, and passed wherever flags are made.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Region {
    alias_base: usize,
    source_base: usize,
}

impl Region {
    /// The SRAM bit-band region of the Cortex-M3 and Cortex-M4, as fixed by
    /// the architecture's memory map: SRAM at `0x2000_0000`, aliased at
    /// `0x2200_0000`.
    pub const CORTEX_M_SRAM: Self = Self::new(0x2200_0000, 0x2000_0000);

    /// Describes a region whose alias window starts at `alias_base` and
    /// whose source window starts at `source_base`.
    ///
    /// # Panics
    ///
    /// Panics if `alias_base` is zero or is not word-aligned. In a `const`
    /// item this is a compile-time error.
    #[must_use]
    pub const fn new(alias_base: usize, source_base: usize) -> Self {
        assert!(alias_base != 0, "alias base must not be null");
        assert!(
            alias_base.is_multiple_of(ALIAS_WORD_SIZE),
            "alias base must be word-aligned"
        );
        Self {
            alias_base,
            source_base,
        }
    }

    /// Returns the base address of the alias window.
    #[must_use]
    pub const fn alias_base(&self) -> usize {
        self.alias_base
    }

    /// Returns the base address of the source window.
    #[must_use]
    pub const fn source_base(&self) -> usize {
        self.source_base
    }

    /// Whether `address` lies within the source window.
    #[must_use]
    pub const fn contains(&self, address: usize) -> bool {
        address >= self.source_base && address - self.source_base < REGION_SIZE
    }

    /// Returns the offset of `address` from the source base.
    ///
    /// Addresses outside the source window yield a meaningless (wrapped)
    /// offset.
    #[must_use]
    pub const fn byte_offset(&self, address: usize) -> usize {
        address.wrapping_sub(self.source_base)
    }

    /// Computes the alias word address of `bit` of the byte at `address`, or
    /// `None` if `bit` is not in `0..=7`.
    ///
    /// `address` is expected to lie within the source window; see
    /// [`Region::contains`].
    #[must_use]
    pub const fn alias_address(&self, address: usize, bit: u8) -> Option<usize> {
        match BitIndex::new(bit) {
            Ok(bit) => Some(self.alias_address_at(address, bit)),
            Err(_) => None,
        }
    }

    /// Computes the alias word address of an already validated bit.
    #[must_use]
    pub const fn alias_address_at(&self, address: usize, bit: BitIndex) -> usize {
        self.alias_base
            .wrapping_add(bit_word_offset(self.byte_offset(address), bit))
    }

    /// Creates the flag for `bit` of the byte at `storage`.
    ///
    /// This is the only validation performed: the bit index is checked, the
    /// storage address is not (beyond a debug assertion).
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBitIndex`] if `bit` is 8 or greater.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `storage` lies outside the source window.
    ///
    /// # Safety
    ///
    /// `storage` must point into the source window of this region, and this
    /// region must describe real bit-band hardware. The storage must remain
    /// live for as long as the returned flag is used. Violating this makes
    /// the flag operations write to whatever memory the computed alias
    /// address happens to hit.
    pub unsafe fn make_handle(
        &self,
        storage: *const u8,
        bit: u8,
    ) -> Result<Flag, InvalidBitIndex> {
        match BitIndex::new(bit) {
            // SAFETY: Forwarded from the caller.
            Ok(bit) => Ok(unsafe { self.make_handle_at(storage, bit) }),
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "bitband: rejected bit index {=u8} for storage at {=usize:#x}",
                    bit,
                    storage.addr()
                );
                Err(err)
            }
        }
    }

    /// Creates the flag for an already validated bit of the byte at
    /// `storage`.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `storage` lies outside the source window.
    ///
    /// # Safety
    ///
    /// Same contract as [`Region::make_handle`].
    pub unsafe fn make_handle_at(&self, storage: *const u8, bit: BitIndex) -> Flag {
        let address = storage.addr();
        debug_assert!(
            self.contains(address),
            "storage at {address:#x} lies outside the bit-band source window \
             [{:#x}, {:#x})",
            self.source_base,
            self.source_base.wrapping_add(REGION_SIZE),
        );
        Flag {
            address: self.alias_address_at(address, bit),
        }
    }

    /// Creates the flag for bit `BIT` of the byte at `storage`, rejecting an
    /// out-of-range `BIT` at compile time.
    ///
    /// ```rust,compile_fail
    /// use bitband::Region;
    ///
    /// static mut STATE: u8 = 0;
    ///
    /// let _ = unsafe { Region::CORTEX_M_SRAM.flag::<8>(&raw const STATE) };
    /// ```
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `storage` lies outside the source window.
    ///
    /// # Safety
    ///
    /// Same contract as [`Region::make_handle`].
    pub unsafe fn flag<const BIT: u8>(&self, storage: *const u8) -> Flag {
        const { assert!(BIT < BITS_PER_BYTE, "bit index must be in 0..=7") };
        // SAFETY: Forwarded from the caller.
        unsafe { self.make_handle_at(storage, BitIndex(BIT)) }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("alias_base", &format_args!("{:#010x}", self.alias_base))
            .field("source_base", &format_args!("{:#010x}", self.source_base))
            .finish()
    }
}

/// A handle on one bit of one byte in a bit-band source window, holding the
/// address of that bit's alias word.
///
/// Flags are made by [`Region::make_handle`] (or [`Region::flag`], or a
/// [`flags!`] layout) and are immutable afterwards. Each operation is a
/// single aligned word access, so a flag may be used from any context,
/// interrupt handlers included, and flags on different bits of the same byte
/// never interfere. Concurrent `set` and `clear` of the _same_ bit race as
/// they would on any shared bit.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flag {
    address: usize,
}

impl Flag {
    /// Returns the address of the alias word.
    #[must_use]
    pub const fn alias_address(self) -> usize {
        self.address
    }

    /// Sets the bit.
    #[inline]
    pub fn set(self) {
        self.write(true);
    }

    /// Clears the bit.
    #[inline]
    pub fn clear(self) {
        self.write(false);
    }

    /// Sets the bit to `value`.
    #[inline]
    pub fn write(self, value: bool) {
        // SAFETY: The address was computed from storage that the creator of
        // the flag vouched for.
        unsafe { ptr::write_volatile(self.word(), u32::from(value)) }
    }

    /// Whether the bit is set.
    #[inline]
    #[must_use]
    pub fn test(self) -> bool {
        // SAFETY: See `write()`.
        unsafe { ptr::read_volatile(self.word()) == 1 }
    }

    fn word(self) -> *mut u32 {
        ptr::with_exposed_provenance_mut(self.address)
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Flag({:#010x})", self.address)
    }
}

/// The metadata of a named flag in a [`flags!`] layout.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlagMetadata {
    /// The name of the flag.
    pub name: &'static str,
    /// The bit of the storage byte that the flag covers.
    pub bit: u8,
}
