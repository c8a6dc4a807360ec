// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

// Compile-time assertions over the const-friendly parts of the API.

use bitband::{
    ALIAS_BYTES_PER_BYTE, ALIAS_WORD_SIZE, BITS_PER_BYTE, BitIndex,
    InvalidBitIndex, Region, bit_word_offset, flags,
};

const SRAM: Region = Region::CORTEX_M_SRAM;
const SYNTHETIC: Region = Region::new(0x4000, 0x100);

const _: () = {
    assert!(matches!(SRAM.alias_address(0x2000_0000, 3), Some(0x2200_000c)));
    assert!(matches!(SRAM.alias_address(0x2000_0000, 8), None));
    assert!(matches!(SRAM.alias_address(0x2000_0000, 255), None));
    assert!(SRAM.alias_address_at(0x200f_ffff, BitIndex::MAX) == 0x23ff_fffc);
};

const _: () = {
    assert!(matches!(SYNTHETIC.alias_address(0x100, 0), Some(0x4000)));
    assert!(matches!(SYNTHETIC.alias_address(0x102, 1), Some(0x4044)));
    assert!(SYNTHETIC.byte_offset(0x180) == 0x80);
};

const _: () = {
    assert!(ALIAS_BYTES_PER_BYTE == BITS_PER_BYTE as usize * ALIAS_WORD_SIZE);
    assert!(ALIAS_BYTES_PER_BYTE == 32);
    assert!(bit_word_offset(0, BitIndex::MIN) == 0);
    assert!(bit_word_offset(1, BitIndex::MIN) == 32);
    assert!(bit_word_offset(1, BitIndex::MAX) == 60);
};

const _: () = {
    assert!(matches!(BitIndex::new(7), Ok(BitIndex::MAX)));
    assert!(matches!(BitIndex::new(8), Err(InvalidBitIndex(8))));
    assert!(BitIndex::MAX.mask() == 0x80);
};

const _: () = {
    assert!(SRAM.contains(0x2000_0000));
    assert!(SRAM.contains(0x200f_ffff));
    assert!(!SRAM.contains(0x2010_0000));
    assert!(!SRAM.contains(0x1fff_ffff));
};

flags!({
    struct Status(u8);
    {
        let ready: Bit<0>;
        let busy: Bit<1>;
        let error: Bit<3>;
    }
});

const _: () = {
    assert!(Status::READY_BIT == 0);
    assert!(Status::BUSY_BIT == 1);
    assert!(Status::ERROR_BIT == 3);
    assert!(Status::MASK == 0b1011);
    assert!(Status::NUM_FLAGS == 3);
};

#[test]
fn compile_time_test() {}
