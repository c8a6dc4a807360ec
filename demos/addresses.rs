// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

// Prints the alias words covering the first few bytes of Cortex-M SRAM.

use bitband::{BITS_PER_BYTE, Region};

fn main() {
    let region = Region::CORTEX_M_SRAM;
    println!("{region:#?}");

    for offset in 0..4 {
        let address = region.source_base() + offset;
        print!("{address:#010x}:");
        for bit in 0..BITS_PER_BYTE {
            if let Some(alias) = region.alias_address(address, bit) {
                print!(" {alias:#010x}");
            }
        }
        println!();
    }

    // Out-of-range bits have no alias word.
    assert_eq!(region.alias_address(region.source_base(), 8), None);
}
