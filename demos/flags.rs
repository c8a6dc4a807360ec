// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

use core::ptr;

use bitband::{Region, flags};

// Event flags shared between a DMA interrupt handler and a driver task.
flags!({
    pub struct DmaEvents(u8);
    {
        let half_transfer: Bit<0>; // Set by the ISR at the half-way mark
        let transfer_complete: Bit<1>; // Set by the ISR when done
        let _: Bit<2>; // Reserved for a future channel
        let transfer_error: Bit<3>;
    }
});

fn main() {
    // On target this would be `&raw const EVENTS` for a static in SRAM. The
    // flags are only printed here, never accessed.
    let storage = ptr::without_provenance(0x2000_0100);

    // SAFETY: The flags are only printed.
    let events = unsafe { DmaEvents::bind(&Region::CORTEX_M_SRAM, storage) };
    println!("{events:#?}");
    println!("mask: {:#010b}", DmaEvents::MASK);

    for (metadata, flag) in events {
        println!(
            "{}: bit {} -> {:#010x}",
            metadata.name,
            metadata.bit,
            flag.alias_address()
        );
    }
}
