// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

// A host stand-in for bit-band hardware: the alias window is ordinary memory,
// and the source bytes are reconstructed from it the way the bus would
// present them.

#![allow(dead_code)]

use core::ptr;

use bitband::Region;
use zerocopy::FromZeros;

pub const BYTES: usize = 4;

#[derive(FromZeros)]
#[repr(C)]
pub struct Sram {
    alias: [u32; BYTES * 8],
    source: [u8; BYTES],
}

impl Sram {
    pub fn zeroed() -> Self {
        Self::new_zeroed()
    }

    // A region whose alias and source windows are this image.
    pub fn region(&mut self) -> Region {
        Region::new(
            self.alias.as_mut_ptr().expose_provenance(),
            self.source.as_ptr().addr(),
        )
    }

    pub fn storage(&self, index: usize) -> *const u8 {
        &raw const self.source[index]
    }

    // The source byte at `index` as seen through the alias words.
    pub fn byte(&self, index: usize) -> u8 {
        (0..8).fold(0, |byte, bit| {
            // SAFETY: In bounds of `alias`.
            let word = unsafe { ptr::read_volatile(&raw const self.alias[index * 8 + bit]) };
            byte | (u8::from(word == 1) << bit)
        })
    }
}
