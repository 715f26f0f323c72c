#![allow(dead_code)]

use vkframe::{allocator::DedicatedAllocator, context::Ctx};

///Headless context, or `None` if the machine has no usable Vulkan implementation.
pub fn context() -> Option<Ctx<DedicatedAllocator>> {
    let _ = simple_logger::init_with_env();
    match Ctx::new_headless(false) {
        Ok(ctx) => Some(ctx),
        Err(e) => {
            eprintln!("skipping, no Vulkan device: {e}");
            None
        }
    }
}

///Deterministic xorshift64 byte stream.
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        XorShift(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    pub fn bytes(&mut self, len: usize) -> Vec<u8> {
        (0..len).map(|_| self.next_u64() as u8).collect()
    }
}
