#![allow(dead_code)]

pub mod documents;

/// Seeds shared by the randomized workflows.
pub const SEEDS: [u64; 12] = [
    0x5eed_c0de_u64,
    0x0000_0000_0000_0001_u64,
    0x0000_0000_0000_00ff_u64,
    0x0000_0000_00c0_ffee_u64,
    0x0123_4567_89ab_cdef_u64,
    0x0000_0000_0000_1001_u64,
    0x1111_2222_3333_4444_u64,
    0x89ab_cdef_0123_4567_u64,
    0xfedc_ba98_7654_3210_u64,
    0x1357_9bdf_2468_ace0_u64,
    0x0f0f_f0f0_55aa_aa55_u64,
    0xa5a5_5a5a_dead_beef_u64,
];

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
