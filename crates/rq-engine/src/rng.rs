pub(crate) fn next_random_u32(state: &mut u32) -> u32 {
    let mut next = state.wrapping_add(0x6d2b79f5);
    *state = next;
    next = (next ^ (next >> 15)).wrapping_mul(next | 1);
    next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
    next ^ (next >> 14)
}

pub(crate) fn next_random_bounded(state: &mut u32, bound: u32) -> u32 {
    let threshold = (u64::from(u32::MAX) + 1) / u64::from(bound) * u64::from(bound);
    loop {
        let candidate = next_random_u32(state);
        if u64::from(candidate) < threshold {
            return candidate % bound;
        }
    }
}

pub(crate) fn seed_from_clock() -> u32 {
    let now = chrono::Utc::now();
    now.timestamp_subsec_nanos() ^ (now.timestamp() as u32)
}
