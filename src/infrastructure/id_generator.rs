// Push key generator - chronologically sortable keys for appended entries
// Key format: [timestamp:8 chars][random:12 chars] over a 64-char sortable alphabet

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";
const TIME_CHARS: usize = 8;
const RANDOM_CHARS: usize = 12;

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: i64,
    last_random: [u8; RANDOM_CHARS],
}

/// Keys generated within one millisecond share a timestamp prefix and
/// increment the random suffix, so lexical order matches creation order.
#[derive(Debug, Default)]
pub struct PushKeyGenerator {
    state: Mutex<GeneratorState>,
}

impl PushKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&self) -> String {
        self.next_key_at(Utc::now().timestamp_millis())
    }

    fn next_key_at(&self, now: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if now <= state.last_timestamp {
            // Same (or skewed) millisecond - bump the suffix instead of re-rolling it
            increment(&mut state.last_random);
        } else {
            let mut rng = rand::rng();
            for slot in state.last_random.iter_mut() {
                *slot = rng.random_range(0..64u8);
            }
            state.last_timestamp = now;
        }

        let mut key = String::with_capacity(TIME_CHARS + RANDOM_CHARS);
        let mut ts = state.last_timestamp.max(0) as u64;
        let mut time_part = [0u8; TIME_CHARS];
        for slot in time_part.iter_mut().rev() {
            *slot = PUSH_CHARS[(ts % 64) as usize];
            ts /= 64;
        }
        key.extend(time_part.iter().map(|&c| c as char));
        key.extend(state.last_random.iter().map(|&i| PUSH_CHARS[i as usize] as char));
        key
    }

    /// Extract the millisecond timestamp encoded in a key
    pub fn extract_timestamp(key: &str) -> Option<i64> {
        if key.len() != TIME_CHARS + RANDOM_CHARS {
            return None;
        }
        let mut ts: i64 = 0;
        for c in key.bytes().take(TIME_CHARS) {
            let digit = PUSH_CHARS.iter().position(|&p| p == c)?;
            ts = ts * 64 + digit as i64;
        }
        Some(ts)
    }
}

fn increment(random: &mut [u8; RANDOM_CHARS]) {
    for slot in random.iter_mut().rev() {
        if *slot < 63 {
            *slot += 1;
            return;
        }
        *slot = 0;
    }
}
