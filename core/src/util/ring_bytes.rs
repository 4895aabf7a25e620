use std::collections::VecDeque;

/// Keeps the last `cap` bytes of a stream, e.g. the stderr tail of a subprocess.
#[derive(Debug, Clone)]
pub struct RingBytes {
    inner: VecDeque<u8>,
    cap: usize,
}

impl RingBytes {
    pub fn new(cap: usize) -> Self {
        Self {
            inner: VecDeque::with_capacity(cap.min(64 * 1024)),
            cap,
        }
    }

    pub fn push(&mut self, data: &[u8]) {
        let data = if data.len() > self.cap {
            &data[data.len() - self.cap..]
        } else {
            data
        };
        let overflow = self
            .inner
            .len()
            .saturating_add(data.len())
            .saturating_sub(self.cap);
        if overflow > 0 {
            self.inner.drain(..overflow);
        }
        self.inner.extend(data);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn to_string_lossy(&self) -> String {
        let bytes: Vec<u8> = self.inner.iter().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}
