/// Immediate retries with no backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    /// One play plus one retry on a fresh handle.
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// Run `op` (given the 1-based attempt number) until it succeeds, the error is
    /// not retryable, or the attempts run out.
    pub fn run<T, E>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, E>,
        retryable: impl Fn(&E) -> bool,
    ) -> Attempted<T, E> {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = op(attempt);
            let again = matches!(&result, Err(err) if attempt < max && retryable(err));
            if !again {
                return Attempted {
                    result,
                    attempts: attempt,
                };
            }
            attempt += 1;
        }
    }
}
