use std::time::Duration;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// Backoff used for LLM calls: 0.5s doubling, up to 0.2s jitter.
    pub fn llm(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            jitter_max: Some(Duration::from_millis(200)),
        }
    }

    fn delay(&self, backoff: Duration) -> Duration {
        match self.jitter_max {
            Some(jitter_max) => {
                let jitter_ms = jitter_max.as_millis() as u64;
                let extra = if jitter_ms == 0 {
                    0
                } else {
                    rand::random::<u64>() % (jitter_ms + 1)
                };
                backoff + Duration::from_millis(extra)
            }
            None => backoff,
        }
    }
}

pub async fn retry_async_with_config<F, Fut, T, E>(config: RetryConfig, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    retry_async_when(config, f, |_| true).await
}

/// Retries only while `retryable` accepts the error; anything else is
/// returned immediately.
pub async fn retry_async_when<F, Fut, T, E, P>(
    config: RetryConfig,
    mut f: F,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempts_left = config.max_attempts.max(1);
    let mut backoff = config.base_backoff;

    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempts_left = attempts_left.saturating_sub(1);
                if attempts_left == 0 || !retryable(&e) {
                    return Err(e);
                }

                tokio::time::sleep(config.delay(backoff)).await;
                backoff = std::cmp::min(backoff * 2, config.max_backoff);
            }
        }
    }
}
