//! Shared helpers for the integration and stress suites

use std::time::Duration;

pub mod generators;

/// Wait for a condition to become true, polling at `check_interval`
pub async fn wait_for_condition<F>(
    mut condition: F,
    timeout: Duration,
    check_interval: Duration,
) -> anyhow::Result<()>
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(check_interval).await;
    }
    Err(anyhow::anyhow!("Condition not met within {:?}", timeout))
}

/// Measure execution time of an async operation
pub async fn measure_async<F, R>(operation: F) -> (R, Duration)
where
    F: std::future::Future<Output = R>,
{
    let start = std::time::Instant::now();
    let result = operation.await;
    (result, start.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_condition_success() {
        let start = std::time::Instant::now();
        wait_for_condition(
            || start.elapsed() > Duration::from_millis(20),
            Duration::from_secs(1),
            Duration::from_millis(5),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_condition_timeout() {
        let result = wait_for_condition(
            || false,
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_measure_async() {
        let (value, elapsed) = measure_async(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            7
        })
        .await;
        assert_eq!(value, 7);
        assert!(elapsed >= Duration::from_millis(10));
    }
}
