//! Politeness delays and sub-batching shared by both crawlers

use std::time::Duration;

/// Sleeps for `delay`; a zero delay returns without yielding to the timer
pub async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Splits `items` into chunks of at most `size` (a size of 0 is treated as 1)
pub fn sub_batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_sub_batches_sizes() {
        let items: Vec<u32> = (0..12).collect();
        let sizes: Vec<usize> = sub_batches(&items, 5).map(|c| c.len()).collect();
        assert_eq!(sizes, vec![5, 5, 2]);
    }

    #[test]
    fn test_sub_batches_zero_size() {
        let items = [1, 2, 3];
        assert_eq!(sub_batches(&items, 0).count(), 3);
    }

    #[test]
    fn test_sub_batches_empty() {
        let items: [u8; 0] = [];
        assert_eq!(sub_batches(&items, 4).count(), 0);
    }

    #[tokio::test]
    async fn test_pause_waits() {
        let start = Instant::now();
        pause(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_zero_pause_returns_immediately() {
        let start = Instant::now();
        pause(Duration::ZERO).await;
        assert!(start.elapsed() < Duration::from_millis(20));
    }
}
