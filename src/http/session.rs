use std::time::Duration;

use moka::future::Cache;

use crate::config::SessionConfig;
use crate::image_processing::StoredOriginal;

/// Remembers which stored original a client change token refers to, so a
/// client re-resizing the same file does not upload a second copy.
#[derive(Clone)]
pub struct SessionCache {
  inner: Cache<String, StoredOriginal>,
}

impl SessionCache {
  pub fn new(max_entries: u64, idle_timeout: Duration) -> Self {
    Self {
      inner: Cache::builder()
        .max_capacity(max_entries)
        .time_to_idle(idle_timeout)
        .build(),
    }
  }

  pub fn from_config(cfg: &SessionConfig) -> Self {
    Self::new(cfg.max_entries, Duration::from_secs(cfg.idle_timeout_secs))
  }

  pub async fn lookup(&self, change_token: &str) -> Option<StoredOriginal> {
    self.inner.get(change_token).await
  }

  pub async fn remember(&self, change_token: &str, original: StoredOriginal) {
    self.inner.insert(change_token.to_owned(), original).await;
  }

  pub async fn forget(&self, change_token: &str) {
    self.inner.invalidate(change_token).await;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::ImageFormat;

  fn original(name: &str) -> StoredOriginal {
    StoredOriginal {
      name: name.to_owned(),
      format: ImageFormat::Png,
    }
  }

  #[tokio::test]
  async fn tokens_map_to_their_own_original() {
    let cache = SessionCache::new(16, Duration::from_secs(60));

    cache.remember("a", original("a_1.png")).await;
    cache.remember("b", original("b_1.png")).await;

    assert_eq!(cache.lookup("a").await, Some(original("a_1.png")));
    assert_eq!(cache.lookup("b").await, Some(original("b_1.png")));
    assert_eq!(cache.lookup("c").await, None);
  }

  #[tokio::test]
  async fn forgotten_tokens_miss() {
    let cache = SessionCache::new(16, Duration::from_secs(60));

    cache.remember("a", original("a_1.png")).await;
    cache.forget("a").await;

    assert_eq!(cache.lookup("a").await, None);
  }
}
