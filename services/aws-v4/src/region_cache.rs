use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// RegionCache remembers which region a bucket lives in.
///
/// Clones share the same map, so a region learnt by one request is seen by
/// every request sent through the same client. Bucket names are matched as is,
/// last write wins.
#[derive(Clone, Debug, Default)]
pub struct RegionCache {
    regions: Arc<RwLock<HashMap<String, String>>>,
}

impl RegionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the cached region of `bucket`.
    pub fn get(&self, bucket: &str) -> Option<String> {
        self.regions
            .read()
            .expect("lock poisoned")
            .get(bucket)
            .cloned()
    }

    /// Remember `region` for `bucket`, replacing any previous value.
    pub fn insert(&self, bucket: &str, region: &str) {
        self.regions
            .write()
            .expect("lock poisoned")
            .insert(bucket.to_string(), region.to_string());
    }

    /// Forget `bucket`, returning the region it had.
    pub fn remove(&self, bucket: &str) -> Option<String> {
        self.regions.write().expect("lock poisoned").remove(bucket)
    }

    /// Number of buckets cached.
    pub fn len(&self) -> usize {
        self.regions.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no bucket is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every bucket.
    pub fn clear(&self) {
        self.regions.write().expect("lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_region_cache() {
        let cache = RegionCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get("bucket"), None);

        cache.insert("bucket", "eu-west-1");
        cache.insert("bucket", "eu-central-1");
        assert_eq!(cache.get("bucket").as_deref(), Some("eu-central-1"));
        assert_eq!(cache.get("Bucket"), None, "bucket names are case sensitive");
        assert_eq!(cache.len(), 1);

        assert_eq!(cache.remove("bucket").as_deref(), Some("eu-central-1"));
        assert_eq!(cache.remove("bucket"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_region_cache_clones_share_state() {
        let cache = RegionCache::new();
        let other = cache.clone();

        other.insert("a", "us-west-2");
        other.insert("b", "ap-south-1");
        assert_eq!(cache.get("a").as_deref(), Some("us-west-2"));

        cache.clear();
        assert!(other.is_empty());
    }

    #[test]
    fn test_region_cache_across_threads() {
        let cache = RegionCache::new();

        let handles = (0..4)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.insert(&format!("bucket-{i}"), "eu-west-1"))
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().expect("thread must not panic");
        }

        assert_eq!(cache.len(), 4);
    }
}
