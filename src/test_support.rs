//! Shared fixtures for unit tests across modules.
#![cfg(test)]

use crate::cache::Cache;

pub fn test_cache() -> Cache {
    Cache::from_yaml_str(
        r#"
strategies:
  - name: S1
    active: true
    tradetron_urls:
      - url: "http://tradetron.example/hook"
        multiplier: 2
    algotest_urls:
      - url: "http://algotest.example/hook"
        multiplier: 3
  - name: S1_INACTIVE
    active: false
index_mappings:
  NIFTY: 101
lot_sizes:
  NIFTY: 75
monthly_expiry:
  NIFTY:
    OCT: "2025-10-28"
"#,
    )
    .expect("valid test cache yaml")
}
