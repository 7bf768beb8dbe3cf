//! Proxy endpoint pool and rotation policies
//!
//! The pool only chooses endpoints. Health probing and harvesting proxies
//! from public lists are out of scope; a proxy that fails simply costs the
//! current attempt, and the next attempt asks the pool again.
//!
//! The same [`Rotation`] policies pick the User-Agent of each request.

use rand::Rng;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks an index into a non-empty list
pub trait IndexSelector: Send + Sync + fmt::Debug {
    /// Returns an index in `0..len`; `len` is never zero
    fn select(&self, len: usize) -> usize;
}

/// Cycles through the list in order
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexSelector for RoundRobin {
    fn select(&self, len: usize) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % len
    }
}

/// Picks uniformly at random
#[derive(Debug, Default)]
pub struct RandomSelector;

impl IndexSelector for RandomSelector {
    fn select(&self, len: usize) -> usize {
        rand::rng().random_range(0..len)
    }
}

/// How a pool of proxies or user agents rotates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rotation {
    #[default]
    RoundRobin,
    Random,
}

impl Rotation {
    /// Creates the selector for this policy
    pub fn selector(&self) -> Box<dyn IndexSelector> {
        match self {
            Self::RoundRobin => Box::new(RoundRobin::new()),
            Self::Random => Box::new(RandomSelector),
        }
    }
}

/// Ordered proxy endpoints plus the policy choosing among them
#[derive(Debug)]
pub struct ProxyPool {
    proxies: Vec<String>,
    selector: Box<dyn IndexSelector>,
}

impl ProxyPool {
    pub fn new(proxies: Vec<String>, selector: Box<dyn IndexSelector>) -> Self {
        Self { proxies, selector }
    }

    /// Creates a pool using the given rotation policy
    pub fn with_rotation(proxies: Vec<String>, rotation: Rotation) -> Self {
        Self::new(proxies, rotation.selector())
    }

    /// Returns the endpoint for the next attempt, or `None` if the pool is empty
    pub fn next(&self) -> Option<&str> {
        if self.proxies.is_empty() {
            return None;
        }
        let index = self.selector.select(self.proxies.len());
        self.proxies.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn proxies(&self) -> &[String] {
        &self.proxies
    }
}
