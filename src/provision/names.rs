//! Cluster name and port generation for a single provisioning run

use std::collections::HashSet;
use std::sync::LazyLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

use super::validation::{MAX_CLIENT_PORT, MIN_CLIENT_PORT};

const SERVICE_NAME_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of generated cluster names
pub const SERVICE_NAME_LENGTH: usize = 10;

/// Longest service name the backend accepts
pub const MAX_SERVICE_NAME_LENGTH: usize = 30;

static INVALID_NAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^0-9a-z]").expect("static regex"));

/// Keep only lowercase letters and digits, truncated to 30 characters
pub fn sanitize_service_name(value: &str) -> String {
    INVALID_NAME_CHARS
        .replace_all(value, "")
        .chars()
        .take(MAX_SERVICE_NAME_LENGTH)
        .collect()
}

/// Hands out cluster names and auxiliary ports that are unique within one run.
///
/// Auxiliary ports never collide with each other or with the client port.
pub struct RunAllocator {
    rng: StdRng,
    client_port: u16,
    names: HashSet<String>,
    ports: HashSet<u16>,
}

impl RunAllocator {
    pub fn new(client_port: u16) -> Self {
        Self::with_rng(client_port, StdRng::from_entropy())
    }

    pub fn with_seed(client_port: u16, seed: u64) -> Self {
        Self::with_rng(client_port, StdRng::seed_from_u64(seed))
    }

    fn with_rng(client_port: u16, rng: StdRng) -> Self {
        Self {
            rng,
            client_port,
            names: HashSet::new(),
            ports: HashSet::new(),
        }
    }

    /// A fresh random `[a-z0-9]{10}` name
    pub fn service_name(&mut self) -> String {
        loop {
            let name: String = (0..SERVICE_NAME_LENGTH)
                .map(|_| {
                    let idx = self.rng.gen_range(0..SERVICE_NAME_CHARS.len());
                    SERVICE_NAME_CHARS[idx] as char
                })
                .collect();
            if self.names.insert(name.clone()) {
                return name;
            }
        }
    }

    /// Reserve `candidate`, or a fresh name if it is empty or already taken
    pub fn claim_name(&mut self, candidate: String) -> String {
        if !candidate.is_empty() && self.names.insert(candidate.clone()) {
            candidate
        } else {
            self.service_name()
        }
    }

    /// A random port in [5000, 65535] not yet handed out in this run
    pub fn port(&mut self) -> u16 {
        loop {
            let port = self.rng.gen_range(MIN_CLIENT_PORT..=MAX_CLIENT_PORT) as u16;
            if port != self.client_port && self.ports.insert(port) {
                return port;
            }
        }
    }
}
