use serde::{Deserialize, Serialize};

/// What the loader does with a line it cannot parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MalformedPolicy {
    /// Log the line and keep going.
    Skip,
    /// Stop loading and return the parse error.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub skip_header: bool,
    pub malformed_policy: MalformedPolicy,

    // Parallel loading
    pub parallel_build: bool,   // build per-category trees on the rayon pool
    pub workers: usize,         // rayon threads used by the loader
    pub batch_size: usize,      // rows parsed per rayon task
}

impl Default for Config {
    fn default() -> Self {
        Config {
            skip_header: true,
            malformed_policy: MalformedPolicy::Skip,

            parallel_build: true,
            workers: num_cpus::get(),
            batch_size: 4096,
        }
    }
}

impl Config {
    /// Single-threaded loading, everything else default.
    pub fn sequential() -> Self {
        Config {
            parallel_build: false,
            ..Config::default()
        }
    }

    pub fn strict(mut self) -> Self {
        self.malformed_policy = MalformedPolicy::Abort;
        self
    }
}
