use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

/// Health payload extended with the active offline cache generation.
#[derive(Serialize, Debug)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub cache_generation: String,
    pub records: usize,
}
