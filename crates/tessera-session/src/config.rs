#![forbid(unsafe_code)]

//! Registry configuration.
//!
//! All deployment-specific values arrive through this struct at construction
//! time; nothing is read from globals or re-read later. Parsing whatever
//! configuration format the surrounding deployment uses is its job, not ours.

/// Client identity fields the startup wiring feeds to the engine.
#[derive(Clone, Debug)]
pub struct ClientInfo {
    pub product_name: String,
    pub company_name: String,
    pub model_name: String,
    pub device_name: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            product_name: "tessera".to_owned(),
            company_name: String::new(),
            model_name: String::new(),
            device_name: std::env::consts::OS.to_owned(),
        }
    }
}

/// Configuration consumed once when the registry is constructed.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Destination URL delivered alongside every license-request message.
    pub license_server_url: String,
    /// Distinguished storage entry holding the device certificate.
    pub certificate_name: String,
    /// Client identity handed to the engine at construction.
    pub client: ClientInfo,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            license_server_url: String::new(),
            certificate_name: "cert.bin".to_owned(),
            client: ClientInfo::default(),
        }
    }
}

impl RegistryConfig {
    pub fn new(license_server_url: impl Into<String>) -> Self {
        Self {
            license_server_url: license_server_url.into(),
            ..Self::default()
        }
    }

    /// Set the storage entry name for the device certificate.
    pub fn with_certificate_name(mut self, name: impl Into<String>) -> Self {
        self.certificate_name = name.into();
        self
    }

    /// Set the client identity fields.
    pub fn with_client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }
}
