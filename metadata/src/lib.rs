use failure::Fail;
use log::{debug, error, trace};
use reqwest::StatusCode;
use std::time::Duration;

/// Timeout for a single metadata request in seconds.
pub const REQ_TIMEOUT: u64 = 1;

/// Errors which may occur while talking to the instance metadata service.
#[derive(Debug, Clone, PartialEq, Fail)]
pub enum MetadataError {
    /// Failed to create the http client.
    #[fail(display = "failed to build http client because '{}'", _0)]
    ClientError(String),
    /// The request did not finish within `REQ_TIMEOUT`.
    #[fail(display = "request to '{}' timed out after {} sec", url, timeout)]
    Timeout { url: String, timeout: u64 },
    /// Failed to reach the metadata service.
    #[fail(display = "failed to request '{}' because '{}'", url, reason)]
    RequestError { url: String, reason: String },
    /// Failed to read the response body.
    #[fail(display = "failed to read response from '{}' because '{}'", url, reason)]
    ReceiveError { url: String, reason: String },
}

/// Outcome of a single metadata lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The service answered with a body.
    Found(String),
    /// The service answered 404, i.e. the key does not exist.
    NotFound,
    /// The service could not be reached.
    Failed(MetadataError),
}

impl Lookup {
    /// Value to use as a metric label; anything but `Found` becomes an empty string.
    pub fn into_label_value(self) -> String {
        match self {
            Lookup::Found(value) => value,
            Lookup::NotFound | Lookup::Failed(_) => String::new(),
        }
    }
}

pub trait Metadata {
    fn get_metadata(&self, path: &str) -> Lookup;
}

/// Encapsulates the connection to the instance metadata service.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    /// Base URL, e.g. `http://169.254.169.254/latest/meta-data/`
    pub endpoint: String,
}

impl MetadataClient {
    pub fn new(endpoint: &str) -> MetadataClient {
        MetadataClient {
            endpoint: endpoint.to_string(),
        }
    }

    pub fn url_for(&self, path: &str) -> String { join_url(&self.endpoint, path) }
}

impl Metadata for MetadataClient {
    fn get_metadata(&self, path: &str) -> Lookup {
        let url = self.url_for(path);
        trace!("Requesting metadata from '{}'.", url);

        let lookup = request(&url);
        match lookup {
            Lookup::Found(ref value) => trace!("Received '{}' from '{}'.", value, url),
            Lookup::NotFound => debug!("Endpoint '{}' not found.", url),
            Lookup::Failed(ref err) => error!("Error requesting metadata: {}", err),
        }

        lookup
    }
}

fn request(url: &str) -> Lookup {
    let client = match reqwest::Client::builder().timeout(Duration::from_secs(REQ_TIMEOUT)).build() {
        Ok(client) => client,
        Err(e) => return Lookup::Failed(MetadataError::ClientError(e.to_string())),
    };

    match client.get(url).send() {
        Ok(ref response) if response.status() == StatusCode::NOT_FOUND => Lookup::NotFound,
        Ok(mut response) => match response.text() {
            Ok(body) => Lookup::Found(body),
            Err(e) => Lookup::Failed(MetadataError::ReceiveError {
                url:    url.to_string(),
                reason: e.to_string(),
            }),
        },
        Err(ref err) if err.is_timeout() => Lookup::Failed(MetadataError::Timeout {
            url:     url.to_string(),
            timeout: REQ_TIMEOUT,
        }),
        Err(err) => Lookup::Failed(MetadataError::RequestError {
            url:    url.to_string(),
            reason: err.to_string(),
        }),
    }
}

/// Joins endpoint and path with exactly one `/` in between.
fn join_url(endpoint: &str, path: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub mod testing {
    use super::*;

    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    /// In-memory metadata service. Paths without a configured answer respond like a real service
    /// does for unknown keys, i.e. with `Lookup::NotFound`.
    #[derive(Debug, Default, Clone)]
    pub struct MetadataMockClient {
        pub responses: HashMap<String, Lookup>,
        pub requests:  Arc<Mutex<Vec<String>>>,
    }

    impl MetadataMockClient {
        pub fn with_value(mut self, path: &str, value: &str) -> Self {
            self.responses.insert(path.to_string(), Lookup::Found(value.to_string()));
            self
        }

        pub fn with_not_found(mut self, path: &str) -> Self {
            self.responses.insert(path.to_string(), Lookup::NotFound);
            self
        }

        pub fn with_failure(mut self, path: &str) -> Self {
            let err = MetadataError::RequestError {
                url:    path.to_string(),
                reason: "connection refused".to_string(),
            };
            self.responses.insert(path.to_string(), Lookup::Failed(err));
            self
        }

        /// Paths requested so far, in request order.
        pub fn requested_paths(&self) -> Vec<String> {
            self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
        }
    }

    impl Metadata for MetadataMockClient {
        fn get_metadata(&self, path: &str) -> Lookup {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(path.to_string());
            }
            self.responses.get(path).cloned().unwrap_or(Lookup::NotFound)
        }
    }
}
