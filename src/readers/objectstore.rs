// src/readers/objectstore.rs

//! The blob store collaborators: an [`ObjectStore`] opens an object of a
//! bucket as a readable [`ObjectStream`].
//!
//! * [`HttpObjectStore`] fetches objects over HTTP(S) from a public bucket
//!   endpoint, unauthenticated.
//! * [`DirObjectStore`] serves objects from a local directory mirror of a
//!   bucket.

use std::fmt;
use std::fs::File;
use std::io::{Cursor, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::reqwest::blocking::{Client, Response};
use ::reqwest::StatusCode;
#[allow(unused_imports)]
use ::si_trace_print::{defn, defo, defx, defñ};

use crate::common::{Error, Result};

/// Bucket of the public archive.
pub const BUCKET_DEFAULT: &str = "data.gharchive.org";

/// Endpoint that serves the public bucket.
pub const ENDPOINT_DEFAULT: &str = "https://storage.googleapis.com";

/// Default timeout of one object fetch, including reading the body.
pub const HTTP_TIMEOUT_DEFAULT: Duration = Duration::from_secs(300);

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A readable object with an explicit close.
pub trait ObjectStream: Read + Send {
    /// Release the resources of the stream. Streams that release on `Drop`
    /// need not override this.
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl ObjectStream for File {}

impl ObjectStream for Response {}

impl ObjectStream for Cursor<Vec<u8>> {}

/// Opens objects by bucket and key.
pub trait ObjectStore: Send + Sync {
    /// Open object `key` of `bucket`.
    ///
    /// Returns [`Error::NotFound`] if there is no such object and
    /// [`Error::Transport`] for any other failure.
    fn open_object(&self, bucket: &str, key: &str) -> Result<Box<dyn ObjectStream>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HttpObjectStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Fetches `GET {endpoint}/{bucket}/{key}` with a blocking `reqwest`
/// client. No authentication, no retries.
pub struct HttpObjectStore {
    client: Client,
    endpoint: String,
}

impl fmt::Debug for HttpObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<HttpObjectStore> {
        defn!("({:?}, {:?})", endpoint, timeout);
        let client = match Client::builder()
            .timeout(timeout)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                defx!("Client::build() failed {}", err);
                return Err(Error::Config(format!("HTTP client: {}", err)));
            }
        };
        defx!();

        Ok(HttpObjectStore {
            client,
            endpoint: endpoint
                .trim_end_matches('/')
                .to_string(),
        })
    }

    pub fn url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, bucket, key)
    }
}

impl ObjectStore for HttpObjectStore {
    fn open_object(&self, bucket: &str, key: &str) -> Result<Box<dyn ObjectStream>> {
        let url = self.url(bucket, key);
        defn!("GET {:?}", url);
        let response: Response = match self.client.get(&url).send() {
            Ok(response) => response,
            Err(err) => {
                defx!("send failed {}", err);
                return Err(Error::Transport {
                    key: key.to_string(),
                    message: err.to_string(),
                });
            }
        };
        let status: StatusCode = response.status();
        defo!("status {}", status);
        if status == StatusCode::NOT_FOUND {
            defx!("NotFound");
            return Err(Error::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            defx!("status {}", status);
            return Err(Error::Transport {
                key: key.to_string(),
                message: format!("GET {} returned {}", url, status),
            });
        }
        defx!();

        Ok(Box::new(response))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DirObjectStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TODO: serve `{root}/{bucket}/{key}` so one mirror directory can hold
//       more than one bucket.

/// Serves object `key` from file `{root}/{key}`, a local mirror of one
/// bucket. The bucket name is not part of the path.
#[derive(Debug)]
pub struct DirObjectStore {
    root: PathBuf,
}

impl DirObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> DirObjectStore {
        DirObjectStore {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.as_path()
    }
}

impl ObjectStore for DirObjectStore {
    fn open_object(&self, bucket: &str, key: &str) -> Result<Box<dyn ObjectStream>> {
        let path: PathBuf = self.root.join(key);
        defñ!("File::open({:?})", path);
        match File::open(&path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(Error::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(Error::Transport {
                key: key.to_string(),
                message: format!("{}: {}", path.display(), err),
            }),
        }
    }
}
