use std::io;

use super::KeyValueBackend;

/// Backend for hosts where local storage is switched off; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledBackend;

fn refused() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "local storage is disabled")
}

impl KeyValueBackend for DisabledBackend {
    fn get(&self, _key: &str) -> io::Result<Option<Vec<u8>>> {
        Err(refused())
    }

    fn set(&self, _key: &str, _value: &[u8]) -> io::Result<()> {
        Err(refused())
    }
}
