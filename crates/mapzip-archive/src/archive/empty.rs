//! Archives without entries.

use super::ReadArchive;
use crate::resource::Resource;
use crate::{Error, Result};

/// An archive with no entries. Holds no mapping.
#[derive(Debug, Default)]
pub struct EmptyArchive {
    closed: bool,
}

impl EmptyArchive {
    /// Create an open, empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }
}

impl ReadArchive for EmptyArchive {
    fn get_resource(&self, _path: &str) -> Result<Option<Resource<'_>>> {
        self.check_open()?;
        Ok(None)
    }

    fn process_resources<F, V>(&self, _dir: &str, _filter: F, _visitor: V) -> Result<()>
    where
        F: FnMut(&str) -> bool,
        V: FnMut(Resource<'_>) -> Result<()>,
    {
        self.check_open()
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_archive_lifecycle() {
        let mut archive = EmptyArchive::new();
        assert!(archive.get_data("anything").unwrap().is_none());
        assert!(archive.get_reader("anything").unwrap().is_none());

        let mut visited = 0;
        archive
            .process_resources("", |_| true, |_| {
                visited += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(visited, 0);

        archive.close();
        archive.close();
        assert!(archive.is_closed());
        assert!(matches!(archive.get_data("anything"), Err(Error::Closed)));
    }
}
