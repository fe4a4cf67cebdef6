//! MaxMind country database backend.

use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::net::IpAddr;
use std::path::Path;

use crate::geo::{CountryRecord, GeoLookup, LookupError};

/// Country lookup over a memory-loaded MaxMind database.
pub struct MaxMindLookup {
    reader: Reader<Vec<u8>>,
}

impl MaxMindLookup {
    /// Open the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LookupError> {
        let reader = Reader::open_readfile(path.as_ref())
            .map_err(|e| LookupError::Database(e.to_string()))?;

        tracing::info!(
            path = %path.as_ref().display(),
            database_type = %reader.metadata.database_type,
            build_epoch = reader.metadata.build_epoch,
            "GeoIP database loaded"
        );

        Ok(Self { reader })
    }

    /// Database type string from the file metadata.
    pub fn database_type(&self) -> &str {
        &self.reader.metadata.database_type
    }
}

impl std::fmt::Debug for MaxMindLookup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxMindLookup")
            .field("database_type", &self.database_type())
            .finish()
    }
}

impl GeoLookup for MaxMindLookup {
    fn lookup(&self, ip: IpAddr) -> Result<CountryRecord, LookupError> {
        match self.reader.lookup::<geoip2::Country>(ip) {
            Ok(record) => {
                let country = record.country.or(record.registered_country);
                Ok(CountryRecord {
                    numeric_code: country.as_ref().and_then(|c| c.geoname_id),
                    iso_code: country.and_then(|c| c.iso_code).map(str::to_string),
                })
            }
            Err(MaxMindDBError::AddressNotFoundError(_)) => Err(LookupError::AddressNotFound(ip)),
            Err(e) => Err(LookupError::Database(e.to_string())),
        }
    }
}
