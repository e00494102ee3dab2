//! Extended properties stored on remote files.
//!
//! Only two are understood: `IV` (hex, 16 bytes) for encrypted files and
//! `Permissions` (octal mode bits). Anything else on the file is ignored.

use std::collections::BTreeMap;

use skiff_vault::IV_LEN;

use crate::error::{Error, Result};

pub const IV_PROPERTY: &str = "IV";
pub const PERMISSIONS_PROPERTY: &str = "Permissions";

const MAX_MODE: u32 = 0o7777;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteProperties {
    pub iv: Option<[u8; IV_LEN]>,
    pub permissions: Option<u32>,
}

impl RemoteProperties {
    /// Parse from the string map the drive API returns.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self> {
        let iv = map.get(IV_PROPERTY).map(|v| parse_iv(v)).transpose()?;
        let permissions = map
            .get(PERMISSIONS_PROPERTY)
            .map(|v| parse_permissions(v))
            .transpose()?;
        Ok(Self { iv, permissions })
    }

    /// Render back to the string map sent with an upload.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(iv) = self.iv {
            map.insert(IV_PROPERTY.to_string(), hex::encode(iv));
        }
        if let Some(mode) = self.permissions {
            map.insert(PERMISSIONS_PROPERTY.to_string(), format!("{mode:o}"));
        }
        map
    }
}

pub fn parse_iv(value: &str) -> Result<[u8; IV_LEN]> {
    let invalid = || Error::InvalidProperty {
        name: IV_PROPERTY,
        message: format!("expected {} hex characters, got {value:?}", 2 * IV_LEN),
    };
    let bytes = hex::decode(value.trim()).map_err(|_| invalid())?;
    bytes.as_slice().try_into().map_err(|_| invalid())
}

pub fn parse_permissions(value: &str) -> Result<u32> {
    let mode = u32::from_str_radix(value.trim(), 8).map_err(|e| Error::InvalidProperty {
        name: PERMISSIONS_PROPERTY,
        message: format!("{value:?} is not an octal mode: {e}"),
    })?;
    if mode > MAX_MODE {
        return Err(Error::InvalidProperty {
            name: PERMISSIONS_PROPERTY,
            message: format!("{value:?} is out of range"),
        });
    }
    Ok(mode)
}
