//! Object-class transforms (§4.3): one module per directory `objectclass`,
//! each exposing `add`/`modify`/`delete` functions that stage mutations
//! against a [`crate::batch::Batch`].

pub mod accesskey;
pub mod dispatch;
pub mod groupofuniquenames;
pub mod sdcaccountgroup;
pub mod sdcaccountpolicy;
pub mod sdcaccountrole;
pub mod sdcaccountuser;
pub mod sdckey;
pub mod sdcperson;

use crate::changelog::Changes;
use crate::dn::dn_value;
use crate::errors::{Error, ErrorCode};

/// Reads a required attribute's first value out of an add/delete entry's
/// attribute map, or a `ChangelogShape` error naming it.
pub(crate) fn require<'a>(changes: &'a Changes, attr: &str) -> Result<&'a str, Error> {
    changes.first(attr).ok_or_else(|| {
        Error::ChangelogShape(ErrorCode::ChangelogMissingAttribute, attr.to_string())
    })
}

/// Parses an LDAP boolean attribute (`"true"`/`"false"` as strings).
pub(crate) fn parse_ldap_bool(value: &str) -> bool {
    value.eq_ignore_ascii_case("true")
}

/// Extracts the uuid named at DN position `index`, or a `ChangelogShape`
/// error if the DN is too short.
pub(crate) fn require_dn_value(dn: &str, index: usize) -> Result<&str, Error> {
    dn_value(dn, index).ok_or_else(|| {
        Error::ChangelogShape(ErrorCode::ChangelogMalformedDn, dn.to_string())
    })
}
