//! Contact address: a kind (email/phone) plus a normalized value.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::email::{Email, EmailError};
use super::phone::{PhoneNumber, PhoneNumberError};

/// The kind of a contact address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactKind {
    Email,
    Phone,
}

impl ContactKind {
    /// Stable string form used in the database and on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

impl fmt::Display for ContactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContactKind {
    type Err = ContactAddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(Self::Email),
            "phone" => Ok(Self::Phone),
            other => Err(ContactAddressError::UnknownKind(other.to_owned())),
        }
    }
}

// SQLx support (with postgres feature)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for ContactKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ContactKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse::<Self>()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for ContactKind {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

/// Errors that can occur when parsing a [`ContactAddress`].
#[derive(thiserror::Error, Debug, Clone)]
pub enum ContactAddressError {
    /// The email value failed validation.
    #[error(transparent)]
    Email(#[from] EmailError),
    /// The phone value failed validation.
    #[error(transparent)]
    Phone(#[from] PhoneNumberError),
    /// The kind string is not `email` or `phone`.
    #[error("unknown contact kind: {0}")]
    UnknownKind(String),
}

/// A validated, normalized communication address.
///
/// `(kind, value)` is the identity of a contact: the database enforces
/// uniqueness over the normalized pair, so all writes must go through this
/// type rather than raw strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContactAddress {
    Email(Email),
    Phone(PhoneNumber),
}

impl ContactAddress {
    /// Parse an address of the given kind from raw input.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`EmailError`] or [`PhoneNumberError`] when the
    /// value is malformed for its kind.
    pub fn parse(kind: ContactKind, raw: &str) -> Result<Self, ContactAddressError> {
        match kind {
            ContactKind::Email => Ok(Self::Email(Email::parse(raw)?)),
            ContactKind::Phone => Ok(Self::Phone(PhoneNumber::parse(raw)?)),
        }
    }

    /// The kind of this address.
    #[must_use]
    pub const fn kind(&self) -> ContactKind {
        match self {
            Self::Email(_) => ContactKind::Email,
            Self::Phone(_) => ContactKind::Phone,
        }
    }

    /// The normalized value, as stored in the database.
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Email(email) => email.as_str(),
            Self::Phone(phone) => phone.as_str(),
        }
    }
}

impl fmt::Display for ContactAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}
