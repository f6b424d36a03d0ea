//! Contact records: one person in one directory segment.
//!
//! Each segment's source has its own column vocabulary, so a contact is a
//! tagged union keyed by segment rather than one wide struct. A uniform
//! [`ContactDisplay`] projection is computed on read for consumers that only
//! need the common fields.

use serde::{Deserialize, Serialize};

use crate::segment::Segment;

// ─── Per-segment records ─────────────────────────────────────────────────────

/// Declares a segment record whose fields mirror physical column names.
///
/// Every attribute is optional text; blank values are normalised to `None`
/// when read from the store.
macro_rules! segment_record {
  ($(#[$meta:meta])* $name:ident { $($field:ident),* $(,)? }) => {
    $(#[$meta])*
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct $name {
      $(
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub $field: Option<String>,
      )*
    }

    impl $name {
      /// Physical column names, in declaration order.
      pub const COLUMNS: &'static [&'static str] = &[$(stringify!($field)),*];

      /// Look up an attribute by its column name.
      pub fn field(&self, column: &str) -> Option<&str> {
        match column {
          $(stringify!($field) => self.$field.as_deref(),)*
          _ => None,
        }
      }

      /// Build a record by pulling every column through `get`.
      pub fn from_columns<E>(
        mut get: impl FnMut(&'static str) -> Result<Option<String>, E>,
      ) -> Result<Self, E> {
        Ok(Self {
          $($field: get(stringify!($field))?.filter(|v| !v.trim().is_empty()),)*
        })
      }
    }
  };
}

segment_record! {
  /// A row of the House of Commons view: MPs and constituency assistants.
  HouseContact {
    person_type,
    full_name,
    title,
    mp_name,
    political_party,
    riding,
    province,
    email,
    telephone,
    fax,
    committees,
    parliamentary_offices,
    primary_role,
    profile_url,
    hill_office_street,
    hill_office_city,
    hill_office_province,
    hill_office_postal_code,
    hill_office_phone,
    constituency_office_name,
    constituency_office_street,
    constituency_office_city,
    constituency_office_province,
    constituency_office_postal_code,
    constituency_office_phone,
  }
}

segment_record! {
  /// A row of the Senate view: senators and staffers.
  SenateContact {
    person_type,
    full_name,
    title,
    senator_name,
    senator_province,
    senator_affiliation,
    email,
    telephone,
    committees,
    parliamentary_offices,
    linkedin_url,
    senator_linkedin_url,
    senator_linkedin_found,
    senator_url,
    nomination_date,
    retirement_date,
  }
}

segment_record! {
  /// A row of the provincial legislators view.
  ProvincialContact {
    person_type,
    full_name,
    title,
    province,
    party,
    constituency,
    email,
    telephone,
    committees,
    constituency_address,
    legislative_address,
    profile_summary,
    education,
    work_experience,
    website_url,
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// The segment-specific payload of a contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "segment", rename_all = "lowercase")]
pub enum ContactDetails {
  House(HouseContact),
  Senate(SenateContact),
  Provincial(ProvincialContact),
}

impl ContactDetails {
  pub fn segment(&self) -> Segment {
    match self {
      Self::House(_) => Segment::House,
      Self::Senate(_) => Segment::Senate,
      Self::Provincial(_) => Segment::Provincial,
    }
  }

  /// Physical columns of `segment`'s source, in declaration order.
  pub fn columns(segment: Segment) -> &'static [&'static str] {
    match segment {
      Segment::House => HouseContact::COLUMNS,
      Segment::Senate => SenateContact::COLUMNS,
      Segment::Provincial => ProvincialContact::COLUMNS,
    }
  }

  /// Decode a row of `segment`'s source by pulling each column through `get`.
  pub fn from_columns<E>(
    segment: Segment,
    get: impl FnMut(&'static str) -> Result<Option<String>, E>,
  ) -> Result<Self, E> {
    Ok(match segment {
      Segment::House => Self::House(HouseContact::from_columns(get)?),
      Segment::Senate => Self::Senate(SenateContact::from_columns(get)?),
      Segment::Provincial => {
        Self::Provincial(ProvincialContact::from_columns(get)?)
      }
    })
  }

  pub fn field(&self, column: &str) -> Option<&str> {
    match self {
      Self::House(c) => c.field(column),
      Self::Senate(c) => c.field(column),
      Self::Provincial(c) => c.field(column),
    }
  }
}

/// Composite identity of a contact. Ids are only unique within a segment.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ContactKey {
  pub segment: Segment,
  pub id:      i64,
}

/// One person in the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
  pub id:      i64,
  #[serde(flatten)]
  pub details: ContactDetails,
}

impl Contact {
  pub fn segment(&self) -> Segment { self.details.segment() }

  pub fn key(&self) -> ContactKey {
    ContactKey { segment: self.segment(), id: self.id }
  }

  pub fn field(&self, column: &str) -> Option<&str> { self.details.field(column) }

  /// The segment-independent projection used by listings and exports.
  pub fn display(&self) -> ContactDisplay {
    let owned = |v: &Option<String>| v.clone();
    match &self.details {
      ContactDetails::House(c) => ContactDisplay {
        name:        owned(&c.full_name),
        title:       owned(&c.title),
        affiliation: owned(&c.political_party),
        region:      owned(&c.province),
        district:    owned(&c.riding),
        email:       owned(&c.email),
        phone:       owned(&c.telephone),
      },
      ContactDetails::Senate(c) => ContactDisplay {
        name:        owned(&c.full_name),
        title:       owned(&c.title),
        affiliation: owned(&c.senator_affiliation),
        region:      owned(&c.senator_province),
        district:    None,
        email:       owned(&c.email),
        phone:       owned(&c.telephone),
      },
      ContactDetails::Provincial(c) => ContactDisplay {
        name:        owned(&c.full_name),
        title:       owned(&c.title),
        affiliation: owned(&c.party),
        region:      owned(&c.province),
        district:    owned(&c.constituency),
        email:       owned(&c.email),
        phone:       owned(&c.telephone),
      },
    }
  }
}

/// Fields every segment can answer, under one vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDisplay {
  pub name:        Option<String>,
  pub title:       Option<String>,
  /// Party, caucus, or affiliation.
  pub affiliation: Option<String>,
  /// Province or territory.
  pub region:      Option<String>,
  /// Riding or constituency, where the segment has one.
  pub district:    Option<String>,
  pub email:       Option<String>,
  pub phone:       Option<String>,
}
