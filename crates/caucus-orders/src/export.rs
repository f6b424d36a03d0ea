//! CSV export of purchased contacts.
//!
//! One header row, then one row per contact over the union of every
//! segment's columns. Cells a segment has no column for stay blank.

use caucus_core::contact::Contact;

use crate::error::Error;

pub const CONTENT_TYPE: &str = "text/csv; charset=utf-8";

enum Cell {
  Segment,
  Id,
  /// The first of these columns the contact has a value for.
  Field(&'static [&'static str]),
}

const COLUMNS: &[(&str, Cell)] = &[
  ("Segment", Cell::Segment),
  ("ID", Cell::Id),
  ("Person Type", Cell::Field(&["person_type"])),
  ("Full Name", Cell::Field(&["full_name"])),
  ("Title", Cell::Field(&["title"])),
  ("Email", Cell::Field(&["email"])),
  ("Phone", Cell::Field(&["telephone"])),
  ("Party", Cell::Field(&["political_party", "senator_affiliation", "party"])),
  ("Province", Cell::Field(&["province", "senator_province"])),
  ("Riding / Constituency", Cell::Field(&["riding", "constituency"])),
  ("MP Name", Cell::Field(&["mp_name"])),
  ("Senator Name", Cell::Field(&["senator_name"])),
  ("Committees", Cell::Field(&["committees"])),
  ("Parliamentary Offices", Cell::Field(&["parliamentary_offices"])),
  ("Hill Office Street", Cell::Field(&["hill_office_street"])),
  ("Hill Office City", Cell::Field(&["hill_office_city"])),
  ("Hill Office Province", Cell::Field(&["hill_office_province"])),
  ("Hill Office Postal Code", Cell::Field(&["hill_office_postal_code"])),
  ("Hill Office Phone", Cell::Field(&["hill_office_phone"])),
  ("Constituency Office Name", Cell::Field(&["constituency_office_name"])),
  ("Constituency Office Street", Cell::Field(&["constituency_office_street"])),
  ("Constituency Office City", Cell::Field(&["constituency_office_city"])),
  ("Constituency Office Province", Cell::Field(&["constituency_office_province"])),
  ("Constituency Office Postal Code", Cell::Field(&["constituency_office_postal_code"])),
  ("Constituency Office Phone", Cell::Field(&["constituency_office_phone"])),
  ("LinkedIn URL", Cell::Field(&["linkedin_url", "senator_linkedin_url"])),
  ("Senator URL", Cell::Field(&["senator_url"])),
  ("Nomination Date", Cell::Field(&["nomination_date"])),
  ("Retirement Date", Cell::Field(&["retirement_date"])),
  ("Legislative Address", Cell::Field(&["legislative_address"])),
  ("Constituency Address", Cell::Field(&["constituency_address"])),
  ("Profile Summary", Cell::Field(&["profile_summary"])),
  ("Education", Cell::Field(&["education"])),
  ("Work Experience", Cell::Field(&["work_experience"])),
  ("Website", Cell::Field(&["website_url"])),
];

pub fn header() -> impl Iterator<Item = &'static str> { COLUMNS.iter().map(|(name, _)| *name) }

fn row(contact: &Contact) -> Vec<String> {
  COLUMNS
    .iter()
    .map(|(_, cell)| match cell {
      Cell::Segment => contact.segment().as_str().to_owned(),
      Cell::Id => contact.id.to_string(),
      Cell::Field(columns) => columns
        .iter()
        .find_map(|c| contact.field(c))
        .unwrap_or_default()
        .to_owned(),
    })
    .collect()
}

/// Render `contacts` as CSV text.
pub fn render(contacts: &[Contact]) -> Result<String, Error> {
  let mut writer = csv::Writer::from_writer(Vec::new());
  writer.write_record(header())?;
  for contact in contacts {
    writer.write_record(row(contact))?;
  }
  let bytes = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
  Ok(String::from_utf8(bytes)?)
}
